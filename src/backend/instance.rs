// Instance creation and the validation diagnostics channel
//
// Negotiates extensions and layers before the instance exists, creates it,
// and routes validation messages through the `log` facade.

use ash::vk;
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_char, c_void, CStr, CString};

use super::driver::Driver;
use super::error::{BootstrapError, BootstrapResult};

pub const VALIDATION_LAYERS: [&CStr; 1] = [c"VK_LAYER_KHRONOS_validation"];

const APPLICATION_NAME: &CStr = c"laz engine";
const ENGINE_NAME: &CStr = c"No Engine";
const APPLICATION_VERSION: u32 = vk::make_api_version(0, 1, 0, 0);
const ENGINE_VERSION: u32 = vk::make_api_version(0, 1, 0, 0);

/// Layers to enable for the given diagnostics setting
pub fn enabled_layers(diagnostics: bool) -> &'static [&'static CStr] {
    if diagnostics {
        &VALIDATION_LAYERS
    } else {
        &[]
    }
}

/// Platform surface extensions, plus debug utils when diagnostics are on
pub fn required_extensions(platform: Vec<String>, diagnostics: bool) -> Vec<String> {
    let mut extensions = platform;
    if diagnostics {
        let debug_utils = ash::extensions::ext::DebugUtils::name()
            .to_string_lossy()
            .into_owned();
        if !extensions.contains(&debug_utils) {
            extensions.push(debug_utils);
        }
    }
    extensions
}

/// Every requested layer must be in the available list
pub fn check_layer_support(requested: &[&CStr], available: &[String]) -> BootstrapResult<()> {
    for layer in requested {
        let name = layer.to_string_lossy();
        if !available.iter().any(|a| *a == name) {
            return Err(BootstrapError::MissingValidationLayer(name.into_owned()));
        }
    }
    Ok(())
}

/// Messenger settings shared by the instance chain and the persistent messenger
pub fn debug_messenger_info() -> vk::DebugUtilsMessengerCreateInfoEXT {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
        .build()
}

/// Negotiate extensions and layers, then create the instance
pub fn create_instance<D: Driver>(
    driver: &mut D,
    display: RawDisplayHandle,
    diagnostics: bool,
) -> BootstrapResult<vk::Instance> {
    let layers = enabled_layers(diagnostics);
    if diagnostics {
        let available = driver.instance_layers().unwrap_or_else(|e| {
            log::error!(
                "Instance layer enumeration failed ({}); no layer can be confirmed available",
                e
            );
            Vec::new()
        });
        check_layer_support(layers, &available)?;
    }

    let platform = driver
        .surface_extensions(display)
        .map_err(BootstrapError::InstanceCreation)?;
    let extensions = required_extensions(platform, diagnostics);
    log::debug!("Instance extensions: {:?}", extensions);

    let extension_names = extensions
        .iter()
        .map(|e| CString::new(e.as_str()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| BootstrapError::InstanceCreation(vk::Result::ERROR_EXTENSION_NOT_PRESENT))?;
    let extension_ptrs: Vec<*const c_char> = extension_names.iter().map(|e| e.as_ptr()).collect();
    let layer_ptrs: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();

    let app_info = vk::ApplicationInfo::builder()
        .application_name(APPLICATION_NAME)
        .application_version(APPLICATION_VERSION)
        .engine_name(ENGINE_NAME)
        .engine_version(ENGINE_VERSION)
        .api_version(vk::API_VERSION_1_0);

    // Chained so instance creation/destruction itself is validated
    let mut messenger_info = debug_messenger_info();

    let mut create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_extension_names(&extension_ptrs)
        .enabled_layer_names(&layer_ptrs);
    if diagnostics {
        create_info = create_info.push_next(&mut messenger_info);
    }

    let instance = driver
        .create_instance(&create_info)
        .map_err(BootstrapError::InstanceCreation)?;

    log::info!(
        "Created Vulkan instance ({} extensions, validation {})",
        extension_ptrs.len(),
        if diagnostics { "on" } else { "off" }
    );
    Ok(instance)
}

/// Register the persistent messenger; nothing to do without diagnostics
pub fn setup_debug_messenger<D: Driver>(
    driver: &D,
    diagnostics: bool,
) -> BootstrapResult<Option<vk::DebugUtilsMessengerEXT>> {
    if !diagnostics {
        return Ok(None);
    }

    let info = debug_messenger_info();
    let messenger = driver
        .create_debug_messenger(&info)
        .map_err(BootstrapError::DebugMessenger)?;
    Ok(Some(messenger))
}

/// Render a validation message, or `None` for severities not worth reporting
pub fn format_diagnostic(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    message: &str,
) -> Option<String> {
    if severity == vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        || severity == vk::DebugUtilsMessageSeverityFlagsEXT::INFO
    {
        return None;
    }

    let severity = if severity == vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        "Warning"
    } else {
        "Error"
    };

    let category = if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "[validation] "
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "[performance] "
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL) {
        "[general] "
    } else {
        ""
    };

    Some(format!("{}: {}{}", severity, category, message))
}

// Debug callback for validation layers. Must return VK_FALSE.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message).to_string_lossy();

    if let Some(line) = format_diagnostic(message_severity, message_type, &message) {
        if message_severity == vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
            log::warn!(target: "vulkan", "{}", line);
        } else {
            log::error!(target: "vulkan", "{}", line);
        }
    }

    vk::FALSE
}
