// Vulkan driver - the ash-backed implementation of `Driver`
//
// Owns the entry point and the dispatch tables that come into existence as
// the bootstrap proceeds: instance loaders after `create_instance`, device
// loaders after `create_device`. Calls made before their loader exists fail
// with ERROR_INITIALIZATION_FAILED instead of panicking.

use ash::extensions::{ext::DebugUtils, khr};
use ash::prelude::VkResult;
use ash::{vk, Entry};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::{c_char, CStr};

use super::driver::{DeviceInfo, Driver};
use super::error::BootstrapError;

struct InstanceLoaders {
    instance: ash::Instance,
    surface: khr::Surface,
    debug_utils: DebugUtils,
}

struct DeviceLoaders {
    device: ash::Device,
    swapchain: khr::Swapchain,
}

pub struct VulkanDriver {
    entry: Entry,
    instance: Option<InstanceLoaders>,
    device: Option<DeviceLoaders>,
}

impl VulkanDriver {
    /// Load the system Vulkan library
    pub fn load() -> Result<Self, BootstrapError> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| BootstrapError::LoaderUnavailable(e.to_string()))?;

        Ok(Self {
            entry,
            instance: None,
            device: None,
        })
    }

    /// Logical device dispatch table, once created
    pub fn device(&self) -> Option<&ash::Device> {
        self.device.as_ref().map(|d| &d.device)
    }

    /// Swapchain extension loader, once the device exists
    pub fn swapchain_loader(&self) -> Option<&khr::Swapchain> {
        self.device.as_ref().map(|d| &d.swapchain)
    }

    /// Memory heaps and types of `device`, once the instance exists
    pub fn memory_properties(
        &self,
        device: vk::PhysicalDevice,
    ) -> Option<vk::PhysicalDeviceMemoryProperties> {
        self.instance.as_ref().map(|loaders| unsafe {
            loaders
                .instance
                .get_physical_device_memory_properties(device)
        })
    }

    fn instance(&self) -> VkResult<&InstanceLoaders> {
        self.instance
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn device_loaders(&self) -> VkResult<&DeviceLoaders> {
        self.device
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }
}

fn name_to_string(raw: &[c_char]) -> String {
    // Vulkan guarantees NUL termination inside the fixed-size array
    unsafe { CStr::from_ptr(raw.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

impl Driver for VulkanDriver {
    fn surface_extensions(&self, display: RawDisplayHandle) -> VkResult<Vec<String>> {
        let names = ash_window::enumerate_required_extensions(display)?;
        Ok(names
            .iter()
            .map(|&ptr| unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
            .collect())
    }

    fn instance_layers(&self) -> VkResult<Vec<String>> {
        let layers = self.entry.enumerate_instance_layer_properties()?;
        Ok(layers.iter().map(|l| name_to_string(&l.layer_name)).collect())
    }

    fn create_instance(&mut self, info: &vk::InstanceCreateInfo) -> VkResult<vk::Instance> {
        let instance = unsafe { self.entry.create_instance(info, None) }?;
        let handle = instance.handle();

        self.instance = Some(InstanceLoaders {
            surface: khr::Surface::new(&self.entry, &instance),
            debug_utils: DebugUtils::new(&self.entry, &instance),
            instance,
        });

        Ok(handle)
    }

    fn create_debug_messenger(
        &self,
        info: &vk::DebugUtilsMessengerCreateInfoEXT,
    ) -> VkResult<vk::DebugUtilsMessengerEXT> {
        let loaders = self.instance()?;
        unsafe { loaders.debug_utils.create_debug_utils_messenger(info, None) }
    }

    fn create_surface(
        &self,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        let loaders = self.instance()?;
        unsafe {
            ash_window::create_surface(&self.entry, &loaders.instance, display, window, None)
        }
    }

    fn physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        let loaders = self.instance()?;
        unsafe { loaders.instance.enumerate_physical_devices() }
    }

    fn device_info(&self, device: vk::PhysicalDevice) -> DeviceInfo {
        match self.instance() {
            Ok(loaders) => {
                let props = unsafe { loaders.instance.get_physical_device_properties(device) };
                DeviceInfo {
                    name: name_to_string(&props.device_name),
                    device_type: props.device_type,
                    api_version: props.api_version,
                }
            }
            Err(_) => DeviceInfo {
                name: String::from("<unknown>"),
                device_type: vk::PhysicalDeviceType::OTHER,
                api_version: 0,
            },
        }
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        self.instance
            .as_ref()
            .map(|loaders| unsafe {
                loaders
                    .instance
                    .get_physical_device_queue_family_properties(device)
            })
            .unwrap_or_default()
    }

    fn surface_support(
        &self,
        device: vk::PhysicalDevice,
        family: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        let loaders = self.instance()?;
        unsafe {
            loaders
                .surface
                .get_physical_device_surface_support(device, family, surface)
        }
    }

    fn device_extensions(&self, device: vk::PhysicalDevice) -> VkResult<Vec<String>> {
        let loaders = self.instance()?;
        let extensions =
            unsafe { loaders.instance.enumerate_device_extension_properties(device) }?;
        Ok(extensions
            .iter()
            .map(|e| name_to_string(&e.extension_name))
            .collect())
    }

    fn surface_capabilities(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        let loaders = self.instance()?;
        unsafe {
            loaders
                .surface
                .get_physical_device_surface_capabilities(device, surface)
        }
    }

    fn surface_formats(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        let loaders = self.instance()?;
        unsafe {
            loaders
                .surface
                .get_physical_device_surface_formats(device, surface)
        }
    }

    fn present_modes(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        let loaders = self.instance()?;
        unsafe {
            loaders
                .surface
                .get_physical_device_surface_present_modes(device, surface)
        }
    }

    fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        info: &vk::DeviceCreateInfo,
    ) -> VkResult<vk::Device> {
        let loaders = self.instance()?;
        let device = unsafe { loaders.instance.create_device(physical_device, info, None) }?;
        let handle = device.handle();
        let swapchain = khr::Swapchain::new(&loaders.instance, &device);

        self.device = Some(DeviceLoaders { device, swapchain });
        Ok(handle)
    }

    fn device_queue(&self, family: u32, index: u32) -> vk::Queue {
        self.device
            .as_ref()
            .map(|d| unsafe { d.device.get_device_queue(family, index) })
            .unwrap_or_default()
    }

    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR) -> VkResult<vk::SwapchainKHR> {
        let loaders = self.device_loaders()?;
        unsafe { loaders.swapchain.create_swapchain(info, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        let loaders = self.device_loaders()?;
        unsafe { loaders.swapchain.get_swapchain_images(swapchain) }
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo) -> VkResult<vk::ImageView> {
        let loaders = self.device_loaders()?;
        unsafe { loaders.device.create_image_view(info, None) }
    }

    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo) -> VkResult<vk::RenderPass> {
        let loaders = self.device_loaders()?;
        unsafe { loaders.device.create_render_pass(info, None) }
    }

    fn create_shader_module(&self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        let loaders = self.device_loaders()?;
        let info = vk::ShaderModuleCreateInfo::builder().code(code);
        unsafe { loaders.device.create_shader_module(&info, None) }
    }

    fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo,
    ) -> VkResult<vk::PipelineLayout> {
        let loaders = self.device_loaders()?;
        unsafe { loaders.device.create_pipeline_layout(info, None) }
    }

    fn create_graphics_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo,
    ) -> VkResult<vk::Pipeline> {
        let loaders = self.device_loaders()?;
        let pipelines = unsafe {
            loaders.device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(info),
                None,
            )
        }
        .map_err(|(_, e)| e)?;

        pipelines
            .into_iter()
            .next()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn wait_idle(&self) -> VkResult<()> {
        match &self.device {
            Some(loaders) => unsafe { loaders.device.device_wait_idle() },
            None => Ok(()),
        }
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        if let Some(loaders) = &self.device {
            unsafe { loaders.device.destroy_pipeline(pipeline, None) };
        }
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        if let Some(loaders) = &self.device {
            unsafe { loaders.device.destroy_pipeline_layout(layout, None) };
        }
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        if let Some(loaders) = &self.device {
            unsafe { loaders.device.destroy_shader_module(module, None) };
        }
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        if let Some(loaders) = &self.device {
            unsafe { loaders.device.destroy_render_pass(render_pass, None) };
        }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        if let Some(loaders) = &self.device {
            unsafe { loaders.device.destroy_image_view(view, None) };
        }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        if let Some(loaders) = &self.device {
            unsafe { loaders.swapchain.destroy_swapchain(swapchain, None) };
        }
    }

    fn destroy_device(&mut self) {
        if let Some(loaders) = self.device.take() {
            unsafe { loaders.device.destroy_device(None) };
        }
    }

    fn destroy_debug_messenger(&self, messenger: vk::DebugUtilsMessengerEXT) {
        if let Some(loaders) = &self.instance {
            unsafe {
                loaders
                    .debug_utils
                    .destroy_debug_utils_messenger(messenger, None)
            };
        }
    }

    fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        if let Some(loaders) = &self.instance {
            unsafe { loaders.surface.destroy_surface(surface, None) };
        }
    }

    fn destroy_instance(&mut self) {
        if let Some(loaders) = self.instance.take() {
            unsafe { loaders.instance.destroy_instance(None) };
        }
    }
}
