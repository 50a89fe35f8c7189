// Device selection and logical device creation
//
// Responsibilities:
// - Inspect every physical device against the bound surface
// - Pick the best suitable one (discrete preferred)
// - Create the logical device and fetch graphics/present queues

use ash::vk;
use std::collections::HashSet;
use std::ffi::{c_char, CStr};

use super::driver::{DeviceInfo, Driver};
use super::error::{BootstrapError, BootstrapResult};

/// Device extensions every candidate must expose
pub const DEVICE_EXTENSIONS: [&CStr; 1] = [c"VK_KHR_swapchain"];

/// Graphics and present queue family indices, as discovered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Both families found
    pub fn resolve(self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics?,
            present: self.present?,
        })
    }
}

/// Resolved queue families of a suitable device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, graphics first
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Scan queue families in order. The first graphics family wins; the present
/// family is the first graphics family that can also present to `surface`.
pub fn find_queue_families<D: Driver>(
    driver: &D,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> QueueFamilyIndices {
    let mut indices = QueueFamilyIndices::default();

    for (index, family) in driver.queue_families(device).iter().enumerate() {
        if !family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            continue;
        }
        let index = index as u32;

        indices.graphics.get_or_insert(index);

        if indices.present.is_none() {
            match driver.surface_support(device, index, surface) {
                Ok(true) => indices.present = Some(index),
                Ok(false) => {}
                Err(e) => log::debug!("Surface support query failed for family {}: {}", index, e),
            }
        }

        if indices.graphics.is_some() && indices.present.is_some() {
            break;
        }
    }

    indices
}

/// Required extensions the device does not report
pub fn missing_extensions(required: &[&CStr], available: &[String]) -> Vec<String> {
    let mut missing: HashSet<String> = required
        .iter()
        .map(|name| name.to_string_lossy().into_owned())
        .collect();

    for name in available {
        missing.remove(name);
    }

    let mut missing: Vec<String> = missing.into_iter().collect();
    missing.sort();
    missing
}

/// Snapshot of what a device can do with the surface; stale once either changes
#[derive(Debug, Clone, Default)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub fn query<D: Driver>(
        driver: &D,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> ash::prelude::VkResult<Self> {
        Ok(Self {
            capabilities: driver.surface_capabilities(device, surface)?,
            formats: driver.surface_formats(device, surface)?,
            present_modes: driver.present_modes(device, surface)?,
        })
    }

    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// A physical device and everything selection needs to know about it
#[derive(Debug, Clone)]
pub struct Candidate {
    pub handle: vk::PhysicalDevice,
    pub info: DeviceInfo,
    pub queues: QueueFamilyIndices,
    pub missing_extensions: Vec<String>,
    /// `None` when extensions were missing or the query failed
    pub swapchain: Option<SwapchainSupport>,
}

impl Candidate {
    pub fn inspect<D: Driver>(
        driver: &D,
        handle: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Self {
        let info = driver.device_info(handle);
        let queues = find_queue_families(driver, handle, surface);

        let missing_extensions = match driver.device_extensions(handle) {
            Ok(available) => missing_extensions(&DEVICE_EXTENSIONS, &available),
            Err(e) => {
                log::debug!("Extension query failed for {}: {}", info.name, e);
                DEVICE_EXTENSIONS
                    .iter()
                    .map(|n| n.to_string_lossy().into_owned())
                    .collect()
            }
        };

        let swapchain = if missing_extensions.is_empty() {
            SwapchainSupport::query(driver, handle, surface)
                .map_err(|e| log::debug!("Swapchain support query failed for {}: {}", info.name, e))
                .ok()
        } else {
            None
        };

        Self {
            handle,
            info,
            queues,
            missing_extensions,
            swapchain,
        }
    }

    pub fn is_suitable(&self) -> bool {
        self.queues.resolve().is_some()
            && self.missing_extensions.is_empty()
            && self.swapchain.as_ref().is_some_and(SwapchainSupport::is_adequate)
    }

    /// Preference among suitable devices; only "discrete or not" counts
    pub fn score(&self) -> u32 {
        match self.info.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 1,
            _ => 0,
        }
    }

    fn rejection_reasons(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        if self.queues.graphics.is_none() {
            reasons.push("no graphics queue".to_string());
        }
        if self.queues.present.is_none() {
            reasons.push("no present queue".to_string());
        }
        if !self.missing_extensions.is_empty() {
            reasons.push(format!("missing {}", self.missing_extensions.join(", ")));
        }
        match &self.swapchain {
            Some(support) if !support.is_adequate() => {
                reasons.push("no surface formats or present modes".to_string())
            }
            None if self.missing_extensions.is_empty() => {
                reasons.push("swapchain support unknown".to_string())
            }
            _ => {}
        }
        reasons
    }
}

/// Highest-scoring suitable candidate; ties go to the earliest one
pub fn select_candidate(candidates: &[Candidate]) -> Option<&Candidate> {
    let mut best: Option<&Candidate> = None;

    for candidate in candidates.iter().filter(|c| c.is_suitable()) {
        match best {
            Some(current) if candidate.score() <= current.score() => {}
            _ => best = Some(candidate),
        }
    }

    best
}

/// The physical device the rest of the bootstrap runs on
#[derive(Debug, Clone)]
pub struct SelectedDevice {
    pub handle: vk::PhysicalDevice,
    pub info: DeviceInfo,
    pub families: QueueFamilies,
}

pub fn pick_physical_device<D: Driver>(
    driver: &D,
    surface: vk::SurfaceKHR,
) -> BootstrapResult<SelectedDevice> {
    let devices = driver.physical_devices().unwrap_or_else(|e| {
        log::warn!("Failed to enumerate physical devices: {}", e);
        Vec::new()
    });

    if devices.is_empty() {
        return Err(BootstrapError::NoPhysicalDevice);
    }

    let candidates: Vec<Candidate> = devices
        .iter()
        .map(|&device| Candidate::inspect(driver, device, surface))
        .collect();

    for candidate in candidates.iter().filter(|c| !c.is_suitable()) {
        log::debug!(
            "Rejected GPU {}: {}",
            candidate.info.name,
            candidate.rejection_reasons().join("; ")
        );
    }

    let chosen = select_candidate(&candidates)
        .ok_or(BootstrapError::NoSuitableDevice(candidates.len()))?;
    let families = chosen
        .queues
        .resolve()
        .ok_or(BootstrapError::NoSuitableDevice(candidates.len()))?;

    log::info!("Selected GPU: {} ({:?})", chosen.info.name, chosen.info.device_type);
    log::info!(
        "API Version: {}.{}.{}",
        vk::api_version_major(chosen.info.api_version),
        vk::api_version_minor(chosen.info.api_version),
        vk::api_version_patch(chosen.info.api_version)
    );

    Ok(SelectedDevice {
        handle: chosen.handle,
        info: chosen.info.clone(),
        families,
    })
}

/// Queues fetched from the logical device. The driver owns the device itself.
#[derive(Debug, Clone, Copy)]
pub struct LogicalDevice {
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
}

pub fn create_logical_device<D: Driver>(
    driver: &mut D,
    selected: &SelectedDevice,
    layers: &[&CStr],
) -> BootstrapResult<LogicalDevice> {
    let queue_priorities = [1.0];
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = selected
        .families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family)
                .queue_priorities(&queue_priorities)
                .build()
        })
        .collect();

    let extensions: Vec<*const c_char> = DEVICE_EXTENSIONS.iter().map(|e| e.as_ptr()).collect();
    // Device layers are deprecated but older loaders still expect them to match
    let layer_names: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();
    let features = vk::PhysicalDeviceFeatures::default();

    let create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layer_names)
        .enabled_features(&features);

    driver
        .create_device(selected.handle, &create_info)
        .map_err(BootstrapError::DeviceCreation)?;

    let graphics_queue = driver.device_queue(selected.families.graphics, 0);
    let present_queue = driver.device_queue(selected.families.present, 0);

    log::info!(
        "Created logical device (graphics family {}, present family {})",
        selected.families.graphics,
        selected.families.present
    );

    Ok(LogicalDevice {
        graphics_queue,
        present_queue,
    })
}
