// Recording driver for unit tests
//
// Hands out fake handles, logs every create/destroy call in order, and can
// be told to fail one step of the bootstrap sequence.

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::cell::{Cell, RefCell};
use std::ffi::CStr;

use super::driver::{DeviceInfo, Driver};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateInstance,
    CreateDebugMessenger,
    CreateSurface,
    CreateDevice,
    CreateSwapchain,
    CreateImageView,
    CreateRenderPass,
    CreateShaderModule,
    CreatePipelineLayout,
    CreatePipeline,
    DestroyPipeline(vk::Pipeline),
    DestroyPipelineLayout(vk::PipelineLayout),
    DestroyShaderModule(vk::ShaderModule),
    DestroyRenderPass(vk::RenderPass),
    DestroyImageView(vk::ImageView),
    DestroySwapchain(vk::SwapchainKHR),
    DestroyDevice,
    DestroyDebugMessenger(vk::DebugUtilsMessengerEXT),
    DestroySurface(vk::SurfaceKHR),
    DestroyInstance,
}

impl Call {
    pub fn is_destroy(&self) -> bool {
        matches!(
            self,
            Self::DestroyPipeline(_)
                | Self::DestroyPipelineLayout(_)
                | Self::DestroyShaderModule(_)
                | Self::DestroyRenderPass(_)
                | Self::DestroyImageView(_)
                | Self::DestroySwapchain(_)
                | Self::DestroyDevice
                | Self::DestroyDebugMessenger(_)
                | Self::DestroySurface(_)
                | Self::DestroyInstance
        )
    }
}

/// Step at which the mock returns an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    LayerEnumeration,
    Instance,
    DebugMessenger,
    Surface,
    Device,
    Swapchain,
    /// Fail the n-th image view (0-based)
    ImageView(usize),
    RenderPass,
    /// Fail the n-th shader module (0 = vertex, 1 = fragment)
    ShaderModule(usize),
    PipelineLayout,
    Pipeline,
}

#[derive(Debug, Clone, Copy)]
pub struct MockFamily {
    pub flags: vk::QueueFlags,
    pub present: bool,
}

impl MockFamily {
    pub fn graphics_present() -> Self {
        Self {
            flags: vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER,
            present: true,
        }
    }

    pub fn graphics_only() -> Self {
        Self {
            flags: vk::QueueFlags::GRAPHICS,
            present: false,
        }
    }

    pub fn compute_only() -> Self {
        Self {
            flags: vk::QueueFlags::COMPUTE,
            present: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockDevice {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub families: Vec<MockFamily>,
    pub extensions: Vec<String>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl MockDevice {
    /// A device that passes every suitability check
    pub fn suitable(name: &str, device_type: vk::PhysicalDeviceType) -> Self {
        Self {
            name: name.to_string(),
            device_type,
            families: vec![MockFamily::graphics_present()],
            extensions: vec![
                "VK_KHR_maintenance1".to_string(),
                "VK_KHR_swapchain".to_string(),
            ],
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: vk::Extent2D {
                    width: 800,
                    height: 600,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                max_image_array_layers: 1,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::R8G8B8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }

    pub fn with_families(mut self, families: Vec<MockFamily>) -> Self {
        self.families = families;
        self
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn with_formats(mut self, formats: Vec<vk::SurfaceFormatKHR>) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_present_modes(mut self, modes: Vec<vk::PresentModeKHR>) -> Self {
        self.present_modes = modes;
        self
    }
}

/// What the bootstrap asked the driver to build, copied out of the create-infos
#[derive(Debug, Clone, Default)]
pub struct Requests {
    pub instance_extensions: Vec<String>,
    pub instance_layers: Vec<String>,
    pub instance_chains_messenger: bool,
    pub device_queue_families: Vec<u32>,
    pub device_extensions: Vec<String>,
    pub device_layers: Vec<String>,
    pub swapchain_sharing: Option<vk::SharingMode>,
    pub swapchain_families: Vec<u32>,
    pub swapchain_min_images: u32,
    pub swapchain_format: Option<(vk::Format, vk::ColorSpaceKHR)>,
    pub swapchain_present_mode: Option<vk::PresentModeKHR>,
    pub swapchain_extent: vk::Extent2D,
    pub pipeline_dynamic_states: Vec<vk::DynamicState>,
    pub pipeline_front_face: Option<vk::FrontFace>,
    pub pipeline_cull_mode: Option<vk::CullModeFlags>,
    pub pipeline_stage_count: u32,
    pub pipeline_vertex_attributes: u32,
}

pub struct MockDriver {
    pub layers: Vec<String>,
    pub surface_extensions: Vec<String>,
    pub devices: Vec<MockDevice>,
    pub swapchain_image_count: usize,
    pub fail: Option<FailAt>,
    calls: RefCell<Vec<Call>>,
    requests: RefCell<Requests>,
    next_handle: Cell<u64>,
    image_views_created: Cell<usize>,
    shader_modules_created: Cell<usize>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            layers: vec!["VK_LAYER_KHRONOS_validation".to_string()],
            surface_extensions: vec![
                "VK_KHR_surface".to_string(),
                "VK_KHR_xlib_surface".to_string(),
            ],
            devices: vec![MockDevice::suitable(
                "Mock Discrete",
                vk::PhysicalDeviceType::DISCRETE_GPU,
            )],
            swapchain_image_count: 3,
            fail: None,
            calls: RefCell::new(Vec::new()),
            requests: RefCell::new(Requests::default()),
            next_handle: Cell::new(0x100),
            image_views_created: Cell::new(0),
            shader_modules_created: Cell::new(0),
        }
    }

    pub fn with_devices(mut self, devices: Vec<MockDevice>) -> Self {
        self.devices = devices;
        self
    }

    pub fn failing_at(mut self, step: FailAt) -> Self {
        self.fail = Some(step);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn destroy_calls(&self) -> Vec<Call> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.is_destroy())
            .cloned()
            .collect()
    }

    pub fn requests(&self) -> Requests {
        self.requests.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn handle<H: Handle>(&self) -> H {
        let raw = self.next_handle.get();
        self.next_handle.set(raw + 1);
        H::from_raw(raw)
    }

    fn fails(&self, step: FailAt) -> bool {
        self.fail == Some(step)
    }

    fn mock_device(&self, device: vk::PhysicalDevice) -> VkResult<&MockDevice> {
        (device.as_raw() as usize)
            .checked_sub(1)
            .and_then(|i| self.devices.get(i))
            .ok_or(vk::Result::ERROR_DEVICE_LOST)
    }
}

unsafe fn c_names(names: *const *const std::ffi::c_char, count: u32) -> Vec<String> {
    if names.is_null() {
        return Vec::new();
    }
    std::slice::from_raw_parts(names, count as usize)
        .iter()
        .map(|&p| CStr::from_ptr(p).to_string_lossy().into_owned())
        .collect()
}

impl Driver for MockDriver {
    fn surface_extensions(&self, _display: RawDisplayHandle) -> VkResult<Vec<String>> {
        Ok(self.surface_extensions.clone())
    }

    fn instance_layers(&self) -> VkResult<Vec<String>> {
        if self.fails(FailAt::LayerEnumeration) {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        Ok(self.layers.clone())
    }

    fn create_instance(&mut self, info: &vk::InstanceCreateInfo) -> VkResult<vk::Instance> {
        self.record(Call::CreateInstance);
        {
            let mut requests = self.requests.borrow_mut();
            unsafe {
                requests.instance_extensions =
                    c_names(info.pp_enabled_extension_names, info.enabled_extension_count);
                requests.instance_layers =
                    c_names(info.pp_enabled_layer_names, info.enabled_layer_count);
            }
            requests.instance_chains_messenger = !info.p_next.is_null();
        }
        if self.fails(FailAt::Instance) {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        Ok(self.handle())
    }

    fn create_debug_messenger(
        &self,
        _info: &vk::DebugUtilsMessengerCreateInfoEXT,
    ) -> VkResult<vk::DebugUtilsMessengerEXT> {
        self.record(Call::CreateDebugMessenger);
        if self.fails(FailAt::DebugMessenger) {
            return Err(vk::Result::ERROR_EXTENSION_NOT_PRESENT);
        }
        Ok(self.handle())
    }

    fn create_surface(
        &self,
        _display: RawDisplayHandle,
        _window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        self.record(Call::CreateSurface);
        if self.fails(FailAt::Surface) {
            return Err(vk::Result::ERROR_NATIVE_WINDOW_IN_USE_KHR);
        }
        Ok(self.handle())
    }

    fn physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        Ok((1..=self.devices.len() as u64)
            .map(vk::PhysicalDevice::from_raw)
            .collect())
    }

    fn device_info(&self, device: vk::PhysicalDevice) -> DeviceInfo {
        let mock = self.mock_device(device).expect("unknown mock device");
        DeviceInfo {
            name: mock.name.clone(),
            device_type: mock.device_type,
            api_version: vk::API_VERSION_1_0,
        }
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        self.mock_device(device)
            .map(|mock| {
                mock.families
                    .iter()
                    .map(|family| vk::QueueFamilyProperties {
                        queue_flags: family.flags,
                        queue_count: 1,
                        ..Default::default()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn surface_support(
        &self,
        device: vk::PhysicalDevice,
        family: u32,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        let mock = self.mock_device(device)?;
        Ok(mock
            .families
            .get(family as usize)
            .is_some_and(|f| f.present))
    }

    fn device_extensions(&self, device: vk::PhysicalDevice) -> VkResult<Vec<String>> {
        Ok(self.mock_device(device)?.extensions.clone())
    }

    fn surface_capabilities(
        &self,
        device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        Ok(self.mock_device(device)?.capabilities)
    }

    fn surface_formats(
        &self,
        device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.mock_device(device)?.formats.clone())
    }

    fn present_modes(
        &self,
        device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        Ok(self.mock_device(device)?.present_modes.clone())
    }

    fn create_device(
        &mut self,
        _physical_device: vk::PhysicalDevice,
        info: &vk::DeviceCreateInfo,
    ) -> VkResult<vk::Device> {
        self.record(Call::CreateDevice);
        {
            let mut requests = self.requests.borrow_mut();
            let queues = unsafe {
                std::slice::from_raw_parts(
                    info.p_queue_create_infos,
                    info.queue_create_info_count as usize,
                )
            };
            requests.device_queue_families =
                queues.iter().map(|q| q.queue_family_index).collect();
            unsafe {
                requests.device_extensions =
                    c_names(info.pp_enabled_extension_names, info.enabled_extension_count);
                requests.device_layers =
                    c_names(info.pp_enabled_layer_names, info.enabled_layer_count);
            }
        }
        if self.fails(FailAt::Device) {
            return Err(vk::Result::ERROR_DEVICE_LOST);
        }
        Ok(self.handle())
    }

    fn device_queue(&self, family: u32, _index: u32) -> vk::Queue {
        vk::Queue::from_raw(0x1_0000 + u64::from(family))
    }

    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR) -> VkResult<vk::SwapchainKHR> {
        self.record(Call::CreateSwapchain);
        {
            let mut requests = self.requests.borrow_mut();
            requests.swapchain_sharing = Some(info.image_sharing_mode);
            requests.swapchain_families = if info.p_queue_family_indices.is_null() {
                Vec::new()
            } else {
                unsafe {
                    std::slice::from_raw_parts(
                        info.p_queue_family_indices,
                        info.queue_family_index_count as usize,
                    )
                }
                .to_vec()
            };
            requests.swapchain_min_images = info.min_image_count;
            requests.swapchain_format = Some((info.image_format, info.image_color_space));
            requests.swapchain_present_mode = Some(info.present_mode);
            requests.swapchain_extent = info.image_extent;
        }
        if self.fails(FailAt::Swapchain) {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        Ok(self.handle())
    }

    fn swapchain_images(&self, _swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        Ok((0..self.swapchain_image_count).map(|_| self.handle()).collect())
    }

    fn create_image_view(&self, _info: &vk::ImageViewCreateInfo) -> VkResult<vk::ImageView> {
        self.record(Call::CreateImageView);
        let index = self.image_views_created.get();
        self.image_views_created.set(index + 1);
        if self.fails(FailAt::ImageView(index)) {
            return Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        }
        Ok(self.handle())
    }

    fn create_render_pass(&self, _info: &vk::RenderPassCreateInfo) -> VkResult<vk::RenderPass> {
        self.record(Call::CreateRenderPass);
        if self.fails(FailAt::RenderPass) {
            return Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        }
        Ok(self.handle())
    }

    fn create_shader_module(&self, _code: &[u32]) -> VkResult<vk::ShaderModule> {
        self.record(Call::CreateShaderModule);
        let index = self.shader_modules_created.get();
        self.shader_modules_created.set(index + 1);
        if self.fails(FailAt::ShaderModule(index)) {
            return Err(vk::Result::ERROR_INVALID_SHADER_NV);
        }
        Ok(self.handle())
    }

    fn create_pipeline_layout(
        &self,
        _info: &vk::PipelineLayoutCreateInfo,
    ) -> VkResult<vk::PipelineLayout> {
        self.record(Call::CreatePipelineLayout);
        if self.fails(FailAt::PipelineLayout) {
            return Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        }
        Ok(self.handle())
    }

    fn create_graphics_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo,
    ) -> VkResult<vk::Pipeline> {
        self.record(Call::CreatePipeline);
        {
            let mut requests = self.requests.borrow_mut();
            requests.pipeline_stage_count = info.stage_count;
            unsafe {
                let dynamic = &*info.p_dynamic_state;
                requests.pipeline_dynamic_states = std::slice::from_raw_parts(
                    dynamic.p_dynamic_states,
                    dynamic.dynamic_state_count as usize,
                )
                .to_vec();
                let raster = &*info.p_rasterization_state;
                requests.pipeline_front_face = Some(raster.front_face);
                requests.pipeline_cull_mode = Some(raster.cull_mode);
                requests.pipeline_vertex_attributes =
                    (*info.p_vertex_input_state).vertex_attribute_description_count;
            }
        }
        if self.fails(FailAt::Pipeline) {
            return Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        }
        Ok(self.handle())
    }

    fn wait_idle(&self) -> VkResult<()> {
        Ok(())
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.record(Call::DestroyPipeline(pipeline));
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.record(Call::DestroyPipelineLayout(layout));
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.record(Call::DestroyShaderModule(module));
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.record(Call::DestroyRenderPass(render_pass));
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.record(Call::DestroyImageView(view));
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        self.record(Call::DestroySwapchain(swapchain));
    }

    fn destroy_device(&mut self) {
        self.record(Call::DestroyDevice);
    }

    fn destroy_debug_messenger(&self, messenger: vk::DebugUtilsMessengerEXT) {
        self.record(Call::DestroyDebugMessenger(messenger));
    }

    fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        self.record(Call::DestroySurface(surface));
    }

    fn destroy_instance(&mut self) {
        self.record(Call::DestroyInstance);
    }
}
