// Driver seam
//
// Every Vulkan call the bootstrap sequence makes goes through this trait.
// `VulkanDriver` forwards to ash; the unit tests swap in a recording mock so
// the init order, the failure paths and teardown can run without a GPU.
//
// Create-info structs are built by the callers and passed by reference, so
// the driver never has to know what a swapchain or a pipeline should look
// like. It only owns the loaders that ash needs to make the calls.

use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

/// Facts about a physical device used during selection and logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub api_version: u32,
}

pub trait Driver {
    // ── Instance scope ────────────────────────────────────────────────────

    /// Instance extensions the window system needs for presentation
    fn surface_extensions(&self, display: RawDisplayHandle) -> VkResult<Vec<String>>;

    fn instance_layers(&self) -> VkResult<Vec<String>>;

    fn create_instance(&mut self, info: &vk::InstanceCreateInfo) -> VkResult<vk::Instance>;

    fn create_debug_messenger(
        &self,
        info: &vk::DebugUtilsMessengerCreateInfoEXT,
    ) -> VkResult<vk::DebugUtilsMessengerEXT>;

    fn create_surface(
        &self,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR>;

    // ── Physical device queries ───────────────────────────────────────────

    fn physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>>;

    fn device_info(&self, device: vk::PhysicalDevice) -> DeviceInfo;

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties>;

    fn surface_support(
        &self,
        device: vk::PhysicalDevice,
        family: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool>;

    fn device_extensions(&self, device: vk::PhysicalDevice) -> VkResult<Vec<String>>;

    fn surface_capabilities(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR>;

    fn surface_formats(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>>;

    fn present_modes(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>>;

    // ── Device scope ──────────────────────────────────────────────────────

    fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        info: &vk::DeviceCreateInfo,
    ) -> VkResult<vk::Device>;

    fn device_queue(&self, family: u32, index: u32) -> vk::Queue;

    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR) -> VkResult<vk::SwapchainKHR>;

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo) -> VkResult<vk::ImageView>;

    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo) -> VkResult<vk::RenderPass>;

    fn create_shader_module(&self, code: &[u32]) -> VkResult<vk::ShaderModule>;

    fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo,
    ) -> VkResult<vk::PipelineLayout>;

    fn create_graphics_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo,
    ) -> VkResult<vk::Pipeline>;

    fn wait_idle(&self) -> VkResult<()>;

    // ── Destruction ───────────────────────────────────────────────────────

    fn destroy_pipeline(&self, pipeline: vk::Pipeline);
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);
    fn destroy_shader_module(&self, module: vk::ShaderModule);
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);
    fn destroy_image_view(&self, view: vk::ImageView);
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);
    fn destroy_device(&mut self);
    fn destroy_debug_messenger(&self, messenger: vk::DebugUtilsMessengerEXT);
    fn destroy_surface(&self, surface: vk::SurfaceKHR);
    fn destroy_instance(&mut self);
}
