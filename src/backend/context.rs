// Graphics context - owns every handle the bootstrap creates
//
// Lifecycle is a strict stack:
//   instance -> messenger -> surface -> device -> swapchain -> views
//   -> render pass -> pipeline layout -> pipeline
// `bootstrap` fills it bottom-up, `teardown` empties it top-down. Every slot
// is optional so a partially built context tears down just as cleanly as a
// complete one.

use ash::vk;

use super::device::{create_logical_device, pick_physical_device, LogicalDevice, SelectedDevice};
use super::driver::Driver;
use super::error::BootstrapResult;
use super::instance::{create_instance, enabled_layers, setup_debug_messenger};
use super::pipeline::{create_graphics_pipeline, create_render_pass, VertexInputLayout};
use super::shader::ShaderSet;
use super::surface::{create_surface, WindowTarget};
use super::swapchain::{create_image_views, create_swapchain};

/// Knobs the bootstrap sequence reads
#[derive(Debug, Clone, Copy, Default)]
pub struct BootstrapSettings {
    pub diagnostics: bool,
    pub vertex_layout: VertexInputLayout,
}

pub struct GraphicsContext<D: Driver> {
    driver: D,
    instance: Option<vk::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    surface: Option<vk::SurfaceKHR>,
    physical_device: Option<SelectedDevice>,
    device: Option<LogicalDevice>,
    swapchain: Option<vk::SwapchainKHR>,
    swapchain_images: Vec<vk::Image>,
    swapchain_image_views: Vec<vk::ImageView>,
    swapchain_format: vk::Format,
    swapchain_extent: vk::Extent2D,
    render_pass: Option<vk::RenderPass>,
    pipeline_layout: Option<vk::PipelineLayout>,
    pipeline: Option<vk::Pipeline>,
    vertex_layout: VertexInputLayout,
}

impl<D: Driver> GraphicsContext<D> {
    /// An empty context; nothing is created until `bootstrap`
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            instance: None,
            debug_messenger: None,
            surface: None,
            physical_device: None,
            device: None,
            swapchain: None,
            swapchain_images: Vec::new(),
            swapchain_image_views: Vec::new(),
            swapchain_format: vk::Format::UNDEFINED,
            swapchain_extent: vk::Extent2D::default(),
            render_pass: None,
            pipeline_layout: None,
            pipeline: None,
            vertex_layout: VertexInputLayout::None,
        }
    }

    /// Run the full init sequence against `window`.
    ///
    /// Stops at the first failing step. Whatever was created before it stays
    /// in the context and is released by `teardown`.
    pub fn bootstrap<W: WindowTarget>(
        &mut self,
        window: &W,
        shaders: &ShaderSet,
        settings: BootstrapSettings,
    ) -> BootstrapResult<()> {
        if self.instance.is_some() {
            log::warn!("Context already bootstrapped; tearing down first");
            self.teardown();
        }

        let diagnostics = settings.diagnostics;

        let instance = create_instance(&mut self.driver, window.display_handle(), diagnostics)?;
        self.instance = Some(instance);

        self.debug_messenger = setup_debug_messenger(&self.driver, diagnostics)?;

        let surface = create_surface(&self.driver, window)?;
        self.surface = Some(surface);

        let selected = pick_physical_device(&self.driver, surface)?;
        self.physical_device = Some(selected.clone());
        let device = create_logical_device(&mut self.driver, &selected, enabled_layers(diagnostics))?;
        self.device = Some(device);

        let swapchain = create_swapchain(
            &self.driver,
            selected.handle,
            surface,
            selected.families,
            window.framebuffer_size(),
        )?;
        self.swapchain = Some(swapchain.handle);
        self.swapchain_images = swapchain.images;
        self.swapchain_format = swapchain.format;
        self.swapchain_extent = swapchain.extent;

        create_image_views(
            &self.driver,
            &self.swapchain_images,
            self.swapchain_format,
            &mut self.swapchain_image_views,
        )?;

        let render_pass = create_render_pass(&self.driver, self.swapchain_format)?;
        self.render_pass = Some(render_pass);

        let pipeline = create_graphics_pipeline(
            &self.driver,
            render_pass,
            self.swapchain_extent,
            shaders,
            settings.vertex_layout,
        )?;
        self.pipeline_layout = Some(pipeline.layout);
        self.pipeline = Some(pipeline.pipeline);
        self.vertex_layout = settings.vertex_layout;

        log::info!("Graphics context ready");
        Ok(())
    }

    /// Destroy everything in reverse creation order. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if self.instance.is_none() {
            return;
        }

        if self.device.is_some() {
            if let Err(e) = self.driver.wait_idle() {
                log::warn!("Device wait idle failed during teardown: {}", e);
            }
        }

        if let Some(pipeline) = self.pipeline.take() {
            self.driver.destroy_pipeline(pipeline);
        }
        if let Some(layout) = self.pipeline_layout.take() {
            self.driver.destroy_pipeline_layout(layout);
        }
        if let Some(render_pass) = self.render_pass.take() {
            self.driver.destroy_render_pass(render_pass);
        }
        for view in self.swapchain_image_views.drain(..) {
            self.driver.destroy_image_view(view);
        }
        // Images belong to the swapchain
        self.swapchain_images.clear();
        if let Some(swapchain) = self.swapchain.take() {
            self.driver.destroy_swapchain(swapchain);
        }
        if self.device.take().is_some() {
            self.driver.destroy_device();
        }
        self.physical_device = None;
        if let Some(messenger) = self.debug_messenger.take() {
            self.driver.destroy_debug_messenger(messenger);
        }
        if let Some(surface) = self.surface.take() {
            self.driver.destroy_surface(surface);
        }
        if self.instance.take().is_some() {
            self.driver.destroy_instance();
        }

        log::info!("Graphics context destroyed");
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn physical_device(&self) -> Option<&SelectedDevice> {
        self.physical_device.as_ref()
    }

    pub fn device(&self) -> Option<LogicalDevice> {
        self.device
    }

    pub fn swapchain(&self) -> Option<vk::SwapchainKHR> {
        self.swapchain
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.swapchain_image_views
    }

    pub fn swapchain_extent(&self) -> vk::Extent2D {
        self.swapchain_extent
    }

    pub fn render_pass(&self) -> Option<vk::RenderPass> {
        self.render_pass
    }

    pub fn pipeline(&self) -> Option<vk::Pipeline> {
        self.pipeline
    }

    /// Vertex input the pipeline was built for
    pub fn vertex_layout(&self) -> VertexInputLayout {
        self.vertex_layout
    }
}

impl<D: Driver> Drop for GraphicsContext<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}
