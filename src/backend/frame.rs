// Frame rendering
//
// Per-frame work on top of a bootstrapped context: framebuffers and a
// present semaphore for each swapchain image, a command buffer and a sync set
// per frame in flight, and the acquire -> record -> submit -> present loop.
//
// FRAME TIMELINE:
//   wait fence -> acquire image -> reset fence -> record -> submit -> present
//
// The window is fixed-size, so an out-of-date swapchain is logged and the
// frame skipped rather than recreated. Only the first occurrence is a warning.

use anyhow::{Context, Result};
use ash::prelude::VkResult;
use ash::vk;

use super::buffer::VertexBuffer;
use super::context::GraphicsContext;
use super::pipeline::{triangle_vertices, VertexInputLayout};
use super::sync::{create_semaphore, FrameSlots, FrameSync};
use super::vulkan::VulkanDriver;

/// Swapchain results that are not errors but still need reporting
#[derive(Debug, Default)]
pub struct SwapchainStatus {
    out_of_date_reported: bool,
}

impl SwapchainStatus {
    /// Which image to render into, or `None` when this frame must be skipped
    pub fn acquired_image(&mut self, result: VkResult<(u32, bool)>) -> VkResult<Option<u32>> {
        match result {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    log::debug!("Swapchain suboptimal for image {}", index);
                }
                Ok(Some(index))
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::log!(self.out_of_date_level(), "Swapchain out of date, skipping frame");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn presented(&mut self, result: VkResult<bool>) -> VkResult<()> {
        match result {
            Ok(false) => Ok(()),
            Ok(true) => {
                log::debug!("Swapchain suboptimal at present");
                Ok(())
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::log!(self.out_of_date_level(), "Swapchain out of date at present");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// The swapchain is never recreated, so out-of-date persists: warn once
    fn out_of_date_level(&mut self) -> log::Level {
        if std::mem::replace(&mut self.out_of_date_reported, true) {
            log::Level::Debug
        } else {
            log::Level::Warn
        }
    }
}

/// Viewport covering the whole extent
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

pub fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

pub struct FrameRenderer {
    framebuffers: Vec<vk::Framebuffer>,
    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    frame_sync: Vec<FrameSync>,
    /// Signaled by the submit, waited on by present; one per swapchain image
    render_finished: Vec<vk::Semaphore>,
    slots: FrameSlots,
    status: SwapchainStatus,
    vertex_buffer: Option<VertexBuffer>,
    clear_color: [f32; 4],
    wait_stages: [vk::PipelineStageFlags; 1],
}

impl FrameRenderer {
    pub fn new(
        context: &GraphicsContext<VulkanDriver>,
        clear_color: [f32; 4],
        max_frames_in_flight: usize,
    ) -> Result<Self> {
        let device = context
            .driver()
            .device()
            .context("Device not initialized")?;
        let selected = context
            .physical_device()
            .context("Physical device not selected")?;
        let render_pass = context.render_pass().context("Render pass not initialized")?;
        let extent = context.swapchain_extent();
        let slots = FrameSlots::new(max_frames_in_flight, context.image_views().len());

        let mut renderer = Self {
            framebuffers: Vec::with_capacity(slots.images()),
            command_pool: vk::CommandPool::null(),
            command_buffers: Vec::new(),
            frame_sync: Vec::with_capacity(slots.frames()),
            render_finished: Vec::with_capacity(slots.images()),
            slots,
            status: SwapchainStatus::default(),
            vertex_buffer: None,
            clear_color,
            wait_stages: [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
        };

        // On failure, release whatever was created so far
        if let Err(e) = renderer.create_resources(
            device,
            context.image_views(),
            render_pass,
            extent,
            selected.families.graphics,
        ) {
            renderer.destroy(device);
            return Err(e);
        }

        if context.vertex_layout() == VertexInputLayout::Interleaved {
            let uploaded = context
                .driver()
                .memory_properties(selected.handle)
                .context("Instance not initialized")
                .and_then(|memory| VertexBuffer::new(device, &memory, &triangle_vertices()));
            match uploaded {
                Ok(vertex_buffer) => renderer.vertex_buffer = Some(vertex_buffer),
                Err(e) => {
                    renderer.destroy(device);
                    return Err(e.context("Failed to create vertex buffer"));
                }
            }
        }

        log::info!(
            "Frame renderer ready on {}: {} framebuffers, {} frames in flight, {:?} vertex input",
            selected.info.name,
            renderer.framebuffers.len(),
            renderer.slots.frames(),
            context.vertex_layout()
        );
        Ok(renderer)
    }

    fn create_resources(
        &mut self,
        device: &ash::Device,
        views: &[vk::ImageView],
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
        graphics_family: u32,
    ) -> Result<()> {
        let frames = self.slots.frames();

        for &view in views {
            let attachments = [view];
            let framebuffer_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            let framebuffer = unsafe { device.create_framebuffer(&framebuffer_info, None) }
                .context("Failed to create framebuffer")?;
            self.framebuffers.push(framebuffer);
        }

        // Command buffers are re-recorded every frame
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(graphics_family);
        self.command_pool = unsafe { device.create_command_pool(&pool_info, None) }
            .context("Failed to create command pool")?;

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(frames as u32);
        self.command_buffers = unsafe { device.allocate_command_buffers(&alloc_info) }
            .context("Failed to allocate command buffers")?;

        for _ in 0..frames {
            let sync = FrameSync::new(device).context("Failed to create frame sync objects")?;
            self.frame_sync.push(sync);
        }

        for _ in 0..self.slots.images() {
            let semaphore =
                create_semaphore(device).context("Failed to create present semaphore")?;
            self.render_finished.push(semaphore);
        }

        Ok(())
    }

    /// Render one frame. Returns `false` when the frame was skipped.
    pub fn draw_frame(&mut self, context: &GraphicsContext<VulkanDriver>) -> Result<bool> {
        let driver = context.driver();
        let device = driver.device().context("Device not initialized")?;
        let swapchain_loader = driver
            .swapchain_loader()
            .context("Swapchain loader not initialized")?;
        let queues = context.device().context("Device not initialized")?;
        let swapchain = context.swapchain().context("Swapchain not initialized")?;
        let frame = self.slots.current();
        let sync = &self.frame_sync[frame];

        unsafe {
            device
                .wait_for_fences(&[sync.in_flight_fence], true, u64::MAX)
                .context("Failed to wait for in-flight fence")?;
        }

        let acquire = unsafe {
            swapchain_loader.acquire_next_image(
                swapchain,
                u64::MAX,
                sync.image_available,
                vk::Fence::null(),
            )
        };
        let image_index = match self
            .status
            .acquired_image(acquire)
            .context("Failed to acquire image")?
        {
            Some(index) => index,
            None => return Ok(false),
        };
        let render_finished = self
            .slots
            .present_slot(image_index)
            .map(|slot| self.render_finished[slot])
            .context("Acquired image has no present semaphore")?;

        // Only reset once work is guaranteed to be submitted
        unsafe {
            device
                .reset_fences(&[sync.in_flight_fence])
                .context("Failed to reset fence")?;
        }

        let cmd = self.command_buffers[frame];
        self.record(context, device, cmd, image_index as usize)?;

        let wait_semaphores = [sync.image_available];
        let signal_semaphores = [render_finished];
        let command_buffers = [cmd];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&self.wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            device
                .queue_submit(queues.graphics_queue, &[submit_info.build()], sync.in_flight_fence)
                .context("Failed to submit draw command buffer")?;
        }

        let swapchains = [swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let presented = unsafe { swapchain_loader.queue_present(queues.present_queue, &present_info) };
        self.status
            .presented(presented)
            .context("Failed to present image")?;

        self.slots.advance();
        Ok(true)
    }

    fn record(
        &self,
        context: &GraphicsContext<VulkanDriver>,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        image_index: usize,
    ) -> Result<()> {
        let render_pass = context.render_pass().context("Render pass not initialized")?;
        let pipeline = context.pipeline().context("Pipeline not initialized")?;
        let framebuffer = *self
            .framebuffers
            .get(image_index)
            .context("Acquired image has no framebuffer")?;
        let extent = context.swapchain_extent();

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.clear_color,
            },
        }];

        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(full_scissor(extent))
            .clear_values(&clear_values);

        unsafe {
            device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;

            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device.begin_command_buffer(cmd, &begin_info)?;

            device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline);
            device.cmd_set_viewport(cmd, 0, &[full_viewport(extent)]);
            device.cmd_set_scissor(cmd, 0, &[full_scissor(extent)]);
            match &self.vertex_buffer {
                Some(vertices) => {
                    device.cmd_bind_vertex_buffers(cmd, 0, &[vertices.buffer], &[0]);
                    device.cmd_draw(cmd, vertices.vertex_count, 1, 0, 0);
                }
                None => device.cmd_draw(cmd, 3, 1, 0, 0),
            }
            device.cmd_end_render_pass(cmd);

            device.end_command_buffer(cmd)?;
        }

        Ok(())
    }

    /// Release everything. The caller must make sure the GPU is idle.
    pub fn destroy(&mut self, device: &ash::Device) {
        if let Some(vertex_buffer) = self.vertex_buffer.take() {
            vertex_buffer.destroy(device);
        }

        unsafe {
            for semaphore in self.render_finished.drain(..) {
                device.destroy_semaphore(semaphore, None);
            }
            for sync in self.frame_sync.drain(..) {
                sync.destroy(device);
            }

            // Also frees the command buffers
            if self.command_pool != vk::CommandPool::null() {
                device.destroy_command_pool(self.command_pool, None);
                self.command_pool = vk::CommandPool::null();
            }
            self.command_buffers.clear();

            for framebuffer in self.framebuffers.drain(..) {
                device.destroy_framebuffer(framebuffer, None);
            }
        }
    }
}
