// Render pass and graphics pipeline creation
//
// The graphics pipeline defines how vertices are processed and rasterized:
// vertex input, shaders, rasterization, blending. Viewport and scissor are
// dynamic so the pipeline survives any swapchain extent.

use ash::vk;
use glam::{Vec2, Vec3};
use serde::Deserialize;
use std::mem::{offset_of, size_of};

use super::driver::Driver;
use super::error::{BootstrapError, BootstrapResult};
use super::shader::{ScopedShaderModule, ShaderSet, ShaderStage};

const SHADER_ENTRY_POINT: &std::ffi::CStr = c"main";

/// Create a render pass with one color attachment presented at the end
pub fn create_render_pass<D: Driver>(
    driver: &D,
    format: vk::Format,
) -> BootstrapResult<vk::RenderPass> {
    // Color attachment (the swapchain image)
    let color_attachment = vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build();

    let color_attachment_ref = vk::AttachmentReference::builder()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        .build();

    let color_attachments = &[color_attachment_ref];
    let subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(color_attachments)
        .build();

    // Wait for the acquired image before writing color
    let dependency = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        .build();

    let attachments = &[color_attachment];
    let subpasses = &[subpass];
    let dependencies = &[dependency];

    let render_pass_info = vk::RenderPassCreateInfo::builder()
        .attachments(attachments)
        .subpasses(subpasses)
        .dependencies(dependencies);

    let render_pass = driver
        .create_render_pass(&render_pass_info)
        .map_err(BootstrapError::RenderPassCreation)?;

    log::info!("Created render pass ({:?})", format);
    Ok(render_pass)
}

/// Interleaved per-vertex data for meshes fed through a vertex buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub tex_coord: Vec2,
    pub normal: Vec3,
}

/// The triangle as vertex data, same positions as the constant shader.
/// Clockwise in framebuffer space, which the pipeline treats as front-facing.
pub fn triangle_vertices() -> [Vertex; 3] {
    let normal = Vec3::Z;
    [
        Vertex {
            position: Vec3::new(0.0, -0.5, 0.0),
            tex_coord: Vec2::new(0.5, 0.0),
            normal,
        },
        Vertex {
            position: Vec3::new(0.5, 0.5, 0.0),
            tex_coord: Vec2::new(1.0, 1.0),
            normal,
        },
        Vertex {
            position: Vec3::new(-0.5, 0.5, 0.0),
            tex_coord: Vec2::new(0.0, 1.0),
            normal,
        },
    ]
}

/// Where vertex attributes come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VertexInputLayout {
    /// Positions are constants in the vertex shader; no bindings
    #[default]
    None,
    /// One binding of interleaved `Vertex` data
    Interleaved,
}

impl VertexInputLayout {
    /// SPIR-V vertex shader whose inputs match this layout
    pub fn default_vertex_shader(self) -> &'static str {
        match self {
            VertexInputLayout::None => "shaders/triangle.vert.spv",
            VertexInputLayout::Interleaved => "shaders/mesh.vert.spv",
        }
    }
}

/// Vertex input description for the given layout
pub fn vertex_input_descriptions(
    layout: VertexInputLayout,
) -> (
    Vec<vk::VertexInputBindingDescription>,
    Vec<vk::VertexInputAttributeDescription>,
) {
    match layout {
        VertexInputLayout::None => (Vec::new(), Vec::new()),
        VertexInputLayout::Interleaved => {
            let binding = vk::VertexInputBindingDescription::builder()
                .binding(0)
                .stride(size_of::<Vertex>() as u32)
                .input_rate(vk::VertexInputRate::VERTEX)
                .build();

            let attribute = |location: u32, format: vk::Format, offset: usize| {
                vk::VertexInputAttributeDescription::builder()
                    .binding(0)
                    .location(location)
                    .format(format)
                    .offset(offset as u32)
                    .build()
            };

            (
                vec![binding],
                vec![
                    attribute(0, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, position)),
                    attribute(1, vk::Format::R32G32_SFLOAT, offset_of!(Vertex, tex_coord)),
                    attribute(2, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, normal)),
                ],
            )
        }
    }
}

/// Pipeline plus the layout it was created with
#[derive(Debug, Clone, Copy)]
pub struct GraphicsPipeline {
    pub layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
}

/// Build the graphics pipeline for `render_pass`.
///
/// Shader modules only live for the duration of this call and are released
/// on every return path.
pub fn create_graphics_pipeline<D: Driver>(
    driver: &D,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    shaders: &ShaderSet,
    vertex_layout: VertexInputLayout,
) -> BootstrapResult<GraphicsPipeline> {
    let vert_module = ScopedShaderModule::new(driver, ShaderStage::Vertex, &shaders.vertex)?;
    let frag_module = ScopedShaderModule::new(driver, ShaderStage::Fragment, &shaders.fragment)?;

    let shader_stages = [&vert_module, &frag_module].map(|module| {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(module.stage().flags())
            .module(module.handle())
            .name(SHADER_ENTRY_POINT)
            .build()
    });

    // Vertex input
    let (bindings, attributes) = vertex_input_descriptions(vertex_layout);
    let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(&bindings)
        .vertex_attribute_descriptions(&attributes);

    // Input assembly
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    // Viewport and scissor are set per frame; these only fill the counts
    let viewports = [vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }];
    let scissors = [vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }];
    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewports(&viewports)
        .scissors(&scissors);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

    // Rasterization
    let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::BACK)
        .front_face(vk::FrontFace::CLOCKWISE)
        .depth_bias_enable(false);

    // Multisampling (disabled)
    let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    // Color blending (no blending, opaque)
    let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(false)
        .build();

    let color_blend_attachments = &[color_blend_attachment];
    let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(false)
        .logic_op(vk::LogicOp::COPY)
        .attachments(color_blend_attachments);

    // No descriptor sets or push constants yet; uniforms go here
    let layout_info = vk::PipelineLayoutCreateInfo::builder();

    let layout = driver
        .create_pipeline_layout(&layout_info)
        .map_err(BootstrapError::PipelineLayoutCreation)?;

    let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_info)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .color_blend_state(&color_blending)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);

    let pipeline = match driver.create_graphics_pipeline(&pipeline_info) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            driver.destroy_pipeline_layout(layout);
            return Err(BootstrapError::PipelineCreation(e));
        }
    };

    log::info!("Created graphics pipeline ({:?} vertex input)", vertex_layout);
    Ok(GraphicsPipeline { layout, pipeline })
}
