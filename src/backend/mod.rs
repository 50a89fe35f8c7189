// Backend module - Vulkan bootstrap and rendering
//
// Design: every GPU call goes through the `Driver` trait so the bootstrap
// sequence can run against a recording mock in tests.

pub mod buffer;
pub mod context;
pub mod device;
pub mod driver;
pub mod error;
pub mod frame;
pub mod instance;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod vulkan;

#[cfg(test)]
pub(crate) mod mock;

pub use context::{BootstrapSettings, GraphicsContext};
pub use frame::FrameRenderer;
pub use pipeline::VertexInputLayout;
pub use shader::ShaderSet;
pub use vulkan::VulkanDriver;
