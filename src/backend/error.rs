// Bootstrap errors
//
// One variant per failure site of the init sequence. Each maps to its own
// process exit code so a failing run can be told apart from the shell.

use ash::vk;
use thiserror::Error;

use super::shader::ShaderStage;

/// Terminal failures of the Vulkan bootstrap sequence
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    #[error("Vulkan loader unavailable: {0}")]
    LoaderUnavailable(String),

    #[error("validation layer {0} requested but not available")]
    MissingValidationLayer(String),

    #[error("failed to create Vulkan instance: {0}")]
    InstanceCreation(vk::Result),

    #[error("failed to register debug messenger: {0}")]
    DebugMessenger(vk::Result),

    #[error("failed to create window surface: {0}")]
    SurfaceCreation(vk::Result),

    #[error("no GPU found: no Vulkan physical devices")]
    NoPhysicalDevice,

    #[error("no GPU found: none of {0} physical devices is suitable")]
    NoSuitableDevice(usize),

    #[error("failed to create logical device: {0}")]
    DeviceCreation(vk::Result),

    #[error("failed to create swapchain: {0}")]
    SwapchainCreation(vk::Result),

    #[error("failed to create image view for swapchain image {index}: {result}")]
    ImageViewCreation { index: usize, result: vk::Result },

    #[error("failed to create render pass: {0}")]
    RenderPassCreation(vk::Result),

    #[error("failed to create {stage} shader module: {result}")]
    ShaderModuleCreation { stage: ShaderStage, result: vk::Result },

    #[error("failed to create pipeline layout: {0}")]
    PipelineLayoutCreation(vk::Result),

    #[error("failed to create graphics pipeline: {0}")]
    PipelineCreation(vk::Result),
}

impl BootstrapError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::LoaderUnavailable(_) => 3,
            Self::MissingValidationLayer(_) => 10,
            Self::InstanceCreation(_) => 11,
            Self::DebugMessenger(_) => 12,
            Self::SurfaceCreation(_) => 13,
            Self::NoPhysicalDevice => 14,
            Self::NoSuitableDevice(_) => 15,
            Self::DeviceCreation(_) => 16,
            Self::SwapchainCreation(_) => 17,
            Self::ImageViewCreation { .. } => 18,
            Self::RenderPassCreation(_) => 19,
            Self::ShaderModuleCreation { .. } => 20,
            Self::PipelineLayoutCreation(_) => 21,
            Self::PipelineCreation(_) => 22,
        }
    }
}

pub type BootstrapResult<T> = Result<T, BootstrapError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn exit_codes_are_distinct() {
        let errors = [
            BootstrapError::LoaderUnavailable(String::new()),
            BootstrapError::MissingValidationLayer(String::new()),
            BootstrapError::InstanceCreation(vk::Result::ERROR_INITIALIZATION_FAILED),
            BootstrapError::DebugMessenger(vk::Result::ERROR_EXTENSION_NOT_PRESENT),
            BootstrapError::SurfaceCreation(vk::Result::ERROR_SURFACE_LOST_KHR),
            BootstrapError::NoPhysicalDevice,
            BootstrapError::NoSuitableDevice(2),
            BootstrapError::DeviceCreation(vk::Result::ERROR_DEVICE_LOST),
            BootstrapError::SwapchainCreation(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
            BootstrapError::ImageViewCreation {
                index: 1,
                result: vk::Result::ERROR_OUT_OF_HOST_MEMORY,
            },
            BootstrapError::RenderPassCreation(vk::Result::ERROR_OUT_OF_HOST_MEMORY),
            BootstrapError::ShaderModuleCreation {
                stage: ShaderStage::Fragment,
                result: vk::Result::ERROR_INVALID_SHADER_NV,
            },
            BootstrapError::PipelineLayoutCreation(vk::Result::ERROR_OUT_OF_HOST_MEMORY),
            BootstrapError::PipelineCreation(vk::Result::ERROR_OUT_OF_HOST_MEMORY),
        ];

        let codes: HashSet<u8> = errors.iter().map(BootstrapError::exit_code).collect();
        assert_eq!(codes.len(), errors.len());
        assert!(codes.iter().all(|&code| code > 0));
    }

    #[test]
    fn messages_name_the_failing_stage() {
        let err = BootstrapError::ShaderModuleCreation {
            stage: ShaderStage::Vertex,
            result: vk::Result::ERROR_OUT_OF_HOST_MEMORY,
        };
        assert!(err.to_string().contains("vertex shader module"));
    }
}
