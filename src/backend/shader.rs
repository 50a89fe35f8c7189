// Shader module loading and management
//
// Vulkan consumes SPIR-V as 4-byte words. Bytecode arrives as bytes, gets
// zero-padded to a word boundary, checked for the SPIR-V magic number and
// wrapped in a module that lives only as long as the pipeline-builder call
// that needs it.

use anyhow::{Context, Result};
use ash::vk;
use std::fmt;
use std::io::Cursor;
use std::path::Path;

use super::driver::Driver;
use super::error::{BootstrapError, BootstrapResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn flags(self) -> vk::ShaderStageFlags {
        match self {
            Self::Vertex => vk::ShaderStageFlags::VERTEX,
            Self::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// Compiled SPIR-V words in host byte order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBytecode {
    words: Vec<u32>,
}

impl ShaderBytecode {
    /// Zero-pad `bytes` to whole words and read them as SPIR-V.
    /// Fails without the magic number (either byte order) up front.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut padded = bytes.to_vec();
        padded.resize(bytes.len().next_multiple_of(4), 0);

        let words = ash::util::read_spv(&mut Cursor::new(padded.as_slice()))
            .context("Invalid SPIR-V bytecode")?;
        Ok(Self { words })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read shader bytecode: {:?}", path))?;

        log::debug!("Loaded {} bytes of SPIR-V from {:?}", bytes.len(), path);
        Self::from_bytes(&bytes).with_context(|| format!("Failed to load shader: {:?}", path))
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }
}

/// The vertex/fragment pair a pipeline is built from
#[derive(Debug, Clone)]
pub struct ShaderSet {
    pub vertex: ShaderBytecode,
    pub fragment: ShaderBytecode,
}

impl ShaderSet {
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(vertex: P, fragment: Q) -> Result<Self> {
        Ok(Self {
            vertex: ShaderBytecode::load(vertex)?,
            fragment: ShaderBytecode::load(fragment)?,
        })
    }
}

/// A shader module destroyed when the guard goes out of scope
pub struct ScopedShaderModule<'a, D: Driver> {
    driver: &'a D,
    module: vk::ShaderModule,
    stage: ShaderStage,
}

impl<'a, D: Driver> ScopedShaderModule<'a, D> {
    pub fn new(
        driver: &'a D,
        stage: ShaderStage,
        code: &ShaderBytecode,
    ) -> BootstrapResult<Self> {
        let module = driver
            .create_shader_module(code.words())
            .map_err(|result| BootstrapError::ShaderModuleCreation { stage, result })?;

        Ok(Self {
            driver,
            module,
            stage,
        })
    }

    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }
}

impl<D: Driver> Drop for ScopedShaderModule<'_, D> {
    fn drop(&mut self) {
        self.driver.destroy_shader_module(self.module);
    }
}
