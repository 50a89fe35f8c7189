// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// This module handles loading and parsing configuration from config.toml.
// Provides sensible defaults if config file is missing or has errors.
// A few keys can be overridden from the command line (see `apply_arguments`).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::args::Arguments;
use crate::backend::VertexInputLayout;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub shaders: ShaderConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Laz Engine".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub clear_color: [f32; 4],
    pub max_frames_in_flight: usize,
    pub vertex_input: VertexInputLayout,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            max_frames_in_flight: 2,
            vertex_input: VertexInputLayout::None,
        }
    }
}

/// SPIR-V locations for the triangle pipeline.
/// Without `vertex`, the shader matching `graphics.vertex_input` is used.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub vertex: Option<PathBuf>,
    pub fragment: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex: None,
            fragment: PathBuf::from("shaders/triangle.frag.spv"),
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Request validation layers and the debug messenger
    pub validation: bool,
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation: cfg!(debug_assertions),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults on error
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        Self::load_from_path(path).unwrap_or_else(|e| {
            log::warn!("Failed to load {:?}: {:#}. Using defaults.", path, e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Command-line values take precedence over the file
    pub fn apply_arguments(&mut self, args: &Arguments) {
        if let Some(validation) = args.flag("validation") {
            self.debug.validation = validation;
        }
        if let Some(level) = args.get("log") {
            self.debug.log_level = level.to_string();
        }
    }

    pub fn vertex_shader(&self) -> PathBuf {
        self.shaders.vertex.clone().unwrap_or_else(|| {
            PathBuf::from(self.graphics.vertex_input.default_vertex_shader())
        })
    }

    /// `debug.log_level` as a filter, `Info` if unparseable
    pub fn log_level(&self) -> log::LevelFilter {
        self.debug.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}
