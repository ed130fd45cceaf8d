// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// This module handles loading and parsing configuration from config.toml.
// Provides sensible defaults if config file is missing or has errors.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::platform::{headless::HeadlessPlatform, desktop::DesktopPlatform, PlatformFactory};

/// Root configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub platform: PlatformConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Skip the implicit rendering context (required before creating a Vulkan surface)
    pub no_api: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "vulkan-bootstrap".to_string(),
            width: 800,
            height: 600,
            no_api: false,
        }
    }
}

/// Which graphics API drives the frame loop
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GraphicsApi {
    /// Window only: present + poll until closed
    None,
    #[default]
    Vulkan,
}

/// Graphics settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GraphicsConfig {
    pub api: GraphicsApi,
    pub clear_color: [f32; 4],
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            api: GraphicsApi::Vulkan,
            clear_color: [0.5, 0.5, 0.5, 1.0],
        }
    }
}

/// Windowing backends we can build a platform from
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlatformBackend {
    #[default]
    Winit,
    /// Scripted backend that asks to close after a fixed number of polls
    Headless,
}

/// Platform settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PlatformConfig {
    pub backend: PlatformBackend,
    pub headless_frames: u32,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            backend: PlatformBackend::Winit,
            headless_frames: 3,
        }
    }
}

impl PlatformConfig {
    /// Build the platform factory selected by this configuration
    pub fn create_factory(&self) -> Box<dyn PlatformFactory> {
        match self.backend {
            PlatformBackend::Winit => Box::new(DesktopPlatform::new()),
            PlatformBackend::Headless => Box::new(HeadlessPlatform::new(self.headless_frames)),
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: false,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {}. Using defaults.", e);
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

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Window settings as the graphics path needs them.
    ///
    /// Vulkan draws through its own surface, so the implicit context is
    /// always skipped on that path.
    pub fn window_for_api(&self) -> WindowConfig {
        let mut window = self.window.clone();
        if self.graphics.api == GraphicsApi::Vulkan {
            window.no_api = true;
        }
        window
    }

    /// Log filter derived from the debug section
    pub fn log_level(&self) -> log::LevelFilter {
        self.debug.log_level.parse().unwrap_or_else(|_| {
            log::warn!("Unknown log level '{}', defaulting to info", self.debug.log_level);
            log::LevelFilter::Info
        })
    }
}
