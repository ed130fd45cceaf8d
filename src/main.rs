// =============================================================================
// VULKAN BOOTSTRAP - Window, device, swapchain and a cleared screen
// =============================================================================
//
// The smallest complete Vulkan program: bring the API up against a window,
// clear every swapchain image to one color and present until the window is
// closed.
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  PlatformManager (windowing backend: winit or headless)         │
// │    └── WindowManager (the one window)                           │
// │          └── Renderer                                           │
// │                ├── Instance + Surface                           │
// │                ├── PhysicalDevice (first GPU) + Device/Queues   │
// │                ├── Swapchain + ImageViews                       │
// │                └── CommandPool (one clear buffer per image)     │
// └─────────────────────────────────────────────────────────────────┘
//
// FRAME FLOW:
// 1. Acquire swapchain image
// 2. Submit the buffer recorded for that image
// 3. Present the image
// 4. Poll window events, stop once the window asks to close
//
// =============================================================================

mod app;
mod backend;
mod config;
mod error;
mod platform;
mod renderer;

use anyhow::{Context, Result};
use backend::{AshBackend, SharedBackend};
use config::Config;
use platform::PlatformManager;
use std::sync::Arc;

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from config.toml
    let config = Config::load();

    // Initialize logging
    init_logging(&config);
    log::info!("Starting vulkan-bootstrap");
    log::info!(
        "Window: {}x{} '{}', api: {:?}, platform: {:?}",
        config.window.width,
        config.window.height,
        config.window.title,
        config.graphics.api,
        config.platform.backend
    );

    let mut platform = PlatformManager::init(config.platform.create_factory())
        .context("Failed to initialize platform")?;

    let result = app::run(&mut platform, &config, || {
        let backend: SharedBackend = Arc::new(AshBackend::load()?);
        Ok(backend)
    });

    // Window is gone by now; the platform goes last
    platform.release();

    let frames = result.context("Renderer failed")?;
    log::info!("Rendered {} frame(s), exiting", frames);

    Ok(())
}

fn init_logging(config: &Config) {
    use env_logger::Builder;

    // RUST_LOG still overrides the configured default
    let mut builder = Builder::new();
    builder.filter_level(config.log_level());
    builder.parse_default_env();
    builder.init();
}
