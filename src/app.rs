// Application wiring
//
// Window first, then the graphics path picked by configuration, then the
// window again on the way out. The platform itself belongs to the caller.

use crate::backend::SharedBackend;
use crate::config::{Config, GraphicsApi};
use crate::error::Result;
use crate::platform::{PlatformManager, WindowManager};
use crate::renderer::Renderer;

/// Open the window and drive frames until it closes.
///
/// `load_backend` is only called on the Vulkan path. Returns the number of
/// frames completed. The window is released whether or not the graphics path
/// succeeded.
pub fn run<F>(platform: &mut PlatformManager, config: &Config, load_backend: F) -> Result<u64>
where
    F: FnOnce() -> Result<SharedBackend>,
{
    let mut window = WindowManager::init(platform, &config.window_for_api())?;

    let result = match config.graphics.api {
        GraphicsApi::None => Ok(run_window_only(platform, &window)),
        GraphicsApi::Vulkan => run_vulkan(platform, &window, config, load_backend),
    };

    window.release();
    result
}

fn run_vulkan<F>(platform: &mut PlatformManager, window: &WindowManager, config: &Config, load_backend: F) -> Result<u64>
where
    F: FnOnce() -> Result<SharedBackend>,
{
    let backend = load_backend()?;
    let mut renderer = Renderer::bootstrap(backend, window, config)?;
    let frames = renderer.run(platform, window);
    // GPU objects go before the window
    renderer.teardown();
    Ok(frames)
}

/// Present and poll until close, with no graphics API behind the window
fn run_window_only(platform: &mut PlatformManager, window: &WindowManager) -> u64 {
    log::info!("No graphics API selected, running window loop only");

    let mut frames = 0u64;
    while window.is_active() {
        window.update();
        platform.update();
        frames += 1;
    }
    frames
}
