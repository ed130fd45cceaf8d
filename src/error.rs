// Error types for the bootstrap sequence
//
// Every initialization stage maps its failure to its own variant so callers
// can tell a missing GPU apart from a rejected swapchain.

use ash::vk;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Windowing backend or window creation failed
    #[error("Platform initialization failed: {0}")]
    PlatformInit(String),

    /// The native window belongs to a window system we cannot build a surface for
    #[error("Unsupported window system: {0}")]
    UnsupportedWindowSystem(&'static str),

    /// The Vulkan loader could not be found
    #[error("Failed to load Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("Instance creation failed: {0}")]
    InstanceCreation(vk::Result),

    #[error("Surface creation failed: {0}")]
    SurfaceCreation(vk::Result),

    /// No physical device, or the required queue families are missing
    #[error("Device selection failed: {0}")]
    DeviceSelection(String),

    #[error("Device creation failed: {0}")]
    DeviceCreation(vk::Result),

    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(vk::Result),

    /// Command pool creation, allocation or recording failed
    #[error("Command setup failed: {0}")]
    CommandSetup(vk::Result),

    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),
}

pub type Result<T> = std::result::Result<T, Error>;
