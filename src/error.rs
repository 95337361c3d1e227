use std::fmt;

use ash::vk;
use thiserror::Error;

/// The construction stage a fatal error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    Instance,
    Surface,
    DeviceSelection,
    LogicalDevice,
    Allocator,
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InitStage::Instance => "instance",
            InitStage::Surface => "surface",
            InitStage::DeviceSelection => "device selection",
            InitStage::LogicalDevice => "logical device",
            InitStage::Allocator => "allocator",
        };
        f.write_str(name)
    }
}

/// Fatal device initialization errors. Every variant terminates construction.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("instance: unable to find Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("instance: could not create a Vulkan instance with any supported API version: {0}")]
    InstanceCreation(vk::Result),

    #[error("instance: name contains an interior NUL: {0}")]
    InvalidName(#[from] std::ffi::NulError),

    #[error("instance: could not create debug messenger: {0}")]
    DebugMessenger(vk::Result),

    #[error("surface: could not obtain a window handle: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),

    #[error("surface: could not query platform extensions: {0}")]
    PlatformExtensions(vk::Result),

    #[error("surface: could not create Vulkan surface: {0}")]
    SurfaceCreation(vk::Result),

    #[error("device selection: could not enumerate physical devices: {0}")]
    Enumeration(vk::Result),

    #[error(
        "device selection: no Vulkan devices found. Either the graphics card has no \
         Vulkan support or the driver is too old"
    )]
    NoDevices,

    #[error("device selection: no Vulkan device supports the minimum requirements of this application")]
    NoCompatibleDevices,

    #[error("device selection: no Vulkan device provides graphics, present and upload queues")]
    NoQueueRoles,

    #[error("logical device: could not create Vulkan device: {0}")]
    DeviceCreation(vk::Result),

    #[error(
        "logical device: failed to create background upload queue {index}. \
         Check the upload thread setting"
    )]
    MissingUploadQueue { index: usize },

    #[error("logical device: no memory type matches filter {type_filter:#x} with {properties:?}")]
    NoMemoryType {
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    },

    #[error("allocator: unable to create allocator: {0}")]
    Allocator(#[from] gpu_allocator::AllocationError),
}

impl InitError {
    pub fn stage(&self) -> InitStage {
        match self {
            InitError::Loading(_)
            | InitError::InstanceCreation(_)
            | InitError::InvalidName(_)
            | InitError::DebugMessenger(_) => InitStage::Instance,
            InitError::WindowHandle(_)
            | InitError::PlatformExtensions(_)
            | InitError::SurfaceCreation(_) => InitStage::Surface,
            InitError::Enumeration(_)
            | InitError::NoDevices
            | InitError::NoCompatibleDevices
            | InitError::NoQueueRoles => InitStage::DeviceSelection,
            InitError::DeviceCreation(_)
            | InitError::MissingUploadQueue { .. }
            | InitError::NoMemoryType { .. } => InitStage::LogicalDevice,
            InitError::Allocator(_) => InitStage::Allocator,
        }
    }
}
