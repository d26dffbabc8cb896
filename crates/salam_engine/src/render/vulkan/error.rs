//! Vulkan error types

use ash::vk;
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Vulkan object creation or setup failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// The surface reports no formats at all
    #[error("Surface reports no supported formats")]
    NoSurfaceFormats,

    /// The selected queue family cannot present to the surface
    #[error("Queue family {queue_family} cannot present to the window surface")]
    PresentationUnsupported {
        /// Index of the selected queue family
        queue_family: u32,
    },

    /// An extension or layer name contained an interior NUL byte
    #[error("Invalid extension name: {0:?}")]
    ExtensionNameInvalid(String),
}

impl From<vk::Result> for VulkanError {
    fn from(result: vk::Result) -> Self {
        Self::Api(result)
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;
