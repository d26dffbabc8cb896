//! Vulkan backend
//!
//! Driver instance, presentation support queries, device selection and the
//! surface/swapchain lifecycle.

pub mod device;
pub mod error;
pub mod instance;
pub mod presentation;
pub mod surface;
pub mod swapchain;

pub use device::{
    DeviceSelector, LogicalDevice, PhysicalDeviceRef, PhysicalDeviceSource, QueryFallback, QueueFamily,
    QueueFamilyInfo, SelectionPolicy, TieBreak,
};
pub use error::{VulkanError, VulkanResult};
pub use instance::{
    negotiate_extensions, ApplicationDescriptor, DiagnosticCategory, DiagnosticMessage, DiagnosticSeverity,
    DriverInstance, DriverInstanceFactory,
};
pub use presentation::{
    driver_visual_id, AshPresentationQueries, PresentationQueries, PresentationSupportOracle, QueryError,
};
pub use surface::{AshPresentationBackend, PresentationBackend, Surface, SurfaceLifecycleManager};
pub use swapchain::{choose_extent, choose_image_count, choose_surface_format, Swapchain, SwapchainDesc};
