//! Rendering backends

/// Vulkan presentation bootstrap
pub mod vulkan;
