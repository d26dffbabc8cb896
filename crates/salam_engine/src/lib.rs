//! # Salam Engine
//!
//! Brings a Vulkan-capable window up and keeps its presentation surface in
//! step with the application lifecycle.
//!
//! ## Features
//!
//! - **Driver bootstrap**: instance creation with extension negotiation and optional diagnostics
//! - **Device selection**: a graphics queue family that can present to the window
//! - **Surface lifecycle**: surface and swapchain released in the background, rebuilt in the foreground
//! - **Cross-Platform**: Win32, Xlib, XCB, Wayland, macOS/iOS and Android window handles
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use salam_engine::prelude::*;
//!
//! fn main() -> Result<(), BootstrapError> {
//!     let config = BootstrapConfig::load_validated("salam.toml")?;
//!     let code = Bootstrap::new(&config)?.run()?;
//!     std::process::exit(code);
//! }
//! ```

pub mod config;
pub mod core;
pub mod foundation;
pub mod lifecycle;
pub mod platform;
pub mod render;

mod bootstrap;

pub use bootstrap::{Bootstrap, BootstrapError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        core::config::{ApplicationConfig, BootstrapConfig, WindowConfig},
        foundation::logging,
        lifecycle::{EventSource, HostSession, HostWindow, LifecycleEvent, LifecycleEventLoop, LoopExit, LoopState},
        platform::{NativeBackendInfo, PlatformError, PlatformSession, SurfaceTarget, Window},
        render::vulkan::{
            DeviceSelector, DriverInstance, DriverInstanceFactory, LogicalDevice, QueueFamily, SelectionPolicy,
            SurfaceLifecycleManager, TieBreak, VulkanError, VulkanResult,
        },
        Bootstrap, BootstrapError,
    };
}
