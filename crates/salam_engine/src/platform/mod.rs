//! Platform layer
//!
//! Window system session, the application window, native handle
//! classification and the translation of window-system events into
//! lifecycle events.

pub mod native;
pub mod session;
pub mod x11;

pub use native::{BackendKind, NativeBackendInfo, NativeWindowSystem, SurfaceTarget, VisualId};
pub use session::{DriverLibrary, PlatformEvents, PlatformSession, Window, WindowFlags};
pub use x11::X11WindowSystem;

use thiserror::Error;

/// Windowing or driver-loading failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}{}", code_suffix(.code))]
pub struct PlatformError {
    /// Human-readable description
    pub message: String,
    /// Platform error code, when the platform reported one
    pub code: Option<i32>,
}

fn code_suffix(code: &Option<i32>) -> String {
    code.map(|code| format!(" (code {code})")).unwrap_or_default()
}

impl PlatformError {
    /// Error without a platform code
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Error carrying a platform code
    pub fn with_code(message: impl Into<String>, code: i32) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

/// Result type for platform operations
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformKind {
    /// Microsoft Windows
    Windows,
    /// Apple macOS
    MacOs,
    /// Linux and the BSDs
    Linux,
    /// Android
    Android,
    /// Apple iOS
    Ios,
    /// Anything else
    Other,
}

impl PlatformKind {
    /// Platform this binary was compiled for
    pub const fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "android") {
            Self::Android
        } else if cfg!(target_os = "ios") {
            Self::Ios
        } else if cfg!(unix) {
            Self::Linux
        } else {
            Self::Other
        }
    }

    /// Whether the Vulkan implementation is a portability layer (MoltenVK)
    /// that must be opted into at instance creation
    pub const fn needs_portability_enumeration(self) -> bool {
        matches!(self, Self::MacOs | Self::Ios)
    }
}
