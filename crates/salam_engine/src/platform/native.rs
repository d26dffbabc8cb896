//! Native window-system identification
//!
//! The window system behind a window is captured once as a closed
//! [`NativeBackendInfo`] value. Everything downstream (presentation queries,
//! surface creation) dispatches on that value instead of on `cfg` attributes,
//! so a backend that isn't compiled in simply never shows up.

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::c_void;
use std::os::raw::c_ulong;

/// Xlib visual identifier
pub type VisualId = c_ulong;

/// Tag identifying a native windowing backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// The window system could not be identified
    Unknown,
    /// Win32 (desktop Windows)
    Win32,
    /// WinRT / UWP core window
    WinRt,
    /// X11 through Xlib
    Xlib,
    /// X11 through XCB
    Xcb,
    /// Wayland compositor
    Wayland,
    /// macOS AppKit
    AppKit,
    /// iOS UIKit
    UiKit,
    /// Android native window
    AndroidNdk,
    /// Browser canvas
    Web,
    /// Redox Orbital
    Orbital,
    /// Haiku
    Haiku,
    /// Linux DRM/KMS
    Drm,
    /// Linux GBM
    Gbm,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Win32 => "win32",
            Self::WinRt => "winrt",
            Self::Xlib => "xlib",
            Self::Xcb => "xcb",
            Self::Wayland => "wayland",
            Self::AppKit => "appkit",
            Self::UiKit => "uikit",
            Self::AndroidNdk => "android",
            Self::Web => "web",
            Self::Orbital => "orbital",
            Self::Haiku => "haiku",
            Self::Drm => "drm",
            Self::Gbm => "gbm",
        };
        f.write_str(name)
    }
}

/// Native handles of a window, keyed by the backend that owns it
///
/// Only the backends the presentation oracle knows how to answer for carry
/// their handles; the rest are kept as [`NativeBackendInfo::Unsupported`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeBackendInfo {
    /// Backend could not be determined
    Unknown,
    /// Win32 window
    Win32 {
        /// `HWND`
        hwnd: *mut c_void,
        /// `HINSTANCE` of the owning module
        hinstance: *mut c_void,
    },
    /// Xlib window
    Xlib {
        /// `Display*` connection
        display: *mut c_void,
        /// X window id
        window: c_ulong,
        /// Visual id, `0` when the window system didn't report one
        visual_id: VisualId,
    },
    /// XCB window
    Xcb {
        /// `xcb_connection_t*`
        connection: *mut c_void,
        /// X window id
        window: u32,
        /// Visual id, `0` when the window system didn't report one
        visual_id: u32,
    },
    /// Wayland surface
    Wayland {
        /// `wl_display*`
        display: *mut c_void,
        /// `wl_surface*`
        surface: *mut c_void,
    },
    /// AppKit view
    AppKit {
        /// `NSView*`
        ns_view: *mut c_void,
    },
    /// UIKit view
    UiKit {
        /// `UIView*`
        ui_view: *mut c_void,
    },
    /// Android native window
    AndroidNdk {
        /// `ANativeWindow*`
        native_window: *mut c_void,
    },
    /// Identified backend without presentation handling
    Unsupported(BackendKind),
}

impl NativeBackendInfo {
    /// Classify a pair of raw handles
    ///
    /// A display handle that belongs to a different window system than the
    /// window handle leaves the backend unresolved.
    pub fn from_raw_handles(display: RawDisplayHandle, window: RawWindowHandle) -> Self {
        match (display, window) {
            (RawDisplayHandle::Xlib(display), RawWindowHandle::Xlib(window)) => Self::Xlib {
                display: display.display,
                window: window.window,
                visual_id: window.visual_id,
            },
            (RawDisplayHandle::Xcb(display), RawWindowHandle::Xcb(window)) => Self::Xcb {
                connection: display.connection,
                window: window.window,
                visual_id: window.visual_id,
            },
            (RawDisplayHandle::Wayland(display), RawWindowHandle::Wayland(window)) => Self::Wayland {
                display: display.display,
                surface: window.surface,
            },
            (RawDisplayHandle::Windows(_), RawWindowHandle::Win32(window)) => Self::Win32 {
                hwnd: window.hwnd,
                hinstance: window.hinstance,
            },
            (RawDisplayHandle::AppKit(_), RawWindowHandle::AppKit(window)) => Self::AppKit {
                ns_view: window.ns_view,
            },
            (RawDisplayHandle::UiKit(_), RawWindowHandle::UiKit(window)) => Self::UiKit {
                ui_view: window.ui_view,
            },
            (RawDisplayHandle::Android(_), RawWindowHandle::AndroidNdk(window)) => Self::AndroidNdk {
                native_window: window.a_native_window,
            },
            (RawDisplayHandle::Windows(_), RawWindowHandle::WinRt(_)) => {
                Self::Unsupported(BackendKind::WinRt)
            }
            (RawDisplayHandle::Web(_), RawWindowHandle::Web(_)) => Self::Unsupported(BackendKind::Web),
            (RawDisplayHandle::Orbital(_), RawWindowHandle::Orbital(_)) => {
                Self::Unsupported(BackendKind::Orbital)
            }
            (RawDisplayHandle::Haiku(_), RawWindowHandle::Haiku(_)) => Self::Unsupported(BackendKind::Haiku),
            (RawDisplayHandle::Drm(_), RawWindowHandle::Drm(_)) => Self::Unsupported(BackendKind::Drm),
            (RawDisplayHandle::Gbm(_), RawWindowHandle::Gbm(_)) => Self::Unsupported(BackendKind::Gbm),
            _ => Self::Unknown,
        }
    }

    /// Backend tag of this window
    pub const fn kind(&self) -> BackendKind {
        match self {
            Self::Unknown => BackendKind::Unknown,
            Self::Win32 { .. } => BackendKind::Win32,
            Self::Xlib { .. } => BackendKind::Xlib,
            Self::Xcb { .. } => BackendKind::Xcb,
            Self::Wayland { .. } => BackendKind::Wayland,
            Self::AppKit { .. } => BackendKind::AppKit,
            Self::UiKit { .. } => BackendKind::UiKit,
            Self::AndroidNdk { .. } => BackendKind::AndroidNdk,
            Self::Unsupported(kind) => *kind,
        }
    }
}

/// Everything needed to build a presentation surface for a window
#[derive(Debug, Clone, Copy)]
pub struct SurfaceTarget {
    /// Raw display/connection handle
    pub display: RawDisplayHandle,
    /// Raw window handle
    pub window: RawWindowHandle,
    /// Framebuffer size in pixels at the time the target was captured
    pub framebuffer_size: (u32, u32),
}

impl SurfaceTarget {
    /// Native backend description of the target window
    pub fn native_info(&self) -> NativeBackendInfo {
        NativeBackendInfo::from_raw_handles(self.display, self.window)
    }
}

/// Queries answered by the native window system itself rather than the driver
pub trait NativeWindowSystem {
    /// Resolve the visual of an Xlib window, `None` when the lookup fails
    fn xlib_visual_id(&self, display: *mut c_void, window: c_ulong) -> Option<VisualId>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use raw_window_handle::{
        AndroidDisplayHandle, AndroidNdkWindowHandle, WebDisplayHandle, WebWindowHandle,
        XcbDisplayHandle, XcbWindowHandle, XlibDisplayHandle, XlibWindowHandle,
    };

    #[test]
    fn test_xlib_handles_classified() {
        let mut display = XlibDisplayHandle::empty();
        display.display = 0x10 as *mut c_void;
        let mut window = XlibWindowHandle::empty();
        window.window = 42;
        window.visual_id = 7;

        let info = NativeBackendInfo::from_raw_handles(
            RawDisplayHandle::Xlib(display),
            RawWindowHandle::Xlib(window),
        );

        assert_eq!(
            info,
            NativeBackendInfo::Xlib { display: 0x10 as *mut c_void, window: 42, visual_id: 7 }
        );
        assert_eq!(info.kind(), BackendKind::Xlib);
    }

    #[test]
    fn test_android_handles_classified() {
        let mut window = AndroidNdkWindowHandle::empty();
        window.a_native_window = 0x20 as *mut c_void;

        let info = NativeBackendInfo::from_raw_handles(
            RawDisplayHandle::Android(AndroidDisplayHandle::empty()),
            RawWindowHandle::AndroidNdk(window),
        );

        assert_eq!(info.kind(), BackendKind::AndroidNdk);
    }

    #[test]
    fn test_web_is_unsupported() {
        let info = NativeBackendInfo::from_raw_handles(
            RawDisplayHandle::Web(WebDisplayHandle::empty()),
            RawWindowHandle::Web(WebWindowHandle::empty()),
        );

        assert_eq!(info, NativeBackendInfo::Unsupported(BackendKind::Web));
    }

    #[test]
    fn test_mismatched_handles_are_unknown() {
        let info = NativeBackendInfo::from_raw_handles(
            RawDisplayHandle::Xcb(XcbDisplayHandle::empty()),
            RawWindowHandle::Xlib(XlibWindowHandle::empty()),
        );
        assert_eq!(info, NativeBackendInfo::Unknown);

        let info = NativeBackendInfo::from_raw_handles(
            RawDisplayHandle::Xcb(XcbDisplayHandle::empty()),
            RawWindowHandle::Xcb(XcbWindowHandle::empty()),
        );
        assert_eq!(info.kind(), BackendKind::Xcb);
    }
}
