//! Xlib visual lookup
//!
//! The driver's Xlib presentation query needs the window's visual id, which
//! window handles don't always carry. Resolving it takes a round trip through
//! Xlib itself.

use super::native::{NativeWindowSystem, VisualId};
use std::ffi::c_void;
use std::os::raw::c_ulong;

/// [`NativeWindowSystem`] backed by the process' Xlib connection
#[derive(Debug, Default, Clone, Copy)]
pub struct X11WindowSystem;

#[cfg(all(
    unix,
    not(any(target_os = "macos", target_os = "ios", target_os = "android"))
))]
mod ffi {
    use std::ffi::c_void;
    use std::os::raw::{c_int, c_long, c_ulong};

    #[repr(C)]
    pub struct XWindowAttributes {
        pub x: c_int,
        pub y: c_int,
        pub width: c_int,
        pub height: c_int,
        pub border_width: c_int,
        pub depth: c_int,
        pub visual: *mut c_void,
        pub root: c_ulong,
        pub class: c_int,
        pub bit_gravity: c_int,
        pub win_gravity: c_int,
        pub backing_store: c_int,
        pub backing_planes: c_ulong,
        pub backing_pixel: c_ulong,
        pub save_under: c_int,
        pub colormap: c_ulong,
        pub map_installed: c_int,
        pub map_state: c_int,
        pub all_event_masks: c_long,
        pub your_event_mask: c_long,
        pub do_not_propagate_mask: c_long,
        pub override_redirect: c_int,
        pub screen: *mut c_void,
    }

    #[link(name = "X11")]
    extern "C" {
        pub fn XGetWindowAttributes(
            display: *mut c_void,
            window: c_ulong,
            attributes: *mut XWindowAttributes,
        ) -> c_int;
        pub fn XVisualIDFromVisual(visual: *mut c_void) -> c_ulong;
    }
}

#[cfg(all(
    unix,
    not(any(target_os = "macos", target_os = "ios", target_os = "android"))
))]
impl NativeWindowSystem for X11WindowSystem {
    fn xlib_visual_id(&self, display: *mut c_void, window: c_ulong) -> Option<VisualId> {
        if display.is_null() || window == 0 {
            return None;
        }

        let mut attributes = std::mem::MaybeUninit::<ffi::XWindowAttributes>::zeroed();
        // SAFETY: display is a live connection owned by the window system and
        // attributes points at writable storage of the right layout.
        let status = unsafe { ffi::XGetWindowAttributes(display, window, attributes.as_mut_ptr()) };
        if status == 0 {
            log::debug!("XGetWindowAttributes failed for window {window:#x}");
            return None;
        }

        // SAFETY: a non-zero status means Xlib filled the structure.
        let attributes = unsafe { attributes.assume_init() };
        if attributes.visual.is_null() {
            return None;
        }

        // SAFETY: the visual pointer was just handed out by Xlib.
        Some(unsafe { ffi::XVisualIDFromVisual(attributes.visual) })
    }
}

#[cfg(not(all(
    unix,
    not(any(target_os = "macos", target_os = "ios", target_os = "android"))
)))]
impl NativeWindowSystem for X11WindowSystem {
    fn xlib_visual_id(&self, _display: *mut c_void, _window: c_ulong) -> Option<VisualId> {
        None
    }
}
