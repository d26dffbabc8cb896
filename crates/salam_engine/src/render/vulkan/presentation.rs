//! Presentation support queries
//!
//! Whether a queue family can present to a window is answered differently by
//! every window system. Compositor-managed mobile and Apple backends always
//! can; desktop window systems expose a dedicated driver entry point; Xlib
//! additionally needs the window's visual resolved through Xlib first.
//!
//! [`PresentationSupportOracle::query`] is the single dispatch over
//! [`NativeBackendInfo`]. Adding a backend means adding a match arm there.

use crate::platform::{NativeBackendInfo, NativeWindowSystem, VisualId};
use crate::render::vulkan::DriverInstance;
use ash::extensions::khr;
use ash::vk;
use std::ffi::c_void;
use thiserror::Error;

/// Why a presentation query produced no answer
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryError {
    /// The native window system or driver query itself failed
    #[error("native presentation query failed")]
    Failure,
    /// The window's backend could not be identified
    #[error("window system backend is unknown")]
    Unknown,
    /// The backend is known but has no presentation query
    #[error("presentation query not implemented for this backend")]
    Unimplemented,
}

/// Driver-native "can this queue family present here" entry points
pub trait PresentationQueries {
    /// `vkGetPhysicalDeviceWin32PresentationSupportKHR`
    fn win32_presentation_support(
        &self,
        device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> Result<bool, QueryError>;

    /// `vkGetPhysicalDeviceXlibPresentationSupportKHR`
    fn xlib_presentation_support(
        &self,
        device: vk::PhysicalDevice,
        queue_family_index: u32,
        display: *mut c_void,
        visual_id: vk::VisualID,
    ) -> Result<bool, QueryError>;

    /// `vkGetPhysicalDeviceXcbPresentationSupportKHR`
    fn xcb_presentation_support(
        &self,
        device: vk::PhysicalDevice,
        queue_family_index: u32,
        connection: *mut c_void,
        visual_id: u32,
    ) -> Result<bool, QueryError>;

    /// `vkGetPhysicalDeviceWaylandPresentationSupportKHR`
    fn wayland_presentation_support(
        &self,
        device: vk::PhysicalDevice,
        queue_family_index: u32,
        display: *mut c_void,
    ) -> Result<bool, QueryError>;
}

/// [`PresentationQueries`] resolved from a live instance
///
/// A loader exists only for window-system extensions the instance enabled;
/// asking a backend whose extension is missing is a query failure.
pub struct AshPresentationQueries {
    win32: Option<khr::Win32Surface>,
    xlib: Option<khr::XlibSurface>,
    xcb: Option<khr::XcbSurface>,
    wayland: Option<khr::WaylandSurface>,
}

impl AshPresentationQueries {
    /// Window-system surface extensions worth enabling when available
    pub fn extension_names() -> Vec<String> {
        [
            khr::Win32Surface::name(),
            khr::XlibSurface::name(),
            khr::XcbSurface::name(),
            khr::WaylandSurface::name(),
        ]
        .iter()
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
    }

    /// Load the presentation queries the instance supports
    pub fn new(instance: &DriverInstance) -> Self {
        let entry = instance.entry();
        let raw = instance.instance();

        Self {
            win32: instance
                .has_extension(khr::Win32Surface::name())
                .then(|| khr::Win32Surface::new(entry, raw)),
            xlib: instance
                .has_extension(khr::XlibSurface::name())
                .then(|| khr::XlibSurface::new(entry, raw)),
            xcb: instance
                .has_extension(khr::XcbSurface::name())
                .then(|| khr::XcbSurface::new(entry, raw)),
            wayland: instance
                .has_extension(khr::WaylandSurface::name())
                .then(|| khr::WaylandSurface::new(entry, raw)),
        }
    }
}

impl PresentationQueries for AshPresentationQueries {
    fn win32_presentation_support(
        &self,
        device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> Result<bool, QueryError> {
        let loader = self.win32.as_ref().ok_or(QueryError::Failure)?;
        // SAFETY: the loader was created from the instance that enumerated `device`.
        let supported = unsafe {
            (loader.fp().get_physical_device_win32_presentation_support_khr)(device, queue_family_index)
        };
        Ok(supported != vk::FALSE)
    }

    fn xlib_presentation_support(
        &self,
        device: vk::PhysicalDevice,
        queue_family_index: u32,
        display: *mut c_void,
        visual_id: vk::VisualID,
    ) -> Result<bool, QueryError> {
        let loader = self.xlib.as_ref().ok_or(QueryError::Failure)?;
        if display.is_null() {
            return Err(QueryError::Failure);
        }
        // SAFETY: display is the live connection that owns the window.
        let supported = unsafe {
            (loader.fp().get_physical_device_xlib_presentation_support_khr)(
                device,
                queue_family_index,
                display.cast(),
                visual_id,
            )
        };
        Ok(supported != vk::FALSE)
    }

    fn xcb_presentation_support(
        &self,
        device: vk::PhysicalDevice,
        queue_family_index: u32,
        connection: *mut c_void,
        visual_id: u32,
    ) -> Result<bool, QueryError> {
        let loader = self.xcb.as_ref().ok_or(QueryError::Failure)?;
        if connection.is_null() {
            return Err(QueryError::Failure);
        }
        // SAFETY: connection is the live XCB connection that owns the window.
        let supported = unsafe {
            (loader.fp().get_physical_device_xcb_presentation_support_khr)(
                device,
                queue_family_index,
                connection.cast(),
                visual_id,
            )
        };
        Ok(supported != vk::FALSE)
    }

    fn wayland_presentation_support(
        &self,
        device: vk::PhysicalDevice,
        queue_family_index: u32,
        display: *mut c_void,
    ) -> Result<bool, QueryError> {
        let loader = self.wayland.as_ref().ok_or(QueryError::Failure)?;
        if display.is_null() {
            return Err(QueryError::Failure);
        }
        // SAFETY: display is the live Wayland display that owns the surface.
        let supported = unsafe {
            (loader.fp().get_physical_device_wayland_presentation_support_khr)(
                device,
                queue_family_index,
                display.cast(),
            )
        };
        Ok(supported != vk::FALSE)
    }
}

/// Narrow an Xlib visual id to the width the driver query takes
///
/// Xlib hands out `unsigned long` ids; the driver entry point takes a 32-bit
/// `VisualID`. An id that doesn't fit can't name a real visual.
pub fn driver_visual_id(visual_id: VisualId) -> Result<vk::VisualID, QueryError> {
    vk::VisualID::try_from(visual_id).map_err(|_| QueryError::Failure)
}

/// Answers "can this queue family present to this window"
pub struct PresentationSupportOracle<'a> {
    driver: &'a dyn PresentationQueries,
    native: &'a dyn NativeWindowSystem,
}

impl<'a> PresentationSupportOracle<'a> {
    /// Oracle over the given driver and window-system queries
    pub fn new(driver: &'a dyn PresentationQueries, native: &'a dyn NativeWindowSystem) -> Self {
        Self { driver, native }
    }

    /// Whether `queue_family_index` on `device` can present to `window`
    pub fn query(
        &self,
        device: vk::PhysicalDevice,
        queue_family_index: u32,
        window: &NativeBackendInfo,
    ) -> Result<bool, QueryError> {
        match *window {
            // Presentation goes through the compositor; every queue the driver
            // exposes for graphics can reach it.
            NativeBackendInfo::AndroidNdk { .. }
            | NativeBackendInfo::AppKit { .. }
            | NativeBackendInfo::UiKit { .. } => Ok(true),

            NativeBackendInfo::Win32 { .. } => {
                self.driver.win32_presentation_support(device, queue_family_index)
            }

            NativeBackendInfo::Wayland { display, .. } => {
                self.driver
                    .wayland_presentation_support(device, queue_family_index, display)
            }

            NativeBackendInfo::Xcb {
                connection,
                visual_id,
                ..
            } => {
                if visual_id == 0 {
                    return Err(QueryError::Failure);
                }
                self.driver
                    .xcb_presentation_support(device, queue_family_index, connection, visual_id)
            }

            NativeBackendInfo::Xlib {
                display,
                window,
                visual_id,
            } => {
                let visual_id = if visual_id == 0 {
                    self.native
                        .xlib_visual_id(display, window)
                        .ok_or(QueryError::Failure)?
                } else {
                    visual_id
                };
                self.driver.xlib_presentation_support(
                    device,
                    queue_family_index,
                    display,
                    driver_visual_id(visual_id)?,
                )
            }

            NativeBackendInfo::Unknown => Err(QueryError::Unknown),

            NativeBackendInfo::Unsupported(_) => Err(QueryError::Unimplemented),
        }
    }
}
