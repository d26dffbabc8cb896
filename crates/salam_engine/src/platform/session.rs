//! Windowing subsystem session backed by GLFW
//!
//! One [`PlatformSession`] exists per process. It owns GLFW, loads the Vulkan
//! loader library, reports the instance extensions the window system needs,
//! and creates the single application [`Window`].

use super::native::{NativeBackendInfo, SurfaceTarget};
use super::{PlatformError, PlatformKind, PlatformResult};
use crate::core::config::WindowConfig;
use crate::lifecycle::{EventSource, HostSession, HostWindow, LifecycleEvent};
use bitflags::bitflags;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::cell::RefCell;
use std::collections::VecDeque;

thread_local! {
    static LAST_GLFW_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

#[allow(clippy::needless_pass_by_value)] // Signature fixed by GLFW's error callback
fn record_glfw_error(error: glfw::Error, description: String) {
    log::error!("GLFW error {error:?}: {description}");
    LAST_GLFW_ERROR.with(|last| *last.borrow_mut() = Some(description));
}

fn take_glfw_error() -> Option<String> {
    LAST_GLFW_ERROR.with(|last| last.borrow_mut().take())
}

bitflags! {
    /// Window creation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WindowFlags: u32 {
        /// Window will be presented to through Vulkan (no client GL context)
        const VULKAN = 1 << 0;
        /// Window starts hidden
        const HIDDEN = 1 << 1;
        /// Window can be resized by the user
        const RESIZABLE = 1 << 2;
    }
}

impl WindowFlags {
    /// Flags implied by a window configuration
    pub fn from_config(config: &WindowConfig) -> Self {
        let mut flags = Self::VULKAN;
        flags.set(Self::HIDDEN, config.start_hidden);
        flags.set(Self::RESIZABLE, config.resizable);
        flags
    }
}

/// Dynamically loaded Vulkan loader library
///
/// Holds the `vkGetInstanceProcAddr` entry point everything else is resolved
/// through. The library stays loaded for as long as this value lives.
pub struct DriverLibrary {
    entry: ash::Entry,
}

impl DriverLibrary {
    /// Vulkan entry point table
    pub const fn entry(&self) -> &ash::Entry {
        &self.entry
    }
}

/// Process-wide windowing subsystem
pub struct PlatformSession {
    glfw: glfw::Glfw,
}

impl PlatformSession {
    /// Initialize the windowing subsystem
    pub fn open() -> PlatformResult<Self> {
        let glfw = glfw::init(record_glfw_error).map_err(|e| {
            PlatformError::new(format!(
                "GLFW initialization failed: {e:?}{}",
                take_glfw_error().map(|d| format!(" ({d})")).unwrap_or_default()
            ))
        })?;

        log::info!("Windowing subsystem initialized");
        Ok(Self { glfw })
    }

    /// Tear the windowing subsystem down
    ///
    /// Every window created from this session must be dropped first.
    pub fn close(self) {
        drop(self.glfw);
        log::info!("Windowing subsystem closed");
    }

    /// Operating system family the process runs on
    pub const fn platform(&self) -> PlatformKind {
        PlatformKind::current()
    }

    /// Whether the window system found a usable Vulkan loader
    pub fn vulkan_supported(&self) -> bool {
        self.glfw.vulkan_supported()
    }

    /// Load the Vulkan loader library and its entry point
    pub fn load_driver(&self) -> PlatformResult<DriverLibrary> {
        // SAFETY: the loader library is kept alive by the returned Entry.
        let entry = unsafe { ash::Entry::load() }.map_err(|e| {
            PlatformError::new(format!("Couldn't load the Vulkan dynamic library: {e}"))
        })?;

        Ok(DriverLibrary { entry })
    }

    /// Instance extensions the window system needs for surface creation
    pub fn required_instance_extensions(&self) -> PlatformResult<Vec<String>> {
        self.glfw.get_required_instance_extensions().ok_or_else(|| {
            PlatformError::new(format!(
                "Couldn't get Vulkan instance extensions{}",
                take_glfw_error().map(|d| format!(": {d}")).unwrap_or_default()
            ))
        })
    }

    /// Create the application window
    pub fn create_window(&mut self, config: &WindowConfig, flags: WindowFlags) -> PlatformResult<Window> {
        if flags.contains(WindowFlags::VULKAN) {
            self.glfw
                .window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        }
        self.glfw
            .window_hint(glfw::WindowHint::Visible(!flags.contains(WindowFlags::HIDDEN)));
        self.glfw
            .window_hint(glfw::WindowHint::Resizable(flags.contains(WindowFlags::RESIZABLE)));

        let (mut window, events) = self
            .glfw
            .create_window(config.width, config.height, &config.title, glfw::WindowMode::Windowed)
            .ok_or_else(|| {
                PlatformError::new(
                    take_glfw_error().unwrap_or_else(|| "Window creation failed".to_string()),
                )
            })?;

        window.set_close_polling(true);
        window.set_iconify_polling(true);
        window.set_framebuffer_size_polling(true);

        log::info!(
            "Created window \"{}\" ({}x{}, {:?})",
            config.title,
            config.width,
            config.height,
            flags
        );

        Ok(Window { window, events })
    }

    /// Event source draining this session's events for `window`
    pub fn events<'a>(&'a mut self, window: &'a Window) -> PlatformEvents<'a> {
        PlatformEvents {
            session: self,
            window,
            pending: VecDeque::new(),
        }
    }
}

/// The single application window
pub struct Window {
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

impl Window {
    /// Native backend description of this window
    pub fn native_info(&self) -> NativeBackendInfo {
        self.surface_target().native_info()
    }

    /// Raw handles and size for surface creation
    pub fn surface_target(&self) -> SurfaceTarget {
        SurfaceTarget {
            display: self.window.raw_display_handle(),
            window: self.window.raw_window_handle(),
            framebuffer_size: self.framebuffer_size(),
        }
    }

    /// Framebuffer size in pixels
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0).unsigned_abs(), height.max(0).unsigned_abs())
    }

    /// Whether the window is currently shown
    pub fn is_visible(&self) -> bool {
        self.window.is_visible()
    }

    /// Show a window created hidden
    pub fn show(&mut self) {
        self.window.show();
    }
}

impl HostWindow for Window {
    fn is_visible(&self) -> bool {
        Self::is_visible(self)
    }

    fn show(&mut self) {
        Self::show(self);
    }

    fn surface_target(&self) -> SurfaceTarget {
        Self::surface_target(self)
    }
}

impl HostSession for PlatformSession {
    type Window = Window;
    type Events<'a> = PlatformEvents<'a> where Self: 'a;

    fn events<'a>(&'a mut self, window: &'a Window) -> PlatformEvents<'a> {
        Self::events(self, window)
    }

    fn close(self) {
        Self::close(self);
    }
}

/// Translate a GLFW window event into a lifecycle event, if it is one
pub fn lifecycle_event(event: &glfw::WindowEvent) -> Option<LifecycleEvent> {
    match *event {
        glfw::WindowEvent::Close => Some(LifecycleEvent::Quit),
        glfw::WindowEvent::Iconify(true) => Some(LifecycleEvent::EnterBackground),
        glfw::WindowEvent::Iconify(false) => Some(LifecycleEvent::EnterForeground),
        glfw::WindowEvent::FramebufferSize(width, height) => Some(LifecycleEvent::Resized {
            width: width.max(0).unsigned_abs(),
            height: height.max(0).unsigned_abs(),
        }),
        _ => None,
    }
}

/// [`EventSource`] over a platform session and its window
pub struct PlatformEvents<'a> {
    session: &'a mut PlatformSession,
    window: &'a Window,
    pending: VecDeque<LifecycleEvent>,
}

impl EventSource for PlatformEvents<'_> {
    fn poll_event(&mut self) -> Option<LifecycleEvent> {
        if self.pending.is_empty() {
            self.session.glfw.poll_events();
            self.pending.extend(
                glfw::flush_messages(&self.window.events)
                    .filter_map(|(_, event)| lifecycle_event(&event)),
            );
        }
        self.pending.pop_front()
    }

    fn surface_target(&self) -> SurfaceTarget {
        self.window.surface_target()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_maps_to_quit() {
        assert_eq!(lifecycle_event(&glfw::WindowEvent::Close), Some(LifecycleEvent::Quit));
    }

    #[test]
    fn test_iconify_maps_to_background_transitions() {
        assert_eq!(
            lifecycle_event(&glfw::WindowEvent::Iconify(true)),
            Some(LifecycleEvent::EnterBackground)
        );
        assert_eq!(
            lifecycle_event(&glfw::WindowEvent::Iconify(false)),
            Some(LifecycleEvent::EnterForeground)
        );
    }

    #[test]
    fn test_framebuffer_resize_maps_to_resized() {
        assert_eq!(
            lifecycle_event(&glfw::WindowEvent::FramebufferSize(1024, -1)),
            Some(LifecycleEvent::Resized { width: 1024, height: 0 })
        );
    }

    #[test]
    fn test_other_events_ignored() {
        assert_eq!(lifecycle_event(&glfw::WindowEvent::Focus(true)), None);
        assert_eq!(lifecycle_event(&glfw::WindowEvent::Pos(10, 10)), None);
    }

    #[test]
    fn test_window_flags_from_config() {
        let flags = WindowFlags::from_config(&WindowConfig::default());
        assert_eq!(flags, WindowFlags::VULKAN | WindowFlags::RESIZABLE);

        let flags = WindowFlags::from_config(&WindowConfig::default().hidden());
        assert!(flags.contains(WindowFlags::HIDDEN));
    }
}
