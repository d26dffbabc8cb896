//! Application lifecycle event loop
//!
//! Drives the surface manager from window-system lifecycle events until the
//! user quits.

use crate::platform::SurfaceTarget;
use crate::render::vulkan::{PresentationBackend, SurfaceLifecycleManager, VulkanResult};
use ash::vk;

/// Events the loop reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The user asked to close the application
    Quit,
    /// The application became visible; a surface may be created
    EnterForeground,
    /// The application was hidden; its surface must be released
    EnterBackground,
    /// The framebuffer changed size
    Resized {
        /// New width in pixels
        width: u32,
        /// New height in pixels
        height: u32,
    },
}

/// Whether the loop keeps going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Processing events
    Running,
    /// Quit received; the rest of the batch is drained without effect
    Closing,
}

/// Source of lifecycle events for one window
pub trait EventSource {
    /// Next pending event, `None` when the queue is drained
    fn poll_event(&mut self) -> Option<LifecycleEvent>;

    /// Handles for building a surface on the window
    fn surface_target(&self) -> SurfaceTarget;
}

/// Window the loop presents to
pub trait HostWindow {
    /// Whether the window is shown
    fn is_visible(&self) -> bool;

    /// Show a window created hidden
    fn show(&mut self);

    /// Handles for building a surface on the window
    fn surface_target(&self) -> SurfaceTarget;
}

/// Windowing session owning the event queue of its window
pub trait HostSession: Sized {
    /// Window type the session creates
    type Window: HostWindow;

    /// Event source borrowing the session and its window
    type Events<'a>: EventSource
    where
        Self: 'a;

    /// Event source for `window`
    fn events<'a>(&'a mut self, window: &'a Self::Window) -> Self::Events<'a>;

    /// Tear the session down; its window must already be gone
    fn close(self);
}

/// How the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopExit {
    /// Process exit code
    pub code: i32,
    /// Number of events processed
    pub events_handled: usize,
}

/// Single-threaded event loop
#[derive(Debug)]
pub struct LifecycleEventLoop {
    state: LoopState,
    events_handled: usize,
}

impl Default for LifecycleEventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleEventLoop {
    /// Loop in the running state
    pub const fn new() -> Self {
        Self {
            state: LoopState::Running,
            events_handled: 0,
        }
    }

    /// Current state
    pub const fn state(&self) -> LoopState {
        self.state
    }

    /// Run until `Quit`, draining every pending event each iteration
    pub fn run<S, B>(mut self, source: &mut S, manager: &mut SurfaceLifecycleManager<B>) -> VulkanResult<LoopExit>
    where
        S: EventSource + ?Sized,
        B: PresentationBackend,
    {
        log::info!("Entering lifecycle loop");

        while self.state == LoopState::Running {
            while let Some(event) = source.poll_event() {
                self.handle(event, &*source, manager)?;
            }
            std::thread::yield_now();
        }

        log::info!("Lifecycle loop finished after {} event(s)", self.events_handled);
        Ok(LoopExit {
            code: 0,
            events_handled: self.events_handled,
        })
    }

    /// Apply one event to the surface manager
    pub fn handle<S, B>(
        &mut self,
        event: LifecycleEvent,
        source: &S,
        manager: &mut SurfaceLifecycleManager<B>,
    ) -> VulkanResult<()>
    where
        S: EventSource + ?Sized,
        B: PresentationBackend,
    {
        log::debug!("Lifecycle event: {event:?}");
        self.events_handled += 1;

        if self.state == LoopState::Closing {
            log::debug!("Ignoring {event:?} after quit");
            return Ok(());
        }

        match event {
            LifecycleEvent::Quit => self.state = LoopState::Closing,
            LifecycleEvent::EnterForeground => manager.create(&source.surface_target())?,
            LifecycleEvent::EnterBackground => manager.destroy(),
            LifecycleEvent::Resized { width, height } => manager.recreate(vk::Extent2D { width, height })?,
        }
        Ok(())
    }
}
