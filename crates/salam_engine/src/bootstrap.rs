//! Startup and shutdown of the whole presentation stack
//!
//! [`Bootstrap::new`] acquires everything in order: windowing session,
//! driver library, instance, window, queue family, logical device and the
//! surface manager. [`Bootstrap::run`] drives the lifecycle loop and then
//! releases the same resources in reverse.

use crate::config::ConfigError;
use crate::core::config::BootstrapConfig;
use crate::lifecycle::{HostSession, HostWindow, LifecycleEventLoop};
use crate::platform::{PlatformError, PlatformSession, WindowFlags, X11WindowSystem};
use crate::render::vulkan::{
    ApplicationDescriptor, AshPresentationBackend, AshPresentationQueries, DeviceSelector, DriverInstance,
    DriverInstanceFactory, LogicalDevice, PresentationBackend, PresentationSupportOracle, SelectionPolicy,
    SurfaceLifecycleManager, VulkanError,
};
use thiserror::Error;

/// Anything that stops the application from starting or running
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// Windowing or driver loading failed
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// A Vulkan call failed
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    /// The configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No queue family on any device supports both graphics and presentation
    #[error("No physical device has a queue family that can draw and present to the window")]
    SelectionExhausted,
}

/// Every long-lived object of the running application
///
/// Fields drop top to bottom, which is the teardown order: swapchain and
/// surface, logical device, instance, window, windowing session.
pub struct Bootstrap<S = PlatformSession, B = AshPresentationBackend, D = LogicalDevice, I = DriverInstance>
where
    S: HostSession,
    B: PresentationBackend,
{
    manager: SurfaceLifecycleManager<B>,
    device: D,
    instance: I,
    window: S::Window,
    session: S,
}

impl Bootstrap {
    /// Bring the stack up with the default selection policy
    pub fn new(config: &BootstrapConfig) -> Result<Self, BootstrapError> {
        Self::with_policy(config, SelectionPolicy::default())
    }

    /// Bring the stack up with an explicit queue family selection policy
    pub fn with_policy(config: &BootstrapConfig, policy: SelectionPolicy) -> Result<Self, BootstrapError> {
        let mut session = PlatformSession::open()?;
        if !session.vulkan_supported() {
            log::warn!("Window system found no Vulkan loader; trying to load it directly");
        }

        let library = session.load_driver()?;
        let window_extensions = session.required_instance_extensions()?;

        let instance = DriverInstanceFactory::new(&library)
            .required_extensions(window_extensions)
            .optional_extensions(AshPresentationQueries::extension_names())
            .with_diagnostics(config.application.diagnostics_enabled())
            .with_platform(session.platform())
            .build(&ApplicationDescriptor::from(&config.application))?;

        let window = session.create_window(&config.window, WindowFlags::from_config(&config.window))?;

        let queries = AshPresentationQueries::new(&instance);
        let native = X11WindowSystem;
        let queue_family = DeviceSelector::new(PresentationSupportOracle::new(&queries, &native))
            .with_policy(policy)
            .select(&instance, &window.native_info())?
            .ok_or(BootstrapError::SelectionExhausted)?;

        let device = LogicalDevice::new(&instance, &queue_family)?;
        let mut manager =
            SurfaceLifecycleManager::new(AshPresentationBackend::new(&instance, &device), queue_family.index);

        if window.is_visible() {
            manager.create(&window.surface_target())?;
        } else {
            log::info!("Window starts hidden; surface deferred");
        }

        Ok(Self::from_parts(manager, device, instance, window, session))
    }
}

impl<S, B, D, I> Bootstrap<S, B, D, I>
where
    S: HostSession,
    B: PresentationBackend,
{
    /// Assemble from already acquired parts
    pub const fn from_parts(
        manager: SurfaceLifecycleManager<B>,
        device: D,
        instance: I,
        window: S::Window,
        session: S,
    ) -> Self {
        Self {
            manager,
            device,
            instance,
            window,
            session,
        }
    }

    /// Run the lifecycle loop until quit, then tear everything down
    ///
    /// Returns the process exit code. On error the parts are released in the
    /// same order by drop.
    pub fn run(mut self) -> Result<i32, BootstrapError> {
        if !self.window.is_visible() {
            self.window.show();
        }
        if !self.manager.is_active() {
            self.manager.create(&self.window.surface_target())?;
        }

        let mut events = self.session.events(&self.window);
        let exit = LifecycleEventLoop::new().run(&mut events, &mut self.manager)?;
        drop(events);

        self.shutdown();
        Ok(exit.code)
    }

    fn shutdown(self) {
        let Self {
            mut manager,
            device,
            instance,
            window,
            session,
        } = self;

        log::info!("Shutting down");
        manager.destroy();
        drop(manager);
        drop(device);
        drop(instance);
        drop(window);
        session.close();
    }

    /// The application window
    pub const fn window(&self) -> &S::Window {
        &self.window
    }

    /// The driver instance
    pub const fn instance(&self) -> &I {
        &self.instance
    }

    /// The logical device and its queue
    pub const fn device(&self) -> &D {
        &self.device
    }

    /// The surface/swapchain manager
    pub const fn surface_manager(&self) -> &SurfaceLifecycleManager<B> {
        &self.manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{EventSource, LifecycleEvent};
    use crate::platform::SurfaceTarget;
    use crate::render::vulkan::surface::tests::{target, MockBackend};
    use ash::vk;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[test]
    fn test_error_conversions() {
        let err: BootstrapError = VulkanError::NoSurfaceFormats.into();
        assert!(matches!(err, BootstrapError::Vulkan(VulkanError::NoSurfaceFormats)));

        let err: BootstrapError = PlatformError::new("no display").into();
        assert_eq!(err.to_string(), "Platform error: no display");

        let err: BootstrapError = ConfigError::Invalid("width is zero".to_string()).into();
        assert!(matches!(err, BootstrapError::Config(_)));
    }

    /// Records its name when dropped
    struct Released(&'static str, Rc<RefCell<Vec<String>>>);

    impl Drop for Released {
        fn drop(&mut self) {
            self.1.borrow_mut().push(self.0.to_string());
        }
    }

    struct TestWindow {
        visible: bool,
        _released: Released,
    }

    impl HostWindow for TestWindow {
        fn is_visible(&self) -> bool {
            self.visible
        }

        fn show(&mut self) {
            self.visible = true;
        }

        fn surface_target(&self) -> SurfaceTarget {
            target()
        }
    }

    struct TestSession {
        pending: VecDeque<LifecycleEvent>,
        _released: Released,
    }

    struct TestEvents<'a> {
        pending: &'a mut VecDeque<LifecycleEvent>,
        window: &'a TestWindow,
    }

    impl EventSource for TestEvents<'_> {
        fn poll_event(&mut self) -> Option<LifecycleEvent> {
            self.pending.pop_front()
        }

        fn surface_target(&self) -> SurfaceTarget {
            self.window.surface_target()
        }
    }

    impl HostSession for TestSession {
        type Window = TestWindow;
        type Events<'a> = TestEvents<'a>;

        fn events<'a>(&'a mut self, window: &'a TestWindow) -> TestEvents<'a> {
            TestEvents {
                pending: &mut self.pending,
                window,
            }
        }

        fn close(self) {}
    }

    type TestBootstrap = Bootstrap<TestSession, MockBackend, Released, Released>;

    fn assemble(
        manager: SurfaceLifecycleManager<MockBackend>,
        visible: bool,
        events: &[LifecycleEvent],
        log: &Rc<RefCell<Vec<String>>>,
    ) -> TestBootstrap {
        Bootstrap::from_parts(
            manager,
            Released("device", Rc::clone(log)),
            Released("instance", Rc::clone(log)),
            TestWindow {
                visible,
                _released: Released("window", Rc::clone(log)),
            },
            TestSession {
                pending: events.iter().copied().collect(),
                _released: Released("session", Rc::clone(log)),
            },
        )
    }

    fn tail(log: &Rc<RefCell<Vec<String>>>, n: usize) -> Vec<String> {
        let log = log.borrow();
        log[log.len().saturating_sub(n)..].to_vec()
    }

    #[test]
    fn test_quit_releases_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut manager = SurfaceLifecycleManager::new(MockBackend::new(Rc::clone(&log)), 0);
        manager.create(&target()).unwrap();

        let app = assemble(manager, true, &[LifecycleEvent::Quit], &log);
        assert_eq!(app.run().unwrap(), 0);
        assert_eq!(
            tail(&log, 6),
            ["destroy_swapchain 2", "destroy_surface 1", "device", "instance", "window", "session"]
        );
    }

    #[test]
    fn test_hidden_window_is_shown_and_released_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let manager = SurfaceLifecycleManager::new(MockBackend::new(Rc::clone(&log)), 0);

        let app = assemble(manager, false, &[LifecycleEvent::Quit], &log);
        assert!(!app.window().is_visible());
        assert!(!app.surface_manager().is_active());

        assert_eq!(app.run().unwrap(), 0);
        assert_eq!(log.borrow()[0], "create_surface 1");
        assert_eq!(
            tail(&log, 6),
            ["destroy_swapchain 2", "destroy_surface 1", "device", "instance", "window", "session"]
        );
    }

    #[test]
    fn test_loop_error_releases_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut manager = SurfaceLifecycleManager::new(MockBackend::new(Rc::clone(&log)), 0);
        manager.create(&target()).unwrap();
        manager.backend().fail_swapchain.set(true);

        let events = [LifecycleEvent::Resized { width: 1024, height: 768 }, LifecycleEvent::Quit];
        let app = assemble(manager, true, &events, &log);
        let err = app.run().unwrap_err();

        assert!(matches!(
            err,
            BootstrapError::Vulkan(VulkanError::Api(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY))
        ));
        assert_eq!(
            tail(&log, 6),
            ["destroy_swapchain 2", "destroy_surface 1", "device", "instance", "window", "session"]
        );
    }

    #[test]
    fn test_startup_error_releases_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut backend = MockBackend::new(Rc::clone(&log));
        backend.supported = false;
        let manager = SurfaceLifecycleManager::new(backend, 3);

        let app = assemble(manager, true, &[LifecycleEvent::Quit], &log);
        let err = app.run().unwrap_err();

        assert!(matches!(
            err,
            BootstrapError::Vulkan(VulkanError::PresentationUnsupported { queue_family: 3 })
        ));
        assert_eq!(
            log.borrow().as_slice(),
            ["create_surface 1", "surface_support 3 1", "destroy_surface 1", "device", "instance", "window", "session"]
        );
    }

    #[test]
    fn test_selection_exhausted_message() {
        assert!(BootstrapError::SelectionExhausted
            .to_string()
            .contains("queue family"));
    }
}
