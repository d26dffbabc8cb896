//! Physical device and queue family selection, logical device creation

use super::error::{VulkanError, VulkanResult};
use super::instance::{c_name, DriverInstance};
use super::presentation::{PresentationSupportOracle, QueryError};
use crate::platform::NativeBackendInfo;
use ash::extensions::khr;
use ash::{vk, Device};
use std::ffi::{c_char, CStr};

/// Capabilities of one queue family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyInfo {
    /// Family accepts graphics commands
    pub supports_graphics: bool,
    /// Number of queues in the family
    pub count: u32,
}

/// Non-owning reference to a driver-enumerated device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalDeviceRef {
    /// Vulkan physical device handle
    pub handle: vk::PhysicalDevice,
    /// Device name as reported by the driver
    pub name: String,
    /// Discrete, integrated, virtual, CPU...
    pub device_type: vk::PhysicalDeviceType,
    /// Queue families in index order
    pub queue_families: Vec<QueueFamilyInfo>,
}

/// The queue family picked for graphics and presentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFamily {
    /// Device the family belongs to
    pub device: PhysicalDeviceRef,
    /// Family index on that device
    pub index: u32,
}

/// Anything that can enumerate physical devices
pub trait PhysicalDeviceSource {
    /// Devices in driver enumeration order
    fn physical_devices(&self) -> VulkanResult<Vec<PhysicalDeviceRef>>;
}

impl PhysicalDeviceSource for DriverInstance {
    fn physical_devices(&self) -> VulkanResult<Vec<PhysicalDeviceRef>> {
        let instance = self.instance();
        // SAFETY: the instance is live for the duration of these queries.
        let handles = unsafe { instance.enumerate_physical_devices()? };

        Ok(handles
            .into_iter()
            .map(|handle| {
                let (properties, families) = unsafe {
                    (
                        instance.get_physical_device_properties(handle),
                        instance.get_physical_device_queue_family_properties(handle),
                    )
                };

                PhysicalDeviceRef {
                    handle,
                    name: c_name(&properties.device_name),
                    device_type: properties.device_type,
                    queue_families: families
                        .iter()
                        .map(|family| QueueFamilyInfo {
                            supports_graphics: family.queue_flags.contains(vk::QueueFlags::GRAPHICS),
                            count: family.queue_count,
                        })
                        .collect(),
                }
            })
            .collect())
    }
}

/// What a failed presentation query counts as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryFallback {
    /// Treat the family as presentable and keep going (logged as a warning)
    #[default]
    Permissive,
    /// Treat the family as unable to present
    Strict,
}

/// Which qualifying family wins when several qualify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// The last qualifying family in enumeration order
    #[default]
    LastMatch,
    /// The first qualifying family in enumeration order
    FirstMatch,
}

/// Rules the selector applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionPolicy {
    /// Handling of presentation query errors
    pub on_query_error: QueryFallback,
    /// Tie-break between several qualifying families
    pub tie_break: TieBreak,
}

/// Picks the queue family used for the rest of the process
pub struct DeviceSelector<'a> {
    oracle: PresentationSupportOracle<'a>,
    policy: SelectionPolicy,
}

impl<'a> DeviceSelector<'a> {
    /// Selector with the default (permissive, last match) policy
    pub fn new(oracle: PresentationSupportOracle<'a>) -> Self {
        Self {
            oracle,
            policy: SelectionPolicy::default(),
        }
    }

    /// Override the selection policy
    #[must_use]
    pub const fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enumerate devices from `source` and select a family presenting to `window`
    pub fn select(
        &self,
        source: &dyn PhysicalDeviceSource,
        window: &NativeBackendInfo,
    ) -> VulkanResult<Option<QueueFamily>> {
        let devices = source.physical_devices()?;
        log::debug!("Enumerated {} physical device(s)", devices.len());
        Ok(self.select_from(&devices, window))
    }

    /// Select among already enumerated devices
    ///
    /// A family qualifies when it supports graphics and can present to
    /// `window`. Every device and family is visited in enumeration order.
    pub fn select_from(&self, devices: &[PhysicalDeviceRef], window: &NativeBackendInfo) -> Option<QueueFamily> {
        let selected = devices
            .iter()
            .flat_map(|device| (0u32..).zip(&device.queue_families).map(move |(index, family)| (device, index, family)))
            .filter(|(device, index, family)| {
                let graphics_ok = family.supports_graphics;
                let present_ok = graphics_ok && self.presentable(device, *index, window);
                log::debug!(
                    "{} family {index}: graphics={graphics_ok} present={present_ok}",
                    device.name
                );
                present_ok
            })
            .fold(None, |selected: Option<(&PhysicalDeviceRef, u32)>, (device, index, _)| {
                match (self.policy.tie_break, selected) {
                    (TieBreak::FirstMatch, Some(first)) => Some(first),
                    _ => Some((device, index)),
                }
            });

        selected.map(|(device, index)| {
            log::info!("Found queue family: {} {index}", device.name);
            QueueFamily {
                device: device.clone(),
                index,
            }
        })
    }

    fn presentable(&self, device: &PhysicalDeviceRef, index: u32, window: &NativeBackendInfo) -> bool {
        match self.oracle.query(device.handle, index, window) {
            Ok(supported) => supported,
            Err(error) => self.fallback(device, index, window, error),
        }
    }

    fn fallback(&self, device: &PhysicalDeviceRef, index: u32, window: &NativeBackendInfo, error: QueryError) -> bool {
        match self.policy.on_query_error {
            QueryFallback::Permissive => {
                log::warn!(
                    "Presentation support unknown for {} family {index} on {} backend ({error}); assuming supported",
                    device.name,
                    window.kind()
                );
                true
            }
            QueryFallback::Strict => {
                log::debug!(
                    "Presentation support unknown for {} family {index} ({error}); rejecting",
                    device.name
                );
                false
            }
        }
    }
}

/// Logical device with the single graphics/present queue
pub struct LogicalDevice {
    device: Device,
    queue: vk::Queue,
    queue_family: QueueFamily,
}

impl LogicalDevice {
    /// Create the device for `queue_family`, enabling swapchain support
    pub fn new(instance: &DriverInstance, queue_family: &QueueFamily) -> VulkanResult<Self> {
        let raw_instance = instance.instance();
        let physical_device = queue_family.device.handle;

        // SAFETY: the physical device was enumerated from this instance.
        let available: Vec<String> = unsafe { raw_instance.enumerate_device_extension_properties(physical_device)? }
            .iter()
            .map(|ext| c_name(&ext.extension_name))
            .collect();

        let has = |name: &CStr| name.to_str().is_ok_and(|name| available.iter().any(|ext| ext == name));

        if !has(khr::Swapchain::name()) {
            return Err(VulkanError::InitializationFailed(format!(
                "{} does not support {}",
                queue_family.device.name,
                khr::Swapchain::name().to_string_lossy()
            )));
        }

        let mut extensions: Vec<*const c_char> = vec![khr::Swapchain::name().as_ptr()];
        if has(vk::KhrPortabilitySubsetFn::name()) {
            extensions.push(vk::KhrPortabilitySubsetFn::name().as_ptr());
        }

        let priorities = [1.0_f32];
        let queue_infos = [vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family.index)
            .queue_priorities(&priorities)
            .build()];

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions);

        // SAFETY: every pointer in create_info outlives this call.
        let device = unsafe { raw_instance.create_device(physical_device, &create_info, None)? };
        // SAFETY: queue 0 of the family was requested above.
        let queue = unsafe { device.get_device_queue(queue_family.index, 0) };

        log::info!(
            "Created logical device on {} (queue family {})",
            queue_family.device.name,
            queue_family.index
        );

        Ok(Self {
            device,
            queue,
            queue_family: queue_family.clone(),
        })
    }

    /// Device function table
    pub const fn device(&self) -> &Device {
        &self.device
    }

    /// The graphics/present queue
    pub const fn queue(&self) -> vk::Queue {
        self.queue
    }

    /// Family the queue belongs to
    pub const fn queue_family(&self) -> &QueueFamily {
        &self.queue_family
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        // SAFETY: surfaces and swapchains are owned elsewhere and dropped first.
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
        log::info!("Logical device destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::vulkan::presentation::tests::{FakeDriver, FakeWindowSystem};
    use ash::vk::Handle;
    use std::ffi::c_void;

    fn family(supports_graphics: bool) -> QueueFamilyInfo {
        QueueFamilyInfo { supports_graphics, count: 1 }
    }

    fn physical(raw: u64, name: &str, families: Vec<QueueFamilyInfo>) -> PhysicalDeviceRef {
        PhysicalDeviceRef {
            handle: vk::PhysicalDevice::from_raw(raw),
            name: name.to_string(),
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            queue_families: families,
        }
    }

    fn win32() -> NativeBackendInfo {
        NativeBackendInfo::Win32 {
            hwnd: 0x10 as *mut c_void,
            hinstance: 0x20 as *mut c_void,
        }
    }

    struct FixedSource(Vec<PhysicalDeviceRef>);

    impl PhysicalDeviceSource for FixedSource {
        fn physical_devices(&self) -> VulkanResult<Vec<PhysicalDeviceRef>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSource;

    impl PhysicalDeviceSource for BrokenSource {
        fn physical_devices(&self) -> VulkanResult<Vec<PhysicalDeviceRef>> {
            Err(VulkanError::Api(vk::Result::ERROR_INITIALIZATION_FAILED))
        }
    }

    #[test]
    fn test_last_qualifying_family_wins() {
        // Device A family 0 and device B family 1 both qualify; B's is selected.
        let devices = vec![
            physical(1, "A", vec![family(true), family(false)]),
            physical(2, "B", vec![family(false), family(true)]),
        ];
        let driver = FakeDriver {
            presentable: vec![(1, 0), (2, 1)],
            ..FakeDriver::default()
        };
        let native = FakeWindowSystem(None);
        let selector = DeviceSelector::new(PresentationSupportOracle::new(&driver, &native));

        let selected = selector.select_from(&devices, &win32()).unwrap();
        assert_eq!(selected.device.name, "B");
        assert_eq!(selected.index, 1);
    }

    #[test]
    fn test_first_match_policy() {
        let devices = vec![
            physical(1, "A", vec![family(true)]),
            physical(2, "B", vec![family(true)]),
        ];
        let driver = FakeDriver::default();
        let native = FakeWindowSystem(None);
        let selector = DeviceSelector::new(PresentationSupportOracle::new(&driver, &native)).with_policy(
            SelectionPolicy {
                tie_break: TieBreak::FirstMatch,
                ..SelectionPolicy::default()
            },
        );

        let window = NativeBackendInfo::AppKit { ns_view: 0x30 as *mut c_void };
        let selected = selector.select_from(&devices, &window).unwrap();
        assert_eq!(selected.device.name, "A");
        assert_eq!(selected.index, 0);
    }

    #[test]
    fn test_last_match_within_one_device() {
        let devices = vec![physical(1, "A", vec![family(true), family(true), family(false)])];
        let driver = FakeDriver::default();
        let native = FakeWindowSystem(None);
        let selector = DeviceSelector::new(PresentationSupportOracle::new(&driver, &native));

        let window = NativeBackendInfo::AndroidNdk { native_window: 0x40 as *mut c_void };
        let selected = selector.select_from(&devices, &window).unwrap();
        assert_eq!(selected.index, 1);
    }

    #[test]
    fn test_no_candidate_returns_none() {
        let devices = vec![
            // Presentable but no graphics
            physical(1, "A", vec![family(false)]),
            // Graphics but can't present
            physical(2, "B", vec![family(true)]),
        ];
        let driver = FakeDriver {
            presentable: vec![(1, 0)],
            ..FakeDriver::default()
        };
        let native = FakeWindowSystem(None);
        let selector = DeviceSelector::new(PresentationSupportOracle::new(&driver, &native));

        assert_eq!(selector.select_from(&devices, &win32()), None);
        assert_eq!(selector.select_from(&[], &win32()), None);
    }

    #[test]
    fn test_query_failure_is_permissive_by_default() {
        let devices = vec![physical(1, "A", vec![family(true)])];
        let driver = FakeDriver::default();
        let native = FakeWindowSystem(None);
        let selector = DeviceSelector::new(PresentationSupportOracle::new(&driver, &native));

        for window in [
            NativeBackendInfo::Unknown,
            NativeBackendInfo::Unsupported(crate::platform::BackendKind::Web),
            NativeBackendInfo::Xlib { display: 0x10 as *mut c_void, window: 1, visual_id: 0 },
        ] {
            let selected = selector.select_from(&devices, &window).unwrap();
            assert_eq!(selected.index, 0);
        }
    }

    #[test]
    fn test_strict_policy_rejects_failed_queries() {
        let devices = vec![physical(1, "A", vec![family(true)])];
        let driver = FakeDriver::default();
        let native = FakeWindowSystem(None);
        let selector = DeviceSelector::new(PresentationSupportOracle::new(&driver, &native)).with_policy(
            SelectionPolicy {
                on_query_error: QueryFallback::Strict,
                ..SelectionPolicy::default()
            },
        );

        assert_eq!(selector.select_from(&devices, &NativeBackendInfo::Unknown), None);
    }

    #[test]
    fn test_non_graphics_families_skip_presentation_query() {
        let devices = vec![physical(1, "A", vec![family(false), family(false)])];
        let driver = FakeDriver::default();
        let native = FakeWindowSystem(None);
        let selector = DeviceSelector::new(PresentationSupportOracle::new(&driver, &native));

        assert_eq!(selector.select_from(&devices, &win32()), None);
        assert!(driver.calls.borrow().is_empty());
    }

    #[test]
    fn test_select_enumerates_source() {
        let source = FixedSource(vec![physical(7, "Only", vec![family(true)])]);
        let driver = FakeDriver {
            presentable: vec![(7, 0)],
            ..FakeDriver::default()
        };
        let native = FakeWindowSystem(None);
        let selector = DeviceSelector::new(PresentationSupportOracle::new(&driver, &native));

        let selected = selector.select(&source, &win32()).unwrap().unwrap();
        assert_eq!(selected.device.handle.as_raw(), 7);

        assert!(selector.select(&BrokenSource, &win32()).is_err());
    }
}
