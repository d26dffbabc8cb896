//! Window surface and swapchain lifecycle
//!
//! The surface only exists while the application is in the foreground.
//! Entering the background destroys it together with its swapchain;
//! returning to the foreground builds both again against the same queue
//! family selected at startup.

use super::device::LogicalDevice;
use super::error::{VulkanError, VulkanResult};
use super::instance::DriverInstance;
use super::swapchain::{Swapchain, SwapchainDesc};
use crate::platform::SurfaceTarget;
use ash::extensions::khr;
use ash::{vk, Device, Entry, Instance};

/// Driver operations the surface manager needs
pub trait PresentationBackend {
    /// Create a surface for the given window
    fn create_surface(&self, target: &SurfaceTarget) -> VulkanResult<vk::SurfaceKHR>;

    /// Destroy a surface; its swapchain must already be gone
    fn destroy_surface(&self, surface: vk::SurfaceKHR);

    /// Whether `queue_family` can present to `surface`
    fn surface_support(&self, queue_family: u32, surface: vk::SurfaceKHR) -> VulkanResult<bool>;

    /// Current surface capabilities
    fn surface_capabilities(&self, surface: vk::SurfaceKHR) -> VulkanResult<vk::SurfaceCapabilitiesKHR>;

    /// Formats the surface accepts
    fn surface_formats(&self, surface: vk::SurfaceKHR) -> VulkanResult<Vec<vk::SurfaceFormatKHR>>;

    /// Create a swapchain
    fn create_swapchain(&self, desc: &SwapchainDesc) -> VulkanResult<vk::SwapchainKHR>;

    /// Number of images in a swapchain
    fn swapchain_image_count(&self, swapchain: vk::SwapchainKHR) -> VulkanResult<u32>;

    /// Destroy a swapchain
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);

    /// Block until the device is idle
    fn wait_idle(&self) -> VulkanResult<()>;
}

/// `PresentationBackend` over the real driver
///
/// Holds copies of the function tables. The instance and device they came
/// from must outlive it.
pub struct AshPresentationBackend {
    entry: Entry,
    instance: Instance,
    device: Device,
    physical_device: vk::PhysicalDevice,
    surface_loader: khr::Surface,
    swapchain_loader: khr::Swapchain,
}

impl AshPresentationBackend {
    /// Backend for surfaces presented by `device`
    pub fn new(instance: &DriverInstance, device: &LogicalDevice) -> Self {
        let surface_loader = khr::Surface::new(instance.entry(), instance.instance());
        let swapchain_loader = khr::Swapchain::new(instance.instance(), device.device());

        Self {
            entry: instance.entry().clone(),
            instance: instance.instance().clone(),
            device: device.device().clone(),
            physical_device: device.queue_family().device.handle,
            surface_loader,
            swapchain_loader,
        }
    }
}

impl PresentationBackend for AshPresentationBackend {
    fn create_surface(&self, target: &SurfaceTarget) -> VulkanResult<vk::SurfaceKHR> {
        // SAFETY: the handles come from a live window owned by the platform session.
        let surface = unsafe {
            ash_window::create_surface(&self.entry, &self.instance, target.display, target.window, None)?
        };
        Ok(surface)
    }

    fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        unsafe { self.surface_loader.destroy_surface(surface, None) };
    }

    fn surface_support(&self, queue_family: u32, surface: vk::SurfaceKHR) -> VulkanResult<bool> {
        let supported = unsafe {
            self.surface_loader
                .get_physical_device_surface_support(self.physical_device, queue_family, surface)?
        };
        Ok(supported)
    }

    fn surface_capabilities(&self, surface: vk::SurfaceKHR) -> VulkanResult<vk::SurfaceCapabilitiesKHR> {
        let caps = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, surface)?
        };
        Ok(caps)
    }

    fn surface_formats(&self, surface: vk::SurfaceKHR) -> VulkanResult<Vec<vk::SurfaceFormatKHR>> {
        let formats = unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(self.physical_device, surface)?
        };
        Ok(formats)
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> VulkanResult<vk::SwapchainKHR> {
        let create_info = desc.create_info();
        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None)? };
        Ok(swapchain)
    }

    fn swapchain_image_count(&self, swapchain: vk::SwapchainKHR) -> VulkanResult<u32> {
        let images = unsafe { self.swapchain_loader.get_swapchain_images(swapchain)? };
        u32::try_from(images.len())
            .map_err(|_| VulkanError::InitializationFailed(format!("{} swapchain images", images.len())))
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
    }

    fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

/// A live surface and its swapchain, if one has been built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Surface {
    /// Vulkan handle
    pub handle: vk::SurfaceKHR,
    /// Swapchain presenting to this surface
    pub swapchain: Option<Swapchain>,
}

/// Owns at most one surface at a time
pub struct SurfaceLifecycleManager<B: PresentationBackend> {
    backend: B,
    queue_family: u32,
    surface: Option<Surface>,
}

impl<B: PresentationBackend> SurfaceLifecycleManager<B> {
    /// Manager presenting from `queue_family`; starts with no surface
    pub const fn new(backend: B, queue_family: u32) -> Self {
        Self {
            backend,
            queue_family,
            surface: None,
        }
    }

    /// Create the surface and its first swapchain
    ///
    /// Does nothing when a surface already exists.
    pub fn create(&mut self, target: &SurfaceTarget) -> VulkanResult<()> {
        if self.surface.is_some() {
            log::debug!("Surface already exists; ignoring create");
            return Ok(());
        }

        let handle = self.backend.create_surface(target)?;
        match self.backend.surface_support(self.queue_family, handle) {
            Ok(true) => {}
            Ok(false) => {
                self.backend.destroy_surface(handle);
                return Err(VulkanError::PresentationUnsupported {
                    queue_family: self.queue_family,
                });
            }
            Err(e) => {
                self.backend.destroy_surface(handle);
                return Err(e);
            }
        }

        self.surface = Some(Surface {
            handle,
            swapchain: None,
        });
        log::info!("Surface created");

        let (width, height) = target.framebuffer_size;
        self.recreate(vk::Extent2D { width, height })
    }

    /// Build a swapchain for the current surface size, replacing the old one
    pub fn recreate(&mut self, window_extent: vk::Extent2D) -> VulkanResult<()> {
        let Some(surface) = self.surface.as_mut() else {
            log::debug!("No surface; swapchain deferred until foreground");
            return Ok(());
        };

        let caps = self.backend.surface_capabilities(surface.handle)?;
        let formats = self.backend.surface_formats(surface.handle)?;
        let old = surface.swapchain.map_or_else(vk::SwapchainKHR::null, |swapchain| swapchain.handle);
        let desc = SwapchainDesc::from_capabilities(surface.handle, &caps, &formats, window_extent, self.queue_family)?
            .replacing(old);

        if desc.is_zero_area() {
            if let Some(stale) = surface.swapchain.take() {
                self.backend.wait_idle()?;
                self.backend.destroy_swapchain(stale.handle);
                log::debug!("Retired {}x{} swapchain", stale.extent.width, stale.extent.height);
            }
            log::debug!("Zero-area surface; swapchain deferred");
            return Ok(());
        }

        if surface.swapchain.is_some() {
            self.backend.wait_idle()?;
        }

        let handle = self.backend.create_swapchain(&desc)?;
        let image_count = match self.backend.swapchain_image_count(handle) {
            Ok(count) => count,
            Err(e) => {
                self.backend.destroy_swapchain(handle);
                return Err(e);
            }
        };

        let swapchain = Swapchain {
            handle,
            format: desc.format,
            extent: desc.extent,
            image_count,
        };
        if let Some(retired) = surface.swapchain.replace(swapchain) {
            self.backend.destroy_swapchain(retired.handle);
        }

        log::info!(
            "Swapchain ready: {}x{}, {} images, {:?}",
            desc.extent.width,
            desc.extent.height,
            image_count,
            desc.format.format
        );
        Ok(())
    }

    /// Destroy the swapchain then the surface; no-op without a surface
    pub fn destroy(&mut self) {
        let Some(surface) = self.surface.take() else {
            return;
        };

        if let Err(e) = self.backend.wait_idle() {
            log::warn!("Device wait before surface teardown failed: {e}");
        }
        if let Some(swapchain) = surface.swapchain {
            self.backend.destroy_swapchain(swapchain.handle);
        }
        self.backend.destroy_surface(surface.handle);
        log::info!("Surface destroyed");
    }

    /// Current surface handle
    pub fn surface(&self) -> Option<vk::SurfaceKHR> {
        self.surface.map(|surface| surface.handle)
    }

    /// Current swapchain
    pub fn swapchain(&self) -> Option<&Swapchain> {
        self.surface.as_ref().and_then(|surface| surface.swapchain.as_ref())
    }

    /// Whether a surface exists
    pub const fn is_active(&self) -> bool {
        self.surface.is_some()
    }

    /// Queue family presenting to the surface
    pub const fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Underlying backend
    pub const fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: PresentationBackend> Drop for SurfaceLifecycleManager<B> {
    fn drop(&mut self) {
        self.destroy();
    }
}
