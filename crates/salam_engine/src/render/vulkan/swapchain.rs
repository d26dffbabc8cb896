//! Swapchain parameter selection
//!
//! Pure functions over surface capabilities so the choices can be tested
//! without a driver. Creation itself goes through a `PresentationBackend`.

use super::error::{VulkanError, VulkanResult};
use ash::vk;

/// Preferred swapchain format
pub const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Pick the preferred format if offered anywhere in the list, else the first entry
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> VulkanResult<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|sf| sf.format == PREFERRED_FORMAT.format && sf.color_space == PREFERRED_FORMAT.color_space)
        .or_else(|| formats.first())
        .copied()
        .ok_or(VulkanError::NoSurfaceFormats)
}

/// One image above the minimum, capped by the maximum (0 means unbounded)
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = caps.min_image_count.saturating_add(1);
    if caps.max_image_count == 0 {
        desired
    } else {
        desired.clamp(caps.min_image_count, caps.max_image_count.max(caps.min_image_count))
    }
}

/// Surface extent, or the window size clamped to the limits when the surface leaves it to us
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window_extent: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    vk::Extent2D {
        width: window_extent
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width.max(caps.min_image_extent.width)),
        height: window_extent
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height.max(caps.min_image_extent.height)),
    }
}

/// Everything needed to create one swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainDesc {
    /// Target surface
    pub surface: vk::SurfaceKHR,
    /// Minimum number of presentable images
    pub min_image_count: u32,
    /// Image format and color space
    pub format: vk::SurfaceFormatKHR,
    /// Image extent
    pub extent: vk::Extent2D,
    /// Transform applied at presentation
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    /// Presentation mode
    pub present_mode: vk::PresentModeKHR,
    /// Queue family that will present
    pub queue_family_index: u32,
    /// Swapchain being replaced, or null
    pub old_swapchain: vk::SwapchainKHR,
}

impl SwapchainDesc {
    /// Derive a description from the surface's current capabilities
    pub fn from_capabilities(
        surface: vk::SurfaceKHR,
        caps: &vk::SurfaceCapabilitiesKHR,
        formats: &[vk::SurfaceFormatKHR],
        window_extent: vk::Extent2D,
        queue_family_index: u32,
    ) -> VulkanResult<Self> {
        Ok(Self {
            surface,
            min_image_count: choose_image_count(caps),
            format: choose_surface_format(formats)?,
            extent: choose_extent(caps, window_extent),
            pre_transform: caps.current_transform,
            present_mode: vk::PresentModeKHR::FIFO,
            queue_family_index,
            old_swapchain: vk::SwapchainKHR::null(),
        })
    }

    /// Hint the driver with a swapchain this one replaces
    #[must_use]
    pub const fn replacing(mut self, old_swapchain: vk::SwapchainKHR) -> Self {
        self.old_swapchain = old_swapchain;
        self
    }

    /// Whether the extent has no area (minimized window)
    pub const fn is_zero_area(&self) -> bool {
        self.extent.width == 0 || self.extent.height == 0
    }

    /// Vulkan create info with the fixed parameters filled in
    pub fn create_info(&self) -> vk::SwapchainCreateInfoKHR {
        vk::SwapchainCreateInfoKHR::builder()
            .surface(self.surface)
            .min_image_count(self.min_image_count)
            .image_format(self.format.format)
            .image_color_space(self.format.color_space)
            .image_extent(self.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(self.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true)
            .old_swapchain(self.old_swapchain)
            .build()
    }
}

/// A live swapchain, owned by a `SurfaceLifecycleManager`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swapchain {
    /// Vulkan handle
    pub handle: vk::SwapchainKHR,
    /// Image format
    pub format: vk::SurfaceFormatKHR,
    /// Image extent
    pub extent: vk::Extent2D,
    /// Number of images the driver actually created
    pub image_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D { width: 800, height: 600 },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            ..Default::default()
        }
    }

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    #[test]
    fn test_preferred_format_found_anywhere() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            PREFERRED_FORMAT,
        ];
        assert_eq!(choose_surface_format(&formats).unwrap(), PREFERRED_FORMAT);
    }

    #[test]
    fn test_format_falls_back_to_first() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            // Right format, wrong color space
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap(), formats[0]);
    }

    #[test]
    fn test_empty_format_list_is_fatal() {
        assert_eq!(choose_surface_format(&[]), Err(VulkanError::NoSurfaceFormats));
    }

    #[test]
    fn test_image_count() {
        assert_eq!(choose_image_count(&caps(2, 3)), 3);
        assert_eq!(choose_image_count(&caps(3, 3)), 3);
        assert_eq!(choose_image_count(&caps(2, 8)), 3);
        // Unbounded
        assert_eq!(choose_image_count(&caps(4, 0)), 5);
    }

    #[test]
    fn test_extent_uses_current_extent() {
        let extent = choose_extent(&caps(2, 3), vk::Extent2D { width: 1024, height: 768 });
        assert_eq!(extent, vk::Extent2D { width: 800, height: 600 });
    }

    #[test]
    fn test_extent_sentinel_clamps_window_size() {
        let mut caps = caps(2, 3);
        caps.current_extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        caps.max_image_extent = vk::Extent2D { width: 1000, height: 500 };

        let extent = choose_extent(&caps, vk::Extent2D { width: 1024, height: 300 });
        assert_eq!(extent, vk::Extent2D { width: 1000, height: 300 });
    }

    #[test]
    fn test_desc_fixed_parameters() {
        let desc = SwapchainDesc::from_capabilities(
            vk::SurfaceKHR::from_raw(1),
            &caps(2, 3),
            &[PREFERRED_FORMAT],
            vk::Extent2D { width: 800, height: 600 },
            1,
        )
        .unwrap();

        assert_eq!(desc.present_mode, vk::PresentModeKHR::FIFO);
        assert_eq!(desc.min_image_count, 3);
        assert_eq!(desc.old_swapchain, vk::SwapchainKHR::null());
        assert!(!desc.is_zero_area());

        let info = desc.create_info();
        assert_eq!(info.image_array_layers, 1);
        assert_eq!(info.image_usage, vk::ImageUsageFlags::COLOR_ATTACHMENT);
        assert_eq!(info.image_sharing_mode, vk::SharingMode::EXCLUSIVE);
        assert_eq!(info.composite_alpha, vk::CompositeAlphaFlagsKHR::OPAQUE);
        assert_eq!(info.clipped, vk::TRUE);
        assert_eq!(info.queue_family_index_count, 0);
    }
}
