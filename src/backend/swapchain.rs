// Swapchain - Window presentation
//
// Negotiates format, present mode, extent and image count with the surface,
// creates the swapchain and one color view per image.

use ash::vk;

use super::device::{QueueFamilies, SwapchainSupport};
use super::driver::Driver;
use super::error::{BootstrapError, BootstrapResult};

/// Prefer 8-bit BGRA sRGB; otherwise take whatever the device lists first.
/// `formats` must not be empty.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    debug_assert!(!formats.is_empty());

    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
        .unwrap_or_default()
}

/// MAILBOX: no tearing, triple buffered. FIFO: vsync, always available.
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    present_modes
        .iter()
        .copied()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Use the surface's extent unless it reports the u32::MAX sentinel, in
/// which case the framebuffer size decides within the allowed range.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer_size: (u32, u32),
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let (width, height) = framebuffer_size;
    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum; a maximum of zero means unbounded
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && image_count > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        image_count
    }
}

/// A created swapchain and the images it handed back
#[derive(Debug, Clone)]
pub struct SwapchainImages {
    pub handle: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

pub fn create_swapchain<D: Driver>(
    driver: &D,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    families: QueueFamilies,
    framebuffer_size: (u32, u32),
) -> BootstrapResult<SwapchainImages> {
    // Re-query: the snapshot taken during selection may be stale
    let support = SwapchainSupport::query(driver, physical_device, surface)
        .map_err(BootstrapError::SwapchainCreation)?;
    if !support.is_adequate() {
        return Err(BootstrapError::SwapchainCreation(
            vk::Result::ERROR_FORMAT_NOT_SUPPORTED,
        ));
    }

    let surface_format = choose_surface_format(&support.formats);
    let present_mode = choose_present_mode(&support.present_modes);
    let extent = choose_extent(&support.capabilities, framebuffer_size);
    let image_count = choose_image_count(&support.capabilities);

    log::info!(
        "Creating swapchain: {}x{}, {:?}/{:?}, {:?}, {} images requested",
        extent.width,
        extent.height,
        surface_format.format,
        surface_format.color_space,
        present_mode,
        image_count
    );

    let queue_family_indices = [families.graphics, families.present];
    let mut create_info = vk::SwapchainCreateInfoKHR::builder()
        .surface(surface)
        .min_image_count(image_count)
        .image_format(surface_format.format)
        .image_color_space(surface_format.color_space)
        .image_extent(extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .pre_transform(support.capabilities.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(present_mode)
        .clipped(true);

    create_info = if families.is_shared() {
        create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
    } else {
        create_info
            .image_sharing_mode(vk::SharingMode::CONCURRENT)
            .queue_family_indices(&queue_family_indices)
    };

    let handle = driver
        .create_swapchain(&create_info)
        .map_err(BootstrapError::SwapchainCreation)?;

    // The driver may hand back more images than requested
    let images = match driver.swapchain_images(handle) {
        Ok(images) => images,
        Err(e) => {
            driver.destroy_swapchain(handle);
            return Err(BootstrapError::SwapchainCreation(e));
        }
    };

    log::info!("Created swapchain with {} images", images.len());

    Ok(SwapchainImages {
        handle,
        images,
        format: surface_format.format,
        extent,
    })
}

/// Create one 2D color view per image, in order, appending to `views`.
///
/// Stops at the first failure. Views created before it stay in `views` so
/// the caller's teardown can release them.
pub fn create_image_views<D: Driver>(
    driver: &D,
    images: &[vk::Image],
    format: vk::Format,
    views: &mut Vec<vk::ImageView>,
) -> BootstrapResult<()> {
    for (index, &image) in images.iter().enumerate() {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = driver
            .create_image_view(&create_info)
            .map_err(|result| BootstrapError::ImageViewCreation { index, result })?;
        views.push(view);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{Call, FailAt, MockDevice, MockDriver};
    use ash::vk::Handle;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    const PREFERRED: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };

    fn key(f: vk::SurfaceFormatKHR) -> (vk::Format, vk::ColorSpaceKHR) {
        (f.format, f.color_space)
    }

    #[test]
    fn preferred_format_is_chosen_wherever_it_appears() {
        assert_eq!(key(choose_surface_format(&[PREFERRED])), key(PREFERRED));

        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
            PREFERRED,
        ];
        assert_eq!(key(choose_surface_format(&formats)), key(PREFERRED));
    }

    #[test]
    fn first_format_is_the_fallback() {
        let only = format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT);
        assert_eq!(key(choose_surface_format(&[only])), key(only));

        let formats = [
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(key(choose_surface_format(&formats)), key(formats[0]));
    }

    #[test]
    fn mailbox_is_preferred() {
        let modes = [
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
        ];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
    }

    #[test]
    fn fifo_is_the_fallback() {
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO]),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO_RELAXED]),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn undefined_extent_is_clamped_per_dimension() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 200,
                height: 200,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, (50, 500));
        assert_eq!((extent.width, extent.height), (100, 200));

        let extent = choose_extent(&capabilities, (150, 120));
        assert_eq!((extent.width, extent.height), (150, 120));
    }

    #[test]
    fn defined_extent_is_used_verbatim() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 200,
                height: 200,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, (50, 500));
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn image_count_respects_maximum() {
        let mut capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&capabilities), 3);

        capabilities.max_image_count = 2;
        assert_eq!(choose_image_count(&capabilities), 2);

        capabilities.max_image_count = 8;
        assert_eq!(choose_image_count(&capabilities), 3);
    }

    #[test]
    fn shared_family_uses_exclusive_sharing() {
        let driver = MockDriver::new();
        let families = QueueFamilies {
            graphics: 0,
            present: 0,
        };

        let swapchain = create_swapchain(
            &driver,
            vk::PhysicalDevice::from_raw(1),
            vk::SurfaceKHR::null(),
            families,
            (800, 600),
        )
        .unwrap();

        let requests = driver.requests();
        assert_eq!(requests.swapchain_sharing, Some(vk::SharingMode::EXCLUSIVE));
        assert!(requests.swapchain_families.is_empty());
        assert_eq!(requests.swapchain_min_images, 3);
        assert_eq!(requests.swapchain_format, Some(key(PREFERRED)));
        assert_eq!(requests.swapchain_present_mode, Some(vk::PresentModeKHR::MAILBOX));
        assert_eq!(swapchain.images.len(), driver.swapchain_image_count);
        assert_eq!(swapchain.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn split_families_use_concurrent_sharing() {
        let driver = MockDriver::new();
        let families = QueueFamilies {
            graphics: 0,
            present: 1,
        };

        create_swapchain(
            &driver,
            vk::PhysicalDevice::from_raw(1),
            vk::SurfaceKHR::null(),
            families,
            (800, 600),
        )
        .unwrap();

        let requests = driver.requests();
        assert_eq!(requests.swapchain_sharing, Some(vk::SharingMode::CONCURRENT));
        assert_eq!(requests.swapchain_families, vec![0, 1]);
    }

    #[test]
    fn framebuffer_size_drives_undefined_extent() {
        let mut device = MockDevice::suitable("wayland", vk::PhysicalDeviceType::INTEGRATED_GPU);
        device.capabilities.current_extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        let driver = MockDriver::new().with_devices(vec![device]);

        let swapchain = create_swapchain(
            &driver,
            vk::PhysicalDevice::from_raw(1),
            vk::SurfaceKHR::null(),
            QueueFamilies {
                graphics: 0,
                present: 0,
            },
            (1024, 768),
        )
        .unwrap();

        assert_eq!((swapchain.extent.width, swapchain.extent.height), (1024, 768));
    }

    #[test]
    fn one_view_per_image() {
        let driver = MockDriver::new();
        let images: Vec<vk::Image> = (1..=3).map(vk::Image::from_raw).collect();
        let mut views = Vec::new();

        create_image_views(&driver, &images, vk::Format::B8G8R8A8_SRGB, &mut views).unwrap();
        assert_eq!(views.len(), images.len());
    }

    #[test]
    fn view_failure_keeps_earlier_views() {
        let driver = MockDriver::new().failing_at(FailAt::ImageView(1));
        let images: Vec<vk::Image> = (1..=3).map(vk::Image::from_raw).collect();
        let mut views = Vec::new();

        let err = create_image_views(&driver, &images, vk::Format::B8G8R8A8_SRGB, &mut views)
            .unwrap_err();
        assert!(matches!(err, BootstrapError::ImageViewCreation { index: 1, .. }));
        assert_eq!(views.len(), 1);
        assert_eq!(
            driver.calls(),
            vec![Call::CreateImageView, Call::CreateImageView]
        );
    }
}
