use ash::vk;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use crate::renderer::vk::device::Device;
use crate::renderer::vk::instance::{Instance, Surface};

/// Number of back-buffers the swapchain is created with
pub const BACK_BUFFER_COUNT: u32 = 2;

pub struct Swapchain {
    pub raw: vk::SwapchainKHR,
    pub loader: ash::khr::swapchain::Device,
    pub images: Vec<vk::Image>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

impl Swapchain {
    pub fn new(
        instance: &Instance,
        device: &Device,
        surface: &Surface,
        window_size: vk::Extent2D,
    ) -> Result<Self> {
        let (capabilities, formats, present_modes) = unsafe {
            (
                surface.loader.get_physical_device_surface_capabilities(device.physical, surface.raw)?,
                surface.loader.get_physical_device_surface_formats(device.physical, surface.raw)?,
                surface.loader.get_physical_device_surface_present_modes(device.physical, surface.raw)?,
            )
        };

        let surface_format = choose_surface_format(&formats)?;
        let min_image_count = back_buffer_count(&capabilities)?;
        let image_extent = choose_extent(&capabilities, window_size);

        // Vsync: FIFO is the only mode every implementation must offer
        let present_mode = vk::PresentModeKHR::FIFO;
        debug_assert!(present_modes.contains(&present_mode));

        let pre_transform = if capabilities
            .supported_transforms
            .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
        {
            vk::SurfaceTransformFlagsKHR::IDENTITY
        } else {
            capabilities.current_transform
        };

        let loader = ash::khr::swapchain::Device::new(&instance.raw, &device.logical);
        let swapchain_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.raw)
            .min_image_count(min_image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(image_extent)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .image_array_layers(1);

        let raw = unsafe { loader.create_swapchain(&swapchain_info, None)? };

        let images = match unsafe { loader.get_swapchain_images(raw) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { loader.destroy_swapchain(raw, None) };
                return Err(e.into());
            }
        };
        if images.len() as u32 != BACK_BUFFER_COUNT {
            log::warn!(
                "Requested {} back-buffers, driver created {}",
                BACK_BUFFER_COUNT,
                images.len()
            );
        }

        log::info!(
            "Swapchain {}x{} {:?}, {} back-buffers",
            image_extent.width,
            image_extent.height,
            surface_format.format,
            images.len()
        );

        Ok(Self {
            raw,
            loader,
            images,
            format: surface_format.format,
            extent: image_extent,
        })
    }

    /// Index of the back-buffer to render into next; `signal` fires once it
    /// may be written.
    pub fn acquire(&self, signal: vk::Semaphore) -> Result<u32> {
        let (index, suboptimal) = unsafe {
            self.loader
                .acquire_next_image(self.raw, u64::MAX, signal, vk::Fence::null())?
        };
        if suboptimal {
            log::debug!("Swapchain is suboptimal for the surface");
        }
        Ok(index)
    }

    pub fn present(&self, queue: vk::Queue, index: u32, wait: vk::Semaphore) -> Result<()> {
        let wait_semaphores = [wait];
        let swapchains = [self.raw];
        let image_indices = [index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.loader.queue_present(queue, &present_info)? };
        Ok(())
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_swapchain(self.raw, None);
        }
    }
}

/// Prefers plain 8-bit RGBA, then BGRA, then whatever the surface lists first.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Result<vk::SurfaceFormatKHR> {
    [vk::Format::R8G8B8A8_UNORM, vk::Format::B8G8R8A8_UNORM]
        .iter()
        .find_map(|wanted| formats.iter().find(|f| f.format == *wanted))
        .or_else(|| formats.first())
        .copied()
        .ok_or_else(|| eyre!("Surface reports no formats"))
}

fn back_buffer_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> Result<u32> {
    let min = capabilities.min_image_count;
    let max = capabilities.max_image_count;
    if min > BACK_BUFFER_COUNT || (max > 0 && max < BACK_BUFFER_COUNT) {
        return Err(eyre!(
            "Surface cannot hold {} back-buffers (supports {}..={})",
            BACK_BUFFER_COUNT,
            min,
            if max == 0 { "unbounded".to_owned() } else { max.to_string() },
        ));
    }
    Ok(BACK_BUFFER_COUNT)
}

fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, window_size: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: window_size.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: window_size.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    fn capabilities(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
            ..Default::default()
        }
    }

    #[test]
    fn always_two_back_buffers() {
        assert_eq!(back_buffer_count(&capabilities(1, 0)).unwrap(), 2);
        assert_eq!(back_buffer_count(&capabilities(2, 8)).unwrap(), 2);
        assert_eq!(back_buffer_count(&capabilities(1, 2)).unwrap(), 2);
    }

    #[test]
    fn surfaces_that_cannot_double_buffer_are_rejected() {
        assert!(back_buffer_count(&capabilities(3, 8)).is_err());
        assert!(back_buffer_count(&capabilities(1, 1)).is_err());
    }

    #[test]
    fn rgba_preferred_over_bgra() {
        let formats = [
            format(vk::Format::B8G8R8A8_SRGB),
            format(vk::Format::B8G8R8A8_UNORM),
            format(vk::Format::R8G8B8A8_UNORM),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::R8G8B8A8_UNORM);

        let formats = [format(vk::Format::B8G8R8A8_SRGB), format(vk::Format::B8G8R8A8_UNORM)];
        assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::B8G8R8A8_UNORM);

        let formats = [format(vk::Format::A2B10G10R10_UNORM_PACK32)];
        assert_eq!(
            choose_surface_format(&formats).unwrap().format,
            vk::Format::A2B10G10R10_UNORM_PACK32
        );
        assert!(choose_surface_format(&[]).is_err());
    }

    #[test]
    fn extent_follows_window_when_surface_defers() {
        let extent = choose_extent(&capabilities(1, 0), vk::Extent2D { width: 1280, height: 720 });
        assert_eq!((extent.width, extent.height), (1280, 720));

        let mut fixed = capabilities(1, 0);
        fixed.current_extent = vk::Extent2D { width: 800, height: 600 };
        let extent = choose_extent(&fixed, vk::Extent2D { width: 1280, height: 720 });
        assert_eq!((extent.width, extent.height), (800, 600));
    }
}
