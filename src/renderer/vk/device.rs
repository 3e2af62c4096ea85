use std::ffi::{c_char, CStr};
use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::{eyre, OptionExt};
use color_eyre::Result;
use crate::renderer::adapter::{select_adapter, AdapterInfo};
use crate::renderer::feature_level::FeatureLevel;
use crate::renderer::vk::instance::{Instance, Surface};

/// The single direct queue: graphics work and presentation
pub struct Queue {
    pub family_index: u32,
    pub handle: vk::Queue,
}

struct Candidate {
    info: AdapterInfo,
    physical: vk::PhysicalDevice,
    queue_family_index: u32,
}

/// Logical device created on the selected adapter
pub struct Device {
    pub logical: Arc<ash::Device>,
    pub physical: vk::PhysicalDevice,
    pub adapter: AdapterInfo,
    pub feature_level: FeatureLevel,
    pub queue: Queue,
}

impl Device {
    pub fn new(
        instance: &Instance,
        surface: &Surface,
        preferred_adapter: Option<&str>,
    ) -> Result<Self> {
        let candidates = Self::enumerate_adapters(instance, surface)?;
        let infos = candidates
            .iter()
            .map(|candidate| candidate.info.clone())
            .collect::<Vec<_>>();
        let selected = select_adapter(&infos, preferred_adapter)
            .ok_or_eyre("No adapter can render and present to this window")?;
        let candidate = &candidates[selected.index];

        log::info!(
            "Using adapter {:?} (vendor {:#06x})",
            candidate.info.name,
            candidate.info.vendor_id
        );

        let (feature_level, logical) = FeatureLevel::first_supported(|level| {
            let required = level.api_version();
            if instance.api_version < required || candidate.info.api_version < required {
                return Err(eyre!(
                    "needs Vulkan {}.{}",
                    vk::api_version_major(required),
                    vk::api_version_minor(required),
                ));
            }
            Self::create_logical_device(
                instance,
                candidate.physical,
                candidate.queue_family_index,
            )
        })?;

        let queue = Queue {
            family_index: candidate.queue_family_index,
            handle: unsafe { logical.get_device_queue(candidate.queue_family_index, 0) },
        };

        Ok(Self {
            logical: Arc::new(logical),
            physical: candidate.physical,
            adapter: candidate.info.clone(),
            feature_level,
            queue,
        })
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.logical.device_wait_idle()? };
        Ok(())
    }

    /// Adapters that support the swapchain extension and have a queue family
    /// able to both draw and present, in enumeration order.
    fn enumerate_adapters(instance: &Instance, surface: &Surface) -> Result<Vec<Candidate>> {
        let physical_devices = unsafe { instance.raw.enumerate_physical_devices()? };

        let candidates = physical_devices
            .into_iter()
            .filter(|device| Self::supports_required_extensions(instance, *device))
            .filter_map(|device| {
                let queue_family_index = Self::find_queue_family(instance, surface, device)?;
                let props = unsafe { instance.raw.get_physical_device_properties(device) };
                let name = props
                    .device_name_as_c_str()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Some((device, queue_family_index, name, props))
            })
            .enumerate()
            .map(|(index, (physical, queue_family_index, name, props))| Candidate {
                info: AdapterInfo {
                    index,
                    name,
                    vendor_id: props.vendor_id,
                    api_version: props.api_version,
                },
                physical,
                queue_family_index,
            })
            .collect::<Vec<_>>();

        for candidate in &candidates {
            log::debug!("Adapter {}: {:?}", candidate.info.index, candidate.info.name);
        }

        Ok(candidates)
    }

    fn supports_required_extensions(instance: &Instance, device: vk::PhysicalDevice) -> bool {
        let supported = unsafe { instance.raw.enumerate_device_extension_properties(device) }
            .unwrap_or_default();

        Self::required_device_extensions().iter().all(|required| {
            supported
                .iter()
                .filter_map(|ext| ext.extension_name_as_c_str().ok())
                .any(|name| name == *required)
        })
    }

    fn find_queue_family(
        instance: &Instance,
        surface: &Surface,
        device: vk::PhysicalDevice,
    ) -> Option<u32> {
        let props = unsafe { instance.raw.get_physical_device_queue_family_properties(device) };

        props
            .iter()
            .enumerate()
            .find(|(i, family)| {
                let supports_graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
                let supports_present = unsafe {
                    surface
                        .loader
                        .get_physical_device_surface_support(device, *i as u32, surface.raw)
                }
                .unwrap_or(false);
                supports_graphics && supports_present
            })
            .map(|(i, _)| i as u32)
    }

    fn create_logical_device(
        instance: &Instance,
        physical: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> Result<ash::Device> {
        let queue_priorities = [1.0];
        let queue_create_infos = [
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(queue_family_index)
                .queue_priorities(&queue_priorities),
        ];

        let enabled_extension_names = Self::required_device_extensions()
            .iter()
            .map(|ext| ext.as_ptr())
            .collect::<Vec<*const c_char>>();

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&enabled_extension_names);

        Ok(unsafe {
            instance.raw.create_device(physical, &device_create_info, None)?
        })
    }

    fn required_device_extensions() -> Vec<&'static CStr> {
        vec![
            ash::khr::swapchain::NAME,

            #[cfg(target_os = "macos")]
            ash::khr::portability_subset::NAME,
        ]
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            self.logical.destroy_device(None);
        }
    }
}
