use std::ffi::{c_char, c_void, CStr};
use ash::vk;
use color_eyre::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::window::Window;

/// Loads Vulkan and keeps the instance (and its debug messenger) alive
pub struct Instance {
    pub entry: ash::Entry,
    pub raw: ash::Instance,
    /// Highest API version both the loader and this program accept
    pub api_version: u32,

    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl Instance {
    const VALIDATION_LAYER: &'static CStr = c"VK_LAYER_KHRONOS_validation";

    pub fn new(window: &Window, enable_debug_layer: bool) -> Result<Self> {
        let entry = unsafe { ash::Entry::load()? };

        let api_version = unsafe { entry.try_enumerate_instance_version()? }
            .unwrap_or(vk::API_VERSION_1_0)
            .min(vk::API_VERSION_1_3);

        let debug_layer = enable_debug_layer && Self::validation_layer_supported(&entry)?;
        if enable_debug_layer && !debug_layer {
            log::warn!("{:?} not available, running without validation", Self::VALIDATION_LAYER);
        }

        let raw = Self::create_instance(&entry, window, api_version, debug_layer)?;

        let debug_utils = if debug_layer {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &raw);
            let messenger = unsafe {
                loader.create_debug_utils_messenger(&debug_utils_messenger_create_info(), None)
            };
            match messenger {
                Ok(messenger) => Some((loader, messenger)),
                Err(e) => {
                    unsafe { raw.destroy_instance(None) };
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        log::info!(
            "Vulkan instance {}.{} created (validation: {})",
            vk::api_version_major(api_version),
            vk::api_version_minor(api_version),
            debug_layer,
        );

        Ok(Self {
            entry,
            raw,
            api_version,
            debug_utils,
        })
    }

    fn create_instance(
        entry: &ash::Entry,
        window: &Window,
        api_version: u32,
        debug_layer: bool,
    ) -> Result<ash::Instance> {
        let application_info = vk::ApplicationInfo::default()
            .application_name(c"vkquad")
            .api_version(api_version);

        let enabled_layer_names = if debug_layer {
            vec![Self::VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        let mut enabled_extension_names = ash_window::enumerate_required_extensions(
            window.display_handle()?.as_raw(),
        )?
            .to_vec();
        if debug_layer {
            enabled_extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
        }
        #[cfg(target_os = "macos")]
        {
            enabled_extension_names.push(ash::khr::portability_enumeration::NAME.as_ptr());
            enabled_extension_names.push(ash::khr::get_physical_device_properties2::NAME.as_ptr());
        }

        let mut debug_info = debug_utils_messenger_create_info();
        let mut instance_info = vk::InstanceCreateInfo::default()
            .application_info(&application_info)
            .enabled_layer_names(&enabled_layer_names)
            .enabled_extension_names(&enabled_extension_names);
        if debug_layer {
            instance_info = instance_info.push_next(&mut debug_info);
        }

        #[cfg(target_os = "macos")]
        let instance_info = instance_info
            .flags(vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR);

        Ok(unsafe {
            entry.create_instance(&instance_info, None)?
        })
    }

    fn validation_layer_supported(entry: &ash::Entry) -> Result<bool> {
        let layers = unsafe { entry.enumerate_instance_layer_properties()? };
        Ok(layers
            .iter()
            .filter_map(|props| props.layer_name_as_c_str().ok())
            .any(|name| name == Self::VALIDATION_LAYER))
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.raw.destroy_instance(None);
        }
    }
}

/// Presentable surface of the window
pub struct Surface {
    pub raw: vk::SurfaceKHR,
    pub loader: ash::khr::surface::Instance,
}

impl Surface {
    pub fn new(instance: &Instance, window: &Window) -> Result<Self> {
        let raw = unsafe {
            ash_window::create_surface(
                &instance.entry,
                &instance.raw,
                window.display_handle()?.as_raw(),
                window.window_handle()?.as_raw(),
                None,
            )?
        };
        let loader = ash::khr::surface::Instance::new(&instance.entry, &instance.raw);
        Ok(Self { raw, loader })
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.raw, None);
        }
    }
}

fn debug_utils_messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    let message_severity = vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
    let message_type = vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE;
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(message_severity)
        .message_type(message_type)
        .pfn_user_callback(Some(debug_callback))
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    let msg_type = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "[General]",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "[Performance]",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "[Validation]",
        _ => "[Unknown]",
    };
    let msg = unsafe {
        let p_message: *const c_char = (*p_callback_data).p_message;
        if p_message.is_null() {
            c""
        } else {
            CStr::from_ptr(p_message)
        }
    };
    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE => {
            log::trace!("{} {:?}", msg_type, msg);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            log::debug!("{} {:?}", msg_type, msg);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("{} {:?}", msg_type, msg);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("{} {:?}", msg_type, msg);
        }
        _ => {
            log::warn!("{} {:?}", msg_type, msg);
        }
    }

    vk::FALSE
}
