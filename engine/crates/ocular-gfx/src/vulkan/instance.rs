use std::ffi::{CStr, CString, c_char};

use ash::vk;

use crate::rhi::{GfxError, GfxResult};
use crate::vulkan::{convert::vk_error, debug_messenger::DebugMessenger};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

pub struct VulkanInstance {
    pub(crate) ash_instance: ash::Instance,
    /// 是否启用了 debug utils（validation 打开时才启用）
    pub(crate) debug_utils_enabled: bool,
}

// 创建与销毁
impl VulkanInstance {
    /// 设置所需的 layers 和 extensions，创建 vk instance
    ///
    /// 不需要任何 surface 相关的 extension：图像由合成器显示
    pub fn new(entry: &ash::Entry, app_name: &str, validation: bool) -> GfxResult<Self> {
        let app_name = CString::new(app_name).map_err(|e| GfxError::backend("vkCreateInstance", e))?;
        let app_info = vk::ApplicationInfo::default()
            .api_version(vk::API_VERSION_1_3) // 需要 dynamic rendering, sync2, timeline semaphore
            .application_name(app_name.as_c_str())
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"Ocular")
            .engine_version(vk::make_api_version(0, 1, 0, 0));

        let supported_layers = unsafe {
            entry.enumerate_instance_layer_properties().map_err(vk_error("vkEnumerateInstanceLayerProperties"))?
        };
        let validation_available = supported_layers
            .iter()
            .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER);
        let validation = if validation && !validation_available {
            log::warn!("validation layer requested but not installed, continue without it");
            false
        } else {
            validation
        };

        let mut enabled_layers: Vec<*const c_char> = vec![];
        let mut enabled_exts: Vec<*const c_char> = vec![];
        if validation {
            enabled_layers.push(VALIDATION_LAYER.as_ptr());
            enabled_exts.push(ash::ext::debug_utils::NAME.as_ptr());
        }
        log::info!("instance layers: {:?}, debug utils: {}", enabled_layers.len(), validation);

        let mut debug_ci = DebugMessenger::create_info();
        let mut instance_ci = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&enabled_exts)
            .enabled_layer_names(&enabled_layers);
        if validation {
            // 为 instance 的创建过程添加 debug messenger
            instance_ci = instance_ci.push_next(&mut debug_ci);
        }

        let ash_instance =
            unsafe { entry.create_instance(&instance_ci, None).map_err(vk_error("vkCreateInstance"))? };

        Ok(Self {
            ash_instance,
            debug_utils_enabled: validation,
        })
    }

    pub fn destroy(self) {
        log::info!("destroying instance");
        unsafe {
            self.ash_instance.destroy_instance(None);
        }
    }
}

// getters
impl VulkanInstance {
    #[inline]
    pub fn ash_instance(&self) -> &ash::Instance {
        &self.ash_instance
    }
}
