use std::ffi::CString;
use std::ops::Deref;

use ash::vk;

use crate::rhi::GfxResult;
use crate::vulkan::{convert::vk_error, debug_messenger::DebugType};

/// Vulkan 逻辑设备封装
///
/// 只使用 core 1.3 的功能：dynamic rendering, synchronization2, timeline semaphore, buffer device address
#[derive(Clone)]
pub struct VulkanDevice {
    /// 核心 Vulkan 设备 API
    pub(crate) device: ash::Device,
    /// 调试工具扩展 API，validation 关闭时为 None
    pub(crate) debug_utils: Option<ash::ext::debug_utils::Device>,
}

// 创建与销毁
impl VulkanDevice {
    pub fn new(
        instance: &ash::Instance,
        pdevice: vk::PhysicalDevice,
        queue_family_index: u32,
        debug_utils_enabled: bool,
    ) -> GfxResult<Self> {
        let _span = ocular_crate_tools::profile_span!("VulkanDevice::new");

        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family_index)
            .queue_priorities(&[1.0])];

        // device 所需的 features
        let mut features_13 = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);
        let mut features_12 = vk::PhysicalDeviceVulkan12Features::default()
            .timeline_semaphore(true)
            .buffer_device_address(true);
        let mut all_features = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut features_13)
            .push_next(&mut features_12);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .push_next(&mut all_features);

        let device = unsafe {
            instance.create_device(pdevice, &device_create_info, None).map_err(vk_error("vkCreateDevice"))?
        };
        let debug_utils = debug_utils_enabled.then(|| ash::ext::debug_utils::Device::new(instance, &device));

        Ok(Self { device, debug_utils })
    }

    pub fn destroy(self) {
        log::info!("destroying device");
        unsafe {
            self.device.destroy_device(None);
        }
    }
}

// tools
impl VulkanDevice {
    pub fn set_debug_name<T: DebugType>(&self, handle: &T, name: impl AsRef<str>) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let debug_name = format!("{}::{}", T::debug_type_name(), name.as_ref());
        let Ok(debug_name) = CString::new(debug_name) else {
            return;
        };
        unsafe {
            let result = debug_utils.set_debug_utils_object_name(
                &vk::DebugUtilsObjectNameInfoEXT::default()
                    .object_name(debug_name.as_c_str())
                    .object_handle(handle.vk_handle()),
            );
            if let Err(e) = result {
                log::warn!("failed to set debug name {:?}: {:?}", debug_name, e);
            }
        }
    }

    pub fn begin_label(&self, command_buffer: vk::CommandBuffer, label: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(label) = CString::new(label) else {
            return;
        };
        unsafe {
            debug_utils.cmd_begin_debug_utils_label(
                command_buffer,
                &vk::DebugUtilsLabelEXT::default().label_name(label.as_c_str()).color([0.5, 0.8, 0.9, 1.0]),
            );
        }
    }

    pub fn end_label(&self, command_buffer: vk::CommandBuffer) {
        if let Some(debug_utils) = &self.debug_utils {
            unsafe { debug_utils.cmd_end_debug_utils_label(command_buffer) };
        }
    }
}

impl Deref for VulkanDevice {
    type Target = ash::Device;
    fn deref(&self) -> &Self::Target {
        &self.device
    }
}
