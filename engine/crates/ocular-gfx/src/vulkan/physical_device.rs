use std::ffi::CStr;

use ash::vk;
use itertools::Itertools;

use crate::rhi::{
    GfxError, GfxResult,
    types::{AdapterInfo, AdapterLuid},
};
use crate::vulkan::convert::vk_error;

/// 表示一张物理显卡
pub struct VulkanPhysicalDevice {
    pub(crate) handle: vk::PhysicalDevice,
    pub(crate) basic_props: vk::PhysicalDeviceProperties,
    pub(crate) luid: Option<AdapterLuid>,
    /// 全能的 queue family：graphics, compute, transfer
    pub(crate) universal_queue_family: u32,
}

impl VulkanPhysicalDevice {
    /// 找到所有可用的显卡：需要支持 Vulkan 1.3 以及一个全能的 queue family
    pub fn enumerate(instance: &ash::Instance) -> GfxResult<Vec<Self>> {
        let pdevices =
            unsafe { instance.enumerate_physical_devices().map_err(vk_error("vkEnumeratePhysicalDevices"))? };
        Ok(pdevices.into_iter().filter_map(|pdevice| Self::new(pdevice, instance)).collect_vec())
    }

    fn new(pdevice: vk::PhysicalDevice, instance: &ash::Instance) -> Option<Self> {
        let mut id_props = vk::PhysicalDeviceIDProperties::default();
        let mut props2 = vk::PhysicalDeviceProperties2::default().push_next(&mut id_props);
        unsafe { instance.get_physical_device_properties2(pdevice, &mut props2) };
        let basic_props = props2.properties;

        let name = Self::name_of(&basic_props);
        if basic_props.api_version < vk::API_VERSION_1_3 {
            log::info!("skip gpu {:?}: vulkan 1.3 not supported", name);
            return None;
        }

        let queue_family_props = unsafe { instance.get_physical_device_queue_family_properties(pdevice) };
        log::debug!("gpu {:?} queue family props:\n{:#?}", name, queue_family_props);

        // 全能的 Queue：graphics, compute, transfer
        let universal = vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER;
        let Some((family_idx, _)) =
            queue_family_props.iter().find_position(|props| props.queue_flags.contains(universal))
        else {
            log::info!("skip gpu {:?}: no universal queue family", name);
            return None;
        };

        let luid = (id_props.device_luid_valid == vk::TRUE).then_some(AdapterLuid(id_props.device_luid));
        log::info!("found gpu: {:?}, luid: {:?}", name, luid);

        Some(Self {
            handle: pdevice,
            basic_props,
            luid,
            universal_queue_family: family_idx as u32,
        })
    }

    /// LUID 匹配的显卡；否则优先选择独立显卡，如果没有则选择第一个可用的显卡
    pub fn select(mut candidates: Vec<Self>, luid: Option<AdapterLuid>) -> GfxResult<Self> {
        if let Some(luid) = luid {
            if let Some(pos) = candidates.iter().position(|pd| pd.luid == Some(luid)) {
                return Ok(candidates.swap_remove(pos));
            }
            log::warn!("no gpu matches headset adapter {:?}, falling back", luid);
        }

        candidates.into_iter().find_or_first(Self::is_descrete_gpu).ok_or_else(|| GfxError::NoAdapter {
            reason: "no vulkan 1.3 capable gpu with a universal queue".to_string(),
        })
    }

    pub fn destroy(self) {
        // 无需销毁
    }
}

// getters
impl VulkanPhysicalDevice {
    /// 当前 gpu 是否是独立显卡
    #[inline]
    pub fn is_descrete_gpu(&self) -> bool {
        self.basic_props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
    }

    pub fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            name: Self::name_of(&self.basic_props),
            luid: self.luid,
            vendor_id: self.basic_props.vendor_id,
            device_id: self.basic_props.device_id,
            discrete: self.is_descrete_gpu(),
            max_push_constants_size: self.basic_props.limits.max_push_constants_size,
        }
    }

    fn name_of(props: &vk::PhysicalDeviceProperties) -> String {
        props.device_name_as_c_str().map(CStr::to_string_lossy).unwrap_or_default().into_owned()
    }
}
