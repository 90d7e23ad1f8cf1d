use ash::vk;

use crate::rhi::GfxResult;
use crate::vulkan::{convert::vk_error, debug_messenger::DebugType, device::VulkanDevice};

/// 使用 timeline semaphore 实现的单调 fence
pub struct VulkanFence {
    pub(crate) semaphore: vk::Semaphore,
}

// 创建与销毁
impl VulkanFence {
    pub(crate) fn new(device: &VulkanDevice, initial_value: u64, name: &str) -> GfxResult<Self> {
        let mut timeline_ci = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let semaphore_ci = vk::SemaphoreCreateInfo::default().push_next(&mut timeline_ci);
        let semaphore =
            unsafe { device.create_semaphore(&semaphore_ci, None).map_err(vk_error("vkCreateSemaphore"))? };

        let fence = Self { semaphore };
        device.set_debug_name(&fence, name);
        Ok(fence)
    }

    pub(crate) fn destroy(self, device: &VulkanDevice) {
        unsafe { device.destroy_semaphore(self.semaphore, None) }
    }
}

// tools
impl VulkanFence {
    #[inline]
    pub(crate) fn completed_value(&self, device: &VulkanDevice) -> GfxResult<u64> {
        unsafe {
            device.get_semaphore_counter_value(self.semaphore).map_err(vk_error("vkGetSemaphoreCounterValue"))
        }
    }

    /// 阻塞直到 semaphore 的值到达 value，没有超时
    pub(crate) fn wait(&self, device: &VulkanDevice, value: u64) -> GfxResult<()> {
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(std::slice::from_ref(&self.semaphore))
            .values(std::slice::from_ref(&value));
        unsafe { device.wait_semaphores(&wait_info, u64::MAX).map_err(vk_error("vkWaitSemaphores")) }
    }
}

impl DebugType for VulkanFence {
    fn debug_type_name() -> &'static str {
        "VulkanTimelineFence"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.semaphore
    }
}
