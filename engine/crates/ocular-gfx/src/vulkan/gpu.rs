use std::mem::ManuallyDrop;

use ash::vk;

use crate::rhi::{
    GfxError, GfxResult,
    device::{GfxBackend, GfxDevice},
    types::{AdapterInfo, AdapterRequest, HeapDesc, ImageDesc, PipelineDesc, ResourceState},
};
use crate::vulkan::{
    command::{VulkanCommandAllocator, VulkanCommandList, image_barrier2},
    convert::vk_error,
    debug_messenger::DebugMessenger,
    device::VulkanDevice,
    fence::VulkanFence,
    heap::{VulkanBuffer, VulkanHeap},
    image::{VulkanDepthStencilView, VulkanImage, VulkanRenderTargetView},
    instance::VulkanInstance,
    physical_device::VulkanPhysicalDevice,
    pipeline::VulkanPipeline,
};

/// placed resource 的默认对齐粒度
pub const VULKAN_PLACEMENT_GRANULARITY: u64 = 64 * 1024;

#[derive(Clone, Debug, Default)]
pub struct VulkanOptions {
    /// 覆盖默认的 placement 粒度
    pub placement_granularity: Option<u64>,
}

/// Vulkan 后端：一个 instance，一张显卡，一个 universal queue
pub struct VulkanGpu {
    info: AdapterInfo,
    granularity: u64,

    queue: vk::Queue,
    queue_family_index: u32,

    /// 用于一次性命令（image 的初始 layout 转换）
    immediate: VulkanCommandAllocator,
    immediate_fence: vk::Fence,

    /// 必须在 device 之前销毁
    allocator: ManuallyDrop<vk_mem::Allocator>,
    device: VulkanDevice,
    physical_device: VulkanPhysicalDevice,
    debug_messenger: Option<DebugMessenger>,
    instance: VulkanInstance,

    /// 在 drop 之后，会卸载 dll，因此需要确保该字段最后 drop
    _entry: ash::Entry,
}

// 创建与销毁
impl VulkanGpu {
    fn new(request: &AdapterRequest, options: VulkanOptions) -> GfxResult<Self> {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| GfxError::NoAdapter {
            reason: format!("failed to load vulkan entry: {e}"),
        })?;
        let app_name = if request.app_name.is_empty() { "ocular" } else { request.app_name.as_str() };
        let instance = VulkanInstance::new(&entry, app_name, request.validation)?;

        let debug_messenger = if instance.debug_utils_enabled {
            Some(DebugMessenger::new(&entry, instance.ash_instance())?)
        } else {
            None
        };

        let candidates = VulkanPhysicalDevice::enumerate(instance.ash_instance())?;
        let physical_device = VulkanPhysicalDevice::select(candidates, request.luid)?;
        let info = physical_device.adapter_info();
        log::info!(
            "selected gpu: {}, luid: {:?}, discrete: {}, maxPushConstantsSize: {}",
            info.name,
            info.luid,
            info.discrete,
            info.max_push_constants_size
        );

        let queue_family_index = physical_device.universal_queue_family;
        let device = VulkanDevice::new(
            instance.ash_instance(),
            physical_device.handle,
            queue_family_index,
            instance.debug_utils_enabled,
        )?;
        let queue = unsafe { device.get_device_queue(queue_family_index, 0) };

        let mut vma_ci =
            vk_mem::AllocatorCreateInfo::new(instance.ash_instance(), &device.device, physical_device.handle);
        vma_ci.vulkan_api_version = vk::API_VERSION_1_3;
        vma_ci.flags = vk_mem::AllocatorCreateFlags::BUFFER_DEVICE_ADDRESS;
        let allocator = unsafe { vk_mem::Allocator::new(vma_ci).map_err(vk_error("vmaCreateAllocator"))? };

        let immediate = VulkanCommandAllocator::new(&device, queue_family_index, "immediate")?;
        let immediate_fence = unsafe {
            device.create_fence(&vk::FenceCreateInfo::default(), None).map_err(vk_error("vkCreateFence"))?
        };

        Ok(Self {
            info,
            granularity: options.placement_granularity.unwrap_or(VULKAN_PLACEMENT_GRANULARITY),
            queue,
            queue_family_index,
            immediate,
            immediate_fence,
            allocator: ManuallyDrop::new(allocator),
            device,
            physical_device,
            debug_messenger,
            instance,
            _entry: entry,
        })
    }
}

impl GfxDevice for VulkanGpu {
    type Heap = VulkanHeap;
    type Buffer = VulkanBuffer;
    type Image = VulkanImage;
    type RenderTargetView = VulkanRenderTargetView;
    type DepthStencilView = VulkanDepthStencilView;
    type CommandAllocator = VulkanCommandAllocator;
    type CommandList = VulkanCommandList;
    type Fence = VulkanFence;
    type Pipeline = VulkanPipeline;

    #[inline]
    fn adapter_info(&self) -> &AdapterInfo {
        &self.info
    }

    #[inline]
    fn placement_granularity(&self) -> u64 {
        self.granularity
    }

    fn create_heap(&self, desc: &HeapDesc) -> GfxResult<Self::Heap> {
        VulkanHeap::new(&self.device, &self.allocator, desc)
    }

    fn destroy_heap(&self, heap: Self::Heap) -> GfxResult<()> {
        heap.destroy(&self.allocator)
    }

    fn create_placed_buffer(
        &self,
        heap: &Self::Heap,
        offset: u64,
        size: u64,
        _initial_state: ResourceState,
        name: &str,
    ) -> GfxResult<Self::Buffer> {
        // buffer 在 Vulkan 中没有 layout，初始状态只影响之后 barrier 的 src mask
        VulkanBuffer::new_placed(&self.device, &self.allocator, heap, offset, size, name)
    }

    fn destroy_buffer(&self, buffer: Self::Buffer) {
        buffer.destroy(&self.device);
    }

    #[inline]
    fn buffer_gpu_address(&self, buffer: &Self::Buffer) -> u64 {
        buffer.gpu_address
    }

    #[inline]
    fn buffer_size(&self, buffer: &Self::Buffer) -> u64 {
        buffer.size
    }

    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]) -> GfxResult<()> {
        buffer.write(offset, data)
    }

    fn create_image(&self, desc: &ImageDesc) -> GfxResult<Self::Image> {
        let image = VulkanImage::new(&self.device, &self.allocator, desc)?;
        if desc.initial_state == ResourceState::Common {
            return Ok(image);
        }

        // 新创建的 image 处于 UNDEFINED，转换到要求的初始状态
        let barrier = image_barrier2(image.handle, image.subresource_range(), ResourceState::Common, desc.initial_state);
        let transition = unsafe { self.submit_immediate_barrier(&barrier) };
        match transition {
            Ok(()) => Ok(image),
            Err(e) => {
                image.destroy(&self.allocator);
                Err(e)
            }
        }
    }

    fn destroy_image(&self, image: Self::Image) {
        image.destroy(&self.allocator);
    }

    fn create_render_target_view(&self, image: &Self::Image, name: &str) -> GfxResult<Self::RenderTargetView> {
        Ok(VulkanRenderTargetView {
            view: image.create_view(&self.device, name)?,
        })
    }

    fn destroy_render_target_view(&self, view: Self::RenderTargetView) {
        unsafe { self.device.destroy_image_view(view.view, None) }
    }

    fn create_depth_stencil_view(&self, image: &Self::Image, name: &str) -> GfxResult<Self::DepthStencilView> {
        Ok(VulkanDepthStencilView {
            view: image.create_view(&self.device, name)?,
        })
    }

    fn destroy_depth_stencil_view(&self, view: Self::DepthStencilView) {
        unsafe { self.device.destroy_image_view(view.view, None) }
    }

    fn create_pipeline(&self, desc: &PipelineDesc) -> GfxResult<Self::Pipeline> {
        VulkanPipeline::new(&self.device, desc)
    }

    fn destroy_pipeline(&self, pipeline: Self::Pipeline) {
        pipeline.destroy(&self.device);
    }

    fn create_command_allocator(&self, name: &str) -> GfxResult<Self::CommandAllocator> {
        VulkanCommandAllocator::new(&self.device, self.queue_family_index, name)
    }

    fn reset_command_allocator(&self, allocator: &mut Self::CommandAllocator) -> GfxResult<()> {
        allocator.reset(&self.device)
    }

    fn destroy_command_allocator(&self, allocator: Self::CommandAllocator) {
        allocator.destroy(&self.device);
    }

    fn create_command_list(&self, _allocator: &Self::CommandAllocator, name: &str) -> GfxResult<Self::CommandList> {
        Ok(VulkanCommandList::new(&self.device, name))
    }

    fn destroy_command_list(&self, _list: Self::CommandList) {
        // command buffer 属于 allocator
    }

    fn create_fence(&self, initial_value: u64, name: &str) -> GfxResult<Self::Fence> {
        VulkanFence::new(&self.device, initial_value, name)
    }

    fn destroy_fence(&self, fence: Self::Fence) {
        fence.destroy(&self.device);
    }

    fn fence_completed_value(&self, fence: &Self::Fence) -> GfxResult<u64> {
        fence.completed_value(&self.device)
    }

    fn wait_fence(&self, fence: &Self::Fence, value: u64) -> GfxResult<()> {
        fence.wait(&self.device, value)
    }

    fn submit(&self, list: &Self::CommandList) -> GfxResult<()> {
        let Some(cmd) = list.command_buffer.filter(|_| list.is_closed()) else {
            return Err(GfxError::invalid_state("command list", "submit of a list that is not closed"));
        };
        let cmd_info = vk::CommandBufferSubmitInfo::default().command_buffer(cmd);
        let submit = vk::SubmitInfo2::default().command_buffer_infos(std::slice::from_ref(&cmd_info));
        unsafe {
            self.device
                .queue_submit2(self.queue, std::slice::from_ref(&submit), vk::Fence::null())
                .map_err(vk_error("vkQueueSubmit2"))
        }
    }

    fn signal(&self, fence: &Self::Fence, value: u64) -> GfxResult<()> {
        // 没有 command buffer 的提交，只 signal timeline semaphore
        let signal_info = vk::SemaphoreSubmitInfo::default()
            .semaphore(fence.semaphore)
            .value(value)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS);
        let submit = vk::SubmitInfo2::default().signal_semaphore_infos(std::slice::from_ref(&signal_info));
        unsafe {
            self.device
                .queue_submit2(self.queue, std::slice::from_ref(&submit), vk::Fence::null())
                .map_err(vk_error("vkQueueSubmit2"))
        }
    }

    fn wait_idle(&self) -> GfxResult<()> {
        unsafe { self.device.device_wait_idle().map_err(vk_error("vkDeviceWaitIdle")) }
    }

    fn destroy(mut self) {
        log::info!("destroying vulkan gpu");
        if let Err(e) = self.wait_idle() {
            log::error!("wait idle before destroy failed: {e}");
        }
        unsafe {
            self.device.destroy_fence(self.immediate_fence, None);
        }
        self.immediate.destroy(&self.device);
        // vma 需要在 device 之前销毁
        unsafe { ManuallyDrop::drop(&mut self.allocator) };
        self.device.destroy();
        self.physical_device.destroy();
        if let Some(debug_messenger) = self.debug_messenger {
            debug_messenger.destroy();
        }
        self.instance.destroy();
    }
}

// tools
impl VulkanGpu {
    /// 录制一个 barrier 并等待执行完成
    ///
    /// # Safety
    /// immediate 的 command buffer 不能正在被使用；只在单线程的创建路径上调用
    unsafe fn submit_immediate_barrier(&self, barrier: &vk::ImageMemoryBarrier2) -> GfxResult<()> {
        let cmd = self.immediate.command_buffer;
        unsafe {
            self.device
                .reset_command_pool(self.immediate.pool, vk::CommandPoolResetFlags::RELEASE_RESOURCES)
                .map_err(vk_error("vkResetCommandPool"))?;
            self.device
                .begin_command_buffer(
                    cmd,
                    &vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
                )
                .map_err(vk_error("vkBeginCommandBuffer"))?;
            self.device.cmd_pipeline_barrier2(
                cmd,
                &vk::DependencyInfo::default().image_memory_barriers(std::slice::from_ref(barrier)),
            );
            self.device.end_command_buffer(cmd).map_err(vk_error("vkEndCommandBuffer"))?;

            let cmd_info = vk::CommandBufferSubmitInfo::default().command_buffer(cmd);
            let submit = vk::SubmitInfo2::default().command_buffer_infos(std::slice::from_ref(&cmd_info));
            self.device
                .queue_submit2(self.queue, std::slice::from_ref(&submit), self.immediate_fence)
                .map_err(vk_error("vkQueueSubmit2"))?;
            self.device
                .wait_for_fences(std::slice::from_ref(&self.immediate_fence), true, u64::MAX)
                .map_err(vk_error("vkWaitForFences"))?;
            self.device
                .reset_fences(std::slice::from_ref(&self.immediate_fence))
                .map_err(vk_error("vkResetFences"))?;
        }
        Ok(())
    }
}

impl GfxBackend for VulkanGpu {
    type Options = VulkanOptions;

    fn open(request: &AdapterRequest, options: Self::Options) -> GfxResult<Self> {
        let _span = ocular_crate_tools::profile_span!("VulkanGpu::open");
        VulkanGpu::new(request, options)
    }
}
