use crate::rhi::{
    command_list::GfxCommandList,
    error::GfxResult,
    types::{AdapterInfo, AdapterRequest, HeapDesc, ImageDesc, PipelineDesc, ResourceState},
};

/// 一张已经打开的显卡，以及其唯一的 universal queue
///
/// 设备拥有所有 GPU 对象。所有对象都需要通过对应的 `destroy_*` 手动销毁，
/// 最后调用 [`GfxDevice::destroy`] 销毁设备本身
///
/// 所有提交都进入同一个 queue，按照提交顺序串行执行
pub trait GfxDevice: Sized {
    /// 一段连续的 GPU 内存（Default 或 Upload）
    type Heap;
    /// 放置在 heap 固定偏移处的 buffer，其 GPU 地址在销毁之前不会改变
    type Buffer;
    type Image;
    type RenderTargetView: Copy;
    type DepthStencilView: Copy;
    /// 命令内存的分配器；只有在 GPU 执行完之前的录制之后才可以 reset
    type CommandAllocator;
    type CommandList: GfxCommandList<Self>;
    /// 单调递增的 fence
    type Fence;
    type Pipeline;

    fn adapter_info(&self) -> &AdapterInfo;

    /// placed resource 的对齐粒度，heap 的大小也按照这个粒度向上取整
    fn placement_granularity(&self) -> u64;

    // heap & buffer
    fn create_heap(&self, desc: &HeapDesc) -> GfxResult<Self::Heap>;
    /// heap 中还有 buffer 时不能销毁
    fn destroy_heap(&self, heap: Self::Heap) -> GfxResult<()>;
    fn create_placed_buffer(
        &self,
        heap: &Self::Heap,
        offset: u64,
        size: u64,
        initial_state: ResourceState,
        name: &str,
    ) -> GfxResult<Self::Buffer>;
    fn destroy_buffer(&self, buffer: Self::Buffer);
    fn buffer_gpu_address(&self, buffer: &Self::Buffer) -> u64;
    fn buffer_size(&self, buffer: &Self::Buffer) -> u64;
    /// map → 写入 data → unmap，只对 Upload heap 中的 buffer 有效
    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]) -> GfxResult<()>;

    // image & view
    fn create_image(&self, desc: &ImageDesc) -> GfxResult<Self::Image>;
    fn destroy_image(&self, image: Self::Image);
    fn create_render_target_view(&self, image: &Self::Image, name: &str) -> GfxResult<Self::RenderTargetView>;
    fn destroy_render_target_view(&self, view: Self::RenderTargetView);
    fn create_depth_stencil_view(&self, image: &Self::Image, name: &str) -> GfxResult<Self::DepthStencilView>;
    fn destroy_depth_stencil_view(&self, view: Self::DepthStencilView);

    // pipeline
    fn create_pipeline(&self, desc: &PipelineDesc) -> GfxResult<Self::Pipeline>;
    fn destroy_pipeline(&self, pipeline: Self::Pipeline);

    // command
    fn create_command_allocator(&self, name: &str) -> GfxResult<Self::CommandAllocator>;
    /// 回收 allocator 的所有命令内存
    ///
    /// 调用方需要保证 GPU 已经执行完这个 allocator 上的所有命令
    fn reset_command_allocator(&self, allocator: &mut Self::CommandAllocator) -> GfxResult<()>;
    fn destroy_command_allocator(&self, allocator: Self::CommandAllocator);
    /// 创建之后 command list 处于 closed 状态，使用前需要 reset
    fn create_command_list(&self, allocator: &Self::CommandAllocator, name: &str) -> GfxResult<Self::CommandList>;
    fn destroy_command_list(&self, list: Self::CommandList);

    // sync
    fn create_fence(&self, initial_value: u64, name: &str) -> GfxResult<Self::Fence>;
    fn destroy_fence(&self, fence: Self::Fence);
    /// GPU 已经完成的最大 fence 值
    fn fence_completed_value(&self, fence: &Self::Fence) -> GfxResult<u64>;
    /// 阻塞 CPU 直到 fence 到达 value，没有超时
    fn wait_fence(&self, fence: &Self::Fence, value: u64) -> GfxResult<()>;

    // queue
    /// 提交一个已经 close 的 command list
    fn submit(&self, list: &Self::CommandList) -> GfxResult<()>;
    /// 在 queue 中插入一个标记，GPU 执行到这里时 fence 的值变为 value
    fn signal(&self, fence: &Self::Fence, value: u64) -> GfxResult<()>;
    fn wait_idle(&self) -> GfxResult<()>;

    fn destroy(self);
}

/// 可以根据头显的要求打开显卡的后端
pub trait GfxBackend: GfxDevice {
    /// 后端特有的选项
    type Options;

    /// 优先选择 LUID 匹配的显卡；没有指定 LUID 时优先选择独立显卡，否则选择第一张
    fn open(request: &AdapterRequest, options: Self::Options) -> GfxResult<Self>;
}
