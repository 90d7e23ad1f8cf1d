use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use itertools::Itertools;
use slotmap::SlotMap;

use crate::headless::{
    command_list::HeadlessCommandList,
    fence::HeadlessFence,
    resources::*,
};
use crate::rhi::{
    device::{GfxBackend, GfxDevice},
    error::{GfxError, GfxResult},
    types::{
        AdapterInfo, AdapterLuid, AdapterRequest, HeapDesc, HeapKind, ImageDesc, ImageUsage, PipelineDesc,
        ResourceState,
    },
};

/// D3D12 / Vulkan 上 placed resource 的默认对齐粒度
pub const DEFAULT_PLACEMENT_GRANULARITY: u64 = 64 * 1024;

/// 事件序列只保留最近的这么多条，长时间运行时不会无限增长
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 256;

/// `signal` 之后 fence 何时完成
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FenceCompletion {
    /// GPU 立即执行完，signal 的同时 fence 完成
    #[default]
    Immediate,
    /// 由测试通过 [`crate::headless::FenceCompleter`] 手动完成
    Manual,
}

/// 可以注入失败的调用
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    CreateHeap,
    CreatePlacedBuffer,
    MapBuffer,
    CreateImage,
    CreateView,
    CreatePipeline,
    CreateCommandAllocator,
    CreateCommandList,
    CreateFence,
    Submit,
    Signal,
}

#[derive(Clone, Debug)]
pub struct HeadlessOptions {
    /// 可供选择的模拟显卡
    pub adapters: Vec<AdapterInfo>,
    pub placement_granularity: u64,
    pub fence_completion: FenceCompletion,
    pub faults: Vec<FaultPoint>,
    /// 事件序列的容量，超出后丢弃最早的事件；0 表示不记录
    pub event_log_capacity: usize,
}
impl Default for HeadlessOptions {
    fn default() -> Self {
        Self {
            adapters: vec![
                AdapterInfo {
                    name: "Headless Integrated GPU".to_string(),
                    luid: Some(AdapterLuid([1, 0, 0, 0, 0, 0, 0, 0])),
                    vendor_id: 0x8086,
                    device_id: 0x0001,
                    discrete: false,
                    max_push_constants_size: 128,
                },
                AdapterInfo {
                    name: "Headless Discrete GPU".to_string(),
                    luid: Some(AdapterLuid([2, 0, 0, 0, 0, 0, 0, 0])),
                    vendor_id: 0x10de,
                    device_id: 0x0002,
                    discrete: true,
                    max_push_constants_size: 256,
                },
            ],
            placement_granularity: DEFAULT_PLACEMENT_GRANULARITY,
            fence_completion: FenceCompletion::Immediate,
            faults: vec![],
            event_log_capacity: DEFAULT_EVENT_LOG_CAPACITY,
        }
    }
}

#[derive(Default)]
struct HeadlessState {
    heaps: SlotMap<HeapKey, HeapRecord>,
    buffers: SlotMap<BufferKey, BufferRecord>,
    images: SlotMap<ImageKey, ImageRecord>,
    pipelines: SlotMap<PipelineKey, PipelineRecord>,

    events: VecDeque<QueueEvent>,
    event_log_capacity: usize,
    stats: HeadlessStats,
    faults: HashSet<FaultPoint>,

    next_heap_address: u64,
    live_fences: u32,
    live_allocators: u32,
    live_lists: u32,
}
impl HeadlessState {
    fn record_event(&mut self, event: QueueEvent) {
        if self.event_log_capacity == 0 {
            return;
        }
        while self.events.len() >= self.event_log_capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// 确定性的软件 GPU
///
/// - copy 和 barrier 在 submit 时立即执行，并且会检查资源状态
/// - 最近的提交和 signal 会记录到有界的事件序列中，供测试检查
/// - fence 可以立即完成，也可以由测试手动完成
pub struct HeadlessGpu {
    info: AdapterInfo,
    granularity: u64,
    fence_completion: Cell<FenceCompletion>,
    state: RefCell<HeadlessState>,

    fence_waits: Cell<u32>,
    blocking_fence_waits: Cell<u32>,
}

// 创建与销毁
impl HeadlessGpu {
    pub fn new(info: AdapterInfo, options: HeadlessOptions) -> Self {
        log::info!("headless gpu: {} ({:?})", info.name, info.luid);
        let state = HeadlessState {
            faults: options.faults.iter().copied().collect(),
            event_log_capacity: options.event_log_capacity,
            next_heap_address: 0x1_0000_0000,
            ..Default::default()
        };
        Self {
            info,
            granularity: options.placement_granularity.max(1),
            fence_completion: Cell::new(options.fence_completion),
            state: RefCell::new(state),
            fence_waits: Cell::new(0),
            blocking_fence_waits: Cell::new(0),
        }
    }
}

// getters
impl HeadlessGpu {
    pub fn stats(&self) -> HeadlessStats {
        let mut stats = self.state.borrow().stats;
        stats.fence_waits = self.fence_waits.get();
        stats.blocking_fence_waits = self.blocking_fence_waits.get();
        stats
    }

    pub fn events(&self) -> Vec<QueueEvent> {
        self.state.borrow().events.iter().cloned().collect()
    }

    /// 只包含 submit 事件
    pub fn submissions(&self) -> Vec<Submission> {
        self.state
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                QueueEvent::Submit(s) => Some(s.clone()),
                QueueEvent::Signal { .. } => None,
            })
            .collect()
    }

    pub fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }

    pub fn live_heap_count(&self) -> usize {
        self.state.borrow().heaps.len()
    }

    pub fn live_heap_count_of(&self, kind: HeapKind) -> usize {
        self.state.borrow().heaps.values().filter(|h| h.kind == kind).count()
    }

    /// 除了 heap 之外仍然存活的对象数量：buffer, image, pipeline, fence, allocator, list
    pub fn live_object_count(&self) -> usize {
        let state = self.state.borrow();
        state.buffers.len()
            + state.images.len()
            + state.pipelines.len()
            + state.live_fences as usize
            + state.live_allocators as usize
            + state.live_lists as usize
    }

    pub fn buffer_state(&self, buffer: &HeadlessBuffer) -> Option<ResourceState> {
        self.state.borrow().buffers.get(buffer.key).map(|b| b.state)
    }

    pub fn image_state(&self, image: &HeadlessImage) -> Option<ResourceState> {
        self.state.borrow().images.get(image.key).map(|i| i.state)
    }

    /// 读回 buffer 的全部内容，不论在哪种 heap 中
    pub fn read_buffer(&self, buffer: &HeadlessBuffer) -> GfxResult<Vec<u8>> {
        let state = self.state.borrow();
        let record = state
            .buffers
            .get(buffer.key)
            .ok_or_else(|| GfxError::invalid_state("buffer", "read of a destroyed buffer"))?;
        let heap = state
            .heaps
            .get(record.heap)
            .ok_or_else(|| GfxError::invalid_state(&record.name, "heap already destroyed"))?;
        let begin = record.offset as usize;
        let end = begin + record.size as usize;
        Ok(heap.memory[begin..end].to_vec())
    }
}

// 失败注入
impl HeadlessGpu {
    pub fn inject_fault(&self, point: FaultPoint) {
        self.state.borrow_mut().faults.insert(point);
    }

    pub fn clear_fault(&self, point: FaultPoint) {
        self.state.borrow_mut().faults.remove(&point);
    }

    /// 只影响之后的 signal
    pub fn set_fence_completion(&self, completion: FenceCompletion) {
        self.fence_completion.set(completion);
    }

    fn check_fault(&self, point: FaultPoint) -> GfxResult<()> {
        if self.state.borrow().faults.contains(&point) {
            return Err(GfxError::backend(fault_call_name(point), "injected fault"));
        }
        Ok(())
    }
}

fn fault_call_name(point: FaultPoint) -> &'static str {
    match point {
        FaultPoint::CreateHeap => "CreateHeap",
        FaultPoint::CreatePlacedBuffer => "CreatePlacedResource",
        FaultPoint::MapBuffer => "Map",
        FaultPoint::CreateImage => "CreateCommittedResource",
        FaultPoint::CreateView => "CreateView",
        FaultPoint::CreatePipeline => "CreateGraphicsPipelineState",
        FaultPoint::CreateCommandAllocator => "CreateCommandAllocator",
        FaultPoint::CreateCommandList => "CreateCommandList",
        FaultPoint::CreateFence => "CreateFence",
        FaultPoint::Submit => "ExecuteCommandLists",
        FaultPoint::Signal => "Signal",
    }
}

// 执行
impl HeadlessGpu {
    fn execute(state: &mut HeadlessState, commands: &[RecordedCommand]) -> GfxResult<()> {
        for cmd in commands {
            match cmd {
                RecordedCommand::CopyBuffer { dst, src } => Self::execute_copy(state, *dst, *src)?,
                RecordedCommand::BufferBarrier { buffer, before, after } => {
                    let record = state
                        .buffers
                        .get_mut(*buffer)
                        .ok_or_else(|| GfxError::invalid_state("buffer", "barrier on a destroyed buffer"))?;
                    if record.state != *before {
                        return Err(GfxError::StateMismatch {
                            object: record.name.clone(),
                            expected: *before,
                            actual: record.state,
                        });
                    }
                    record.state = *after;
                }
                RecordedCommand::ImageBarrier { image, before, after } => {
                    let record = state
                        .images
                        .get_mut(*image)
                        .ok_or_else(|| GfxError::invalid_state("image", "barrier on a destroyed image"))?;
                    if record.state != *before {
                        return Err(GfxError::StateMismatch {
                            object: record.name.clone(),
                            expected: *before,
                            actual: record.state,
                        });
                    }
                    record.state = *after;
                }
                RecordedCommand::BeginRenderPass { rtv, dsv, .. } => {
                    Self::expect_image_state(state, *rtv, ResourceState::RenderTarget)?;
                    Self::expect_image_state(state, *dsv, ResourceState::DepthWrite)?;
                    state.stats.clears += 1;
                }
                RecordedCommand::BindVertexBuffer { buffer, .. } | RecordedCommand::BindIndexBuffer { buffer, .. } => {
                    let record = state
                        .buffers
                        .get(*buffer)
                        .ok_or_else(|| GfxError::invalid_state("buffer", "bind of a destroyed buffer"))?;
                    if record.state != ResourceState::VertexAndIndex {
                        return Err(GfxError::StateMismatch {
                            object: record.name.clone(),
                            expected: ResourceState::VertexAndIndex,
                            actual: record.state,
                        });
                    }
                }
                RecordedCommand::DrawIndexed { .. } => state.stats.draws += 1,
                RecordedCommand::EndRenderPass
                | RecordedCommand::BindPipeline { .. }
                | RecordedCommand::PushConstants { .. }
                | RecordedCommand::BeginLabel(_)
                | RecordedCommand::EndLabel => {}
            }
        }
        Ok(())
    }

    fn expect_image_state(state: &HeadlessState, image: ImageKey, expected: ResourceState) -> GfxResult<()> {
        let record = state
            .images
            .get(image)
            .ok_or_else(|| GfxError::invalid_state("image", "render pass on a destroyed image"))?;
        if record.state != expected {
            return Err(GfxError::StateMismatch {
                object: record.name.clone(),
                expected,
                actual: record.state,
            });
        }
        Ok(())
    }

    fn execute_copy(state: &mut HeadlessState, dst: BufferKey, src: BufferKey) -> GfxResult<()> {
        let (src_heap, src_offset, src_size) = {
            let record = state
                .buffers
                .get(src)
                .ok_or_else(|| GfxError::invalid_state("buffer", "copy from a destroyed buffer"))?;
            if !matches!(record.state, ResourceState::GenericRead | ResourceState::CopySource) {
                return Err(GfxError::StateMismatch {
                    object: record.name.clone(),
                    expected: ResourceState::CopySource,
                    actual: record.state,
                });
            }
            (record.heap, record.offset as usize, record.size as usize)
        };
        let (dst_heap, dst_offset, dst_size) = {
            let record = state
                .buffers
                .get(dst)
                .ok_or_else(|| GfxError::invalid_state("buffer", "copy to a destroyed buffer"))?;
            if record.state != ResourceState::CopyDest {
                return Err(GfxError::StateMismatch {
                    object: record.name.clone(),
                    expected: ResourceState::CopyDest,
                    actual: record.state,
                });
            }
            (record.heap, record.offset as usize, record.size as usize)
        };

        let len = src_size.min(dst_size);
        let bytes = state
            .heaps
            .get(src_heap)
            .map(|h| h.memory[src_offset..src_offset + len].to_vec())
            .ok_or_else(|| GfxError::invalid_state("heap", "copy from a destroyed heap"))?;
        let heap = state
            .heaps
            .get_mut(dst_heap)
            .ok_or_else(|| GfxError::invalid_state("heap", "copy to a destroyed heap"))?;
        heap.memory[dst_offset..dst_offset + len].copy_from_slice(&bytes);
        Ok(())
    }
}

impl GfxDevice for HeadlessGpu {
    type Heap = HeadlessHeap;
    type Buffer = HeadlessBuffer;
    type Image = HeadlessImage;
    type RenderTargetView = HeadlessRenderTargetView;
    type DepthStencilView = HeadlessDepthStencilView;
    type CommandAllocator = HeadlessCommandAllocator;
    type CommandList = HeadlessCommandList;
    type Fence = HeadlessFence;
    type Pipeline = HeadlessPipeline;

    #[inline]
    fn adapter_info(&self) -> &AdapterInfo {
        &self.info
    }

    #[inline]
    fn placement_granularity(&self) -> u64 {
        self.granularity
    }

    fn create_heap(&self, desc: &HeapDesc) -> GfxResult<Self::Heap> {
        self.check_fault(FaultPoint::CreateHeap)?;
        if desc.size == 0 || desc.size % self.granularity != 0 {
            return Err(GfxError::invalid_state(
                &desc.name,
                format!("heap size {} is not a non-zero multiple of {}", desc.size, self.granularity),
            ));
        }

        let mut state = self.state.borrow_mut();
        let base_address = state.next_heap_address;
        state.next_heap_address += desc.size + self.granularity;
        let key = state.heaps.insert(HeapRecord {
            name: desc.name.clone(),
            kind: desc.kind,
            base_address,
            memory: vec![0; desc.size as usize],
            placed_buffers: 0,
        });
        state.stats.heaps_created += 1;
        log::debug!("create heap '{}' ({:?}, {} bytes)", desc.name, desc.kind, desc.size);

        Ok(HeadlessHeap {
            key,
            kind: desc.kind,
            size: desc.size,
        })
    }

    fn destroy_heap(&self, heap: Self::Heap) -> GfxResult<()> {
        let mut state = self.state.borrow_mut();
        let Some(record) = state.heaps.get(heap.key) else {
            return Err(GfxError::invalid_state("heap", "double destroy"));
        };
        if record.placed_buffers != 0 {
            return Err(GfxError::invalid_state(
                &record.name,
                format!("{} buffers are still placed in the heap", record.placed_buffers),
            ));
        }
        state.heaps.remove(heap.key);
        state.stats.heaps_destroyed += 1;
        Ok(())
    }

    fn create_placed_buffer(
        &self,
        heap: &Self::Heap,
        offset: u64,
        size: u64,
        initial_state: ResourceState,
        name: &str,
    ) -> GfxResult<Self::Buffer> {
        self.check_fault(FaultPoint::CreatePlacedBuffer)?;

        let mut state = self.state.borrow_mut();
        let heap_record = state
            .heaps
            .get_mut(heap.key)
            .ok_or_else(|| GfxError::invalid_state(name, "heap already destroyed"))?;
        if offset % self.granularity != 0 || offset.checked_add(size).is_none_or(|end| end > heap.size) {
            return Err(GfxError::OutOfHeapRange {
                heap: heap_record.name.clone(),
                offset,
                size,
                heap_size: heap.size,
            });
        }
        heap_record.placed_buffers += 1;
        let gpu_address = heap_record.base_address + offset;

        let key = state.buffers.insert(BufferRecord {
            name: name.to_string(),
            heap: heap.key,
            offset,
            size,
            state: initial_state,
        });
        Ok(HeadlessBuffer {
            key,
            heap: heap.key,
            size,
            gpu_address,
        })
    }

    fn destroy_buffer(&self, buffer: Self::Buffer) {
        let mut state = self.state.borrow_mut();
        if let Some(record) = state.buffers.remove(buffer.key) {
            if let Some(heap) = state.heaps.get_mut(record.heap) {
                heap.placed_buffers -= 1;
            }
        }
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
        self.check_fault(FaultPoint::MapBuffer)?;

        let mut state = self.state.borrow_mut();
        let (heap_key, begin, name) = {
            let record = state
                .buffers
                .get(buffer.key)
                .ok_or_else(|| GfxError::invalid_state("buffer", "write to a destroyed buffer"))?;
            if offset + data.len() as u64 > record.size {
                return Err(GfxError::invalid_state(
                    &record.name,
                    format!("write of {} bytes at {} exceeds buffer size {}", data.len(), offset, record.size),
                ));
            }
            (record.heap, (record.offset + offset) as usize, record.name.clone())
        };
        let heap = state
            .heaps
            .get_mut(heap_key)
            .ok_or_else(|| GfxError::invalid_state(&name, "heap already destroyed"))?;
        if heap.kind != HeapKind::Upload {
            return Err(GfxError::NotMappable { object: name });
        }
        heap.memory[begin..begin + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn create_image(&self, desc: &ImageDesc) -> GfxResult<Self::Image> {
        self.check_fault(FaultPoint::CreateImage)?;
        let mut state = self.state.borrow_mut();
        let key = state.images.insert(ImageRecord {
            name: desc.name.clone(),
            usage: desc.usage,
            state: desc.initial_state,
            live_views: 0,
        });
        Ok(HeadlessImage {
            key,
            extent: desc.extent,
        })
    }

    fn destroy_image(&self, image: Self::Image) {
        let mut state = self.state.borrow_mut();
        if let Some(record) = state.images.remove(image.key) {
            if record.live_views != 0 {
                log::warn!("image '{}' destroyed with {} live views", record.name, record.live_views);
            }
        }
    }

    fn create_render_target_view(&self, image: &Self::Image, name: &str) -> GfxResult<Self::RenderTargetView> {
        self.check_fault(FaultPoint::CreateView)?;
        let mut state = self.state.borrow_mut();
        let record = state
            .images
            .get_mut(image.key)
            .ok_or_else(|| GfxError::invalid_state(name, "view of a destroyed image"))?;
        if !matches!(record.usage, ImageUsage::ColorTarget(_)) {
            return Err(GfxError::invalid_state(name, "render target view of a non-color image"));
        }
        record.live_views += 1;
        Ok(HeadlessRenderTargetView { image: image.key })
    }

    fn destroy_render_target_view(&self, view: Self::RenderTargetView) {
        if let Some(record) = self.state.borrow_mut().images.get_mut(view.image) {
            record.live_views = record.live_views.saturating_sub(1);
        }
    }

    fn create_depth_stencil_view(&self, image: &Self::Image, name: &str) -> GfxResult<Self::DepthStencilView> {
        self.check_fault(FaultPoint::CreateView)?;
        let mut state = self.state.borrow_mut();
        let record = state
            .images
            .get_mut(image.key)
            .ok_or_else(|| GfxError::invalid_state(name, "view of a destroyed image"))?;
        if !matches!(record.usage, ImageUsage::Depth(_)) {
            return Err(GfxError::invalid_state(name, "depth stencil view of a non-depth image"));
        }
        record.live_views += 1;
        Ok(HeadlessDepthStencilView { image: image.key })
    }

    fn destroy_depth_stencil_view(&self, view: Self::DepthStencilView) {
        if let Some(record) = self.state.borrow_mut().images.get_mut(view.image) {
            record.live_views = record.live_views.saturating_sub(1);
        }
    }

    fn create_pipeline(&self, desc: &PipelineDesc) -> GfxResult<Self::Pipeline> {
        self.check_fault(FaultPoint::CreatePipeline)?;
        if desc.vertex_shader.is_empty() || desc.pixel_shader.is_empty() {
            return Err(GfxError::invalid_state(desc.name, "empty shader bytecode"));
        }
        let total_push_constants = desc.push_constants.iter().map(|r| r.offset + r.size).max().unwrap_or(0);
        if total_push_constants > self.info.max_push_constants_size {
            return Err(GfxError::UnsupportedLimit {
                limit: "maxPushConstantsSize",
                required: total_push_constants as u64,
                supported: self.info.max_push_constants_size as u64,
            });
        }

        let key = self.state.borrow_mut().pipelines.insert(PipelineRecord {
            name: desc.name.to_string(),
            push_constants: desc.push_constants.to_vec(),
        });
        Ok(HeadlessPipeline { key })
    }

    fn destroy_pipeline(&self, pipeline: Self::Pipeline) {
        if let Some(record) = self.state.borrow_mut().pipelines.remove(pipeline.key) {
            log::debug!(
                "destroy pipeline '{}' ({} push constant ranges)",
                record.name,
                record.push_constants.len()
            );
        }
    }

    fn create_command_allocator(&self, name: &str) -> GfxResult<Self::CommandAllocator> {
        self.check_fault(FaultPoint::CreateCommandAllocator)?;
        self.state.borrow_mut().live_allocators += 1;
        Ok(HeadlessCommandAllocator {
            cell: Rc::new(AllocatorCell {
                name: name.to_string(),
                recording: Cell::new(false),
                reset_count: Cell::new(0),
            }),
        })
    }

    fn reset_command_allocator(&self, allocator: &mut Self::CommandAllocator) -> GfxResult<()> {
        if allocator.cell.recording.get() {
            return Err(GfxError::invalid_state(
                &allocator.cell.name,
                "reset while a command list is recording on it",
            ));
        }
        allocator.cell.reset_count.set(allocator.cell.reset_count.get() + 1);
        self.state.borrow_mut().stats.allocator_resets += 1;
        Ok(())
    }

    fn destroy_command_allocator(&self, _allocator: Self::CommandAllocator) {
        let mut state = self.state.borrow_mut();
        state.live_allocators = state.live_allocators.saturating_sub(1);
    }

    fn create_command_list(&self, _allocator: &Self::CommandAllocator, name: &str) -> GfxResult<Self::CommandList> {
        self.check_fault(FaultPoint::CreateCommandList)?;
        self.state.borrow_mut().live_lists += 1;
        Ok(HeadlessCommandList::new(name))
    }

    fn destroy_command_list(&self, _list: Self::CommandList) {
        let mut state = self.state.borrow_mut();
        state.live_lists = state.live_lists.saturating_sub(1);
    }

    fn create_fence(&self, initial_value: u64, name: &str) -> GfxResult<Self::Fence> {
        self.check_fault(FaultPoint::CreateFence)?;
        self.state.borrow_mut().live_fences += 1;
        Ok(HeadlessFence::new(initial_value, name))
    }

    fn destroy_fence(&self, _fence: Self::Fence) {
        let mut state = self.state.borrow_mut();
        state.live_fences = state.live_fences.saturating_sub(1);
    }

    #[inline]
    fn fence_completed_value(&self, fence: &Self::Fence) -> GfxResult<u64> {
        Ok(fence.completed_value())
    }

    fn wait_fence(&self, fence: &Self::Fence, value: u64) -> GfxResult<()> {
        // 阻塞期间不能持有 state 的借用
        self.fence_waits.set(self.fence_waits.get() + 1);
        if fence.wait(value) {
            self.blocking_fence_waits.set(self.blocking_fence_waits.get() + 1);
        }
        Ok(())
    }

    fn submit(&self, list: &Self::CommandList) -> GfxResult<()> {
        self.check_fault(FaultPoint::Submit)?;
        if !list.is_closed() {
            return Err(GfxError::invalid_state(list.name(), "submit of a list that is still recording"));
        }

        let mut state = self.state.borrow_mut();
        Self::execute(&mut state, list.commands())?;
        state.stats.submits += 1;
        state.record_event(QueueEvent::Submit(Submission {
            list: list.name().to_string(),
            allocator: list.allocator_name().to_string(),
            commands: list.commands().to_vec(),
        }));
        Ok(())
    }

    fn signal(&self, fence: &Self::Fence, value: u64) -> GfxResult<()> {
        self.check_fault(FaultPoint::Signal)?;
        {
            let mut state = self.state.borrow_mut();
            state.stats.signals += 1;
            state.record_event(QueueEvent::Signal {
                fence: fence.name().to_string(),
                value,
            });
        }
        if self.fence_completion.get() == FenceCompletion::Immediate {
            fence.complete(value);
        }
        Ok(())
    }

    fn wait_idle(&self) -> GfxResult<()> {
        self.state.borrow_mut().stats.wait_idles += 1;
        Ok(())
    }

    fn destroy(self) {
        log::info!("destroying headless gpu");
        let live = self.live_object_count() + self.live_heap_count();
        if live != 0 {
            log::warn!("headless gpu destroyed with {} live objects", live);
        }
    }
}

impl GfxBackend for HeadlessGpu {
    type Options = HeadlessOptions;

    fn open(request: &AdapterRequest, options: Self::Options) -> GfxResult<Self> {
        let _span = ocular_crate_tools::profile_span!("HeadlessGpu::open");

        let matched = request
            .luid
            .and_then(|luid| options.adapters.iter().find(|a| a.luid == Some(luid)).cloned());
        let info = match matched {
            Some(info) => info,
            None => {
                if let Some(luid) = request.luid {
                    log::warn!("no adapter matches {:?}, falling back", luid);
                }
                options
                    .adapters
                    .iter()
                    .find_or_first(|a| a.discrete)
                    .cloned()
                    .ok_or_else(|| GfxError::NoAdapter {
                        reason: "headless adapter list is empty".to_string(),
                    })?
            }
        };

        Ok(HeadlessGpu::new(info, options))
    }
}
