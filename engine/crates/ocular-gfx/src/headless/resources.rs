use std::cell::Cell;
use std::rc::Rc;

use crate::rhi::types::{
    ClearValues, Extent2D, HeapKind, ImageUsage, IndexBufferView, PushConstantRange, ResourceState, ScissorRect,
    ShaderStage, VertexBufferView, Viewport,
};

slotmap::new_key_type! {
    pub struct HeapKey;
    pub struct BufferKey;
    pub struct ImageKey;
    pub struct PipelineKey;
}

// ---------------------------------------------------------------------------
// 对外的 handle
// ---------------------------------------------------------------------------

pub struct HeadlessHeap {
    pub(crate) key: HeapKey,
    pub(crate) kind: HeapKind,
    pub(crate) size: u64,
}
impl HeadlessHeap {
    #[inline]
    pub fn key(&self) -> HeapKey {
        self.key
    }
    #[inline]
    pub fn kind(&self) -> HeapKind {
        self.kind
    }
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }
}

pub struct HeadlessBuffer {
    pub(crate) key: BufferKey,
    pub(crate) heap: HeapKey,
    pub(crate) size: u64,
    pub(crate) gpu_address: u64,
}
impl HeadlessBuffer {
    #[inline]
    pub fn key(&self) -> BufferKey {
        self.key
    }
    #[inline]
    pub fn heap(&self) -> HeapKey {
        self.heap
    }
}

pub struct HeadlessImage {
    pub(crate) key: ImageKey,
    pub(crate) extent: Extent2D,
}
impl HeadlessImage {
    #[inline]
    pub fn key(&self) -> ImageKey {
        self.key
    }
    #[inline]
    pub fn extent(&self) -> Extent2D {
        self.extent
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeadlessRenderTargetView {
    pub image: ImageKey,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeadlessDepthStencilView {
    pub image: ImageKey,
}

pub struct HeadlessPipeline {
    pub(crate) key: PipelineKey,
}
impl HeadlessPipeline {
    #[inline]
    pub fn key(&self) -> PipelineKey {
        self.key
    }
}

pub(crate) struct AllocatorCell {
    pub(crate) name: String,
    /// 是否有 command list 正在这个 allocator 上录制
    pub(crate) recording: Cell<bool>,
    pub(crate) reset_count: Cell<u32>,
}

pub struct HeadlessCommandAllocator {
    pub(crate) cell: Rc<AllocatorCell>,
}
impl HeadlessCommandAllocator {
    #[inline]
    pub fn name(&self) -> &str {
        &self.cell.name
    }

    /// allocator 被 reset 的次数
    #[inline]
    pub fn reset_count(&self) -> u32 {
        self.cell.reset_count.get()
    }
}

// ---------------------------------------------------------------------------
// 设备内部的记录
// ---------------------------------------------------------------------------

pub(crate) struct HeapRecord {
    pub(crate) name: String,
    pub(crate) kind: HeapKind,
    pub(crate) base_address: u64,
    pub(crate) memory: Vec<u8>,
    pub(crate) placed_buffers: usize,
}

pub(crate) struct BufferRecord {
    pub(crate) name: String,
    pub(crate) heap: HeapKey,
    pub(crate) offset: u64,
    pub(crate) size: u64,
    pub(crate) state: ResourceState,
}

pub(crate) struct ImageRecord {
    pub(crate) name: String,
    pub(crate) usage: ImageUsage,
    pub(crate) state: ResourceState,
    pub(crate) live_views: u32,
}

pub(crate) struct PipelineRecord {
    pub(crate) name: String,
    pub(crate) push_constants: Vec<PushConstantRange>,
}

// ---------------------------------------------------------------------------
// 录制的命令以及 queue 上的事件
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum RecordedCommand {
    CopyBuffer {
        dst: BufferKey,
        src: BufferKey,
    },
    BufferBarrier {
        buffer: BufferKey,
        before: ResourceState,
        after: ResourceState,
    },
    ImageBarrier {
        image: ImageKey,
        before: ResourceState,
        after: ResourceState,
    },
    BeginRenderPass {
        rtv: ImageKey,
        dsv: ImageKey,
        clear: ClearValues,
        viewport: Viewport,
        scissor: ScissorRect,
    },
    EndRenderPass,
    BindPipeline {
        pipeline: PipelineKey,
    },
    PushConstants {
        stage: ShaderStage,
        offset: u32,
        data: Vec<u8>,
    },
    BindVertexBuffer {
        buffer: BufferKey,
        view: VertexBufferView,
    },
    BindIndexBuffer {
        buffer: BufferKey,
        view: IndexBufferView,
    },
    DrawIndexed {
        index_count: u32,
        first_index: u32,
        vertex_offset: i32,
    },
    BeginLabel(String),
    EndLabel,
}

#[derive(Clone, Debug)]
pub struct Submission {
    pub list: String,
    pub allocator: String,
    pub commands: Vec<RecordedCommand>,
}

/// queue 上按顺序发生的事件
#[derive(Clone, Debug)]
pub enum QueueEvent {
    Submit(Submission),
    Signal { fence: String, value: u64 },
}

/// 设备的统计数据，用于测试检查
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    pub heaps_created: u32,
    pub heaps_destroyed: u32,
    pub submits: u32,
    pub signals: u32,
    pub draws: u32,
    pub clears: u32,
    pub fence_waits: u32,
    /// 真正发生阻塞的 wait 次数
    pub blocking_fence_waits: u32,
    pub allocator_resets: u32,
    pub wait_idles: u32,
}
