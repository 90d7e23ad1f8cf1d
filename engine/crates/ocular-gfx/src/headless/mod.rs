//! 软件 GPU 后端
//!
//! 不依赖任何显卡驱动，命令在提交时立即执行。用于 headless 运行以及测试

mod command_list;
mod fence;
mod gpu;
mod resources;

pub use command_list::HeadlessCommandList;
pub use fence::{FenceCompleter, HeadlessFence};
pub use gpu::{DEFAULT_EVENT_LOG_CAPACITY, DEFAULT_PLACEMENT_GRANULARITY, FaultPoint, FenceCompletion, HeadlessGpu, HeadlessOptions};
pub use resources::{
    BufferKey, HeadlessBuffer, HeadlessCommandAllocator, HeadlessDepthStencilView, HeadlessHeap, HeadlessImage,
    HeadlessPipeline, HeadlessRenderTargetView, HeadlessStats, HeapKey, ImageKey, PipelineKey, QueueEvent,
    RecordedCommand, Submission,
};
