//! ash + vk-mem 后端
//!
//! - heap：一块 vk-mem 分配的内存，buffer 通过 `vmaBindBufferMemory2` 绑定到固定偏移
//! - fence：timeline semaphore
//! - command allocator：一个 command pool + 一个 command buffer
//! - render pass：dynamic rendering

mod command;
mod convert;
mod debug_messenger;
mod device;
mod fence;
mod gpu;
mod heap;
mod image;
mod instance;
mod physical_device;
mod pipeline;

pub use command::{VulkanCommandAllocator, VulkanCommandList};
pub use debug_messenger::DebugType;
pub use fence::VulkanFence;
pub use gpu::{VULKAN_PLACEMENT_GRANULARITY, VulkanGpu, VulkanOptions};
pub use heap::{VulkanBuffer, VulkanHeap};
pub use image::{VulkanDepthStencilView, VulkanImage, VulkanRenderTargetView};
pub use pipeline::VulkanPipeline;
