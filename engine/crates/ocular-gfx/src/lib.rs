//! GPU 抽象层
//!
//! - [`rhi`]：与后端无关的 trait 和类型，上层（renderer）只依赖这一部分
//! - [`vulkan`]：基于 ash + vk-mem 的实现
//! - [`headless`]：纯软件实现，会真正执行 copy / barrier，并记录所有命令，用于测试和无 GPU 环境
//!
//! 所有对象都由 [`rhi::GfxDevice`] 显式创建和销毁，不存在全局单例。

pub mod headless;
pub mod rhi;
pub mod vulkan;
