//! 头显运行时的抽象
//!
//! - [`compositor::Compositor`]：一个头显会话，负责 swap chain、帧生命周期、姿态查询
//! - [`compositor::XrRuntime`]：创建会话；没有连接头显时返回 [`error::XrError::NoHmd`]
//! - [`simulated`]：确定性的模拟头显，用于桌面运行和测试

pub mod compositor;
pub mod error;
pub mod simulated;
pub mod types;

pub use compositor::{Compositor, XrRuntime};
pub use error::{XrError, XrResult};
