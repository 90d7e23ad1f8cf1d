//! 双目 VR 渲染核心
//!
//! 与具体的 GPU 后端、头显运行时无关，只依赖 [`ocular_gfx::rhi`] 和 [`ocular_xr::Compositor`]
//!
//! - [`upload`]：静态几何体的暂存上传（upload heap → default heap）
//! - [`frame_ring`]：每个 (eye, slot) 一个 command allocator，以及预先创建的 render target view
//! - [`sync`]：单调递增的 fence 计数器
//! - [`renderer`]：bootstrap 与销毁
//! - [`orchestrator`]：每帧的状态机

pub mod constants;
pub mod context;
pub mod error;
pub mod frame_counter;
pub mod frame_ring;
pub mod math;
pub mod orchestrator;
pub mod renderer;
pub mod scene;
pub mod sync;
pub mod upload;

pub use error::{MathError, RenderError, RenderResult};
pub use orchestrator::TickOutcome;
pub use renderer::{BootstrapFailure, RenderSettings, SceneSettings, ShaderBinaries, StereoRenderer};

#[cfg(test)]
mod test_utils;
