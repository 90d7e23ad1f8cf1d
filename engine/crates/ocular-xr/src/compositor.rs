use ocular_gfx::rhi::{GfxDevice, types::Extent2D};

use crate::error::XrResult;
use crate::types::{
    EyePoses, EyeRenderDesc, FovPort, HmdDesc, Layer, Pose, SessionStatus, SwapChainDesc, SwapChainHandle,
};

/// 一个头显会话
///
/// 帧生命周期：`wait_to_begin_frame` → `begin_frame` → 每只眼睛提交之后 `commit_swap_chain`
/// → `end_frame`。顺序错误时返回 [`crate::XrError::InvalidCall`]
///
/// swap chain 的图像由合成器持有，在合成器读取时处于 `CompositorRead` 状态；
/// 渲染前后需要由调用方插入 barrier
pub trait Compositor<G: GfxDevice> {
    fn hmd_desc(&self) -> &HmdDesc;

    /// 每帧查询一次
    fn session_status(&mut self) -> XrResult<SessionStatus>;

    /// 以当前的头部姿态作为新的原点
    fn recenter_tracking_origin(&mut self) -> XrResult<()>;

    /// 给定 FOV 和像素密度时，每只眼睛理想的渲染纹理大小
    fn fov_texture_size(&self, eye: usize, fov: &FovPort, pixels_per_display_pixel: f32) -> XrResult<Extent2D>;

    // swap chain
    fn create_swap_chain(&mut self, gfx: &G, desc: &SwapChainDesc) -> XrResult<SwapChainHandle>;
    fn swap_chain_length(&self, chain: SwapChainHandle) -> XrResult<usize>;
    /// 下一帧应该写入的图像序号
    fn swap_chain_current_index(&self, chain: SwapChainHandle) -> XrResult<usize>;
    fn swap_chain_image(&self, chain: SwapChainHandle, index: usize) -> XrResult<&G::Image>;
    /// 通知合成器当前图像已经提交，swap chain 前进到下一张
    fn commit_swap_chain(&mut self, chain: SwapChainHandle) -> XrResult<()>;
    fn destroy_swap_chain(&mut self, gfx: &G, chain: SwapChainHandle);

    // frame
    fn eye_render_desc(&self, eye: usize, fov: &FovPort) -> XrResult<EyeRenderDesc>;
    /// 阻塞直到合成器准备好接收 frame_index
    fn wait_to_begin_frame(&mut self, frame_index: u64) -> XrResult<()>;
    fn begin_frame(&mut self, frame_index: u64) -> XrResult<()>;
    /// 预测 frame_index 显示时每只眼睛的位姿
    fn eye_poses(&mut self, frame_index: u64, hmd_to_eye: &[Pose]) -> XrResult<EyePoses>;
    fn end_frame(&mut self, frame_index: u64, layers: &[Layer]) -> XrResult<()>;

    /// 销毁会话，以及还没有销毁的 swap chain
    fn destroy(self, gfx: &G)
    where
        Self: Sized;
}

/// 头显运行时，负责创建会话
pub trait XrRuntime<G: GfxDevice> {
    type Compositor: Compositor<G>;

    /// 没有检测到头显时返回 [`crate::XrError::NoHmd`]，调用方可以稍后重试
    fn create_session(&mut self) -> XrResult<Self::Compositor>;
}
