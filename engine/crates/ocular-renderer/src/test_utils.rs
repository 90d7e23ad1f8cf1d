//! 测试共用的 headless 设备、模拟合成器以及 renderer

use ocular_gfx::headless::{HeadlessGpu, HeadlessOptions, RecordedCommand, Submission};
use ocular_gfx::rhi::{
    GfxBackend,
    types::{AdapterRequest, Extent2D},
};
use ocular_xr::{
    Compositor, XrResult,
    simulated::{SimulatedCompositor, SimulatedHmdConfig},
    types::{EyePoses, EyeRenderDesc, FovPort, HmdDesc, Layer, Pose, SessionStatus, SwapChainDesc, SwapChainHandle},
};

use crate::renderer::{BootstrapFailure, RenderSettings, SceneSettings, ShaderBinaries, StereoRenderer};

pub(crate) type TestCompositor = SimulatedCompositor<HeadlessGpu>;
pub(crate) type TestRenderer = StereoRenderer<HeadlessGpu, TestCompositor>;

pub(crate) fn shaders() -> ShaderBinaries {
    // SPIR-V magic number，headless 后端只检查非空
    ShaderBinaries {
        vertex: vec![0x03, 0x02, 0x23, 0x07],
        pixel: vec![0x03, 0x02, 0x23, 0x07],
    }
}

pub(crate) fn open_gpu(request: &AdapterRequest, options: HeadlessOptions) -> HeadlessGpu {
    HeadlessGpu::open(request, options).unwrap()
}

pub(crate) fn try_renderer<C: Compositor<HeadlessGpu>>(
    gpu: HeadlessGpu,
    compositor: C,
    settings: RenderSettings,
) -> Result<StereoRenderer<HeadlessGpu, C>, BootstrapFailure<HeadlessGpu, C>> {
    StereoRenderer::new(gpu, compositor, settings, &SceneSettings::default(), &shaders())
}

pub(crate) fn renderer_with(settings: RenderSettings, hmd: SimulatedHmdConfig) -> TestRenderer {
    let gpu = open_gpu(&AdapterRequest::default(), HeadlessOptions::default());
    try_renderer(gpu, SimulatedCompositor::new(hmd), settings).unwrap()
}

pub(crate) fn renderer() -> TestRenderer {
    renderer_with(RenderSettings::default(), SimulatedHmdConfig::default())
}

/// 去掉 debug label 之后的命令
pub(crate) fn render_commands(submission: &Submission) -> Vec<RecordedCommand> {
    submission
        .commands
        .iter()
        .filter(|c| !matches!(c, RecordedCommand::BeginLabel(_) | RecordedCommand::EndLabel))
        .cloned()
        .collect()
}

/// 让某一只眼睛的 swap chain 报告不同的长度或者当前序号
pub(crate) struct SkewedCompositor {
    pub inner: TestCompositor,
    pub skewed_chain: SwapChainHandle,
    pub length_skew: usize,
    pub index_skew: usize,
}
impl SkewedCompositor {
    pub fn new(length_skew: usize, index_skew: usize) -> Self {
        Self {
            inner: SimulatedCompositor::new(SimulatedHmdConfig::default()),
            skewed_chain: SwapChainHandle(1),
            length_skew,
            index_skew,
        }
    }
}
impl Compositor<HeadlessGpu> for SkewedCompositor {
    fn hmd_desc(&self) -> &HmdDesc {
        self.inner.hmd_desc()
    }
    fn session_status(&mut self) -> XrResult<SessionStatus> {
        self.inner.session_status()
    }
    fn recenter_tracking_origin(&mut self) -> XrResult<()> {
        self.inner.recenter_tracking_origin()
    }
    fn fov_texture_size(&self, eye: usize, fov: &FovPort, density: f32) -> XrResult<Extent2D> {
        self.inner.fov_texture_size(eye, fov, density)
    }
    fn create_swap_chain(&mut self, gfx: &HeadlessGpu, desc: &SwapChainDesc) -> XrResult<SwapChainHandle> {
        self.inner.create_swap_chain(gfx, desc)
    }
    fn swap_chain_length(&self, chain: SwapChainHandle) -> XrResult<usize> {
        let length = self.inner.swap_chain_length(chain)?;
        Ok(if chain == self.skewed_chain { length + self.length_skew } else { length })
    }
    fn swap_chain_current_index(&self, chain: SwapChainHandle) -> XrResult<usize> {
        let index = self.inner.swap_chain_current_index(chain)?;
        Ok(if chain == self.skewed_chain { index + self.index_skew } else { index })
    }
    fn swap_chain_image(&self, chain: SwapChainHandle, index: usize) -> XrResult<&ocular_gfx::headless::HeadlessImage> {
        self.inner.swap_chain_image(chain, index)
    }
    fn commit_swap_chain(&mut self, chain: SwapChainHandle) -> XrResult<()> {
        self.inner.commit_swap_chain(chain)
    }
    fn destroy_swap_chain(&mut self, gfx: &HeadlessGpu, chain: SwapChainHandle) {
        self.inner.destroy_swap_chain(gfx, chain)
    }
    fn eye_render_desc(&self, eye: usize, fov: &FovPort) -> XrResult<EyeRenderDesc> {
        self.inner.eye_render_desc(eye, fov)
    }
    fn wait_to_begin_frame(&mut self, frame_index: u64) -> XrResult<()> {
        self.inner.wait_to_begin_frame(frame_index)
    }
    fn begin_frame(&mut self, frame_index: u64) -> XrResult<()> {
        self.inner.begin_frame(frame_index)
    }
    fn eye_poses(&mut self, frame_index: u64, hmd_to_eye: &[Pose]) -> XrResult<EyePoses> {
        self.inner.eye_poses(frame_index, hmd_to_eye)
    }
    fn end_frame(&mut self, frame_index: u64, layers: &[Layer]) -> XrResult<()> {
        self.inner.end_frame(frame_index, layers)
    }
    fn destroy(self, gfx: &HeadlessGpu) {
        self.inner.destroy(gfx)
    }
}
