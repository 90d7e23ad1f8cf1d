use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use glam::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use ocular_gfx::rhi::{
    GfxDevice,
    types::{AdapterLuid, Extent2D, ImageDesc, ImageUsage, ResourceState},
};

use crate::compositor::{Compositor, XrRuntime};
use crate::error::{XrError, XrResult};
use crate::types::{
    EyePoses, EyeRenderDesc, FovPort, HmdDesc, Layer, Pose, Recti, SessionStatus, SwapChainDesc, SwapChainHandle,
};

/// 模拟头显的参数，默认值接近一台 90Hz 的消费级头显
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedHmdConfig {
    pub product_name: String,
    pub manufacturer: String,
    /// (major, minor)
    pub firmware_version: [u16; 2],
    /// 整个屏幕的分辨率
    pub resolution: [u32; 2],
    /// 左眼的默认 FOV，右眼取其镜像
    pub eye_fov: FovPort,
    /// 左眼的最大 FOV；为 None 时与默认 FOV 相同
    pub max_eye_fov: Option<FovPort>,
    pub eye_count: usize,
    /// 瞳距，单位米
    pub ipd: f32,
    pub eye_height: f32,
    pub pixels_per_tan_angle: [f32; 2],
    pub swap_chain_length: usize,
    pub refresh_rate: f32,
    /// 模拟的头部转动速度（绕 y 轴），单位 度/秒
    pub head_yaw_deg_per_s: f32,
    /// 为 true 时 `wait_to_begin_frame` 会按照刷新率阻塞
    pub pace_frames: bool,
    pub adapter_luid: Option<[u8; 8]>,
}
impl Default for SimulatedHmdConfig {
    fn default() -> Self {
        Self {
            product_name: "Ocular Simulated HMD".to_string(),
            manufacturer: "Ocular".to_string(),
            firmware_version: [1, 0],
            resolution: [2160, 1200],
            eye_fov: FovPort::new(1.3292, 1.3292, 1.0586, 1.0924),
            max_eye_fov: None,
            eye_count: 2,
            ipd: 0.064,
            eye_height: 1.675,
            pixels_per_tan_angle: [625.0, 602.0],
            swap_chain_length: 3,
            refresh_rate: 90.0,
            head_yaw_deg_per_s: 0.0,
            pace_frames: false,
            adapter_luid: None,
        }
    }
}

/// 可以注入失败的合成器调用
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum XrCall {
    SessionStatus,
    CreateSwapChain,
    CommitSwapChain,
    WaitToBeginFrame,
    BeginFrame,
    EyePoses,
    EndFrame,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimulatedFailure {
    CallFailed,
    /// 同时会把会话标记为 display lost
    DisplayLost,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimulatedStats {
    pub status_queries: u32,
    pub recenters: u32,
    pub frames_waited: u32,
    pub frames_begun: u32,
    pub frames_ended: u32,
    pub commits: u32,
    pub swap_chains_created: u32,
    pub swap_chains_destroyed: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FramePhase {
    Idle,
    Waited(u64),
    Begun(u64),
}

struct SimSwapChain<I> {
    name: String,
    images: Vec<I>,
    current: usize,
    /// 本帧是否已经 commit
    committed: bool,
}

/// 确定性的模拟合成器
///
/// - 会话状态来自一个脚本队列，队列为空时返回 `steady_status`
/// - 严格检查帧生命周期的调用顺序
/// - 记录最后一次提交的图层，以及各种调用次数
pub struct SimulatedCompositor<G: GfxDevice> {
    config: SimulatedHmdConfig,
    hmd_desc: HmdDesc,

    status_script: VecDeque<SessionStatus>,
    steady_status: SessionStatus,
    display_lost: bool,
    failures: HashMap<XrCall, SimulatedFailure>,
    /// 下一次 `eye_poses` 最多返回的位姿数量
    eye_pose_limit: Option<usize>,

    swap_chains: Vec<Option<SimSwapChain<G::Image>>>,

    phase: FramePhase,
    last_ended_frame: Option<u64>,
    last_wait: Option<Instant>,
    last_layers: Vec<Layer>,

    /// recenter 时头部的朝向（绕 y 轴，单位度）
    recenter_yaw_deg: f32,
    last_head_yaw_deg: f32,

    stats: SimulatedStats,
}

// 创建与销毁
impl<G: GfxDevice> SimulatedCompositor<G> {
    pub fn new(config: SimulatedHmdConfig) -> Self {
        let per_eye = |fov: FovPort| {
            (0..config.eye_count)
                .map(|eye| if eye % 2 == 0 { fov } else { fov.mirrored() })
                .collect::<Vec<_>>()
        };
        let hmd_desc = HmdDesc {
            product_name: config.product_name.clone(),
            manufacturer: config.manufacturer.clone(),
            firmware_major: config.firmware_version[0],
            firmware_minor: config.firmware_version[1],
            resolution: Extent2D::new(config.resolution[0], config.resolution[1]),
            default_eye_fov: per_eye(config.eye_fov),
            max_eye_fov: per_eye(config.max_eye_fov.unwrap_or(config.eye_fov)),
            display_refresh_rate: config.refresh_rate,
            adapter_luid: config.adapter_luid.map(AdapterLuid),
        };
        log::info!(
            "simulated hmd: {} {}x{} @{}Hz, {} eyes",
            hmd_desc.product_name,
            hmd_desc.resolution.width,
            hmd_desc.resolution.height,
            hmd_desc.display_refresh_rate,
            hmd_desc.eye_count()
        );

        Self {
            config,
            hmd_desc,
            status_script: VecDeque::new(),
            steady_status: SessionStatus::RUNNING,
            display_lost: false,
            failures: HashMap::new(),
            eye_pose_limit: None,
            swap_chains: Vec::new(),
            phase: FramePhase::Idle,
            last_ended_frame: None,
            last_wait: None,
            last_layers: Vec::new(),
            recenter_yaw_deg: 0.0,
            last_head_yaw_deg: 0.0,
            stats: SimulatedStats::default(),
        }
    }
}

// 脚本与故障注入
impl<G: GfxDevice> SimulatedCompositor<G> {
    /// 追加一帧的会话状态
    pub fn push_status(&mut self, status: SessionStatus) {
        self.status_script.push_back(status);
    }

    pub fn set_steady_status(&mut self, status: SessionStatus) {
        self.steady_status = status;
    }

    /// 下一次调用 call 时失败，只生效一次
    pub fn fail_next(&mut self, call: XrCall, failure: SimulatedFailure) {
        self.failures.insert(call, failure);
    }

    /// 下一次 `eye_poses` 只返回前 count 个位姿，只生效一次
    pub fn truncate_next_eye_poses(&mut self, count: usize) {
        self.eye_pose_limit = Some(count);
    }

    /// 直接修改 swap chain 的当前序号，用于模拟不同步的 swap chain
    pub fn force_swap_chain_index(&mut self, chain: SwapChainHandle, index: usize) -> XrResult<()> {
        let chain = self.chain_mut("force_swap_chain_index", chain)?;
        if index >= chain.images.len() {
            return Err(XrError::invalid_call("force_swap_chain_index", "index out of range"));
        }
        chain.current = index;
        Ok(())
    }
}

// getters
impl<G: GfxDevice> SimulatedCompositor<G> {
    #[inline]
    pub fn stats(&self) -> SimulatedStats {
        self.stats
    }

    #[inline]
    pub fn last_layers(&self) -> &[Layer] {
        &self.last_layers
    }

    #[inline]
    pub fn is_frame_idle(&self) -> bool {
        self.phase == FramePhase::Idle
    }

    #[inline]
    pub fn live_swap_chain_count(&self) -> usize {
        self.swap_chains.iter().flatten().count()
    }

    #[inline]
    pub fn config(&self) -> &SimulatedHmdConfig {
        &self.config
    }
}

// tools
impl<G: GfxDevice> SimulatedCompositor<G> {
    fn check_failure(&mut self, call: XrCall, name: &'static str) -> XrResult<()> {
        match self.failures.remove(&call) {
            None => Ok(()),
            Some(SimulatedFailure::CallFailed) => Err(XrError::call_failed(name, "injected failure")),
            Some(SimulatedFailure::DisplayLost) => {
                self.display_lost = true;
                Err(XrError::DisplayLost)
            }
        }
    }

    fn check_display(&self) -> XrResult<()> {
        if self.display_lost { Err(XrError::DisplayLost) } else { Ok(()) }
    }

    fn check_eye(&self, call: &'static str, eye: usize) -> XrResult<()> {
        if eye >= self.hmd_desc.eye_count() {
            return Err(XrError::invalid_call(
                call,
                format!("eye {} out of range, hmd has {} eyes", eye, self.hmd_desc.eye_count()),
            ));
        }
        Ok(())
    }

    fn chain(&self, call: &'static str, handle: SwapChainHandle) -> XrResult<&SimSwapChain<G::Image>> {
        self.swap_chains
            .get(handle.0 as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| XrError::invalid_call(call, format!("unknown swap chain {:?}", handle)))
    }

    fn chain_mut(&mut self, call: &'static str, handle: SwapChainHandle) -> XrResult<&mut SimSwapChain<G::Image>> {
        self.swap_chains
            .get_mut(handle.0 as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| XrError::invalid_call(call, format!("unknown swap chain {:?}", handle)))
    }

    /// 第 frame_index 帧的头部姿态：在 eye_height 处绕 y 轴匀速转动
    fn head_pose(&mut self, frame_index: u64) -> Pose {
        let t = self.frame_time(frame_index) as f32;
        let yaw_deg = self.config.head_yaw_deg_per_s * t;
        self.last_head_yaw_deg = yaw_deg;
        Pose::new(
            Quat::from_rotation_y((yaw_deg - self.recenter_yaw_deg).to_radians()),
            Vec3::new(0.0, self.config.eye_height, 0.0),
        )
    }

    #[inline]
    fn frame_time(&self, frame_index: u64) -> f64 {
        frame_index as f64 / self.config.refresh_rate.max(1.0) as f64
    }

    /// 按照刷新率等待到下一个 vsync
    fn pace(&mut self) {
        if self.config.pace_frames {
            let period = Duration::from_secs_f32(1.0 / self.config.refresh_rate.max(1.0));
            if let Some(last) = self.last_wait {
                let deadline = last + period;
                let now = Instant::now();
                if deadline > now {
                    std::thread::sleep(deadline - now);
                }
            }
        }
        self.last_wait = Some(Instant::now());
    }
}

impl<G: GfxDevice> Compositor<G> for SimulatedCompositor<G> {
    #[inline]
    fn hmd_desc(&self) -> &HmdDesc {
        &self.hmd_desc
    }

    fn session_status(&mut self) -> XrResult<SessionStatus> {
        self.check_failure(XrCall::SessionStatus, "session_status")?;
        self.stats.status_queries += 1;

        let mut status = self.status_script.pop_front().unwrap_or(self.steady_status);
        if status.display_lost {
            self.display_lost = true;
        }
        if self.display_lost {
            status.display_lost = true;
            status.is_visible = false;
        }
        Ok(status)
    }

    fn recenter_tracking_origin(&mut self) -> XrResult<()> {
        self.stats.recenters += 1;
        self.recenter_yaw_deg = self.last_head_yaw_deg;
        log::info!("simulated hmd: recenter at yaw {:.2}°", self.recenter_yaw_deg);
        Ok(())
    }

    fn fov_texture_size(&self, eye: usize, fov: &FovPort, pixels_per_display_pixel: f32) -> XrResult<Extent2D> {
        self.check_eye("fov_texture_size", eye)?;
        if !(pixels_per_display_pixel > 0.0) {
            return Err(XrError::invalid_call("fov_texture_size", "pixel density must be positive"));
        }
        let [ppt_x, ppt_y] = self.config.pixels_per_tan_angle;
        let width = ((fov.left_tan + fov.right_tan) * ppt_x * pixels_per_display_pixel).ceil();
        let height = ((fov.up_tan + fov.down_tan) * ppt_y * pixels_per_display_pixel).ceil();
        Ok(Extent2D::new((width as u32).max(1), (height as u32).max(1)))
    }

    fn create_swap_chain(&mut self, gfx: &G, desc: &SwapChainDesc) -> XrResult<SwapChainHandle> {
        self.check_failure(XrCall::CreateSwapChain, "create_swap_chain")?;
        if self.config.swap_chain_length == 0 {
            return Err(XrError::call_failed("create_swap_chain", "swap chain length is 0"));
        }

        let mut images = Vec::with_capacity(self.config.swap_chain_length);
        for idx in 0..self.config.swap_chain_length {
            let image_desc = ImageDesc {
                extent: desc.extent,
                usage: ImageUsage::ColorTarget(desc.format),
                initial_state: ResourceState::CompositorRead,
                name: format!("{}-{}", desc.name, idx),
            };
            match gfx.create_image(&image_desc) {
                Ok(image) => images.push(image),
                Err(e) => {
                    images.into_iter().for_each(|image| gfx.destroy_image(image));
                    return Err(e.into());
                }
            }
        }

        let handle = SwapChainHandle(self.swap_chains.len() as u32);
        self.swap_chains.push(Some(SimSwapChain {
            name: desc.name.clone(),
            images,
            current: 0,
            committed: false,
        }));
        self.stats.swap_chains_created += 1;
        log::info!(
            "simulated hmd: create swap chain '{}' {}x{} x{}",
            desc.name,
            desc.extent.width,
            desc.extent.height,
            self.config.swap_chain_length
        );
        Ok(handle)
    }

    fn swap_chain_length(&self, chain: SwapChainHandle) -> XrResult<usize> {
        Ok(self.chain("swap_chain_length", chain)?.images.len())
    }

    fn swap_chain_current_index(&self, chain: SwapChainHandle) -> XrResult<usize> {
        Ok(self.chain("swap_chain_current_index", chain)?.current)
    }

    fn swap_chain_image(&self, chain: SwapChainHandle, index: usize) -> XrResult<&G::Image> {
        self.chain("swap_chain_image", chain)?
            .images
            .get(index)
            .ok_or_else(|| XrError::invalid_call("swap_chain_image", format!("index {index} out of range")))
    }

    fn commit_swap_chain(&mut self, chain: SwapChainHandle) -> XrResult<()> {
        self.check_failure(XrCall::CommitSwapChain, "commit_swap_chain")?;
        if !matches!(self.phase, FramePhase::Begun(_)) {
            return Err(XrError::invalid_call("commit_swap_chain", "no frame has begun"));
        }
        let chain = self.chain_mut("commit_swap_chain", chain)?;
        if chain.committed {
            return Err(XrError::invalid_call(
                "commit_swap_chain",
                format!("'{}' already committed this frame", chain.name),
            ));
        }
        chain.committed = true;
        chain.current = (chain.current + 1) % chain.images.len();
        self.stats.commits += 1;
        Ok(())
    }

    fn destroy_swap_chain(&mut self, gfx: &G, chain: SwapChainHandle) {
        let Some(slot) = self.swap_chains.get_mut(chain.0 as usize) else {
            return;
        };
        if let Some(chain) = slot.take() {
            chain.images.into_iter().for_each(|image| gfx.destroy_image(image));
            self.stats.swap_chains_destroyed += 1;
        }
    }

    fn eye_render_desc(&self, eye: usize, fov: &FovPort) -> XrResult<EyeRenderDesc> {
        self.check_eye("eye_render_desc", eye)?;

        let eye_count = self.hmd_desc.eye_count() as u32;
        let eye_width = self.hmd_desc.resolution.width / eye_count;
        let half_span = (eye_count as f32 - 1.0) * 0.5;
        let eye_offset = (eye as f32 - half_span) * self.config.ipd;

        Ok(EyeRenderDesc {
            eye,
            fov: *fov,
            distorted_viewport: Recti {
                x: (eye_width * eye as u32) as i32,
                y: 0,
                width: eye_width,
                height: self.hmd_desc.resolution.height,
            },
            pixels_per_tan_angle_at_center: Vec2::from(self.config.pixels_per_tan_angle),
            hmd_to_eye_pose: Pose::new(Quat::IDENTITY, Vec3::new(eye_offset, 0.0, 0.0)),
        })
    }

    fn wait_to_begin_frame(&mut self, frame_index: u64) -> XrResult<()> {
        let _span = ocular_crate_tools::profile_span!("SimulatedCompositor::wait_to_begin_frame");
        self.check_failure(XrCall::WaitToBeginFrame, "wait_to_begin_frame")?;
        self.check_display()?;
        if self.phase != FramePhase::Idle {
            return Err(XrError::invalid_call(
                "wait_to_begin_frame",
                format!("previous frame is still open ({:?})", self.phase),
            ));
        }
        if self.last_ended_frame.is_some_and(|last| frame_index <= last) {
            return Err(XrError::invalid_call(
                "wait_to_begin_frame",
                format!("frame index {} is not after the last ended frame {:?}", frame_index, self.last_ended_frame),
            ));
        }

        self.pace();
        self.phase = FramePhase::Waited(frame_index);
        self.stats.frames_waited += 1;
        Ok(())
    }

    fn begin_frame(&mut self, frame_index: u64) -> XrResult<()> {
        self.check_failure(XrCall::BeginFrame, "begin_frame")?;
        self.check_display()?;
        if self.phase != FramePhase::Waited(frame_index) {
            return Err(XrError::invalid_call(
                "begin_frame",
                format!("frame {} was not waited on ({:?})", frame_index, self.phase),
            ));
        }
        self.phase = FramePhase::Begun(frame_index);
        self.stats.frames_begun += 1;
        Ok(())
    }

    fn eye_poses(&mut self, frame_index: u64, hmd_to_eye: &[Pose]) -> XrResult<EyePoses> {
        self.check_failure(XrCall::EyePoses, "eye_poses")?;
        let head = self.head_pose(frame_index);
        let count = self.eye_pose_limit.take().unwrap_or(hmd_to_eye.len());
        Ok(EyePoses {
            poses: hmd_to_eye.iter().take(count).map(|eye| head.transform(eye)).collect(),
            sensor_sample_time: self.frame_time(frame_index),
        })
    }

    fn end_frame(&mut self, frame_index: u64, layers: &[Layer]) -> XrResult<()> {
        let _span = ocular_crate_tools::profile_span!("SimulatedCompositor::end_frame");
        self.check_failure(XrCall::EndFrame, "end_frame")?;
        self.check_display()?;
        if self.phase != FramePhase::Begun(frame_index) {
            return Err(XrError::invalid_call(
                "end_frame",
                format!("frame {} has not begun ({:?})", frame_index, self.phase),
            ));
        }
        if layers.is_empty() {
            return Err(XrError::invalid_call("end_frame", "no layers submitted"));
        }
        for layer in layers {
            let Layer::EyeFov { eyes, .. } = layer;
            if eyes.len() != self.hmd_desc.eye_count() {
                return Err(XrError::invalid_call(
                    "end_frame",
                    format!("layer has {} eyes, hmd has {}", eyes.len(), self.hmd_desc.eye_count()),
                ));
            }
            for eye in eyes {
                let chain = self.chain("end_frame", eye.swap_chain)?;
                if !chain.committed {
                    return Err(XrError::invalid_call(
                        "end_frame",
                        format!("'{}' was not committed this frame", chain.name),
                    ));
                }
            }
        }

        self.swap_chains.iter_mut().flatten().for_each(|chain| chain.committed = false);
        self.phase = FramePhase::Idle;
        self.last_ended_frame = Some(frame_index);
        self.last_layers = layers.to_vec();
        self.stats.frames_ended += 1;
        Ok(())
    }

    fn destroy(mut self, gfx: &G) {
        for idx in 0..self.swap_chains.len() {
            self.destroy_swap_chain(gfx, SwapChainHandle(idx as u32));
        }
        log::info!(
            "simulated hmd: session destroyed after {} frames ({} recenters)",
            self.stats.frames_ended,
            self.stats.recenters
        );
    }
}

/// 模拟的头显运行时
///
/// 前 `no_hmd_attempts` 次创建会话会返回 [`XrError::NoHmd`]；
/// 每个新会话按顺序取出一段会话状态脚本
pub struct SimulatedRuntime {
    config: SimulatedHmdConfig,
    no_hmd_attempts: u32,
    session_scripts: VecDeque<Vec<SessionStatus>>,

    attempts: u32,
    sessions_created: u32,
}
impl SimulatedRuntime {
    pub fn new(config: SimulatedHmdConfig) -> Self {
        Self {
            config,
            no_hmd_attempts: 0,
            session_scripts: VecDeque::new(),
            attempts: 0,
            sessions_created: 0,
        }
    }

    pub fn with_no_hmd_attempts(mut self, attempts: u32) -> Self {
        self.no_hmd_attempts = attempts;
        self
    }

    /// 下一个尚未分配脚本的会话将使用 statuses
    pub fn push_session_script(&mut self, statuses: Vec<SessionStatus>) {
        self.session_scripts.push_back(statuses);
    }

    #[inline]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[inline]
    pub fn sessions_created(&self) -> u32 {
        self.sessions_created
    }
}

impl<G: GfxDevice> XrRuntime<G> for SimulatedRuntime {
    type Compositor = SimulatedCompositor<G>;

    fn create_session(&mut self) -> XrResult<Self::Compositor> {
        self.attempts += 1;
        if self.attempts <= self.no_hmd_attempts {
            log::info!("simulated runtime: no hmd (attempt {})", self.attempts);
            return Err(XrError::NoHmd);
        }

        let mut compositor = SimulatedCompositor::new(self.config.clone());
        if let Some(script) = self.session_scripts.pop_front() {
            script.into_iter().for_each(|status| compositor.push_status(status));
        }
        self.sessions_created += 1;
        Ok(compositor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LayerEye;
    use ocular_gfx::headless::{HeadlessGpu, HeadlessOptions};
    use ocular_gfx::rhi::{
        GfxBackend,
        types::{AdapterRequest, ColorFormat},
    };

    fn gpu() -> HeadlessGpu {
        HeadlessGpu::open(&AdapterRequest::default(), HeadlessOptions::default()).unwrap()
    }

    fn compositor() -> SimulatedCompositor<HeadlessGpu> {
        SimulatedCompositor::new(SimulatedHmdConfig::default())
    }

    fn create_chains(gpu: &HeadlessGpu, compositor: &mut SimulatedCompositor<HeadlessGpu>) -> Vec<SwapChainHandle> {
        (0..compositor.hmd_desc().eye_count())
            .map(|eye| {
                let desc = SwapChainDesc {
                    extent: Extent2D::new(64, 64),
                    format: ColorFormat::Rgba8UnormSrgb,
                    name: format!("eye-{eye}"),
                };
                compositor.create_swap_chain(gpu, &desc).unwrap()
            })
            .collect()
    }

    fn layer(compositor: &SimulatedCompositor<HeadlessGpu>, chains: &[SwapChainHandle]) -> Layer {
        Layer::EyeFov {
            eyes: chains
                .iter()
                .enumerate()
                .map(|(eye, chain)| LayerEye {
                    swap_chain: *chain,
                    viewport: Recti::from_extent(Extent2D::new(64, 64)),
                    fov: compositor.hmd_desc().default_eye_fov[eye],
                    render_pose: Pose::IDENTITY,
                })
                .collect(),
            sensor_sample_time: 0.0,
        }
    }

    #[test]
    fn test_hmd_desc_mirrors_fov() {
        let compositor = compositor();
        let desc = compositor.hmd_desc();
        assert_eq!(desc.eye_count(), 2);
        assert_eq!(desc.default_eye_fov[0].left_tan, desc.default_eye_fov[1].right_tan);
        assert_eq!(desc.default_eye_fov[0].up_tan, desc.default_eye_fov[1].up_tan);
    }

    #[test]
    fn test_hmd_desc_reports_configured_identity() {
        let max_fov = FovPort::new(1.6, 1.4, 1.2, 1.3);
        let compositor = SimulatedCompositor::<HeadlessGpu>::new(SimulatedHmdConfig {
            product_name: "Bench HMD".to_string(),
            manufacturer: "Bench Labs".to_string(),
            firmware_version: [2, 17],
            resolution: [2880, 1600],
            max_eye_fov: Some(max_fov),
            ..Default::default()
        });
        let desc = compositor.hmd_desc();
        assert_eq!(desc.product_name, "Bench HMD");
        assert_eq!(desc.manufacturer, "Bench Labs");
        assert_eq!((desc.firmware_major, desc.firmware_minor), (2, 17));
        assert_eq!(desc.resolution, Extent2D::new(2880, 1600));
        assert_eq!(desc.default_eye_fov[0], SimulatedHmdConfig::default().eye_fov);
        assert_eq!(desc.max_eye_fov[0], max_fov);
        assert_eq!(desc.max_eye_fov[1], max_fov.mirrored());
        assert_eq!(desc.max_eye_fov.len(), desc.eye_count());
    }

    #[test]
    fn test_truncated_eye_poses_fire_once() {
        let mut compositor = compositor();
        let hmd_to_eye = [Pose::IDENTITY, Pose::IDENTITY];
        compositor.truncate_next_eye_poses(1);
        assert_eq!(compositor.eye_poses(0, &hmd_to_eye).unwrap().poses.len(), 1);
        assert_eq!(compositor.eye_poses(0, &hmd_to_eye).unwrap().poses.len(), 2);
    }

    #[test]
    fn test_fov_texture_size() {
        let compositor = compositor();
        let fov = FovPort::new(1.0, 1.0, 1.0, 1.0);
        let size = compositor.fov_texture_size(0, &fov, 1.0).unwrap();
        assert_eq!(size, Extent2D::new(1250, 1204));
        let half = compositor.fov_texture_size(0, &fov, 0.5).unwrap();
        assert_eq!(half, Extent2D::new(625, 602));
        assert!(compositor.fov_texture_size(2, &fov, 1.0).is_err());
        assert!(compositor.fov_texture_size(0, &fov, 0.0).is_err());
    }

    #[test]
    fn test_eye_render_desc_ipd() {
        let compositor = compositor();
        let fov = compositor.hmd_desc().default_eye_fov[0];
        let left = compositor.eye_render_desc(0, &fov).unwrap();
        let right = compositor.eye_render_desc(1, &fov).unwrap();
        assert!((left.hmd_to_eye_pose.position.x + 0.032).abs() < 1e-6);
        assert!((right.hmd_to_eye_pose.position.x - 0.032).abs() < 1e-6);
        assert_eq!(right.distorted_viewport.x, 1080);
    }

    #[test]
    fn test_swap_chain_images_start_compositor_readable() {
        let gpu = gpu();
        let mut compositor = compositor();
        let chains = create_chains(&gpu, &mut compositor);
        assert_eq!(compositor.swap_chain_length(chains[0]).unwrap(), 3);
        let image = compositor.swap_chain_image(chains[0], 2).unwrap();
        assert_eq!(gpu.image_state(image), Some(ResourceState::CompositorRead));
        assert!(compositor.swap_chain_image(chains[0], 3).is_err());

        compositor.destroy(&gpu);
        assert_eq!(gpu.live_object_count(), 0);
    }

    #[test]
    fn test_frame_lifecycle() {
        let gpu = gpu();
        let mut compositor = compositor();
        let chains = create_chains(&gpu, &mut compositor);

        compositor.wait_to_begin_frame(0).unwrap();
        compositor.begin_frame(0).unwrap();
        for chain in &chains {
            assert_eq!(compositor.swap_chain_current_index(*chain).unwrap(), 0);
            compositor.commit_swap_chain(*chain).unwrap();
            assert_eq!(compositor.swap_chain_current_index(*chain).unwrap(), 1);
        }
        let layers = [layer(&compositor, &chains)];
        compositor.end_frame(0, &layers).unwrap();

        assert!(compositor.is_frame_idle());
        assert_eq!(compositor.last_layers(), &layers);
        let stats = compositor.stats();
        assert_eq!(stats.frames_ended, 1);
        assert_eq!(stats.commits, 2);
        compositor.destroy(&gpu);
    }

    #[test]
    fn test_lifecycle_violations() {
        let gpu = gpu();
        let mut compositor = compositor();
        let chains = create_chains(&gpu, &mut compositor);

        // 没有 wait 就 begin
        assert!(matches!(compositor.begin_frame(0), Err(XrError::InvalidCall { .. })));
        // 没有 begin 就 commit
        assert!(matches!(compositor.commit_swap_chain(chains[0]), Err(XrError::InvalidCall { .. })));

        compositor.wait_to_begin_frame(0).unwrap();
        assert!(matches!(compositor.wait_to_begin_frame(0), Err(XrError::InvalidCall { .. })));
        compositor.begin_frame(0).unwrap();
        compositor.commit_swap_chain(chains[0]).unwrap();
        assert!(matches!(compositor.commit_swap_chain(chains[0]), Err(XrError::InvalidCall { .. })));

        // 右眼还没有 commit
        let layers = [layer(&compositor, &chains)];
        assert!(matches!(compositor.end_frame(0, &layers), Err(XrError::InvalidCall { .. })));
        compositor.commit_swap_chain(chains[1]).unwrap();
        compositor.end_frame(0, &layers).unwrap();

        // frame index 不能回退
        assert!(matches!(compositor.wait_to_begin_frame(0), Err(XrError::InvalidCall { .. })));
        compositor.wait_to_begin_frame(1).unwrap();
        compositor.destroy(&gpu);
    }

    #[test]
    fn test_status_script_then_steady() {
        let mut compositor = compositor();
        compositor.push_status(SessionStatus {
            has_input_focus: false,
            ..SessionStatus::RUNNING
        });
        assert!(!compositor.session_status().unwrap().has_input_focus);
        assert_eq!(compositor.session_status().unwrap(), SessionStatus::RUNNING);
        assert_eq!(compositor.stats().status_queries, 2);
    }

    #[test]
    fn test_display_lost_is_sticky() {
        let mut compositor = compositor();
        compositor.push_status(SessionStatus {
            display_lost: true,
            ..SessionStatus::RUNNING
        });
        assert!(compositor.session_status().unwrap().display_lost);
        let status = compositor.session_status().unwrap();
        assert!(status.display_lost);
        assert!(!status.is_visible);
        assert!(matches!(compositor.wait_to_begin_frame(0), Err(XrError::DisplayLost)));
    }

    #[test]
    fn test_injected_failure_fires_once() {
        let mut compositor = compositor();
        compositor.fail_next(XrCall::WaitToBeginFrame, SimulatedFailure::CallFailed);
        assert!(matches!(compositor.wait_to_begin_frame(0), Err(XrError::CallFailed { .. })));
        compositor.wait_to_begin_frame(0).unwrap();
    }

    #[test]
    fn test_eye_poses_follow_head_and_recenter() {
        let mut compositor = SimulatedCompositor::<HeadlessGpu>::new(SimulatedHmdConfig {
            head_yaw_deg_per_s: 90.0,
            refresh_rate: 90.0,
            ..Default::default()
        });
        let hmd_to_eye = [
            Pose::new(Quat::IDENTITY, Vec3::new(-0.032, 0.0, 0.0)),
            Pose::new(Quat::IDENTITY, Vec3::new(0.032, 0.0, 0.0)),
        ];

        // 90 帧 = 1 秒 = 90 度
        let poses = compositor.eye_poses(90, &hmd_to_eye).unwrap();
        assert!((poses.sensor_sample_time - 1.0).abs() < 1e-9);
        let forward = poses.poses[0].orientation * Vec3::NEG_Z;
        assert!((forward - Vec3::NEG_X).length() < 1e-5);
        let ipd = (poses.poses[1].position - poses.poses[0].position).length();
        assert!((ipd - 0.064).abs() < 1e-5);

        compositor.recenter_tracking_origin().unwrap();
        let poses = compositor.eye_poses(90, &hmd_to_eye).unwrap();
        let forward = poses.poses[0].orientation * Vec3::NEG_Z;
        assert!((forward - Vec3::NEG_Z).length() < 1e-5);
        assert_eq!(compositor.stats().recenters, 1);
    }

    #[test]
    fn test_runtime_no_hmd_then_session() {
        let mut runtime = SimulatedRuntime::new(SimulatedHmdConfig::default()).with_no_hmd_attempts(2);
        runtime.push_session_script(vec![SessionStatus {
            should_quit: true,
            ..SessionStatus::RUNNING
        }]);

        for _ in 0..2 {
            let result: XrResult<SimulatedCompositor<HeadlessGpu>> = runtime.create_session();
            assert!(matches!(result, Err(XrError::NoHmd)));
        }
        let mut session: SimulatedCompositor<HeadlessGpu> = runtime.create_session().unwrap();
        assert!(session.session_status().unwrap().should_quit);
        assert_eq!(runtime.attempts(), 3);
        assert_eq!(runtime.sessions_created(), 1);
    }
}
