//! 头显会话的状态机
//!
//! ```text
//! Searching ──(创建会话)──▶ Acquiring ──(bootstrap 成功)──▶ Running
//!     ▲                                                        │
//!     └────────────────────── Lost ◀──────(显示丢失)───────────┘
//! ```
//!
//! 每一次 Lost 都会完整销毁 renderer、合成器会话和设备，然后重新搜索头显

use std::thread;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use ocular_gfx::rhi::{GfxBackend, types::AdapterRequest};
use ocular_renderer::{RenderSettings, SceneSettings, ShaderBinaries, StereoRenderer, TickOutcome};
use ocular_xr::{Compositor, XrError, XrRuntime};

use crate::input::{HostSignal, InputSource};
use crate::timer::Timer;

/// 每提交这么多帧输出一次帧率
const FRAME_LOG_INTERVAL: u64 = 900;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 没有检测到头显时，两次搜索之间的间隔
    pub search_retry_ms: u64,
    /// 连续搜索失败多少次后放弃；None 表示一直搜索
    pub max_search_attempts: Option<u32>,
    /// 提交多少帧后正常退出；None 表示不限制
    pub frame_limit: Option<u64>,
}
impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            search_retry_ms: 1000,
            max_search_attempts: None,
            frame_limit: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Searching,
    Acquiring,
    Running,
    Lost,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionExit {
    /// 用户或者合成器要求退出
    Quit,
    /// 达到了 `frame_limit`
    FrameLimit,
}

/// 每次获取头显时创建 renderer 所需的参数
#[derive(Clone, Debug, Default)]
pub struct SessionSettings {
    pub render: RenderSettings,
    pub scene: SceneSettings,
    pub shaders: ShaderBinaries,
    pub session: SessionConfig,
}

pub struct SessionRunner<G, R>
where
    G: GfxBackend,
    R: XrRuntime<G>,
{
    runtime: R,
    gfx_options: G::Options,
    adapter_request: AdapterRequest,
    settings: SessionSettings,

    phase: SessionPhase,
    history: Vec<SessionPhase>,
    renderer: Option<StereoRenderer<G, R::Compositor>>,
    /// Searching 创建的会话，在 Acquiring 中交给 renderer
    pending: Option<R::Compositor>,

    search_attempts: u32,
    frames_submitted: u64,
    /// 用户暂停跨会话保留
    user_paused: bool,
}

// 创建与销毁
impl<G, R> SessionRunner<G, R>
where
    G: GfxBackend,
    G::Options: Clone,
    R: XrRuntime<G>,
{
    pub fn new(runtime: R, gfx_options: G::Options, adapter_request: AdapterRequest, settings: SessionSettings) -> Self {
        Self {
            runtime,
            gfx_options,
            adapter_request,
            settings,
            phase: SessionPhase::Searching,
            history: vec![SessionPhase::Searching],
            renderer: None,
            pending: None,
            search_attempts: 0,
            frames_submitted: 0,
            user_paused: false,
        }
    }

    /// 销毁当前会话；`destroy` 内部会先等待队列空闲
    fn teardown(&mut self) {
        // 还没有设备和 swap chain，直接丢弃
        if self.pending.take().is_some() {
            log::info!("dropping session before bootstrap");
        }
        if let Some(renderer) = self.renderer.take() {
            log::info!("tearing down session after {} frames", self.frames_submitted);
            renderer.destroy();
        }
    }
}

// 状态机
impl<G, R> SessionRunner<G, R>
where
    G: GfxBackend,
    G::Options: Clone,
    R: XrRuntime<G>,
{
    /// 一直运行直到退出；致命错误时会话已经被销毁
    pub fn run(&mut self, input: &mut dyn InputSource, timer: &mut Timer) -> anyhow::Result<SessionExit> {
        loop {
            timer.tick();
            let signals = input.poll();
            let frames_before = self.frames_submitted;
            if let Some(exit) = self.step(timer.delta_time_s(), &signals)? {
                log::info!(
                    "session exit: {exit:?}, {} frames in {:.2}s",
                    self.frames_submitted,
                    timer.total_time_s()
                );
                return Ok(exit);
            }
            if self.frames_submitted != frames_before && self.frames_submitted % FRAME_LOG_INTERVAL == 0 {
                log::debug!("frame {}: {}", self.frames_submitted, timer.frame_summary());
            }
            if self.phase != SessionPhase::Running {
                timer.reset_tick();
            }
        }
    }

    /// 处理一次输入，然后推进一步状态机
    pub fn step(&mut self, dt: f32, signals: &[HostSignal]) -> anyhow::Result<Option<SessionExit>> {
        for signal in signals {
            match signal {
                HostSignal::Quit => {
                    self.teardown();
                    return Ok(Some(SessionExit::Quit));
                }
                HostSignal::TogglePause => {
                    self.user_paused = !self.user_paused;
                    log::info!("user pause: {}", self.user_paused);
                    if let Some(renderer) = self.renderer.as_mut() {
                        renderer.set_user_paused(self.user_paused);
                    }
                }
            }
        }

        let result = match self.phase {
            SessionPhase::Searching => self.search().map(|()| None),
            SessionPhase::Acquiring => self.acquire().map(|()| None),
            SessionPhase::Running => self.run_frame(dt),
            SessionPhase::Lost => {
                self.teardown();
                self.enter(SessionPhase::Searching);
                Ok(None)
            }
        };
        if result.is_err() {
            self.teardown();
        }
        result
    }

    fn enter(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            log::info!("session: {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
            self.history.push(phase);
        }
    }

    fn search(&mut self) -> anyhow::Result<()> {
        self.search_attempts += 1;
        let compositor = match self.runtime.create_session() {
            Ok(compositor) => compositor,
            Err(XrError::NoHmd) => {
                if let Some(max) = self.settings.session.max_search_attempts {
                    anyhow::ensure!(self.search_attempts < max, "no HMD found after {} attempts", self.search_attempts);
                }
                log::info!("no HMD, retry in {}ms", self.settings.session.search_retry_ms);
                thread::sleep(Duration::from_millis(self.settings.session.search_retry_ms));
                return Ok(());
            }
            Err(err) => return Err(anyhow::Error::new(err).context("Failed to create session!")),
        };

        self.search_attempts = 0;
        self.pending = Some(compositor);
        self.enter(SessionPhase::Acquiring);
        Ok(())
    }

    /// 在头显连接的显卡上打开设备，然后创建 renderer
    fn acquire(&mut self) -> anyhow::Result<()> {
        let Some(compositor) = self.pending.take() else {
            anyhow::bail!("acquiring without a session");
        };
        let desc = compositor.hmd_desc();
        log::info!("found '{}' ({} eyes)", desc.product_name, desc.eye_count());
        desc.log_summary();

        let request = AdapterRequest {
            luid: desc.adapter_luid,
            ..self.adapter_request.clone()
        };
        // 设备还不存在，合成器没有创建任何 swap chain，直接丢弃即可
        let gfx = G::open(&request, self.gfx_options.clone()).context("Failed to open GPU device!")?;

        let mut renderer = StereoRenderer::new(
            gfx,
            compositor,
            self.settings.render.clone(),
            &self.settings.scene,
            &self.settings.shaders,
        )
        .map_err(|failure| anyhow::Error::new(failure.destroy()).context("Failed to bootstrap renderer!"))?;
        renderer.set_user_paused(self.user_paused);
        self.renderer = Some(renderer);
        self.enter(SessionPhase::Running);
        Ok(())
    }

    fn run_frame(&mut self, dt: f32) -> anyhow::Result<Option<SessionExit>> {
        let Some(renderer) = self.renderer.as_mut() else {
            anyhow::bail!("running without a renderer");
        };
        match renderer.tick(dt).context("Fatal error during frame!")? {
            TickOutcome::Submitted { .. } => {
                self.frames_submitted += 1;
                if self.settings.session.frame_limit.is_some_and(|limit| self.frames_submitted >= limit) {
                    self.teardown();
                    return Ok(Some(SessionExit::FrameLimit));
                }
                Ok(None)
            }
            TickOutcome::Skipped => Ok(None),
            TickOutcome::Quit => {
                self.teardown();
                Ok(Some(SessionExit::Quit))
            }
            TickOutcome::SessionLost => {
                self.enter(SessionPhase::Lost);
                Ok(None)
            }
        }
    }
}

// getters
impl<G, R> SessionRunner<G, R>
where
    G: GfxBackend,
    R: XrRuntime<G>,
{
    #[inline]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// 经历过的状态，相邻的重复状态只记录一次
    #[inline]
    pub fn history(&self) -> &[SessionPhase] {
        &self.history
    }

    #[inline]
    pub fn renderer(&self) -> Option<&StereoRenderer<G, R::Compositor>> {
        self.renderer.as_ref()
    }

    #[inline]
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// 已经创建但还没有 bootstrap 的会话
    #[inline]
    pub fn has_pending_session(&self) -> bool {
        self.pending.is_some()
    }

    #[inline]
    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    #[inline]
    pub fn is_user_paused(&self) -> bool {
        self.user_paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ScriptedInput;
    use ocular_gfx::headless::{HeadlessGpu, HeadlessOptions};
    use ocular_gfx::rhi::types::{AdapterInfo, AdapterLuid};
    use ocular_xr::simulated::{SimulatedHmdConfig, SimulatedRuntime};
    use ocular_xr::types::SessionStatus;

    type TestRunner = SessionRunner<HeadlessGpu, SimulatedRuntime>;

    fn settings(session: SessionConfig) -> SessionSettings {
        SessionSettings {
            shaders: ShaderBinaries {
                vertex: b"vertex".to_vec(),
                pixel: b"pixel".to_vec(),
            },
            session: SessionConfig {
                search_retry_ms: 0,
                ..session
            },
            ..Default::default()
        }
    }

    fn runner(runtime: SimulatedRuntime, session: SessionConfig) -> TestRunner {
        SessionRunner::new(runtime, HeadlessOptions::default(), AdapterRequest::default(), settings(session))
    }

    fn lost() -> SessionStatus {
        SessionStatus {
            display_lost: true,
            ..SessionStatus::RUNNING
        }
    }

    fn quit() -> SessionStatus {
        SessionStatus {
            should_quit: true,
            ..SessionStatus::RUNNING
        }
    }

    #[test]
    fn test_searches_until_hmd_appears() {
        let mut runtime = SimulatedRuntime::new(SimulatedHmdConfig::default()).with_no_hmd_attempts(2);
        runtime.push_session_script(vec![SessionStatus::RUNNING, quit()]);
        let mut runner = runner(runtime, SessionConfig::default());

        assert_eq!(runner.step(0.01, &[]).unwrap(), None);
        assert_eq!(runner.step(0.01, &[]).unwrap(), None);
        assert_eq!(runner.phase(), SessionPhase::Searching);
        assert!(runner.renderer().is_none());

        assert_eq!(runner.step(0.01, &[]).unwrap(), None);
        assert_eq!(runner.phase(), SessionPhase::Acquiring);
        assert!(runner.has_pending_session());
        assert!(runner.renderer().is_none());

        assert_eq!(runner.step(0.01, &[]).unwrap(), None);
        assert_eq!(runner.phase(), SessionPhase::Running);
        assert!(!runner.has_pending_session());
        assert!(runner.renderer().is_some());

        assert_eq!(runner.step(0.01, &[]).unwrap(), None);
        assert_eq!(runner.step(0.01, &[]).unwrap(), Some(SessionExit::Quit));
        assert!(runner.renderer().is_none());
        assert_eq!(runner.frames_submitted(), 1);
        assert_eq!(runner.runtime().attempts(), 3);
    }

    #[test]
    fn test_display_loss_reacquires() {
        let mut runtime = SimulatedRuntime::new(SimulatedHmdConfig::default());
        runtime.push_session_script(vec![SessionStatus::RUNNING, SessionStatus::RUNNING, lost()]);
        runtime.push_session_script(vec![SessionStatus::RUNNING, quit()]);
        let mut runner = runner(runtime, SessionConfig::default());

        let exit = runner.run(&mut ScriptedInput::default(), &mut Timer::default()).unwrap();
        assert_eq!(exit, SessionExit::Quit);
        assert_eq!(
            runner.history(),
            &[
                SessionPhase::Searching,
                SessionPhase::Acquiring,
                SessionPhase::Running,
                SessionPhase::Lost,
                SessionPhase::Searching,
                SessionPhase::Acquiring,
                SessionPhase::Running,
            ]
        );
        assert_eq!(runner.runtime().sessions_created(), 2);
        assert_eq!(runner.frames_submitted(), 3);
        assert!(runner.renderer().is_none());
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let runtime = SimulatedRuntime::new(SimulatedHmdConfig::default()).with_no_hmd_attempts(10);
        let mut runner = runner(
            runtime,
            SessionConfig {
                max_search_attempts: Some(3),
                ..Default::default()
            },
        );

        let err = runner.run(&mut ScriptedInput::default(), &mut Timer::default()).unwrap_err();
        assert!(format!("{err:#}").contains("no HMD found after 3 attempts"));
        assert_eq!(runner.runtime().attempts(), 3);
    }

    #[test]
    fn test_frame_limit() {
        let runtime = SimulatedRuntime::new(SimulatedHmdConfig::default());
        let mut runner = runner(
            runtime,
            SessionConfig {
                frame_limit: Some(5),
                ..Default::default()
            },
        );

        let exit = runner.run(&mut ScriptedInput::default(), &mut Timer::default()).unwrap();
        assert_eq!(exit, SessionExit::FrameLimit);
        assert_eq!(runner.frames_submitted(), 5);
        assert!(runner.renderer().is_none());
    }

    #[test]
    fn test_quit_signal() {
        let runtime = SimulatedRuntime::new(SimulatedHmdConfig::default());
        let mut runner = runner(runtime, SessionConfig::default());

        let mut input = ScriptedInput::at(4, HostSignal::Quit);
        let exit = runner.run(&mut input, &mut Timer::default()).unwrap();
        assert_eq!(exit, SessionExit::Quit);
        // 前两次 step 创建会话并 bootstrap，之后两帧
        assert_eq!(runner.frames_submitted(), 2);
        assert!(runner.renderer().is_none());
    }

    #[test]
    fn test_quit_while_acquiring_drops_session() {
        let runtime = SimulatedRuntime::new(SimulatedHmdConfig::default());
        let mut runner = runner(runtime, SessionConfig::default());

        assert_eq!(runner.step(0.01, &[]).unwrap(), None);
        assert!(runner.has_pending_session());
        assert_eq!(runner.step(0.01, &[HostSignal::Quit]).unwrap(), Some(SessionExit::Quit));
        assert!(!runner.has_pending_session());
        assert!(runner.renderer().is_none());
        assert_eq!(runner.history(), &[SessionPhase::Searching, SessionPhase::Acquiring]);
    }

    #[test]
    fn test_pause_survives_reacquire() {
        let mut runtime = SimulatedRuntime::new(SimulatedHmdConfig::default());
        runtime.push_session_script(vec![lost()]);
        let mut runner = runner(runtime, SessionConfig::default());

        runner.step(0.01, &[HostSignal::TogglePause]).unwrap();
        assert!(runner.is_user_paused());
        assert_eq!(runner.phase(), SessionPhase::Acquiring);
        runner.step(0.01, &[]).unwrap();
        assert!(runner.renderer().unwrap().is_paused());

        // 显示丢失 → Lost → Searching → Acquiring → Running
        runner.step(0.01, &[]).unwrap();
        assert_eq!(runner.phase(), SessionPhase::Lost);
        runner.step(0.01, &[]).unwrap();
        assert_eq!(runner.phase(), SessionPhase::Searching);
        runner.step(0.01, &[]).unwrap();
        assert_eq!(runner.phase(), SessionPhase::Acquiring);
        runner.step(0.01, &[]).unwrap();
        assert_eq!(runner.phase(), SessionPhase::Running);
        assert!(runner.renderer().unwrap().is_paused());

        runner.step(0.01, &[HostSignal::TogglePause]).unwrap();
        assert!(!runner.renderer().unwrap().is_paused());
    }

    #[test]
    fn test_bootstrap_failure_is_fatal() {
        let runtime = SimulatedRuntime::new(SimulatedHmdConfig::default());
        let options = HeadlessOptions {
            adapters: vec![AdapterInfo {
                name: "Tiny GPU".to_string(),
                luid: Some(AdapterLuid([7, 0, 0, 0, 0, 0, 0, 0])),
                vendor_id: 0,
                device_id: 0,
                discrete: true,
                max_push_constants_size: 64,
            }],
            ..Default::default()
        };
        let mut runner: TestRunner = SessionRunner::new(
            runtime,
            options,
            AdapterRequest::default(),
            settings(SessionConfig::default()),
        );

        assert_eq!(runner.step(0.01, &[]).unwrap(), None);
        assert_eq!(runner.phase(), SessionPhase::Acquiring);
        let err = runner.step(0.01, &[]).unwrap_err();
        assert!(format!("{err:#}").contains("Device does not support the root constants!"));
        assert!(runner.renderer().is_none());
    }
}
