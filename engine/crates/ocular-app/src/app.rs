use ocular_gfx::headless::HeadlessGpu;
use ocular_gfx::rhi::GfxBackend;
use ocular_gfx::vulkan::VulkanGpu;
use ocular_xr::simulated::SimulatedRuntime;

use crate::config::{AppConfig, GfxBackendKind};
use crate::input::{InputSource, ScriptedInput, WinitInput};
use crate::platform;
use crate::session::{SessionExit, SessionRunner, SessionSettings};
use crate::timer::Timer;

/// 窗口创建失败（例如没有桌面环境）时退化为无输入
fn create_input(config: &AppConfig) -> Box<dyn InputSource> {
    if !config.window.enabled {
        return Box::new(ScriptedInput::default());
    }
    match WinitInput::new(&config.window) {
        Ok(input) => Box::new(input),
        Err(err) => {
            log::warn!("{err:#}, running without window input");
            Box::new(ScriptedInput::default())
        }
    }
}

fn run_with<G>(
    config: &AppConfig,
    gfx_options: G::Options,
    settings: SessionSettings,
    input: &mut dyn InputSource,
) -> anyhow::Result<SessionExit>
where
    G: GfxBackend,
    G::Options: Clone,
{
    let runtime = SimulatedRuntime::new(config.hmd.clone());
    let mut runner: SessionRunner<G, SimulatedRuntime> =
        SessionRunner::new(runtime, gfx_options, platform::adapter_request(&config.gfx), settings);
    runner.run(input, &mut Timer::default())
}

/// 加载 shader，按照配置选择后端，然后运行会话直到退出
pub fn run(config: &AppConfig) -> anyhow::Result<SessionExit> {
    let _span = ocular_crate_tools::profile_span!("ocular::run");

    let settings = SessionSettings {
        render: config.render.clone(),
        scene: config.scene.clone(),
        shaders: platform::load_shaders(&config.shaders, config.gfx.backend)?,
        session: config.session.clone(),
    };
    let mut input = create_input(config);

    match config.gfx.backend {
        GfxBackendKind::Vulkan => {
            run_with::<VulkanGpu>(config, platform::vulkan_options(&config.gfx), settings, input.as_mut())
        }
        GfxBackendKind::Headless => {
            run_with::<HeadlessGpu>(config, platform::headless_options(&config.gfx), settings, input.as_mut())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShaderPaths;

    #[test]
    fn test_headless_run_to_frame_limit() {
        let mut config = AppConfig::default();
        config.gfx.backend = GfxBackendKind::Headless;
        config.window.enabled = false;
        config.session.frame_limit = Some(3);
        config.shaders = ShaderPaths {
            vertex: "/definitely/not/here/scene.vert.spv".into(),
            pixel: "/definitely/not/here/scene.frag.spv".into(),
        };

        assert_eq!(run(&config).unwrap(), SessionExit::FrameLimit);
    }
}
