use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ocular_crate_tools::config::{load_toml, load_toml_or_default};
use ocular_crate_tools::path::OcularPath;
use ocular_renderer::{RenderSettings, SceneSettings};
use ocular_xr::simulated::SimulatedHmdConfig;

use crate::session::SessionConfig;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GfxBackendKind {
    #[default]
    Vulkan,
    /// 不需要显卡，命令只做记录和状态检查
    Headless,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GfxConfig {
    pub backend: GfxBackendKind,
    pub validation: bool,
    pub app_name: String,
    /// 覆盖后端默认的 placement 粒度
    pub placement_granularity: Option<u64>,
}
impl Default for GfxConfig {
    fn default() -> Self {
        Self {
            backend: GfxBackendKind::default(),
            validation: cfg!(debug_assertions),
            app_name: "Ocular".to_string(),
            placement_granularity: None,
        }
    }
}

/// 编译好的 SPIR-V，相对路径基于工作区根目录
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderPaths {
    pub vertex: PathBuf,
    pub pixel: PathBuf,
}
impl Default for ShaderPaths {
    fn default() -> Self {
        Self {
            vertex: OcularPath::shader_build_path("scene.vert"),
            pixel: OcularPath::shader_build_path("scene.frag"),
        }
    }
}

/// 桌面上的镜像窗口，只用来接收按键
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub enabled: bool,
    pub title: String,
    pub width: u32,
    pub height: u32,
}
impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            title: "Ocular".to_string(),
            width: 1200,
            height: 800,
        }
    }
}

/// `config/ocular.toml`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gfx: GfxConfig,
    pub render: RenderSettings,
    pub scene: SceneSettings,
    pub shaders: ShaderPaths,
    pub hmd: SimulatedHmdConfig,
    pub session: SessionConfig,
    pub window: WindowConfig,
}
impl AppConfig {
    /// 显式指定的文件必须存在；没有指定时读取 `config/ocular.toml`，不存在则使用默认值
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config: Self = match path {
            Some(path) => load_toml(path)?,
            None => load_toml_or_default(OcularPath::config_path("ocular.toml"))?,
        };
        log::info!("config: backend {:?}, hmd '{}'", config.gfx.backend, config.hmd.product_name);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocular_crate_tools::config::parse_toml;
    use ocular_renderer::frame_ring::SlotReusePolicy;

    #[test]
    fn test_partial_config() {
        let config: AppConfig = parse_toml(
            r#"
            [gfx]
            backend = "headless"

            [render]
            slot_reuse_policy = "trust_compositor"

            [scene]
            spin_rate = 10.0

            [session]
            frame_limit = 120

            [window]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.gfx.backend, GfxBackendKind::Headless);
        assert_eq!(config.gfx.app_name, "Ocular");
        assert_eq!(config.render.slot_reuse_policy, SlotReusePolicy::TrustCompositor);
        assert_eq!(config.render.near, 0.2);
        assert_eq!(config.scene.spin_rate, 10.0);
        assert_eq!(config.scene.cube_distance, 5.0);
        assert_eq!(config.session.frame_limit, Some(120));
        assert_eq!(config.session.max_search_attempts, None);
        assert!(!config.window.enabled);
        assert_eq!(config.hmd, SimulatedHmdConfig::default());
    }

    #[test]
    fn test_default_shader_paths() {
        let paths = ShaderPaths::default();
        assert!(paths.vertex.ends_with("engine/shader/.build/scene.vert.spv"));
        assert!(paths.pixel.ends_with("engine/shader/.build/scene.frag.spv"));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert!(parse_toml::<AppConfig>("[gfx]\nbackend = \"d3d12\"").is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        assert!(AppConfig::load(Some(Path::new("/definitely/not/here/ocular.toml"))).is_err());
    }

    #[test]
    fn test_workspace_config_parses() {
        let path = OcularPath::config_path("ocular.toml");
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.hmd.eye_count, 2);
    }
}
