use std::fs;
use std::path::Path;

use anyhow::Context;

use ocular_crate_tools::path::OcularPath;
use ocular_gfx::headless::HeadlessOptions;
use ocular_gfx::rhi::types::AdapterRequest;
use ocular_gfx::vulkan::VulkanOptions;
use ocular_renderer::ShaderBinaries;

use crate::config::{GfxBackendKind, GfxConfig, ShaderPaths};

/// 打开显卡时的请求模板；LUID 在获取到头显之后再填入
pub fn adapter_request(config: &GfxConfig) -> AdapterRequest {
    AdapterRequest {
        luid: None,
        app_name: config.app_name.clone(),
        validation: config.validation,
    }
}

pub fn vulkan_options(config: &GfxConfig) -> VulkanOptions {
    VulkanOptions {
        placement_granularity: config.placement_granularity,
    }
}

pub fn headless_options(config: &GfxConfig) -> HeadlessOptions {
    let mut options = HeadlessOptions::default();
    if let Some(granularity) = config.placement_granularity {
        options.placement_granularity = granularity;
    }
    options
}

fn read_shader(path: &Path) -> anyhow::Result<Vec<u8>> {
    let path = OcularPath::resolve(path);
    let bytes = fs::read(&path).with_context(|| format!("failed to read shader: {:?}", path))?;
    anyhow::ensure!(!bytes.is_empty(), "shader {:?} is empty", path);
    Ok(bytes)
}

/// headless 后端不解析 SPIR-V，没有编译 shader 时用占位字节
const HEADLESS_PLACEHOLDER_SHADER: &[u8] = b"ocular-headless-shader";

pub fn load_shaders(paths: &ShaderPaths, backend: GfxBackendKind) -> anyhow::Result<ShaderBinaries> {
    let loaded = read_shader(&paths.vertex).and_then(|vertex| {
        let pixel = read_shader(&paths.pixel)?;
        Ok(ShaderBinaries { vertex, pixel })
    });
    match (loaded, backend) {
        (Ok(shaders), _) => Ok(shaders),
        (Err(err), GfxBackendKind::Headless) => {
            log::warn!("{err:#}, using placeholder shaders for the headless backend");
            Ok(ShaderBinaries {
                vertex: HEADLESS_PLACEHOLDER_SHADER.to_vec(),
                pixel: HEADLESS_PLACEHOLDER_SHADER.to_vec(),
            })
        }
        (Err(err), GfxBackendKind::Vulkan) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing_paths() -> ShaderPaths {
        ShaderPaths {
            vertex: "/definitely/not/here/scene.vert.spv".into(),
            pixel: "/definitely/not/here/scene.frag.spv".into(),
        }
    }

    #[test]
    fn test_missing_shaders_fail_on_vulkan() {
        let err = load_shaders(&missing_paths(), GfxBackendKind::Vulkan).unwrap_err();
        assert!(format!("{err:#}").contains("scene.vert.spv"));
    }

    #[test]
    fn test_missing_shaders_fall_back_on_headless() {
        let shaders = load_shaders(&missing_paths(), GfxBackendKind::Headless).unwrap();
        assert!(!shaders.vertex.is_empty());
        assert!(!shaders.pixel.is_empty());
    }

    #[test]
    fn test_reads_shader_files() {
        let dir = std::env::temp_dir().join(format!("ocular-shader-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let paths = ShaderPaths {
            vertex: dir.join("scene.vert.spv"),
            pixel: dir.join("scene.frag.spv"),
        };
        fs::write(&paths.vertex, [0x03, 0x02, 0x23, 0x07]).unwrap();
        fs::write(&paths.pixel, [0x03, 0x02, 0x23, 0x07, 0x00]).unwrap();

        let shaders = load_shaders(&paths, GfxBackendKind::Vulkan).unwrap();
        assert_eq!(shaders.vertex.len(), 4);
        assert_eq!(shaders.pixel.len(), 5);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_granularity_override() {
        let config = GfxConfig {
            placement_granularity: Some(4096),
            ..Default::default()
        };
        assert_eq!(headless_options(&config).placement_granularity, 4096);
        assert_eq!(vulkan_options(&config).placement_granularity, Some(4096));
        assert_eq!(adapter_request(&config).luid, None);
    }
}
