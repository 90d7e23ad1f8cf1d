use std::path::{Path, PathBuf};

/// 统一路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
///
/// # 使用示例
/// ```ignore
/// let config = OcularPath::config_path("ocular.toml");     // config/ocular.toml
/// let shader = OcularPath::shader_build_path("scene.vert"); // engine/shader/.build/scene.vert.spv
/// ```
pub struct OcularPath {}
// 核心路径
impl OcularPath {
    /// 获取工作区根目录
    pub fn workspace_path() -> PathBuf {
        // 从当前包的位置推导 workspace 目录
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.parent().unwrap_or(manifest_dir).to_path_buf()
    }

    pub fn engine_path() -> PathBuf {
        Self::workspace_path().join("engine")
    }
}
// 根目录下
impl OcularPath {
    /// 获取 `config/` 目录下的文件路径
    pub fn config_path(filename: &str) -> PathBuf {
        Self::workspace_path().join("config").join(filename)
    }
}
// engine 目录下
impl OcularPath {
    pub fn shader_root_path() -> PathBuf {
        Self::engine_path().join("shader")
    }

    /// 获取 `shader/.build/` 目录下的着色器路径（编译后的 SPIR-V）
    pub fn shader_build_path(filename: &str) -> PathBuf {
        Self::shader_root_path().join(".build").join(format!("{filename}.spv"))
    }

    /// 相对路径视为相对于工作区根目录
    pub fn resolve(path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() { path.to_path_buf() } else { Self::workspace_path().join(path) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_build_path() {
        let path = OcularPath::shader_build_path("scene.vert");
        assert!(path.ends_with("engine/shader/.build/scene.vert.spv"));
    }

    #[test]
    fn test_resolve_keeps_absolute() {
        let abs = Path::new("/tmp/a.spv");
        assert_eq!(OcularPath::resolve(abs), abs.to_path_buf());
        assert!(OcularPath::resolve("config/ocular.toml").starts_with(OcularPath::workspace_path()));
    }
}
