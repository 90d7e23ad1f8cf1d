use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;

/// 从 TOML 文件中读取配置
///
/// 缺失的字段由各个配置结构体的 `#[serde(default)]` 补齐
pub fn load_toml<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> anyhow::Result<T> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).with_context(|| format!("failed to read config file: {:?}", path))?;
    parse_toml(&content).with_context(|| format!("failed to parse config file: {:?}", path))
}

/// 从 TOML 字符串中读取配置
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> anyhow::Result<T> {
    let value = toml::from_str::<T>(content)?;
    Ok(value)
}

/// 如果文件存在就读取，否则使用默认配置
pub fn load_toml_or_default<T: DeserializeOwned + Default, P: AsRef<Path>>(path: P) -> anyhow::Result<T> {
    let path = path.as_ref();
    if path.exists() {
        load_toml(path)
    } else {
        log::warn!("config file {:?} not found, using default config", path);
        Ok(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Default, PartialEq)]
    #[serde(default)]
    struct Demo {
        name: String,
        count: u32,
    }

    #[test]
    fn test_parse_with_default_fields() {
        let demo: Demo = parse_toml("name = \"abc\"").unwrap();
        assert_eq!(demo.name, "abc");
        assert_eq!(demo.count, 0);
    }

    #[test]
    fn test_parse_error() {
        let result = parse_toml::<Demo>("count = \"not a number\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let demo: Demo = load_toml_or_default("/definitely/not/here/ocular.toml").unwrap();
        assert_eq!(demo, Demo::default());
    }
}
