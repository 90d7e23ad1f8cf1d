//! Ocular 工具集
//!
//! 提供日志初始化、配置文件加载、基于工作区的路径管理等通用工具。
//!
//! # OcularPath
//! 基于工作区根目录的统一路径管理，避免硬编码相对路径。
//!
//! # 配置
//! 所有配置均为 TOML，通过 serde 反序列化。
//!
//! # 性能分析
//! [`profile_span!`] 在 tracy client 运行时创建 span。

pub mod config;
pub mod init_log;
pub mod path;
pub mod profile;
