//! Ocular 宿主程序
//!
//! - [`config`]：`config/ocular.toml`
//! - [`session`]：搜索头显 → 创建 renderer → 运行 → 显示丢失后重建
//! - [`input`]：桌面窗口的按键
//! - [`app`]：按照配置选择后端并运行

pub mod app;
pub mod config;
pub mod input;
pub mod platform;
pub mod session;
pub mod timer;
