//! 与后端无关的 GPU 接口

pub mod command_list;
pub mod device;
pub mod error;
pub mod types;

pub use command_list::GfxCommandList;
pub use device::{GfxBackend, GfxDevice};
pub use error::{GfxError, GfxResult};
