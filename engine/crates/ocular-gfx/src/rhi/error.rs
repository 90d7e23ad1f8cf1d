use crate::rhi::types::ResourceState;

/// GFX 层的错误
///
/// 所有创建、提交、等待调用都返回 [`GfxResult`]，调用方必须处理
#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    #[error("no suitable GPU adapter found: {reason}")]
    NoAdapter { reason: String },

    #[error("{call} failed: {reason}")]
    Backend { call: &'static str, reason: String },

    #[error("device limit not satisfied: {limit} requires {required}, device supports {supported}")]
    UnsupportedLimit {
        limit: &'static str,
        required: u64,
        supported: u64,
    },

    #[error("buffer range [{offset}, {offset}+{size}) does not fit in heap '{heap}' of {heap_size} bytes")]
    OutOfHeapRange {
        heap: String,
        offset: u64,
        size: u64,
        heap_size: u64,
    },

    #[error("'{object}' is not CPU visible and cannot be mapped")]
    NotMappable { object: String },

    #[error("invalid state for {object}: {reason}")]
    InvalidState { object: String, reason: String },

    #[error("barrier on '{object}' expected state {expected:?}, but resource is in {actual:?}")]
    StateMismatch {
        object: String,
        expected: ResourceState,
        actual: ResourceState,
    },

    #[error("device lost")]
    DeviceLost,
}

impl GfxError {
    #[inline]
    pub fn backend(call: &'static str, reason: impl ToString) -> Self {
        Self::Backend {
            call,
            reason: reason.to_string(),
        }
    }

    #[inline]
    pub fn invalid_state(object: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            object: object.into(),
            reason: reason.into(),
        }
    }
}

pub type GfxResult<T> = Result<T, GfxError>;
