use ocular_gfx::rhi::GfxError;

#[derive(Debug, thiserror::Error)]
pub enum XrError {
    #[error("no HMD connected")]
    NoHmd,

    /// 头显断开或者显示被运行时收回，会话需要重建
    #[error("HMD display lost")]
    DisplayLost,

    #[error("{call} failed: {reason}")]
    CallFailed { call: &'static str, reason: String },

    /// 违反了帧生命周期的调用顺序
    #[error("{call} called out of order: {reason}")]
    InvalidCall { call: &'static str, reason: String },

    #[error(transparent)]
    Gfx(#[from] GfxError),
}

impl XrError {
    #[inline]
    pub fn invalid_call(call: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidCall {
            call,
            reason: reason.into(),
        }
    }

    #[inline]
    pub fn call_failed(call: &'static str, reason: impl Into<String>) -> Self {
        Self::CallFailed {
            call,
            reason: reason.into(),
        }
    }
}

pub type XrResult<T> = Result<T, XrError>;
