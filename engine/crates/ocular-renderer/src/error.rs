use ocular_gfx::rhi::GfxError;
use ocular_xr::XrError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MathError {
    /// 行列式为 0 或者不是有限值
    #[error("matrix is singular (determinant = {determinant})")]
    SingularMatrix { determinant: f32 },

    #[error("invalid projection: {0}")]
    InvalidProjection(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{step} ({source})")]
    Gfx {
        step: &'static str,
        #[source]
        source: GfxError,
    },

    #[error("{step} ({source})")]
    Xr {
        step: &'static str,
        #[source]
        source: XrError,
    },

    #[error(transparent)]
    Math(#[from] MathError),

    /// 各只眼睛的 swap chain 长度或者当前序号不一致
    #[error("swap chain slot parity violated: {what} is {actual} for eye {eye}, expected {expected}")]
    SlotParity {
        what: &'static str,
        eye: usize,
        expected: usize,
        actual: usize,
    },

    #[error("ring slot (eye {eye}, slot {slot}) out of range ({eye_count} eyes x {slot_count} slots)")]
    SlotOutOfRange {
        eye: usize,
        slot: usize,
        eye_count: usize,
        slot_count: usize,
    },

    #[error("nothing to upload")]
    EmptyUpload,
}

impl RenderError {
    /// 头显显示丢失，会话需要重建，不属于致命错误
    pub fn is_display_lost(&self) -> bool {
        matches!(
            self,
            RenderError::Xr {
                source: XrError::DisplayLost,
                ..
            }
        )
    }
}

pub type RenderResult<T> = Result<T, RenderError>;

/// 为 GFX / XR 调用的错误附加失败的步骤，并记录日志
pub(crate) trait StepContext<T> {
    fn step(self, step: &'static str) -> RenderResult<T>;
}

impl<T> StepContext<T> for Result<T, GfxError> {
    #[inline]
    fn step(self, step: &'static str) -> RenderResult<T> {
        self.map_err(|source| {
            log::error!("{step} ({source})");
            RenderError::Gfx { step, source }
        })
    }
}

impl<T> StepContext<T> for Result<T, XrError> {
    #[inline]
    fn step(self, step: &'static str) -> RenderResult<T> {
        self.map_err(|source| {
            if matches!(source, XrError::DisplayLost) {
                log::warn!("{step} (display lost)");
            } else {
                log::error!("{step} ({source})");
            }
            RenderError::Xr { step, source }
        })
    }
}
