use ocular_gfx::rhi::GfxDevice;

use crate::frame_counter::FrameCounter;
use crate::sync::FenceCounter;

/// 暂停有两个来源：合成器收回了输入焦点，以及用户手动暂停；两者互不影响
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PauseState {
    pub focus_lost: bool,
    pub user_paused: bool,
}
impl PauseState {
    #[inline]
    pub fn is_paused(&self) -> bool {
        self.focus_lost || self.user_paused
    }

    /// 暂停时场景时间不推进
    #[inline]
    pub fn effective_dt(&self, dt: f32) -> f32 {
        if self.is_paused() { 0.0 } else { dt }
    }
}

/// 渲染器运行期间一直存在的状态：设备、唯一的 fence、帧计数、暂停状态
pub struct RenderContext<G: GfxDevice> {
    pub gfx: G,
    pub fence: FenceCounter<G>,
    pub frame_counter: FrameCounter,
    pub pause: PauseState,
}

// 创建与销毁
impl<G: GfxDevice> RenderContext<G> {
    pub fn new(gfx: G, fence: FenceCounter<G>) -> Self {
        Self {
            gfx,
            fence,
            frame_counter: FrameCounter::new(0),
            pause: PauseState::default(),
        }
    }

    /// 销毁 fence，并把设备交还给调用方
    pub fn into_gfx(self) -> G {
        let Self { gfx, fence, .. } = self;
        fence.destroy(&gfx);
        gfx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_sources_are_independent() {
        let mut pause = PauseState::default();
        assert_eq!(pause.effective_dt(0.5), 0.5);

        pause.focus_lost = true;
        pause.user_paused = true;
        pause.focus_lost = false;
        assert!(pause.is_paused());
        assert_eq!(pause.effective_dt(0.5), 0.0);

        pause.user_paused = false;
        assert!(!pause.is_paused());
    }
}
