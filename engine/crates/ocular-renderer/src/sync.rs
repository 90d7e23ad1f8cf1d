use ocular_gfx::rhi::{GfxDevice, GfxResult};

/// 单调递增的 fence 计数器
///
/// 所有提交都进入同一个 queue，因此一个 fence 同时用于上传的 flush 和每帧的 slot 追踪
pub struct FenceCounter<G: GfxDevice> {
    fence: G::Fence,
    /// 最后一次 signal 的值
    value: u64,
}

// 创建与销毁
impl<G: GfxDevice> FenceCounter<G> {
    pub fn new(gfx: &G, name: &str) -> GfxResult<Self> {
        let fence = gfx.create_fence(0, name)?;
        Ok(Self { fence, value: 0 })
    }

    pub fn destroy(self, gfx: &G) {
        gfx.destroy_fence(self.fence);
    }
}

impl<G: GfxDevice> FenceCounter<G> {
    /// 计数器加一，并在 queue 中插入 GPU 完成标记
    pub fn signal(&mut self, gfx: &G) -> GfxResult<u64> {
        let value = self.value + 1;
        gfx.signal(&self.fence, value)?;
        self.value = value;
        Ok(value)
    }

    /// 阻塞直到 GPU 完成 value；已经完成时立即返回
    pub fn wait(&self, gfx: &G, value: u64) -> GfxResult<()> {
        if gfx.fence_completed_value(&self.fence)? >= value {
            return Ok(());
        }
        gfx.wait_fence(&self.fence, value)
    }

    /// signal 并等待，返回 signal 的值
    pub fn flush(&mut self, gfx: &G) -> GfxResult<u64> {
        let value = self.signal(gfx)?;
        self.wait(gfx, value)?;
        Ok(value)
    }
}

// getters
impl<G: GfxDevice> FenceCounter<G> {
    #[inline]
    pub fn last_signaled(&self) -> u64 {
        self.value
    }

    #[inline]
    pub fn completed_value(&self, gfx: &G) -> GfxResult<u64> {
        gfx.fence_completed_value(&self.fence)
    }

    #[inline]
    pub fn fence(&self) -> &G::Fence {
        &self.fence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocular_gfx::headless::{FenceCompletion, HeadlessGpu, HeadlessOptions};
    use ocular_gfx::rhi::{GfxBackend, types::AdapterRequest};

    fn gpu(fence_completion: FenceCompletion) -> HeadlessGpu {
        let options = HeadlessOptions {
            fence_completion,
            ..Default::default()
        };
        HeadlessGpu::open(&AdapterRequest::default(), options).unwrap()
    }

    #[test]
    fn test_signal_increments() {
        let gpu = gpu(FenceCompletion::Immediate);
        let mut fence = FenceCounter::new(&gpu, "test").unwrap();
        assert_eq!(fence.signal(&gpu).unwrap(), 1);
        assert_eq!(fence.signal(&gpu).unwrap(), 2);
        assert_eq!(fence.last_signaled(), 2);
        assert_eq!(fence.completed_value(&gpu).unwrap(), 2);
        fence.destroy(&gpu);
    }

    #[test]
    fn test_wait_on_retired_value_does_not_block() {
        let gpu = gpu(FenceCompletion::Immediate);
        let mut fence = FenceCounter::new(&gpu, "test").unwrap();
        fence.flush(&gpu).unwrap();
        fence.wait(&gpu, 1).unwrap();
        fence.wait(&gpu, 0).unwrap();
        assert_eq!(gpu.stats().blocking_fence_waits, 0);
        fence.destroy(&gpu);
    }

    #[test]
    fn test_wait_blocks_until_completion() {
        let gpu = gpu(FenceCompletion::Manual);
        let mut fence = FenceCounter::new(&gpu, "test").unwrap();
        for _ in 0..5 {
            fence.signal(&gpu).unwrap();
        }
        assert_eq!(fence.completed_value(&gpu).unwrap(), 0);

        let completer = fence.fence().completer();
        let worker = std::thread::spawn(move || {
            for value in 1..=5 {
                std::thread::sleep(std::time::Duration::from_millis(5));
                completer.complete(value);
            }
        });

        fence.wait(&gpu, 5).unwrap();
        assert!(fence.completed_value(&gpu).unwrap() >= 5);
        worker.join().unwrap();
        fence.destroy(&gpu);
    }
}
