use std::time::{Duration, Instant};

/// 帧计时器
///
/// 重新获取头显之后的第一帧可能相隔很久，`max_delta` 用来限制单帧的步长
#[derive(Debug)]
pub struct Timer {
    last_tick: Instant,
    max_delta: Duration,

    delta_time: Duration,
    total_time: Duration,
    frame_count: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl Timer {
    pub fn new(max_delta: Duration) -> Self {
        Self {
            last_tick: Instant::now(),
            max_delta,
            delta_time: Duration::ZERO,
            total_time: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// 每帧开始的时候调用
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.advance(now.duration_since(self.last_tick));
        self.last_tick = now;
    }

    /// 不读取时钟，直接前进 elapsed
    pub fn advance(&mut self, elapsed: Duration) {
        self.delta_time = elapsed.min(self.max_delta);
        self.total_time += self.delta_time;
        self.frame_count += 1;
    }

    /// 丢弃从上一次 tick 到现在的时间，例如会话重建之后
    pub fn reset_tick(&mut self) {
        self.last_tick = Instant::now();
        self.delta_time = Duration::ZERO;
    }

    // getters
    #[inline]
    pub fn delta_time(&self) -> Duration {
        self.delta_time
    }

    /// 上一帧的时间（秒）
    #[inline]
    pub fn delta_time_s(&self) -> f32 {
        self.delta_time.as_secs_f32()
    }

    #[inline]
    pub fn delta_time_ms(&self) -> f32 {
        self.delta_time.as_secs_f32() * 1000.0
    }

    /// 当前帧率；还没有 tick 过时为 0
    #[inline]
    pub fn fps(&self) -> f32 {
        if self.delta_time.is_zero() { 0.0 } else { 1.0 / self.delta_time.as_secs_f32() }
    }

    #[inline]
    pub fn total_time_s(&self) -> f32 {
        self.total_time.as_secs_f32()
    }

    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// 用于周期性日志的帧率摘要
    pub fn frame_summary(&self) -> String {
        format!("{:.1} fps ({:.2}ms)", self.fps(), self.delta_time_ms())
    }
}
