pub struct FrameCounter {
    /// 提交给合成器的帧序号，一直累加；跳过的帧不会累加
    frame_index: u64,
}
// new & init
impl FrameCounter {
    pub fn new(init_frame_index: u64) -> Self {
        Self {
            frame_index: init_frame_index,
        }
    }
}
// update
impl FrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_index = self.frame_index.wrapping_add(1);
    }
}
// getters
impl FrameCounter {
    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// 日志中使用的帧标签，slot 为 swap chain 的当前序号
    #[inline]
    pub fn frame_name(&self, slot: usize) -> String {
        format!("[F{}{}]", self.frame_index, slot_label(slot))
    }
}

#[inline]
fn slot_label(slot: usize) -> char {
    if slot < 26 { (b'A' + slot as u8) as char } else { '?' }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapping() {
        let mut counter = FrameCounter::new(u64::MAX);
        counter.next_frame();
        assert_eq!(counter.frame_index(), 0);
    }

    #[test]
    fn test_frame_name() {
        let counter = FrameCounter::new(12);
        assert_eq!(counter.frame_name(1), "[F12B]");
    }
}
