use std::sync::{Arc, Condvar, Mutex, PoisonError};

#[derive(Default)]
struct FenceCell {
    completed: Mutex<u64>,
    cond: Condvar,
}

/// 软件 fence：一个受 mutex 保护的完成值 + condvar
///
/// 完成值只会增大。`wait` 在没有达到目标值时阻塞在 condvar 上，没有超时
pub struct HeadlessFence {
    cell: Arc<FenceCell>,
    name: String,
}

// 创建与销毁
impl HeadlessFence {
    pub(crate) fn new(initial_value: u64, name: &str) -> Self {
        let cell = FenceCell {
            completed: Mutex::new(initial_value),
            cond: Condvar::new(),
        };
        Self {
            cell: Arc::new(cell),
            name: name.to_string(),
        }
    }
}

// getters
impl HeadlessFence {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn completed_value(&self) -> u64 {
        *self.cell.completed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 可以在其他线程上模拟 GPU 完成 fence
    pub fn completer(&self) -> FenceCompleter {
        FenceCompleter {
            cell: self.cell.clone(),
        }
    }
}

// tools
impl HeadlessFence {
    pub(crate) fn complete(&self, value: u64) {
        complete_cell(&self.cell, value);
    }

    /// 返回值表示是否真的发生了阻塞
    pub(crate) fn wait(&self, value: u64) -> bool {
        let mut completed = self.cell.completed.lock().unwrap_or_else(PoisonError::into_inner);
        let mut blocked = false;
        while *completed < value {
            blocked = true;
            completed = self.cell.cond.wait(completed).unwrap_or_else(PoisonError::into_inner);
        }
        blocked
    }
}

fn complete_cell(cell: &FenceCell, value: u64) {
    let mut completed = cell.completed.lock().unwrap_or_else(PoisonError::into_inner);
    if value > *completed {
        *completed = value;
    }
    cell.cond.notify_all();
}

/// fence 完成值的写入端，`Send + Sync`
#[derive(Clone)]
pub struct FenceCompleter {
    cell: Arc<FenceCell>,
}
impl FenceCompleter {
    /// 模拟 GPU 执行到了 value
    pub fn complete(&self, value: u64) {
        complete_cell(&self.cell, value);
    }

    pub fn completed_value(&self) -> u64 {
        *self.cell.completed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_completed_value_is_monotonic() {
        let fence = HeadlessFence::new(0, "test");
        fence.complete(5);
        fence.complete(3);
        assert_eq!(fence.completed_value(), 5);
    }

    #[test]
    fn test_wait_below_completed_does_not_block() {
        let fence = HeadlessFence::new(7, "test");
        assert!(!fence.wait(7));
        assert!(!fence.wait(2));
    }

    #[test]
    fn test_wait_blocks_until_completed_from_other_thread() {
        let fence = HeadlessFence::new(0, "test");
        let completer = fence.completer();
        let worker = thread::spawn(move || {
            for v in 1..=3 {
                thread::sleep(Duration::from_millis(10));
                completer.complete(v);
            }
        });

        assert!(fence.wait(3));
        assert!(fence.completed_value() >= 3);
        worker.join().unwrap();
    }
}
