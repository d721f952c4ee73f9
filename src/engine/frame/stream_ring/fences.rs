use super::super::FenceHandle;
use super::StreamRing;

impl StreamRing {
    /// ### English
    /// Moves every fence still recorded in the ring out, for deletion at teardown.
    ///
    /// Only valid once both threads stopped touching the pool.
    ///
    /// ### 中文
    /// 取出环中仍记录的所有 fence，供销毁阶段删除。
    ///
    /// 仅在两个线程都不再访问池之后调用。
    pub fn drain_fences(&self) -> Vec<FenceHandle> {
        let mut state = self.state.lock();
        let mut fences = std::mem::take(&mut state.orphaned);
        for slot in state.slots.iter_mut() {
            fences.extend(slot.producer_fence.take());
            fences.extend(slot.consumer_fence.take());
        }
        fences
    }

    /// ### English
    /// Returns whether `slot` currently holds an unconsumed producer fence.
    ///
    /// ### 中文
    /// 返回 `slot` 当前是否持有尚未消费的生产者 fence。
    pub fn has_producer_fence(&self, slot: usize) -> bool {
        self.state
            .lock()
            .slots
            .get(slot)
            .is_some_and(|s| s.producer_fence.is_some())
    }
}
