use parking_lot::{Condvar, Mutex};

use crate::engine::error::HarnessError;

use super::FenceHandle;

mod acquire;
mod fences;
mod publish;
mod release;
mod shutdown;

/// ### English
/// Bounded single-producer/single-consumer handoff over the slot pool.
///
/// One mutex guards the two sequence counters, the `finished` flag and the per-slot fence fields;
/// one condition variable wakes both roles. GPU work and fence waits never happen under the lock.
///
/// `write_index = written % N`, `read_index = read % N`. Counting sequences instead of raw
/// indices keeps `N = 1` well-defined (empty is `written == read`).
///
/// ### 中文
/// 基于槽位池的有界单生产者/单消费者交接结构。
///
/// 一个互斥锁保护两个序号计数器、`finished` 标记以及每槽位的 fence 字段；一个条件变量唤醒双方。
/// GPU 操作与 fence 等待从不在锁内进行。
///
/// `write_index = written % N`，`read_index = read % N`。使用序号而非裸索引，使 `N = 1`
/// 时依然有定义（空即 `written == read`）。
pub struct StreamRing {
    state: Mutex<RingState>,
    cond: Condvar,
    slot_count: usize,
    /// ### English
    /// Maximum `written - read` before the producer must wait.
    ///
    /// ### 中文
    /// 生产者必须等待之前允许的最大 `written - read`。
    pipeline_depth: u64,
}

struct RingState {
    written: u64,
    read: u64,
    finished: bool,
    failure: Option<HarnessError>,
    slots: Vec<SlotSync>,
    /// ### English
    /// Fences handed to a rejected publish or release; deleted at teardown with the rest.
    ///
    /// ### 中文
    /// 被拒绝的发布或释放所携带的 fence；在销毁阶段与其余 fence 一并删除。
    orphaned: Vec<FenceHandle>,
}

#[derive(Default)]
struct SlotSync {
    /// ### English
    /// Non-null exactly while the upload for this slot is unresolved by the consumer.
    ///
    /// ### 中文
    /// 当且仅当该槽位的上传尚未被消费者处理时非空。
    producer_fence: Option<FenceHandle>,
    consumer_fence: Option<FenceHandle>,
    phase: u32,
}

/// ### English
/// Point-in-time view of the ring counters.
///
/// ### 中文
/// 环计数器的某一时刻快照。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingSnapshot {
    pub written: u64,
    pub read: u64,
    pub finished: bool,
}

impl StreamRing {
    /// ### English
    /// Creates a ring over `slot_count` slots. `pipeline_depth` is clamped to `1..=slot_count`.
    ///
    /// ### 中文
    /// 创建覆盖 `slot_count` 个槽位的环。`pipeline_depth` 会被限制在 `1..=slot_count`。
    pub fn new(slot_count: usize, pipeline_depth: usize) -> Self {
        let slot_count = slot_count.max(1);
        Self {
            state: Mutex::new(RingState {
                written: 0,
                read: 0,
                finished: false,
                failure: None,
                slots: (0..slot_count).map(|_| SlotSync::default()).collect(),
                orphaned: Vec::new(),
            }),
            cond: Condvar::new(),
            slot_count,
            pipeline_depth: pipeline_depth.clamp(1, slot_count) as u64,
        }
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    #[inline]
    fn slot_of(&self, seq: u64) -> usize {
        (seq % self.slot_count as u64) as usize
    }

    pub fn write_index(&self) -> usize {
        self.slot_of(self.state.lock().written)
    }

    pub fn read_index(&self) -> usize {
        self.slot_of(self.state.lock().read)
    }

    pub fn snapshot(&self) -> RingSnapshot {
        let state = self.state.lock();
        RingSnapshot {
            written: state.written,
            read: state.read,
            finished: state.finished,
        }
    }
}

#[cfg(test)]
mod tests;
