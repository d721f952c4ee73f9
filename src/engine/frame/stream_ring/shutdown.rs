//! ### English
//! Cooperative shutdown and failure propagation for `StreamRing`.
//!
//! ### 中文
//! `StreamRing` 的协作式关闭与失败传递。

use crate::engine::error::HarnessError;

use super::StreamRing;

impl StreamRing {
    /// ### English
    /// Sets `finished` (once) and wakes every waiter.
    ///
    /// A producer blocked in `acquire_write` observes it and returns `None`.
    ///
    /// ### 中文
    /// 设置 `finished`（仅一次）并唤醒所有等待者。
    ///
    /// 阻塞在 `acquire_write` 的生产者会观察到它并返回 `None`。
    pub fn finish(&self) {
        let mut state = self.state.lock();
        if !state.finished {
            state.finished = true;
            log::debug!(
                "stream finished (written {}, read {})",
                state.written,
                state.read
            );
        }
        self.cond.notify_all();
    }

    /// ### English
    /// Records a producer failure, finishes the ring and wakes the consumer so it can report it.
    ///
    /// The first failure wins.
    ///
    /// ### 中文
    /// 记录生产者失败、结束环并唤醒消费者以便其上报。
    ///
    /// 以第一次失败为准。
    pub fn fail(&self, err: HarnessError) {
        let mut state = self.state.lock();
        if state.failure.is_none() {
            log::error!("producer failed: {err}");
            state.failure = Some(err);
        }
        state.finished = true;
        self.cond.notify_all();
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    pub fn failure(&self) -> Option<HarnessError> {
        self.state.lock().failure.clone()
    }
}
