use crate::engine::error::HarnessResult;

use super::super::{ReadClaim, WriteClaim};
use super::StreamRing;

impl StreamRing {
    /// ### English
    /// Blocks until the slot at the write index may be written (producer side).
    ///
    /// Waits while the ring is full and not finished. Returns `None` once `finished` is set; the
    /// producer must then stop without producing further frames. The slot's pending consumer
    /// fence (if any) is moved into the claim.
    ///
    /// ### 中文
    /// 阻塞直到写索引所指槽位可写（生产者侧）。
    ///
    /// 环已满且未结束时等待。`finished` 置位后返回 `None`，生产者随即停止，不再生产新帧。
    /// 槽位上待处理的 consumer fence（若有）会被移入返回的凭证。
    pub fn acquire_write(&self) -> Option<WriteClaim> {
        let mut state = self.state.lock();
        while !state.finished && state.written - state.read >= self.pipeline_depth {
            log::debug!("waiting to write...");
            self.cond.wait(&mut state);
        }
        if state.finished {
            return None;
        }

        let seq = state.written;
        let slot = self.slot_of(seq);
        let consumer_fence = state.slots[slot].consumer_fence.take();
        Some(WriteClaim {
            slot,
            seq,
            consumer_fence,
        })
    }

    /// ### English
    /// Blocks until a published slot is readable (consumer side).
    ///
    /// Returns `Ok(None)` if the ring was finished with nothing left to read, and the producer's
    /// recorded failure if it died. The producer fence is moved out under the lock; waiting on it
    /// is the caller's job, outside the lock.
    ///
    /// ### 中文
    /// 阻塞直到有已发布的槽位可读（消费者侧）。
    ///
    /// 若环已结束且无剩余可读帧则返回 `Ok(None)`；若生产者已失败则返回其记录的错误。
    /// 生产者 fence 在锁内取出；等待它由调用方在锁外完成。
    pub fn acquire_read(&self) -> HarnessResult<Option<ReadClaim>> {
        let mut state = self.state.lock();
        loop {
            if let Some(failure) = &state.failure {
                return Err(failure.clone());
            }
            if state.written != state.read {
                break;
            }
            if state.finished {
                return Ok(None);
            }
            log::debug!("waiting to read...");
            self.cond.wait(&mut state);
        }

        let seq = state.read;
        let slot = self.slot_of(seq);
        let slot_sync = &mut state.slots[slot];
        Ok(Some(ReadClaim {
            slot,
            seq,
            phase: slot_sync.phase,
            fence: slot_sync.producer_fence.take(),
        }))
    }
}
