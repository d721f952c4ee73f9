use crate::engine::error::{HarnessError, HarnessResult};

use super::super::{FenceHandle, WriteClaim};
use super::StreamRing;

impl StreamRing {
    /// ### English
    /// Publishes the claimed slot with its upload fence and advances the write index.
    ///
    /// Call after the upload and fence were issued (outside the lock). A claim that is not the
    /// current write sequence, or a slot whose previous fence was never consumed, is an invariant
    /// breach and is returned as such; nothing is corrected. The fences of a rejected publish stay
    /// in the ring until `drain_fences`.
    ///
    /// #### Parameters
    /// - `claim`: Claim returned by `acquire_write`.
    /// - `fence`: Completion fence of the upload into `claim.slot`.
    /// - `phase`: Bar phase the frame was synthesized with.
    ///
    /// ### 中文
    /// 携带上传 fence 发布所占用的槽位，并推进写索引。
    ///
    /// 在锁外完成上传与 fence 插入后调用。若凭证不是当前写序号，或槽位上一个 fence
    /// 从未被消费，则属于不变量破坏并原样返回错误，不做任何修正。被拒绝的发布所携带的 fence
    /// 留在环中，直到 `drain_fences`。
    ///
    /// #### 参数
    /// - `claim`：`acquire_write` 返回的凭证。
    /// - `fence`：上传到 `claim.slot` 的完成 fence。
    /// - `phase`：合成该帧使用的竖条相位。
    pub fn publish(&self, claim: WriteClaim, fence: FenceHandle, phase: u32) -> HarnessResult<()> {
        let mut state = self.state.lock();
        let rejected = if let Some(pending) = &claim.consumer_fence {
            Some(format!(
                "slot {} rewritten before its consumer fence {:#x} was resolved",
                claim.slot,
                pending.raw()
            ))
        } else if claim.seq != state.written {
            Some(format!(
                "publish of sequence {} while the write sequence is {}",
                claim.seq, state.written
            ))
        } else if state.written - state.read >= self.pipeline_depth {
            Some(format!(
                "publish into a full ring (written {}, read {})",
                state.written, state.read
            ))
        } else {
            state.slots[claim.slot]
                .producer_fence
                .as_ref()
                .map(|stale| {
                    format!(
                        "slot {} still holds unconsumed fence {:#x}",
                        claim.slot,
                        stale.raw()
                    )
                })
        };
        if let Some(reason) = rejected {
            state.orphaned.push(fence);
            state.orphaned.extend(claim.consumer_fence);
            return Err(HarnessError::Invariant(reason));
        }

        let slot_sync = &mut state.slots[claim.slot];
        slot_sync.producer_fence = Some(fence);
        slot_sync.phase = phase;

        state.written += 1;
        self.cond.notify_all();
        Ok(())
    }
}
