//! ### English
//! Consumer-side release of a presented slot.
//!
//! ### 中文
//! 消费者侧释放已呈现的槽位。

use crate::engine::error::{HarnessError, HarnessResult};

use super::super::{FenceHandle, ReadClaim};
use super::StreamRing;

impl StreamRing {
    /// ### English
    /// Releases a slot after its texture was drawn and advances the read index.
    ///
    /// #### Parameters
    /// - `claim`: Claim returned by `acquire_read`; its fence must already have been consumed.
    /// - `consumer_fence`: Fence inserted after sampling, or `None` to release immediately.
    ///
    /// ### 中文
    /// 纹理绘制完成后释放槽位，并推进读索引。
    ///
    /// #### 参数
    /// - `claim`：`acquire_read` 返回的凭证；其 fence 必须已被消费。
    /// - `consumer_fence`：采样后插入的 fence；为 `None` 则立即释放。
    pub fn release_read(
        &self,
        claim: ReadClaim,
        consumer_fence: Option<FenceHandle>,
    ) -> HarnessResult<()> {
        let mut state = self.state.lock();
        let rejected = if let Some(fence) = &claim.fence {
            Some(format!(
                "slot {} released with its producer fence {:#x} never waited on",
                claim.slot,
                fence.raw()
            ))
        } else if claim.seq != state.read || state.read == state.written {
            Some(format!(
                "release of sequence {} while the read sequence is {} (written {})",
                claim.seq, state.read, state.written
            ))
        } else if state.slots[claim.slot].consumer_fence.is_some() {
            Some(format!("slot {} already holds a consumer fence", claim.slot))
        } else {
            None
        };
        if let Some(reason) = rejected {
            state.orphaned.extend(claim.fence);
            state.orphaned.extend(consumer_fence);
            return Err(HarnessError::Invariant(reason));
        }

        state.slots[claim.slot].consumer_fence = consumer_fence;
        state.read += 1;
        self.cond.notify_all();
        Ok(())
    }
}
