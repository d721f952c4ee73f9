//! ### English
//! Fixed pool of (staging buffer, texture) slots.
//!
//! ### 中文
//! 固定数量的（staging buffer，纹理）槽位池。

use std::sync::atomic::{AtomicBool, Ordering};

use dpi::PhysicalSize;

use crate::engine::error::HarnessResult;
use crate::engine::frame::{SlotResources, StreamRing};
use crate::engine::rendering::GpuContext;

pub struct BufferPool {
    slots: Vec<SlotResources>,
    destroyed: AtomicBool,
}

impl BufferPool {
    /// ### English
    /// Creates `count` slots of `frame_size`, all or nothing: on failure the slots created so far
    /// are released and the error is returned.
    ///
    /// ### 中文
    /// 创建 `count` 个 `frame_size` 大小的槽位，全部成功或全部失败：失败时释放已创建的槽位并返回错误。
    pub fn create<C: GpuContext + ?Sized>(
        ctx: &C,
        count: usize,
        frame_size: PhysicalSize<u32>,
    ) -> HarnessResult<Self> {
        let mut slots = Vec::with_capacity(count);
        for index in 0..count {
            match ctx.create_slot(frame_size) {
                Ok(slot) => slots.push(slot),
                Err(err) => {
                    log::error!("failed to create slot {index} of {count}: {err}");
                    for slot in &slots {
                        ctx.delete_slot(slot);
                    }
                    return Err(err);
                }
            }
        }
        log::info!(
            "created {count} slots of {}x{}",
            frame_size.width,
            frame_size.height
        );
        Ok(Self {
            slots,
            destroyed: AtomicBool::new(false),
        })
    }

    #[inline]
    pub fn slot(&self, index: usize) -> &SlotResources {
        &self.slots[index]
    }

    /// ### English
    /// Deletes every fence still recorded in `ring`, then every slot (idempotent).
    ///
    /// Must only run once both threads stopped touching the pool.
    ///
    /// ### 中文
    /// 删除 `ring` 中仍记录的所有 fence，再删除所有槽位（幂等）。
    ///
    /// 只能在两个线程都不再访问池之后调用。
    pub fn destroy<C: GpuContext + ?Sized>(&self, ctx: &C, ring: &StreamRing) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        for fence in ring.drain_fences() {
            ctx.delete_fence(fence);
        }
        for slot in &self.slots {
            ctx.delete_slot(slot);
        }
        log::debug!("destroyed {} slots", self.slots.len());
    }
}
