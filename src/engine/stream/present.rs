use dpi::PhysicalSize;

use crate::engine::config::{FenceWait, StreamConfig};
use crate::engine::error::{HarnessError, HarnessResult};
use crate::engine::frame::{FenceHandle, ReadClaim};
use crate::engine::rendering::GpuContext;

use super::layout::TileLayout;
use super::pool::BufferPool;

/// ### English
/// What one `present` call put on screen.
///
/// ### 中文
/// 一次 `present` 调用呈现的内容。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresentedFrame {
    pub slot: usize,
    pub seq: u64,
    pub phase: u32,
    pub tiles: usize,
}

/// ### English
/// Consumer-side draw of one published slot.
///
/// ### 中文
/// 消费者侧：绘制一个已发布的槽位。
#[derive(Clone, Copy, Debug)]
pub struct PresentStage {
    layout: TileLayout,
    fence_wait: FenceWait,
    consumer_fences: bool,
}

impl PresentStage {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            layout: TileLayout {
                tile: config.tile_size,
                padding: config.tile_padding,
            },
            fence_wait: config.fence_wait,
            consumer_fences: config.consumer_fences,
        }
    }

    /// ### English
    /// Waits on the claim's producer fence (no timeout), deletes it, clears the surface to red and
    /// draws the slot texture into every tile. Returns the consumer fence to hand back to the
    /// ring, if consumer fences are enabled.
    ///
    /// A claim without a fence is an invariant breach.
    ///
    /// ### 中文
    /// 等待凭证中的生产者 fence（无超时）并删除，清屏为红色后将槽位纹理绘制到每个 tile。
    /// 若启用 consumer fence，则返回需交还给环的 consumer fence。
    ///
    /// 凭证中没有 fence 属于不变量破坏。
    pub fn present<C: GpuContext + ?Sized>(
        &self,
        ctx: &C,
        pool: &BufferPool,
        claim: &mut ReadClaim,
        surface: PhysicalSize<u32>,
    ) -> HarnessResult<(PresentedFrame, Option<FenceHandle>)> {
        let Some(fence) = claim.fence.take() else {
            return Err(HarnessError::Invariant(format!(
                "slot {} (frame {}) published without a fence",
                claim.slot, claim.seq
            )));
        };
        let waited = ctx.wait_fence(&fence, self.fence_wait);
        ctx.delete_fence(fence);
        waited?;

        let slot = pool.slot(claim.slot);
        ctx.begin_surface(surface);
        let viewports = self.layout.viewports(surface);
        for viewport in &viewports {
            ctx.draw_texture(slot.texture, *viewport)?;
        }

        let consumer_fence = if self.consumer_fences {
            Some(ctx.insert_fence()?)
        } else {
            None
        };

        if let Err(err) = ctx.check_errors() {
            if let Some(fence) = consumer_fence {
                ctx.delete_fence(fence);
            }
            return Err(err);
        }

        Ok((
            PresentedFrame {
                slot: claim.slot,
                seq: claim.seq,
                phase: claim.phase,
                tiles: viewports.len(),
            },
            consumer_fence,
        ))
    }
}
