use dpi::PhysicalSize;

use crate::engine::config::{FenceWait, StreamConfig, UploadStrategy};
use crate::engine::error::{HarnessError, HarnessResult};
use crate::engine::frame::{FenceHandle, SlotResources};
use crate::engine::rendering::GpuContext;

/// ### English
/// Producer-side transfer of one synthesized frame into a slot texture.
///
/// ### 中文
/// 生产者侧：把一帧合成结果传入槽位纹理。
#[derive(Clone, Copy, Debug)]
pub struct UploadStage {
    strategy: UploadStrategy,
    frame_size: PhysicalSize<u32>,
    frame_bytes: usize,
    fence_wait: FenceWait,
}

impl UploadStage {
    pub fn new(config: &StreamConfig) -> HarnessResult<Self> {
        Ok(Self {
            strategy: config.upload_strategy,
            frame_size: config.frame_size,
            frame_bytes: config.frame_bytes()?,
            fence_wait: config.fence_wait,
        })
    }

    /// ### English
    /// Uploads `frame` into `slot` and returns the fence that signals once the upload completed.
    ///
    /// A consumer fence left on the slot is waited on and deleted first, so the staging buffer and
    /// the texture are never rewritten while the previous draw may still read them.
    ///
    /// ### 中文
    /// 将 `frame` 上传到 `slot`，并返回上传完成时 signal 的 fence。
    ///
    /// 若槽位上留有 consumer fence，会先等待并删除它，确保上一轮绘制可能仍在读取时不会重写
    /// staging buffer 与纹理。
    pub fn upload<C: GpuContext + ?Sized>(
        &self,
        ctx: &C,
        slot: &SlotResources,
        frame: &[u8],
        consumer_fence: Option<FenceHandle>,
    ) -> HarnessResult<FenceHandle> {
        if let Some(fence) = consumer_fence {
            let waited = ctx.wait_fence(&fence, self.fence_wait);
            ctx.delete_fence(fence);
            waited?;
        }

        if frame.len() != self.frame_bytes {
            return Err(HarnessError::Invariant(format!(
                "frame has {} bytes, slot holds {}",
                frame.len(),
                self.frame_bytes
            )));
        }

        match self.strategy {
            UploadStrategy::StagingBuffer => {
                ctx.write_staging(slot, frame)?;
                ctx.copy_staging_to_texture(slot, self.frame_size)?;
            }
            UploadStrategy::Direct => {
                ctx.write_texture_direct(slot, self.frame_size, frame)?;
            }
        }
        ctx.insert_fence()
    }
}
