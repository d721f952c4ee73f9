//! ### English
//! Producer thread body.
//!
//! ### 中文
//! 生产者线程主体。

use crate::engine::error::HarnessResult;
use crate::engine::frame::{StreamRing, WriteClaim};
use crate::engine::rendering::GpuContext;
use crate::engine::synth::FrameSynthesizer;

use super::pool::BufferPool;
use super::upload::UploadStage;

/// ### English
/// Synthesize, acquire, upload, publish, advance; until the ring finishes.
///
/// Any error is recorded on the ring (which finishes it and wakes the consumer) and ends the loop.
/// Returns the number of frames published.
///
/// ### 中文
/// 合成、获取、上传、发布、前进；直到环结束。
///
/// 任何错误都会记录到环上（这会结束环并唤醒消费者）并终止循环。返回已发布的帧数。
pub fn run_producer<C: GpuContext + ?Sized>(
    ctx: &C,
    ring: &StreamRing,
    pool: &BufferPool,
    mut synth: FrameSynthesizer,
    upload: UploadStage,
) -> u64 {
    let mut frame = vec![0u8; synth.pattern().frame_bytes()];
    let mut produced = 0u64;

    loop {
        let phase = synth.next_frame(&mut frame);

        let Some(claim) = ring.acquire_write() else {
            break;
        };

        if let Err(err) = produce_one(ctx, ring, pool, &upload, claim, &frame, phase) {
            ring.fail(err);
            break;
        }
        produced += 1;
    }

    log::info!("producer stopped after {produced} frames");
    produced
}

fn produce_one<C: GpuContext + ?Sized>(
    ctx: &C,
    ring: &StreamRing,
    pool: &BufferPool,
    upload: &UploadStage,
    mut claim: WriteClaim,
    frame: &[u8],
    phase: u32,
) -> HarnessResult<()> {
    log::trace!("writing: {}", claim.slot);
    let consumer_fence = claim.consumer_fence.take();
    let fence = upload.upload(ctx, pool.slot(claim.slot), frame, consumer_fence)?;
    ring.publish(claim, fence, phase)
}
