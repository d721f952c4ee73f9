//! ### English
//! Slot handles and the producer/consumer ring shared between the producer thread and the
//! consumer (display) thread.
//!
//! ### 中文
//! 槽位句柄，以及生产者线程与消费者（显示）线程之间共享的生产者/消费者环。
mod stream_ring;

use std::num::NonZeroU64;

pub use stream_ring::{RingSnapshot, StreamRing};

/// ### English
/// Opaque GPU completion token (`GLsync` cast to `u64` on the GL backend).
///
/// Deliberately neither `Copy` nor `Clone`: a fence is consumed (waited and deleted) exactly once.
///
/// ### 中文
/// 不透明的 GPU 完成令牌（GL 后端中为 `GLsync` 转 `u64`）。
///
/// 刻意不实现 `Copy`/`Clone`：一个 fence 只会被消费（等待并删除）一次。
#[derive(Debug, PartialEq, Eq)]
pub struct FenceHandle(NonZeroU64);

impl FenceHandle {
    /// ### English
    /// Wraps a raw backend fence value; `0` means "no fence".
    ///
    /// ### 中文
    /// 包装后端原始 fence 值；`0` 表示“无 fence”。
    #[inline]
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    #[inline]
    pub fn raw(&self) -> u64 {
        self.0.get()
    }
}

/// ### English
/// GPU objects backing one pool slot (names in the shared object namespace).
///
/// ### 中文
/// 单个池槽位对应的 GPU 对象（共享对象命名空间中的名字）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotResources {
    /// ### English
    /// CPU-writable, GPU-readable staging buffer sized to one frame (pixel unpack buffer).
    ///
    /// ### 中文
    /// CPU 可写、GPU 可读的 staging buffer，大小为一帧（pixel unpack buffer）。
    pub staging_buffer: u32,
    /// ### English
    /// RGBA8 texture sampled by the consumer.
    ///
    /// ### 中文
    /// 供消费者采样的 RGBA8 纹理。
    pub texture: u32,
}

/// ### English
/// Producer-side claim on the slot at the write index.
///
/// ### 中文
/// 生产者对写索引所指槽位的占用凭证。
#[derive(Debug)]
pub struct WriteClaim {
    pub slot: usize,
    /// ### English
    /// Sequence number the frame will be published under (0-based production order).
    ///
    /// ### 中文
    /// 该帧发布时使用的序号（从 0 开始的生产顺序）。
    pub seq: u64,
    /// ### English
    /// Consumer fence left on this slot by its previous reader; must be resolved before rewriting.
    ///
    /// ### 中文
    /// 该槽位上一位读者留下的 consumer fence；重写前必须先处理。
    pub consumer_fence: Option<FenceHandle>,
}

/// ### English
/// Consumer-side claim on the slot at the read index.
///
/// ### 中文
/// 消费者对读索引所指槽位的占用凭证。
#[derive(Debug)]
pub struct ReadClaim {
    pub slot: usize,
    pub seq: u64,
    /// ### English
    /// Bar phase the frame was synthesized with.
    ///
    /// ### 中文
    /// 合成该帧时使用的竖条相位。
    pub phase: u32,
    /// ### English
    /// Producer fence moved out of the slot under the ring lock; waited outside of it.
    ///
    /// ### 中文
    /// 在环锁内从槽位取出的生产者 fence；在锁外等待。
    pub fence: Option<FenceHandle>,
}
