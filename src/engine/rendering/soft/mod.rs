//! ### English
//! In-process simulated GPU ("soft" backend).
//!
//! A sharing group of buffers, textures and fences plus an asynchronous command queue executed
//! on a worker thread, so uploads complete later than they are issued, as on real hardware.
//! The device records synchronization hazards (mapping a staging buffer with a pending copy,
//! sampling a texture with a pending upload, waiting a fence twice) and captures every draw so
//! the presented stream can be verified without a display.
//!
//! ### 中文
//! 进程内模拟 GPU（“soft” 后端）。
//!
//! 由 buffer、纹理、fence 组成的共享组，加上在 worker 线程执行的异步命令队列，使上传像真实硬件一样
//! 晚于提交完成。设备会记录同步冒险（映射仍有待执行拷贝的 staging buffer、采样仍有待执行上传的纹理、
//! 重复等待 fence），并捕获每次绘制，从而无需显示器即可校验呈现流。
mod context;
mod device;
mod queue;

use std::hash::{DefaultHasher, Hasher};

pub use context::SoftContext;
pub use device::{Hazard, LiveObjects, SampledDraw, SoftDevice, SoftDeviceConfig};

/// ### English
/// Digest of a frame's bytes. Equal content gives equal digests within one build; the value is
/// not meant to be stored or compared across toolchains.
///
/// ### 中文
/// 帧字节的摘要。同一构建内相同内容得到相同摘要；该值不应被持久化或跨工具链比较。
pub fn frame_digest(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write(bytes);
    hasher.finish()
}
