//! ### English
//! Command queue of the simulated GPU and its worker thread.
//!
//! ### 中文
//! 模拟 GPU 的命令队列及其 worker 线程。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::Receiver;
use dpi::PhysicalSize;
use parking_lot::{Condvar, Mutex};

/// ### English
/// Staging buffer storage. `pending_copies` counts queued copies that still read it.
///
/// ### 中文
/// staging buffer 存储。`pending_copies` 记录仍会读取它的排队拷贝数量。
pub(super) struct SoftBuffer {
    pub(super) bytes: Mutex<Vec<u8>>,
    pub(super) pending_copies: AtomicU32,
}

/// ### English
/// Texture storage. `pending_writes` counts queued uploads that still write it.
///
/// ### 中文
/// 纹理存储。`pending_writes` 记录仍会写入它的排队上传数量。
pub(super) struct SoftTexture {
    pub(super) size: PhysicalSize<u32>,
    pub(super) pixels: Mutex<Vec<u8>>,
    pub(super) pending_writes: AtomicU32,
}

pub(super) struct SoftFence {
    signaled: Mutex<bool>,
    cond: Condvar,
    /// ### English
    /// Set by the first wait; a second wait is a protocol hazard.
    ///
    /// ### 中文
    /// 第一次等待时置位；第二次等待属于协议冒险。
    pub(super) waited: AtomicBool,
}

impl SoftFence {
    pub(super) fn new() -> Self {
        Self {
            signaled: Mutex::new(false),
            cond: Condvar::new(),
            waited: AtomicBool::new(false),
        }
    }

    fn signal(&self) {
        *self.signaled.lock() = true;
        self.cond.notify_all();
    }

    pub(super) fn wait(&self) {
        let mut signaled = self.signaled.lock();
        while !*signaled {
            self.cond.wait(&mut signaled);
        }
    }
}

pub(super) enum GpuCommand {
    CopyBufferToTexture {
        src: Arc<SoftBuffer>,
        dst: Arc<SoftTexture>,
    },
    WriteTexture {
        dst: Arc<SoftTexture>,
        bytes: Vec<u8>,
    },
    Signal(Arc<SoftFence>),
    Shutdown,
}

/// ### English
/// Executes queued commands in submission order; every transfer takes at least `latency`.
///
/// ### 中文
/// 按提交顺序执行排队命令；每次传输至少耗时 `latency`。
pub(super) fn run_worker(commands: Receiver<GpuCommand>, latency: Duration) {
    for command in commands.iter() {
        match command {
            GpuCommand::CopyBufferToTexture { src, dst } => {
                simulate_transfer(latency);
                {
                    let bytes = src.bytes.lock();
                    let mut pixels = dst.pixels.lock();
                    let len = bytes.len().min(pixels.len());
                    pixels[..len].copy_from_slice(&bytes[..len]);
                }
                src.pending_copies.fetch_sub(1, Ordering::Release);
                dst.pending_writes.fetch_sub(1, Ordering::Release);
            }
            GpuCommand::WriteTexture { dst, bytes } => {
                simulate_transfer(latency);
                {
                    let mut pixels = dst.pixels.lock();
                    let len = bytes.len().min(pixels.len());
                    pixels[..len].copy_from_slice(&bytes[..len]);
                }
                dst.pending_writes.fetch_sub(1, Ordering::Release);
            }
            GpuCommand::Signal(fence) => fence.signal(),
            GpuCommand::Shutdown => break,
        }
    }
    log::debug!("soft GPU queue drained");
}

#[inline]
fn simulate_transfer(latency: Duration) {
    if !latency.is_zero() {
        thread::sleep(latency);
    }
}
