use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Sender, unbounded};
use parking_lot::Mutex;
use thiserror::Error;

use crate::engine::error::{HarnessError, HarnessResult};
use crate::engine::rendering::Viewport;

use super::context::SoftContext;
use super::queue::{GpuCommand, SoftBuffer, SoftFence, SoftTexture, run_worker};

/// ### English
/// Soft device options.
///
/// ### 中文
/// soft 设备选项。
#[derive(Clone, Copy, Debug)]
pub struct SoftDeviceConfig {
    /// ### English
    /// Minimum execution time of every queued transfer (simulated GPU latency).
    ///
    /// ### 中文
    /// 每次排队传输的最短执行时间（模拟 GPU 延迟）。
    pub latency: Duration,
    /// ### English
    /// Keep a copy of the sampled pixels of every draw (otherwise only a digest).
    ///
    /// ### 中文
    /// 为每次绘制保留采样像素副本（否则只保留摘要）。
    pub capture_pixels: bool,
}

impl Default for SoftDeviceConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_micros(200),
            capture_pixels: false,
        }
    }
}

/// ### English
/// Synchronization mistake detected by the soft device.
///
/// ### 中文
/// soft 设备检测到的同步错误。
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Hazard {
    #[error("staging buffer {buffer} mapped while a GPU copy from it is still pending")]
    StagingBusy { buffer: u32 },
    #[error("texture {texture} used while an upload into it is still pending")]
    TextureBusy { texture: u32 },
    #[error("fence {fence:#x} waited on more than once")]
    FenceReused { fence: u64 },
    #[error("{kind} {name:#x} does not exist")]
    UnknownObject { kind: &'static str, name: u64 },
}

/// ### English
/// One recorded draw call.
///
/// ### 中文
/// 一次被记录的绘制调用。
#[derive(Clone, Debug)]
pub struct SampledDraw {
    pub texture: u32,
    pub viewport: Viewport,
    /// ### English
    /// `frame_digest` of the texture contents at draw time.
    ///
    /// ### 中文
    /// 绘制时纹理内容的 `frame_digest`。
    pub digest: u64,
    pub pixels: Option<Arc<[u8]>>,
}

/// ### English
/// Number of objects still alive in the sharing group.
///
/// ### 中文
/// 共享组中仍存活的对象数量。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiveObjects {
    pub buffers: usize,
    pub textures: usize,
    pub fences: usize,
}

#[derive(Default)]
pub(super) struct SoftObjects {
    pub(super) buffers: HashMap<u32, Arc<SoftBuffer>>,
    pub(super) textures: HashMap<u32, Arc<SoftTexture>>,
    pub(super) fences: HashMap<u64, Arc<SoftFence>>,
}

/// ### English
/// State shared by every context of one soft device (the sharing group).
///
/// ### 中文
/// 同一 soft 设备所有上下文共享的状态（共享组）。
pub(super) struct SoftShared {
    pub(super) objects: Mutex<SoftObjects>,
    pub(super) queue: Sender<GpuCommand>,
    pub(super) hazards: Mutex<Vec<Hazard>>,
    pub(super) draws: Mutex<Vec<SampledDraw>>,
    pub(super) capture_pixels: bool,
    pub(super) next_name: AtomicU32,
    pub(super) next_fence: AtomicU64,
}

impl SoftShared {
    pub(super) fn record(&self, hazard: Hazard) {
        log::error!("soft GPU hazard: {hazard}");
        self.hazards.lock().push(hazard);
    }

    pub(super) fn submit(&self, command: GpuCommand) -> HarnessResult<()> {
        self.queue
            .send(command)
            .map_err(|_| HarnessError::Backend("soft GPU queue is closed".to_string()))
    }
}

/// ### English
/// Simulated GPU device. Contexts created from it share one object namespace and one queue.
///
/// ### 中文
/// 模拟 GPU 设备。由其创建的上下文共享同一对象命名空间与同一队列。
pub struct SoftDevice {
    shared: Arc<SoftShared>,
    worker: Option<thread::JoinHandle<()>>,
}

impl SoftDevice {
    pub fn new(config: SoftDeviceConfig) -> HarnessResult<Self> {
        let (sender, receiver) = unbounded();
        let latency = config.latency;
        let worker = thread::Builder::new()
            .name("xian-soft-gpu".to_string())
            .spawn(move || run_worker(receiver, latency))
            .map_err(|err| HarnessError::Setup(format!("failed to spawn soft GPU thread: {err}")))?;

        Ok(Self {
            shared: Arc::new(SoftShared {
                objects: Mutex::new(SoftObjects::default()),
                queue: sender,
                hazards: Mutex::new(Vec::new()),
                draws: Mutex::new(Vec::new()),
                capture_pixels: config.capture_pixels,
                next_name: AtomicU32::new(1),
                next_fence: AtomicU64::new(1),
            }),
            worker: Some(worker),
        })
    }

    /// ### English
    /// Creates a context in this device's sharing group (one per thread).
    ///
    /// ### 中文
    /// 在本设备的共享组中创建一个上下文（每线程一个）。
    pub fn create_context(&self, label: &'static str) -> SoftContext {
        SoftContext::new(self.shared.clone(), label)
    }

    /// ### English
    /// Drains the recorded draws, oldest first.
    ///
    /// ### 中文
    /// 取出已记录的绘制（从旧到新）。
    pub fn take_draws(&self) -> Vec<SampledDraw> {
        std::mem::take(&mut *self.shared.draws.lock())
    }

    pub fn hazards(&self) -> Vec<Hazard> {
        self.shared.hazards.lock().clone()
    }

    pub fn live_objects(&self) -> LiveObjects {
        let objects = self.shared.objects.lock();
        LiveObjects {
            buffers: objects.buffers.len(),
            textures: objects.textures.len(),
            fences: objects.fences.len(),
        }
    }

    /// ### English
    /// Current contents of `texture` (after every upload executed so far).
    ///
    /// ### 中文
    /// `texture` 当前的内容（已执行的上传均已生效）。
    pub fn texture_pixels(&self, texture: u32) -> Option<Vec<u8>> {
        let texture = self.shared.objects.lock().textures.get(&texture).cloned()?;
        let pixels = texture.pixels.lock().clone();
        Some(pixels)
    }
}

impl Drop for SoftDevice {
    fn drop(&mut self) {
        let _ = self.shared.queue.send(GpuCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
