//! ### English
//! Owns the pool, the ring and the producer thread; drives the consumer side on the caller's
//! thread.
//!
//! ### 中文
//! 持有池、环与生产者线程；在调用方线程上驱动消费者侧。

use std::sync::Arc;
use std::thread;

use crossbeam_channel::RecvTimeoutError;
use dpi::PhysicalSize;

use crate::engine::config::StreamConfig;
use crate::engine::error::{HarnessError, HarnessResult};
use crate::engine::frame::StreamRing;
use crate::engine::rendering::GpuContext;
use crate::engine::synth::FrameSynthesizer;

use super::pool::BufferPool;
use super::present::{PresentStage, PresentedFrame};
use super::producer::run_producer;
use super::upload::UploadStage;

/// ### English
/// Frame counts at shutdown.
///
/// ### 中文
/// 关闭时的帧计数。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HarnessReport {
    pub frames_presented: u64,
    pub frames_produced: u64,
}

/// ### English
/// One producer thread streaming frames to the thread that owns `consumer`.
///
/// `C` is the consumer (presenting) context and lives on the caller's thread; the producer
/// context is built on the producer thread by the factory passed to `start`. Both must belong to
/// the same sharing group.
///
/// ### 中文
/// 一个生产者线程向持有 `consumer` 的线程推流。
///
/// `C` 是消费者（呈现）上下文，位于调用方线程；生产者上下文由传给 `start` 的工厂在生产者线程
/// 上构建。两者必须属于同一共享组。
pub struct StreamHarness<C: GpuContext> {
    config: StreamConfig,
    consumer: C,
    ring: Arc<StreamRing>,
    pool: Arc<BufferPool>,
    present: PresentStage,
    producer: Option<thread::JoinHandle<u64>>,
    frames_presented: u64,
}

impl<C: GpuContext> StreamHarness<C> {
    /// ### English
    /// Validates `config`, creates the pool on `consumer`, spawns the producer thread and blocks
    /// until its context is initialized (or fails / times out).
    ///
    /// The producer touches the pool only after `start` accepted its context. On timeout the
    /// thread is left detached; it exits without touching the pool once the factory returns.
    ///
    /// ### 中文
    /// 校验 `config`，在 `consumer` 上创建池，启动生产者线程并阻塞直到其上下文初始化完成
    /// （或失败/超时）。
    ///
    /// 生产者只有在 `start` 接受其上下文之后才会访问池。超时时该线程被分离；工厂返回后它不访问池
    /// 直接退出。
    pub fn start<P, F>(config: StreamConfig, consumer: C, producer_factory: F) -> HarnessResult<Self>
    where
        P: GpuContext + 'static,
        F: FnOnce() -> HarnessResult<P> + Send + 'static,
    {
        config.validate()?;
        let upload = UploadStage::new(&config)?;
        let present = PresentStage::new(&config);
        let pool = Arc::new(BufferPool::create(
            &consumer,
            config.slot_count,
            config.frame_size,
        )?);
        let ring = Arc::new(StreamRing::new(config.slot_count, config.pipeline_depth));
        let synth = FrameSynthesizer::new(config.pattern());

        let (init_tx, init_rx) = crossbeam_channel::bounded::<HarnessResult<()>>(1);
        let (go_tx, go_rx) = crossbeam_channel::bounded::<()>(1);
        let ring_for_thread = ring.clone();
        let pool_for_thread = pool.clone();

        let spawned = thread::Builder::new()
            .name("xian-sync-producer".to_string())
            .spawn(move || {
                let ctx = match producer_factory() {
                    Ok(ctx) => {
                        let _ = init_tx.send(Ok(()));
                        ctx
                    }
                    Err(err) => {
                        let _ = init_tx.send(Err(err));
                        return 0;
                    }
                };
                if go_rx.recv().is_err() {
                    log::debug!("producer context abandoned before streaming started");
                    return 0;
                }
                run_producer(&ctx, &ring_for_thread, &pool_for_thread, synth, upload)
            });

        let producer = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                pool.destroy(&consumer, &ring);
                return Err(HarnessError::Setup(format!(
                    "failed to spawn producer thread: {err}"
                )));
            }
        };

        let init = match init_rx.recv_timeout(config.producer_init_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                // Detached: without a go signal the thread never reaches the pool.
                drop(go_tx);
                drop(producer);
                ring.finish();
                pool.destroy(&consumer, &ring);
                return Err(HarnessError::Setup(format!(
                    "timed out after {:?} initializing the producer context",
                    config.producer_init_timeout
                )));
            }
            Err(RecvTimeoutError::Disconnected) => Err(HarnessError::Setup(
                "producer thread exited during initialization".to_string(),
            )),
        };
        if let Err(err) = init {
            ring.finish();
            let _ = producer.join();
            pool.destroy(&consumer, &ring);
            return Err(err);
        }
        if go_tx.send(()).is_err() {
            ring.finish();
            let _ = producer.join();
            pool.destroy(&consumer, &ring);
            return Err(HarnessError::Setup(
                "producer thread exited during initialization".to_string(),
            ));
        }

        log::info!(
            "streaming {}x{} frames through {} slots (depth {}, {:?}, {:?} waits, consumer fences {})",
            config.frame_size.width,
            config.frame_size.height,
            config.slot_count,
            config.pipeline_depth,
            config.upload_strategy,
            config.fence_wait,
            if config.consumer_fences { "on" } else { "off" },
        );

        Ok(Self {
            config,
            consumer,
            ring,
            pool,
            present,
            producer: Some(producer),
            frames_presented: 0,
        })
    }

    /// ### English
    /// Presents the next frame in production order onto a surface of `surface` size.
    ///
    /// Blocks until a frame is published. Returns `Ok(None)` once the stream finished and was
    /// drained, and the producer's error if it failed.
    ///
    /// ### 中文
    /// 按生产顺序将下一帧呈现到 `surface` 尺寸的表面上。
    ///
    /// 阻塞直到有帧发布。流结束且已取尽时返回 `Ok(None)`；生产者失败时返回其错误。
    pub fn present_next(
        &mut self,
        surface: PhysicalSize<u32>,
    ) -> HarnessResult<Option<PresentedFrame>> {
        let Some(mut claim) = self.ring.acquire_read()? else {
            return Ok(None);
        };
        log::trace!("reading {}", claim.slot);

        let (frame, consumer_fence) =
            self.present
                .present(&self.consumer, &self.pool, &mut claim, surface)?;
        self.ring.release_read(claim, consumer_fence)?;
        self.frames_presented += 1;
        Ok(Some(frame))
    }

    #[inline]
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    #[inline]
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    #[inline]
    pub fn ring(&self) -> &StreamRing {
        &self.ring
    }

    /// ### English
    /// Stops the producer, joins it, and releases every slot and outstanding fence.
    ///
    /// Returns the producer's failure if it stopped on an error.
    ///
    /// ### 中文
    /// 停止并 join 生产者，释放所有槽位与未处理的 fence。
    ///
    /// 若生产者因错误停止，则返回该错误。
    pub fn shutdown(mut self) -> HarnessResult<HarnessReport> {
        let frames_produced = self.stop()?;
        if let Some(failure) = self.ring.failure() {
            return Err(failure);
        }
        log::info!(
            "Rendered {} frames ({} produced)",
            self.frames_presented,
            frames_produced
        );
        Ok(HarnessReport {
            frames_presented: self.frames_presented,
            frames_produced,
        })
    }

    /// Idempotent.
    fn stop(&mut self) -> HarnessResult<u64> {
        self.ring.finish();
        let joined = self.producer.take().map(|handle| handle.join());
        self.pool.destroy(&self.consumer, &self.ring);
        match joined {
            Some(Ok(produced)) => Ok(produced),
            Some(Err(_)) => Err(HarnessError::Invariant(
                "producer thread panicked".to_string(),
            )),
            None => Ok(self.ring.snapshot().written),
        }
    }
}

impl<C: GpuContext> Drop for StreamHarness<C> {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::error!("stream shutdown failed: {err}");
        }
    }
}
