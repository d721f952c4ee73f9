//! ### English
//! Headless soak run of the streaming pipeline on the simulated GPU.
//!
//! Every presented frame is checked against the frame the producer synthesized at that index.
//! Exits 0 after printing the frame count, or 1 with a diagnostic on the first failure.
//!
//! ### 中文
//! 在模拟 GPU 上无头运行推流流水线的长时间测试。
//!
//! 每个呈现出来的帧都会与生产者在该序号合成的帧比对。成功时打印帧数并以 0 退出；首次失败时输出
//! 诊断并以 1 退出。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use clap::Parser;
use dpi::PhysicalSize;

use xian_sync_test::engine::config::{FenceWait, StreamConfig, UploadStrategy};
use xian_sync_test::engine::error::{HarnessError, HarnessResult, fatal};
use xian_sync_test::engine::rendering::soft::{SoftDevice, SoftDeviceConfig, frame_digest};
use xian_sync_test::engine::stream::StreamHarness;

#[derive(Parser, Debug)]
#[command(
    name = "xian-sync-soak",
    about = "Stream synthesized frames between two threads through a simulated GPU and verify every presented frame."
)]
struct Args {
    /// Number of frames to present
    #[arg(long, default_value_t = 300)]
    frames: u64,

    /// Stop after this many seconds instead of a frame count
    #[arg(long, value_name = "SECS")]
    seconds: Option<u64>,

    /// Number of pool slots
    #[arg(long, default_value_t = 10)]
    slots: usize,

    /// Frame width in pixels
    #[arg(long, default_value_t = 1920)]
    width: u32,

    /// Frame height in pixels
    #[arg(long, default_value_t = 1080)]
    height: u32,

    /// Bar period in pixels (defaults to width / 4)
    #[arg(long)]
    period: Option<u32>,

    /// Phase advance per frame
    #[arg(long, default_value_t = 5)]
    step: u32,

    /// Maximum published-but-unpresented frames
    #[arg(long, default_value_t = 1)]
    depth: usize,

    /// Upload with a direct texture update instead of the staging buffer
    #[arg(long, action = clap::ArgAction::SetTrue)]
    direct: bool,

    /// Wait on fences on the CPU instead of queueing a GPU-side wait
    #[arg(long, action = clap::ArgAction::SetTrue)]
    client_wait: bool,

    /// Do not fence the consumer's draws before the producer rewrites a slot
    #[arg(long, action = clap::ArgAction::SetTrue)]
    no_consumer_fence: bool,

    /// Simulated GPU transfer latency in microseconds
    #[arg(long, value_name = "MICROS", default_value_t = 200)]
    latency_us: u64,
}

impl Args {
    fn stream_config(&self) -> StreamConfig {
        let mut config = StreamConfig::with_frame_size(PhysicalSize::new(self.width, self.height));
        config.slot_count = self.slots;
        if let Some(period) = self.period {
            config.bar_period = period;
        }
        config.bar_step = self.step;
        config.pipeline_depth = self.depth;
        if self.direct {
            config.upload_strategy = UploadStrategy::Direct;
        }
        if self.client_wait {
            config.fence_wait = FenceWait::Client;
        }
        config.consumer_fences = !self.no_consumer_fence;
        config
    }
}

fn run(args: &Args) -> HarnessResult<u64> {
    let config = args.stream_config();
    config.validate()?;
    let pattern = config.pattern();
    let surface = config.frame_size;

    let device = SoftDevice::new(SoftDeviceConfig {
        latency: Duration::from_micros(args.latency_us),
        capture_pixels: false,
    })?;
    let consumer = device.create_context("consumer");
    let producer = device.create_context("producer");
    let mut harness = StreamHarness::start(config, consumer, move || Ok(producer))?;

    let deadline = args.seconds.map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut expected_digests: HashMap<u32, u64> = HashMap::new();
    let mut presented = 0u64;

    loop {
        match deadline {
            Some(deadline) if Instant::now() >= deadline => break,
            None if presented >= args.frames => break,
            _ => {}
        }

        let Some(frame) = harness.present_next(surface)? else {
            return Err(HarnessError::Invariant(format!(
                "stream ended after {presented} frames"
            )));
        };

        if frame.seq != presented {
            return Err(HarnessError::Invariant(format!(
                "presented frame {} where frame {presented} was due",
                frame.seq
            )));
        }
        let due_phase = pattern.phase_of(frame.seq);
        if frame.phase != due_phase {
            return Err(HarnessError::Invariant(format!(
                "frame {} carries phase {}, expected {due_phase}",
                frame.seq, frame.phase
            )));
        }

        let expected = *expected_digests
            .entry(due_phase)
            .or_insert_with(|| frame_digest(&pattern.render(due_phase)));
        let draws = device.take_draws();
        if draws.len() != frame.tiles {
            return Err(HarnessError::Invariant(format!(
                "frame {} drew {} tiles, expected {}",
                frame.seq,
                draws.len(),
                frame.tiles
            )));
        }
        if let Some(bad) = draws.iter().find(|draw| draw.digest != expected) {
            return Err(HarnessError::Invariant(format!(
                "frame {} (slot {}) sampled stale or torn pixels in tile {:?}",
                frame.seq, frame.slot, bad.viewport
            )));
        }
        presented += 1;
    }

    let report = harness.shutdown()?;
    if let Some(hazard) = device.hazards().first() {
        return Err(HarnessError::Backend(hazard.to_string()));
    }
    let live = device.live_objects();
    if live.buffers + live.textures + live.fences != 0 {
        return Err(HarnessError::Invariant(format!(
            "objects left after shutdown: {live:?}"
        )));
    }
    Ok(report.frames_presented)
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(&args) {
        Ok(frames) => println!("Rendered {frames} frames"),
        Err(err) => fatal(&err),
    }
}
