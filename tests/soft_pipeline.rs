//! End-to-end runs of the streaming pipeline on the simulated GPU.

use std::cell::Cell;
use std::thread;
use std::time::{Duration, Instant};

use dpi::PhysicalSize;

use xian_sync_test::engine::config::{FenceWait, StreamConfig, UploadStrategy};
use xian_sync_test::engine::error::{HarnessError, HarnessResult};
use xian_sync_test::engine::frame::{FenceHandle, ReadClaim, SlotResources, StreamRing};
use xian_sync_test::engine::rendering::soft::{
    LiveObjects, SoftContext, SoftDevice, SoftDeviceConfig,
};
use xian_sync_test::engine::rendering::{GpuContext, Viewport};
use xian_sync_test::engine::stream::{BufferPool, HarnessReport, PresentStage, StreamHarness};

const SIZE: PhysicalSize<u32> = PhysicalSize::new(64, 64);

fn small_config(slots: usize) -> StreamConfig {
    let mut config = StreamConfig::with_frame_size(SIZE);
    config.slot_count = slots;
    config.bar_period = 16;
    config.bar_step = 4;
    config.tile_size = PhysicalSize::new(32, 32);
    config.tile_padding = 2;
    config
}

fn device() -> SoftDevice {
    SoftDevice::new(SoftDeviceConfig {
        latency: Duration::from_micros(300),
        capture_pixels: true,
    })
    .unwrap()
}

fn start(device: &SoftDevice, config: StreamConfig) -> StreamHarness<SoftContext> {
    let producer = device.create_context("producer");
    StreamHarness::start(config, device.create_context("consumer"), move || Ok(producer)).unwrap()
}

/// Presents `frames` frames and checks order, phase and every sampled pixel.
fn present_and_verify(device: &SoftDevice, harness: &mut StreamHarness<SoftContext>, frames: u64) {
    let pattern = harness.config().pattern();
    for k in 0..frames {
        let frame = harness.present_next(SIZE).unwrap().unwrap();
        assert_eq!(frame.seq, k);
        assert_eq!(frame.slot, (k % harness.config().slot_count as u64) as usize);
        assert_eq!(frame.phase, pattern.phase_of(k));

        let expected = pattern.render(frame.phase);
        let draws = device.take_draws();
        assert_eq!(draws.len(), frame.tiles);
        assert_eq!(frame.tiles, 4);
        for draw in draws {
            assert_eq!(
                draw.pixels.as_deref(),
                Some(expected.as_slice()),
                "frame {k} tile {:?}",
                draw.viewport
            );
        }
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn frames_arrive_in_order_with_their_payload_for_any_pool_size() {
    for slots in [1, 2, 4, 10] {
        let device = device();
        let mut harness = start(&device, small_config(slots));
        present_and_verify(&device, &mut harness, 40);

        let report = harness.shutdown().unwrap();
        assert_eq!(report.frames_presented, 40);
        assert!(report.frames_produced >= 40);
        assert!(device.hazards().is_empty(), "{:?}", device.hazards());
        assert_eq!(device.live_objects(), LiveObjects::default());
    }
}

#[test]
fn four_slot_scenario_scrolls_the_bars() {
    let device = device();
    let mut harness = start(&device, small_config(4));
    let mut phases = Vec::new();

    for _ in 0..5 {
        let frame = harness.present_next(SIZE).unwrap().unwrap();
        let draws = device.take_draws();
        let pixels = draws[0].pixels.clone().unwrap();
        let red_at = |x: usize| pixels[x * 4];
        match frame.phase {
            0 => {
                assert_eq!(red_at(0), 255);
                assert_eq!(red_at(7), 255);
                assert_eq!(red_at(8), 0);
            }
            4 => {
                assert_eq!(red_at(3), 255);
                assert_eq!(red_at(4), 0);
                assert_eq!(red_at(12), 255);
            }
            _ => {}
        }
        phases.push(frame.phase);
    }

    assert_eq!(phases, vec![0, 4, 8, 12, 0]);
    harness.shutdown().unwrap();
}

#[test]
fn pipelining_never_exceeds_the_configured_depth() {
    let device = device();
    let mut config = small_config(4);
    config.pipeline_depth = 3;
    let mut harness = start(&device, config);

    wait_until(|| harness.ring().snapshot().written == 3);
    thread::sleep(Duration::from_millis(20));
    let snapshot = harness.ring().snapshot();
    assert_eq!(snapshot.written - snapshot.read, 3);

    present_and_verify(&device, &mut harness, 30);
    let snapshot = harness.ring().snapshot();
    assert!(snapshot.written - snapshot.read <= 3);

    harness.shutdown().unwrap();
    assert!(device.hazards().is_empty());
}

#[test]
fn direct_upload_strategy_streams_the_same_frames() {
    let device = device();
    let mut config = small_config(3);
    config.upload_strategy = UploadStrategy::Direct;
    let mut harness = start(&device, config);
    present_and_verify(&device, &mut harness, 25);
    harness.shutdown().unwrap();
    assert!(device.hazards().is_empty());
    assert_eq!(device.live_objects(), LiveObjects::default());
}

#[test]
fn client_waits_without_consumer_fences_stream_the_same_frames() {
    let device = device();
    let mut config = small_config(2);
    config.fence_wait = FenceWait::Client;
    config.consumer_fences = false;
    let mut harness = start(&device, config);
    present_and_verify(&device, &mut harness, 25);
    harness.shutdown().unwrap();
    assert!(device.hazards().is_empty());
}

#[test]
fn identical_frames_in_different_slots_sample_identically() {
    let device = device();
    // Period 16, step 4: the phase repeats every 4 frames, so frames 0 and 4 land in slots 0 and 1.
    let mut harness = start(&device, small_config(3));
    let mut samples = Vec::new();
    for _ in 0..5 {
        let frame = harness.present_next(SIZE).unwrap().unwrap();
        let draws = device.take_draws();
        samples.push((frame.slot, frame.phase, draws[0].pixels.clone().unwrap()));
    }
    harness.shutdown().unwrap();

    let (slot_a, phase_a, pixels_a) = &samples[0];
    let (slot_b, phase_b, pixels_b) = &samples[4];
    assert_ne!(slot_a, slot_b);
    assert_eq!(phase_a, phase_b);
    assert_eq!(pixels_a, pixels_b);
}

#[test]
fn shutdown_releases_a_blocked_producer() {
    let device = device();
    let harness = start(&device, small_config(2));

    wait_until(|| harness.ring().snapshot().written == 1);
    thread::sleep(Duration::from_millis(10));
    assert_eq!(harness.ring().snapshot().written, 1);

    let report = harness.shutdown().unwrap();
    assert_eq!(
        report,
        HarnessReport {
            frames_presented: 0,
            frames_produced: 1,
        }
    );
    assert_eq!(device.live_objects(), LiveObjects::default());
}

#[test]
fn presenting_a_slot_without_a_fence_is_an_invariant_breach() {
    let device = device();
    let ctx = device.create_context("consumer");
    let config = small_config(1);
    let pool = BufferPool::create(&ctx, 1, SIZE).unwrap();
    let ring = StreamRing::new(1, 1);

    let mut claim = ReadClaim {
        slot: 0,
        seq: 0,
        phase: 0,
        fence: None,
    };
    let err = PresentStage::new(&config)
        .present(&ctx, &pool, &mut claim, SIZE)
        .unwrap_err();
    assert!(err.is_invariant(), "{err}");
    assert!(device.take_draws().is_empty());

    pool.destroy(&ctx, &ring);
    assert_eq!(device.live_objects(), LiveObjects::default());
}

/// Context whose `fail_slot_at`-th slot creation or `fail_fence_at`-th fence insertion fails
/// (0 never fails).
struct FailingContext {
    inner: SoftContext,
    slots: Cell<u32>,
    fences: Cell<u32>,
    fail_slot_at: u32,
    fail_fence_at: u32,
}

impl FailingContext {
    fn new(inner: SoftContext) -> Self {
        Self {
            inner,
            slots: Cell::new(0),
            fences: Cell::new(0),
            fail_slot_at: 0,
            fail_fence_at: 0,
        }
    }
}

impl GpuContext for FailingContext {
    fn create_slot(&self, size: PhysicalSize<u32>) -> HarnessResult<SlotResources> {
        let count = self.slots.get() + 1;
        self.slots.set(count);
        if count == self.fail_slot_at {
            return Err(HarnessError::Setup("out of texture memory".to_string()));
        }
        self.inner.create_slot(size)
    }

    fn delete_slot(&self, slot: &SlotResources) {
        self.inner.delete_slot(slot)
    }

    fn write_staging(&self, slot: &SlotResources, bytes: &[u8]) -> HarnessResult<()> {
        self.inner.write_staging(slot, bytes)
    }

    fn copy_staging_to_texture(
        &self,
        slot: &SlotResources,
        size: PhysicalSize<u32>,
    ) -> HarnessResult<()> {
        self.inner.copy_staging_to_texture(slot, size)
    }

    fn write_texture_direct(
        &self,
        slot: &SlotResources,
        size: PhysicalSize<u32>,
        bytes: &[u8],
    ) -> HarnessResult<()> {
        self.inner.write_texture_direct(slot, size, bytes)
    }

    fn insert_fence(&self) -> HarnessResult<FenceHandle> {
        let count = self.fences.get() + 1;
        self.fences.set(count);
        if count == self.fail_fence_at {
            return Err(HarnessError::Backend("device lost".to_string()));
        }
        self.inner.insert_fence()
    }

    fn wait_fence(&self, fence: &FenceHandle, mode: FenceWait) -> HarnessResult<()> {
        self.inner.wait_fence(fence, mode)
    }

    fn delete_fence(&self, fence: FenceHandle) {
        self.inner.delete_fence(fence)
    }

    fn begin_surface(&self, surface: PhysicalSize<u32>) {
        self.inner.begin_surface(surface)
    }

    fn draw_texture(&self, texture: u32, viewport: Viewport) -> HarnessResult<()> {
        self.inner.draw_texture(texture, viewport)
    }

    fn check_errors(&self) -> HarnessResult<()> {
        self.inner.check_errors()
    }
}

#[test]
fn producer_failure_reaches_the_consumer() {
    let device = device();
    let producer = FailingContext {
        fail_fence_at: 4,
        ..FailingContext::new(device.create_context("producer"))
    };
    let mut harness =
        StreamHarness::start(small_config(2), device.create_context("consumer"), move || {
            Ok(producer)
        })
        .unwrap();

    for k in 0..3 {
        let frame = harness.present_next(SIZE).unwrap().unwrap();
        assert_eq!(frame.seq, k);
    }
    let err = harness.present_next(SIZE).unwrap_err();
    assert_eq!(err, HarnessError::Backend("device lost".to_string()));

    assert_eq!(harness.shutdown().unwrap_err(), err);
    assert_eq!(device.live_objects(), LiveObjects::default());
}

#[test]
fn producer_context_failure_aborts_start() {
    let device = device();
    let result = StreamHarness::start(
        small_config(3),
        device.create_context("consumer"),
        || -> HarnessResult<SoftContext> {
            Err(HarnessError::Setup("no offscreen context".to_string()))
        },
    );

    match result {
        Err(err) => assert_eq!(err, HarnessError::Setup("no offscreen context".to_string())),
        Ok(_) => panic!("start succeeded without a producer context"),
    }
    assert_eq!(device.live_objects(), LiveObjects::default());
}

#[test]
fn invalid_configuration_is_rejected_before_allocating() {
    let device = device();
    let mut config = small_config(2);
    config.pipeline_depth = 3;
    let producer = device.create_context("producer");
    let result = StreamHarness::start(config, device.create_context("consumer"), move || {
        Ok(producer)
    });
    assert!(matches!(result, Err(HarnessError::Setup(_))));
    assert_eq!(device.live_objects(), LiveObjects::default());
}

#[test]
fn pool_creation_is_all_or_nothing() {
    let device = device();
    let ctx = FailingContext {
        fail_slot_at: 3,
        ..FailingContext::new(device.create_context("consumer"))
    };

    match BufferPool::create(&ctx, 5, SIZE) {
        Err(err) => assert_eq!(err, HarnessError::Setup("out of texture memory".to_string())),
        Ok(_) => panic!("pool created despite a failed slot"),
    }
    assert_eq!(ctx.slots.get(), 3);
    assert_eq!(device.live_objects(), LiveObjects::default());
}

#[test]
fn slot_allocation_failure_aborts_start() {
    let device = device();
    let consumer = FailingContext {
        fail_slot_at: 2,
        ..FailingContext::new(device.create_context("consumer"))
    };
    let producer = device.create_context("producer");
    let result = StreamHarness::start(small_config(4), consumer, move || Ok(producer));

    assert!(matches!(result, Err(HarnessError::Setup(_))));
    assert_eq!(device.live_objects(), LiveObjects::default());
}

#[test]
fn hung_producer_context_does_not_hold_up_start() {
    let device = device();
    let mut config = small_config(2);
    config.producer_init_timeout = Duration::from_millis(100);
    let producer = device.create_context("producer");

    let began = Instant::now();
    let result = StreamHarness::start(config, device.create_context("consumer"), move || {
        thread::sleep(Duration::from_secs(3));
        Ok(producer)
    });
    let elapsed = began.elapsed();

    assert!(matches!(result, Err(HarnessError::Setup(_))));
    assert!(elapsed < Duration::from_secs(2), "start took {elapsed:?}");
    assert_eq!(device.live_objects(), LiveObjects::default());
}
