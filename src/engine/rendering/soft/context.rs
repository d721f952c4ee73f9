//! ### English
//! Per-thread context of the soft device.
//!
//! Draws execute on the calling thread, so both fence wait modes block the CPU here.
//!
//! ### 中文
//! soft 设备的每线程上下文。
//!
//! 绘制在调用线程上执行，因此这里两种 fence 等待模式都会阻塞 CPU。

use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use dpi::PhysicalSize;

use crate::engine::config::FenceWait;
use crate::engine::error::{HarnessError, HarnessResult};
use crate::engine::frame::{FenceHandle, SlotResources};
use crate::engine::rendering::{GpuContext, Viewport};
use crate::engine::synth::BYTES_PER_PIXEL;

use super::device::{Hazard, SampledDraw, SoftShared};
use super::frame_digest;
use super::queue::{GpuCommand, SoftBuffer, SoftFence, SoftTexture};

pub struct SoftContext {
    shared: Arc<SoftShared>,
    label: &'static str,
    surface: Cell<PhysicalSize<u32>>,
}

impl SoftContext {
    pub(super) fn new(shared: Arc<SoftShared>, label: &'static str) -> Self {
        Self {
            shared,
            label,
            surface: Cell::new(PhysicalSize::new(0, 0)),
        }
    }

    fn buffer(&self, name: u32) -> HarnessResult<Arc<SoftBuffer>> {
        let found = self.shared.objects.lock().buffers.get(&name).cloned();
        found.ok_or_else(|| self.missing("buffer", name as u64))
    }

    fn texture(&self, name: u32) -> HarnessResult<Arc<SoftTexture>> {
        let found = self.shared.objects.lock().textures.get(&name).cloned();
        found.ok_or_else(|| self.missing("texture", name as u64))
    }

    fn missing(&self, kind: &'static str, name: u64) -> HarnessError {
        let hazard = Hazard::UnknownObject { kind, name };
        let err = HarnessError::Backend(format!("[{}] {hazard}", self.label));
        self.shared.record(hazard);
        err
    }

    fn ensure_texture_size(
        &self,
        texture: &SoftTexture,
        name: u32,
        size: PhysicalSize<u32>,
    ) -> HarnessResult<()> {
        if texture.size != size {
            return Err(HarnessError::Backend(format!(
                "[{}] texture {name} is {}x{}, upload is {}x{}",
                self.label, texture.size.width, texture.size.height, size.width, size.height
            )));
        }
        Ok(())
    }
}

fn byte_len(size: PhysicalSize<u32>) -> HarnessResult<usize> {
    (size.width as usize)
        .checked_mul(size.height as usize)
        .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL))
        .ok_or_else(|| HarnessError::Setup("slot byte size overflows usize".to_string()))
}

impl GpuContext for SoftContext {
    fn create_slot(&self, size: PhysicalSize<u32>) -> HarnessResult<SlotResources> {
        let len = byte_len(size)?;
        let staging_buffer = self.shared.next_name.fetch_add(1, Ordering::Relaxed);
        let texture = self.shared.next_name.fetch_add(1, Ordering::Relaxed);

        let mut objects = self.shared.objects.lock();
        objects.buffers.insert(
            staging_buffer,
            Arc::new(SoftBuffer {
                bytes: parking_lot::Mutex::new(vec![0; len]),
                pending_copies: AtomicU32::new(0),
            }),
        );
        objects.textures.insert(
            texture,
            Arc::new(SoftTexture {
                size,
                pixels: parking_lot::Mutex::new(vec![0; len]),
                pending_writes: AtomicU32::new(0),
            }),
        );
        Ok(SlotResources {
            staging_buffer,
            texture,
        })
    }

    fn delete_slot(&self, slot: &SlotResources) {
        let mut objects = self.shared.objects.lock();
        let buffer = objects.buffers.remove(&slot.staging_buffer);
        let texture = objects.textures.remove(&slot.texture);
        drop(objects);
        if buffer.is_none() {
            self.shared.record(Hazard::UnknownObject {
                kind: "buffer",
                name: slot.staging_buffer as u64,
            });
        }
        if texture.is_none() {
            self.shared.record(Hazard::UnknownObject {
                kind: "texture",
                name: slot.texture as u64,
            });
        }
    }

    fn write_staging(&self, slot: &SlotResources, bytes: &[u8]) -> HarnessResult<()> {
        let buffer = self.buffer(slot.staging_buffer)?;
        if buffer.pending_copies.load(Ordering::Acquire) != 0 {
            self.shared.record(Hazard::StagingBusy {
                buffer: slot.staging_buffer,
            });
        }

        let mut mapped = buffer.bytes.lock();
        if mapped.len() != bytes.len() {
            return Err(HarnessError::Backend(format!(
                "[{}] staging buffer {} holds {} bytes, frame has {}",
                self.label,
                slot.staging_buffer,
                mapped.len(),
                bytes.len()
            )));
        }
        mapped.copy_from_slice(bytes);
        Ok(())
    }

    fn copy_staging_to_texture(
        &self,
        slot: &SlotResources,
        size: PhysicalSize<u32>,
    ) -> HarnessResult<()> {
        let src = self.buffer(slot.staging_buffer)?;
        let dst = self.texture(slot.texture)?;
        self.ensure_texture_size(&dst, slot.texture, size)?;

        src.pending_copies.fetch_add(1, Ordering::AcqRel);
        dst.pending_writes.fetch_add(1, Ordering::AcqRel);
        self.shared
            .submit(GpuCommand::CopyBufferToTexture { src, dst })
    }

    fn write_texture_direct(
        &self,
        slot: &SlotResources,
        size: PhysicalSize<u32>,
        bytes: &[u8],
    ) -> HarnessResult<()> {
        let dst = self.texture(slot.texture)?;
        self.ensure_texture_size(&dst, slot.texture, size)?;
        if bytes.len() != byte_len(size)? {
            return Err(HarnessError::Backend(format!(
                "[{}] direct upload of {} bytes into a {}x{} texture",
                self.label,
                bytes.len(),
                size.width,
                size.height
            )));
        }

        dst.pending_writes.fetch_add(1, Ordering::AcqRel);
        self.shared.submit(GpuCommand::WriteTexture {
            dst,
            bytes: bytes.to_vec(),
        })
    }

    fn insert_fence(&self) -> HarnessResult<FenceHandle> {
        let raw = self.shared.next_fence.fetch_add(1, Ordering::Relaxed);
        let handle = FenceHandle::from_raw(raw)
            .ok_or_else(|| HarnessError::Backend("fence name space exhausted".to_string()))?;
        let fence = Arc::new(SoftFence::new());
        self.shared.objects.lock().fences.insert(raw, fence.clone());
        self.shared.submit(GpuCommand::Signal(fence))?;
        Ok(handle)
    }

    fn wait_fence(&self, fence: &FenceHandle, _mode: FenceWait) -> HarnessResult<()> {
        let found = self.shared.objects.lock().fences.get(&fence.raw()).cloned();
        let Some(sync) = found else {
            return Err(self.missing("fence", fence.raw()));
        };
        if sync.waited.swap(true, Ordering::AcqRel) {
            let hazard = Hazard::FenceReused { fence: fence.raw() };
            let err = HarnessError::Backend(format!("[{}] {hazard}", self.label));
            self.shared.record(hazard);
            return Err(err);
        }
        sync.wait();
        Ok(())
    }

    fn delete_fence(&self, fence: FenceHandle) {
        if self
            .shared
            .objects
            .lock()
            .fences
            .remove(&fence.raw())
            .is_none()
        {
            self.shared.record(Hazard::UnknownObject {
                kind: "fence",
                name: fence.raw(),
            });
        }
    }

    fn begin_surface(&self, surface: PhysicalSize<u32>) {
        self.surface.set(surface);
    }

    fn draw_texture(&self, texture: u32, viewport: Viewport) -> HarnessResult<()> {
        let surface = self.surface.get();
        let right = viewport.x as u64 + viewport.width as u64;
        let top = viewport.y as u64 + viewport.height as u64;
        if right > surface.width as u64 || top > surface.height as u64 {
            return Err(HarnessError::Backend(format!(
                "[{}] viewport {viewport:?} exceeds the {}x{} surface",
                self.label, surface.width, surface.height
            )));
        }

        let sampled = self.texture(texture)?;
        if sampled.pending_writes.load(Ordering::Acquire) != 0 {
            self.shared.record(Hazard::TextureBusy { texture });
        }

        let pixels = sampled.pixels.lock();
        let draw = SampledDraw {
            texture,
            viewport,
            digest: frame_digest(&pixels),
            pixels: self
                .shared
                .capture_pixels
                .then(|| Arc::<[u8]>::from(pixels.as_slice())),
        };
        drop(pixels);
        self.shared.draws.lock().push(draw);
        Ok(())
    }

    fn check_errors(&self) -> HarnessResult<()> {
        match self.shared.hazards.lock().first() {
            Some(hazard) => Err(HarnessError::Backend(format!("[{}] {hazard}", self.label))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::super::{SoftDevice, SoftDeviceConfig};
    use super::*;

    fn device() -> SoftDevice {
        SoftDevice::new(SoftDeviceConfig {
            latency: Duration::from_millis(20),
            capture_pixels: true,
        })
        .unwrap()
    }

    #[test]
    fn upload_is_visible_only_after_its_fence() {
        let device = device();
        let ctx = device.create_context("test");
        let size = PhysicalSize::new(2, 2);
        let slot = ctx.create_slot(size).unwrap();

        ctx.write_staging(&slot, &[7; 16]).unwrap();
        ctx.copy_staging_to_texture(&slot, size).unwrap();
        let fence = ctx.insert_fence().unwrap();
        ctx.wait_fence(&fence, FenceWait::Client).unwrap();
        ctx.delete_fence(fence);

        assert_eq!(device.texture_pixels(slot.texture), Some(vec![7; 16]));
        ctx.check_errors().unwrap();
    }

    #[test]
    fn remapping_before_the_copy_ran_is_a_hazard() {
        let device = device();
        let ctx = device.create_context("test");
        let size = PhysicalSize::new(2, 2);
        let slot = ctx.create_slot(size).unwrap();

        ctx.write_staging(&slot, &[1; 16]).unwrap();
        ctx.copy_staging_to_texture(&slot, size).unwrap();
        ctx.write_staging(&slot, &[2; 16]).unwrap();

        assert_eq!(
            device.hazards(),
            vec![Hazard::StagingBusy {
                buffer: slot.staging_buffer
            }]
        );
        assert!(ctx.check_errors().is_err());
    }

    #[test]
    fn sampling_before_the_upload_finished_is_a_hazard() {
        let device = device();
        let ctx = device.create_context("test");
        let size = PhysicalSize::new(2, 2);
        let slot = ctx.create_slot(size).unwrap();

        ctx.write_texture_direct(&slot, size, &[3; 16]).unwrap();
        ctx.begin_surface(size);
        ctx.draw_texture(
            slot.texture,
            Viewport {
                x: 0,
                y: 0,
                width: 2,
                height: 2,
            },
        )
        .unwrap();

        assert_eq!(
            device.hazards(),
            vec![Hazard::TextureBusy {
                texture: slot.texture
            }]
        );
    }

    #[test]
    fn a_fence_is_consumed_once() {
        let device = device();
        let ctx = device.create_context("test");
        let fence = ctx.insert_fence().unwrap();
        ctx.wait_fence(&fence, FenceWait::Server).unwrap();
        assert!(ctx.wait_fence(&fence, FenceWait::Server).is_err());
        ctx.delete_fence(fence);
        assert_eq!(device.live_objects().fences, 0);
    }

    #[test]
    fn contexts_share_one_namespace() {
        let device = device();
        let producer = device.create_context("producer");
        let consumer = device.create_context("consumer");
        let size = PhysicalSize::new(1, 1);
        let slot = consumer.create_slot(size).unwrap();

        producer.write_texture_direct(&slot, size, &[9; 4]).unwrap();
        let fence = producer.insert_fence().unwrap();
        consumer.wait_fence(&fence, FenceWait::Server).unwrap();
        consumer.delete_fence(fence);
        consumer.begin_surface(size);
        consumer
            .draw_texture(
                slot.texture,
                Viewport {
                    x: 0,
                    y: 0,
                    width: 1,
                    height: 1,
                },
            )
            .unwrap();

        let draws = device.take_draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].pixels.as_deref(), Some(&[9u8; 4][..]));
        assert!(device.hazards().is_empty());
    }
}
