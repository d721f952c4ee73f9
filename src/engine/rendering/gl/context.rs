//! ### English
//! `GpuContext` over a real OpenGL context in the embedder's share group.
//!
//! Resource creation and state go through gleam; fences and buffer mapping go through glow.
//! A `GLsync` travels between threads as a `u64` (the pointer value).
//!
//! ### 中文
//! 基于宿主共享组中真实 OpenGL 上下文的 `GpuContext`。
//!
//! 资源创建与状态设置走 gleam；fence 与 buffer 映射走 glow。
//! `GLsync` 以 `u64`（指针值）形式在线程间传递。

use std::num::NonZeroU32;
use std::rc::Rc;
use std::sync::Arc;

use dpi::PhysicalSize;
use gleam::gl::{self, Gl};
use glow::HasContext as _;

use crate::engine::config::FenceWait;
use crate::engine::error::{HarnessError, HarnessResult};
use crate::engine::frame::{FenceHandle, SlotResources};
use crate::engine::glfw::{GlfwApi, GlfwWindowPtr};
use crate::engine::rendering::{GpuContext, Viewport};
use crate::engine::synth::BYTES_PER_PIXEL;

use super::loader::load_current;
use super::quad::QuadRenderer;

/// ### English
/// Client waits are issued in slices of this many nanoseconds until the fence signals.
///
/// ### 中文
/// 客户端等待以该纳秒数为一片反复发起，直到 fence signal。
const CLIENT_WAIT_SLICE_NS: i32 = 1_000_000_000;

/// A lost context may keep reporting errors.
const MAX_DRAINED_ERRORS: usize = 16;

pub struct GlGpuContext {
    gl: Rc<dyn Gl>,
    glow: Arc<glow::Context>,
    /// ### English
    /// Present only on the presenting context.
    ///
    /// ### 中文
    /// 仅呈现上下文持有。
    quad: Option<QuadRenderer>,
    /// ### English
    /// Set when this context owns the binding of an offscreen window on its thread.
    ///
    /// ### 中文
    /// 当该上下文负责其线程上离屏 window 的绑定时设置。
    glfw: Option<GlfwApi>,
}

impl GlGpuContext {
    /// ### English
    /// Wraps the context already current on the calling thread (the embedder's window) and
    /// prepares the quad used to present.
    ///
    /// ### 中文
    /// 包装调用线程上已 current 的上下文（宿主窗口），并准备用于呈现的四边形。
    pub fn consumer_from_current(glfw: GlfwApi) -> HarnessResult<Self> {
        let (gl, glow) = load_current(&glfw)?;
        gl.disable(gl::DEPTH_TEST);
        gl.disable(gl::CULL_FACE);
        let quad = QuadRenderer::new(&glow)?;
        let ctx = Self {
            gl,
            glow,
            quad: Some(quad),
            glfw: None,
        };
        ctx.check_errors()?;
        Ok(ctx)
    }

    /// ### English
    /// Makes `window` current on the calling thread and wraps its context. The window must share
    /// objects with the presenting window. Must be called on the producer thread.
    ///
    /// ### 中文
    /// 将 `window` 设为调用线程的 current 并包装其上下文。该 window 必须与呈现窗口共享对象。
    /// 必须在生产者线程调用。
    pub fn producer_on_window(glfw: GlfwApi, window: GlfwWindowPtr) -> HarnessResult<Self> {
        if window.is_null() {
            return Err(HarnessError::Setup("producer window is NULL".to_string()));
        }
        unsafe { glfw.make_current(window) };
        let (gl, glow) = match load_current(&glfw) {
            Ok(loaded) => loaded,
            Err(err) => {
                unsafe { glfw.make_current(std::ptr::null_mut()) };
                return Err(err);
            }
        };
        Ok(Self {
            gl,
            glow,
            quad: None,
            glfw: Some(glfw),
        })
    }

    fn staging_buffer(slot: &SlotResources) -> HarnessResult<glow::NativeBuffer> {
        NonZeroU32::new(slot.staging_buffer)
            .map(glow::NativeBuffer)
            .ok_or_else(|| HarnessError::Backend("slot has no staging buffer".to_string()))
    }

    fn sync_of(fence: &FenceHandle) -> glow::NativeFence {
        glow::NativeFence(fence.raw() as usize as *mut _)
    }

    fn first_error(&self) -> Option<gl::GLenum> {
        let first = self.gl.get_error();
        if first == gl::NO_ERROR {
            return None;
        }
        // Drain the remaining flags so the next check starts clean.
        for _ in 0..MAX_DRAINED_ERRORS {
            if self.gl.get_error() == gl::NO_ERROR {
                break;
            }
        }
        Some(first)
    }
}

fn byte_len(size: PhysicalSize<u32>) -> HarnessResult<i32> {
    (size.width as i64)
        .checked_mul(size.height as i64)
        .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL as i64))
        .and_then(|len| i32::try_from(len).ok())
        .ok_or_else(|| {
            HarnessError::Setup(format!(
                "{}x{} frame does not fit a GL buffer",
                size.width, size.height
            ))
        })
}

impl GpuContext for GlGpuContext {
    fn create_slot(&self, size: PhysicalSize<u32>) -> HarnessResult<SlotResources> {
        let len = byte_len(size)?;
        let gl = &self.gl;

        let texture = gl.gen_textures(1).first().copied().unwrap_or(0);
        let staging_buffer = gl.gen_buffers(1).first().copied().unwrap_or(0);
        if texture == 0 || staging_buffer == 0 {
            gl.delete_textures(&[texture]);
            gl.delete_buffers(&[staging_buffer]);
            return Err(HarnessError::Setup("glGen* returned 0".to_string()));
        }

        gl.bind_texture(gl::TEXTURE_2D, texture);
        gl.tex_image_2d(
            gl::TEXTURE_2D,
            0,
            gl::RGBA8 as gl::GLint,
            size.width as gl::GLsizei,
            size.height as gl::GLsizei,
            0,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
            None,
        );
        gl.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::LINEAR as gl::GLint);
        gl.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::LINEAR as gl::GLint);
        gl.tex_parameter_i(
            gl::TEXTURE_2D,
            gl::TEXTURE_WRAP_S,
            gl::CLAMP_TO_EDGE as gl::GLint,
        );
        gl.tex_parameter_i(
            gl::TEXTURE_2D,
            gl::TEXTURE_WRAP_T,
            gl::CLAMP_TO_EDGE as gl::GLint,
        );
        gl.bind_texture(gl::TEXTURE_2D, 0);

        gl.bind_buffer(gl::PIXEL_UNPACK_BUFFER, staging_buffer);
        gl.buffer_data_untyped(
            gl::PIXEL_UNPACK_BUFFER,
            len as gl::GLsizeiptr,
            std::ptr::null(),
            gl::STREAM_DRAW,
        );
        gl.bind_buffer(gl::PIXEL_UNPACK_BUFFER, 0);

        if let Some(code) = self.first_error() {
            gl.delete_textures(&[texture]);
            gl.delete_buffers(&[staging_buffer]);
            return Err(HarnessError::Setup(format!(
                "GL error 0x{code:04x} while allocating a {}x{} slot",
                size.width, size.height
            )));
        }

        Ok(SlotResources {
            staging_buffer,
            texture,
        })
    }

    fn delete_slot(&self, slot: &SlotResources) {
        self.gl.delete_textures(&[slot.texture]);
        self.gl.delete_buffers(&[slot.staging_buffer]);
    }

    fn write_staging(&self, slot: &SlotResources, bytes: &[u8]) -> HarnessResult<()> {
        let buffer = Self::staging_buffer(slot)?;
        let len = i32::try_from(bytes.len())
            .map_err(|_| HarnessError::Backend("frame larger than i32::MAX".to_string()))?;

        unsafe {
            self.glow.bind_buffer(glow::PIXEL_UNPACK_BUFFER, Some(buffer));
            let mapped =
                self.glow
                    .map_buffer_range(glow::PIXEL_UNPACK_BUFFER, 0, len, glow::MAP_WRITE_BIT);
            if mapped.is_null() {
                self.glow.bind_buffer(glow::PIXEL_UNPACK_BUFFER, None);
                return Err(HarnessError::Backend(format!(
                    "glMapBufferRange failed for staging buffer {}",
                    slot.staging_buffer
                )));
            }
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped, bytes.len());
            self.glow.unmap_buffer(glow::PIXEL_UNPACK_BUFFER);
            self.glow.bind_buffer(glow::PIXEL_UNPACK_BUFFER, None);
        }
        Ok(())
    }

    fn copy_staging_to_texture(
        &self,
        slot: &SlotResources,
        size: PhysicalSize<u32>,
    ) -> HarnessResult<()> {
        let gl = &self.gl;
        gl.bind_buffer(gl::PIXEL_UNPACK_BUFFER, slot.staging_buffer);
        gl.bind_texture(gl::TEXTURE_2D, slot.texture);
        gl.pixel_store_i(gl::UNPACK_ALIGNMENT, 1);
        gl.tex_sub_image_2d_pbo(
            gl::TEXTURE_2D,
            0,
            0,
            0,
            size.width as gl::GLsizei,
            size.height as gl::GLsizei,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
            0,
        );
        gl.bind_texture(gl::TEXTURE_2D, 0);
        gl.bind_buffer(gl::PIXEL_UNPACK_BUFFER, 0);
        Ok(())
    }

    fn write_texture_direct(
        &self,
        slot: &SlotResources,
        size: PhysicalSize<u32>,
        bytes: &[u8],
    ) -> HarnessResult<()> {
        let gl = &self.gl;
        gl.bind_buffer(gl::PIXEL_UNPACK_BUFFER, 0);
        gl.bind_texture(gl::TEXTURE_2D, slot.texture);
        gl.pixel_store_i(gl::UNPACK_ALIGNMENT, 1);
        gl.tex_sub_image_2d(
            gl::TEXTURE_2D,
            0,
            0,
            0,
            size.width as gl::GLsizei,
            size.height as gl::GLsizei,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
            bytes,
        );
        gl.bind_texture(gl::TEXTURE_2D, 0);
        Ok(())
    }

    fn insert_fence(&self) -> HarnessResult<FenceHandle> {
        let sync = unsafe { self.glow.fence_sync(glow::SYNC_GPU_COMMANDS_COMPLETE, 0) }
            .map_err(|err| HarnessError::Backend(format!("glFenceSync failed: {err}")))?;
        unsafe { self.glow.flush() };
        FenceHandle::from_raw(sync.0 as usize as u64)
            .ok_or_else(|| HarnessError::Backend("glFenceSync returned NULL".to_string()))
    }

    fn wait_fence(&self, fence: &FenceHandle, mode: FenceWait) -> HarnessResult<()> {
        let sync = Self::sync_of(fence);
        match mode {
            FenceWait::Server => unsafe {
                self.glow.wait_sync(sync, 0, glow::TIMEOUT_IGNORED);
            },
            FenceWait::Client => loop {
                let status = unsafe {
                    self.glow.client_wait_sync(
                        sync,
                        glow::SYNC_FLUSH_COMMANDS_BIT,
                        CLIENT_WAIT_SLICE_NS,
                    )
                };
                match status {
                    glow::ALREADY_SIGNALED | glow::CONDITION_SATISFIED => break,
                    glow::TIMEOUT_EXPIRED => {
                        log::warn!("fence {:#x} still pending after 1s", fence.raw());
                    }
                    _ => {
                        return Err(HarnessError::Backend(format!(
                            "glClientWaitSync failed on fence {:#x}",
                            fence.raw()
                        )));
                    }
                }
            },
        }
        Ok(())
    }

    fn delete_fence(&self, fence: FenceHandle) {
        unsafe { self.glow.delete_sync(Self::sync_of(&fence)) };
    }

    fn begin_surface(&self, surface: PhysicalSize<u32>) {
        let gl = &self.gl;
        gl.bind_framebuffer(gl::FRAMEBUFFER, 0);
        gl.disable(gl::SCISSOR_TEST);
        gl.viewport(
            0,
            0,
            surface.width as gl::GLsizei,
            surface.height as gl::GLsizei,
        );
        gl.clear_color(1.0, 0.0, 0.0, 1.0);
        gl.clear(gl::COLOR_BUFFER_BIT);
    }

    fn draw_texture(&self, texture: u32, viewport: Viewport) -> HarnessResult<()> {
        let Some(quad) = self.quad.as_ref() else {
            return Err(HarnessError::Backend(
                "this context was not created for presenting".to_string(),
            ));
        };

        let gl = &self.gl;
        let (x, y) = (viewport.x as gl::GLint, viewport.y as gl::GLint);
        let (w, h) = (
            viewport.width as gl::GLsizei,
            viewport.height as gl::GLsizei,
        );
        gl.enable(gl::SCISSOR_TEST);
        gl.scissor(x, y, w, h);
        gl.viewport(x, y, w, h);
        let drawn = quad.draw(&self.glow, texture);
        gl.disable(gl::SCISSOR_TEST);
        drawn
    }

    fn check_errors(&self) -> HarnessResult<()> {
        match self.first_error() {
            Some(code) => Err(HarnessError::Backend(format!("GL error 0x{code:04x}"))),
            None => Ok(()),
        }
    }
}

impl Drop for GlGpuContext {
    fn drop(&mut self) {
        if let Some(quad) = self.quad.take() {
            quad.delete(&self.glow);
        }
        if let Some(glfw) = self.glfw.take() {
            unsafe {
                self.glow.flush();
                glfw.make_current(std::ptr::null_mut());
            }
        }
    }
}
