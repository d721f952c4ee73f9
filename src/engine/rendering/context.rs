//! ### English
//! The graphics-backend seam used by the pool and by the upload/present stages.
//!
//! One `GpuContext` is bound to one thread; two contexts of the same sharing group see the same
//! buffer/texture/fence names.
//!
//! ### 中文
//! 池与上传/呈现阶段所使用的图形后端接口。
//!
//! 每个 `GpuContext` 绑定一个线程；同一共享组的两个上下文看到相同的 buffer/纹理/fence 名字。

use dpi::PhysicalSize;

use crate::engine::config::FenceWait;
use crate::engine::error::HarnessResult;
use crate::engine::frame::{FenceHandle, SlotResources};

/// ### English
/// Sub-rectangle of the default framebuffer (GL convention: origin bottom-left, in pixels).
///
/// ### 中文
/// 默认 framebuffer 中的子矩形（GL 约定：原点在左下角，单位像素）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// ### English
/// GPU operations the harness needs from a backend.
///
/// Implementations must only be used on the thread whose context they represent.
///
/// ### 中文
/// 本工具需要后端提供的 GPU 操作。
///
/// 实现只能在其所代表上下文所在的线程中使用。
pub trait GpuContext {
    /// ### English
    /// Allocates one staging buffer (`width * height * 4` bytes) and one RGBA8 texture.
    ///
    /// ### 中文
    /// 分配一个 staging buffer（`width * height * 4` 字节）与一张 RGBA8 纹理。
    fn create_slot(&self, size: PhysicalSize<u32>) -> HarnessResult<SlotResources>;

    fn delete_slot(&self, slot: &SlotResources);

    /// ### English
    /// Maps the slot staging buffer for writing, copies `bytes`, and unmaps it.
    ///
    /// ### 中文
    /// 以写方式映射槽位 staging buffer，拷贝 `bytes` 后解除映射。
    fn write_staging(&self, slot: &SlotResources, bytes: &[u8]) -> HarnessResult<()>;

    /// ### English
    /// Queues a GPU copy of the whole staging buffer into the slot texture.
    ///
    /// ### 中文
    /// 排入一次 GPU 拷贝：将整个 staging buffer 拷入槽位纹理。
    fn copy_staging_to_texture(
        &self,
        slot: &SlotResources,
        size: PhysicalSize<u32>,
    ) -> HarnessResult<()>;

    /// ### English
    /// Updates the slot texture straight from client memory.
    ///
    /// ### 中文
    /// 直接从客户端内存更新槽位纹理。
    fn write_texture_direct(
        &self,
        slot: &SlotResources,
        size: PhysicalSize<u32>,
        bytes: &[u8],
    ) -> HarnessResult<()>;

    /// ### English
    /// Inserts a fence after all previously submitted commands and flushes them to the GPU.
    ///
    /// ### 中文
    /// 在之前提交的所有命令之后插入 fence，并将命令 flush 到 GPU。
    fn insert_fence(&self) -> HarnessResult<FenceHandle>;

    /// ### English
    /// Waits on `fence` without an overall timeout.
    ///
    /// ### 中文
    /// 无总超时地等待 `fence`。
    fn wait_fence(&self, fence: &FenceHandle, mode: FenceWait) -> HarnessResult<()>;

    fn delete_fence(&self, fence: FenceHandle);

    /// ### English
    /// Binds the default framebuffer at `surface` size and clears it.
    ///
    /// ### 中文
    /// 以 `surface` 尺寸绑定默认 framebuffer 并清屏。
    fn begin_surface(&self, surface: PhysicalSize<u32>);

    /// ### English
    /// Draws `texture` as a full-screen quad clipped to `viewport` (scissor + viewport).
    ///
    /// ### 中文
    /// 以全屏四边形绘制 `texture`，并裁剪到 `viewport`（scissor + viewport）。
    fn draw_texture(&self, texture: u32, viewport: Viewport) -> HarnessResult<()>;

    /// ### English
    /// Returns the first pending backend error, if any.
    ///
    /// ### 中文
    /// 返回第一个待处理的后端错误（若有）。
    fn check_errors(&self) -> HarnessResult<()>;
}
