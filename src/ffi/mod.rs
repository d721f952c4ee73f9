//! ### English
//! C ABI surface for `xian_sync_test`.
//!
//! All exported symbols are `extern "C"` functions; structs are `#[repr(C)]`. Every call on a
//! `XianSyncTest` must happen on the embedder thread whose GLFW context was current at creation.
//!
//! ### 中文
//! `xian_sync_test` 的 C ABI 接口层。
//!
//! 所有导出符号均为 `extern "C"` 函数；结构体使用 `#[repr(C)]`。对 `XianSyncTest` 的所有调用
//! 都必须发生在创建时其 GLFW 上下文为 current 的宿主线程上。
mod abi;
mod glfw;
mod harness;

use dpi::PhysicalSize;

use crate::engine::config::StreamConfig;
use crate::engine::glfw::{GlfwApi, GlfwWindowPtr};
use crate::engine::rendering::gl::GlGpuContext;
use crate::engine::stream::StreamHarness;

/// ### English
/// Opaque harness handle: the running stream plus the producer's offscreen window.
///
/// ### 中文
/// 不透明的测试句柄：运行中的流以及生产者的离屏 window。
pub struct XianSyncTest {
    harness: Option<StreamHarness<GlGpuContext>>,
    glfw: GlfwApi,
    /// ### English
    /// Offscreen window created on the embedder thread and current on the producer thread.
    ///
    /// ### 中文
    /// 在宿主线程创建、在生产者线程 current 的离屏 window。
    offscreen_window: GlfwWindowPtr,
}

impl Drop for XianSyncTest {
    fn drop(&mut self) {
        // The producer context must be released before its window goes away.
        drop(self.harness.take());
        if !self.offscreen_window.is_null() {
            unsafe { self.glfw.destroy_window(self.offscreen_window) };
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
/// ### English
/// Creation parameters. Any zero field selects the default for that field.
///
/// ### 中文
/// 创建参数。任一字段为 0 时使用该字段的默认值。
pub struct XianSyncTestConfig {
    pub slot_count: u32,
    pub width: u32,
    pub height: u32,
    pub bar_period: u32,
    pub bar_step: u32,
    pub pipeline_depth: u32,
    /// ### English
    /// `XIAN_SYNC_TEST_FLAG_*` bitmask.
    ///
    /// ### 中文
    /// `XIAN_SYNC_TEST_FLAG_*` 位掩码。
    pub flags: u32,
}

impl XianSyncTestConfig {
    fn to_stream_config(self) -> StreamConfig {
        let defaults = StreamConfig::default();
        let frame_size = PhysicalSize::new(
            nonzero_or(self.width, defaults.frame_size.width),
            nonzero_or(self.height, defaults.frame_size.height),
        );
        let mut config = StreamConfig::with_frame_size(frame_size);
        config.slot_count = nonzero_or(self.slot_count, config.slot_count as u32) as usize;
        config.bar_period = nonzero_or(self.bar_period, config.bar_period);
        config.bar_step = nonzero_or(self.bar_step, config.bar_step);
        config.pipeline_depth =
            nonzero_or(self.pipeline_depth, config.pipeline_depth as u32) as usize;
        config.apply_flags(self.flags);
        config
    }
}

#[inline]
fn nonzero_or(value: u32, default: u32) -> u32 {
    if value == 0 { default } else { value }
}

/// ### English
/// C ABI version for `xian_sync_test`.
///
/// ### 中文
/// `xian_sync_test` 的 C ABI 版本号。
const XIAN_SYNC_TEST_ABI_VERSION: u32 = 1;

/// ### English
/// Installs `env_logger` (filter from `RUST_LOG`, default `info`) unless a logger already exists.
///
/// ### 中文
/// 安装 `env_logger`（过滤规则取自 `RUST_LOG`，默认 `info`），已有 logger 时跳过。
fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{FenceWait, UploadStrategy};
    use crate::engine::flags;

    #[test]
    fn zero_fields_take_defaults() {
        let config = XianSyncTestConfig::default().to_stream_config();
        assert_eq!(config.slot_count, 10);
        assert_eq!(config.frame_size, PhysicalSize::new(1920, 1080));
        assert_eq!(config.bar_period, 480);
        assert_eq!(config.bar_step, 5);
        assert_eq!(config.pipeline_depth, 1);
        assert!(config.consumer_fences);
    }

    #[test]
    fn explicit_fields_and_flags_are_honoured() {
        let config = XianSyncTestConfig {
            slot_count: 4,
            width: 64,
            height: 32,
            bar_period: 0,
            bar_step: 3,
            pipeline_depth: 2,
            flags: flags::XIAN_SYNC_TEST_FLAG_DIRECT_UPLOAD
                | flags::XIAN_SYNC_TEST_FLAG_CLIENT_FENCE_WAIT,
        }
        .to_stream_config();
        assert_eq!(config.slot_count, 4);
        assert_eq!(config.frame_size, PhysicalSize::new(64, 32));
        assert_eq!(config.bar_period, 16);
        assert_eq!(config.bar_step, 3);
        assert_eq!(config.pipeline_depth, 2);
        assert_eq!(config.upload_strategy, UploadStrategy::Direct);
        assert_eq!(config.fence_wait, FenceWait::Client);
    }
}
