//! ### English
//! C ABI bindings for the harness lifecycle (create/present/destroy).
//!
//! ### 中文
//! 测试工具生命周期相关的 C ABI 绑定（create/present/destroy）。

use std::ffi::c_void;

use dpi::PhysicalSize;

use super::{XianSyncTest, XianSyncTestConfig, init_logging};
use crate::engine::error::{HarnessResult, fatal};
use crate::engine::glfw::{GlfwApi, GlfwWindowPtr};
use crate::engine::rendering::gl::GlGpuContext;
use crate::engine::stream::StreamHarness;

fn create(glfw_window: GlfwWindowPtr, config: XianSyncTestConfig) -> HarnessResult<XianSyncTest> {
    let config = config.to_stream_config();
    config.validate()?;

    let glfw = GlfwApi::load()?;
    let offscreen_window = unsafe { glfw.create_shared_offscreen_window(glfw_window)? };
    let mut handle = XianSyncTest {
        harness: None,
        glfw,
        offscreen_window,
    };

    let consumer = GlGpuContext::consumer_from_current(glfw)?;
    // Raw pointers are not `Send`; the window crosses to the producer thread as an address.
    let window_addr = offscreen_window as usize;
    let harness = StreamHarness::start(config, consumer, move || {
        GlGpuContext::producer_on_window(glfw, window_addr as GlfwWindowPtr)
    })?;
    handle.harness = Some(harness);
    Ok(handle)
}

#[unsafe(no_mangle)]
/// ### English
/// Creates a harness streaming into the embedder's GLFW window.
///
/// `glfw_window`'s context must be current on the calling thread. `config` may be NULL (all
/// defaults). Returns NULL on failure; the reason is logged.
///
/// ### 中文
/// 创建向宿主 GLFW window 推流的测试工具。
///
/// `glfw_window` 的上下文必须在调用线程上为 current。`config` 可为 NULL（全部使用默认值）。
/// 失败时返回 NULL，原因会写入日志。
pub unsafe extern "C" fn xian_sync_test_create(
    glfw_window: *mut c_void,
    config: *const XianSyncTestConfig,
) -> *mut XianSyncTest {
    init_logging();
    if glfw_window.is_null() {
        log::error!("xian_sync_test_create: glfw_window is NULL");
        return std::ptr::null_mut();
    }
    let config = if config.is_null() {
        XianSyncTestConfig::default()
    } else {
        unsafe { *config }
    };

    match create(glfw_window as GlfwWindowPtr, config) {
        Ok(handle) => Box::into_raw(Box::new(handle)),
        Err(err) => {
            log::error!("xian_sync_test_create failed: {err}");
            std::ptr::null_mut()
        }
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Presents exactly one frame (blocking until it is published) into the current framebuffer of
/// `surface_width` x `surface_height`; the embedder swaps buffers afterwards. A zero size uses the
/// frame size. Any failure is fatal: a diagnostic is logged and the process exits with status 1.
///
/// Returns the number of frames presented so far.
///
/// ### 中文
/// 呈现恰好一帧（阻塞直到其发布）到 `surface_width` x `surface_height` 的当前 framebuffer；
/// 之后由宿主交换缓冲。尺寸为 0 时使用帧尺寸。任何失败都是致命的：记录诊断并以状态码 1 退出进程。
///
/// 返回目前已呈现的帧数。
pub unsafe extern "C" fn xian_sync_test_present(
    test: *mut XianSyncTest,
    surface_width: u32,
    surface_height: u32,
) -> u64 {
    if test.is_null() {
        return 0;
    }
    let Some(harness) = (unsafe { (*test).harness.as_mut() }) else {
        return 0;
    };

    let frame_size = harness.config().frame_size;
    let surface = if surface_width == 0 || surface_height == 0 {
        frame_size
    } else {
        PhysicalSize::new(surface_width, surface_height)
    };

    if let Err(err) = harness.present_next(surface) {
        fatal(&err);
    }
    harness.frames_presented()
}

#[unsafe(no_mangle)]
/// ### English
/// Returns the number of frames presented so far.
///
/// ### 中文
/// 返回目前已呈现的帧数。
pub unsafe extern "C" fn xian_sync_test_frames_presented(test: *const XianSyncTest) -> u64 {
    if test.is_null() {
        return 0;
    }
    unsafe { (*test).harness.as_ref() }.map_or(0, |harness| harness.frames_presented())
}

#[unsafe(no_mangle)]
/// ### English
/// Stops the producer, joins it, destroys the pool and the offscreen context, and frees `test`.
///
/// Returns the number of frames presented. A producer failure found here is logged.
///
/// ### 中文
/// 停止并 join 生产者，销毁池与离屏上下文，并释放 `test`。
///
/// 返回已呈现的帧数。此时发现的生产者失败会写入日志。
pub unsafe extern "C" fn xian_sync_test_destroy(test: *mut XianSyncTest) -> u64 {
    if test.is_null() {
        return 0;
    }
    let mut test = unsafe { Box::from_raw(test) };
    let Some(harness) = test.harness.take() else {
        return 0;
    };

    let presented = harness.frames_presented();
    match harness.shutdown() {
        Ok(report) => report.frames_presented,
        Err(err) => {
            log::error!("xian_sync_test_destroy: {err}");
            presented
        }
    }
}
