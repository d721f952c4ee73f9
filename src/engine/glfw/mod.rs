/// ### English
/// Embedder-supplied GLFW access.
/// Used to create the producer's offscreen context in the presenting window's share group.
///
/// ### 中文
/// 由宿主提供的 GLFW 访问。
/// 用于在呈现窗口的共享组中创建生产者的离屏上下文。
mod api;

pub use api::{GlfwApi, GlfwWindowPtr};

use crate::engine::error::HarnessResult;

#[repr(C)]
#[derive(Clone, Copy, Default)]
/// ### English
/// Function pointer table for GLFW symbols provided by the embedder.
///
/// All fields are raw addresses (`usize`) and must be non-zero when installing.
///
/// ### 中文
/// 由宿主提供的 GLFW 符号函数指针表。
///
/// 所有字段都是原始地址（`usize`），安装时必须全部为非 0。
pub struct EmbedderGlfwApi {
    pub glfw_get_proc_address: usize,
    pub glfw_make_context_current: usize,
    pub glfw_default_window_hints: usize,
    pub glfw_window_hint: usize,
    pub glfw_get_window_attrib: usize,
    pub glfw_create_window: usize,
    pub glfw_destroy_window: usize,
}

/// ### English
/// Installs the embedder GLFW table. Must be called before any harness is created.
///
/// ### 中文
/// 安装宿主 GLFW 函数表。必须在创建任何测试实例之前调用。
pub fn install_embedder_glfw_api(api: EmbedderGlfwApi) -> HarnessResult<()> {
    api::install(api)
}
