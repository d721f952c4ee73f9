use crate::engine::glfw::{EmbedderGlfwApi, install_embedder_glfw_api};

#[unsafe(no_mangle)]
/// ### English
/// Installs the embedder's GLFW function table. Must be called before `xian_sync_test_create`.
///
/// All function pointers must come from the same GLFW library instance that produced the
/// `GLFWwindow*` passed to `xian_sync_test_create`.
///
/// Returns `true` on success.
///
/// ### 中文
/// 安装宿主的 GLFW 函数表。必须在 `xian_sync_test_create` 之前调用。
///
/// 所有函数指针必须来自同一个 GLFW 库实例（也就是创建传给 `xian_sync_test_create` 的
/// `GLFWwindow*` 的那个实例）。
///
/// 成功返回 `true`。
pub unsafe extern "C" fn xian_sync_test_set_glfw_api(api: *const EmbedderGlfwApi) -> bool {
    if api.is_null() {
        return false;
    }

    let api = unsafe { *api };
    match install_embedder_glfw_api(api) {
        Ok(()) => true,
        Err(err) => {
            super::init_logging();
            log::error!("{err}");
            false
        }
    }
}
