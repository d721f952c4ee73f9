//! ### English
//! GLFW symbol table supplied by the embedder.
//!
//! No dynamic library lookup happens here: the embedder (the process that owns the presenting
//! window) hands over the function pointers of its own GLFW instance.
//!
//! ### 中文
//! 由宿主提供的 GLFW 符号表。
//!
//! 这里不做动态库查找：宿主（持有呈现窗口的进程）交出其自身 GLFW 实例的函数指针。

use std::ffi::{CStr, c_char, c_int, c_void};
use std::sync::OnceLock;

use crate::engine::error::{HarnessError, HarnessResult};

use super::EmbedderGlfwApi;

/// ### English
/// Opaque GLFW window type (`GLFWwindow`).
///
/// ### 中文
/// 不透明 GLFW window 类型（`GLFWwindow`）。
#[repr(C)]
pub struct GLFWwindow {
    _private: [u8; 0],
}

#[repr(C)]
pub struct GLFWmonitor {
    _private: [u8; 0],
}

type GLFWglproc = *const c_void;
type GlfwGetProcAddress = unsafe extern "C" fn(*const c_char) -> GLFWglproc;
type GlfwMakeContextCurrent = unsafe extern "C" fn(*mut GLFWwindow);
type GlfwDefaultWindowHints = unsafe extern "C" fn();
type GlfwWindowHint = unsafe extern "C" fn(c_int, c_int);
type GlfwGetWindowAttrib = unsafe extern "C" fn(*mut GLFWwindow, c_int) -> c_int;
type GlfwCreateWindow = unsafe extern "C" fn(
    c_int,
    c_int,
    *const c_char,
    *mut GLFWmonitor,
    *mut GLFWwindow,
) -> *mut GLFWwindow;
type GlfwDestroyWindow = unsafe extern "C" fn(*mut GLFWwindow);

static EMBEDDER_GLFW_API: OnceLock<GlfwApi> = OnceLock::new();

/// ### English
/// Installs the embedder GLFW table for this process (once; repeated calls fail).
///
/// ### 中文
/// 为当前进程安装宿主 GLFW 函数表（仅一次；重复调用失败）。
pub(super) fn install(api: EmbedderGlfwApi) -> HarnessResult<()> {
    let required = [
        ("glfw_get_proc_address", api.glfw_get_proc_address),
        ("glfw_make_context_current", api.glfw_make_context_current),
        ("glfw_default_window_hints", api.glfw_default_window_hints),
        ("glfw_window_hint", api.glfw_window_hint),
        ("glfw_get_window_attrib", api.glfw_get_window_attrib),
        ("glfw_create_window", api.glfw_create_window),
        ("glfw_destroy_window", api.glfw_destroy_window),
    ];
    if let Some((name, _)) = required.iter().find(|(_, addr)| *addr == 0) {
        return Err(HarnessError::Setup(format!("EmbedderGlfwApi.{name} is NULL")));
    }

    let table = unsafe {
        GlfwApi {
            glfw_get_proc_address: std::mem::transmute::<usize, GlfwGetProcAddress>(
                api.glfw_get_proc_address,
            ),
            glfw_make_context_current: std::mem::transmute::<usize, GlfwMakeContextCurrent>(
                api.glfw_make_context_current,
            ),
            glfw_default_window_hints: std::mem::transmute::<usize, GlfwDefaultWindowHints>(
                api.glfw_default_window_hints,
            ),
            glfw_window_hint: std::mem::transmute::<usize, GlfwWindowHint>(api.glfw_window_hint),
            glfw_get_window_attrib: std::mem::transmute::<usize, GlfwGetWindowAttrib>(
                api.glfw_get_window_attrib,
            ),
            glfw_create_window: std::mem::transmute::<usize, GlfwCreateWindow>(
                api.glfw_create_window,
            ),
            glfw_destroy_window: std::mem::transmute::<usize, GlfwDestroyWindow>(
                api.glfw_destroy_window,
            ),
        }
    };

    EMBEDDER_GLFW_API
        .set(table)
        .map_err(|_| HarnessError::Setup("embedder GLFW API is already installed".to_string()))
}

/// ### English
/// Minimal GLFW API used by the harness (context control, proc loading, offscreen windows).
///
/// ### 中文
/// 本工具使用的最小 GLFW API（上下文控制、函数指针加载、离屏 window）。
#[derive(Clone, Copy)]
pub struct GlfwApi {
    glfw_get_proc_address: GlfwGetProcAddress,
    glfw_make_context_current: GlfwMakeContextCurrent,
    glfw_default_window_hints: GlfwDefaultWindowHints,
    glfw_window_hint: GlfwWindowHint,
    glfw_get_window_attrib: GlfwGetWindowAttrib,
    glfw_create_window: GlfwCreateWindow,
    glfw_destroy_window: GlfwDestroyWindow,
}

impl GlfwApi {
    /// ### English
    /// Returns the installed table; `xian_sync_test_set_glfw_api` must have been called first.
    ///
    /// ### 中文
    /// 返回已安装的函数表；调用前必须先调用 `xian_sync_test_set_glfw_api`。
    #[inline]
    pub fn load() -> HarnessResult<Self> {
        EMBEDDER_GLFW_API.get().copied().ok_or_else(|| {
            HarnessError::Setup(
                "embedder GLFW API is not installed; call xian_sync_test_set_glfw_api first"
                    .to_string(),
            )
        })
    }

    #[inline]
    pub unsafe fn make_current(&self, window: *mut GLFWwindow) {
        unsafe { (self.glfw_make_context_current)(window) };
    }

    /// ### English
    /// Loads an OpenGL function pointer via GLFW (the calling thread must have a current context).
    ///
    /// ### 中文
    /// 通过 GLFW 加载 OpenGL 函数指针（调用线程必须有 current 上下文）。
    #[inline]
    pub unsafe fn get_proc_address(&self, name: &CStr) -> *const c_void {
        unsafe { (self.glfw_get_proc_address)(name.as_ptr()) }
    }

    #[inline]
    pub unsafe fn destroy_window(&self, window: *mut GLFWwindow) {
        unsafe { (self.glfw_destroy_window)(window) };
    }

    /// ### English
    /// Creates an invisible 1x1 window whose context shares objects with `share`, copying the
    /// client API, version, profile and creation API of `share`.
    ///
    /// Must run on the thread that owns the GLFW event loop; the returned window may then be made
    /// current on any other thread.
    ///
    /// ### 中文
    /// 创建不可见的 1x1 window，其上下文与 `share` 共享对象，并沿用 `share` 的客户端 API、版本、
    /// profile 与创建 API。
    ///
    /// 必须在持有 GLFW 事件循环的线程调用；返回的 window 之后可在任意其他线程设为 current。
    pub unsafe fn create_shared_offscreen_window(
        &self,
        share: *mut GLFWwindow,
    ) -> HarnessResult<*mut GLFWwindow> {
        const GLFW_FALSE: c_int = 0;
        const GLFW_FOCUSED: c_int = 0x0002_0001;
        const GLFW_RESIZABLE: c_int = 0x0002_0003;
        const GLFW_VISIBLE: c_int = 0x0002_0004;
        const GLFW_CLIENT_API: c_int = 0x0002_2001;
        const GLFW_CONTEXT_VERSION_MAJOR: c_int = 0x0002_2002;
        const GLFW_CONTEXT_VERSION_MINOR: c_int = 0x0002_2003;
        const GLFW_OPENGL_FORWARD_COMPAT: c_int = 0x0002_2006;
        const GLFW_OPENGL_DEBUG_CONTEXT: c_int = 0x0002_2007;
        const GLFW_OPENGL_PROFILE: c_int = 0x0002_2008;
        const GLFW_CONTEXT_CREATION_API: c_int = 0x0002_200B;

        let attrib = |key: c_int| unsafe { (self.glfw_get_window_attrib)(share, key) };
        let client_api = attrib(GLFW_CLIENT_API);
        let major = attrib(GLFW_CONTEXT_VERSION_MAJOR);
        let minor = attrib(GLFW_CONTEXT_VERSION_MINOR);
        let profile = attrib(GLFW_OPENGL_PROFILE);
        let forward = attrib(GLFW_OPENGL_FORWARD_COMPAT);
        let debug = attrib(GLFW_OPENGL_DEBUG_CONTEXT);
        let creation_api = attrib(GLFW_CONTEXT_CREATION_API);

        unsafe {
            (self.glfw_default_window_hints)();
            (self.glfw_window_hint)(GLFW_VISIBLE, GLFW_FALSE);
            (self.glfw_window_hint)(GLFW_FOCUSED, GLFW_FALSE);
            (self.glfw_window_hint)(GLFW_RESIZABLE, GLFW_FALSE);
            if client_api != 0 {
                (self.glfw_window_hint)(GLFW_CLIENT_API, client_api);
            }
            if major > 0 {
                (self.glfw_window_hint)(GLFW_CONTEXT_VERSION_MAJOR, major);
            }
            if minor > 0 {
                (self.glfw_window_hint)(GLFW_CONTEXT_VERSION_MINOR, minor);
            }
            if profile != 0 {
                (self.glfw_window_hint)(GLFW_OPENGL_PROFILE, profile);
            }
            (self.glfw_window_hint)(GLFW_OPENGL_FORWARD_COMPAT, forward);
            (self.glfw_window_hint)(GLFW_OPENGL_DEBUG_CONTEXT, debug);
            if creation_api != 0 {
                (self.glfw_window_hint)(GLFW_CONTEXT_CREATION_API, creation_api);
            }
        }

        let title = c"xian_sync_test-producer";
        let window =
            unsafe { (self.glfw_create_window)(1, 1, title.as_ptr(), std::ptr::null_mut(), share) };
        unsafe { (self.glfw_default_window_hints)() };

        if window.is_null() {
            return Err(HarnessError::Setup(
                "glfwCreateWindow failed; ensure the shared window's context is valid".to_string(),
            ));
        }
        Ok(window)
    }
}

/// ### English
/// Raw window pointer type used by this crate.
///
/// ### 中文
/// 本 crate 使用的 window 裸指针类型。
pub type GlfwWindowPtr = *mut GLFWwindow;
