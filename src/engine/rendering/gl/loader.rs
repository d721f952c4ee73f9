//! ### English
//! GL function loading through the embedder's `glfwGetProcAddress`.
//!
//! ### 中文
//! 通过宿主的 `glfwGetProcAddress` 加载 GL 函数。

use std::ffi::{CString, c_void};
use std::rc::Rc;
use std::sync::Arc;

use gleam::gl::{self, Gl};
use glow::HasContext as _;

use crate::engine::error::{HarnessError, HarnessResult};
use crate::engine::glfw::GlfwApi;

/// ### English
/// Expected forms: `"4.6.0 ..."` or `"OpenGL ES 3.2 ..."`.
///
/// ### 中文
/// 期望的版本字符串形式：`"4.6.0 ..."` 或 `"OpenGL ES 3.2 ..."`。
pub(super) fn parse_gl_version(version: &str) -> (u32, u32) {
    let Some(token) = version
        .split_whitespace()
        .find(|t| t.chars().next().is_some_and(|c| c.is_ascii_digit()))
    else {
        return (0, 0);
    };
    let mut parts = token.split('.');
    let major = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let minor = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    (major, minor)
}

/// ### English
/// Whether the context has core fence sync objects (desktop GL 3.2+, GLES 3.0+).
///
/// ### 中文
/// 上下文是否具备核心 fence 同步对象（桌面 GL 3.2+，GLES 3.0+）。
pub(super) fn supports_fences(is_gles: bool, (major, minor): (u32, u32)) -> bool {
    if is_gles {
        major >= 3
    } else {
        major > 3 || (major == 3 && minor >= 2)
    }
}

fn proc_address(glfw: &GlfwApi, name: &str) -> *const c_void {
    match CString::new(name) {
        Ok(cstr) => unsafe { glfw.get_proc_address(cstr.as_c_str()) },
        Err(_) => std::ptr::null(),
    }
}

/// ### English
/// Loads gleam and glow for the context current on the calling thread.
///
/// ### 中文
/// 为调用线程当前的上下文加载 gleam 与 glow。
pub(super) fn load_current(glfw: &GlfwApi) -> HarnessResult<(Rc<dyn Gl>, Arc<glow::Context>)> {
    let glow = unsafe { glow::Context::from_loader_function(|name| proc_address(glfw, name)) };

    let version = unsafe { glow.get_parameter_string(glow::VERSION) };
    let is_gles = version.starts_with("OpenGL ES");
    let parsed = parse_gl_version(&version);
    if !supports_fences(is_gles, parsed) {
        return Err(HarnessError::Setup(format!(
            "GL context \"{version}\" lacks fence sync objects (needs GL 3.2 or GLES 3.0)"
        )));
    }
    log::info!("GL context: {version}");

    let gl: Rc<dyn Gl> = unsafe {
        if is_gles {
            gl::GlesFns::load_with(|name| proc_address(glfw, name))
        } else {
            gl::GlFns::load_with(|name| proc_address(glfw, name))
        }
    };

    Ok((gl, Arc::new(glow)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_desktop_and_es_versions() {
        assert_eq!(parse_gl_version("4.6.0 NVIDIA 555.85"), (4, 6));
        assert_eq!(parse_gl_version("OpenGL ES 3.2 Mesa 24.0"), (3, 2));
        assert_eq!(parse_gl_version("garbage"), (0, 0));
    }

    #[test]
    fn fence_support_thresholds() {
        assert!(supports_fences(false, (3, 2)));
        assert!(!supports_fences(false, (3, 1)));
        assert!(supports_fences(false, (4, 0)));
        assert!(supports_fences(true, (3, 0)));
        assert!(!supports_fences(true, (2, 0)));
    }
}
