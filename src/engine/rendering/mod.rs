//! ### English
//! Rendering module entry point.
//! `GpuContext` is the seam; `gl` drives a real share group, `soft` simulates one in-process.
//!
//! ### 中文
//! 渲染模块入口。
//! `GpuContext` 是抽象接口；`gl` 驱动真实共享组，`soft` 在进程内模拟共享组。

mod context;
pub mod gl;
pub mod soft;

pub use context::{GpuContext, Viewport};
