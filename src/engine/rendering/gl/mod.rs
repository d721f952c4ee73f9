//! ### English
//! OpenGL backend: two contexts of one share group, the embedder's (presenting) and an
//! offscreen one bound to the producer thread.
//!
//! ### 中文
//! OpenGL 后端：同一共享组的两个上下文，宿主的（呈现）上下文与绑定到生产者线程的离屏上下文。
mod context;
mod loader;
mod quad;

pub use context::GlGpuContext;
