//! ### English
//! The streaming pipeline: slot pool, upload and present stages, producer loop and the harness
//! that wires them to two threads.
//!
//! ### 中文
//! 推流流水线：槽位池、上传与呈现阶段、生产者循环，以及将其连接到两个线程的 harness。
mod harness;
mod layout;
mod pool;
mod present;
mod producer;
mod upload;

pub use harness::{HarnessReport, StreamHarness};
pub use layout::TileLayout;
pub use pool::BufferPool;
pub use present::{PresentStage, PresentedFrame};
pub use producer::run_producer;
pub use upload::UploadStage;
