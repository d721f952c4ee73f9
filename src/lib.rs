/// ### English
/// `xian_sync_test` crate root.
/// Exposes the C ABI via `ffi` (cdylib); the pipeline lives under `engine` and is also used by the
/// headless `xian-sync-soak` binary and the integration tests.
///
/// ### 中文
/// `xian_sync_test` 的 crate 根。
/// 通过 `ffi` 导出 C ABI（cdylib）；流水线位于 `engine` 模块，同时供无头的 `xian-sync-soak`
/// 二进制与集成测试使用。
pub mod engine;
mod ffi;

pub use engine::config::{FenceWait, StreamConfig, UploadStrategy};
pub use engine::error::{HarnessError, HarnessResult};
