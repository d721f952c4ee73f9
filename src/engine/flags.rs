//! ### English
//! Bitflags selecting alternative upload/fence strategies.
//!
//! These are passed through the C ABI as a `u32` bitmask (`XianSyncTestConfig.flags`).
//!
//! ### 中文
//! 选择其它上传/fence 策略的位标志（bitflags）。
//!
//! 通过 C ABI 以 `u32` 位掩码传入（`XianSyncTestConfig.flags`）。

/// ### English
/// Upload frames with a direct texture update instead of the mapped staging buffer.
///
/// ### 中文
/// 使用直接纹理更新上传帧，而不是映射 staging buffer。
pub const XIAN_SYNC_TEST_FLAG_DIRECT_UPLOAD: u32 = 1 << 0;

/// ### English
/// Wait on producer fences on the CPU (`glClientWaitSync`) instead of queueing a GPU-side wait.
///
/// ### 中文
/// 在 CPU 上等待生产者 fence（`glClientWaitSync`），而不是排入 GPU 侧等待。
pub const XIAN_SYNC_TEST_FLAG_CLIENT_FENCE_WAIT: u32 = 1 << 1;

/// ### English
/// Unsafe mode: skip consumer fences after sampling (the producer may rewrite a texture that a
/// queued draw still reads when the pool is small).
///
/// ### 中文
/// 不安全模式：采样后不插入 consumer fence（池较小时，生产者可能重写仍被排队绘制读取的纹理）。
pub const XIAN_SYNC_TEST_FLAG_NO_CONSUMER_FENCE: u32 = 1 << 2;
