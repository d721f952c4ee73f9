/// ### English
/// Harness internals (configuration, frame synthesis, the slot ring, graphics backends and the
/// streaming pipeline).
///
/// ### 中文
/// 测试工具内部模块（配置、帧合成、槽位环、图形后端与推流流水线）。
pub mod config;
pub mod error;
pub mod flags;
pub mod frame;
pub mod glfw;
pub mod rendering;
pub mod stream;
pub mod synth;
