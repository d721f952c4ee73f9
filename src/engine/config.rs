//! ### English
//! Harness configuration (pool size, frame geometry, pattern, upload/fence strategy, tiling).
//!
//! ### 中文
//! 测试工具配置（池大小、帧尺寸、图案、上传/fence 策略、平铺布局）。

use std::time::Duration;

use dpi::PhysicalSize;

use super::error::{HarnessError, HarnessResult};
use super::flags;
use super::synth::{BYTES_PER_PIXEL, BarPattern};

/// ### English
/// How the producer moves a synthesized frame into a slot texture.
///
/// ### 中文
/// 生产者将合成帧送入槽位纹理的方式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UploadStrategy {
    /// ### English
    /// Map the slot staging buffer, copy, unmap, then copy buffer → texture on the GPU.
    ///
    /// ### 中文
    /// 映射槽位 staging buffer、拷贝、解除映射，再在 GPU 上执行 buffer → 纹理拷贝。
    #[default]
    StagingBuffer,
    /// ### English
    /// Update the texture straight from client memory (the driver does the staging).
    ///
    /// ### 中文
    /// 直接从客户端内存更新纹理（由驱动负责中转）。
    Direct,
}

/// ### English
/// How the consumer waits on a producer fence.
///
/// ### 中文
/// 消费者等待生产者 fence 的方式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FenceWait {
    /// ### English
    /// GPU-side wait (`glWaitSync`): later commands queue behind the fence, the CPU returns at once.
    ///
    /// ### 中文
    /// GPU 侧等待（`glWaitSync`）：后续命令排在 fence 之后，CPU 立即返回。
    #[default]
    Server,
    /// ### English
    /// CPU-side blocking wait (`glClientWaitSync`) with no overall timeout.
    ///
    /// ### 中文
    /// CPU 侧阻塞等待（`glClientWaitSync`），没有总超时。
    Client,
}

/// ### English
/// Full configuration of one streaming harness.
///
/// ### 中文
/// 单个流式测试工具的完整配置。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    /// ### English
    /// Number of (staging buffer, texture) slots in the pool.
    ///
    /// ### 中文
    /// 池中（staging buffer, 纹理）槽位的数量。
    pub slot_count: usize,
    pub frame_size: PhysicalSize<u32>,
    pub bar_period: u32,
    pub bar_step: u32,
    /// ### English
    /// Maximum number of published-but-unreleased slots (1 = lockstep handoff).
    ///
    /// ### 中文
    /// 已发布但尚未释放的槽位上限（1 = 逐槽交接）。
    pub pipeline_depth: usize,
    pub upload_strategy: UploadStrategy,
    pub fence_wait: FenceWait,
    /// ### English
    /// Insert a consumer fence after sampling; the producer waits on it before rewriting the slot.
    ///
    /// ### 中文
    /// 采样后插入 consumer fence；生产者重写该槽位前先等待它。
    pub consumer_fences: bool,
    pub tile_size: PhysicalSize<u32>,
    pub tile_padding: u32,
    /// ### English
    /// How long `StreamHarness::start` waits for the producer context before giving up.
    ///
    /// ### 中文
    /// `StreamHarness::start` 等待生产者上下文就绪的最长时间，超时即放弃。
    pub producer_init_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::with_frame_size(PhysicalSize::new(1920, 1080))
    }
}

impl StreamConfig {
    /// ### English
    /// Defaults for a given frame size: 10 slots, four bar pairs across the width, step 5.
    ///
    /// ### 中文
    /// 给定帧尺寸的默认配置：10 个槽位，宽度内 4 对竖条，步长 5。
    pub fn with_frame_size(frame_size: PhysicalSize<u32>) -> Self {
        Self {
            slot_count: 10,
            frame_size,
            bar_period: (frame_size.width / 4).max(2),
            bar_step: 5,
            pipeline_depth: 1,
            upload_strategy: UploadStrategy::StagingBuffer,
            fence_wait: FenceWait::Server,
            consumer_fences: true,
            tile_size: PhysicalSize::new(960, 540),
            tile_padding: 5,
            producer_init_timeout: Duration::from_secs(30),
        }
    }

    /// ### English
    /// Applies a `XIAN_SYNC_TEST_FLAG_*` bitmask on top of this configuration.
    ///
    /// ### 中文
    /// 在当前配置上应用 `XIAN_SYNC_TEST_FLAG_*` 位掩码。
    pub fn apply_flags(&mut self, bits: u32) {
        if bits & flags::XIAN_SYNC_TEST_FLAG_DIRECT_UPLOAD != 0 {
            self.upload_strategy = UploadStrategy::Direct;
        }
        if bits & flags::XIAN_SYNC_TEST_FLAG_CLIENT_FENCE_WAIT != 0 {
            self.fence_wait = FenceWait::Client;
        }
        if bits & flags::XIAN_SYNC_TEST_FLAG_NO_CONSUMER_FENCE != 0 {
            self.consumer_fences = false;
        }
    }

    pub fn pattern(&self) -> BarPattern {
        BarPattern {
            size: self.frame_size,
            period: self.bar_period,
            step: self.bar_step,
        }
    }

    /// ### English
    /// Size of one frame in bytes, or a setup error if it does not fit the address space / GL sizes.
    ///
    /// ### 中文
    /// 单帧字节数；若超出地址空间或 GL 尺寸上限则返回初始化错误。
    pub fn frame_bytes(&self) -> HarnessResult<usize> {
        let bytes = (self.frame_size.width as usize)
            .checked_mul(self.frame_size.height as usize)
            .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL))
            .ok_or_else(|| HarnessError::Setup("frame byte size overflows usize".to_string()))?;
        if bytes > i32::MAX as usize {
            return Err(HarnessError::Setup(format!(
                "frame of {bytes} bytes exceeds the largest mappable buffer"
            )));
        }
        Ok(bytes)
    }

    /// ### English
    /// Rejects configurations the pipeline cannot run with.
    ///
    /// ### 中文
    /// 拒绝流水线无法运行的配置。
    pub fn validate(&self) -> HarnessResult<()> {
        if self.slot_count == 0 {
            return Err(HarnessError::Setup("slot_count must be at least 1".to_string()));
        }
        if self.frame_size.width == 0 || self.frame_size.height == 0 {
            return Err(HarnessError::Setup(format!(
                "frame size must be non-zero, got {}x{}",
                self.frame_size.width, self.frame_size.height
            )));
        }
        if self.bar_period < 2 {
            return Err(HarnessError::Setup(format!(
                "bar_period must be at least 2, got {}",
                self.bar_period
            )));
        }
        if self.pipeline_depth == 0 || self.pipeline_depth > self.slot_count {
            return Err(HarnessError::Setup(format!(
                "pipeline_depth must be in 1..={}, got {}",
                self.slot_count, self.pipeline_depth
            )));
        }
        if self.tile_size.width == 0 || self.tile_size.height == 0 {
            return Err(HarnessError::Setup("tile size must be non-zero".to_string()));
        }
        self.frame_bytes().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_reference_harness() {
        let config = StreamConfig::default();
        assert_eq!(config.slot_count, 10);
        assert_eq!(config.frame_size, PhysicalSize::new(1920, 1080));
        assert_eq!(config.bar_period, 480);
        assert_eq!(config.bar_step, 5);
        assert_eq!(config.pipeline_depth, 1);
        assert_eq!(config.producer_init_timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
        assert_eq!(config.frame_bytes(), Ok(1920 * 1080 * 4));
    }

    #[test]
    fn rejects_degenerate_values() {
        let base = StreamConfig::with_frame_size(PhysicalSize::new(64, 64));

        let mut config = base.clone();
        config.slot_count = 0;
        assert!(matches!(config.validate(), Err(HarnessError::Setup(_))));

        let mut config = base.clone();
        config.pipeline_depth = config.slot_count + 1;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.bar_period = 1;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.frame_size = PhysicalSize::new(0, 64);
        assert!(config.validate().is_err());

        let mut config = base;
        config.frame_size = PhysicalSize::new(u32::MAX, u32::MAX);
        assert!(config.validate().is_err());
    }

    #[test]
    fn flags_switch_strategies() {
        let mut config = StreamConfig::default();
        config.apply_flags(
            flags::XIAN_SYNC_TEST_FLAG_DIRECT_UPLOAD
                | flags::XIAN_SYNC_TEST_FLAG_CLIENT_FENCE_WAIT
                | flags::XIAN_SYNC_TEST_FLAG_NO_CONSUMER_FENCE,
        );
        assert_eq!(config.upload_strategy, UploadStrategy::Direct);
        assert_eq!(config.fence_wait, FenceWait::Client);
        assert!(!config.consumer_fences);
    }
}
