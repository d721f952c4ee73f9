//! ### English
//! CPU-side frame synthesis: a scrolling vertical-bar test pattern.
//!
//! Each frame's content is a pure function of its bar phase, so a presented frame can be checked
//! against the frame index it was produced at.
//!
//! ### 中文
//! CPU 侧帧合成：滚动的竖条测试图案。
//!
//! 每帧内容只取决于竖条相位，因此可以用帧序号校验呈现出来的帧。

use dpi::PhysicalSize;

/// ### English
/// Bytes per RGBA8 pixel.
///
/// ### 中文
/// 每个 RGBA8 像素的字节数。
pub const BYTES_PER_PIXEL: usize = 4;

const WHITE: u8 = 255;
const BLACK: u8 = 0;

/// ### English
/// Geometry of the bar pattern.
///
/// Pixel `(x, y)` is white iff `((x + phase) / bar_width) % 2 == 0`, with
/// `bar_width = period / 2`. `period` must be at least 2 (checked by `StreamConfig::validate`).
///
/// ### 中文
/// 竖条图案的几何参数。
///
/// 像素 `(x, y)` 为白色当且仅当 `((x + phase) / bar_width) % 2 == 0`，其中
/// `bar_width = period / 2`。`period` 至少为 2（由 `StreamConfig::validate` 检查）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BarPattern {
    pub size: PhysicalSize<u32>,
    /// ### English
    /// Width of one white+black bar pair in pixels; the phase wraps here.
    ///
    /// ### 中文
    /// 一对黑白竖条的像素宽度；相位在此回绕。
    pub period: u32,
    /// ### English
    /// Phase advance per generated frame.
    ///
    /// ### 中文
    /// 每生成一帧相位前进的量。
    pub step: u32,
}

impl BarPattern {
    #[inline]
    pub fn bar_width(&self) -> u32 {
        (self.period / 2).max(1)
    }

    #[inline]
    pub fn frame_bytes(&self) -> usize {
        self.size.width as usize * self.size.height as usize * BYTES_PER_PIXEL
    }

    /// ### English
    /// Channel value of column `x` at `phase`.
    ///
    /// ### 中文
    /// 第 `x` 列在 `phase` 相位下的通道值。
    #[inline]
    pub fn value_at(&self, x: u32, phase: u32) -> u8 {
        let shifted = x as u64 + phase as u64;
        if (shifted / self.bar_width() as u64) % 2 == 0 {
            WHITE
        } else {
            BLACK
        }
    }

    /// ### English
    /// Phase used for the `frame_index`-th generated frame (0-based).
    ///
    /// ### 中文
    /// 第 `frame_index` 帧（从 0 开始）使用的相位。
    pub fn phase_of(&self, frame_index: u64) -> u32 {
        let period = self.period.max(1) as u64;
        ((frame_index % period) * (self.step as u64 % period) % period) as u32
    }

    #[inline]
    pub fn next_phase(&self, phase: u32) -> u32 {
        let period = self.period.max(1) as u64;
        ((phase as u64 + self.step as u64) % period) as u32
    }

    /// ### English
    /// Fills `buffer` with the pattern at `phase`.
    ///
    /// Only whole rows that fit into `buffer` are written; rows past `size.height` are untouched.
    ///
    /// ### 中文
    /// 用 `phase` 相位的图案填充 `buffer`。
    ///
    /// 只写入能完整放入 `buffer` 的行；超过 `size.height` 的部分不动。
    pub fn generate(&self, buffer: &mut [u8], phase: u32) {
        let row_bytes = self.size.width as usize * BYTES_PER_PIXEL;
        if row_bytes == 0 {
            return;
        }
        debug_assert!(buffer.len() >= self.frame_bytes());

        let mut rows = buffer
            .chunks_exact_mut(row_bytes)
            .take(self.size.height as usize);
        let Some(first) = rows.next() else {
            return;
        };
        for (x, pixel) in first.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            pixel.fill(self.value_at(x as u32, phase));
        }
        let first: &[u8] = first;
        for row in rows {
            row.copy_from_slice(first);
        }
    }

    /// ### English
    /// Returns whether `buffer` holds exactly the frame for `phase`.
    ///
    /// ### 中文
    /// 判断 `buffer` 是否恰好是 `phase` 相位对应的帧。
    pub fn matches(&self, buffer: &[u8], phase: u32) -> bool {
        if buffer.len() != self.frame_bytes() {
            return false;
        }
        let row_bytes = self.size.width as usize * BYTES_PER_PIXEL;
        if row_bytes == 0 {
            return true;
        }
        buffer.chunks_exact(row_bytes).all(|row| {
            row.chunks_exact(BYTES_PER_PIXEL)
                .enumerate()
                .all(|(x, pixel)| {
                    let expected = self.value_at(x as u32, phase);
                    pixel.iter().all(|&c| c == expected)
                })
        })
    }

    /// ### English
    /// Allocates and fills a frame for `phase`.
    ///
    /// ### 中文
    /// 分配并填充 `phase` 相位对应的一帧。
    pub fn render(&self, phase: u32) -> Vec<u8> {
        let mut frame = vec![0; self.frame_bytes()];
        self.generate(&mut frame, phase);
        frame
    }
}

/// ### English
/// Stateful synthesizer: remembers the current phase and advances it after every frame.
///
/// ### 中文
/// 有状态的合成器：记录当前相位，每生成一帧后前进。
#[derive(Clone, Debug)]
pub struct FrameSynthesizer {
    pattern: BarPattern,
    phase: u32,
}

impl FrameSynthesizer {
    pub fn new(pattern: BarPattern) -> Self {
        Self { pattern, phase: 0 }
    }

    pub fn pattern(&self) -> &BarPattern {
        &self.pattern
    }

    /// ### English
    /// Writes the next frame into `buffer` and returns the phase it was generated with.
    ///
    /// ### 中文
    /// 将下一帧写入 `buffer`，并返回生成该帧所用的相位。
    pub fn next_frame(&mut self, buffer: &mut [u8]) -> u32 {
        let phase = self.phase;
        self.pattern.generate(buffer, phase);
        self.phase = self.pattern.next_phase(phase);
        phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> BarPattern {
        BarPattern {
            size: PhysicalSize::new(64, 64),
            period: 16,
            step: 4,
        }
    }

    #[test]
    fn phases_advance_and_wrap() {
        let mut synth = FrameSynthesizer::new(small());
        let mut frame = vec![0; small().frame_bytes()];
        let phases: Vec<u32> = (0..6).map(|_| synth.next_frame(&mut frame)).collect();
        assert_eq!(phases, vec![0, 4, 8, 12, 0, 4]);
    }

    #[test]
    fn phase_of_matches_generation_order() {
        let pattern = small();
        let mut synth = FrameSynthesizer::new(pattern);
        let mut frame = vec![0; pattern.frame_bytes()];
        for k in 0..40 {
            assert_eq!(synth.next_frame(&mut frame), pattern.phase_of(k));
        }
    }

    #[test]
    fn first_frame_starts_with_eight_white_columns() {
        let pattern = small();
        let frame = pattern.render(0);
        let row = &frame[..64 * BYTES_PER_PIXEL];
        assert!(row[..8 * BYTES_PER_PIXEL].iter().all(|&c| c == 255));
        assert!(row[8 * BYTES_PER_PIXEL..16 * BYTES_PER_PIXEL]
            .iter()
            .all(|&c| c == 0));
        assert!(pattern.matches(&frame, 0));
        assert!(!pattern.matches(&frame, 4));
    }

    #[test]
    fn every_row_is_identical() {
        let pattern = small();
        let frame = pattern.render(12);
        let row_bytes = 64 * BYTES_PER_PIXEL;
        let first = &frame[..row_bytes];
        assert!(frame.chunks_exact(row_bytes).all(|row| row == first));
        // phase 12: columns 0..4 finish a black bar, 4..12 are white
        assert_eq!(pattern.value_at(3, 12), 0);
        assert_eq!(pattern.value_at(4, 12), 255);
        assert_eq!(pattern.value_at(11, 12), 255);
        assert_eq!(pattern.value_at(12, 12), 0);
    }

    #[test]
    fn original_defaults_wrap_at_quarter_width() {
        let pattern = BarPattern {
            size: PhysicalSize::new(1920, 1),
            period: 1920 / 4,
            step: 5,
        };
        assert_eq!(pattern.bar_width(), 240);
        assert_eq!(pattern.phase_of(96), 0);
        assert_eq!(pattern.phase_of(97), 5);
    }
}
