use dpi::PhysicalSize;

use crate::engine::rendering::Viewport;

/// ### English
/// Grid of padded tiles covering the presenting surface; every tile shows the same frame.
///
/// `tiles_x = max(1, w / tile_w)`, `tiles_y = max(1, h / tile_h)`, `padding` pixels inset on
/// every side of each tile.
///
/// ### 中文
/// 覆盖呈现表面的带内边距 tile 网格；每个 tile 显示同一帧。
///
/// `tiles_x = max(1, w / tile_w)`，`tiles_y = max(1, h / tile_h)`，每个 tile 四周内缩
/// `padding` 像素。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileLayout {
    pub tile: PhysicalSize<u32>,
    pub padding: u32,
}

impl TileLayout {
    pub fn viewports(&self, surface: PhysicalSize<u32>) -> Vec<Viewport> {
        if surface.width == 0 || surface.height == 0 {
            return Vec::new();
        }
        let (xs, step_x) = axis(surface.width, self.tile.width);
        let (ys, step_y) = axis(surface.height, self.tile.height);
        let width = inset(step_x, self.padding);
        let height = inset(step_y, self.padding);
        let pad_x = self.padding.min((step_x - width) / 2);
        let pad_y = self.padding.min((step_y - height) / 2);

        let mut viewports = Vec::with_capacity((xs * ys) as usize);
        for j in 0..ys {
            for i in 0..xs {
                viewports.push(Viewport {
                    x: i * step_x + pad_x,
                    y: j * step_y + pad_y,
                    width,
                    height,
                });
            }
        }
        viewports
    }
}

fn axis(extent: u32, tile: u32) -> (u32, u32) {
    let count = (extent / tile.max(1)).max(1);
    (count, extent / count)
}

fn inset(step: u32, padding: u32) -> u32 {
    step.saturating_sub(padding.saturating_mul(2)).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> TileLayout {
        TileLayout {
            tile: PhysicalSize::new(960, 540),
            padding: 5,
        }
    }

    #[test]
    fn full_hd_gets_a_two_by_two_grid() {
        let tiles = layout().viewports(PhysicalSize::new(1920, 1080));
        assert_eq!(tiles.len(), 4);
        assert_eq!(
            tiles[0],
            Viewport {
                x: 5,
                y: 5,
                width: 950,
                height: 530
            }
        );
        assert_eq!(
            tiles[3],
            Viewport {
                x: 965,
                y: 545,
                width: 950,
                height: 530
            }
        );
    }

    #[test]
    fn small_surface_still_gets_one_tile_inside_it() {
        let tiles = layout().viewports(PhysicalSize::new(64, 64));
        assert_eq!(
            tiles,
            vec![Viewport {
                x: 5,
                y: 5,
                width: 54,
                height: 54
            }]
        );

        let tiny = layout().viewports(PhysicalSize::new(4, 4));
        assert_eq!(tiny.len(), 1);
        let tile = tiny[0];
        assert!(tile.x + tile.width <= 4 && tile.y + tile.height <= 4);
    }

    #[test]
    fn empty_surface_draws_nothing() {
        assert!(layout().viewports(PhysicalSize::new(0, 1080)).is_empty());
    }
}
