//! Tile cover of the display at render-cap granularity.
//!
//! A resolution-capped technique writes one tile per dispatch; the cover
//! enumerates tiles row-major so that `tiles_per_frame` consecutive dispatches
//! sweep the whole display exactly once.

use render_protocol::{Extent, TileRegion};

pub const DEFAULT_RENDER_CAP: u32 = 512;
pub const MAX_RENDER_CAP: u32 = 4096;

/// Clamps a requested cap componentwise into `[1, 1] ..= display`.
///
/// Zero, negative and oversized requests are normalized, never rejected. A
/// zero-sized display is treated as `1x1`.
pub fn clamp_render_cap(display: Extent, requested_width: i64, requested_height: i64) -> Extent {
    let upper = display.max(Extent::new(1, 1));
    Extent {
        width: clamp_axis(requested_width, upper.width),
        height: clamp_axis(requested_height, upper.height),
    }
}

fn clamp_axis(requested: i64, upper: u32) -> u32 {
    requested.clamp(1, i64::from(upper)) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileCover {
    display: Extent,
    cap: Extent,
    tiles_x: u32,
    tiles_y: u32,
}

impl TileCover {
    pub fn new(display: Extent, requested_cap: Extent) -> Self {
        let cap = clamp_render_cap(
            display,
            i64::from(requested_cap.width),
            i64::from(requested_cap.height),
        );
        let display = display.max(Extent::new(1, 1));
        Self {
            display,
            cap,
            tiles_x: display.width.div_ceil(cap.width),
            tiles_y: display.height.div_ceil(cap.height),
        }
    }

    /// A single tile spanning the whole display.
    pub fn uncapped(display: Extent) -> Self {
        Self::new(display, display)
    }

    pub fn display(&self) -> Extent {
        self.display
    }

    pub fn cap(&self) -> Extent {
        self.cap
    }

    pub fn tiles_x(&self) -> u32 {
        self.tiles_x
    }

    pub fn tiles_y(&self) -> u32 {
        self.tiles_y
    }

    /// `ceil(display.w / cap.w) * ceil(display.h / cap.h)`.
    pub fn tiles_per_frame(&self) -> u32 {
        self.tiles_x
            .checked_mul(self.tiles_y)
            .expect("tiles per frame overflow")
    }

    /// Region covered by sub-pass `index`, wrapping past the last tile.
    /// Edge tiles are clipped to the display.
    pub fn region(&self, index: u32) -> TileRegion {
        let index = index % self.tiles_per_frame();
        let origin_x = (index % self.tiles_x) * self.cap.width;
        let origin_y = (index / self.tiles_x) * self.cap.height;
        TileRegion {
            origin_x,
            origin_y,
            width: self.cap.width.min(self.display.width - origin_x),
            height: self.cap.height.min(self.display.height - origin_y),
        }
    }

    pub fn regions(&self) -> impl Iterator<Item = TileRegion> + '_ {
        (0..self.tiles_per_frame()).map(|index| self.region(index))
    }
}

#[cfg(test)]
mod tests;
