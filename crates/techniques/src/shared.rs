use render_protocol::{Extent, TileRegion};

/// Binding 0 of every technique kernel: where the dispatch lands in the
/// display-sized output.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct RegionUniform {
    pub display: [u32; 2],
    pub origin: [u32; 2],
    pub extent: [u32; 2],
    /// Animation frame, wrapped to 32 bits.
    pub frame: u32,
    /// Accumulated passes so far; seeds per-pass jitter.
    pub sample: u32,
}

impl RegionUniform {
    pub fn new(display: Extent, region: TileRegion, animation_frame: i64, sample: u32) -> Self {
        Self {
            display: [display.width, display.height],
            origin: [region.origin_x, region.origin_y],
            extent: [region.width, region.height],
            frame: wrap_frame(animation_frame),
            sample,
        }
    }
}

pub(crate) fn wrap_frame(animation_frame: i64) -> u32 {
    (animation_frame & i64::from(u32::MAX)) as u32
}

pub(crate) fn vector_f32(value: [f64; 2]) -> [f32; 2] {
    [value[0] as f32, value[1] as f32]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_uniform_matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<RegionUniform>(), 32);
    }

    #[test]
    fn negative_frames_wrap_instead_of_saturating() {
        assert_eq!(wrap_frame(-1), u32::MAX);
        assert_eq!(wrap_frame(i64::from(u32::MAX) + 2), 1);
    }
}
