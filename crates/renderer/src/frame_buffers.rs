use render_protocol::{Extent, FrameBufferDesc};
use tiles::clamp_render_cap;

use crate::backend::RenderBackend;
use crate::errors::AllocationError;

const BUFFER_LABELS: [&str; 2] = ["renderer.frame_buffer.a", "renderer.frame_buffer.b"];

/// Output buffers of one technique instance at display resolution.
///
/// With one buffer the technique writes and presents the same image. With two
/// the pair ping-pongs: tiles land in the write target, the averaging pass
/// folds it with the settled image, then [`FrameBufferSet::swap`] makes the
/// result the settled image.
pub struct FrameBufferSet<B: RenderBackend> {
    display: Extent,
    render_cap: Extent,
    buffer_count: u32,
    images: Vec<B::Image>,
    settled: usize,
    generation: u64,
}

impl<B: RenderBackend> FrameBufferSet<B> {
    pub fn new(
        backend: &B,
        display: Extent,
        requested_cap: Extent,
        buffer_count: u32,
    ) -> Result<Self, AllocationError> {
        assert!(
            (1..=2).contains(&buffer_count),
            "frame buffer set holds one or two buffers, got {buffer_count}"
        );
        let display = display.max(Extent::new(1, 1));
        let mut set = Self {
            display,
            render_cap: clamp_render_cap(
                display,
                i64::from(requested_cap.width),
                i64::from(requested_cap.height),
            ),
            buffer_count,
            images: Vec::new(),
            settled: 0,
            generation: 0,
        };
        set.reallocate(backend)?;
        Ok(set)
    }

    pub fn display(&self) -> Extent {
        self.display
    }

    pub fn render_cap(&self) -> Extent {
        self.render_cap
    }

    pub fn buffer_count(&self) -> u32 {
        self.buffer_count
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_allocated(&self) -> bool {
        self.images.len() == self.buffer_count as usize
    }

    pub fn clamp_render_cap(&self, requested_width: i64, requested_height: i64) -> Extent {
        clamp_render_cap(self.display, requested_width, requested_height)
    }

    /// Stores the clamped cap; returns whether it changed.
    pub fn set_render_cap(&mut self, requested: Extent) -> bool {
        let cap = self.clamp_render_cap(i64::from(requested.width), i64::from(requested.height));
        if cap == self.render_cap {
            return false;
        }
        self.render_cap = cap;
        true
    }

    /// Reallocates for a new display size. Returns `Ok(false)` without
    /// touching the buffers when the size is unchanged. After a successful
    /// resize the contents are undefined until fully written again.
    pub fn resize(&mut self, backend: &B, display: Extent) -> Result<bool, AllocationError> {
        let display = display.max(Extent::new(1, 1));
        if display == self.display && self.is_allocated() {
            return Ok(false);
        }
        self.display = display;
        self.render_cap = clamp_render_cap(
            display,
            i64::from(self.render_cap.width),
            i64::from(self.render_cap.height),
        );
        self.reallocate(backend)?;
        Ok(true)
    }

    /// All-or-nothing: on failure the set holds no buffers at all.
    pub fn reallocate(&mut self, backend: &B) -> Result<(), AllocationError> {
        self.images.clear();
        self.settled = 0;
        let mut images = Vec::with_capacity(self.buffer_count as usize);
        for label in BUFFER_LABELS.iter().take(self.buffer_count as usize) {
            let desc = FrameBufferDesc::render_target(label, self.display);
            match backend.allocate_image(&desc) {
                Ok(image) => images.push(image),
                Err(error) => {
                    tracing::error!(
                        %error,
                        width = self.display.width,
                        height = self.display.height,
                        "frame buffer allocation failed"
                    );
                    return Err(error);
                }
            }
        }
        self.images = images;
        self.generation = self
            .generation
            .checked_add(1)
            .expect("frame buffer generation overflow");
        tracing::debug!(
            width = self.display.width,
            height = self.display.height,
            buffers = self.buffer_count,
            generation = self.generation,
            "frame buffers allocated"
        );
        Ok(())
    }

    /// Safe to present and export.
    pub fn settled(&self) -> Option<&B::Image> {
        self.images.get(self.settled)
    }

    /// Where techniques write the current tile.
    pub fn write_target(&self) -> Option<&B::Image> {
        self.images.get(self.write_index())
    }

    pub fn swap(&mut self) {
        if self.buffer_count == 2 && self.is_allocated() {
            self.settled = self.write_index();
        }
    }

    fn write_index(&self) -> usize {
        if self.buffer_count == 2 {
            1 - self.settled
        } else {
            self.settled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_backend::HostBackend;

    #[test]
    fn ping_pong_pair_swaps_roles() {
        let backend = HostBackend::new();
        let mut set = FrameBufferSet::new(&backend, Extent::new(4, 4), Extent::new(4, 4), 2)
            .expect("allocate pair");
        let first_settled = set.settled().expect("settled").clone();
        let first_target = set.write_target().expect("target").clone();
        assert!(!first_settled.same_storage(&first_target));

        set.swap();
        assert!(set.settled().expect("settled").same_storage(&first_target));
        assert!(set.write_target().expect("target").same_storage(&first_settled));
    }

    #[test]
    fn direct_mode_writes_the_presented_buffer() {
        let backend = HostBackend::new();
        let mut set = FrameBufferSet::new(&backend, Extent::new(4, 4), Extent::new(2, 2), 1)
            .expect("allocate single");
        set.swap();
        let settled = set.settled().expect("settled");
        assert!(settled.same_storage(set.write_target().expect("target")));
    }

    #[test]
    fn resize_to_same_size_is_a_no_op() {
        let backend = HostBackend::new();
        let mut set = FrameBufferSet::new(&backend, Extent::new(8, 8), Extent::new(4, 4), 2)
            .expect("allocate pair");
        let generation = set.generation();
        assert!(!set.resize(&backend, Extent::new(8, 8)).expect("resize"));
        assert_eq!(set.generation(), generation);
        assert_eq!(backend.allocations(), 2);

        assert!(set.resize(&backend, Extent::new(16, 8)).expect("resize"));
        assert_eq!(set.generation(), generation + 1);
        assert_eq!(set.display(), Extent::new(16, 8));
    }

    #[test]
    fn resize_reclamps_the_render_cap() {
        let backend = HostBackend::new();
        let mut set = FrameBufferSet::new(&backend, Extent::new(64, 64), Extent::new(48, 48), 1)
            .expect("allocate single");
        set.resize(&backend, Extent::new(32, 100)).expect("resize");
        assert_eq!(set.render_cap(), Extent::new(32, 48));
    }

    #[test]
    fn failed_allocation_exposes_no_buffer() {
        let backend = HostBackend::new();
        let mut set = FrameBufferSet::new(&backend, Extent::new(8, 8), Extent::new(8, 8), 2)
            .expect("allocate pair");
        backend.fail_allocation_at(backend.allocations() + 2);

        let error = set
            .resize(&backend, Extent::new(9, 9))
            .expect_err("second allocation fails");
        assert!(matches!(error, AllocationError::OutOfMemory { .. }));
        assert!(!set.is_allocated());
        assert!(set.settled().is_none());
        assert!(set.write_target().is_none());

        set.reallocate(&backend).expect("retry succeeds");
        assert!(set.is_allocated());
    }

    #[test]
    fn set_render_cap_reports_changes_only() {
        let backend = HostBackend::new();
        let mut set = FrameBufferSet::new(&backend, Extent::new(100, 100), Extent::new(30, 30), 1)
            .expect("allocate single");
        assert!(!set.set_render_cap(Extent::new(30, 30)));
        assert!(set.set_render_cap(Extent::new(500, 10)));
        assert_eq!(set.render_cap(), Extent::new(100, 10));
        assert_eq!(set.clamp_render_cap(-3, 0), Extent::new(1, 1));
    }
}
