//! CPU implementation of [`RenderBackend`] for driving the core without a GPU.
//!
//! Encoders record closures that run in order on [`RenderBackend::submit`],
//! so a dropped frame leaves every image untouched.

use std::cell::Cell;
use std::sync::{Arc, Mutex, MutexGuard};

use frame_scheduler::accumulate_rgba;
use render_protocol::{Extent, FrameBufferDesc, TileRegion};

use crate::backend::{ReadbackCallback, RenderBackend, SubmitCallback};
use crate::errors::{AllocationError, DispatchError};

#[derive(Debug, Clone)]
pub struct HostImage {
    extent: Extent,
    pixels: Arc<Mutex<Vec<[f32; 4]>>>,
}

impl HostImage {
    pub fn new(extent: Extent) -> Self {
        Self {
            extent,
            pixels: Arc::new(Mutex::new(vec![[0.0; 4]; extent.pixel_count() as usize])),
        }
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn pixels(&self) -> Vec<[f32; 4]> {
        self.lock().clone()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.lock()[(y * self.extent.width + x) as usize]
    }

    pub fn fill_region(&self, region: TileRegion, color: [f32; 4]) {
        let mut pixels = self.lock();
        for y in region.origin_y..region.origin_y + region.height {
            for x in region.origin_x..region.origin_x + region.width {
                pixels[(y * self.extent.width + x) as usize] = color;
            }
        }
    }

    pub fn same_storage(&self, other: &HostImage) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<[f32; 4]>> {
        self.pixels.lock().expect("host image lock poisoned")
    }
}

type HostCommand = Box<dyn FnOnce() + Send + 'static>;

pub struct HostEncoder {
    label: &'static str,
    commands: Vec<HostCommand>,
}

impl HostEncoder {
    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn record(&mut self, command: impl FnOnce() + Send + 'static) {
        self.commands.push(Box::new(command));
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

pub struct HostReadback {
    image: HostImage,
}

#[derive(Debug, Default)]
pub struct HostBackend {
    allocations: Cell<u64>,
    fail_allocation_at: Cell<Option<u64>>,
    submissions: Cell<u64>,
}

impl HostBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocation attempts so far, failed ones included.
    pub fn allocations(&self) -> u64 {
        self.allocations.get()
    }

    /// Makes the allocation attempt numbered `attempt` fail once.
    pub fn fail_allocation_at(&self, attempt: u64) {
        self.fail_allocation_at.set(Some(attempt));
    }

    pub fn submissions(&self) -> u64 {
        self.submissions.get()
    }
}

impl RenderBackend for HostBackend {
    type Image = HostImage;
    type Encoder = HostEncoder;
    type Readback = HostReadback;
    type PresentTarget = HostImage;

    fn allocate_image(&self, desc: &FrameBufferDesc) -> Result<HostImage, AllocationError> {
        let attempt = self.allocations.get() + 1;
        self.allocations.set(attempt);
        if self.fail_allocation_at.get() == Some(attempt) {
            self.fail_allocation_at.set(None);
            return Err(AllocationError::OutOfMemory {
                label: desc.label,
                bytes: desc.byte_len(),
                reason: "injected host allocation failure".to_owned(),
            });
        }
        Ok(HostImage::new(desc.extent))
    }

    fn create_encoder(&self, label: &'static str) -> HostEncoder {
        HostEncoder {
            label,
            commands: Vec::new(),
        }
    }

    fn encode_average(
        &self,
        encoder: &mut HostEncoder,
        settled: &HostImage,
        sample: &HostImage,
        _extent: Extent,
        passes_completed: u32,
    ) -> Result<(), DispatchError> {
        let settled = settled.clone();
        let sample = sample.clone();
        encoder.record(move || {
            let previous = settled.pixels();
            let mut incoming = sample.lock();
            accumulate_rgba(&previous, &mut incoming, passes_completed);
        });
        Ok(())
    }

    fn encode_present(
        &self,
        encoder: &mut HostEncoder,
        source: &HostImage,
        _extent: Extent,
        target: &HostImage,
    ) {
        let source = source.clone();
        let target = target.clone();
        encoder.record(move || {
            let pixels = source.pixels();
            let mut destination = target.lock();
            let len = destination.len().min(pixels.len());
            destination[..len].copy_from_slice(&pixels[..len]);
        });
    }

    fn encode_clear(&self, encoder: &mut HostEncoder, target: &HostImage) {
        let target = target.clone();
        encoder.record(move || target.lock().fill([0.0, 0.0, 0.0, 1.0]));
    }

    fn encode_readback(
        &self,
        _encoder: &mut HostEncoder,
        image: &HostImage,
        _extent: Extent,
    ) -> HostReadback {
        HostReadback {
            image: image.clone(),
        }
    }

    fn submit(
        &self,
        encoder: HostEncoder,
        readback: Option<(HostReadback, ReadbackCallback)>,
        on_complete: SubmitCallback,
    ) {
        for command in encoder.commands {
            command();
        }
        self.submissions.set(self.submissions.get() + 1);
        if let Some((readback, deliver)) = readback {
            deliver(Ok(readback.image.pixels()));
        }
        on_complete();
    }

    fn poll_completions(&self) {}

    fn wait_for_submissions(&self) {}
}
