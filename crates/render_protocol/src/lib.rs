use smallvec::SmallVec;

pub const PIXEL_FORMAT_BYTES_RGBA32_FLOAT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn square(side: u32) -> Self {
        Self {
            width: side,
            height: side,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub const fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn min(self, other: Extent) -> Extent {
        Extent {
            width: self.width.min(other.width),
            height: self.height.min(other.height),
        }
    }

    pub fn max(self, other: Extent) -> Extent {
        Extent {
            width: self.width.max(other.width),
            height: self.height.max(other.height),
        }
    }
}

/// Sub-rectangle of the display written by one capped dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TileRegion {
    pub origin_x: u32,
    pub origin_y: u32,
    pub width: u32,
    pub height: u32,
}

impl TileRegion {
    pub const fn full(extent: Extent) -> Self {
        Self {
            origin_x: 0,
            origin_y: 0,
            width: extent.width,
            height: extent.height,
        }
    }

    pub const fn extent(&self) -> Extent {
        Extent {
            width: self.width,
            height: self.height,
        }
    }

    pub const fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.origin_x
            && y >= self.origin_y
            && x - self.origin_x < self.width
            && y - self.origin_y < self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba32Float,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Rgba32Float => PIXEL_FORMAT_BYTES_RGBA32_FLOAT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageClass {
    Private,
    Shared,
    HostVisible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameBufferDesc {
    pub label: &'static str,
    pub extent: Extent,
    pub format: PixelFormat,
    pub storage: StorageClass,
}

impl FrameBufferDesc {
    pub const fn render_target(label: &'static str, extent: Extent) -> Self {
        Self {
            label,
            extent,
            format: PixelFormat::Rgba32Float,
            storage: StorageClass::Private,
        }
    }

    pub const fn byte_len(&self) -> u64 {
        self.extent.pixel_count() * self.format.bytes_per_pixel() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TechniqueId(&'static str);

impl TechniqueId {
    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }

    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for TechniqueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Grid a pass is dispatched over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchExtent {
    /// The current tile region; equals the display for uncapped techniques.
    Tile,
    Display,
    Fixed(Extent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassDescriptor {
    pub label: &'static str,
    pub dispatch: DispatchExtent,
}

impl PassDescriptor {
    pub const fn tile(label: &'static str) -> Self {
        Self {
            label,
            dispatch: DispatchExtent::Tile,
        }
    }

    pub const fn display(label: &'static str) -> Self {
        Self {
            label,
            dispatch: DispatchExtent::Display,
        }
    }
}

pub type PassList = SmallVec<[PassDescriptor; 4]>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechniqueDescriptor {
    pub id: TechniqueId,
    pub name: &'static str,
    pub needs_accumulation: bool,
    pub resolution_capped: bool,
    pub passes: PassList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorError {
    EmptyPassList,
    DuplicatePassLabel { pass_index: usize },
}

impl std::fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DescriptorError::EmptyPassList => write!(f, "technique declares no passes"),
            DescriptorError::DuplicatePassLabel { pass_index } => {
                write!(f, "pass {pass_index} reuses an earlier pass label")
            }
        }
    }
}

impl std::error::Error for DescriptorError {}

impl TechniqueDescriptor {
    pub fn buffer_count(&self) -> u32 {
        if self.needs_accumulation { 2 } else { 1 }
    }

    /// Whether the animation frame advances once per settled image instead of
    /// once per displayed frame.
    pub fn advances_per_settled_image(&self) -> bool {
        self.needs_accumulation || self.resolution_capped
    }

    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.passes.is_empty() {
            return Err(DescriptorError::EmptyPassList);
        }
        for (pass_index, pass) in self.passes.iter().enumerate() {
            if self.passes[..pass_index]
                .iter()
                .any(|earlier| earlier.label == pass.label)
            {
                return Err(DescriptorError::DuplicatePassLabel { pass_index });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn descriptor(passes: PassList) -> TechniqueDescriptor {
        TechniqueDescriptor {
            id: TechniqueId::new("test"),
            name: "Test",
            needs_accumulation: true,
            resolution_capped: false,
            passes,
        }
    }

    #[test]
    fn accumulating_descriptor_requests_buffer_pair() {
        let descriptor = descriptor(smallvec![PassDescriptor::tile("trace")]);
        assert_eq!(descriptor.buffer_count(), 2);
        assert!(descriptor.advances_per_settled_image());
        descriptor.validate().expect("single pass descriptor is valid");
    }

    #[test]
    fn validate_rejects_empty_and_duplicate_pass_lists() {
        assert_eq!(
            descriptor(PassList::new()).validate(),
            Err(DescriptorError::EmptyPassList)
        );
        let duplicated = descriptor(smallvec![
            PassDescriptor::tile("trace"),
            PassDescriptor::tile("shade"),
            PassDescriptor::tile("trace"),
        ]);
        assert_eq!(
            duplicated.validate(),
            Err(DescriptorError::DuplicatePassLabel { pass_index: 2 })
        );
    }

    #[test]
    fn tile_region_contains_is_half_open() {
        let region = TileRegion {
            origin_x: 30,
            origin_y: 60,
            width: 30,
            height: 10,
        };
        assert!(region.contains(30, 60));
        assert!(region.contains(59, 69));
        assert!(!region.contains(60, 69));
        assert!(!region.contains(29, 60));
    }

    #[test]
    fn rgba32_float_buffer_byte_len() {
        let desc = FrameBufferDesc::render_target("test", Extent::new(3, 2));
        assert_eq!(desc.byte_len(), 3 * 2 * 16);
    }
}
