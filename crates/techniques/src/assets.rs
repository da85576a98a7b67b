use std::path::{Path, PathBuf};

use thiserror::Error;

const ASSET_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];
pub const DEFAULT_MAX_ASSET_WIDTH: u32 = 2048;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset {name} not found under {root}")]
    NotFound { name: String, root: PathBuf },
    #[error("asset {path} could not be decoded: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("asset {path} could not be opened: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("asset {name} is empty")]
    Empty { name: String },
}

/// Decoded image: linear RGBA, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 4]>,
}

pub trait AssetLoader {
    fn load_image_asset(&self, name: &str) -> Result<ImageAsset, AssetError>;
}

/// Loads `{root}/{name}.{png,jpg,jpeg}` with the `image` crate and scales
/// anything wider than `max_width` down so it fits a storage binding.
#[derive(Debug, Clone)]
pub struct ImageAssetLoader {
    root: PathBuf,
    max_width: u32,
}

impl ImageAssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_width: DEFAULT_MAX_ASSET_WIDTH,
        }
    }

    pub fn with_max_width(mut self, max_width: u32) -> Self {
        self.max_width = max_width.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        ASSET_EXTENSIONS
            .iter()
            .map(|extension| self.root.join(format!("{name}.{extension}")))
            .find(|path| path.is_file())
    }
}

impl AssetLoader for ImageAssetLoader {
    fn load_image_asset(&self, name: &str) -> Result<ImageAsset, AssetError> {
        let path = self.resolve(name).ok_or_else(|| AssetError::NotFound {
            name: name.to_owned(),
            root: self.root.clone(),
        })?;
        let reader = image::ImageReader::open(&path).map_err(|source| AssetError::Io {
            path: path.clone(),
            source,
        })?;
        let mut decoded = reader.decode().map_err(|source| AssetError::Decode {
            path: path.clone(),
            source,
        })?;
        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(AssetError::Empty {
                name: name.to_owned(),
            });
        }
        if decoded.width() > self.max_width {
            let height = (u64::from(decoded.height()) * u64::from(self.max_width)
                / u64::from(decoded.width()))
            .max(1) as u32;
            decoded = decoded.resize_exact(
                self.max_width,
                height,
                image::imageops::FilterType::Triangle,
            );
        }
        let rgba = decoded.to_rgba32f();
        let pixels = rgba
            .pixels()
            .map(|pixel| {
                let [r, g, b, a] = pixel.0;
                [srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b), a]
            })
            .collect();
        tracing::debug!(
            name,
            path = %path.display(),
            width = rgba.width(),
            height = rgba.height(),
            "image asset loaded"
        );
        Ok(ImageAsset {
            width: rgba.width(),
            height: rgba.height(),
            pixels,
        })
    }
}

pub fn srgb_to_linear(value: f32) -> f32 {
    let value = value.clamp(0.0, 1.0);
    if value <= 0.04045 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset_dir(test: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "techniques_assets_{test}_{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).expect("create asset dir");
        dir
    }

    #[test]
    fn loads_png_as_linear_rgba() {
        let dir = asset_dir("png");
        let image = image::RgbaImage::from_pixel(2, 1, image::Rgba([255, 188, 0, 255]));
        image
            .save_with_format(dir.join("sky.png"), image::ImageFormat::Png)
            .expect("write png");

        let asset = ImageAssetLoader::new(&dir)
            .load_image_asset("sky")
            .expect("load sky");
        assert_eq!((asset.width, asset.height), (2, 1));
        let [r, g, b, a] = asset.pixels[0];
        assert!((r - 1.0).abs() < 1e-6);
        assert!((g - 0.5).abs() < 0.01);
        assert_eq!(b, 0.0);
        assert_eq!(a, 1.0);
    }

    #[test]
    fn wide_assets_are_scaled_to_max_width() {
        let dir = asset_dir("wide");
        let image = image::RgbaImage::from_pixel(8, 4, image::Rgba([10, 20, 30, 255]));
        image
            .save_with_format(dir.join("wide.png"), image::ImageFormat::Png)
            .expect("write png");

        let asset = ImageAssetLoader::new(&dir)
            .with_max_width(4)
            .load_image_asset("wide")
            .expect("load wide");
        assert_eq!((asset.width, asset.height), (4, 2));
        assert_eq!(asset.pixels.len(), 8);
    }

    #[test]
    fn missing_asset_is_reported_by_name() {
        let dir = asset_dir("missing");
        let error = ImageAssetLoader::new(&dir)
            .load_image_asset("nothing_here")
            .expect_err("asset is missing");
        assert!(matches!(error, AssetError::NotFound { ref name, .. } if name == "nothing_here"));
    }

    #[test]
    fn srgb_decoding_hits_the_endpoints() {
        assert_eq!(srgb_to_linear(0.0), 0.0);
        assert!((srgb_to_linear(1.0) - 1.0).abs() < 1e-6);
        assert!((srgb_to_linear(0.5) - 0.214).abs() < 1e-3);
    }
}
