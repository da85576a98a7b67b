use std::path::{Path, PathBuf};

use render_protocol::Extent;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("frame has {actual} pixels, expected {expected} for its extent")]
    PixelCount { expected: u64, actual: u64 },
    #[error("create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("export queue is full; frame {index} skipped")]
    QueueFull { index: u64 },
    #[error("export worker is gone; frame {index} skipped")]
    WorkerStopped { index: u64 },
    #[error("readback of frame {index} failed: {reason}")]
    Readback { index: u64, reason: String },
}

/// Persists one exported frame. `pixels` are 32-bit float RGBA, row-major
/// and unpadded.
pub trait FrameWriter: Send {
    fn write_frame(
        &mut self,
        output_dir: &Path,
        frame_index: u64,
        pixels: &[[f32; 4]],
        extent: Extent,
    ) -> Result<PathBuf, WriteError>;
}

pub fn frame_path(output_dir: &Path, frame_index: u64) -> PathBuf {
    output_dir.join(format!("{frame_index}.png"))
}

/// Writes `{output_dir}/{index}.png` as 8-bit sRGB.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngFrameWriter;

impl FrameWriter for PngFrameWriter {
    fn write_frame(
        &mut self,
        output_dir: &Path,
        frame_index: u64,
        pixels: &[[f32; 4]],
        extent: Extent,
    ) -> Result<PathBuf, WriteError> {
        let expected = extent.pixel_count();
        if pixels.len() as u64 != expected {
            return Err(WriteError::PixelCount {
                expected,
                actual: pixels.len() as u64,
            });
        }
        std::fs::create_dir_all(output_dir).map_err(|source| WriteError::CreateDir {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let bytes = rgba8_from_linear(pixels);
        let path = frame_path(output_dir, frame_index);
        let image = image::RgbaImage::from_raw(extent.width, extent.height, bytes).ok_or(
            WriteError::PixelCount {
                expected,
                actual: pixels.len() as u64,
            },
        )?;
        image
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|source| WriteError::Encode {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

/// Colour channels are sRGB-encoded, alpha stays linear.
pub fn rgba8_from_linear(pixels: &[[f32; 4]]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(pixels.len() * 4);
    for pixel in pixels {
        bytes.push(unorm8(linear_to_srgb(pixel[0])));
        bytes.push(unorm8(linear_to_srgb(pixel[1])));
        bytes.push(unorm8(linear_to_srgb(pixel[2])));
        bytes.push(unorm8(pixel[3]));
    }
    bytes
}

fn linear_to_srgb(value: f32) -> f32 {
    let value = clamp_unit(value);
    if value <= 0.003_130_8 {
        value * 12.92
    } else {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    }
}

fn unorm8(value: f32) -> u8 {
    (clamp_unit(value) * 255.0).round() as u8
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("recording_{name}_{}", std::process::id()))
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let bytes = rgba8_from_linear(&[[-1.0, 2.0, f32::NAN, 1.5]]);
        assert_eq!(bytes, vec![0, 255, 0, 255]);
    }

    #[test]
    fn midtones_are_srgb_encoded() {
        let bytes = rgba8_from_linear(&[[0.5, 0.0, 1.0, 0.5]]);
        assert_eq!(bytes, vec![188, 0, 255, 128]);
    }

    #[test]
    fn png_writer_names_files_by_index() {
        let dir = scratch_dir("png_writer");
        let pixels = vec![[1.0, 0.0, 0.0, 1.0]; 6];
        let path = PngFrameWriter
            .write_frame(&dir, 7, &pixels, Extent::new(3, 2))
            .expect("write png frame");
        assert_eq!(path, dir.join("7.png"));

        let decoded = image::ImageReader::open(&path)
            .expect("open written frame")
            .decode()
            .expect("decode written frame")
            .to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(2, 1).0, [255, 0, 0, 255]);
        std::fs::remove_dir_all(&dir).expect("remove scratch dir");
    }

    #[test]
    fn mismatched_pixel_count_is_rejected() {
        let dir = scratch_dir("pixel_count");
        let error = PngFrameWriter
            .write_frame(&dir, 0, &[[0.0; 4]; 3], Extent::new(2, 2))
            .expect_err("pixel count mismatch must fail");
        assert!(matches!(
            error,
            WriteError::PixelCount {
                expected: 4,
                actual: 3
            }
        ));
    }
}
