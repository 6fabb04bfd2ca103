//! Frame type and pixel conversion (YUYV/RGB3/MJPG to packed RGB8) plus downscaling.

use image::imageops::{self, FilterType};
use image::RgbImage;
use std::time::Instant;

/// A captured camera frame: packed RGB8, row-major.
///
/// Frames move from stage to stage; nothing in the pipeline keeps a second
/// reference to a frame it has handed on.
#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
    pub timestamp: Instant,
    pub sequence: u32,
}

impl Frame {
    /// Wrap raw RGB8 bytes. Fails if `data` is not exactly `width * height * 3` long.
    pub fn from_rgb(
        data: Vec<u8>,
        width: u32,
        height: u32,
        sequence: u32,
    ) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * 3;
        let actual = data.len();
        let image = RgbImage::from_raw(width, height, data)
            .filter(|_| actual == expected)
            .ok_or(FrameError::InvalidLength { expected, actual })?;
        Ok(Self::from_image(image, sequence))
    }

    pub fn from_image(image: RgbImage, sequence: u32) -> Self {
        Self {
            image,
            timestamp: Instant::now(),
            sequence,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    /// Resample by `factor` along both axes (bilinear). Never yields a zero-sized frame.
    pub fn downscaled(&self, factor: f32) -> RgbImage {
        let w = ((self.width() as f32 * factor).round() as u32).max(1);
        let h = ((self.height() as f32 * factor).round() as u32).max(1);
        imageops::resize(&self.image, w, h, FilterType::Triangle)
    }

    /// Average luma (0.0–255.0), BT.601 weights.
    pub fn avg_brightness(&self) -> f32 {
        let n = self.image.pixels().len();
        if n == 0 {
            return 0.0;
        }
        let sum: f32 = self
            .image
            .pixels()
            .map(|p| 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32)
            .sum();
        sum / n as f32
    }
}

/// Convert packed YUYV (4:2:2) to RGB8.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share U/V.
/// Conversion uses the BT.601 limited-range coefficients.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = width as usize * height as usize * 2;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for quad in yuyv[..expected].chunks_exact(4) {
        let u = quad[1] as f32 - 128.0;
        let v = quad[3] as f32 - 128.0;
        for y in [quad[0], quad[2]] {
            let c = 1.164 * (y as f32 - 16.0);
            rgb.push(clamp_u8(c + 1.596 * v));
            rgb.push(clamp_u8(c - 0.392 * u - 0.813 * v));
            rgb.push(clamp_u8(c + 2.017 * u));
        }
    }
    Ok(rgb)
}

/// Decode one MJPG payload into RGB8 and check it against the negotiated size.
pub fn mjpg_to_rgb(jpeg: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let decoded = image::load_from_memory_with_format(jpeg, image::ImageFormat::Jpeg)
        .map_err(|e| FrameError::Decode(e.to_string()))?
        .to_rgb8();
    if decoded.dimensions() != (width, height) {
        return Err(FrameError::SizeMismatch {
            expected: (width, height),
            actual: decoded.dimensions(),
        });
    }
    Ok(decoded.into_raw())
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("MJPG decode failed: {0}")]
    Decode(String),
    #[error("decoded frame is {actual:?}, negotiated {expected:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_to_rgb_neutral_chroma() {
        // 2x1 image, U=V=128 → grey pixels
        let yuyv = vec![16, 128, 235, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb, vec![0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn test_yuyv_to_rgb_length() {
        let yuyv = vec![128u8; 4 * 2 * 2];
        let rgb = yuyv_to_rgb(&yuyv, 4, 2).unwrap();
        assert_eq!(rgb.len(), 4 * 2 * 3);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let yuyv = vec![100, 128]; // too short for 2x1
        assert!(matches!(
            yuyv_to_rgb(&yuyv, 2, 1),
            Err(FrameError::InvalidLength {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_from_rgb_rejects_short_buffer() {
        assert!(Frame::from_rgb(vec![0; 5], 2, 1, 0).is_err());
        assert!(Frame::from_rgb(vec![0; 6], 2, 1, 0).is_ok());
    }

    #[test]
    fn test_from_rgb_rejects_long_buffer() {
        assert!(Frame::from_rgb(vec![0; 9], 2, 1, 0).is_err());
    }

    #[test]
    fn test_downscaled_quarter() {
        let frame = Frame::from_rgb(vec![90; 640 * 480 * 3], 640, 480, 0).unwrap();
        let small = frame.downscaled(0.25);
        assert_eq!(small.dimensions(), (160, 120));
        assert!(small.pixels().all(|p| p.0 == [90, 90, 90]));
    }

    #[test]
    fn test_downscaled_never_empty() {
        let frame = Frame::from_rgb(vec![0; 3 * 2 * 2], 2, 2, 0).unwrap();
        assert_eq!(frame.downscaled(0.1).dimensions(), (1, 1));
    }

    #[test]
    fn test_mjpg_roundtrip_size_check() {
        let img = RgbImage::from_pixel(8, 8, image::Rgb([200, 10, 10]));
        let mut jpeg = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .unwrap();
        assert_eq!(mjpg_to_rgb(&jpeg, 8, 8).unwrap().len(), 8 * 8 * 3);
        assert!(matches!(
            mjpg_to_rgb(&jpeg, 16, 16),
            Err(FrameError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_avg_brightness_white() {
        let frame = Frame::from_rgb(vec![255; 12], 2, 2, 0).unwrap();
        assert!((frame.avg_brightness() - 255.0).abs() < 0.01);
    }
}
