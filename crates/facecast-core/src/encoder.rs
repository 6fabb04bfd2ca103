//! JPEG encoding and `multipart/x-mixed-replace` framing for the live stream.

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use thiserror::Error;

/// Multipart boundary token shared by the response header and every part.
pub const BOUNDARY: &str = "frame";
pub const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Largest edge a baseline JPEG can describe.
const JPEG_MAX_DIMENSION: u32 = u16::MAX as u32;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("cannot encode a {width}x{height} frame")]
    Unrepresentable { width: u32, height: u32 },
    #[error("jpeg: {0}")]
    Jpeg(#[from] image::ImageError),
}

/// Compress a frame to JPEG at the given quality (1–100).
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || width > JPEG_MAX_DIMENSION || height > JPEG_MAX_DIMENSION {
        return Err(EncodeError::Unrepresentable { width, height });
    }
    let mut buf = Vec::with_capacity(width as usize * height as usize / 4);
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(image)?;
    Ok(buf)
}

/// Wrap one JPEG payload as a multipart part:
/// `--frame\r\nContent-Type: image/jpeg\r\n\r\n<jpeg>\r\n`.
pub fn multipart_chunk(jpeg: &[u8]) -> Vec<u8> {
    let head = format!("--{BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n");
    let mut chunk = Vec::with_capacity(head.len() + jpeg.len() + 2);
    chunk.extend_from_slice(head.as_bytes());
    chunk.extend_from_slice(jpeg);
    chunk.extend_from_slice(b"\r\n");
    chunk
}

/// Frame → ready-to-send multipart part.
#[derive(Debug, Clone, Copy)]
pub struct StreamEncoder {
    quality: u8,
}

impl StreamEncoder {
    pub fn new(quality: u8) -> Self {
        Self { quality }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn encode_chunk(&self, image: &RgbImage) -> Result<Vec<u8>, EncodeError> {
        Ok(multipart_chunk(&encode_jpeg(image, self.quality)?))
    }
}

impl Default for StreamEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}
