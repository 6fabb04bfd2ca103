//! Draws match boxes and identity labels onto full-resolution frames.

use crate::types::{MatchResult, Region};
use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;
use thiserror::Error;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const BOX_THICKNESS: i32 = 2;
const LABEL_STRIP_HEIGHT: i32 = 35;
const LABEL_TEXT_SIZE: f32 = 24.0;
const LABEL_TEXT_INSET: i32 = 6;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("font unreadable: {0}")]
    Io(#[from] std::io::Error),
    #[error("font invalid: {0}")]
    InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// Box-and-label painter. Without a font the label strip is drawn empty.
#[derive(Clone, Default)]
pub struct Annotator {
    font: Option<FontArc>,
}

impl Annotator {
    pub fn without_text() -> Self {
        Self { font: None }
    }

    /// Load a TrueType/OpenType font for label text.
    pub fn with_font_file(path: impl AsRef<Path>) -> Result<Self, AnnotateError> {
        let bytes = std::fs::read(path.as_ref())?;
        let font = FontArc::try_from_vec(bytes)?;
        Ok(Self { font: Some(font) })
    }

    /// Draw every match onto `image`. Regions partly outside the image are clipped.
    pub fn draw(&self, image: &mut RgbImage, matches: &[MatchResult]) {
        for m in matches {
            self.draw_one(image, &m.region, &m.label);
        }
    }

    fn draw_one(&self, image: &mut RgbImage, region: &Region, label: &str) {
        for inset in 0..BOX_THICKNESS {
            if let Some(rect) = rect_from(
                region.left + inset,
                region.top + inset,
                region.right - inset,
                region.bottom - inset,
            ) {
                draw_hollow_rect_mut(image, rect, BOX_COLOR);
            }
        }

        // Filled strip along the bottom edge of the box, text inside it.
        if let Some(strip) = rect_from(
            region.left,
            region.bottom - LABEL_STRIP_HEIGHT,
            region.right,
            region.bottom,
        ) {
            draw_filled_rect_mut(image, strip, BOX_COLOR);
        }

        if let Some(font) = &self.font {
            let y = region.bottom - LABEL_STRIP_HEIGHT
                + (LABEL_STRIP_HEIGHT - LABEL_TEXT_SIZE as i32) / 2;
            draw_text_mut(
                image,
                TEXT_COLOR,
                region.left + LABEL_TEXT_INSET,
                y,
                PxScale::from(LABEL_TEXT_SIZE),
                font,
                label,
            );
        }
    }
}

/// Rect spanning [left, right) × [top, bottom), `None` if empty.
fn rect_from(left: i32, top: i32, right: i32, bottom: i32) -> Option<Rect> {
    let (w, h) = (right - left, bottom - top);
    (w > 0 && h > 0).then(|| Rect::at(left, top).of_size(w as u32, h as u32))
}
