//! Detection overlay rendering.
//!
//! Redrawn on every sample: a copy of the frame with a box around each
//! detected face, optionally written out as a JPEG preview. Classification
//! never reads the overlay.

use anyhow::Result;
use image::{DynamicImage, Rgb, RgbImage};
use std::path::Path;

use crate::detector::DetectedFace;

/// Box color matching the blue rectangles the quiz page drew.
const BOX_COLOR: Rgb<u8> = Rgb([66, 133, 244]);
const BOX_BORDER: i32 = 2;

/// Draw detection boxes over a copy of the frame.
pub fn render(frame: &DynamicImage, faces: &[DetectedFace]) -> RgbImage {
    let mut canvas = frame.to_rgb8();

    for face in faces {
        draw_box(
            &mut canvas,
            face.bbox.x,
            face.bbox.y,
            face.bbox.width,
            face.bbox.height,
        );
    }

    canvas
}

/// Write the overlay preview, creating parent directories as needed.
pub fn save_preview(canvas: &RgbImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    canvas.save(path)?;
    Ok(())
}

fn draw_box(canvas: &mut RgbImage, x: i32, y: i32, width: i32, height: i32) {
    for t in 0..BOX_BORDER {
        for dx in 0..width {
            put_pixel(canvas, x + dx, y + t);
            put_pixel(canvas, x + dx, y + height - 1 - t);
        }
        for dy in 0..height {
            put_pixel(canvas, x + t, y + dy);
            put_pixel(canvas, x + width - 1 - t, y + dy);
        }
    }
}

fn put_pixel(canvas: &mut RgbImage, x: i32, y: i32) {
    if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
        canvas.put_pixel(x as u32, y as u32, BOX_COLOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::BoundingBox;

    fn face(x: i32, y: i32, width: i32, height: i32) -> DetectedFace {
        DetectedFace {
            bbox: BoundingBox {
                x,
                y,
                width,
                height,
            },
            confidence: 0.9,
        }
    }

    #[test]
    fn marks_box_borders() {
        let frame = DynamicImage::new_rgb8(64, 48);
        let canvas = render(&frame, &[face(10, 10, 20, 16)]);

        assert_eq!(*canvas.get_pixel(10, 10), BOX_COLOR);
        assert_eq!(*canvas.get_pixel(29, 25), BOX_COLOR);
        // Interior untouched
        assert_eq!(*canvas.get_pixel(20, 18), Rgb([0, 0, 0]));
    }

    #[test]
    fn clips_boxes_at_frame_edges() {
        let frame = DynamicImage::new_rgb8(32, 32);
        // Extends past the right and bottom edges
        let canvas = render(&frame, &[face(20, 20, 40, 40)]);
        assert_eq!(canvas.width(), 32);
        assert_eq!(*canvas.get_pixel(20, 20), BOX_COLOR);
    }

    #[test]
    fn saves_preview_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview").join("latest.jpg");

        let frame = DynamicImage::new_rgb8(64, 48);
        let canvas = render(&frame, &[face(4, 4, 8, 8)]);
        save_preview(&canvas, &path).unwrap();

        assert!(path.exists());
    }
}
