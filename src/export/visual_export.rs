use std::path::PathBuf;

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_polygon_mut, draw_hollow_rect_mut};
use imageproc::point::Point as DrawPoint;
use imageproc::rect::Rect;

use crate::core::geometry::BoundingBox;
use crate::core::model::ExtractionResult;
use crate::export::Exporter;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Copy of the source image with every recognized line outlined.
#[derive(Debug, Clone)]
pub struct VisualExporter {
    image_path: PathBuf,
    out_path: PathBuf,
}

impl VisualExporter {
    pub fn new(image_path: PathBuf, out_path: PathBuf) -> Self {
        Self {
            image_path,
            out_path,
        }
    }

    fn draw_box(canvas: &mut RgbImage, bbox: &BoundingBox) {
        let mut points: Vec<DrawPoint<f32>> = bbox
            .points
            .iter()
            .map(|p| DrawPoint::new(p.x as f32, p.y as f32))
            .collect();
        points.dedup();
        if points.len() > 2 && points.first() == points.last() {
            points.pop();
        }

        match points.len() {
            0 | 1 => {}
            2 => {
                let Some((min, max)) = bbox.bounds() else {
                    return;
                };
                let width = (max.x - min.x).round().max(1.0) as u32;
                let height = (max.y - min.y).round().max(1.0) as u32;
                let rect = Rect::at(min.x as i32, min.y as i32).of_size(width, height);
                draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
            }
            _ => draw_hollow_polygon_mut(canvas, &points, BOX_COLOR),
        }
    }
}

impl Exporter for VisualExporter {
    fn export(&self, result: &ExtractionResult) -> Result<()> {
        let mut canvas = image::open(&self.image_path)
            .with_context(|| format!("failed to open image {}", self.image_path.display()))?
            .to_rgb8();

        for line in &result.lines {
            Self::draw_box(&mut canvas, &line.bounding_box);
        }

        canvas
            .save(&self.out_path)
            .with_context(|| format!("failed to save {}", self.out_path.display()))?;
        Ok(())
    }
}
