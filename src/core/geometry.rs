use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(point: Point) -> Self {
        [point.x, point.y]
    }
}

/// Text region as reported by the OCR engine: either a polygon (usually four
/// corners) or two opposite corners of an axis-aligned rectangle.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct BoundingBox {
    pub points: Vec<Point>,
}

impl BoundingBox {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Coerces whatever box representation the engine emitted into points.
    ///
    /// Accepts nested point lists (`[[x, y], ...]`) and flat coordinate lists
    /// of even length (`[x0, y0, x1, y1]`). Anything else yields an empty box.
    pub fn from_value(value: &Value) -> Self {
        let Some(items) = value.as_array() else {
            return Self::empty();
        };

        if items.iter().all(Value::is_array) {
            let points: Option<Vec<Point>> = items.iter().map(point_from_value).collect();
            return points.map(Self::new).unwrap_or_default();
        }

        if items.len() % 2 != 0 {
            return Self::empty();
        }
        let coords: Option<Vec<f64>> = items.iter().map(Value::as_f64).collect();
        match coords {
            Some(coords) => Self::new(
                coords
                    .chunks_exact(2)
                    .map(|pair| Point::new(pair[0], pair[1]))
                    .collect(),
            ),
            None => Self::empty(),
        }
    }

    /// Axis-aligned bounds as (min corner, max corner).
    pub fn bounds(&self) -> Option<(Point, Point)> {
        let first = self.points.first()?;
        let mut min = *first;
        let mut max = *first;
        for p in &self.points[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some((min, max))
    }

    pub fn center(&self) -> Option<Point> {
        if self.points.is_empty() {
            return None;
        }
        let n = self.points.len() as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Point::new(sx / n, sy / n))
    }
}

fn point_from_value(value: &Value) -> Option<Point> {
    match value.as_array()?.as_slice() {
        [x, y] => Some(Point::new(x.as_f64()?, y.as_f64()?)),
        _ => None,
    }
}
