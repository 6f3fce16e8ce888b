//! Axis-aligned bounding boxes in COCO `[x, y, width, height]` convention.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// An axis-aligned box with its top-left corner at `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BBox {
    /// Create a box from its top-left corner and size.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Create a box from a COCO `[x, y, w, h]` slice.
    ///
    /// Fails unless the slice holds exactly four finite values.
    pub fn from_xywh(values: &[f64]) -> Result<Self> {
        if values.len() != 4 {
            return Err(Error::InvalidAnnotation(format!(
                "bbox must have 4 values, got {}",
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidAnnotation(format!(
                "bbox contains non-finite values: {:?}",
                values
            )));
        }
        Ok(Self::new(values[0], values[1], values[2], values[3]))
    }

    /// The box as `[x, y, w, h]`.
    pub fn to_xywh(&self) -> [f64; 4] {
        [self.x, self.y, self.width, self.height]
    }

    /// Corner form `(x1, y1, x2, y2)`.
    pub fn to_corners(&self) -> (f64, f64, f64, f64) {
        (self.x, self.y, self.x + self.width, self.y + self.height)
    }

    /// Box area. Negative extents count as zero.
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Area of the overlap between two boxes.
    pub fn intersection(&self, other: &BBox) -> f64 {
        let (a_x1, a_y1, a_x2, a_y2) = self.to_corners();
        let (b_x1, b_y1, b_x2, b_y2) = other.to_corners();

        let inter_w = (a_x2.min(b_x2) - a_x1.max(b_x1)).max(0.0);
        let inter_h = (a_y2.min(b_y2) - a_y1.max(b_y1)).max(0.0);
        inter_w * inter_h
    }

    /// Intersection over union.
    pub fn iou(&self, other: &BBox) -> f64 {
        let inter = self.intersection(other);
        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }

    /// Overlap of a detection (`self`) with a crowd region.
    ///
    /// The union is replaced by the detection's own area, so a detection lying
    /// entirely inside the crowd scores 1.
    pub fn crowd_iou(&self, crowd: &BBox) -> f64 {
        let area = self.area();
        if area > 0.0 {
            self.intersection(crowd) / area
        } else {
            0.0
        }
    }
}

impl Serialize for BBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_xywh().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BBox {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let values = Vec::<f64>::deserialize(deserializer)?;
        BBox::from_xywh(&values).map_err(serde::de::Error::custom)
    }
}
