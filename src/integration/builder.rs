//! Builder for creating Detection objects from various input formats.

use crate::integration::Detection;
use crate::transform::{BoundingBox, CenterBox};

/// Builder for creating `Detection` objects from various box formats.
#[derive(Debug, Clone, Default)]
pub struct DetectionBuilder {
    bbox: BoundingBox,
    class_id: u32,
    score: f32,
}

impl DetectionBuilder {
    /// Create a new detection builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bounding box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.bbox = BoundingBox::new(x1, y1, x2, y2);
        self
    }

    /// Set bounding box in XYWH format (center_x, center_y, width, height).
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.bbox = CenterBox::new(cx, cy, w, h).to_corners();
        self
    }

    /// Set bounding box in TLWH format (left, top, width, height).
    pub fn tlwh(mut self, l: f32, t: f32, w: f32, h: f32) -> Self {
        self.bbox = BoundingBox::from_tlwh(l, t, w, h);
        self
    }

    pub fn class(mut self, class_id: u32) -> Self {
        self.class_id = class_id;
        self
    }

    /// Set the confidence score.
    pub fn score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    /// Build the final `Detection`.
    pub fn build(self) -> Detection {
        Detection {
            bbox: self.bbox,
            class_id: self.class_id,
            confidence: self.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_builder() {
        let det = DetectionBuilder::new()
            .tlbr(10.0, 20.0, 50.0, 80.0)
            .score(0.95)
            .class(3)
            .build();

        assert_eq!(det.confidence, 0.95);
        assert_eq!(det.class_id, 3);
        assert_eq!(det.bbox.to_array(), [10.0, 20.0, 50.0, 80.0]);
    }

    #[test]
    fn test_builder_formats_agree() {
        let a = DetectionBuilder::new().xywh(30.0, 50.0, 40.0, 60.0).build();
        let b = DetectionBuilder::new().tlwh(10.0, 20.0, 40.0, 60.0).build();
        assert_eq!(a.bbox, b.bbox);
    }
}
