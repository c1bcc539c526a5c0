/// Axis-aligned bounding box in corner format.
///
/// Coordinates are pixels in whichever space the box was produced in:
/// detector input space straight out of inference, original frame space
/// after [`rescale_detections`](crate::transform::rescale_detections).
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct BoundingBox {
    /// Top-left x coordinate
    pub x1: f32,
    /// Top-left y coordinate
    pub y1: f32,
    /// Bottom-right x coordinate
    pub x2: f32,
    /// Bottom-right y coordinate
    pub y2: f32,
}

/// Bounding box in center format: center x, center y, width, height.
///
/// This is the format handed to the tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct CenterBox {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    #[inline]
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Create a box from TLWH format (top-left x, top-left y, width, height).
    #[inline]
    pub fn from_tlwh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x + width,
            y2: y + height,
        }
    }

    /// Convert from center format.
    #[inline]
    pub fn from_center(b: CenterBox) -> Self {
        let hw = b.w / 2.0;
        let hh = b.h / 2.0;
        Self {
            x1: b.cx - hw,
            y1: b.cy - hh,
            x2: b.cx + hw,
            y2: b.cy + hh,
        }
    }

    /// Convert to center format.
    #[inline]
    pub fn to_center(&self) -> CenterBox {
        CenterBox {
            cx: (self.x1 + self.x2) / 2.0,
            cy: (self.y1 + self.y2) / 2.0,
            w: self.x2 - self.x1,
            h: self.y2 - self.y1,
        }
    }

    #[inline]
    pub fn to_array(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Get the center point of the bounding box.
    #[inline]
    pub fn centroid(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Area, or zero for a degenerate box.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// True when the box has zero or negative extent on either axis.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        !(self.x2 > self.x1 && self.y2 > self.y1)
    }

    /// Clamp all corners into `[0, width] x [0, height]`.
    pub fn clamp_to(&self, width: f32, height: f32) -> Self {
        Self {
            x1: self.x1.clamp(0.0, width),
            y1: self.y1.clamp(0.0, height),
            x2: self.x2.clamp(0.0, width),
            y2: self.y2.clamp(0.0, height),
        }
    }

    /// Round every corner to the nearest integer pixel, ties to even.
    pub fn round(&self) -> Self {
        Self {
            x1: self.x1.round_ties_even(),
            y1: self.y1.round_ties_even(),
            x2: self.x2.round_ties_even(),
            y2: self.y2.round_ties_even(),
        }
    }

    /// Calculate Intersection over Union (IoU) with another bounding box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let inter_area = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union_area = self.area() + other.area() - inter_area;

        if union_area > 0.0 {
            inter_area / union_area
        } else {
            0.0
        }
    }
}

impl CenterBox {
    #[inline]
    pub fn new(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self { cx, cy, w, h }
    }

    #[inline]
    pub fn to_corners(&self) -> BoundingBox {
        BoundingBox::from_center(*self)
    }

    #[inline]
    pub fn to_array(&self) -> [f32; 4] {
        [self.cx, self.cy, self.w, self.h]
    }
}

impl From<CenterBox> for BoundingBox {
    fn from(b: CenterBox) -> Self {
        BoundingBox::from_center(b)
    }
}

impl From<BoundingBox> for CenterBox {
    fn from(b: BoundingBox) -> Self {
        b.to_center()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: [f32; 4], b: [f32; 4], tol: f32) {
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() <= tol, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_corner_to_center() {
        let b = BoundingBox::new(10.0, 20.0, 40.0, 60.0);
        assert_eq!(b.to_center().to_array(), [25.0, 40.0, 30.0, 40.0]);
    }

    #[test]
    fn test_center_round_trip() {
        let boxes = [
            CenterBox::new(25.0, 40.0, 30.0, 40.0),
            CenterBox::new(0.5, 0.5, 1.0, 1.0),
            CenterBox::new(1919.0, 1079.0, 3.0, 7.0),
            CenterBox::new(320.25, 100.75, 17.5, 33.5),
        ];
        for c in boxes {
            let back = BoundingBox::from_center(c).to_center();
            assert_close(back.to_array(), c.to_array(), 1.0);
        }
    }

    #[test]
    fn test_corner_round_trip() {
        let b = BoundingBox::new(13.0, 7.0, 101.0, 56.0);
        let back: BoundingBox = CenterBox::from(b).into();
        assert_eq!(back, b);
    }

    #[test]
    fn test_from_tlwh() {
        let b = BoundingBox::from_tlwh(10.0, 20.0, 30.0, 40.0);
        assert_eq!(b.to_array(), [10.0, 20.0, 40.0, 60.0]);
    }

    #[test]
    fn test_degenerate() {
        assert!(BoundingBox::new(5.0, 5.0, 5.0, 9.0).is_degenerate());
        assert!(BoundingBox::new(5.0, 9.0, 8.0, 3.0).is_degenerate());
        assert!(!BoundingBox::new(5.0, 5.0, 6.0, 6.0).is_degenerate());
        assert_eq!(BoundingBox::new(5.0, 9.0, 8.0, 3.0).area(), 0.0);
    }

    #[test]
    fn test_clamp_and_round() {
        let b = BoundingBox::new(-3.2, 4.5, 700.7, 5.5).clamp_to(640.0, 480.0).round();
        assert_eq!(b.to_array(), [0.0, 4.0, 640.0, 6.0]);
    }

    #[test]
    fn test_iou() {
        let a = BoundingBox::from_tlwh(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::from_tlwh(5.0, 5.0, 10.0, 10.0);

        // Intersection 25, union 175
        assert!((a.iou(&b) - 25.0 / 175.0).abs() < 1e-6);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = BoundingBox::from_tlwh(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::from_tlwh(20.0, 20.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);
    }
}
