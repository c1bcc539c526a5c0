//! Coordinate conversions between detector input space, original frame
//! space and the tracker's center format.

mod bbox;
mod layout;
mod letterbox;

pub use bbox::{BoundingBox, CenterBox};
pub use layout::to_input_tensor;
pub use letterbox::{DEFAULT_STRIDE, Letterbox, LetterboxInfo, PAD_VALUE};

use crate::integration::Detection;
use crate::tracker::TrackerInput;

/// A detection dropped because its box collapsed after rescaling.
#[derive(Debug, Clone, PartialEq)]
pub struct DegenerateDetection {
    /// Box in detector input space, as produced by inference.
    pub raw: BoundingBox,
    /// Box after rescale, clamp and rounding.
    pub rescaled: BoundingBox,
    pub class_id: u32,
    pub confidence: f32,
}

/// Detections mapped into original frame space.
#[derive(Debug, Clone, Default)]
pub struct Rescaled {
    pub kept: Vec<Detection>,
    pub dropped: Vec<DegenerateDetection>,
}

/// Map detector-space detections back to original frame pixels.
///
/// Boxes are clamped to the frame and rounded. Any box left with zero or
/// negative width or height is dropped and reported.
pub fn rescale_detections(info: &LetterboxInfo, detections: Vec<Detection>) -> Rescaled {
    let mut out = Rescaled::default();
    for det in detections {
        let rescaled = info.rescale(&det.bbox);
        if rescaled.is_degenerate() {
            log::warn!(
                "dropping degenerate detection class={} conf={:.2}: {:?} -> {:?}",
                det.class_id,
                det.confidence,
                det.bbox.to_array(),
                rescaled.to_array()
            );
            out.dropped.push(DegenerateDetection {
                raw: det.bbox,
                rescaled,
                class_id: det.class_id,
                confidence: det.confidence,
            });
        } else {
            out.kept.push(Detection {
                bbox: rescaled,
                ..det
            });
        }
    }
    out
}

/// Convert corner-format detections into the tracker's center format.
pub fn to_tracker_inputs(detections: &[Detection]) -> Vec<TrackerInput> {
    detections
        .iter()
        .map(|d| TrackerInput {
            bbox: d.bbox.to_center(),
            confidence: d.confidence,
            class_id: d.class_id,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::DetectionBuilder;

    #[test]
    fn test_rescale_drops_degenerate_boxes() {
        let info = Letterbox::new(640).unwrap().info(1280, 720);
        let dets = vec![
            DetectionBuilder::new().tlbr(100.0, 200.0, 300.0, 400.0).score(0.9).build(),
            // Entirely inside the top padding band: collapses to y1 == y2 == 0.
            DetectionBuilder::new().tlbr(100.0, 10.0, 300.0, 120.0).score(0.8).build(),
            // Sub-pixel width in original space.
            DetectionBuilder::new().tlbr(50.0, 200.0, 50.1, 300.0).score(0.7).build(),
        ];

        let out = rescale_detections(&info, dets);
        assert_eq!(out.kept.len(), 1);
        assert_eq!(out.kept[0].bbox.to_array(), [200.0, 120.0, 600.0, 520.0]);
        assert_eq!(out.dropped.len(), 2);
        assert!(out.dropped.iter().all(|d| d.rescaled.is_degenerate()));
    }

    #[test]
    fn test_tracker_inputs_are_center_format() {
        let dets = vec![
            DetectionBuilder::new()
                .tlbr(10.0, 10.0, 50.0, 50.0)
                .score(0.9)
                .class(2)
                .build(),
        ];
        let inputs = to_tracker_inputs(&dets);
        assert_eq!(inputs[0].bbox.to_array(), [30.0, 30.0, 40.0, 40.0]);
        assert_eq!(inputs[0].class_id, 2);
        assert_eq!(inputs[0].confidence, 0.9);
    }
}
