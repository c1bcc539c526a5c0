//! Trait for object detection inference backends.

use ndarray::ArrayView4;

use crate::error::BoxError;
use crate::transform::BoundingBox;

/// Upper bound on detections kept after suppression.
pub const MAX_DETECTIONS: usize = 300;

/// A single object proposal.
///
/// Straight out of [`Detector::infer`] the box is in detector input space;
/// after rescaling it is in original frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: u32,
    pub confidence: f32,
}

/// Thresholds for confidence filtering and non-max suppression.
#[derive(Debug, Clone, PartialEq)]
pub struct NmsParams {
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    /// Suppress across classes instead of per class.
    pub agnostic: bool,
    pub max_detections: usize,
}

impl Default for NmsParams {
    fn default() -> Self {
        Self {
            conf_threshold: 0.5,
            iou_threshold: 0.5,
            agnostic: false,
            max_detections: MAX_DETECTIONS,
        }
    }
}

/// Trait for object detection inference backends.
///
/// Implement this trait to connect any detection model to the pipeline.
/// Implementations keep only their loaded weights between calls.
///
/// # Example
///
/// ```ignore
/// use ndarray::ArrayView4;
/// use trackfuse::{Detection, Detector};
///
/// struct MyDetector {
///     // Your model here
/// }
///
/// impl Detector for MyDetector {
///     type Error = std::io::Error;
///
///     fn infer(&mut self, input: ArrayView4<'_, f32>) -> Result<Vec<Detection>, Self::Error> {
///         // Run inference and return detections in input-tensor pixels
///         Ok(vec![])
///     }
/// }
/// ```
pub trait Detector {
    /// Error type for detection failures.
    type Error: Into<BoxError>;

    /// Run inference on a letterboxed `1 x 3 x H x W` RGB tensor in `[0, 1]`.
    ///
    /// # Returns
    /// Candidate detections with boxes in input-tensor pixel coordinates.
    fn infer(&mut self, input: ArrayView4<'_, f32>) -> Result<Vec<Detection>, Self::Error>;

    /// Remove low-confidence and overlapping duplicate detections.
    ///
    /// Override this to use a backend-specific implementation.
    fn non_max_suppression(&self, detections: Vec<Detection>, params: &NmsParams) -> Vec<Detection> {
        non_max_suppression(detections, params)
    }

    /// Human-readable name for a class, used in logs.
    fn class_name(&self, _class_id: u32) -> Option<&str> {
        None
    }
}

/// Keep only detections whose class is in `classes`. `None` keeps all.
pub fn filter_classes(detections: Vec<Detection>, classes: Option<&[u32]>) -> Vec<Detection> {
    match classes {
        None => detections,
        Some(keep) => detections
            .into_iter()
            .filter(|d| keep.contains(&d.class_id))
            .collect(),
    }
}

/// Greedy IoU suppression, highest confidence first.
pub fn non_max_suppression(mut detections: Vec<Detection>, params: &NmsParams) -> Vec<Detection> {
    detections.retain(|d| d.confidence >= params.conf_threshold);
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for det in detections {
        if kept.len() >= params.max_detections {
            break;
        }
        let suppressed = kept.iter().any(|k| {
            (params.agnostic || k.class_id == det.class_id)
                && k.bbox.iou(&det.bbox) > params.iou_threshold
        });
        if !suppressed {
            kept.push(det);
        }
    }
    kept
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    type Error = D::Error;

    fn infer(&mut self, input: ArrayView4<'_, f32>) -> Result<Vec<Detection>, Self::Error> {
        (**self).infer(input)
    }

    fn non_max_suppression(&self, detections: Vec<Detection>, params: &NmsParams) -> Vec<Detection> {
        (**self).non_max_suppression(detections, params)
    }

    fn class_name(&self, class_id: u32) -> Option<&str> {
        (**self).class_name(class_id)
    }
}
