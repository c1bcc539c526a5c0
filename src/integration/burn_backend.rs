//! Burn inference backend for object detection.
//!
//! This module provides a `BurnDetector` that implements `Detector`
//! for running object detection models built with the Burn framework.
//!
//! # Example
//!
//! ```ignore
//! use trackfuse::integration::{BurnDetector, BurnModel, RawDetection};
//! use burn::backend::NdArray;
//!
//! // Implement BurnModel for your detection model
//! struct MyYoloModel { /* ... */ }
//!
//! impl BurnModel<NdArray> for MyYoloModel {
//!     fn forward(&self, input: burn::tensor::Tensor<NdArray, 4>) -> Vec<RawDetection> {
//!         // Run inference
//!     }
//! }
//!
//! let model = MyYoloModel::load("model.bin");
//! let detector = BurnDetector::new(model, Default::default());
//! ```

use burn::prelude::*;
use burn::tensor::Tensor;
use ndarray::ArrayView4;

use super::{Detection, DetectionBuilder, Detector};

/// Error type for Burn detection failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BurnDetectorError {
    /// Input tensor does not match the model's expected shape.
    #[error("invalid input dimensions: expected {expected:?}, got {got:?}")]
    InvalidInputDimensions {
        expected: (usize, usize, usize),
        got: (usize, usize, usize),
    },
    /// Only single-image batches are supported.
    #[error("batch size must be 1, got {0}")]
    BatchSize(usize),
}

/// Raw detection output from the model.
#[derive(Debug, Clone)]
pub struct RawDetection {
    /// Bounding box: [x1, y1, x2, y2] or [cx, cy, w, h] depending on model
    pub bbox: [f32; 4],
    /// Confidence score
    pub score: f32,
    /// Class ID (optional, for multi-class detection)
    pub class_id: Option<u32>,
}

/// Trait for Burn-based detection models.
///
/// Implement this trait for your specific model architecture.
pub trait BurnModel<B: Backend>: Send + Sync {
    /// Run forward pass on the input tensor.
    ///
    /// # Arguments
    /// * `input` - Input tensor of shape [batch, channels, height, width]
    ///
    /// # Returns
    /// Vector of raw detections in input pixel coordinates.
    fn forward(&self, input: Tensor<B, 4>) -> Vec<RawDetection>;

    /// Get the expected input size (channels, height, width).
    fn input_size(&self) -> (usize, usize, usize) {
        (3, 640, 640) // Default YOLO input size
    }

    /// Whether bbox output is in XYWH format (vs TLBR).
    fn bbox_is_xywh(&self) -> bool {
        true // Most YOLO variants use XYWH
    }

    /// Class names indexed by class ID.
    fn class_names(&self) -> &[String] {
        &[]
    }
}

/// Burn-based object detector implementing `Detector`.
pub struct BurnDetector<B: Backend, M: BurnModel<B>> {
    model: M,
    device: B::Device,
}

impl<B: Backend, M: BurnModel<B>> BurnDetector<B, M> {
    /// Create a new Burn detector with the given model and device.
    pub fn new(model: M, device: B::Device) -> Self {
        Self { model, device }
    }

    /// Copy an ndarray input tensor onto the Burn device.
    fn to_device(&self, input: ArrayView4<'_, f32>) -> Result<Tensor<B, 4>, BurnDetectorError> {
        let (batch, channels, height, width) = input.dim();
        if batch != 1 {
            return Err(BurnDetectorError::BatchSize(batch));
        }
        let expected = self.model.input_size();
        if (channels, height, width) != expected {
            return Err(BurnDetectorError::InvalidInputDimensions {
                expected,
                got: (channels, height, width),
            });
        }

        let data: Vec<f32> = input.iter().copied().collect();
        Ok(Tensor::<B, 1>::from_floats(data.as_slice(), &self.device)
            .reshape([1, channels, height, width]))
    }

    /// Convert raw model outputs to Detection objects.
    fn postprocess(&self, raw_detections: Vec<RawDetection>) -> Vec<Detection> {
        raw_detections
            .into_iter()
            .map(|d| {
                let builder = DetectionBuilder::new()
                    .score(d.score)
                    .class(d.class_id.unwrap_or(0));
                if self.model.bbox_is_xywh() {
                    builder
                        .xywh(d.bbox[0], d.bbox[1], d.bbox[2], d.bbox[3])
                        .build()
                } else {
                    builder
                        .tlbr(d.bbox[0], d.bbox[1], d.bbox[2], d.bbox[3])
                        .build()
                }
            })
            .collect()
    }
}

impl<B: Backend, M: BurnModel<B>> Detector for BurnDetector<B, M> {
    type Error = BurnDetectorError;

    fn infer(&mut self, input: ArrayView4<'_, f32>) -> Result<Vec<Detection>, Self::Error> {
        let tensor = self.to_device(input)?;
        let raw_detections = self.model.forward(tensor);
        Ok(self.postprocess(raw_detections))
    }

    fn class_name(&self, class_id: u32) -> Option<&str> {
        self.model
            .class_names()
            .get(class_id as usize)
            .map(String::as_str)
    }
}
