//! Validated pipeline settings.
//!
//! Parsing command lines or config files happens outside this crate; the
//! structs here derive `Deserialize` so any loader can produce them.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::geofence::{Geofence, GeofenceConfig};
use crate::integration::NmsParams;

const DEFAULT_FRAME_INTERVAL: u32 = 1;
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CONF_THRESHOLD: f32 = 0.5;
const DEFAULT_IOU_THRESHOLD: f32 = 0.5;
const DEFAULT_CLASSES: &[u32] = &[0];

/// Settings consumed by [`FusionPipeline`](crate::FusionPipeline).
///
/// Device selection is not part of this struct: the detector owns its device
/// (for example `BurnDetector::new(model, device)`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run the detector on every `frame_interval`-th frame.
    pub frame_interval: u32,
    /// Square detector input size in pixels.
    pub input_size: u32,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    /// Class IDs to keep. `None` keeps every class.
    pub classes: Option<Vec<u32>>,
    pub agnostic_nms: bool,
    /// Check and alarm regions. `None` disables geofencing.
    pub geofence: Option<GeofenceConfig>,
    /// How long to wait for a frame before reporting a stall.
    pub read_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_interval: DEFAULT_FRAME_INTERVAL,
            input_size: DEFAULT_INPUT_SIZE,
            conf_threshold: DEFAULT_CONF_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            classes: Some(DEFAULT_CLASSES.to_vec()),
            agnostic_nms: false,
            geofence: None,
            read_timeout: None,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.frame_interval == 0 {
            return Err(Error::Configuration(
                "frame interval must be at least 1".into(),
            ));
        }
        if self.input_size == 0 {
            return Err(Error::Configuration("input size must be positive".into()));
        }
        for (name, value) in [
            ("confidence threshold", self.conf_threshold),
            ("IoU threshold", self.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Configuration(format!(
                    "{} {} is outside [0, 1]",
                    name, value
                )));
            }
        }
        if let Some(classes) = &self.classes {
            if classes.is_empty() {
                return Err(Error::Configuration(
                    "class filter is empty; use no filter to keep all classes".into(),
                ));
            }
        }
        Geofence::new(self.geofence.as_ref())?;
        Ok(())
    }

    pub fn nms_params(&self) -> NmsParams {
        NmsParams {
            conf_threshold: self.conf_threshold,
            iou_threshold: self.iou_threshold,
            agnostic: self.agnostic_nms,
            ..NmsParams::default()
        }
    }
}

/// Where annotated output goes. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving `results.bgr`, the annotated raw video stream.
    pub save_path: Option<PathBuf>,
    /// Directory receiving one `NNNN.txt` track file per frame.
    pub save_txt: Option<PathBuf>,
}
