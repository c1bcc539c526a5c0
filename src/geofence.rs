//! Region-of-interest filtering for tracked boxes.
//!
//! Two polygons are configured: a "check" region and an "alarm" region. A
//! box is visible when its centroid lies inside or on the boundary of either
//! one. Filtering only affects what is drawn and emitted; the tracker still
//! sees every detection.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::tracker::Track;
use crate::transform::BoundingBox;

const EDGE_EPSILON: f64 = 1e-9;

/// Flat `x1, y1, x2, y2, ...` vertex lists for both regions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeofenceConfig {
    pub check: Vec<i32>,
    pub alarm: Vec<i32>,
}

/// A closed polygon with at least three vertices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polygon {
    vertices: Vec<(i32, i32)>,
}

/// Classification of a point against a geofence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    In,
    Out,
}

impl Polygon {
    /// Build a polygon from a flat coordinate list.
    ///
    /// `name` only appears in the error message.
    pub fn from_flat(name: &str, coords: &[i32]) -> Result<Self> {
        if coords.len() < 6 {
            return Err(Error::Configuration(format!(
                "polygon {} needs at least 3 points, got {} coordinates",
                name,
                coords.len()
            )));
        }
        if coords.len() % 2 != 0 {
            return Err(Error::Configuration(format!(
                "polygon {} must list x, y pairs, got {} coordinates",
                name,
                coords.len()
            )));
        }
        Ok(Self {
            vertices: coords.chunks_exact(2).map(|p| (p[0], p[1])).collect(),
        })
    }

    pub fn vertices(&self) -> &[(i32, i32)] {
        &self.vertices
    }

    /// Whether `(x, y)` is inside the polygon or exactly on its boundary.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        let (px, py) = (f64::from(x), f64::from(y));
        let n = self.vertices.len();

        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = (f64::from(self.vertices[i].0), f64::from(self.vertices[i].1));
            let (xj, yj) = (f64::from(self.vertices[j].0), f64::from(self.vertices[j].1));

            if on_segment((px, py), (xj, yj), (xi, yi)) {
                return true;
            }
            if (yi > py) != (yj > py) {
                let x_cross = (xj - xi) * (py - yi) / (yj - yi) + xi;
                if px < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

fn on_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> bool {
    let cross = (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0);
    if cross.abs() > EDGE_EPSILON {
        return false;
    }
    p.0 >= a.0.min(b.0) && p.0 <= a.0.max(b.0) && p.1 >= a.1.min(b.1) && p.1 <= a.1.max(b.1)
}

/// Check and alarm regions, or no filtering at all.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Geofence {
    #[default]
    Disabled,
    Enabled { check: Polygon, alarm: Polygon },
}

impl Geofence {
    pub fn new(config: Option<&GeofenceConfig>) -> Result<Self> {
        match config {
            None => Ok(Geofence::Disabled),
            Some(cfg) => Ok(Geofence::Enabled {
                check: Polygon::from_flat("check", &cfg.check)?,
                alarm: Polygon::from_flat("alarm", &cfg.alarm)?,
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Geofence::Enabled { .. })
    }

    pub fn classify_point(&self, x: f32, y: f32) -> Containment {
        match self {
            Geofence::Disabled => Containment::In,
            Geofence::Enabled { check, alarm } => {
                if check.contains(x, y) || alarm.contains(x, y) {
                    Containment::In
                } else {
                    Containment::Out
                }
            }
        }
    }

    /// Classify a box by its centroid.
    pub fn classify(&self, bbox: &BoundingBox) -> Containment {
        let (cx, cy) = bbox.centroid();
        self.classify_point(cx, cy)
    }

    /// Tracks whose centroid falls inside the geofence, in input order.
    pub fn visible(&self, tracks: &[Track]) -> Vec<Track> {
        tracks
            .iter()
            .filter(|t| self.classify(&t.bbox) == Containment::In)
            .cloned()
            .collect()
    }
}
