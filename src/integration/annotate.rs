//! Drawing tracked boxes, geofence regions and statistics onto a frame.

use image::{ImageBuffer, Rgb};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use ndarray::Array3;

use crate::error::{Error, Result};
use crate::frame::{CHANNELS, Frame};
use crate::geofence::{Geofence, Polygon};
use crate::tracker::{Track, TrackSet};

// Colors are BGR, matching the frame's channel order.
pub const CHECK_REGION_COLOR: [u8; 3] = [0, 255, 0];
pub const ALARM_REGION_COLOR: [u8; 3] = [0, 0, 255];
pub const STATS_COLOR: [u8; 3] = [0, 0, 255];
pub const LABEL_TEXT_COLOR: [u8; 3] = [255, 255, 255];

const BOX_THICKNESS: i32 = 3;
const REGION_THICKNESS: i32 = 2;
const LABEL_CHAR_WIDTH: u32 = 10;
const LABEL_HEIGHT: u32 = 12;
const PALETTE: [u64; 3] = [(1 << 11) - 1, (1 << 15) - 1, (1 << 20) - 1];

type Canvas = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// Text to be rendered by sinks that support it.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub text: String,
    /// Baseline-left position in frame pixels.
    pub origin: (i32, i32),
    pub color: [u8; 3],
    pub scale: u32,
}

/// A frame ready for output.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedFrame {
    pub index: u64,
    /// BGR raster with boxes and regions drawn in.
    pub pixels: Array3<u8>,
    /// Tracks that passed the geofence.
    pub tracks: TrackSet,
    pub overlays: Vec<Overlay>,
}

/// Stable per-identity color.
pub fn color_for_id(id: u64) -> [u8; 3] {
    let l = id % 255;
    let k = (l * l + 255 - l + 1) % 255;
    PALETTE.map(|p| ((p % 255) * k % 255) as u8)
}

/// Draws one cycle's output onto its frame.
#[derive(Debug, Clone, Default)]
pub struct Annotator {
    geofence: Geofence,
}

impl Annotator {
    pub fn new(geofence: Geofence) -> Self {
        Self { geofence }
    }

    pub fn geofence(&self) -> &Geofence {
        &self.geofence
    }

    /// Filter `tracks` through the geofence and draw the survivors.
    ///
    /// `fps` is the running mean frame rate shown in the statistics overlay.
    pub fn annotate(&self, frame: Frame, tracks: &[Track], fps: f64) -> Result<AnnotatedFrame> {
        let index = frame.index();
        let (width, height) = (frame.width() as u32, frame.height() as u32);
        let data: Vec<u8> = frame.pixels().iter().copied().collect();
        let mut canvas = Canvas::from_raw(width, height, data)
            .ok_or_else(|| Error::InvalidFrame(format!("raster does not match {}x{}", width, height)))?;

        if let Geofence::Enabled { check, alarm } = &self.geofence {
            draw_polygon(&mut canvas, check, CHECK_REGION_COLOR);
            draw_polygon(&mut canvas, alarm, ALARM_REGION_COLOR);
        }

        let visible = self.geofence.visible(tracks);
        let mut overlays = Vec::with_capacity(visible.len() + 1);
        for track in &visible {
            overlays.push(draw_track(&mut canvas, track, width, height));
        }

        let scale = (width / 1600).max(1);
        overlays.push(Overlay {
            text: format!("frame: {} fps: {:.2} ", index, fps),
            origin: (20, 20 + scale as i32),
            color: STATS_COLOR,
            scale,
        });

        let pixels = Array3::from_shape_vec(
            (height as usize, width as usize, CHANNELS),
            canvas.into_raw(),
        )
        .map_err(|e| Error::InvalidFrame(e.to_string()))?;

        Ok(AnnotatedFrame {
            index,
            pixels,
            tracks: visible,
            overlays,
        })
    }
}

fn draw_track(canvas: &mut Canvas, track: &Track, width: u32, height: u32) -> Overlay {
    let color = Rgb(color_for_id(track.id));
    let b = track.bbox.clamp_to(width as f32, height as f32).round();
    let (x1, y1) = (b.x1 as i32, b.y1 as i32);
    let overlay = Overlay {
        text: track.id.to_string(),
        origin: (x1, y1 + LABEL_HEIGHT as i32 + 4),
        color: LABEL_TEXT_COLOR,
        scale: 2,
    };
    // Boxes entirely outside the frame (or NaN) collapse here.
    if b.is_degenerate() {
        return overlay;
    }
    let (w, h) = (b.width() as u32, b.height() as u32);

    for t in 0..BOX_THICKNESS {
        let shrink = 2 * t as u32;
        if w > shrink && h > shrink {
            draw_hollow_rect_mut(
                canvas,
                Rect::at(x1 + t, y1 + t).of_size(w - shrink, h - shrink),
                color,
            );
        }
    }

    let header_w = overlay.text.len() as u32 * LABEL_CHAR_WIDTH + 3;
    draw_filled_rect_mut(
        canvas,
        Rect::at(x1, y1).of_size(header_w, LABEL_HEIGHT + 4),
        color,
    );

    overlay
}

fn draw_polygon(canvas: &mut Canvas, polygon: &Polygon, color: [u8; 3]) {
    let vertices = polygon.vertices();
    let n = vertices.len();
    for i in 0..n {
        let (ax, ay) = vertices[i];
        let (bx, by) = vertices[(i + 1) % n];
        for t in 0..REGION_THICKNESS {
            let d = t as f32;
            draw_line_segment_mut(
                canvas,
                (ax as f32 + d, ay as f32),
                (bx as f32 + d, by as f32),
                Rgb(color),
            );
            draw_line_segment_mut(
                canvas,
                (ax as f32, ay as f32 + d),
                (bx as f32, by as f32 + d),
                Rgb(color),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geofence::GeofenceConfig;
    use crate::transform::BoundingBox;

    #[test]
    fn test_color_for_id() {
        // (p * (id^2 - id + 1)) % 255 with p = 2047, 32767, 1048575
        assert_eq!(color_for_id(1), [2047 % 255, 32767 % 255, 1048575 % 255].map(|v| v as u8));
        let id = 7u64;
        let k = id * id - id + 1;
        assert_eq!(
            color_for_id(id),
            [2047 * k % 255, 32767 * k % 255, 1048575 * k % 255].map(|v| v as u8)
        );
        assert_eq!(color_for_id(3), color_for_id(3 + 255));
    }

    #[test]
    fn test_annotate_draws_box_and_stats() {
        let frame = Frame::filled(4, 100, 80, [0, 0, 0]);
        let tracks = vec![Track::new(1, BoundingBox::new(40.0, 30.0, 90.0, 70.0))];
        let out = Annotator::default().annotate(frame, &tracks, 12.5).unwrap();

        assert_eq!(out.index, 4);
        assert_eq!(out.tracks, tracks);
        assert_eq!(out.pixels.dim(), (80, 100, 3));

        // Bottom edge of the box carries the identity color.
        let color = color_for_id(1);
        assert_eq!(out.pixels[[69, 60, 0]], color[0]);
        assert_eq!(out.pixels[[69, 60, 2]], color[2]);
        // Interior untouched.
        assert_eq!(out.pixels[[50, 60, 1]], 0);

        let stats = out.overlays.last().unwrap();
        assert_eq!(stats.text, "frame: 4 fps: 12.50 ");
        assert_eq!(out.overlays[0].text, "1");
    }

    #[test]
    fn test_annotate_filters_by_geofence() {
        let fence = Geofence::new(Some(&GeofenceConfig {
            check: vec![0, 0, 20, 0, 20, 20, 0, 20],
            alarm: vec![60, 0, 80, 0, 80, 20],
        }))
        .unwrap();
        let tracks = vec![
            Track::new(1, BoundingBox::new(2.0, 2.0, 10.0, 10.0)),
            Track::new(2, BoundingBox::new(50.0, 50.0, 70.0, 70.0)),
        ];
        let out = Annotator::new(fence)
            .annotate(Frame::filled(0, 100, 100, [0, 0, 0]), &tracks, 0.0)
            .unwrap();

        assert_eq!(out.tracks.len(), 1);
        assert_eq!(out.tracks[0].id, 1);
        // Excluded track is not drawn.
        assert_eq!(out.pixels[[69, 60, 0]], 0);
        // Check region outline is green.
        assert_eq!(out.pixels[[0, 15, 1]], 255);
    }

    #[test]
    fn test_annotate_clamps_oversized_box() {
        let tracks = vec![Track::new(1, BoundingBox::new(-3e9, -3e9, 3e9, 3e9))];
        let out = Annotator::default()
            .annotate(Frame::filled(0, 64, 64, [0, 0, 0]), &tracks, 1.0)
            .unwrap();

        let color = color_for_id(1);
        // Box outline runs along the frame border.
        assert_eq!(out.pixels[[63, 32, 0]], color[0]);
        assert_eq!(out.pixels[[32, 63, 2]], color[2]);
        assert_eq!(out.overlays[0].origin, (0, LABEL_HEIGHT as i32 + 4));
    }

    #[test]
    fn test_annotate_skips_box_outside_frame() {
        let tracks = vec![
            Track::new(1, BoundingBox::new(200.0, 200.0, 300.0, 300.0)),
            Track::new(2, BoundingBox::new(f32::NAN, 0.0, 10.0, 10.0)),
        ];
        let out = Annotator::default()
            .annotate(Frame::filled(0, 64, 64, [0, 0, 0]), &tracks, 1.0)
            .unwrap();

        assert!(out.pixels.iter().all(|&v| v == 0));
        assert_eq!(out.tracks.len(), 2);
        assert_eq!(out.overlays.len(), 3);
    }
}
