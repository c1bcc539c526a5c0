//! Aspect-preserving resize to the detector's fixed input size.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb};
use ndarray::Array3;

use crate::error::{Error, Result};
use crate::frame::{CHANNELS, Frame};
use crate::transform::bbox::BoundingBox;

/// Detector input sizes must be a multiple of this.
pub const DEFAULT_STRIDE: u32 = 32;

/// Gray value used for padding.
pub const PAD_VALUE: u8 = 114;

// Pixel type for resize only; channel order is carried through untouched.
type Raster = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// Letterbox resizer for a square detector input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Letterbox {
    size: u32,
}

/// Geometry recorded by one letterbox resize, needed to invert it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxInfo {
    /// Scale applied to the original frame.
    pub gain: f32,
    /// Horizontal padding in detector space (may be fractional).
    pub pad_x: f32,
    /// Vertical padding in detector space (may be fractional).
    pub pad_y: f32,
    /// Size of the resized content before padding.
    pub scaled: (u32, u32),
    /// Integer offset at which the resized content was placed.
    pub offset: (u32, u32),
    /// Original frame size.
    pub source: (u32, u32),
    /// Detector input size.
    pub target: (u32, u32),
}

impl Letterbox {
    /// Letterbox to `size` x `size`, rounding `size` up to a multiple of
    /// [`DEFAULT_STRIDE`].
    pub fn new(size: u32) -> Result<Self> {
        Self::with_stride(size, DEFAULT_STRIDE)
    }

    pub fn with_stride(size: u32, stride: u32) -> Result<Self> {
        if size == 0 || stride == 0 {
            return Err(Error::Configuration(format!(
                "detector input size {} with stride {} is invalid",
                size, stride
            )));
        }
        let rounded = size.div_ceil(stride) * stride;
        if rounded != size {
            log::warn!(
                "input size {} must be a multiple of stride {}, using {}",
                size,
                stride,
                rounded
            );
        }
        Ok(Self { size: rounded })
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Compute the resize geometry for a `width` x `height` frame.
    pub fn info(&self, width: u32, height: u32) -> LetterboxInfo {
        let (w0, h0) = (f64::from(width), f64::from(height));
        let (tw, th) = (f64::from(self.size), f64::from(self.size));
        let gain = (tw / w0).min(th / h0);

        let scaled_w = (w0 * gain).round();
        let scaled_h = (h0 * gain).round();
        let left = ((tw - scaled_w) / 2.0 - 0.1).round().max(0.0);
        let top = ((th - scaled_h) / 2.0 - 0.1).round().max(0.0);

        LetterboxInfo {
            gain: gain as f32,
            pad_x: ((tw - w0 * gain) / 2.0) as f32,
            pad_y: ((th - h0 * gain) / 2.0) as f32,
            scaled: (scaled_w as u32, scaled_h as u32),
            offset: (left as u32, top as u32),
            source: (width, height),
            target: (self.size, self.size),
        }
    }

    /// Resize and pad `frame`, keeping its channel order and HWC layout.
    pub fn apply(&self, frame: &Frame) -> Result<(Array3<u8>, LetterboxInfo)> {
        let info = self.info(frame.width() as u32, frame.height() as u32);
        let data: Vec<u8> = frame.pixels().iter().copied().collect();
        let source = Raster::from_raw(info.source.0, info.source.1, data).ok_or_else(|| {
            Error::InvalidFrame(format!(
                "raster does not match {}x{}",
                info.source.0, info.source.1
            ))
        })?;

        let resized = if info.scaled == info.source {
            source
        } else {
            imageops::resize(&source, info.scaled.0, info.scaled.1, FilterType::Triangle)
        };

        let mut canvas = Raster::from_pixel(
            info.target.0,
            info.target.1,
            Rgb([PAD_VALUE; CHANNELS]),
        );
        imageops::replace(
            &mut canvas,
            &resized,
            i64::from(info.offset.0),
            i64::from(info.offset.1),
        );

        let padded = Array3::from_shape_vec(
            (info.target.1 as usize, info.target.0 as usize, CHANNELS),
            canvas.into_raw(),
        )
        .map_err(|e| Error::InvalidFrame(e.to_string()))?;

        Ok((padded, info))
    }
}

impl LetterboxInfo {
    /// Map a detector-space box to original frame coordinates, unclamped.
    pub fn to_original(&self, b: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            (b.x1 - self.pad_x) / self.gain,
            (b.y1 - self.pad_y) / self.gain,
            (b.x2 - self.pad_x) / self.gain,
            (b.y2 - self.pad_y) / self.gain,
        )
    }

    /// Map an original-frame box into detector space.
    pub fn to_input(&self, b: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            b.x1 * self.gain + self.pad_x,
            b.y1 * self.gain + self.pad_y,
            b.x2 * self.gain + self.pad_x,
            b.y2 * self.gain + self.pad_y,
        )
    }

    /// Map to original coordinates, clamp to the frame and round to pixels.
    pub fn rescale(&self, b: &BoundingBox) -> BoundingBox {
        let (w, h) = self.source;
        self.to_original(b).clamp_to(w as f32, h as f32).round()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_rounding() {
        assert_eq!(Letterbox::new(640).unwrap().size(), 640);
        assert_eq!(Letterbox::new(600).unwrap().size(), 608);
        assert!(Letterbox::new(0).is_err());
    }

    #[test]
    fn test_landscape_geometry() {
        let info = Letterbox::new(640).unwrap().info(1280, 720);
        assert_eq!(info.gain, 0.5);
        assert_eq!(info.scaled, (640, 360));
        assert_eq!(info.offset, (0, 140));
        assert_eq!(info.pad_x, 0.0);
        assert_eq!(info.pad_y, 140.0);
    }

    #[test]
    fn test_portrait_geometry() {
        let info = Letterbox::new(640).unwrap().info(480, 640);
        assert_eq!(info.gain, 1.0);
        assert_eq!(info.scaled, (480, 640));
        assert_eq!(info.offset, (80, 0));
    }

    #[test]
    fn test_apply_pads_shorter_side() {
        let frame = Frame::filled(0, 128, 64, [10, 20, 30]);
        let (padded, info) = Letterbox::new(64).unwrap().apply(&frame).unwrap();

        assert_eq!(padded.dim(), (64, 64, 3));
        assert_eq!(info.offset, (0, 16));
        // Padding rows
        assert_eq!(padded[[0, 0, 0]], PAD_VALUE);
        assert_eq!(padded[[63, 63, 2]], PAD_VALUE);
        // Content keeps channel order
        assert_eq!(padded[[32, 32, 0]], 10);
        assert_eq!(padded[[32, 32, 1]], 20);
        assert_eq!(padded[[32, 32, 2]], 30);
    }

    #[test]
    fn test_apply_same_size_is_identity() {
        let frame = Frame::filled(0, 32, 32, [1, 2, 3]);
        let (padded, _) = Letterbox::new(32).unwrap().apply(&frame).unwrap();
        assert_eq!(padded, frame.into_pixels());
    }

    #[test]
    fn test_rescale_inverse_within_one_pixel() {
        let info = Letterbox::new(640).unwrap().info(1000, 700);
        let boxes = [
            BoundingBox::new(33.3, 120.7, 200.2, 400.9),
            BoundingBox::new(0.0, 96.0, 640.0, 544.0),
            BoundingBox::new(311.5, 250.5, 312.9, 260.1),
        ];
        for b in boxes {
            let back = info.to_input(&info.rescale(&b));
            for (x, y) in back.to_array().iter().zip(b.to_array().iter()) {
                assert!((x - y).abs() <= 1.0, "{:?} -> {:?}", b, back);
            }
        }
    }

    #[test]
    fn test_rescale_clamps_to_frame() {
        let info = Letterbox::new(640).unwrap().info(1280, 720);
        let b = info.rescale(&BoundingBox::new(-10.0, 100.0, 700.0, 600.0));
        assert_eq!(b.to_array(), [0.0, 0.0, 1280.0, 720.0]);
    }
}
