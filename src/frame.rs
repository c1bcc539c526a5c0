//! Video frame raster owned by the pipeline for one cycle.

use ndarray::{Array3, ArrayView3};

use crate::error::{Error, Result};

/// Number of interleaved channels a frame carries (BGR).
pub const CHANNELS: usize = 3;

/// A single captured frame.
///
/// Pixels are stored height x width x channel in the capture's native BGR
/// order. The index is assigned by the pipeline and increases by one per
/// acquired frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    index: u64,
    pixels: Array3<u8>,
}

impl Frame {
    /// Wrap a raster, rejecting anything that is not a non-empty 3-channel image.
    pub fn new(index: u64, pixels: Array3<u8>) -> Result<Self> {
        let (height, width, channels) = pixels.dim();
        if channels != CHANNELS {
            return Err(Error::InvalidFrame(format!(
                "expected {} channels, got {}",
                CHANNELS, channels
            )));
        }
        if height == 0 || width == 0 {
            return Err(Error::InvalidFrame(format!(
                "empty raster {}x{}",
                width, height
            )));
        }
        Ok(Self { index, pixels })
    }

    /// Create a frame filled with a single BGR color.
    pub fn filled(index: u64, width: usize, height: usize, bgr: [u8; 3]) -> Self {
        let pixels = Array3::from_shape_fn((height, width, CHANNELS), |(_, _, c)| bgr[c]);
        Self { index, pixels }
    }

    #[inline]
    pub fn index(&self) -> u64 {
        self.index
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn pixels(&self) -> ArrayView3<'_, u8> {
        self.pixels.view()
    }

    pub fn into_pixels(self) -> Array3<u8> {
        self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_dimensions() {
        let frame = Frame::filled(7, 40, 30, [1, 2, 3]);
        assert_eq!(frame.index(), 7);
        assert_eq!(frame.width(), 40);
        assert_eq!(frame.height(), 30);
        assert_eq!(frame.pixels()[[29, 39, 2]], 3);
    }

    #[test]
    fn test_frame_rejects_wrong_channels() {
        let err = Frame::new(0, Array3::zeros((4, 4, 4))).unwrap_err();
        assert!(matches!(err, Error::InvalidFrame(_)));
    }

    #[test]
    fn test_frame_rejects_empty_raster() {
        assert!(Frame::new(0, Array3::zeros((0, 4, 3))).is_err());
    }
}
