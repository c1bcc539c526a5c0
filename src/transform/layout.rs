//! Channel and axis reordering into the detector's tensor layout.

use ndarray::{Array4, ArrayView3, Axis, s};

/// Convert a BGR height x width x channel raster into a normalized RGB
/// `1 x 3 x H x W` tensor with values in `[0, 1]`.
pub fn to_input_tensor(hwc_bgr: ArrayView3<'_, u8>) -> Array4<f32> {
    let chw_rgb = hwc_bgr.slice(s![.., .., ..;-1]).permuted_axes([2, 0, 1]);
    chw_rgb
        .mapv(|v| f32::from(v) / 255.0)
        .as_standard_layout()
        .into_owned()
        .insert_axis(Axis(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_tensor_shape_and_order() {
        let mut hwc = Array3::<u8>::zeros((2, 3, 3));
        // Pixel (row 1, col 2) is pure blue in BGR.
        hwc[[1, 2, 0]] = 255;
        // Pixel (row 0, col 0) is pure red in BGR.
        hwc[[0, 0, 2]] = 255;

        let t = to_input_tensor(hwc.view());
        assert_eq!(t.dim(), (1, 3, 2, 3));
        assert!(t.is_standard_layout());

        // RGB: channel 0 is red, channel 2 is blue.
        assert_eq!(t[[0, 0, 0, 0]], 1.0);
        assert_eq!(t[[0, 2, 1, 2]], 1.0);
        assert_eq!(t[[0, 0, 1, 2]], 0.0);
    }

    #[test]
    fn test_tensor_normalization() {
        let hwc = Array3::<u8>::from_elem((1, 1, 3), 51);
        let t = to_input_tensor(hwc.view());
        assert!(t.iter().all(|&v| (v - 0.2).abs() < 1e-6));
    }
}
