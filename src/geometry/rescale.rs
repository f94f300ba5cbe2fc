//! Letterbox undo: maps boxes from a square padded network input back to
//! the original image frame.

use crate::geometry::{check_positive, Xyxy};
use crate::util::DetPostResult;

/// Rescales corner-form boxes predicted on a `current_dim x current_dim`
/// letterboxed input to an image of `original_shape = (height, width)`.
///
/// The longer side of the original image was scaled to `current_dim` and the
/// shorter side centered with padding; this removes the padding offset
/// (floored to whole pixels) and stretches back to the original size.
pub fn rescale_boxes(
    boxes: &[Xyxy],
    current_dim: f32,
    original_shape: (f32, f32),
) -> DetPostResult<Vec<Xyxy>> {
    let (orig_h, orig_w) = original_shape;
    check_positive("current_dim", current_dim)?;
    check_positive("original_height", orig_h)?;
    check_positive("original_width", orig_w)?;

    let scale = current_dim / orig_h.max(orig_w);
    let pad_x = (orig_h - orig_w).max(0.0) * scale;
    let pad_y = (orig_w - orig_h).max(0.0) * scale;
    let unpad_w = current_dim - pad_x;
    let unpad_h = current_dim - pad_y;
    let off_x = (pad_x / 2.0).floor();
    let off_y = (pad_y / 2.0).floor();

    Ok(boxes
        .iter()
        .map(|b| Xyxy {
            x1: (b.x1 - off_x) / unpad_w * orig_w,
            y1: (b.y1 - off_y) / unpad_h * orig_h,
            x2: (b.x2 - off_x) / unpad_w * orig_w,
            y2: (b.y2 - off_y) / unpad_h * orig_h,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::rescale_boxes;
    use crate::geometry::Xyxy;

    #[test]
    fn square_image_only_scales() {
        let boxes = [Xyxy::new(0.0, 0.0, 208.0, 416.0)];
        let out = rescale_boxes(&boxes, 416.0, (832.0, 832.0)).unwrap();
        assert_eq!(out[0], Xyxy::new(0.0, 0.0, 416.0, 832.0));
    }

    #[test]
    fn wide_image_removes_vertical_padding() {
        // 200x400 (h x w) letterboxed into 416: content is 416x208, 104 rows
        // of padding above and below.
        let boxes = [Xyxy::new(0.0, 104.0, 416.0, 312.0)];
        let out = rescale_boxes(&boxes, 416.0, (200.0, 400.0)).unwrap();
        let b = out[0];
        assert!(b.x1.abs() < 1e-4);
        assert!(b.y1.abs() < 1e-4);
        assert!((b.x2 - 400.0).abs() < 1e-3);
        assert!((b.y2 - 200.0).abs() < 1e-3);
    }

    #[test]
    fn rejects_non_positive_sizes() {
        assert!(rescale_boxes(&[], 0.0, (10.0, 10.0)).is_err());
        assert!(rescale_boxes(&[], 416.0, (10.0, -1.0)).is_err());
    }
}
