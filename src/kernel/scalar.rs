//! Scalar reference IoU kernel.

use crate::geometry::Xyxy;
use crate::kernel::IouKernel;

/// Plain loop over [`Xyxy::iou`].
pub struct IouScalar;

impl IouKernel for IouScalar {
    fn iou_into(query: &Xyxy, boxes: &[Xyxy], out: &mut Vec<f32>) {
        out.reserve(boxes.len());
        out.extend(boxes.iter().map(|b| query.iou(b)));
    }
}
