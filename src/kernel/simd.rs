//! SIMD IoU kernel using the `wide` crate.
//!
//! Eight candidate boxes are transposed into lane registers per step; the
//! arithmetic mirrors [`Xyxy::iou`] operation for operation so the results
//! match the scalar kernel exactly.

use crate::geometry::Xyxy;
use crate::kernel::IouKernel;
use crate::util::EPS;
use wide::f32x8;

const LANES: usize = 8;

/// Lane-parallel IoU over chunks of eight boxes.
pub struct IouSimd;

#[inline]
fn gather(chunk: &[Xyxy], pick: impl Fn(&Xyxy) -> f32) -> f32x8 {
    f32x8::from([
        pick(&chunk[0]),
        pick(&chunk[1]),
        pick(&chunk[2]),
        pick(&chunk[3]),
        pick(&chunk[4]),
        pick(&chunk[5]),
        pick(&chunk[6]),
        pick(&chunk[7]),
    ])
}

impl IouKernel for IouSimd {
    fn iou_into(query: &Xyxy, boxes: &[Xyxy], out: &mut Vec<f32>) {
        out.reserve(boxes.len());

        let one = f32x8::splat(1.0);
        let zero = f32x8::ZERO;
        let eps = f32x8::splat(EPS);
        let qx1 = f32x8::splat(query.x1);
        let qy1 = f32x8::splat(query.y1);
        let qx2 = f32x8::splat(query.x2);
        let qy2 = f32x8::splat(query.y2);
        let q_area = f32x8::splat(query.area());

        let mut chunks = boxes.chunks_exact(LANES);
        for chunk in chunks.by_ref() {
            let bx1 = gather(chunk, |b| b.x1);
            let by1 = gather(chunk, |b| b.y1);
            let bx2 = gather(chunk, |b| b.x2);
            let by2 = gather(chunk, |b| b.y2);

            let ix1 = qx1.max(bx1);
            let iy1 = qy1.max(by1);
            let ix2 = qx2.min(bx2);
            let iy2 = qy2.min(by2);
            let inter = (ix2 - ix1 + one).max(zero) * (iy2 - iy1 + one).max(zero);
            let b_area = (bx2 - bx1 + one) * (by2 - by1 + one);
            let iou = inter / (q_area + b_area - inter + eps);
            out.extend_from_slice(&iou.to_array());
        }

        out.extend(chunks.remainder().iter().map(|b| query.iou(b)));
    }
}

#[cfg(test)]
mod tests {
    use super::IouSimd;
    use crate::geometry::Xyxy;
    use crate::kernel::{IouKernel, IouScalar};

    #[test]
    fn simd_matches_scalar_bitwise() {
        let query = Xyxy::new(10.0, 12.0, 40.0, 50.0);
        let boxes: Vec<Xyxy> = (0..19)
            .map(|i| {
                let o = i as f32 * 3.5;
                Xyxy::new(o, o * 0.5, o + 25.0, o * 0.5 + 30.0)
            })
            .collect();
        let mut a = Vec::new();
        let mut b = Vec::new();
        IouScalar::iou_into(&query, &boxes, &mut a);
        IouSimd::iou_into(&query, &boxes, &mut b);
        assert_eq!(a.len(), boxes.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }
}
