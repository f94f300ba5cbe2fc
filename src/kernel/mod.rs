//! Batched IoU kernels.
//!
//! The NMS merge loop and per-image matching both score one box against a
//! list of candidates. Kernels implement that row operation; the default
//! kernel is picked at compile time and every kernel must produce results
//! bit-identical to [`IouScalar`].

use crate::geometry::Xyxy;

/// Kernel trait for one-against-many IoU evaluation.
pub trait IouKernel {
    /// Appends `iou(query, b)` for each `b` in `boxes` to `out`.
    fn iou_into(query: &Xyxy, boxes: &[Xyxy], out: &mut Vec<f32>);
}

pub mod scalar;

#[cfg(feature = "simd")]
pub mod simd;

pub use scalar::IouScalar;

#[cfg(feature = "simd")]
pub use simd::IouSimd;

#[cfg(not(feature = "simd"))]
pub(crate) type DefaultIou = IouScalar;
#[cfg(feature = "simd")]
pub(crate) type DefaultIou = IouSimd;
