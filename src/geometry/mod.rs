//! Box geometry: coordinate conventions and overlap measures.
//!
//! Boxes use the inclusive pixel convention of the darknet family: a box
//! spanning `x1..=x2` covers `x2 - x1 + 1` pixels, so a box with `x1 == x2`
//! still has unit width. Every area and intersection below follows that
//! rule, and every ratio carries an [`EPS`] guard on its denominator.

use crate::kernel::{DefaultIou, IouKernel};
use crate::util::{DetPostError, DetPostResult, EPS};

mod rescale;

pub use rescale::rescale_boxes;

/// Box in corner form `(x1, y1, x2, y2)`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Xyxy {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Xyxy {
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub const fn from_array(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }

    pub const fn to_array(self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Area under the inclusive pixel convention.
    #[inline]
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1 + 1.0) * (self.y2 - self.y1 + 1.0)
    }

    pub fn to_xywh(self) -> Xywh {
        Xywh {
            cx: (self.x1 + self.x2) / 2.0,
            cy: (self.y1 + self.y2) / 2.0,
            w: self.x2 - self.x1,
            h: self.y2 - self.y1,
        }
    }

    /// Intersection-over-union with another corner-form box.
    #[inline]
    pub fn iou(&self, other: &Xyxy) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1 + 1.0).max(0.0) * (iy2 - iy1 + 1.0).max(0.0);
        inter / (self.area() + other.area() - inter + EPS)
    }
}

/// Box in center-size form `(cx, cy, w, h)`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Xywh {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

impl Xywh {
    pub const fn new(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self { cx, cy, w, h }
    }

    pub const fn from_array(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }

    pub const fn to_array(self) -> [f32; 4] {
        [self.cx, self.cy, self.w, self.h]
    }

    #[inline]
    pub fn to_xyxy(self) -> Xyxy {
        Xyxy {
            x1: self.cx - self.w / 2.0,
            y1: self.cy - self.h / 2.0,
            x2: self.cx + self.w / 2.0,
            y2: self.cy + self.h / 2.0,
        }
    }

    /// Scales every component by `factor`.
    pub fn scale(self, factor: f32) -> Self {
        Self::new(
            self.cx * factor,
            self.cy * factor,
            self.w * factor,
            self.h * factor,
        )
    }
}

impl From<Xywh> for Xyxy {
    fn from(value: Xywh) -> Self {
        value.to_xyxy()
    }
}

impl From<Xyxy> for Xywh {
    fn from(value: Xyxy) -> Self {
        value.to_xywh()
    }
}

/// Coordinate convention of a raw `[f32; 4]` box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BoxFormat {
    /// Corners `(x1, y1, x2, y2)`.
    #[default]
    Xyxy,
    /// Center and size `(cx, cy, w, h)`.
    Xywh,
}

impl BoxFormat {
    /// Interprets `raw` in this convention and returns it in corner form.
    #[inline]
    pub fn to_xyxy(self, raw: [f32; 4]) -> Xyxy {
        match self {
            BoxFormat::Xyxy => Xyxy::from_array(raw),
            BoxFormat::Xywh => Xywh::from_array(raw).to_xyxy(),
        }
    }
}

/// Pairwise IoU of two raw boxes sharing one convention.
///
/// The result lies in `[0, 1]`: boxes separated by at least one pixel
/// score exactly zero, identical non-degenerate boxes score one.
pub fn iou(a: [f32; 4], b: [f32; 4], format: BoxFormat) -> f32 {
    format.to_xyxy(a).iou(&format.to_xyxy(b))
}

/// IoU of `query` against each entry of `boxes`, in order.
pub fn iou_batch(query: [f32; 4], boxes: &[[f32; 4]], format: BoxFormat) -> Vec<f32> {
    let query = format.to_xyxy(query);
    let boxes: Vec<Xyxy> = boxes.iter().map(|&b| format.to_xyxy(b)).collect();
    let mut out = Vec::with_capacity(boxes.len());
    <DefaultIou as IouKernel>::iou_into(&query, &boxes, &mut out);
    out
}

/// Shape-only IoU of two `(width, height)` pairs, as if both boxes shared
/// a center. Used for anchor selection, never for spatial overlap.
#[inline]
pub fn iou_wh(a: (f32, f32), b: (f32, f32)) -> f32 {
    let (w1, h1) = a;
    let (w2, h2) = b;
    let inter = w1.min(w2) * h1.min(h2);
    let union = (w1 * h1 + EPS) + w2 * h2 - inter;
    inter / union
}

/// Converts a buffer of center-size boxes into a new corner-form buffer.
pub fn xywh_to_xyxy(boxes: &[[f32; 4]]) -> Vec<[f32; 4]> {
    boxes
        .iter()
        .map(|&b| Xywh::from_array(b).to_xyxy().to_array())
        .collect()
}

pub(crate) fn check_positive(param: &'static str, value: f32) -> DetPostResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DetPostError::InvalidConfig {
            param,
            value,
            reason: "must be positive and finite",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let b = [10.0, 20.0, 50.0, 60.0];
        assert_eq!(iou(b, b, BoxFormat::Xyxy), 1.0);
    }

    #[test]
    fn iou_uses_inclusive_pixel_areas() {
        // 11x11 boxes overlapping in a 6x11 strip.
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [5.0, 0.0, 15.0, 10.0];
        let expected = 66.0 / (121.0 + 121.0 - 66.0);
        assert!((iou(a, b, BoxFormat::Xyxy) - expected).abs() < 1e-6);
    }

    #[test]
    fn iou_of_degenerate_points_is_finite() {
        let p = [3.0, 3.0, 3.0, 3.0];
        assert_eq!(iou(p, p, BoxFormat::Xyxy), 1.0);
        let q = [5.0, 5.0, 5.0, 5.0];
        assert_eq!(iou(p, q, BoxFormat::Xyxy), 0.0);
    }

    #[test]
    fn center_size_convention_converts_first() {
        let corners = [0.0, 0.0, 10.0, 10.0];
        let centered = [5.0, 5.0, 10.0, 10.0];
        let other = [4.0, 2.0, 12.0, 9.0];
        let other_centered = Xyxy::from_array(other).to_xywh().to_array();
        let a = iou(corners, other, BoxFormat::Xyxy);
        let b = iou(centered, other_centered, BoxFormat::Xywh);
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn iou_batch_matches_pairwise() {
        let query = [0.0, 0.0, 10.0, 10.0];
        let boxes = [
            [0.0, 0.0, 10.0, 10.0],
            [5.0, 5.0, 15.0, 15.0],
            [20.0, 20.0, 30.0, 30.0],
            [2.0, 1.0, 8.0, 12.0],
        ];
        let batch = iou_batch(query, &boxes, BoxFormat::Xyxy);
        for (value, b) in batch.iter().zip(boxes.iter()) {
            assert_eq!(*value, iou(query, *b, BoxFormat::Xyxy));
        }
    }

    #[test]
    fn iou_wh_ignores_position() {
        assert!((iou_wh((2.0, 4.0), (2.0, 4.0)) - 1.0).abs() < 1e-6);
        let expected = 4.0 / (8.0 + 4.0 - 4.0);
        assert!((iou_wh((2.0, 4.0), (1.0, 4.0)) - expected).abs() < 1e-6);
    }

    #[test]
    fn xywh_to_xyxy_returns_new_buffer() {
        let input = vec![[5.0, 5.0, 4.0, 2.0]];
        let out = xywh_to_xyxy(&input);
        assert_eq!(out, vec![[3.0, 4.0, 7.0, 6.0]]);
        assert_eq!(input, vec![[5.0, 5.0, 4.0, 2.0]]);
    }

    #[test]
    fn corner_center_round_trip() {
        let b = Xyxy::new(1.5, 2.0, 9.5, 7.0);
        assert_eq!(b.to_xywh().to_xyxy(), b);
    }
}
