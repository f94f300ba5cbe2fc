//! Anchor templates for one detection scale.

use crate::geometry::{check_positive, iou_wh};
use crate::util::math::argmax;
use crate::util::{DetPostError, DetPostResult};

/// Anchor shape in grid-cell units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Anchor {
    pub w: f32,
    pub h: f32,
}

impl Anchor {
    pub const fn new(w: f32, h: f32) -> Self {
        Self { w, h }
    }
}

/// Ordered, non-empty set of anchors for one scale.
///
/// Order matters: equal shape IoUs resolve to the earlier anchor.
#[derive(Clone, Debug, PartialEq)]
pub struct AnchorSet {
    anchors: Vec<Anchor>,
}

impl AnchorSet {
    /// Builds a set from anchors already expressed in grid-cell units.
    pub fn new(anchors: Vec<Anchor>) -> DetPostResult<Self> {
        if anchors.is_empty() {
            return Err(DetPostError::InvalidConfig {
                param: "anchors",
                value: 0.0,
                reason: "anchor set must not be empty",
            });
        }
        for anchor in &anchors {
            check_positive("anchor_w", anchor.w)?;
            check_positive("anchor_h", anchor.h)?;
        }
        Ok(Self { anchors })
    }

    /// Builds a set from pixel-sized anchors, dividing by the scale's
    /// `stride` (input pixels per grid cell).
    pub fn from_pixels(anchors: &[(f32, f32)], stride: f32) -> DetPostResult<Self> {
        check_positive("stride", stride)?;
        Self::new(
            anchors
                .iter()
                .map(|&(w, h)| Anchor::new(w / stride, h / stride))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<Anchor> {
        self.anchors.get(idx).copied()
    }

    pub fn as_slice(&self) -> &[Anchor] {
        &self.anchors
    }

    /// Shape IoU of every anchor against a `(w, h)` box, in anchor order.
    pub fn shape_ious(&self, wh: (f32, f32)) -> Vec<f32> {
        self.anchors.iter().map(|a| iou_wh((a.w, a.h), wh)).collect()
    }

    /// Picks the anchor whose shape fits `wh` best; first wins on ties.
    pub fn best_match(&self, wh: (f32, f32)) -> AnchorMatch {
        let ious = self.shape_ious(wh);
        let index = argmax(&ious).map_or(0, |(idx, _)| idx);
        AnchorMatch {
            index,
            // Non-empty by construction, and `ious` has one entry per anchor.
            anchor: self.anchors[index],
            ious,
        }
    }
}

/// Result of [`AnchorSet::best_match`].
#[derive(Clone, Debug, PartialEq)]
pub struct AnchorMatch {
    pub index: usize,
    pub anchor: Anchor,
    /// Shape IoU of every anchor, in anchor order.
    pub ious: Vec<f32>,
}
