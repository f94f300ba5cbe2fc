//! Confidence filtering and merging non-maximum suppression.
//!
//! Raw candidates are filtered by objectness, ranked by
//! `objectness * best class score`, then clustered greedily: the best
//! remaining candidate absorbs every same-class candidate overlapping it
//! beyond `nms_thres`, its box becomes the objectness-weighted mean of the
//! cluster, and the whole cluster leaves the pool.

use crate::backend::Backend;
use crate::geometry::Xyxy;
use crate::tensor::PredictionView;
use crate::trace::{trace_event, trace_span};
use crate::util::error::check_unit_interval;
use crate::util::DetPostResult;

mod merge;

pub use merge::suppress_image;

/// Thresholds and backend for [`non_max_suppression`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NmsConfig {
    /// Candidates with objectness below this are discarded.
    pub conf_thres: f32,
    /// Same-class candidates with IoU above this merge into one detection.
    pub nms_thres: f32,
    /// Per-image execution backend.
    pub backend: Backend,
}

impl Default for NmsConfig {
    fn default() -> Self {
        Self {
            conf_thres: 0.5,
            nms_thres: 0.4,
            backend: Backend::Sequential,
        }
    }
}

impl NmsConfig {
    /// Checks thresholds and backend availability.
    pub fn validate(&self) -> DetPostResult<()> {
        check_unit_interval("conf_thres", self.conf_thres)?;
        check_unit_interval("nms_thres", self.nms_thres)?;
        self.backend.validate()
    }
}

/// One kept detection in corner form.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    /// Merged box `(x1, y1, x2, y2)`.
    pub bbox: Xyxy,
    /// Objectness of the cluster representative.
    pub objectness: f32,
    /// Best class score of the cluster representative.
    pub class_confidence: f32,
    /// Arg-max class of the cluster representative.
    pub class_id: usize,
}

impl Detection {
    /// Ranking score `objectness * class_confidence`.
    pub fn score(&self) -> f32 {
        self.objectness * self.class_confidence
    }
}

/// Runs NMS over every image of `pred`.
///
/// Returns one list per image, in image order. Images without any candidate
/// above `conf_thres` yield an empty list.
pub fn non_max_suppression(
    pred: PredictionView<'_>,
    cfg: &NmsConfig,
) -> DetPostResult<Vec<Vec<Detection>>> {
    cfg.validate()?;
    let _span = trace_span!(
        "nms",
        images = pred.images(),
        candidates = pred.candidates()
    )
    .entered();

    let out = cfg.backend.map_images(pred.images(), |image| {
        let rows = pred.image(image).unwrap_or(&[]);
        Ok(merge::merge_image(rows, pred.attrs(), cfg))
    })?;

    trace_event!(
        "nms_kept",
        detections = out.iter().map(Vec::len).sum::<usize>()
    );
    Ok(out)
}
