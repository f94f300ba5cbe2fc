//! Detection evaluation: matching, precision/recall curves and AP.
//!
//! Evaluation runs in two passes. [`batch_statistics`] marks every
//! detection of every image as a true or false positive against that
//! image's annotations; [`ap_per_class`] then pools the flags across the
//! dataset, ranks them by confidence and integrates per-class
//! precision/recall curves. [`Evaluator`] strings the two together across
//! batches.

use crate::backend::Backend;
use crate::geometry::Xyxy;
use crate::nms::Detection;
use crate::util::error::check_unit_interval;
use crate::util::DetPostResult;

mod ap;
mod matching;

pub use ap::{
    ap_per_class, compute_ap, f1_score, precision_envelope, ApReport, ClassMetrics, PrCurve,
};
pub use matching::{batch_statistics, match_image, SampleStatistics};

/// Ground-truth box for evaluation, in the same pixel frame as the
/// detections it is matched against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Annotation {
    /// Image index within the batch being matched.
    pub image_id: usize,
    pub class_id: usize,
    pub bbox: Xyxy,
}

/// Parameters for matching detections to annotations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchConfig {
    /// Minimum IoU for a detection to claim a ground-truth box.
    pub iou_threshold: f32,
    /// Require the claimed box to carry the detection's class.
    pub class_aware: bool,
    /// Per-image execution backend.
    pub backend: Backend,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.5,
            class_aware: true,
            backend: Backend::Sequential,
        }
    }
}

impl MatchConfig {
    pub fn validate(&self) -> DetPostResult<()> {
        check_unit_interval("iou_threshold", self.iou_threshold)?;
        self.backend.validate()
    }
}

/// Accumulates matching results over a dataset, batch by batch.
#[derive(Clone, Debug)]
pub struct Evaluator {
    cfg: MatchConfig,
    true_positives: Vec<bool>,
    confidences: Vec<f32>,
    pred_classes: Vec<usize>,
    target_classes: Vec<usize>,
    images: usize,
}

impl Evaluator {
    pub fn new(cfg: MatchConfig) -> DetPostResult<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            true_positives: Vec::new(),
            confidences: Vec::new(),
            pred_classes: Vec::new(),
            target_classes: Vec::new(),
            images: 0,
        })
    }

    /// Matches one batch. `outputs[i]` holds the detections of the i-th image
    /// of the batch and annotation `image_id`s are relative to the batch.
    pub fn add_batch(
        &mut self,
        outputs: &[Vec<Detection>],
        annotations: &[Annotation],
    ) -> DetPostResult<()> {
        let stats = batch_statistics(outputs, annotations, &self.cfg)?;
        for sample in stats {
            self.true_positives.extend(sample.true_positives);
            self.confidences.extend(sample.scores);
            self.pred_classes.extend(sample.pred_labels);
        }
        self.target_classes.extend(annotations.iter().map(|a| a.class_id));
        self.images += outputs.len();
        Ok(())
    }

    /// Images seen so far.
    pub fn images(&self) -> usize {
        self.images
    }

    /// Detections seen so far.
    pub fn detections(&self) -> usize {
        self.true_positives.len()
    }

    /// Per-class metrics over everything added so far.
    pub fn report(&self) -> DetPostResult<ApReport> {
        ap_per_class(
            &self.true_positives,
            &self.confidences,
            &self.pred_classes,
            &self.target_classes,
        )
    }
}
