//! Precision/recall curves and average precision per class.
//!
//! AP is the area under the precision envelope: the curve is padded with
//! sentinels `(0, 0)` and `(1, 0)`, each precision is replaced by the
//! maximum precision at any higher recall, and the resulting step function
//! is integrated over the points where recall changes.

use std::collections::BTreeSet;

use crate::trace::{trace_event, trace_span};
use crate::util::math::cumsum;
use crate::util::{DetPostError, DetPostResult, EPS};

/// Cumulative recall and precision after each ranked prediction of a class.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrCurve {
    pub recall: Vec<f32>,
    pub precision: Vec<f32>,
}

/// Evaluation result for one class.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassMetrics {
    pub class_id: usize,
    /// Precision after the last ranked prediction.
    pub precision: f32,
    /// Recall after the last ranked prediction.
    pub recall: f32,
    pub ap: f32,
    pub f1: f32,
    pub num_ground_truth: usize,
    pub num_predictions: usize,
    /// Empty when the class has no predictions or no ground truth.
    pub curve: PrCurve,
}

/// Per-class metrics in ascending class id order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ApReport {
    classes: Vec<ClassMetrics>,
}

impl ApReport {
    pub fn classes(&self) -> &[ClassMetrics] {
        &self.classes
    }

    /// Evaluated class ids, ascending.
    pub fn class_ids(&self) -> Vec<usize> {
        self.classes.iter().map(|c| c.class_id).collect()
    }

    pub fn get(&self, class_id: usize) -> Option<&ClassMetrics> {
        self.classes
            .binary_search_by_key(&class_id, |c| c.class_id)
            .ok()
            .map(|idx| &self.classes[idx])
    }

    /// Mean AP over evaluated classes (mAP); zero when nothing was evaluated.
    pub fn mean_ap(&self) -> f32 {
        self.mean_of(|c| c.ap)
    }

    pub fn mean_precision(&self) -> f32 {
        self.mean_of(|c| c.precision)
    }

    pub fn mean_recall(&self) -> f32 {
        self.mean_of(|c| c.recall)
    }

    pub fn mean_f1(&self) -> f32 {
        self.mean_of(|c| c.f1)
    }

    fn mean_of(&self, f: impl Fn(&ClassMetrics) -> f32) -> f32 {
        if self.classes.is_empty() {
            return 0.0;
        }
        self.classes.iter().map(f).sum::<f32>() / self.classes.len() as f32
    }
}

/// Backward running maximum: each value becomes the largest value at or
/// after its position, giving a non-increasing sequence.
pub fn precision_envelope(precision: &[f32]) -> Vec<f32> {
    let mut out = precision.to_vec();
    for i in (1..out.len()).rev() {
        out[i - 1] = out[i - 1].max(out[i]);
    }
    out
}

/// Area under the precision envelope of a recall/precision curve.
pub fn compute_ap(recall: &[f32], precision: &[f32]) -> DetPostResult<f32> {
    if recall.len() != precision.len() {
        return Err(DetPostError::ShapeMismatch {
            context: "precision curve",
            expected: recall.len(),
            got: precision.len(),
        });
    }

    let mut mrec = Vec::with_capacity(recall.len() + 2);
    mrec.push(0.0f32);
    mrec.extend_from_slice(recall);
    mrec.push(1.0);

    let mut mpre = Vec::with_capacity(precision.len() + 2);
    mpre.push(0.0f32);
    mpre.extend_from_slice(precision);
    mpre.push(0.0);
    let mpre = precision_envelope(&mpre);

    let ap = mrec
        .windows(2)
        .zip(mpre.iter().skip(1))
        .filter(|(r, _)| r[1] != r[0])
        .map(|(r, &p)| (r[1] - r[0]) * p)
        .sum::<f32>();
    Ok(ap)
}

/// Computes precision, recall, AP and F1 for every class that has ground
/// truth or predictions.
///
/// `true_positives`, `confidences` and `pred_classes` describe the pooled
/// detections of a dataset (any order); `target_classes` lists the class of
/// every ground-truth box.
pub fn ap_per_class(
    true_positives: &[bool],
    confidences: &[f32],
    pred_classes: &[usize],
    target_classes: &[usize],
) -> DetPostResult<ApReport> {
    for (context, len) in [
        ("confidences", confidences.len()),
        ("pred_classes", pred_classes.len()),
    ] {
        if len != true_positives.len() {
            return Err(DetPostError::ShapeMismatch {
                context,
                expected: true_positives.len(),
                got: len,
            });
        }
    }

    let mut order: Vec<usize> = (0..confidences.len()).collect();
    order.sort_by(|&a, &b| confidences[b].total_cmp(&confidences[a]));

    let classes: BTreeSet<usize> = target_classes
        .iter()
        .chain(pred_classes.iter())
        .copied()
        .collect();
    let _span = trace_span!("ap_per_class", classes = classes.len()).entered();

    let mut out = Vec::with_capacity(classes.len());
    for class_id in classes {
        let num_ground_truth = target_classes.iter().filter(|&&c| c == class_id).count();
        let hits: Vec<bool> = order
            .iter()
            .filter(|&&i| pred_classes[i] == class_id)
            .map(|&i| true_positives[i])
            .collect();
        let num_predictions = hits.len();

        if num_predictions == 0 && num_ground_truth == 0 {
            continue;
        }
        if num_predictions == 0 || num_ground_truth == 0 {
            out.push(ClassMetrics {
                class_id,
                precision: 0.0,
                recall: 0.0,
                ap: 0.0,
                f1: 0.0,
                num_ground_truth,
                num_predictions,
                curve: PrCurve::default(),
            });
            continue;
        }

        let fpc = cumsum(hits.iter().map(|&t| if t { 0.0 } else { 1.0 }));
        let tpc = cumsum(hits.iter().map(|&t| if t { 1.0 } else { 0.0 }));
        let denom = num_ground_truth as f32 + EPS;
        let recall: Vec<f32> = tpc.iter().map(|&tp| tp / denom).collect();
        let precision: Vec<f32> = tpc
            .iter()
            .zip(fpc.iter())
            .map(|(&tp, &fp)| tp / (tp + fp))
            .collect();

        let ap = compute_ap(&recall, &precision)?;
        let r = recall.last().copied().unwrap_or(0.0);
        let p = precision.last().copied().unwrap_or(0.0);
        out.push(ClassMetrics {
            class_id,
            precision: p,
            recall: r,
            ap,
            f1: f1_score(p, r),
            num_ground_truth,
            num_predictions,
            curve: PrCurve { recall, precision },
        });
    }

    let report = ApReport { classes: out };
    trace_event!(
        "ap_per_class",
        classes = report.classes.len(),
        map = report.mean_ap()
    );
    Ok(report)
}

/// Harmonic mean of precision and recall.
pub fn f1_score(precision: f32, recall: f32) -> f32 {
    2.0 * precision * recall / (precision + recall + EPS)
}
