//! Per-image matching of detections to ground truth.

use crate::geometry::Xyxy;
use crate::kernel::{DefaultIou, IouKernel};
use crate::metrics::{Annotation, MatchConfig};
use crate::nms::Detection;
use crate::trace::{trace_event, trace_span};
use crate::util::{DetPostError, DetPostResult};

/// Matching outcome for the detections of one image, in detection order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleStatistics {
    /// Whether each detection claimed a ground-truth box.
    pub true_positives: Vec<bool>,
    /// Objectness of each detection, used for ranking.
    pub scores: Vec<f32>,
    /// Predicted class of each detection.
    pub pred_labels: Vec<usize>,
}

impl SampleStatistics {
    pub fn len(&self) -> usize {
        self.true_positives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.true_positives.is_empty()
    }
}

/// Flags which `detections` of one image are true positives.
///
/// Detections are visited in the order given, which should be descending
/// confidence. A detection whose class does not occur among `ground_truth`
/// is skipped. Otherwise its best IoU over the still unclaimed boxes (any
/// class) is taken; at or above `iou_threshold` the box is claimed, provided
/// its class matches when `cfg.class_aware` is set. Matching stops once
/// every box is claimed.
pub fn match_image(
    detections: &[Detection],
    ground_truth: &[Annotation],
    cfg: &MatchConfig,
) -> Vec<bool> {
    let mut true_positives = vec![false; detections.len()];
    if ground_truth.is_empty() {
        return true_positives;
    }

    let boxes: Vec<Xyxy> = ground_truth.iter().map(|a| a.bbox).collect();
    let mut claimed = vec![false; ground_truth.len()];
    let mut num_claimed = 0usize;
    let mut ious = Vec::with_capacity(boxes.len());

    for (det_idx, det) in detections.iter().enumerate() {
        if num_claimed == ground_truth.len() {
            break;
        }
        if !ground_truth.iter().any(|a| a.class_id == det.class_id) {
            continue;
        }

        ious.clear();
        <DefaultIou as IouKernel>::iou_into(&det.bbox, &boxes, &mut ious);

        let mut best: Option<(usize, f32)> = None;
        for (gt_idx, &iou) in ious.iter().enumerate() {
            if claimed[gt_idx] {
                continue;
            }
            if best.map_or(true, |(_, v)| iou > v) {
                best = Some((gt_idx, iou));
            }
        }

        let Some((gt_idx, iou)) = best else {
            continue;
        };
        let class_ok = !cfg.class_aware || ground_truth[gt_idx].class_id == det.class_id;
        if iou >= cfg.iou_threshold && class_ok {
            true_positives[det_idx] = true;
            claimed[gt_idx] = true;
            num_claimed += 1;
        }
    }

    true_positives
}

/// Matches every image of a batch against its annotations.
///
/// `outputs[i]` are the detections of image `i`; annotation `image_id`s
/// index into `outputs`. Returns one entry per image, in image order.
pub fn batch_statistics(
    outputs: &[Vec<Detection>],
    annotations: &[Annotation],
    cfg: &MatchConfig,
) -> DetPostResult<Vec<SampleStatistics>> {
    cfg.validate()?;
    let _span = trace_span!(
        "batch_statistics",
        images = outputs.len(),
        annotations = annotations.len()
    )
    .entered();

    let mut per_image: Vec<Vec<Annotation>> = vec![Vec::new(); outputs.len()];
    for ann in annotations {
        let slot = per_image
            .get_mut(ann.image_id)
            .ok_or(DetPostError::IndexOutOfBounds {
                index: ann.image_id,
                len: outputs.len(),
                context: "annotation image",
            })?;
        slot.push(*ann);
    }

    let stats = cfg.backend.map_images(outputs.len(), |image| {
        let detections = &outputs[image];
        Ok(SampleStatistics {
            true_positives: match_image(detections, &per_image[image], cfg),
            scores: detections.iter().map(|d| d.objectness).collect(),
            pred_labels: detections.iter().map(|d| d.class_id).collect(),
        })
    })?;

    trace_event!(
        "true_positives",
        count = stats
            .iter()
            .map(|s| s.true_positives.iter().filter(|&&t| t).count())
            .sum::<usize>()
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::match_image;
    use crate::geometry::Xyxy;
    use crate::metrics::{Annotation, MatchConfig};
    use crate::nms::Detection;

    fn det(bbox: [f32; 4], objectness: f32, class_id: usize) -> Detection {
        Detection {
            bbox: Xyxy::from_array(bbox),
            objectness,
            class_confidence: 1.0,
            class_id,
        }
    }

    fn ann(bbox: [f32; 4], class_id: usize) -> Annotation {
        Annotation {
            image_id: 0,
            class_id,
            bbox: Xyxy::from_array(bbox),
        }
    }

    #[test]
    fn duplicate_detection_is_false_positive() {
        let gts = [ann([10.0, 10.0, 50.0, 50.0], 0)];
        let dets = [
            det([10.0, 10.0, 50.0, 50.0], 0.9, 0),
            det([11.0, 10.0, 50.0, 50.0], 0.8, 0),
        ];
        assert_eq!(
            match_image(&dets, &gts, &MatchConfig::default()),
            vec![true, false]
        );
    }

    #[test]
    fn class_absent_from_image_is_skipped() {
        let gts = [ann([10.0, 10.0, 50.0, 50.0], 0)];
        let dets = [det([10.0, 10.0, 50.0, 50.0], 0.9, 3)];
        assert_eq!(
            match_image(&dets, &gts, &MatchConfig::default()),
            vec![false]
        );
    }

    #[test]
    fn below_threshold_is_false_positive() {
        let gts = [ann([0.0, 0.0, 9.0, 9.0], 0)];
        let dets = [det([5.0, 5.0, 14.0, 14.0], 0.9, 0)];
        assert_eq!(
            match_image(&dets, &gts, &MatchConfig::default()),
            vec![false]
        );
    }

    #[test]
    fn no_ground_truth_yields_all_false() {
        let dets = [det([0.0, 0.0, 9.0, 9.0], 0.9, 0)];
        assert_eq!(
            match_image(&dets, &[], &MatchConfig::default()),
            vec![false]
        );
    }

    #[test]
    fn class_agnostic_mode_lets_any_class_claim() {
        let gts = [ann([0.0, 0.0, 9.0, 9.0], 0), ann([50.0, 50.0, 59.0, 59.0], 1)];
        let dets = [det([50.0, 50.0, 59.0, 59.0], 0.9, 0)];
        let agnostic = MatchConfig {
            class_aware: false,
            ..MatchConfig::default()
        };
        assert_eq!(match_image(&dets, &gts, &agnostic), vec![true]);
        assert_eq!(
            match_image(&dets, &gts, &MatchConfig::default()),
            vec![false]
        );
    }
}
