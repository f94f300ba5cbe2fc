//! Single-image greedy merge loop.

use crate::geometry::{Xywh, Xyxy};
use crate::kernel::{DefaultIou, IouKernel};
use crate::nms::{Detection, NmsConfig};
use crate::tensor::BOX_ATTRS;
use crate::util::math::argmax;
use crate::util::{DetPostError, DetPostResult};

#[derive(Clone, Copy, Debug)]
struct Ranked {
    det: Detection,
    score: f32,
}

fn rank_candidates(rows: &[f32], attrs: usize, conf_thres: f32) -> Vec<Ranked> {
    let mut ranked: Vec<Ranked> = rows
        .chunks_exact(attrs)
        .filter_map(|row| {
            let objectness = row[4];
            if objectness.is_nan() || objectness < conf_thres {
                return None;
            }
            let (class_id, class_confidence) = argmax(&row[BOX_ATTRS..])?;
            let bbox = Xywh::new(row[0], row[1], row[2], row[3]).to_xyxy();
            Some(Ranked {
                det: Detection {
                    bbox,
                    objectness,
                    class_confidence,
                    class_id,
                },
                score: objectness * class_confidence,
            })
        })
        .collect();
    // Stable, so equal scores keep their input order.
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

/// Filters and merges the candidates of one image.
///
/// `rows` holds `attrs`-wide candidate rows in center-size form; the input
/// is never modified. Detections come out in descending representative
/// score.
pub fn suppress_image(
    rows: &[f32],
    attrs: usize,
    cfg: &NmsConfig,
) -> DetPostResult<Vec<Detection>> {
    cfg.validate()?;
    if attrs <= BOX_ATTRS {
        return Err(DetPostError::InvalidDimensions {
            context: "candidate row",
            reason: "each candidate needs 4 box values, objectness and at least one class score",
        });
    }
    if rows.len() % attrs != 0 {
        return Err(DetPostError::ShapeMismatch {
            context: "candidate rows",
            expected: rows.len() / attrs * attrs,
            got: rows.len(),
        });
    }
    Ok(merge_image(rows, attrs, cfg))
}

/// Merge loop without input checks; `rows` must hold whole `attrs`-wide rows.
pub(crate) fn merge_image(rows: &[f32], attrs: usize, cfg: &NmsConfig) -> Vec<Detection> {
    let mut remaining = rank_candidates(rows, attrs, cfg.conf_thres);
    let mut kept = Vec::new();
    let mut boxes: Vec<Xyxy> = Vec::with_capacity(remaining.len());
    let mut ious: Vec<f32> = Vec::with_capacity(remaining.len());

    while let Some(head) = remaining.first().map(|r| r.det) {
        boxes.clear();
        boxes.extend(remaining.iter().map(|r| r.det.bbox));
        ious.clear();
        <DefaultIou as IouKernel>::iou_into(&head.bbox, &boxes, &mut ious);

        let mut weight_sum = 0.0f32;
        let mut acc = [0.0f32; 4];
        let mut rest = Vec::with_capacity(remaining.len());
        for (idx, (cand, &iou)) in remaining.iter().zip(ious.iter()).enumerate() {
            // The head always belongs to its own cluster, even at nms_thres = 1.
            let absorbed = idx == 0 || (iou > cfg.nms_thres && cand.det.class_id == head.class_id);
            if !absorbed {
                rest.push(*cand);
                continue;
            }
            let w = cand.det.objectness;
            for (slot, coord) in acc.iter_mut().zip(cand.det.bbox.to_array()) {
                *slot += w * coord;
            }
            weight_sum += w;
        }

        let bbox = if weight_sum > 0.0 {
            Xyxy::from_array(acc.map(|v| v / weight_sum))
        } else {
            head.bbox
        };
        kept.push(Detection { bbox, ..head });
        remaining = rest;
    }

    kept
}
