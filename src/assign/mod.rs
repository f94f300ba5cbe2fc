//! Ground-truth to anchor/grid-cell assignment for training targets.
//!
//! Every ground-truth box is scaled into grid units, matched to the anchor
//! whose shape fits it best, and written into the cell containing its
//! center. Anchors whose shape IoU exceeds `ignore_thres` are removed from
//! the no-object mask at that cell so near misses are not penalized.
//!
//! Two boxes landing on the same `(image, anchor, row, col)` are written in
//! input order and the later one overwrites the regression, class and
//! diagnostic targets of the earlier one. Masks only ever move towards
//! "assigned", and one-hot class channels accumulate.

use crate::geometry::{iou, BoxFormat, Xywh, Xyxy};
use crate::metrics::Annotation;
use crate::tensor::{GridShape, GridTensor, GridView};
use crate::trace::{trace_event, trace_span};
use crate::util::error::check_unit_interval;
use crate::util::math::argmax;
use crate::util::{DetPostError, DetPostResult, EPS};

mod anchors;

pub use anchors::{Anchor, AnchorMatch, AnchorSet};

/// Ground-truth record for training: image index within the batch, class,
/// and a center-size box normalized to `[0, 1]` by the input size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundTruth {
    pub image: usize,
    pub class_id: usize,
    pub bbox: Xywh,
}

impl GroundTruth {
    pub const fn new(image: usize, class_id: usize, bbox: Xywh) -> Self {
        Self {
            image,
            class_id,
            bbox,
        }
    }

    /// Pixel-space corner-form annotation for evaluation on an
    /// `img_size x img_size` input.
    pub fn to_annotation(&self, img_size: f32) -> Annotation {
        let b = self.bbox.to_xyxy();
        Annotation {
            image_id: self.image,
            class_id: self.class_id,
            bbox: Xyxy::from_array(b.to_array().map(|v| v * img_size)),
        }
    }
}

/// Assignment parameters that are not part of the anchor set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AssignConfig {
    /// Anchors with shape IoU above this are ignored rather than negatives.
    pub ignore_thres: f32,
}

impl Default for AssignConfig {
    fn default() -> Self {
        Self { ignore_thres: 0.5 }
    }
}

impl AssignConfig {
    pub fn validate(&self) -> DetPostResult<()> {
        check_unit_interval("ignore_thres", self.ignore_thres)
    }
}

/// Training targets for one scale, all shaped `(batch, anchor, row, col)`.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetTensors {
    /// IoU between the predicted and ground-truth box at assigned cells.
    pub iou_scores: GridTensor<f32>,
    /// `1.0` where the predicted arg-max class equals the ground truth.
    pub class_mask: GridTensor<f32>,
    /// Cells responsible for a ground-truth box.
    pub obj_mask: GridTensor<bool>,
    /// Cells counted as negatives for the objectness loss.
    pub noobj_mask: GridTensor<bool>,
    /// Fractional center offset within the cell.
    pub tx: GridTensor<f32>,
    pub ty: GridTensor<f32>,
    /// Log-ratio of box size to anchor size.
    pub tw: GridTensor<f32>,
    pub th: GridTensor<f32>,
    /// One-hot class targets, one channel per class.
    pub tcls: GridTensor<f32>,
    /// `obj_mask` as `1.0`/`0.0`, the objectness target.
    pub tconf: GridTensor<f32>,
}

impl TargetTensors {
    /// Number of cells holding a positive assignment.
    pub fn num_assigned(&self) -> usize {
        self.obj_mask.as_slice().iter().filter(|&&m| m).count()
    }
}

#[derive(Clone, Copy, Debug)]
struct Placement {
    image: usize,
    class_id: usize,
    row: usize,
    col: usize,
    scaled: Xywh,
}

fn cell_index(center: f32, grid: usize, context: &'static str) -> DetPostResult<usize> {
    if !center.is_finite() || center < 0.0 {
        return Err(DetPostError::InvalidDimensions {
            context,
            reason: "ground-truth center must be finite and non-negative",
        });
    }
    let idx = center.floor() as usize;
    if idx >= grid {
        return Err(DetPostError::IndexOutOfBounds {
            index: idx,
            len: grid,
            context,
        });
    }
    Ok(idx)
}

fn check_size(extent: f32) -> DetPostResult<()> {
    if extent.is_finite() && extent > 0.0 {
        Ok(())
    } else {
        Err(DetPostError::InvalidDimensions {
            context: "ground truth size",
            reason: "ground-truth width and height must be positive and finite",
        })
    }
}

fn check_shapes(
    pred_boxes: &GridView<'_, f32>,
    pred_cls: &GridView<'_, f32>,
    anchors: &AnchorSet,
) -> DetPostResult<GridShape> {
    let shape = pred_boxes.shape();
    if shape.grid == 0 {
        return Err(DetPostError::InvalidDimensions {
            context: "grid",
            reason: "grid size must be positive",
        });
    }
    if pred_boxes.depth() != 4 {
        return Err(DetPostError::ShapeMismatch {
            context: "pred_boxes channels",
            expected: 4,
            got: pred_boxes.depth(),
        });
    }
    let other = pred_cls.shape();
    let pairs = [
        ("pred_cls batch", shape.batch, other.batch),
        ("pred_cls anchors", shape.anchors, other.anchors),
        ("pred_cls grid", shape.grid, other.grid),
        ("anchor count", shape.anchors, anchors.len()),
    ];
    for (context, expected, got) in pairs {
        if expected != got {
            return Err(DetPostError::ShapeMismatch {
                context,
                expected,
                got,
            });
        }
    }
    Ok(shape)
}

fn place(
    targets: &[GroundTruth],
    shape: GridShape,
    classes: usize,
) -> DetPostResult<Vec<Placement>> {
    let n_g = shape.grid as f32;
    targets
        .iter()
        .map(|gt| {
            if gt.image >= shape.batch {
                return Err(DetPostError::IndexOutOfBounds {
                    index: gt.image,
                    len: shape.batch,
                    context: "ground truth image",
                });
            }
            if gt.class_id >= classes {
                return Err(DetPostError::IndexOutOfBounds {
                    index: gt.class_id,
                    len: classes,
                    context: "ground truth class",
                });
            }
            let scaled = gt.bbox.scale(n_g);
            check_size(scaled.w)?;
            check_size(scaled.h)?;
            Ok(Placement {
                image: gt.image,
                class_id: gt.class_id,
                col: cell_index(scaled.cx, shape.grid, "ground truth column")?,
                row: cell_index(scaled.cy, shape.grid, "ground truth row")?,
                scaled,
            })
        })
        .collect()
}

/// Builds training targets for one detection scale.
///
/// `pred_boxes` holds center-size boxes in grid units with depth 4 and
/// `pred_cls` the per-class probabilities; both share the
/// `(batch, anchors, grid, grid)` shape, and `anchors` must list one anchor
/// per anchor slot.
pub fn build_targets(
    pred_boxes: GridView<'_, f32>,
    pred_cls: GridView<'_, f32>,
    targets: &[GroundTruth],
    anchors: &AnchorSet,
    cfg: &AssignConfig,
) -> DetPostResult<TargetTensors> {
    cfg.validate()?;
    let shape = check_shapes(&pred_boxes, &pred_cls, anchors)?;
    let classes = pred_cls.depth();
    let placements = place(targets, shape, classes)?;

    let _span = trace_span!(
        "build_targets",
        batch = shape.batch,
        anchors = shape.anchors,
        grid = shape.grid,
        targets = placements.len()
    )
    .entered();

    let mut obj_mask = GridTensor::filled(shape, 1, false)?;
    let mut noobj_mask = GridTensor::filled(shape, 1, true)?;
    let mut class_mask = GridTensor::filled(shape, 1, 0.0f32)?;
    let mut iou_scores = GridTensor::filled(shape, 1, 0.0f32)?;
    let mut tx = GridTensor::filled(shape, 1, 0.0f32)?;
    let mut ty = GridTensor::filled(shape, 1, 0.0f32)?;
    let mut tw = GridTensor::filled(shape, 1, 0.0f32)?;
    let mut th = GridTensor::filled(shape, 1, 0.0f32)?;
    let mut tcls = GridTensor::filled(shape, classes, 0.0f32)?;

    for p in &placements {
        let (b, j, i) = (p.image, p.row, p.col);
        let gwh = (p.scaled.w, p.scaled.h);
        let AnchorMatch {
            index: best,
            anchor,
            ious,
        } = anchors.best_match(gwh);

        obj_mask.set(b, best, j, i, true);
        noobj_mask.set(b, best, j, i, false);
        for (a, &anchor_iou) in ious.iter().enumerate() {
            if anchor_iou > cfg.ignore_thres {
                noobj_mask.set(b, a, j, i, false);
            }
        }

        tx.set(b, best, j, i, p.scaled.cx - p.scaled.cx.floor());
        ty.set(b, best, j, i, p.scaled.cy - p.scaled.cy.floor());
        tw.set(b, best, j, i, (p.scaled.w / anchor.w + EPS).ln());
        th.set(b, best, j, i, (p.scaled.h / anchor.h + EPS).ln());
        if let Some(slot) = tcls
            .cell_mut(b, best, j, i)
            .and_then(|c| c.get_mut(p.class_id))
        {
            *slot = 1.0;
        }

        let predicted_class = pred_cls
            .cell(b, best, j, i)
            .and_then(argmax)
            .map(|(c, _)| c);
        let correct = if predicted_class == Some(p.class_id) {
            1.0
        } else {
            0.0
        };
        class_mask.set(b, best, j, i, correct);

        let score = match pred_boxes.cell(b, best, j, i) {
            Some(&[cx, cy, w, h]) => iou([cx, cy, w, h], p.scaled.to_array(), BoxFormat::Xywh),
            _ => 0.0,
        };
        iou_scores.set(b, best, j, i, score);
    }

    let tconf = obj_mask.map(|&m| if m { 1.0 } else { 0.0 });
    let out = TargetTensors {
        iou_scores,
        class_mask,
        obj_mask,
        noobj_mask,
        tx,
        ty,
        tw,
        th,
        tcls,
        tconf,
    };
    trace_event!("targets_assigned", cells = out.num_assigned());
    Ok(out)
}
