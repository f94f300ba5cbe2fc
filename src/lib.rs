//! detpost is a CPU postprocessing and evaluation engine for grid/anchor
//! object detectors of the YOLO family.
//!
//! It turns raw per-cell network output into merged detections
//! ([`non_max_suppression`]), maps ground truth onto the anchor lattice for
//! training ([`build_targets`]), and scores detections against ground truth
//! ([`batch_statistics`], [`ap_per_class`]). Everything is stateless apart
//! from the explicit configuration passed into each call. Per-image work can
//! run on a rayon pool via the `rayon` feature; the `simd` feature swaps in a
//! `wide`-based IoU kernel with identical results.

pub mod assign;
pub mod backend;
pub mod geometry;
pub mod kernel;
pub mod metrics;
pub mod nms;
pub mod tensor;
mod trace;
pub mod util;

pub use assign::{
    build_targets, Anchor, AnchorMatch, AnchorSet, AssignConfig, GroundTruth, TargetTensors,
};
pub use backend::Backend;
pub use geometry::{iou, iou_batch, iou_wh, rescale_boxes, xywh_to_xyxy, BoxFormat, Xywh, Xyxy};
pub use metrics::{
    ap_per_class, batch_statistics, compute_ap, match_image, Annotation, ApReport, ClassMetrics,
    Evaluator, MatchConfig, PrCurve, SampleStatistics,
};
pub use nms::{non_max_suppression, suppress_image, Detection, NmsConfig};
pub use tensor::{GridShape, GridTensor, GridView, PredictionView};
pub use util::{DetPostError, DetPostResult, EPS};
