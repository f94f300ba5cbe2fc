use detpost::{
    ap_per_class, build_targets, iou_batch, non_max_suppression, AnchorSet, AssignConfig, Backend,
    BoxFormat, GridShape, GridView, GroundTruth, NmsConfig, PredictionView, Xywh,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

const IMAGES: usize = 8;
const CANDIDATES: usize = 2_000;
const CLASSES: usize = 80;
const ATTRS: usize = 5 + CLASSES;

/// Cheap deterministic value in `[0, 1)`.
fn hashed(i: usize, salt: usize) -> f32 {
    let v = (i.wrapping_mul(2_654_435_761) ^ salt.wrapping_mul(40_503)) & 0xFFFF;
    v as f32 / 65_536.0
}

fn make_predictions() -> Vec<f32> {
    let mut data = Vec::with_capacity(IMAGES * CANDIDATES * ATTRS);
    for i in 0..IMAGES * CANDIDATES {
        // Candidates cluster around a coarse lattice so NMS has work to do.
        let anchor = i % 64;
        data.push((anchor % 8) as f32 * 52.0 + 26.0 + hashed(i, 1) * 6.0);
        data.push((anchor / 8) as f32 * 52.0 + 26.0 + hashed(i, 2) * 6.0);
        data.push(30.0 + hashed(i, 3) * 20.0);
        data.push(30.0 + hashed(i, 4) * 20.0);
        data.push(hashed(i, 5));
        for c in 0..CLASSES {
            data.push(if c == anchor % CLASSES { 0.9 } else { hashed(i, 6 + c) * 0.1 });
        }
    }
    data
}

fn bench_nms(c: &mut Criterion) {
    let data = make_predictions();
    let view = PredictionView::new(&data, IMAGES, CANDIDATES, ATTRS).unwrap();
    let cfg = NmsConfig::default();

    c.bench_function("nms_8x2000x85", |b| {
        b.iter(|| black_box(non_max_suppression(view, &cfg).unwrap()));
    });

    if cfg!(feature = "rayon") {
        let par = NmsConfig {
            backend: Backend::Parallel,
            ..cfg
        };
        c.bench_function("nms_8x2000x85_parallel", |b| {
            b.iter(|| black_box(non_max_suppression(view, &par).unwrap()));
        });
    }
}

fn bench_iou_batch(c: &mut Criterion) {
    let boxes: Vec<[f32; 4]> = (0..4_096)
        .map(|i| {
            let x = hashed(i, 11) * 600.0;
            let y = hashed(i, 12) * 600.0;
            [x, y, x + 10.0 + hashed(i, 13) * 80.0, y + 10.0 + hashed(i, 14) * 80.0]
        })
        .collect();
    let query = [200.0, 200.0, 280.0, 260.0];

    c.bench_function("iou_batch_4096", |b| {
        b.iter(|| black_box(iou_batch(black_box(query), &boxes, BoxFormat::Xyxy)));
    });
}

fn bench_ap_per_class(c: &mut Criterion) {
    let n = 50_000;
    let tp: Vec<bool> = (0..n).map(|i| hashed(i, 21) > 0.4).collect();
    let conf: Vec<f32> = (0..n).map(|i| hashed(i, 22)).collect();
    let pred: Vec<usize> = (0..n).map(|i| i % CLASSES).collect();
    let target: Vec<usize> = (0..n / 2).map(|i| (i * 7) % CLASSES).collect();

    c.bench_function("ap_per_class_50k", |b| {
        b.iter(|| black_box(ap_per_class(&tp, &conf, &pred, &target).unwrap()));
    });
}

fn bench_build_targets(c: &mut Criterion) {
    let shape = GridShape::new(16, 3, 52);
    let cells = shape.cells().unwrap();
    let pred_boxes: Vec<f32> = (0..cells * 4).map(|i| 1.0 + hashed(i, 31) * 4.0).collect();
    let pred_cls: Vec<f32> = (0..cells * CLASSES).map(|i| hashed(i, 32)).collect();
    let boxes = GridView::new(&pred_boxes, shape, 4).unwrap();
    let cls = GridView::new(&pred_cls, shape, CLASSES).unwrap();
    let anchors =
        AnchorSet::from_pixels(&[(10.0, 13.0), (16.0, 30.0), (33.0, 23.0)], 8.0).unwrap();
    let targets: Vec<GroundTruth> = (0..640)
        .map(|i| {
            GroundTruth::new(
                i % 16,
                i % CLASSES,
                Xywh::new(
                    0.05 + hashed(i, 33) * 0.9,
                    0.05 + hashed(i, 34) * 0.9,
                    0.02 + hashed(i, 35) * 0.2,
                    0.02 + hashed(i, 36) * 0.2,
                ),
            )
        })
        .collect();
    let cfg = AssignConfig::default();

    c.bench_function("build_targets_16x3x52", |b| {
        b.iter(|| black_box(build_targets(boxes, cls, &targets, &anchors, &cfg).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_nms,
    bench_iou_batch,
    bench_ap_per_class,
    bench_build_targets
);
criterion_main!(benches);
