#![cfg(feature = "rayon")]

use detpost::{
    batch_statistics, non_max_suppression, Annotation, Backend, MatchConfig, NmsConfig,
    PredictionView, Xyxy,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const IMAGES: usize = 16;
const CANDIDATES: usize = 64;
const CLASSES: usize = 4;
const ATTRS: usize = 5 + CLASSES;

fn random_predictions(rng: &mut StdRng) -> Vec<f32> {
    let mut buf = Vec::with_capacity(IMAGES * CANDIDATES * ATTRS);
    for _ in 0..IMAGES * CANDIDATES {
        buf.push(rng.random_range(20.0f32..300.0));
        buf.push(rng.random_range(20.0f32..300.0));
        buf.push(rng.random_range(8.0f32..60.0));
        buf.push(rng.random_range(8.0f32..60.0));
        buf.push(rng.random_range(0.0f32..1.0));
        for _ in 0..CLASSES {
            buf.push(rng.random_range(0.0f32..1.0));
        }
    }
    buf
}

fn random_annotations(rng: &mut StdRng) -> Vec<Annotation> {
    let mut out = Vec::new();
    for image_id in 0..IMAGES {
        for _ in 0..rng.random_range(0usize..6) {
            let x1 = rng.random_range(0.0f32..280.0);
            let y1 = rng.random_range(0.0f32..280.0);
            let w = rng.random_range(8.0f32..60.0);
            let h = rng.random_range(8.0f32..60.0);
            out.push(Annotation {
                image_id,
                class_id: rng.random_range(0..CLASSES),
                bbox: Xyxy::new(x1, y1, x1 + w, y1 + h),
            });
        }
    }
    out
}

#[test]
fn parallel_backend_matches_sequential() {
    let mut rng = StdRng::seed_from_u64(2024);
    let data = random_predictions(&mut rng);
    let anns = random_annotations(&mut rng);
    let view = PredictionView::new(&data, IMAGES, CANDIDATES, ATTRS).unwrap();

    let seq_nms = NmsConfig::default();
    let par_nms = NmsConfig {
        backend: Backend::Parallel,
        ..seq_nms
    };
    let seq = non_max_suppression(view, &seq_nms).unwrap();
    let par = non_max_suppression(view, &par_nms).unwrap();
    assert_eq!(seq, par);

    let seq_match = MatchConfig::default();
    let par_match = MatchConfig {
        backend: Backend::Parallel,
        ..seq_match
    };
    let seq_stats = batch_statistics(&seq, &anns, &seq_match).unwrap();
    let par_stats = batch_statistics(&par, &anns, &par_match).unwrap();
    assert_eq!(seq_stats, par_stats);
}
