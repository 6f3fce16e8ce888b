//! Evaluation benchmarks using Criterion.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use lrp_eval::{Annotation, BBox, Category, CocoDataset, DetectionRecord, ImageInfo, LrpEvaluator, LrpParams};

/// Create a ground truth and a noisy results set for benchmarking.
///
/// Every ground truth box gets a jittered detection, and every third image
/// gets a background false positive. Deterministic so runs are comparable.
fn synthetic_datasets(n_images: i64, boxes_per_image: usize, n_categories: i64) -> (CocoDataset, CocoDataset) {
    let images = (1..=n_images).map(ImageInfo::new).collect();
    let categories = (1..=n_categories).map(|c| Category::new(c, format!("class_{}", c))).collect();

    let mut annotations = Vec::new();
    let mut records = Vec::new();
    let mut id = 1;
    for img in 1..=n_images {
        for k in 0..boxes_per_image {
            let cat = (k as i64 % n_categories) + 1;
            let x = (k % 10) as f64 * 60.0;
            let y = (k / 10) as f64 * 60.0;
            annotations.push(Annotation::new(id, img, cat, BBox::new(x, y, 50.0, 50.0)));

            let jitter = ((id * 7) % 13) as f64;
            let score = ((id * 31) % 100) as f64 / 100.0;
            records.push(DetectionRecord::new(img, cat, BBox::new(x + jitter, y, 50.0, 50.0), score));
            id += 1;
        }
        if img % 3 == 0 {
            records.push(DetectionRecord::new(img, 1, BBox::new(900.0, 900.0, 30.0, 30.0), 0.55));
        }
    }

    let gt = CocoDataset::from_parts(images, categories, annotations).expect("valid ground truth");
    let dt = gt.load_results_from_records(records).expect("valid results");
    (gt, dt)
}

/// Benchmark the per-image matching stage.
fn benchmark_evaluate_100_images(c: &mut Criterion) {
    let (gt, dt) = synthetic_datasets(100, 20, 5);

    c.bench_function("evaluate_100_images", |b| {
        b.iter(|| {
            let mut eval = LrpEvaluator::new(black_box(&gt), black_box(&dt), 0.5).expect("valid params");
            let n = eval.evaluate().expect("evaluate").len();
            black_box(n)
        })
    });
}

/// Benchmark the threshold sweep of the accumulation stage.
fn benchmark_accumulate_100_images(c: &mut Criterion) {
    let (gt, dt) = synthetic_datasets(100, 20, 5);
    let mut eval = LrpEvaluator::with_params(&gt, &dt, LrpParams::default()).expect("valid params");
    eval.evaluate().expect("evaluate");

    c.bench_function("accumulate_100_images", |b| {
        b.iter(|| {
            black_box(eval.accumulate().expect("accumulate").num_evaluated_categories());
        })
    });
}

/// Benchmark the full pipeline on a larger set.
fn benchmark_full_run_500_images(c: &mut Criterion) {
    let (gt, dt) = synthetic_datasets(500, 30, 10);

    c.bench_function("full_run_500_images", |b| {
        b.iter(|| {
            let mut eval = LrpEvaluator::new(&gt, &dt, 0.5).expect("valid params");
            black_box(eval.run(false).expect("run").molrp)
        })
    });
}

criterion_group!(
    benches,
    benchmark_evaluate_100_images,
    benchmark_accumulate_100_images,
    benchmark_full_run_500_images,
);
criterion_main!(benches);
