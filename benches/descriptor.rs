//! ホットパスのCriterionベンチマーク
//!
//! ライブループの1フレームあたりの支配的コストである
//! セグメンテーション（k-means）とHOG記述子計算を対象とする。

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use JazzHands::domain::{FeatureParams, Frame, SegmenterConfig};
use JazzHands::infrastructure::vision::kmeans::{cluster, ClusteringConfig};
use JazzHands::infrastructure::vision::{HandSegmenter, HogExtractor};

/// 左半分が肌色のテストフレーム
fn skin_frame(size: u32) -> Frame {
    let mut data = Vec::with_capacity((size * size * 3) as usize);
    for _y in 0..size {
        for x in 0..size {
            if x < size / 2 {
                data.extend_from_slice(&[210, 160, 130]);
            } else {
                data.extend_from_slice(&[20, 180, 40]);
            }
        }
    }
    Frame::new(data, size, size)
}

fn bench_kmeans(c: &mut Criterion) {
    let points: Vec<[f32; 2]> = (0..4096)
        .map(|i| {
            if i % 2 == 0 {
                [100.0 + (i % 17) as f32, 150.0 + (i % 13) as f32]
            } else {
                [30.0 + (i % 11) as f32, 40.0 + (i % 7) as f32]
            }
        })
        .collect();
    let config = ClusteringConfig {
        k: 2,
        max_iterations: 100,
        tolerance: 0.85,
    };

    c.bench_function("kmeans_4096_points", |b| {
        b.iter(|| cluster(black_box(&points), black_box(&config)))
    });
}

fn bench_segmenter(c: &mut Criterion) {
    let segmenter = HandSegmenter::new(&SegmenterConfig::default());
    let frame = skin_frame(64);

    c.bench_function("segment_64x64", |b| {
        b.iter(|| segmenter.segment(black_box(&frame)))
    });
}

fn bench_hog(c: &mut Criterion) {
    let extractor = HogExtractor::new(FeatureParams::default());
    let segmenter = HandSegmenter::new(&SegmenterConfig::default());
    let frame = skin_frame(64);
    let mask = segmenter.segment(&frame).expect("segmentation failed");

    c.bench_function("hog_64x64", |b| {
        b.iter(|| extractor.extract(black_box(&frame), black_box(&mask)))
    });
}

criterion_group!(benches, bench_kmeans, bench_segmenter, bench_hog);
criterion_main!(benches);
