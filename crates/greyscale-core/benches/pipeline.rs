//! Benchmarks for the greyscale conversion path.
//!
//! Run with: cargo bench -p greyscale-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use greyscale_core::codec::ImageCodec;
use greyscale_core::config::{ConvertConfig, EncodeFormat};
use greyscale_core::transform::greyscale::GreyscaleAction;
use greyscale_core::transform::{TransformAction, TransformChain};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

fn benchmark_greyscale(c: &mut Criterion) {
    let img = gradient(1920, 1080);
    let action = GreyscaleAction;

    c.bench_function("greyscale_1080p", |b| {
        b.iter(|| {
            let _ = action.apply(black_box(&img));
        })
    });
}

fn benchmark_chain_with_fit(c: &mut Criterion) {
    let img = gradient(1920, 1080);
    let config = ConvertConfig {
        fit_max_dimension: Some(512),
        ..ConvertConfig::default()
    };
    let chain = TransformChain::from_config(&config);

    c.bench_function("chain_greyscale_fit_512", |b| {
        b.iter(|| {
            let _ = chain.apply(black_box(&img));
        })
    });
}

fn benchmark_decode(c: &mut Criterion) {
    let mut buffer = Cursor::new(Vec::new());
    if gradient(640, 480).write_to(&mut buffer, ImageFormat::Jpeg).is_err() {
        eprintln!("Skipping decode benchmark: fixture could not be encoded");
        return;
    }
    let bytes = buffer.into_inner();
    let codec = ImageCodec::new(&ConvertConfig::default());

    c.bench_function("decode_jpeg_640x480", |b| {
        b.iter(|| {
            let _ = codec.decode(black_box(&bytes));
        })
    });
}

fn benchmark_encode(c: &mut Criterion) {
    let img = gradient(640, 480).grayscale();
    let png = ImageCodec::new(&ConvertConfig::default());
    let jpeg = ImageCodec::new(&ConvertConfig {
        format: EncodeFormat::Jpeg,
        ..ConvertConfig::default()
    });

    c.bench_function("encode_png_best", |b| {
        b.iter(|| {
            let _ = png.encode(black_box(&img));
        })
    });
    c.bench_function("encode_jpeg_q100", |b| {
        b.iter(|| {
            let _ = jpeg.encode(black_box(&img));
        })
    });
}

criterion_group!(
    benches,
    benchmark_greyscale,
    benchmark_chain_with_fit,
    benchmark_decode,
    benchmark_encode,
);
criterion_main!(benches);
