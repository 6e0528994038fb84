use criterion::{black_box, criterion_group, criterion_main, Criterion};
use exrmeta::standard;
use exrmeta::types::{Box2i, Chromaticities, M44f, Rational, V2i};
use exrmeta::*;

fn sample_header() -> Header {
    let mut header = Header::new();
    header
        .insert("dataWindow", Box2i::new(V2i::new(0, 0), V2i::new(1919, 1079)))
        .unwrap();
    standard::CAPTURE_RATE
        .add(&mut header, Rational::new(24000, 1001))
        .unwrap();
    standard::WORLD_TO_CAMERA
        .add(&mut header, M44f::identity())
        .unwrap();
    standard::CHROMATICITIES
        .add(&mut header, Chromaticities::default())
        .unwrap();
    standard::OWNER.add(&mut header, "studio".to_string()).unwrap();
    for i in 0..32 {
        header
            .insert(&format!("custom:{i}"), format!("value {i}"))
            .unwrap();
    }
    header
        .insert_attribute(
            "vendor:blob",
            Box::new(OpaqueAttribute::new("futureType99", vec![7; 256])),
        )
        .unwrap();
    header
}

fn bench_header_encode(c: &mut Criterion) {
    let header = sample_header();

    c.bench_function("header_encode", |b| {
        b.iter(|| black_box(header.to_bytes().unwrap()))
    });
}

fn bench_header_decode(c: &mut Criterion) {
    let bytes = sample_header().to_bytes().unwrap();
    let registry = TypeRegistry::with_standard_types();
    let options = ReadOptions::default();

    c.bench_function("header_decode", |b| {
        b.iter(|| black_box(Header::from_bytes(black_box(&bytes), &registry, &options).unwrap()))
    });
}

fn bench_typed_lookup(c: &mut Criterion) {
    let header = sample_header();

    c.bench_function("typed_lookup", |b| {
        b.iter(|| black_box(standard::CAPTURE_RATE.get(black_box(&header)).unwrap()))
    });
}

fn bench_validation(c: &mut Criterion) {
    let header = sample_header();

    c.bench_function("check_header", |b| {
        b.iter(|| black_box(check_header(black_box(&header))))
    });
}

criterion_group!(
    benches,
    bench_header_encode,
    bench_header_decode,
    bench_typed_lookup,
    bench_validation
);
criterion_main!(benches);
