use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use termstore::compression::vbyte::VByteEncoder;
use termstore::index::positions::{decode_position_list, encode_position_list};
use rand::Rng;

fn random_positions(count: usize, spread: u32) -> Vec<u32> {
    let mut rng = rand::thread_rng();
    let mut pos = 0u32;
    (0..count)
        .map(|_| {
            pos += rng.gen_range(1..=spread);
            pos
        })
        .collect()
}

/// Interpolative coding of position lists
fn bench_position_lists(c: &mut Criterion) {
    let mut group = c.benchmark_group("position_lists");

    for size in [4, 64, 1024].iter() {
        let positions = random_positions(*size, 20);
        let encoded = encode_position_list(&positions).unwrap();

        group.bench_with_input(BenchmarkId::new("encode", size), &positions, |b, positions| {
            b.iter(|| black_box(encode_position_list(positions).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &encoded, |b, encoded| {
            b.iter(|| black_box(decode_position_list(encoded).unwrap()));
        });
    }

    group.finish();
}

/// Varint coding of docid gaps
fn bench_varints(c: &mut Criterion) {
    let mut group = c.benchmark_group("varint");
    let gaps = random_positions(10_000, 300);
    let encoded = VByteEncoder::encode_u32_list(&gaps);

    group.bench_function("encode_list", |b| {
        b.iter(|| black_box(VByteEncoder::encode_u32_list(&gaps)));
    });
    group.bench_function("decode_list", |b| {
        b.iter(|| black_box(VByteEncoder::decode_u32_list(&encoded).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_position_lists, bench_varints);
criterion_main!(benches);
