use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nm_sweep::{
    space::{ArrayShape, Axis, ConfigSpace, Preset, SramSize, Workload},
    sparsity::generate,
};

pub fn schedule(c: &mut Criterion) {
    c.bench_function("schedule m=64 step=1", |b| {
        b.iter(|| generate(black_box(64), black_box(1)).unwrap())
    });
    c.bench_function("schedule m=8 step=10", |b| {
        b.iter(|| generate(black_box(8), black_box(10)).unwrap())
    });
}

pub fn expand(c: &mut Criterion) {
    let space = ConfigSpace::new(
        Preset::default(),
        Workload::default(),
        vec![
            Axis::array_sizes(
                ["4x4", "8x8", "16x16", "32x32", "64x64"].map(|s| s.parse::<ArrayShape>().unwrap()),
            )
            .unwrap(),
            Axis::sram_sizes(
                ["64kb", "256kb", "1mb", "5mb"].map(|s| s.parse::<SramSize>().unwrap()),
            )
            .unwrap(),
            Axis::sparsity_schedule(16, 10).unwrap(),
        ],
    )
    .unwrap();
    c.bench_function("expand and render", |b| {
        b.iter(|| {
            space
                .expand()
                .map(|point| point.config.render().len() + point.descriptor.rows.len())
                .sum::<usize>()
        })
    });
}

criterion_group!(benches, schedule, expand);
criterion_main!(benches);
