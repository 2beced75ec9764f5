use criterion::{black_box, criterion_group, criterion_main, Criterion};
use live_canvas::draw::composite::RgbaBuffer;
use live_canvas::draw::fill::flood_fill;
use live_canvas::draw::history::Snapshot;
use live_canvas::draw::model::{Color, StrokeStyle};
use live_canvas::draw::render::Rasterizer;

fn bench_flood_fill(c: &mut Criterion) {
    let template = RgbaBuffer::new(512, 512, Color::WHITE);
    c.bench_function("flood_fill_512_uniform", |b| {
        b.iter(|| {
            let mut buffer = template.clone();
            black_box(flood_fill(&mut buffer, (256, 256), Color::rgb(255, 0, 0)))
        })
    });
}

fn bench_segments(c: &mut Criterion) {
    let mut rasterizer = Rasterizer::default();
    let mut buffer = RgbaBuffer::new(512, 512, Color::WHITE);
    for width in [3u32, 24] {
        let style = StrokeStyle {
            width,
            color: Color::BLACK,
        };
        c.bench_function(&format!("stroke_segment_w{width}"), |b| {
            b.iter(|| {
                black_box(rasterizer.stroke_segment(&mut buffer, (10, 20), (480, 400), style))
            })
        });
    }
}

fn bench_snapshot(c: &mut Criterion) {
    let buffer = RgbaBuffer::new(512, 512, Color::WHITE);
    c.bench_function("snapshot_encode_512", |b| {
        b.iter(|| black_box(Snapshot::encode(&buffer)))
    });
}

criterion_group!(benches, bench_flood_fill, bench_segments, bench_snapshot);
criterion_main!(benches);
