use criterion::{criterion_group, criterion_main, Criterion};
use repetition_matrix_core::{analyze_text, RenderEngine, ViewportHandle, VisualizerConfig};

const FRAME_MS: f64 = 1000.0 / 60.0;

/// Lyrics whose field holds `words²` points.
fn lyrics(words: usize) -> String {
    (0..words).map(|i| format!("w{} ", i % 40)).collect()
}

fn steady_frame_benchmark(c: &mut Criterion) {
    let config = VisualizerConfig::deterministic(11);
    let mut group = c.benchmark_group("RenderEngine");
    group.sample_size(20);

    for words in [64, 180] {
        let analysis = analyze_text(&lyrics(words));
        let mut engine = RenderEngine::from_analysis(&config, &analysis, ViewportHandle::new(720));
        // Past the reveal, so every point is stamped.
        engine.render(0.0);
        engine.render(10_000.0);

        let mut time = 10_000.0;
        group.bench_function(format!("steady_frame_{}_points", words * words), |b| {
            b.iter(|| {
                time += FRAME_MS;
                engine.render(std::hint::black_box(time))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, steady_frame_benchmark);
criterion_main!(benches);
