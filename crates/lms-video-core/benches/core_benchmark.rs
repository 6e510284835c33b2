//! Benchmark tests for lms-video-core operations
//!
//! Run with: cargo bench -p lms-video-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

use lms_video_core::grading::{GraderConfig, GraderKind, GraderSeeds};
use lms_video_core::{time, MemorySink, Player, PlayerConfig, PlayerEvent, ScriptedBackend};

// ============================================================================
// Helpers
// ============================================================================

fn scored_config() -> PlayerConfig {
    let mut config = PlayerConfig {
        id: "bench-video".to_string(),
        has_score: true,
        autohide_html5: true,
        ..Default::default()
    };
    config.graders.insert(GraderKind::GradeOnPercent, GraderConfig { grader_value: 90, ..Default::default() });
    config.graders.insert(GraderKind::GradeOnEnd, GraderConfig::default());
    config
}

fn create_player(duration: f64) -> (Player, ScriptedBackend) {
    let backend = ScriptedBackend::new(duration);
    let mut player = Player::builder(scored_config())
        .backend(backend.clone())
        .sink(MemorySink::new())
        .build()
        .unwrap();
    player.install_default_widgets(&GraderSeeds::new()).unwrap();
    (player, backend)
}

// ============================================================================
// Time Benchmarks
// ============================================================================

fn bench_time(c: &mut Criterion) {
    let mut group = c.benchmark_group("Time Formatting");

    for &seconds in &[59.0, 3599.0, 36_000.0] {
        group.bench_with_input(BenchmarkId::new("format", seconds), &seconds, |b, &s| {
            b.iter(|| black_box(time::format(black_box(s), false)))
        });
        group.bench_with_input(BenchmarkId::new("describe", seconds), &seconds, |b, &s| {
            b.iter(|| black_box(time::describe(black_box(s))))
        });
    }

    group.bench_function("convert", |b| b.iter(|| black_box(time::convert(black_box(123.456), 1.0, 1.5))));
    group.finish();
}

// ============================================================================
// Player Benchmarks
// ============================================================================

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("Event Dispatch");

    group.bench_function("play_pause", |b| {
        let (mut player, _) = create_player(600.0);
        b.iter(|| {
            player.emit(PlayerEvent::Play);
            player.emit(PlayerEvent::Pause);
        });
    });

    group.bench_function("slider_drag", |b| {
        let (mut player, _) = create_player(600.0);
        b.iter(|| {
            for step in 0..10 {
                player.emit(PlayerEvent::SliderSlide { time: step as f64 * 10.0 });
            }
            player.emit(PlayerEvent::SliderStop { time: 95.0 });
            player.advance(Duration::from_millis(200));
        });
    });

    group.finish();
}

fn bench_playback(c: &mut Criterion) {
    let mut group = c.benchmark_group("Playback Session");

    for &duration in &[10.0, 600.0] {
        group.bench_with_input(BenchmarkId::new("full_clip", duration), &duration, |b, &duration| {
            b.iter(|| {
                let (mut player, backend) = create_player(duration);
                player.emit(PlayerEvent::Play);

                let ticks = (duration / 0.2) as u32;
                for tick in 0..=ticks {
                    backend.set_time(tick as f64 * 0.2);
                    player.sync_time();
                    player.advance(Duration::from_millis(200));
                }
                player.emit(PlayerEvent::Ended);
                black_box(player.take_outbound())
            });
        });
    }

    group.finish();
}

criterion_group!(time_benches, bench_time);

criterion_group!(player_benches, bench_dispatch, bench_playback);

criterion_main!(time_benches, player_benches);
