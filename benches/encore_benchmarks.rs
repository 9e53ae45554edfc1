//! # Encore Performance Benchmarks
//!
//! Benchmarks for the scoring and ranking hot paths plus the store
//! operations the engine leans on.
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Run specific benchmark group
//! cargo bench scoring
//! cargo bench ranking
//! cargo bench store
//! ```

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use encore::affinity::AffinityProfile;
use encore::recommend::{rank_for_you, rank_next_songs, rank_trending};
use encore::scoring::{score_next_song, ForYouWeights, NextSongWeights};
use encore::song::{HistoryEntry, Song};
use encore::store::{CatalogStore, SqliteStore};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::hint::black_box;

/// Helper to generate a realistic catalog: 20 artists, 8 languages, a
/// small pool of tags, skewed popularity.
fn create_test_catalog(count: usize) -> Vec<Song> {
    let tags = ["rock", "pop", "indie", "ambient", "jazz", "folk", "lofi", "metal"];
    (1..=count)
        .map(|i| Song {
            file_id: i as i64,
            name: format!("Song {i:05}"),
            artist: format!("Artist {}", (i - 1) % 20 + 1),
            language: format!("lang{}", (i - 1) % 8),
            tags: vec![
                tags[i % tags.len()].to_string(),
                tags[(i * 3) % tags.len()].to_string(),
            ],
            views: ((i * 37) % 5000) as i64,
            likes: ((i * 13) % 800) as i64,
            ..Song::default()
        })
        .collect()
}

fn create_test_history(catalog: &[Song], count: usize) -> Vec<HistoryEntry> {
    catalog
        .iter()
        .take(count)
        .enumerate()
        .map(|(i, song)| HistoryEntry {
            song_id: song.file_id,
            minutes_listened: (count - i) as f64 * 1.5,
            song: Some(song.clone()),
        })
        .collect()
}

/// Benchmark per-candidate scoring
fn benchmark_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoring");

    let catalog = create_test_catalog(2);
    let weights = NextSongWeights::default();

    group.bench_function("single_next_song_score", |b| {
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| {
            score_next_song(
                black_box(&catalog[1]),
                black_box(&catalog[0]),
                black_box(4.2),
                black_box(true),
                &weights,
                &mut rng,
            )
        })
    });

    group.finish();
}

/// Benchmark the ranking pipelines over growing catalogs
fn benchmark_ranking(c: &mut Criterion) {
    let mut group = c.benchmark_group("ranking");

    for size in [100, 1000, 10_000].iter() {
        let catalog = create_test_catalog(*size);
        let current = catalog[0].clone();
        let weights = NextSongWeights::default();
        let minutes: HashMap<i64, f64> = HashMap::new();
        let liked: HashSet<i64> = (1..50).collect();

        group.bench_with_input(BenchmarkId::new("next_songs", size), &catalog, |b, catalog| {
            let mut rng = StdRng::seed_from_u64(7);
            b.iter(|| {
                rank_next_songs(
                    black_box(catalog),
                    black_box(&current),
                    &HashSet::new(),
                    &minutes,
                    &liked,
                    &weights,
                    &mut rng,
                )
            })
        });

        let history = create_test_history(&catalog, 15);
        let profile = AffinityProfile::extract(&history);
        let history_ids: HashSet<i64> = history.iter().map(|e| e.song_id).collect();
        let for_you_weights = ForYouWeights::default();

        group.bench_with_input(BenchmarkId::new("for_you", size), &catalog, |b, catalog| {
            b.iter(|| {
                rank_for_you(
                    black_box(catalog),
                    &history_ids,
                    &profile,
                    &for_you_weights,
                )
            })
        });

        group.bench_with_input(BenchmarkId::new("trending", size), &catalog, |b, catalog| {
            b.iter(|| rank_trending(black_box(catalog)))
        });
    }

    group.finish();
}

/// Benchmark profile extraction over growing histories
fn benchmark_affinity(c: &mut Criterion) {
    let mut group = c.benchmark_group("affinity");

    let catalog = create_test_catalog(1000);
    for size in [15, 100, 1000].iter() {
        let history = create_test_history(&catalog, *size);
        group.bench_with_input(
            BenchmarkId::new("extract_profile", size),
            &history,
            |b, history| b.iter(|| AffinityProfile::extract(black_box(history))),
        );
    }

    group.finish();
}

/// Benchmark store operations on an in-memory database
fn benchmark_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");

    let catalog = create_test_catalog(1000);

    group.bench_function("import_1000_songs", |b| {
        b.iter_batched(
            || SqliteStore::open_in_memory().expect("Failed to open in-memory store"),
            |store| {
                store.import_songs(black_box(&catalog)).expect("Import failed");
                black_box(store)
            },
            BatchSize::SmallInput,
        )
    });

    let store = SqliteStore::open_in_memory().expect("Failed to open in-memory store");
    store.import_songs(&catalog).expect("Import failed");

    group.bench_function("fetch_1000_songs", |b| {
        b.iter(|| store.fetch_songs().expect("Fetch failed"))
    });

    group.bench_function("history_upsert", |b| {
        b.iter(|| {
            store
                .upsert_history_minutes(black_box("bench-user"), black_box(42), black_box(1.25))
                .expect("Upsert failed")
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_scoring,
    benchmark_ranking,
    benchmark_affinity,
    benchmark_store
);

criterion_main!(benches);
