//! Ranking pipelines built on the scorers.
//!
//! Each ranker filters the catalog down to its candidate set, scores every
//! candidate, and returns the songs ordered best-first with the mode's
//! result cap applied. Scores are an internal ordering detail and are not
//! returned to callers.

use crate::affinity::AffinityProfile;
use crate::scoring::{
    score_affinity, score_for_you, score_next_song, AffinityWeights, ForYouWeights,
    NextSongWeights,
};
use crate::song::Song;
use rand::Rng;
use rayon::prelude::*;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

/// Result cap for queue continuation.
pub const NEXT_SONGS_LIMIT: usize = 10;
/// Result cap for batch expansion.
pub const AFFINITY_BATCH_LIMIT: usize = 15;
/// Result cap for the trending shelf.
pub const TRENDING_LIMIT: usize = 15;

#[derive(Debug, Clone, PartialEq)]
struct ScoredCandidate {
    song: Song,
    score: f64,
}

/// Sort best-first. Equal scores keep candidate order since the sort is
/// stable, which pins down ordering in the deterministic modes.
fn sort_scored(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn take_songs(mut candidates: Vec<ScoredCandidate>, limit: usize) -> Vec<Song> {
    sort_scored(&mut candidates);
    candidates.truncate(limit);
    candidates.into_iter().map(|c| c.song).collect()
}

/// Songs to play after `current`: same-language catalog entries that are
/// neither the current song nor in `exclude` (already queued / recently
/// played), scored for similarity and the user's own listening time.
pub fn rank_next_songs(
    catalog: &[Song],
    current: &Song,
    exclude: &HashSet<i64>,
    minutes_by_song: &HashMap<i64, f64>,
    liked: &HashSet<i64>,
    weights: &NextSongWeights,
    rng: &mut impl Rng,
) -> Vec<Song> {
    let candidates = catalog
        .iter()
        .filter(|s| {
            s.file_id != current.file_id
                && s.language == current.language
                && !exclude.contains(&s.file_id)
        })
        .map(|s| ScoredCandidate {
            score: score_next_song(
                s,
                current,
                minutes_by_song.get(&s.file_id).copied().unwrap_or(0.0),
                liked.contains(&s.file_id),
                weights,
                rng,
            ),
            song: s.clone(),
        })
        .collect();
    take_songs(candidates, NEXT_SONGS_LIMIT)
}

/// Songs similar to a seed batch ("more like these"). An empty batch has
/// no signal to expand and yields nothing. Candidates share the first
/// batch song's language and are neither seeds nor in `exclude`.
pub fn rank_affinity_batch(
    catalog: &[Song],
    batch: &[Song],
    exclude: &HashSet<i64>,
    liked: &HashSet<i64>,
    weights: &AffinityWeights,
    rng: &mut impl Rng,
) -> Vec<Song> {
    let Some(first) = batch.first() else {
        return Vec::new();
    };
    let profile = AffinityProfile::from_songs(batch);
    let languages = AffinityProfile::batch_languages(batch);
    let batch_ids: HashSet<i64> = batch.iter().map(|s| s.file_id).collect();

    let candidates = catalog
        .iter()
        .filter(|s| {
            s.language == first.language
                && !batch_ids.contains(&s.file_id)
                && !exclude.contains(&s.file_id)
        })
        .map(|s| ScoredCandidate {
            score: score_affinity(
                s,
                &profile,
                &languages,
                liked.contains(&s.file_id),
                weights,
                rng,
            ),
            song: s.clone(),
        })
        .collect();
    take_songs(candidates, AFFINITY_BATCH_LIMIT)
}

/// The whole catalog ranked against the user's taste profile, with songs
/// already in their history removed. Deterministic, so scoring fans out
/// across threads and the stable sort fixes the final order.
pub fn rank_for_you(
    catalog: &[Song],
    history_ids: &HashSet<i64>,
    profile: &AffinityProfile,
    weights: &ForYouWeights,
) -> Vec<Song> {
    let candidates: Vec<ScoredCandidate> = catalog
        .par_iter()
        .filter(|s| !history_ids.contains(&s.file_id))
        .map(|s| ScoredCandidate {
            score: score_for_you(s, profile, weights),
            song: s.clone(),
        })
        .collect();
    take_songs(candidates, usize::MAX)
}

/// Top of the catalog by raw popularity. Stable: equal counters keep the
/// store's views-descending order.
pub fn rank_trending(catalog: &[Song]) -> Vec<Song> {
    let mut songs: Vec<Song> = catalog.to_vec();
    songs.sort_by_key(|s| Reverse(s.popularity()));
    songs.truncate(TRENDING_LIMIT);
    songs
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn song(id: i64, artist: &str, language: &str, tags: &[&str], views: i64, likes: i64) -> Song {
        Song {
            file_id: id,
            name: format!("song-{id}"),
            artist: artist.to_string(),
            language: language.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            views,
            likes,
            ..Song::default()
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(99)
    }

    #[test]
    fn next_songs_filter_language_current_and_excluded() {
        let current = song(1, "a", "en", &["rock"], 0, 0);
        let catalog = vec![
            current.clone(),
            song(2, "a", "en", &["rock"], 0, 0),
            song(3, "b", "de", &["rock"], 0, 0),
            song(4, "b", "en", &[], 0, 0),
        ];
        let exclude: HashSet<i64> = [4].into_iter().collect();
        let out = rank_next_songs(
            &catalog,
            &current,
            &exclude,
            &HashMap::new(),
            &HashSet::new(),
            &NextSongWeights::default(),
            &mut rng(),
        );
        let ids: Vec<i64> = out.iter().map(|s| s.file_id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn artist_match_outranks_single_tag_match() {
        // Same-artist credit (25) beats one shared tag (15) even with the
        // worst-case jitter spread of 3.
        let current = song(1, "shared", "en", &["rock"], 0, 0);
        let catalog = vec![
            song(2, "other", "en", &["rock"], 0, 0),
            song(3, "shared", "en", &[], 0, 0),
        ];
        let out = rank_next_songs(
            &catalog,
            &current,
            &HashSet::new(),
            &HashMap::new(),
            &HashSet::new(),
            &NextSongWeights::default(),
            &mut rng(),
        );
        assert_eq!(out[0].file_id, 3);
        assert_eq!(out[1].file_id, 2);
    }

    #[test]
    fn popular_artist_match_beats_obscure_tag_match() {
        // Weight-ordering regression: candidate 3 shares the reference's
        // artist and carries heavy counters, candidate 2 only shares a
        // tag. The artist weight plus log-damped popularity must dominate
        // across any jitter draw.
        let current = song(1, "A", "en", &["rock"], 100, 10);
        let catalog = vec![
            song(2, "B", "en", &["rock"], 5, 1),
            song(3, "A", "en", &["jazz"], 1000, 500),
        ];
        for seed in 0..20 {
            let out = rank_next_songs(
                &catalog,
                &current,
                &HashSet::new(),
                &HashMap::new(),
                &HashSet::new(),
                &NextSongWeights::default(),
                &mut StdRng::seed_from_u64(seed),
            );
            assert_eq!(out[0].file_id, 3, "seed {seed}");
        }
    }

    #[test]
    fn next_songs_cap_at_ten() {
        let current = song(0, "a", "en", &[], 0, 0);
        let catalog: Vec<Song> = (1..=25).map(|i| song(i, "b", "en", &[], 0, 0)).collect();
        let out = rank_next_songs(
            &catalog,
            &current,
            &HashSet::new(),
            &HashMap::new(),
            &HashSet::new(),
            &NextSongWeights::default(),
            &mut rng(),
        );
        assert_eq!(out.len(), NEXT_SONGS_LIMIT);
    }

    #[test]
    fn empty_batch_expands_to_nothing() {
        let catalog = vec![song(1, "a", "en", &["rock"], 10, 10)];
        let out = rank_affinity_batch(
            &catalog,
            &[],
            &HashSet::new(),
            &HashSet::new(),
            &AffinityWeights::default(),
            &mut rng(),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn batch_expansion_excludes_seeds_and_caps_at_fifteen() {
        let batch = vec![song(1, "seed", "en", &["rock"], 0, 0)];
        let catalog: Vec<Song> = (1..=30)
            .map(|i| song(i, "x", "en", &["rock"], 0, 0))
            .collect();
        let exclude: HashSet<i64> = [2].into_iter().collect();
        let out = rank_affinity_batch(
            &catalog,
            &batch,
            &exclude,
            &HashSet::new(),
            &AffinityWeights::default(),
            &mut rng(),
        );
        assert_eq!(out.len(), AFFINITY_BATCH_LIMIT);
        assert!(out.iter().all(|s| s.file_id != 1 && s.file_id != 2));
    }

    #[test]
    fn batch_expansion_keeps_only_the_lead_language() {
        let batch = vec![
            song(1, "seed", "en", &["rock"], 0, 0),
            song(2, "seed", "de", &["rock"], 0, 0),
        ];
        let catalog = vec![
            song(3, "x", "en", &["rock"], 0, 0),
            song(4, "x", "de", &["rock"], 0, 0),
        ];
        let out = rank_affinity_batch(
            &catalog,
            &batch,
            &HashSet::new(),
            &HashSet::new(),
            &AffinityWeights::default(),
            &mut rng(),
        );
        let ids: Vec<i64> = out.iter().map(|s| s.file_id).collect();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn for_you_removes_history_and_keeps_full_remainder() {
        let profile = AffinityProfile {
            tags: vec!["rock".to_string()],
            artists: vec!["a".to_string()],
            language: None,
        };
        let catalog = vec![
            song(1, "a", "en", &["rock"], 0, 0),
            song(2, "b", "en", &[], 500, 0),
            song(3, "c", "en", &["rock"], 0, 0),
        ];
        let history: HashSet<i64> = [1].into_iter().collect();
        let out = rank_for_you(&catalog, &history, &profile, &ForYouWeights::default());
        let ids: Vec<i64> = out.iter().map(|s| s.file_id).collect();
        // Song 2's raw popularity (500) beats song 3's tag match (10).
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn for_you_empty_profile_orders_by_popularity() {
        let profile = AffinityProfile::default();
        let catalog = vec![
            song(1, "a", "en", &[], 5, 0),
            song(2, "b", "en", &[], 50, 0),
        ];
        let out = rank_for_you(&catalog, &HashSet::new(), &profile, &ForYouWeights::default());
        let ids: Vec<i64> = out.iter().map(|s| s.file_id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn trending_orders_by_views_plus_likes_and_ties_keep_input_order() {
        let catalog = vec![
            song(1, "a", "en", &[], 10, 0),
            song(2, "b", "en", &[], 5, 5),
            song(3, "c", "en", &[], 30, 0),
        ];
        let out = rank_trending(&catalog);
        let ids: Vec<i64> = out.iter().map(|s| s.file_id).collect();
        // 1 and 2 tie at 10; input order breaks the tie.
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn trending_caps_at_fifteen() {
        let catalog: Vec<Song> = (1..=40).map(|i| song(i, "a", "en", &[], i, 0)).collect();
        let out = rank_trending(&catalog);
        assert_eq!(out.len(), TRENDING_LIMIT);
        assert_eq!(out[0].file_id, 40);
    }
}
