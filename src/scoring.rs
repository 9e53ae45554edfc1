//! Candidate scoring for the three recommendation modes.
//!
//! All three scorers are pure over their inputs; the two jittered modes
//! take the random source as a parameter so callers (and tests) control
//! determinism. Weights live in plain structs with `Default` carrying the
//! production values, so experiments can rescale a term without touching
//! the formulas.

use crate::affinity::AffinityProfile;
use crate::song::Song;
use rand::Rng;
use std::collections::HashSet;

/// Weights for queue continuation ("what plays after this song").
#[derive(Debug, Clone, Copy)]
pub struct NextSongWeights {
    pub tag_overlap: f64,
    pub same_artist: f64,
    pub same_language: f64,
    /// Per-minute credit for the user's own listening time on the
    /// candidate, capped at `minutes_cap`.
    pub minutes_per: f64,
    pub minutes_cap: f64,
    pub log_likes: f64,
    pub log_views: f64,
    pub liked_bonus: f64,
    /// Upper bound of the uniform tie-break jitter.
    pub jitter: f64,
}

impl Default for NextSongWeights {
    fn default() -> Self {
        Self {
            tag_overlap: 15.0,
            same_artist: 25.0,
            same_language: 10.0,
            minutes_per: 2.0,
            minutes_cap: 20.0,
            log_likes: 2.0,
            log_views: 1.0,
            liked_bonus: 8.0,
            jitter: 3.0,
        }
    }
}

/// Weights for batch expansion ("more songs like these").
#[derive(Debug, Clone, Copy)]
pub struct AffinityWeights {
    pub tag_match: f64,
    pub artist_match: f64,
    pub language_match: f64,
    pub log_likes: f64,
    pub log_views: f64,
    pub liked_bonus: f64,
    pub jitter: f64,
}

impl Default for AffinityWeights {
    fn default() -> Self {
        Self {
            tag_match: 25.0,
            artist_match: 30.0,
            language_match: 15.0,
            log_likes: 2.0,
            log_views: 1.0,
            liked_bonus: 10.0,
            jitter: 2.0,
        }
    }
}

/// Weights for the personalized full-catalog ranking. Deterministic: no
/// jitter, and popularity enters raw rather than log-damped.
#[derive(Debug, Clone, Copy)]
pub struct ForYouWeights {
    pub tag_match: f64,
    pub artist_match: f64,
}

impl Default for ForYouWeights {
    fn default() -> Self {
        Self {
            tag_match: 10.0,
            artist_match: 20.0,
        }
    }
}

/// Count of candidate tags present in `reference`. Tags are stored
/// lowercase, so membership is a straight set probe.
fn tag_overlap(candidate: &Song, reference: &HashSet<&str>) -> f64 {
    candidate
        .tags
        .iter()
        .filter(|t| reference.contains(t.as_str()))
        .count() as f64
}

/// Log-damped popularity term shared by the jittered modes. `ln(1 + n)`
/// keeps huge counters from drowning the similarity signal.
fn damped_popularity(song: &Song, log_likes: f64, log_views: f64) -> f64 {
    log_likes * (1.0 + song.likes as f64).ln() + log_views * (1.0 + song.views as f64).ln()
}

/// Score `candidate` as a continuation of `current`. `minutes` is the
/// user's own listening time on the candidate, `liked` whether the
/// candidate is in their liked set.
pub fn score_next_song(
    candidate: &Song,
    current: &Song,
    minutes: f64,
    liked: bool,
    weights: &NextSongWeights,
    rng: &mut impl Rng,
) -> f64 {
    let current_tags: HashSet<&str> = current.tags.iter().map(String::as_str).collect();
    let mut score = weights.tag_overlap * tag_overlap(candidate, &current_tags);
    if candidate.artist == current.artist {
        score += weights.same_artist;
    }
    if candidate.language == current.language {
        score += weights.same_language;
    }
    score += (weights.minutes_per * minutes).min(weights.minutes_cap);
    score += damped_popularity(candidate, weights.log_likes, weights.log_views);
    if liked {
        score += weights.liked_bonus;
    }
    score + rng.gen_range(0.0..weights.jitter)
}

/// Score `candidate` against a batch profile. `batch_languages` is the set
/// of languages the seed songs span.
pub fn score_affinity(
    candidate: &Song,
    profile: &AffinityProfile,
    batch_languages: &[String],
    liked: bool,
    weights: &AffinityWeights,
    rng: &mut impl Rng,
) -> f64 {
    let profile_tags: HashSet<&str> = profile.tags.iter().map(String::as_str).collect();
    let mut score = weights.tag_match * tag_overlap(candidate, &profile_tags);
    if profile.artists.contains(&candidate.artist.to_lowercase()) {
        score += weights.artist_match;
    }
    if batch_languages.contains(&candidate.language) {
        score += weights.language_match;
    }
    score += damped_popularity(candidate, weights.log_likes, weights.log_views);
    if liked {
        score += weights.liked_bonus;
    }
    score + rng.gen_range(0.0..weights.jitter)
}

/// Score `candidate` against a taste profile for the personalized catalog
/// ranking. Fully deterministic.
pub fn score_for_you(candidate: &Song, profile: &AffinityProfile, weights: &ForYouWeights) -> f64 {
    let profile_tags: HashSet<&str> = profile.tags.iter().map(String::as_str).collect();
    let mut score = weights.tag_match * tag_overlap(candidate, &profile_tags);
    if profile.artists.contains(&candidate.artist.to_lowercase()) {
        score += weights.artist_match;
    }
    score + candidate.popularity() as f64
}
