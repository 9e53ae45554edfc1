//! Taste-profile extraction from listening history.
//!
//! A profile is built from the user's top listened songs: the five most
//! frequent tags, the five most frequent artists, and the language of the
//! single most-listened song. Frequency ties break toward the value seen
//! first, so profiles are deterministic for a given history ordering.

use crate::song::{HistoryEntry, Song};
use std::collections::HashMap;

/// How many history entries feed the profile.
const HISTORY_WINDOW: usize = 15;
/// How many top tags and artists the profile keeps.
const PROFILE_WIDTH: usize = 5;

/// A user's extracted taste profile. All strings are lowercase.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AffinityProfile {
    pub tags: Vec<String>,
    pub artists: Vec<String>,
    /// Language of the most-listened song, if any history exists.
    pub language: Option<String>,
}

impl AffinityProfile {
    /// Whether the profile carries no signal at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.artists.is_empty() && self.language.is_none()
    }

    /// Build a profile from listening history. Only the top
    /// [`HISTORY_WINDOW`] entries by minutes listened contribute; entries
    /// without catalog metadata are skipped.
    #[must_use]
    pub fn extract(history: &[HistoryEntry]) -> Self {
        let mut ordered: Vec<&HistoryEntry> = history.iter().collect();
        ordered.sort_by(|a, b| {
            b.minutes_listened
                .partial_cmp(&a.minutes_listened)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ordered.truncate(HISTORY_WINDOW);

        let mut tag_counts: Vec<(String, usize)> = Vec::new();
        let mut artist_counts: Vec<(String, usize)> = Vec::new();
        let mut language = None;

        for entry in &ordered {
            let Some(song) = entry.song.as_ref() else {
                continue;
            };
            if language.is_none() {
                language = Some(song.language.clone());
            }
            for tag in &song.tags {
                bump(&mut tag_counts, &tag.to_lowercase());
            }
            bump(&mut artist_counts, &song.artist.to_lowercase());
        }

        Self {
            tags: top(tag_counts),
            artists: top(artist_counts),
            language,
        }
    }

    /// Build a batch profile from a set of seed songs (the "more like
    /// these" flow). Every tag and artist of the batch participates, and
    /// the profile language is the first song's.
    #[must_use]
    pub fn from_songs(songs: &[Song]) -> Self {
        let mut tags: Vec<String> = Vec::new();
        let mut artists: Vec<String> = Vec::new();
        for song in songs {
            for tag in &song.tags {
                let tag = tag.to_lowercase();
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
            let artist = song.artist.to_lowercase();
            if !artists.contains(&artist) {
                artists.push(artist);
            }
        }
        Self {
            tags,
            artists,
            language: songs.first().map(|s| s.language.clone()),
        }
    }

    /// Languages spanned by a batch of seed songs, deduplicated in
    /// encounter order.
    #[must_use]
    pub fn batch_languages(songs: &[Song]) -> Vec<String> {
        let mut languages: Vec<String> = Vec::new();
        for song in songs {
            if !languages.contains(&song.language) {
                languages.push(song.language.clone());
            }
        }
        languages
    }
}

/// Increment `value`'s count, appending on first sight. Encounter order is
/// what later breaks frequency ties.
fn bump(counts: &mut Vec<(String, usize)>, value: &str) {
    match counts.iter_mut().find(|(v, _)| v == value) {
        Some((_, n)) => *n += 1,
        None => counts.push((value.to_string(), 1)),
    }
}

/// The [`PROFILE_WIDTH`] most frequent values. The sort is stable, so equal
/// counts keep encounter order.
fn top(counts: Vec<(String, usize)>) -> Vec<String> {
    let mut counts = counts;
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(PROFILE_WIDTH)
        .map(|(value, _)| value)
        .collect()
}
