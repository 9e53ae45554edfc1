//! Core catalog data model.
//!
//! Defines the [`Song`] record as the catalog store hands it out, the
//! [`HistoryEntry`] ledger row, and the [`Playlist`] projection. Songs are
//! immutable apart from their `views`/`likes` counters, which only move
//! through the explicit increment/decrement store operations.

use serde::{Deserialize, Serialize};

/// Fallback cover for playlists without any songs.
pub const DEFAULT_COVER_IMG: i64 = 1_763_075;

/// One catalog record.
///
/// `file_id` is the stable primary key. Tags are kept lowercase; the store
/// normalizes them on the way in so every comparison in the scoring engine
/// is a plain equality check.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub file_id: i64,
    #[serde(default)]
    pub img_id: i64,
    pub name: String,
    pub artist: String,
    /// Language code, e.g. "en".
    pub language: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub likes: i64,
    /// Read-time annotation from the user's liked set. Never persisted on
    /// the song row itself.
    #[serde(default, skip_serializing)]
    pub is_liked: bool,
}

impl Song {
    /// Lowercase all tags in place. Called once at the store boundary so
    /// downstream comparisons are plain equality checks.
    pub fn normalize(&mut self) {
        for tag in &mut self.tags {
            *tag = tag.to_lowercase();
        }
    }

    /// Derived image reference for the song's `img_id`.
    #[must_use]
    pub fn image_url(&self) -> String {
        image_url_for(self.img_id)
    }

    /// Annotate this song with liked-set membership.
    #[must_use]
    pub fn with_liked(mut self, liked: bool) -> Self {
        self.is_liked = liked;
        self
    }

    /// Popularity composite used by the trending ranker.
    #[must_use]
    pub fn popularity(&self) -> i64 {
        self.views + self.likes
    }
}

fn image_url_for(img_id: i64) -> String {
    format!(
        "https://images.pexels.com/photos/{img_id}/pexels-photo-{img_id}.jpeg?auto=compress&cs=tinysrgb&w=300"
    )
}

/// One row of the listening-history ledger for a single user.
///
/// There is one logical entry per (user, song) pair; minutes only ever
/// accrue additively. The joined `song` is `None` when the history row
/// outlived its catalog record.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub song_id: i64,
    pub minutes_listened: f64,
    pub song: Option<Song>,
}

/// A user's playlist with its member songs.
///
/// The identifier is the string form of the store's integer primary key,
/// which is how the presentation layer addresses playlists.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub songs: Vec<Song>,
}

impl Playlist {
    #[must_use]
    pub fn song_count(&self) -> usize {
        self.songs.len()
    }

    /// Cover image: first song's image, or the default reference for an
    /// empty playlist.
    #[must_use]
    pub fn cover_image(&self) -> String {
        self.songs
            .first()
            .map(Song::image_url)
            .unwrap_or_else(|| image_url_for(DEFAULT_COVER_IMG))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(id: i64) -> Song {
        Song {
            file_id: id,
            img_id: 42,
            name: format!("Song {id}"),
            artist: "Artist".to_string(),
            language: "en".to_string(),
            tags: vec!["Rock".to_string(), "INDIE".to_string()],
            views: 10,
            likes: 3,
            is_liked: false,
        }
    }

    #[test]
    fn normalize_lowercases_tags() {
        let mut s = song(1);
        s.normalize();
        assert_eq!(s.tags, vec!["rock".to_string(), "indie".to_string()]);
    }

    #[test]
    fn image_url_embeds_img_id() {
        let s = song(1);
        let url = s.image_url();
        assert!(url.contains("/42/"));
        assert!(url.contains("pexels-photo-42"));
    }

    #[test]
    fn popularity_is_views_plus_likes() {
        assert_eq!(song(1).popularity(), 13);
    }

    #[test]
    fn liked_annotation_is_not_serialized() {
        let s = song(1).with_liked(true);
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("is_liked"));

        let back: Song = serde_json::from_str(&json).unwrap();
        assert!(!back.is_liked, "annotation must stay ephemeral");
    }

    #[test]
    fn playlist_cover_falls_back_to_default() {
        let empty = Playlist {
            id: "1".to_string(),
            name: "Empty".to_string(),
            songs: vec![],
        };
        assert!(empty.cover_image().contains(&DEFAULT_COVER_IMG.to_string()));

        let full = Playlist {
            id: "2".to_string(),
            name: "Full".to_string(),
            songs: vec![song(7)],
        };
        assert!(full.cover_image().contains("/42/"));
    }
}
