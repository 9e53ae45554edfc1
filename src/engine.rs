//! The engine facade.
//!
//! One `Engine` ties a store, the catalog caches, and the session tracker
//! together for a single active user. Read accessors degrade to empty
//! results on store failure (logged, never propagated); mutating
//! operations return the error so the caller decides how loudly to fail.

use crate::affinity::AffinityProfile;
use crate::cache::CatalogCache;
use crate::mutations;
use crate::recommend::{
    rank_affinity_batch, rank_for_you, rank_next_songs, rank_trending,
};
use crate::scoring::{AffinityWeights, ForYouWeights, NextSongWeights};
use crate::session::SessionTracker;
use crate::song::{HistoryEntry, Playlist, Song};
use crate::store::CatalogStore;
use anyhow::{bail, Context, Result};
use log::{error, info};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// How many recently played songs the facade exposes.
pub const RECENTLY_PLAYED_LIMIT: usize = 9;

pub struct Engine<S: CatalogStore> {
    store: S,
    cache: CatalogCache,
    tracker: SessionTracker,
    user: Option<String>,
    next_weights: NextSongWeights,
    affinity_weights: AffinityWeights,
    for_you_weights: ForYouWeights,
}

impl<S: CatalogStore> Engine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: CatalogCache::new(),
            tracker: SessionTracker::new(),
            user: None,
            next_weights: NextSongWeights::default(),
            affinity_weights: AffinityWeights::default(),
            for_you_weights: ForYouWeights::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Switch the active user (or sign out with `None`). Every cached
    /// projection and any in-flight listening span belongs to the old
    /// identity and is dropped.
    pub fn set_user(&mut self, user: Option<String>) {
        if self.user == user {
            return;
        }
        info!(
            "Active user changed to {}",
            user.as_deref().unwrap_or("<signed out>")
        );
        self.tracker.reset();
        self.cache.invalidate();
        self.user = user;
    }

    fn require_user(&self) -> Result<&str> {
        match self.user.as_deref() {
            Some(user) => Ok(user),
            None => bail!("No active user; log in first"),
        }
    }

    /// The catalog with the active user's liked markers applied, in the
    /// store's views-descending order. Signed out there is nothing to
    /// serve: every derived list is empty until a user is active.
    pub fn catalog(&self) -> Vec<Song> {
        if self.user.is_none() {
            return Vec::new();
        }
        match self.annotated_catalog() {
            Ok(songs) => songs,
            Err(err) => {
                error!("Catalog unavailable: {err:#}");
                Vec::new()
            }
        }
    }

    fn annotated_catalog(&self) -> Result<Vec<Song>> {
        let songs = self.cache.songs(&self.store)?;
        let liked = self.liked_ids()?;
        Ok(songs
            .iter()
            .map(|s| s.clone().with_liked(liked.contains(&s.file_id)))
            .collect())
    }

    fn liked_ids(&self) -> Result<Arc<HashSet<i64>>> {
        match self.user.as_deref() {
            Some(user) => self.cache.liked_ids(&self.store, user),
            None => Ok(Arc::new(HashSet::new())),
        }
    }

    /// Most popular songs in the catalog.
    pub fn trending(&self) -> Vec<Song> {
        rank_trending(&self.catalog())
    }

    /// The full catalog ranked for the active user's taste, minus songs
    /// already in their history. Empty when signed out, like every other
    /// catalog-derived list.
    pub fn for_you(&self) -> Vec<Song> {
        let (profile, history_ids) = match self.history() {
            Ok(history) => (
                AffinityProfile::extract(&history),
                history.iter().map(|e| e.song_id).collect(),
            ),
            Err(err) => {
                error!("History unavailable, ranking without profile: {err:#}");
                (AffinityProfile::default(), HashSet::new())
            }
        };
        rank_for_you(&self.catalog(), &history_ids, &profile, &self.for_you_weights)
    }

    /// Suggestions for what to play after `current_id`. Excluded ids (the
    /// rest of the queue, typically) never appear.
    pub fn next_songs(
        &self,
        current_id: i64,
        exclude: &HashSet<i64>,
        rng: &mut impl Rng,
    ) -> Vec<Song> {
        let catalog = self.catalog();
        let Some(current) = catalog.iter().find(|s| s.file_id == current_id) else {
            error!("Cannot suggest continuations: song {current_id} not in catalog");
            return Vec::new();
        };
        let minutes = self.minutes_by_song();
        let liked = match self.liked_ids() {
            Ok(liked) => liked,
            Err(err) => {
                error!("Liked set unavailable: {err:#}");
                Arc::new(HashSet::new())
            }
        };
        rank_next_songs(
            &catalog,
            current,
            exclude,
            &minutes,
            &liked,
            &self.next_weights,
            rng,
        )
    }

    /// Songs similar to a seed batch, for "more like these" flows.
    pub fn affinity_batch(
        &self,
        batch_ids: &[i64],
        exclude: &HashSet<i64>,
        rng: &mut impl Rng,
    ) -> Vec<Song> {
        let catalog = self.catalog();
        let batch: Vec<Song> = batch_ids
            .iter()
            .filter_map(|id| catalog.iter().find(|s| s.file_id == *id).cloned())
            .collect();
        let liked = match self.liked_ids() {
            Ok(liked) => liked,
            Err(err) => {
                error!("Liked set unavailable: {err:#}");
                Arc::new(HashSet::new())
            }
        };
        rank_affinity_batch(
            &catalog,
            &batch,
            exclude,
            &liked,
            &self.affinity_weights,
            rng,
        )
    }

    /// The active user's liked songs, annotated and in catalog order.
    pub fn liked_songs(&self) -> Vec<Song> {
        self.catalog()
            .into_iter()
            .filter(|s| s.is_liked)
            .collect()
    }

    /// The active user's most-listened songs, capped at
    /// [`RECENTLY_PLAYED_LIMIT`].
    pub fn recently_played(&self) -> Vec<Song> {
        let history = match self.history() {
            Ok(history) => history,
            Err(err) => {
                error!("Recently played unavailable: {err:#}");
                return Vec::new();
            }
        };
        history
            .into_iter()
            .filter_map(|e| e.song)
            .take(RECENTLY_PLAYED_LIMIT)
            .collect()
    }

    /// The song the active user last started playing, if any.
    pub fn last_played(&self) -> Option<Song> {
        let user = self.user.as_deref()?;
        let id = match self.store.fetch_last_played(user) {
            Ok(id) => id?,
            Err(err) => {
                error!("Last played unavailable: {err:#}");
                return None;
            }
        };
        self.catalog().into_iter().find(|s| s.file_id == id)
    }

    /// The active user's playlists.
    pub fn playlists(&self) -> Vec<Playlist> {
        let Some(user) = self.user.as_deref() else {
            return Vec::new();
        };
        match self.store.fetch_playlists(user) {
            Ok(playlists) => playlists,
            Err(err) => {
                error!("Playlists unavailable: {err:#}");
                Vec::new()
            }
        }
    }

    fn history(&self) -> Result<Vec<HistoryEntry>> {
        match self.user.as_deref() {
            Some(user) => self
                .store
                .fetch_history(user)
                .context("Failed to load listening history"),
            None => Ok(Vec::new()),
        }
    }

    fn minutes_by_song(&self) -> HashMap<i64, f64> {
        match self.history() {
            Ok(history) => history
                .iter()
                .map(|e| (e.song_id, e.minutes_listened))
                .collect(),
            Err(err) => {
                error!("Listening minutes unavailable: {err:#}");
                HashMap::new()
            }
        }
    }

    /// Flip the liked state of `song_id` for the active user. Returns the
    /// new membership.
    pub fn toggle_like(&mut self, song_id: i64) -> Result<bool> {
        let user = self.require_user()?.to_string();
        let currently = self.liked_ids()?.contains(&song_id);
        mutations::toggle_like(&self.store, &self.cache, &user, song_id, currently)
    }

    pub fn create_playlist(&mut self, name: &str) -> Result<Playlist> {
        let user = self.require_user()?.to_string();
        mutations::create_playlist(&self.store, &user, name)
    }

    pub fn rename_playlist(&mut self, playlist_id: &str, name: &str) -> Result<()> {
        let user = self.require_user()?.to_string();
        mutations::rename_playlist(&self.store, &user, playlist_id, name)
    }

    pub fn delete_playlist(&mut self, playlist_id: &str) -> Result<()> {
        let user = self.require_user()?.to_string();
        mutations::delete_playlist(&self.store, &user, playlist_id)
    }

    pub fn add_playlist_song(&mut self, playlist_id: &str, song_id: i64) -> Result<()> {
        self.require_user()?;
        mutations::add_playlist_song(&self.store, playlist_id, song_id)
    }

    pub fn remove_playlist_song(&mut self, playlist_id: &str, song_id: i64) -> Result<()> {
        self.require_user()?;
        mutations::remove_playlist_song(&self.store, playlist_id, song_id)
    }

    /// Start (or switch) the active listening span.
    pub fn record_listening(&mut self, song_id: i64) -> Result<()> {
        let user = self.require_user()?.to_string();
        let result = self.tracker.record_listening(&self.store, &user, song_id);
        // Mirror the view bump into the cached catalog; no refetch needed.
        if result.is_ok() {
            self.cache.apply_play(song_id);
        }
        result
    }

    /// Close the active listening span, flushing its minutes.
    pub fn stop_tracking(&mut self) -> Result<()> {
        let user = self.require_user()?.to_string();
        self.tracker.stop(&self.store, &user)
    }

    #[must_use]
    pub fn currently_tracking(&self) -> Option<i64> {
        self.tracker.current_song()
    }

    /// Drop every cache so the next read round-trips to the store.
    pub fn refresh(&mut self) {
        self.cache.invalidate();
        info!("Caches dropped; next reads hit the store");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
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

    fn engine() -> Engine<MemoryStore> {
        let store = MemoryStore::with_songs(vec![
            song(1, "shared", "en", &["rock"], 100, 10),
            song(2, "other", "en", &["rock"], 50, 5),
            song(3, "shared", "en", &[], 10, 1),
            song(4, "other", "de", &["rock"], 500, 50),
        ]);
        let mut engine = Engine::new(store);
        engine.set_user(Some("alice".to_string()));
        engine
    }

    #[test]
    fn signed_out_reads_are_all_empty() {
        let mut engine = engine();
        engine.set_user(None);
        assert!(engine.catalog().is_empty());
        assert!(engine.trending().is_empty());
        assert!(engine.for_you().is_empty());
        assert!(engine.liked_songs().is_empty());
        assert!(engine.recently_played().is_empty());
        assert!(engine.playlists().is_empty());
        assert!(engine.last_played().is_none());
        assert!(engine.toggle_like(1).is_err());
    }

    #[test]
    fn catalog_is_annotated_with_liked_markers() {
        let mut engine = engine();
        engine.toggle_like(2).unwrap();
        let catalog = engine.catalog();
        let by_id = |id: i64| catalog.iter().find(|s| s.file_id == id).unwrap();
        assert!(by_id(2).is_liked);
        assert!(!by_id(1).is_liked);
        assert_eq!(engine.liked_songs().len(), 1);
    }

    #[test]
    fn like_toggle_round_trip_nets_plus_one() {
        let mut engine = engine();
        assert!(engine.toggle_like(1).unwrap());
        assert!(!engine.toggle_like(1).unwrap());
        assert!(engine.toggle_like(1).unwrap());
        assert_eq!(engine.store().counters(1), Some((100, 11)));
        assert!(engine.liked_songs().iter().any(|s| s.file_id == 1));
    }

    #[test]
    fn next_songs_never_cross_language_or_include_current() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(5);
        let out = engine.next_songs(1, &HashSet::new(), &mut rng);
        assert!(out.iter().all(|s| s.language == "en"));
        assert!(out.iter().all(|s| s.file_id != 1));
        assert!(out.len() <= 10);
    }

    #[test]
    fn next_songs_for_unknown_song_degrade_to_empty() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(5);
        assert!(engine.next_songs(999, &HashSet::new(), &mut rng).is_empty());
    }

    #[test]
    fn affinity_batch_resolves_ids_and_skips_unknown_ones() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(5);
        let out = engine.affinity_batch(&[1, 999], &HashSet::new(), &mut rng);
        assert!(out.iter().all(|s| s.language == "en" && s.file_id != 1));
        // An unknown-only batch carries no signal.
        assert!(engine
            .affinity_batch(&[999], &HashSet::new(), &mut rng)
            .is_empty());
    }

    #[test]
    fn for_you_excludes_history_and_empties_on_sign_out() {
        let mut engine = engine();
        engine.store().seed_history("alice", 1, 30.0);
        let out = engine.for_you();
        assert!(!out.is_empty());
        assert!(out.iter().all(|s| s.file_id != 1));

        engine.set_user(None);
        assert!(engine.for_you().is_empty());
    }

    #[test]
    fn recently_played_is_ordered_by_minutes_and_capped() {
        let engine = engine();
        engine.store().seed_history("alice", 2, 12.0);
        engine.store().seed_history("alice", 1, 40.0);
        engine.store().seed_history("alice", 3, 1.0);
        let out = engine.recently_played();
        let ids: Vec<i64> = out.iter().map(|s| s.file_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn playing_updates_last_played_and_view_count() {
        let mut engine = engine();
        engine.record_listening(3).unwrap();
        assert_eq!(engine.currently_tracking(), Some(3));
        assert_eq!(engine.last_played().map(|s| s.file_id), Some(3));
        // The view bump must show through the cache.
        let catalog = engine.catalog();
        assert_eq!(
            catalog.iter().find(|s| s.file_id == 3).unwrap().views,
            11
        );
        engine.stop_tracking().unwrap();
        assert_eq!(engine.currently_tracking(), None);
    }

    #[test]
    fn user_switch_drops_liked_projection_and_session() {
        let mut engine = engine();
        engine.toggle_like(1).unwrap();
        engine.record_listening(1).unwrap();
        engine.set_user(Some("bob".to_string()));
        assert_eq!(engine.currently_tracking(), None);
        assert!(engine.liked_songs().is_empty());
    }

    #[test]
    fn trending_reflects_raw_popularity() {
        let engine = engine();
        let ids: Vec<i64> = engine.trending().iter().map(|s| s.file_id).collect();
        assert_eq!(ids, vec![4, 1, 2, 3]);
    }
}
