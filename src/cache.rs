//! Session-scoped catalog caches.
//!
//! Holds the in-process memoized view of the full catalog and of one user's
//! liked-song ids. Both holders are populated lazily by a single store fetch
//! and retained until [`CatalogCache::invalidate`] (user change / logout) or
//! a forced refresh. The holder lock is kept across the fetch, so concurrent
//! first accesses coalesce into one underlying read instead of issuing
//! duplicates.

use crate::song::Song;
use crate::store::CatalogStore;
use anyhow::Result;
use log::trace;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Explicit cache object owned by the engine. Never a global: staleness is
/// bounded by explicit invalidation only.
#[derive(Default)]
pub struct CatalogCache {
    songs: Mutex<Option<Arc<Vec<Song>>>>,
    /// Liked ids keyed by the user they belong to; a key mismatch counts as
    /// a miss.
    liked: Mutex<Option<(String, Arc<HashSet<i64>>)>>,
}

impl CatalogCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The full catalog, fetched once and then served from memory.
    pub fn songs<S: CatalogStore>(&self, store: &S) -> Result<Arc<Vec<Song>>> {
        let mut holder = self.lock_songs();
        if let Some(songs) = holder.as_ref() {
            trace!("Catalog cache hit ({} songs)", songs.len());
            return Ok(Arc::clone(songs));
        }
        let songs = Arc::new(store.fetch_songs()?);
        trace!("Catalog cache miss, fetched {} songs", songs.len());
        *holder = Some(Arc::clone(&songs));
        Ok(songs)
    }

    /// The liked-song ids for `user_id`, fetched once per user.
    pub fn liked_ids<S: CatalogStore>(
        &self,
        store: &S,
        user_id: &str,
    ) -> Result<Arc<HashSet<i64>>> {
        let mut holder = self.lock_liked();
        if let Some((user, ids)) = holder.as_ref() {
            if user == user_id {
                return Ok(Arc::clone(ids));
            }
            trace!("Liked cache keyed to different user, refetching");
        }
        let ids = Arc::new(store.fetch_liked_ids(user_id)?);
        *holder = Some((user_id.to_string(), Arc::clone(&ids)));
        Ok(ids)
    }

    /// Clear both holders. Called on user change, logout, and forced
    /// refresh.
    pub fn invalidate(&self) {
        *self.lock_songs() = None;
        *self.lock_liked() = None;
        trace!("Catalog caches invalidated");
    }

    /// Reconcile the cached projections after a like toggle: flip liked-set
    /// membership and move the cached song's counter by ±1. The holders are
    /// replaced wholesale, never partially mutated.
    pub fn apply_like(&self, user_id: &str, song_id: i64, liked: bool) {
        {
            let mut holder = self.lock_liked();
            if let Some((user, ids)) = holder.take() {
                if user == user_id {
                    let mut ids = (*ids).clone();
                    if liked {
                        ids.insert(song_id);
                    } else {
                        ids.remove(&song_id);
                    }
                    *holder = Some((user, Arc::new(ids)));
                } else {
                    *holder = Some((user, ids));
                }
            }
        }
        let mut holder = self.lock_songs();
        if let Some(songs) = holder.take() {
            let mut songs = (*songs).clone();
            if let Some(song) = songs.iter_mut().find(|s| s.file_id == song_id) {
                song.likes = (song.likes + if liked { 1 } else { -1 }).max(0);
            }
            *holder = Some(Arc::new(songs));
        }
    }

    /// Reconcile the cached catalog after a play: bump the played song's
    /// view counter in place rather than dropping the holder, so one play
    /// does not cost a full refetch.
    pub fn apply_play(&self, song_id: i64) {
        let mut holder = self.lock_songs();
        if let Some(songs) = holder.take() {
            let mut songs = (*songs).clone();
            if let Some(song) = songs.iter_mut().find(|s| s.file_id == song_id) {
                song.views += 1;
            }
            *holder = Some(Arc::new(songs));
        }
    }

    fn lock_songs(&self) -> MutexGuard<'_, Option<Arc<Vec<Song>>>> {
        self.songs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_liked(&self) -> MutexGuard<'_, Option<(String, Arc<HashSet<i64>>)>> {
        self.liked.lock().unwrap_or_else(|e| e.into_inner())
    }
}
