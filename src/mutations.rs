//! Write-path coordination.
//!
//! Every mutation goes remote-first: the store writes happen before any
//! cached projection is touched, so a failed write leaves nothing to roll
//! back. Counter adjustments ride behind their membership write and a
//! failure there is logged rather than surfaced; the membership row is
//! the source of truth and the counter catches up on the next refresh.

use crate::cache::CatalogCache;
use crate::song::Playlist;
use crate::store::CatalogStore;
use anyhow::{Context, Result};
use log::{error, info};

/// Flip `song_id`'s liked state for `user_id` and mirror the result into
/// the caches. Returns the new membership.
pub fn toggle_like<S: CatalogStore>(
    store: &S,
    cache: &CatalogCache,
    user_id: &str,
    song_id: i64,
    currently_liked: bool,
) -> Result<bool> {
    let now_liked = !currently_liked;
    if now_liked {
        store
            .insert_liked(user_id, song_id)
            .with_context(|| format!("Failed to like song {song_id}"))?;
    } else {
        store
            .delete_liked(user_id, song_id)
            .with_context(|| format!("Failed to unlike song {song_id}"))?;
    }
    let delta = if now_liked { 1 } else { -1 };
    if let Err(err) = store.adjust_likes(song_id, delta) {
        error!("Like counter for song {song_id} not adjusted: {err:#}");
    }
    cache.apply_like(user_id, song_id, now_liked);
    info!(
        "Song {song_id} {} by {user_id}",
        if now_liked { "liked" } else { "unliked" }
    );
    Ok(now_liked)
}

pub fn create_playlist<S: CatalogStore>(
    store: &S,
    user_id: &str,
    name: &str,
) -> Result<Playlist> {
    let playlist = store
        .insert_playlist(user_id, name)
        .with_context(|| format!("Failed to create playlist {name:?}"))?;
    info!("Created playlist {name:?} ({}) for {user_id}", playlist.id);
    Ok(playlist)
}

pub fn rename_playlist<S: CatalogStore>(
    store: &S,
    user_id: &str,
    playlist_id: &str,
    name: &str,
) -> Result<()> {
    store
        .rename_playlist(user_id, playlist_id, name)
        .with_context(|| format!("Failed to rename playlist {playlist_id}"))
}

pub fn delete_playlist<S: CatalogStore>(store: &S, user_id: &str, playlist_id: &str) -> Result<()> {
    store
        .delete_playlist(user_id, playlist_id)
        .with_context(|| format!("Failed to delete playlist {playlist_id}"))
}

pub fn add_playlist_song<S: CatalogStore>(store: &S, playlist_id: &str, song_id: i64) -> Result<()> {
    store
        .add_playlist_song(playlist_id, song_id)
        .with_context(|| format!("Failed to add song {song_id} to playlist {playlist_id}"))
}

pub fn remove_playlist_song<S: CatalogStore>(
    store: &S,
    playlist_id: &str,
    song_id: i64,
) -> Result<()> {
    store
        .remove_playlist_song(playlist_id, song_id)
        .with_context(|| format!("Failed to remove song {song_id} from playlist {playlist_id}"))
}
