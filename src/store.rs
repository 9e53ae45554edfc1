//! Catalog store access.
//!
//! The engine never talks to a database directly; everything durable sits
//! behind the [`CatalogStore`] trait: catalog reads, per-user liked sets and
//! history, the last-played pointer, playlists, and the atomic counter
//! operations. Two implementations live here:
//!
//! - [`SqliteStore`] — the real store backing the CLI, one SQLite file.
//! - [`MemoryStore`] — an in-memory reference implementation used by tests,
//!   with optional failure injection for the best-effort accounting paths.
//!
//! All counter movements (`adjust_likes`, `increment_views`,
//! `upsert_history_minutes`) are additive single statements, so concurrent
//! writers can interleave without corrupting an aggregate.

use crate::song::{HistoryEntry, Playlist, Song};
use anyhow::{Context, Result};
use log::{debug, trace};
use rusqlite::{Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

/// Request/response interface to the external catalog store.
pub trait CatalogStore {
    /// All songs, ordered by views descending.
    fn fetch_songs(&self) -> Result<Vec<Song>>;

    /// Ids of the songs a user has liked.
    fn fetch_liked_ids(&self, user_id: &str) -> Result<HashSet<i64>>;

    /// A user's history entries joined with their song records, ordered by
    /// minutes listened descending.
    fn fetch_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>>;

    fn fetch_last_played(&self, user_id: &str) -> Result<Option<i64>>;
    fn set_last_played(&self, user_id: &str, song_id: i64) -> Result<()>;

    fn fetch_playlists(&self, user_id: &str) -> Result<Vec<Playlist>>;
    fn insert_playlist(&self, user_id: &str, name: &str) -> Result<Playlist>;
    fn rename_playlist(&self, user_id: &str, playlist_id: &str, name: &str) -> Result<()>;
    fn delete_playlist(&self, user_id: &str, playlist_id: &str) -> Result<()>;
    fn add_playlist_song(&self, playlist_id: &str, song_id: i64) -> Result<()>;
    fn remove_playlist_song(&self, playlist_id: &str, song_id: i64) -> Result<()>;

    fn insert_liked(&self, user_id: &str, song_id: i64) -> Result<()>;
    fn delete_liked(&self, user_id: &str, song_id: i64) -> Result<()>;

    /// Adjust a song's like counter by `delta` (clamped at zero).
    fn adjust_likes(&self, song_id: i64, delta: i64) -> Result<()>;
    fn increment_views(&self, song_id: i64) -> Result<()>;

    /// Additive upsert of listening minutes onto the (user, song) ledger row.
    fn upsert_history_minutes(&self, user_id: &str, song_id: i64, minutes: f64) -> Result<()>;
}

// ---------------------------------------------------------------------------
// SQLite implementation
// ---------------------------------------------------------------------------

/// SQLite-backed catalog store.
///
/// The connection is wrapped in a `Mutex` because rusqlite connections are
/// not `Sync`; the engine drives the store from one logical thread, so the
/// lock is uncontended in practice.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (and create if needed) the store at `path`, ensuring the schema
    /// exists.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open catalog database at {}", path.display()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// In-memory SQLite database, handy for quick experiments.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS songs (
                file_id  INTEGER PRIMARY KEY,
                img_id   INTEGER NOT NULL DEFAULT 0,
                name     TEXT    NOT NULL,
                artist   TEXT    NOT NULL,
                language TEXT    NOT NULL,
                tags     TEXT    NOT NULL DEFAULT '[]',
                views    INTEGER NOT NULL DEFAULT 0,
                likes    INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS liked_songs (
                user_id TEXT    NOT NULL,
                song_id INTEGER NOT NULL,
                UNIQUE(user_id, song_id)
            );
            CREATE TABLE IF NOT EXISTS history (
                user_id          TEXT    NOT NULL,
                song_id          INTEGER NOT NULL,
                minutes_listened REAL    NOT NULL DEFAULT 0,
                UNIQUE(user_id, song_id)
            );
            CREATE TABLE IF NOT EXISTS users (
                id                TEXT PRIMARY KEY,
                last_song_file_id INTEGER
            );
            CREATE TABLE IF NOT EXISTS playlists (
                id      INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                name    TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS playlist_songs (
                playlist_id INTEGER NOT NULL,
                song_id     INTEGER NOT NULL,
                UNIQUE(playlist_id, song_id)
            );
            CREATE INDEX IF NOT EXISTS idx_history_user ON history(user_id);
            CREATE INDEX IF NOT EXISTS idx_liked_user ON liked_songs(user_id);",
        )
        .context("Failed to create catalog schema")?;
        Ok(())
    }

    /// Bulk-insert songs, replacing rows with the same `file_id`. Used by
    /// catalog imports.
    pub fn import_songs(&self, songs: &[Song]) -> Result<usize> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO songs
                 (file_id, img_id, name, artist, language, tags, views, likes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for song in songs {
                let mut song = song.clone();
                song.normalize();
                let tags = serde_json::to_string(&song.tags)
                    .context("Failed to serialize song tags")?;
                stmt.execute(rusqlite::params![
                    song.file_id,
                    song.img_id,
                    song.name,
                    song.artist,
                    song.language,
                    tags,
                    song.views,
                    song.likes,
                ])
                .with_context(|| format!("Failed to insert song {}", song.file_id))?;
            }
        }
        tx.commit().context("Committing song import failed")?;
        debug!("Imported {} songs into catalog", songs.len());
        Ok(songs.len())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock means another thread panicked mid-statement; the
        // connection itself is still usable for independent statements.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn song_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Song> {
    let tags_json: String = row.get("tags")?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
    Ok(Song {
        file_id: row.get("file_id")?,
        img_id: row.get("img_id")?,
        name: row.get("name")?,
        artist: row.get("artist")?,
        language: row.get("language")?,
        tags,
        views: row.get("views")?,
        likes: row.get("likes")?,
        is_liked: false,
    })
}

impl CatalogStore for SqliteStore {
    fn fetch_songs(&self) -> Result<Vec<Song>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT * FROM songs ORDER BY views DESC, file_id ASC")
            .context("Failed to prepare catalog query")?;
        let songs = stmt
            .query_map([], song_from_row)
            .context("Failed to query catalog")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read catalog row")?;
        trace!("Fetched {} songs from store", songs.len());
        Ok(songs)
    }

    fn fetch_liked_ids(&self, user_id: &str) -> Result<HashSet<i64>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT song_id FROM liked_songs WHERE user_id = ?1")
            .context("Failed to prepare liked-songs query")?;
        let ids = stmt
            .query_map([user_id], |row| row.get::<_, i64>(0))
            .context("Failed to query liked songs")?
            .collect::<rusqlite::Result<HashSet<_>>>()
            .context("Failed to read liked-song row")?;
        Ok(ids)
    }

    fn fetch_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT h.song_id AS h_song_id, h.minutes_listened AS h_minutes, s.*
                 FROM history h
                 LEFT JOIN songs s ON s.file_id = h.song_id
                 WHERE h.user_id = ?1
                 ORDER BY h.minutes_listened DESC",
            )
            .context("Failed to prepare history query")?;
        let entries = stmt
            .query_map([user_id], |row| {
                let song = match row.get::<_, Option<i64>>("file_id")? {
                    Some(_) => Some(song_from_row(row)?),
                    None => None,
                };
                Ok(HistoryEntry {
                    song_id: row.get("h_song_id")?,
                    minutes_listened: row.get("h_minutes")?,
                    song,
                })
            })
            .context("Failed to query history")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read history row")?;
        Ok(entries)
    }

    fn fetch_last_played(&self, user_id: &str) -> Result<Option<i64>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT last_song_file_id FROM users WHERE id = ?1",
            [user_id],
            |row| row.get::<_, Option<i64>>(0),
        )
        .optional()
        .context("Failed to query last-played pointer")
        .map(Option::flatten)
    }

    fn set_last_played(&self, user_id: &str, song_id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO users (id, last_song_file_id) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET last_song_file_id = excluded.last_song_file_id",
            rusqlite::params![user_id, song_id],
        )
        .context("Failed to update last-played pointer")?;
        Ok(())
    }

    fn fetch_playlists(&self, user_id: &str) -> Result<Vec<Playlist>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT id, name FROM playlists WHERE user_id = ?1 ORDER BY id")
            .context("Failed to prepare playlists query")?;
        let heads = stmt
            .query_map([user_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .context("Failed to query playlists")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read playlist row")?;

        let mut song_stmt = conn
            .prepare(
                "SELECT s.* FROM playlist_songs ps
                 JOIN songs s ON s.file_id = ps.song_id
                 WHERE ps.playlist_id = ?1
                 ORDER BY ps.rowid",
            )
            .context("Failed to prepare playlist-songs query")?;

        let mut playlists = Vec::with_capacity(heads.len());
        for (id, name) in heads {
            let songs = song_stmt
                .query_map([id], song_from_row)
                .context("Failed to query playlist songs")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to read playlist-song row")?;
            playlists.push(Playlist {
                id: id.to_string(),
                name,
                songs,
            });
        }
        Ok(playlists)
    }

    fn insert_playlist(&self, user_id: &str, name: &str) -> Result<Playlist> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO playlists (user_id, name) VALUES (?1, ?2)",
            rusqlite::params![user_id, name],
        )
        .context("Failed to insert playlist")?;
        let id = conn.last_insert_rowid();
        Ok(Playlist {
            id: id.to_string(),
            name: name.to_string(),
            songs: Vec::new(),
        })
    }

    fn rename_playlist(&self, user_id: &str, playlist_id: &str, name: &str) -> Result<()> {
        let id = parse_playlist_id(playlist_id)?;
        let conn = self.lock();
        let changed = conn
            .execute(
                "UPDATE playlists SET name = ?1 WHERE id = ?2 AND user_id = ?3",
                rusqlite::params![name, id, user_id],
            )
            .context("Failed to rename playlist")?;
        anyhow::ensure!(changed == 1, "Playlist {playlist_id} not found");
        Ok(())
    }

    fn delete_playlist(&self, user_id: &str, playlist_id: &str) -> Result<()> {
        let id = parse_playlist_id(playlist_id)?;
        let conn = self.lock();
        conn.execute(
            "DELETE FROM playlist_songs WHERE playlist_id = ?1",
            [id],
        )
        .context("Failed to clear playlist songs")?;
        let changed = conn
            .execute(
                "DELETE FROM playlists WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id, user_id],
            )
            .context("Failed to delete playlist")?;
        anyhow::ensure!(changed == 1, "Playlist {playlist_id} not found");
        Ok(())
    }

    fn add_playlist_song(&self, playlist_id: &str, song_id: i64) -> Result<()> {
        let id = parse_playlist_id(playlist_id)?;
        let conn = self.lock();
        conn.execute(
            "INSERT OR IGNORE INTO playlist_songs (playlist_id, song_id) VALUES (?1, ?2)",
            rusqlite::params![id, song_id],
        )
        .context("Failed to add song to playlist")?;
        Ok(())
    }

    fn remove_playlist_song(&self, playlist_id: &str, song_id: i64) -> Result<()> {
        let id = parse_playlist_id(playlist_id)?;
        let conn = self.lock();
        conn.execute(
            "DELETE FROM playlist_songs WHERE playlist_id = ?1 AND song_id = ?2",
            rusqlite::params![id, song_id],
        )
        .context("Failed to remove song from playlist")?;
        Ok(())
    }

    fn insert_liked(&self, user_id: &str, song_id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR IGNORE INTO liked_songs (user_id, song_id) VALUES (?1, ?2)",
            rusqlite::params![user_id, song_id],
        )
        .context("Failed to insert liked song")?;
        Ok(())
    }

    fn delete_liked(&self, user_id: &str, song_id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM liked_songs WHERE user_id = ?1 AND song_id = ?2",
            rusqlite::params![user_id, song_id],
        )
        .context("Failed to delete liked song")?;
        Ok(())
    }

    fn adjust_likes(&self, song_id: i64, delta: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE songs SET likes = MAX(0, likes + ?1) WHERE file_id = ?2",
            rusqlite::params![delta, song_id],
        )
        .context("Failed to adjust like counter")?;
        Ok(())
    }

    fn increment_views(&self, song_id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE songs SET views = views + 1 WHERE file_id = ?1",
            [song_id],
        )
        .context("Failed to increment view counter")?;
        Ok(())
    }

    fn upsert_history_minutes(&self, user_id: &str, song_id: i64, minutes: f64) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO history (user_id, song_id, minutes_listened) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, song_id)
             DO UPDATE SET minutes_listened = minutes_listened + excluded.minutes_listened",
            rusqlite::params![user_id, song_id, minutes],
        )
        .context("Failed to upsert history minutes")?;
        debug!("History upsert: +{minutes:.2} min for song {song_id}");
        Ok(())
    }
}

fn parse_playlist_id(playlist_id: &str) -> Result<i64> {
    playlist_id
        .parse::<i64>()
        .with_context(|| format!("Invalid playlist id: {playlist_id:?}"))
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryInner {
    songs: Vec<Song>,
    liked: HashMap<String, HashSet<i64>>,
    history: HashMap<String, HashMap<i64, f64>>,
    last_played: HashMap<String, i64>,
    playlists: Vec<(i64, String, String, Vec<i64>)>, // (id, user, name, song ids)
    next_playlist_id: i64,
    fail_history_upserts: bool,
}

/// In-memory catalog store used by tests and as a reference implementation
/// of the contract.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    #[must_use]
    pub fn with_songs(songs: Vec<Song>) -> Self {
        let mut songs = songs;
        for song in &mut songs {
            song.normalize();
        }
        Self {
            inner: Mutex::new(MemoryInner {
                songs,
                next_playlist_id: 1,
                ..MemoryInner::default()
            }),
        }
    }

    /// Make every subsequent `upsert_history_minutes` fail, for exercising
    /// the best-effort accounting paths.
    pub fn fail_history_upserts(&self, fail: bool) {
        self.lock().fail_history_upserts = fail;
    }

    /// Seed a history ledger row directly.
    pub fn seed_history(&self, user_id: &str, song_id: i64, minutes: f64) {
        self.lock()
            .history
            .entry(user_id.to_string())
            .or_default()
            .insert(song_id, minutes);
    }

    /// Current counter values for a song, for test assertions.
    pub fn counters(&self, song_id: i64) -> Option<(i64, i64)> {
        self.lock()
            .songs
            .iter()
            .find(|s| s.file_id == song_id)
            .map(|s| (s.views, s.likes))
    }

    /// Accrued minutes for a (user, song) pair, for test assertions.
    pub fn minutes(&self, user_id: &str, song_id: i64) -> Option<f64> {
        self.lock()
            .history
            .get(user_id)
            .and_then(|h| h.get(&song_id))
            .copied()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CatalogStore for MemoryStore {
    fn fetch_songs(&self) -> Result<Vec<Song>> {
        let inner = self.lock();
        let mut songs = inner.songs.clone();
        songs.sort_by(|a, b| b.views.cmp(&a.views).then(a.file_id.cmp(&b.file_id)));
        Ok(songs)
    }

    fn fetch_liked_ids(&self, user_id: &str) -> Result<HashSet<i64>> {
        Ok(self.lock().liked.get(user_id).cloned().unwrap_or_default())
    }

    fn fetch_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>> {
        let inner = self.lock();
        let mut entries: Vec<HistoryEntry> = inner
            .history
            .get(user_id)
            .map(|h| {
                h.iter()
                    .map(|(&song_id, &minutes)| HistoryEntry {
                        song_id,
                        minutes_listened: minutes,
                        song: inner.songs.iter().find(|s| s.file_id == song_id).cloned(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        entries.sort_by(|a, b| {
            b.minutes_listened
                .partial_cmp(&a.minutes_listened)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.song_id.cmp(&b.song_id))
        });
        Ok(entries)
    }

    fn fetch_last_played(&self, user_id: &str) -> Result<Option<i64>> {
        Ok(self.lock().last_played.get(user_id).copied())
    }

    fn set_last_played(&self, user_id: &str, song_id: i64) -> Result<()> {
        self.lock().last_played.insert(user_id.to_string(), song_id);
        Ok(())
    }

    fn fetch_playlists(&self, user_id: &str) -> Result<Vec<Playlist>> {
        let inner = self.lock();
        Ok(inner
            .playlists
            .iter()
            .filter(|(_, user, _, _)| user == user_id)
            .map(|(id, _, name, song_ids)| Playlist {
                id: id.to_string(),
                name: name.clone(),
                songs: song_ids
                    .iter()
                    .filter_map(|sid| inner.songs.iter().find(|s| s.file_id == *sid).cloned())
                    .collect(),
            })
            .collect())
    }

    fn insert_playlist(&self, user_id: &str, name: &str) -> Result<Playlist> {
        let mut inner = self.lock();
        let id = inner.next_playlist_id;
        inner.next_playlist_id += 1;
        inner
            .playlists
            .push((id, user_id.to_string(), name.to_string(), Vec::new()));
        Ok(Playlist {
            id: id.to_string(),
            name: name.to_string(),
            songs: Vec::new(),
        })
    }

    fn rename_playlist(&self, user_id: &str, playlist_id: &str, name: &str) -> Result<()> {
        let id = parse_playlist_id(playlist_id)?;
        let mut inner = self.lock();
        let playlist = inner
            .playlists
            .iter_mut()
            .find(|(pid, user, _, _)| *pid == id && user == user_id)
            .with_context(|| format!("Playlist {playlist_id} not found"))?;
        playlist.2 = name.to_string();
        Ok(())
    }

    fn delete_playlist(&self, user_id: &str, playlist_id: &str) -> Result<()> {
        let id = parse_playlist_id(playlist_id)?;
        let mut inner = self.lock();
        let before = inner.playlists.len();
        inner
            .playlists
            .retain(|(pid, user, _, _)| !(*pid == id && user == user_id));
        anyhow::ensure!(inner.playlists.len() < before, "Playlist {playlist_id} not found");
        Ok(())
    }

    fn add_playlist_song(&self, playlist_id: &str, song_id: i64) -> Result<()> {
        let id = parse_playlist_id(playlist_id)?;
        let mut inner = self.lock();
        let playlist = inner
            .playlists
            .iter_mut()
            .find(|(pid, _, _, _)| *pid == id)
            .with_context(|| format!("Playlist {playlist_id} not found"))?;
        if !playlist.3.contains(&song_id) {
            playlist.3.push(song_id);
        }
        Ok(())
    }

    fn remove_playlist_song(&self, playlist_id: &str, song_id: i64) -> Result<()> {
        let id = parse_playlist_id(playlist_id)?;
        let mut inner = self.lock();
        let playlist = inner
            .playlists
            .iter_mut()
            .find(|(pid, _, _, _)| *pid == id)
            .with_context(|| format!("Playlist {playlist_id} not found"))?;
        playlist.3.retain(|sid| *sid != song_id);
        Ok(())
    }

    fn insert_liked(&self, user_id: &str, song_id: i64) -> Result<()> {
        self.lock()
            .liked
            .entry(user_id.to_string())
            .or_default()
            .insert(song_id);
        Ok(())
    }

    fn delete_liked(&self, user_id: &str, song_id: i64) -> Result<()> {
        if let Some(set) = self.lock().liked.get_mut(user_id) {
            set.remove(&song_id);
        }
        Ok(())
    }

    fn adjust_likes(&self, song_id: i64, delta: i64) -> Result<()> {
        let mut inner = self.lock();
        if let Some(song) = inner.songs.iter_mut().find(|s| s.file_id == song_id) {
            song.likes = (song.likes + delta).max(0);
        }
        Ok(())
    }

    fn increment_views(&self, song_id: i64) -> Result<()> {
        let mut inner = self.lock();
        if let Some(song) = inner.songs.iter_mut().find(|s| s.file_id == song_id) {
            song.views += 1;
        }
        Ok(())
    }

    fn upsert_history_minutes(&self, user_id: &str, song_id: i64, minutes: f64) -> Result<()> {
        let mut inner = self.lock();
        anyhow::ensure!(
            !inner.fail_history_upserts,
            "injected history upsert failure"
        );
        *inner
            .history
            .entry(user_id.to_string())
            .or_default()
            .entry(song_id)
            .or_insert(0.0) += minutes;
        Ok(())
    }
}
