//! Listening-session tracking.
//!
//! The tracker is a two-state machine: either nothing is playing, or one
//! song has been playing since a recorded instant. Transitions flush the
//! previous span into history first, so playback time is accounted exactly
//! once. Sub-threshold spans (accidental skips) are dropped.

use crate::store::CatalogStore;
use anyhow::{Context, Result};
use log::{debug, warn};
use std::time::Instant;

/// Spans shorter than this many minutes are considered skips and not
/// written to history.
pub const FLUSH_THRESHOLD_MINS: f64 = 0.1;

/// What the tracker is currently doing. Fields are public so the flush
/// path is testable without waiting on wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Tracking { song_id: i64, started_at: Instant },
}

#[derive(Debug)]
pub struct SessionTracker {
    state: SessionState,
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn current_song(&self) -> Option<i64> {
        match self.state {
            SessionState::Idle => None,
            SessionState::Tracking { song_id, .. } => Some(song_id),
        }
    }

    /// Start tracking `song_id`, flushing any span already in flight. The
    /// new span starts even if the flush fails; the failure costs one span
    /// of history, not the session.
    pub fn record_listening<S: CatalogStore>(
        &mut self,
        store: &S,
        user_id: &str,
        song_id: i64,
    ) -> Result<()> {
        if let Err(err) = self.flush(store, user_id) {
            warn!("Dropping unflushed listening span: {err:#}");
        }
        self.state = SessionState::Tracking {
            song_id,
            started_at: Instant::now(),
        };
        store
            .set_last_played(user_id, song_id)
            .context("Failed to record last played song")?;
        store
            .increment_views(song_id)
            .with_context(|| format!("Failed to count play of song {song_id}"))?;
        debug!("Now tracking song {song_id} for {user_id}");
        Ok(())
    }

    /// Stop tracking and flush the final span.
    pub fn stop<S: CatalogStore>(&mut self, store: &S, user_id: &str) -> Result<()> {
        let result = self.flush(store, user_id);
        self.state = SessionState::Idle;
        result
    }

    /// Write the in-flight span to history, if one exists and it clears
    /// the skip threshold. Minutes are rounded to two decimals before the
    /// additive upsert.
    fn flush<S: CatalogStore>(&mut self, store: &S, user_id: &str) -> Result<()> {
        let SessionState::Tracking { song_id, started_at } = self.state else {
            return Ok(());
        };
        self.state = SessionState::Idle;

        let minutes = started_at.elapsed().as_secs_f64() / 60.0;
        if minutes <= FLUSH_THRESHOLD_MINS {
            debug!("Skipping sub-threshold span of {minutes:.3} min for song {song_id}");
            return Ok(());
        }
        let minutes = (minutes * 100.0).round() / 100.0;
        store
            .upsert_history_minutes(user_id, song_id, minutes)
            .with_context(|| format!("Failed to flush {minutes} min for song {song_id}"))?;
        debug!("Flushed {minutes} min for song {song_id}");
        Ok(())
    }

    /// Drop any in-flight span without flushing. Used on logout, where the
    /// departing user's history must not absorb the span.
    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
    }
}
