//! # Encore - Personalized Music Recommendations
//!
//! Encore turns a song catalog plus a user's listening history into ranked
//! recommendation lists and keeps an accurate ledger of listening time.
//!
//! ## Architecture
//!
//! - `song`: catalog data model (songs, history entries, playlists)
//! - `store`: the `CatalogStore` trait with SQLite and in-memory backends
//! - `cache`: session-scoped catalog and liked-set caches
//! - `affinity`: taste-profile extraction from listening history
//! - `scoring`: per-candidate relevance scoring for the ranking modes
//! - `recommend`: ranking pipelines (next-song, batch expansion, made
//!   for you, trending)
//! - `session`: the listening-session state machine
//! - `mutations`: write-path coordination (likes, playlists)
//! - `engine`: the facade tying the above together per user
//! - `cli` / `completion` / `config`: command-line surface and persistence
//!   of runtime settings and identity
//!
//! ## Usage
//!
//! ```bash
//! # Load a catalog and log in
//! encore init-db catalog.json
//! encore login alice
//!
//! # Ranked lists
//! encore for-you
//! encore trending
//! encore next 1763075
//!
//! # Track listening time
//! encore session
//! ```

pub mod affinity;
pub mod cache;
pub mod cli;
pub mod completion;
pub mod config;
pub mod engine;
pub mod mutations;
pub mod recommend;
pub mod scoring;
pub mod session;
pub mod song;
pub mod store;
