//! # Command-Line Interface Module
//!
//! Defines the command-line interface for Encore using Clap derive macros.
//! Parsing, help text, and validation all come from the derive attributes;
//! routing lives in `main`.
//!
//! ## Examples
//!
//! ```bash
//! encore init-db catalog.json
//! encore login alice
//! encore for-you
//! encore next 1763075
//! encore session
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
///
/// Contains only a subcommand since all functionality is accessed through
/// specific commands.
#[derive(Parser)]
#[command(name = "encore")]
#[command(about = "Encore - Personalized music recommendations & listening sessions")]
#[command(version)]
pub struct Args {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Initialize the catalog database from a JSON export
    ///
    /// Reads a JSON array of songs (file_id, name, artist, language, tags,
    /// views, likes, img_id) and loads it into the local database,
    /// replacing any song with the same id.
    InitDb {
        /// Path to the JSON catalog file
        path: PathBuf,

        /// Replace an existing database instead of refusing to touch it
        #[arg(long)]
        force: bool,
    },

    /// Remember a user id as the active listener
    ///
    /// All personalized commands (for-you, next, liked, history) read and
    /// write under this id until logout.
    Login {
        /// User id to activate
        user: String,
    },

    /// Forget the active listener
    Logout,

    /// List the whole catalog, most viewed first
    List,

    /// Show the most popular songs right now
    Trending,

    /// Show the catalog ranked for your taste
    ///
    /// Builds a taste profile from your listening history and ranks every
    /// song you have not played yet against it.
    ForYou,

    /// Suggest songs to play after the given one
    Next {
        /// Song id to continue from
        song_id: i64,

        /// Song ids to leave out of the suggestions (already queued)
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<i64>,
    },

    /// Suggest songs similar to a batch of seeds
    MoreLike {
        /// Seed song ids
        #[arg(required = true, value_delimiter = ',')]
        song_ids: Vec<i64>,
    },

    /// Show your most-listened songs
    Recent,

    /// Show your liked songs
    Liked,

    /// Toggle the liked state of a song
    Like {
        /// Song id to like or unlike
        song_id: i64,
    },

    /// Manage playlists
    Playlist {
        #[command(subcommand)]
        action: PlaylistAction,
    },

    /// Run an interactive listening session
    ///
    /// Reads commands from stdin: `play <id>` starts (or switches)
    /// tracking, `stop` closes the current span, `quit` exits. Listening
    /// time accrues to your history when a span ends.
    Session,

    /// Generate shell completions
    ///
    /// Usage: encore completion bash > ~/.local/share/bash-completion/completions/encore
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Playlist management actions
#[derive(Subcommand, Debug)]
pub enum PlaylistAction {
    /// List your playlists
    List,

    /// Create a new playlist
    Create {
        /// Playlist name
        name: String,
    },

    /// Rename a playlist
    Rename {
        /// Playlist id
        id: String,
        /// New name
        name: String,
    },

    /// Delete a playlist
    Delete {
        /// Playlist id
        id: String,
    },

    /// Add a song to a playlist
    Add {
        /// Playlist id
        id: String,
        /// Song id to add
        song_id: i64,
    },

    /// Remove a song from a playlist
    Remove {
        /// Playlist id
        id: String,
        /// Song id to remove
        song_id: i64,
    },
}
