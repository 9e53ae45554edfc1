//! # Encore CLI
//!
//! Command-line front end for the recommendation engine. Initializes
//! logging, parses arguments, and routes each command to the engine
//! facade. All operations return Results for consistent error handling.
//!
//! # Logging
//!
//! Controlled via `RUST_LOG`:
//! - `RUST_LOG=debug encore for-you` - Enable debug logging
//! - `RUST_LOG=encore::scoring=trace encore next 42` - Module-specific logging

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use encore::cli::{Args, Command, PlaylistAction};
use encore::completion;
use encore::config;
use encore::engine::Engine;
use encore::song::{Playlist, Song};
use encore::store::SqliteStore;
use log::info;
use std::collections::HashSet;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Command::InitDb { path, force } => {
            init_db(&path, force)?;
        }
        Command::Login { user } => {
            config::save_identity(&config::StoredIdentity {
                user_id: user.clone(),
            })?;
            println!("Logged in as {user}");
        }
        Command::Logout => {
            config::clear_identity()?;
            println!("Logged out");
        }
        Command::List => {
            let engine = open_engine()?;
            print_songs(&engine.catalog());
        }
        Command::Trending => {
            let engine = open_engine()?;
            print_songs(&engine.trending());
        }
        Command::ForYou => {
            let engine = open_engine()?;
            print_songs(&engine.for_you());
        }
        Command::Next { song_id, exclude } => {
            let engine = open_engine()?;
            let exclude: HashSet<i64> = exclude.into_iter().collect();
            print_songs(&engine.next_songs(song_id, &exclude, &mut rand::thread_rng()));
        }
        Command::MoreLike { song_ids } => {
            let engine = open_engine()?;
            print_songs(&engine.affinity_batch(
                &song_ids,
                &HashSet::new(),
                &mut rand::thread_rng(),
            ));
        }
        Command::Recent => {
            let engine = open_engine()?;
            if let Some(last) = engine.last_played() {
                println!("Last played: {} - {}", last.name, last.artist);
            }
            print_songs(&engine.recently_played());
        }
        Command::Liked => {
            let engine = open_engine()?;
            print_songs(&engine.liked_songs());
        }
        Command::Like { song_id } => {
            let mut engine = open_engine()?;
            let liked = engine.toggle_like(song_id)?;
            println!(
                "Song {song_id} is now {}",
                if liked { "liked" } else { "no longer liked" }
            );
        }
        Command::Playlist { action } => {
            let mut engine = open_engine()?;
            run_playlist_action(&mut engine, action)?;
        }
        Command::Session => {
            let mut engine = open_engine()?;
            run_session(&mut engine)?;
        }
        Command::Completion { shell } => {
            let mut cmd = Args::command();
            completion::generate_completions(
                completion::shell_to_completion_shell(&shell),
                &mut cmd,
            );
        }
    }

    Ok(())
}

/// Open the database and activate the remembered user, if any.
fn open_engine() -> Result<Engine<SqliteStore>> {
    let db_path = config::get_db_path()?;
    if !db_path.exists() {
        bail!(
            "No catalog database at {}. Run 'encore init-db <catalog.json>' first.",
            db_path.display()
        );
    }
    let store = SqliteStore::open(&db_path)?;
    let mut engine = Engine::new(store);
    if let Some(identity) = config::load_identity()? {
        engine.set_user(Some(identity.user_id));
    }
    Ok(engine)
}

/// Load a JSON catalog export into a fresh database.
fn init_db(path: &Path, force: bool) -> Result<()> {
    let db_path = config::get_db_path()?;
    if db_path.exists() {
        if !force {
            bail!(
                "Database already exists at {}. Use --force to replace it.",
                db_path.display()
            );
        }
        fs::remove_file(&db_path)
            .with_context(|| format!("Failed to remove {}", db_path.display()))?;
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
    let songs: Vec<Song> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse catalog file {}", path.display()))?;

    let store = SqliteStore::open(&db_path)?;
    let imported = store.import_songs(&songs)?;
    info!("Imported {imported} songs into {}", db_path.display());
    println!("Imported {imported} songs");
    Ok(())
}

fn run_playlist_action(engine: &mut Engine<SqliteStore>, action: PlaylistAction) -> Result<()> {
    match action {
        PlaylistAction::List => {
            for playlist in engine.playlists() {
                print_playlist(&playlist);
            }
        }
        PlaylistAction::Create { name } => {
            let playlist = engine.create_playlist(&name)?;
            println!("Created playlist {} ({})", playlist.name, playlist.id);
        }
        PlaylistAction::Rename { id, name } => {
            engine.rename_playlist(&id, &name)?;
            println!("Renamed playlist {id}");
        }
        PlaylistAction::Delete { id } => {
            engine.delete_playlist(&id)?;
            println!("Deleted playlist {id}");
        }
        PlaylistAction::Add { id, song_id } => {
            engine.add_playlist_song(&id, song_id)?;
            println!("Added song {song_id} to playlist {id}");
        }
        PlaylistAction::Remove { id, song_id } => {
            engine.remove_playlist_song(&id, song_id)?;
            println!("Removed song {song_id} from playlist {id}");
        }
    }
    Ok(())
}

/// Interactive listening loop over stdin. Spans close on `play`, `stop`,
/// and `quit`, so listening time is flushed before exit.
fn run_session(engine: &mut Engine<SqliteStore>) -> Result<()> {
    println!("Session started. Commands: play <song-id>, stop, quit");
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush().context("Failed to flush prompt")?;

        let mut line = String::new();
        if stdin
            .lock()
            .read_line(&mut line)
            .context("Failed to read session command")?
            == 0
        {
            break;
        }

        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("play") => match parts.next().map(str::parse::<i64>) {
                Some(Ok(song_id)) => {
                    engine.record_listening(song_id)?;
                    println!("Playing song {song_id}");
                    let suggestions =
                        engine.next_songs(song_id, &HashSet::new(), &mut rand::thread_rng());
                    if !suggestions.is_empty() {
                        println!("Up next:");
                        print_songs(&suggestions);
                    }
                }
                _ => println!("Usage: play <song-id>"),
            },
            Some("stop") => {
                engine.stop_tracking()?;
                println!("Stopped");
            }
            Some("quit") | Some("exit") => break,
            Some(other) => println!("Unknown command: {other}"),
            None => {}
        }
    }

    engine.stop_tracking()?;
    println!("Session closed");
    Ok(())
}

fn print_songs(songs: &[Song]) {
    for (i, song) in songs.iter().enumerate() {
        println!(
            "{:>3}. [{}] {} - {} ({}) | {} views, {} likes{}",
            i + 1,
            song.file_id,
            song.name,
            song.artist,
            song.language,
            song.views,
            song.likes,
            if song.is_liked { " ♥" } else { "" }
        );
    }
}

fn print_playlist(playlist: &Playlist) {
    println!(
        "[{}] {} ({} songs)",
        playlist.id,
        playlist.name,
        playlist.song_count()
    );
    for song in &playlist.songs {
        println!("      {} - {}", song.name, song.artist);
    }
}
