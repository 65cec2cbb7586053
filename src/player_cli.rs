//! Headless terminal player
//!
//! Loads the catalog (or a JSON track file) and drives the playback
//! controller from stdin commands against a simulated media clock.

use clap::Parser;
use dotenv::dotenv;
use groove::common::AppConfig;
use groove::player::{format_time, Key, MediaEvent, Player, SimulatedBackend};
use groove::services::{catalog::parse_tracks, CatalogService, Track};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "groove-player", about = "Play the Groove catalog from the terminal")]
struct Args {
    /// Catalog response JSON to read instead of calling the API
    #[arg(long)]
    tracks: Option<PathBuf>,

    /// Seed for shuffle order
    #[arg(long)]
    seed: Option<u64>,

    /// Length assumed for tracks the catalog gives no duration for
    #[arg(long, default_value_t = 30.0)]
    fallback_duration: f64,

    /// Simulated seconds that pass per real second
    #[arg(long, default_value_t = 1.0)]
    speed: f64,
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Play(usize),
    Toggle,
    Next,
    Prev,
    Shuffle,
    Repeat,
    Seek(f64),
    Volume(f64),
    List,
    Status,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        // bare Enter behaves like Space in the browser
        return Ok(Command::Toggle);
    };
    let arg = parts.next();

    let number = |name: &str| -> Result<f64, String> {
        arg.ok_or_else(|| format!("{} needs a value", name))?
            .parse::<f64>()
            .map_err(|_| format!("{} needs a number", name))
    };

    match word.to_ascii_lowercase().as_str() {
        "play" | "p" => {
            let index = arg
                .ok_or("play needs a track number")?
                .parse::<usize>()
                .map_err(|_| "play needs a track number".to_string())?;
            // shown 1-based in the list
            index
                .checked_sub(1)
                .map(Command::Play)
                .ok_or_else(|| "track numbers start at 1".to_string())
        }
        "toggle" | "space" | "t" => Ok(Command::Toggle),
        "next" | "n" => Ok(Command::Next),
        "prev" | "b" => Ok(Command::Prev),
        "shuffle" | "s" => Ok(Command::Shuffle),
        "repeat" | "r" => Ok(Command::Repeat),
        "seek" => number("seek").map(Command::Seek),
        "volume" | "vol" | "v" => number("volume").map(Command::Volume),
        "list" | "ls" => Ok(Command::List),
        "status" | "st" => Ok(Command::Status),
        "help" | "h" | "?" => Ok(Command::Help),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command: {}", other)),
    }
}

const HELP: &str = "commands: play <n> | toggle (or Enter) | next | prev | shuffle | repeat | \
seek <secs> | volume <0-1> | list | status | quit";

fn print_tracks(tracks: &[Track]) {
    for (i, track) in tracks.iter().enumerate() {
        println!("{:>3}. {} - {}", i + 1, track.name, track.artist_name);
    }
}

fn print_status(player: &Player<SimulatedBackend>) {
    let Some(track) = player.current_track() else {
        println!("stopped");
        return;
    };
    println!(
        "{} {} - {}  {} / {}  vol {:.2}{}{}",
        if player.is_playing() { "▶" } else { "⏸" },
        track.name,
        track.artist_name,
        format_time(player.progress()),
        format_time(player.duration()),
        player.volume(),
        if player.is_shuffling() { "  [shuffle]" } else { "" },
        if player.is_repeating() { "  [repeat]" } else { "" },
    );
}

async fn load_tracks(args: &Args) -> anyhow::Result<Vec<Track>> {
    if let Some(path) = &args.tracks {
        let body = tokio::fs::read_to_string(path).await?;
        return Ok(parse_tracks(&body)?);
    }

    let config = AppConfig::from_env();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()?;
    Ok(CatalogService::new(client, config.jamendo_api_key)
        .fetch_tracks_or_empty()
        .await)
}

/// Applies one command; returns false when the user asked to quit
fn apply(player: &mut Player<SimulatedBackend>, command: Command) -> bool {
    let result = match command {
        Command::Play(index) => player.play_track(index),
        Command::Toggle => {
            player.handle_key(&Key::Space);
            Ok(())
        }
        Command::Next => player.next_track(),
        Command::Prev => player.prev_track(),
        Command::Shuffle => {
            println!("shuffle {}", if player.toggle_shuffle() { "on" } else { "off" });
            Ok(())
        }
        Command::Repeat => {
            println!("repeat {}", if player.toggle_repeat() { "on" } else { "off" });
            Ok(())
        }
        Command::Seek(seconds) => {
            player.seek(seconds);
            Ok(())
        }
        Command::Volume(volume) => {
            player.set_volume(volume);
            Ok(())
        }
        Command::List => {
            print_tracks(player.tracks());
            Ok(())
        }
        Command::Status => Ok(()),
        Command::Help => {
            println!("{}", HELP);
            return true;
        }
        Command::Quit => return false,
    };

    match result {
        Ok(()) => print_status(player),
        Err(e) => println!("{}", e),
    }
    true
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let tracks = load_tracks(&args).await.map_err(|e| {
        error!(error = %e, "Failed to load tracks");
        e
    })?;
    if tracks.is_empty() {
        warn!("No tracks loaded; playback commands will fail");
    }
    info!(count = tracks.len(), "Tracks loaded");

    let backend = SimulatedBackend::for_tracks(&tracks, Some(args.fallback_duration));
    let mut player = match args.seed {
        Some(seed) => Player::with_seed(backend, tracks, seed),
        None => Player::new(backend, tracks),
    };

    print_tracks(player.tracks());
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let step = args.speed.max(0.0);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Ok(command) => {
                        if !apply(&mut player, command) {
                            break;
                        }
                    }
                    Err(message) => println!("{}", message),
                }
            }
            _ = ticker.tick() => {
                let events = player
                    .active_element_mut()
                    .map(|element| element.advance(step))
                    .unwrap_or_default();
                let track_changed = events.contains(&MediaEvent::Ended);
                for event in events {
                    player.handle_event(event);
                }
                if track_changed {
                    print_status(&player);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("play 3"), Ok(Command::Play(2)));
        assert_eq!(parse_command(""), Ok(Command::Toggle));
        assert_eq!(parse_command("  NEXT "), Ok(Command::Next));
        assert_eq!(parse_command("seek 42.5"), Ok(Command::Seek(42.5)));
        assert_eq!(parse_command("vol 0.3"), Ok(Command::Volume(0.3)));
        assert_eq!(parse_command("q"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_command("play 0").is_err());
        assert!(parse_command("play x").is_err());
        assert!(parse_command("seek").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[test]
    fn test_apply_quit_stops_loop() {
        let mut player = Player::with_seed(SimulatedBackend::new(), Vec::new(), 1);
        assert!(!apply(&mut player, Command::Quit));
        assert!(apply(&mut player, Command::Next));
    }
}
