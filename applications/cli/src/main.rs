/// Cirrus - command-line access to the track catalog, signed URLs and favorites
use anyhow::{Context, Result};
use cirrus_cli::{AppConfig, JsonFilePreferenceStore};
use cirrus_playback::{Favorites, TrackId};
use cirrus_server_client::CirrusClient;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cirrus")]
#[command(about = "Cirrus music streaming client", long_about = None)]
struct Cli {
    /// Configuration file path (default: ./cirrus.toml if present)
    #[arg(short, long, global = true, env = "CIRRUS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the track catalog
    Tracks {
        /// Only list favorites
        #[arg(long)]
        favorites: bool,
    },
    /// Mint a signed URL for a track
    Resolve {
        /// Track name as listed by `tracks`
        track: String,
    },
    /// Show backend name and version
    Info,
    /// Manage favorites
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
enum FavoritesAction {
    /// List favorites
    List,
    /// Mark a track as favorite
    Add { track: String },
    /// Remove a track from favorites
    Remove { track: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (stderr, so listings stay pipeable)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cirrus=info,cirrus_cli=info,cirrus_playback=info,cirrus_server_client=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Tracks { favorites } => list_tracks(&config, favorites).await,
        Commands::Resolve { track } => resolve(&config, TrackId::new(track)).await,
        Commands::Info => info(&config).await,
        Commands::Favorites { action } => manage_favorites(&config, action),
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn client(config: &AppConfig) -> Result<CirrusClient> {
    CirrusClient::new(config.server.clone()).context("Invalid server configuration")
}

fn preferences(config: &AppConfig) -> Result<JsonFilePreferenceStore> {
    Ok(JsonFilePreferenceStore::open(&config.preferences_path)?)
}

async fn list_tracks(config: &AppConfig, favorites_only: bool) -> Result<()> {
    let listing: Vec<TrackId> = client(config)?
        .get_tracks()
        .await?
        .into_iter()
        .map(TrackId::from)
        .collect();
    let favorites = Favorites::load(&preferences(config)?)?;

    if favorites_only {
        let tracks = favorites.filter(&listing);
        if tracks.is_empty() {
            println!("No favorites to play");
        }
        for track in tracks {
            println!("{}", track);
        }
        return Ok(());
    }

    for track in &listing {
        let marker = if favorites.contains(track) { "♥" } else { " " };
        println!("{} {}", marker, track);
    }
    tracing::info!(count = listing.len(), "Listed tracks");
    Ok(())
}

async fn resolve(config: &AppConfig, track: TrackId) -> Result<()> {
    let signed = client(config)?
        .get_signed_url(&track)
        .await
        .with_context(|| format!("Failed to get URL for {}", track))?;

    println!("{}", signed.url);
    println!("valid until {}", signed.valid_until.to_rfc3339());
    Ok(())
}

async fn info(config: &AppConfig) -> Result<()> {
    let info = client(config)?.get_server_info().await?;

    println!("{} v{}", info.name, info.version);
    if let Some(description) = info.description {
        println!("{}", description);
    }
    Ok(())
}

fn manage_favorites(config: &AppConfig, action: FavoritesAction) -> Result<()> {
    let store = preferences(config)?;
    let mut favorites = Favorites::load(&store)?;

    match action {
        FavoritesAction::List => {
            if favorites.is_empty() {
                println!("No favorites yet");
            }
            for track in favorites.iter() {
                println!("{}", track);
            }
            return Ok(());
        }
        FavoritesAction::Add { track } => {
            if !favorites.insert(TrackId::new(track.as_str())) {
                println!("{} is already a favorite", track);
                return Ok(());
            }
            println!("Added {}", track);
        }
        FavoritesAction::Remove { track } => {
            if !favorites.remove(&TrackId::new(track.as_str())) {
                println!("{} is not a favorite", track);
                return Ok(());
            }
            println!("Removed {}", track);
        }
    }

    favorites.save(&store)?;
    Ok(())
}
