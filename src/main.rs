use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::sync::mpsc;

use bananaview::api::{build_http_client, ApiClient, ApiEndpoints};
use bananaview::app::{App, AppEvent, ChannelView, FeedPane};
use bananaview::config::Config;
use bananaview::feed::{FeedController, FeedMode};
use bananaview::resolution::{BackoffPoller, ResolutionCache};
use bananaview::translation::{update_terms, TranslationOverlay};
use bananaview::ui;

const LOG_FILE: &str = "bananaview.log";
const CONFIG_FILE: &str = "config.toml";
const TERMS_FILE: &str = "words.json";
const CUSTOM_TERMS_FILE: &str = "custom-words.json";
const SNAPSHOT_FILE: &str = "categories.json";

/// Get the config directory path (~/.config/bananaview/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("bananaview"))
}

#[derive(Parser, Debug)]
#[command(
    name = "bananaview",
    about = "Terminal mod feed browser with category lookup and translation"
)]
struct Args {
    /// Track to open: recommended, latest, updated or subscriptions
    #[arg(long, value_name = "MODE")]
    mode: Option<FeedMode>,

    /// Config file (default: ~/.config/bananaview/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Download the term list before starting
    #[arg(long)]
    update_terms: bool,

    /// Ignore the saved category snapshot
    #[arg(long)]
    reset_cache: bool,

    /// Show names and categories untranslated
    #[arg(long)]
    no_translate: bool,
}

/// Logs go to a file: the terminal is in raw mode while the UI runs.
fn init_tracing(dir: &Path) -> Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))
        .context("Failed to open log file")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn ensure_private_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).context("Failed to create config directory")?;
        println!("Created config directory: {}", dir.display());
    }

    // User-only access on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(dir, perms) {
                    tracing::warn!(
                        path = %dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }
    Ok(())
}

/// Loads the term lists into the overlay. A missing default list only
/// disables translation.
fn load_translations(overlay: &TranslationOverlay, dir: &Path, config: &Config) {
    let custom = config
        .translation
        .custom_terms
        .clone()
        .unwrap_or_else(|| dir.join(CUSTOM_TERMS_FILE));
    if let Err(e) = overlay.load_from_files(&dir.join(TERMS_FILE), Some(&custom)) {
        tracing::warn!(error = %e, "Translation disabled");
        eprintln!("Warning: term list unavailable ({}); run with --update-terms", e);
    }
}

fn load_cache(path: &Path, reset: bool) -> ResolutionCache {
    if reset {
        tracing::info!("Starting with an empty category cache");
        return ResolutionCache::new();
    }
    match ResolutionCache::load_snapshot(path) {
        Ok(cache) => {
            tracing::info!(entries = cache.len(), "Category snapshot loaded");
            cache
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable category snapshot");
            ResolutionCache::new()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_dir = get_config_dir()?;
    ensure_private_dir(&config_dir)?;
    init_tracing(&config_dir)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join(CONFIG_FILE));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let http = build_http_client(config.request_timeout()).context("Failed to build HTTP client")?;

    let terms_path = config_dir.join(TERMS_FILE);
    if args.update_terms {
        match update_terms(&http, &config.translation.terms_url, &terms_path).await {
            Ok(count) => println!("Term list updated: {} entries", count),
            Err(e) if terms_path.exists() => {
                tracing::warn!(error = %e, "Term update failed, keeping existing list");
                eprintln!("Warning: term update failed ({}); using existing list", e);
            }
            Err(e) => return Err(e).context("Failed to download term list"),
        }
    }

    let overlay = Arc::new(TranslationOverlay::new());
    if !args.no_translate {
        load_translations(&overlay, &config_dir, &config);
    }

    let snapshot_path = config_dir.join(SNAPSHOT_FILE);
    let cache = Arc::new(load_cache(&snapshot_path, args.reset_cache));

    let endpoints = ApiEndpoints::new(
        &config.api.base_url,
        config.api.game_id,
        &config.api.metadata_url,
    )
    .context("Invalid API URL in config")?;
    let api = Arc::new(ApiClient::new(http, endpoints));

    let poller = BackoffPoller::new(api.clone(), Arc::clone(&cache), config.poller_config());

    let (event_tx, event_rx) = mpsc::unbounded_channel::<AppEvent>();
    let scroll = Arc::new(AtomicUsize::new(0));
    let view = Arc::new(ChannelView::new(event_tx.clone(), Arc::clone(&scroll)));
    let controller = FeedController::new(
        api.clone(),
        poller.clone(),
        view,
        overlay,
        config.feed_filters(),
    );

    let mode = args.mode.unwrap_or(config.default_mode);
    let mut app = App::new(controller, api, FeedPane::new(scroll, config.advisory_mode));
    ui::open_mode(&mut app, mode, &event_tx);

    let result = ui::run(&mut app, event_tx, event_rx).await;

    poller.shutdown();
    match cache.save_snapshot(&snapshot_path) {
        Ok(()) => tracing::info!(entries = cache.len(), "Category snapshot saved"),
        Err(e) => tracing::warn!(error = %e, "Failed to save category snapshot"),
    }

    result?;
    println!("Goodbye!");
    Ok(())
}
