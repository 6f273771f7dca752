//! Addonhub - addon resolution and aggregation from the command line.
//!
//! Manages the installed addon set and runs catalog, discovery, stream,
//! subtitle, meta and search queries across every installed addon.

#![allow(clippy::single_match_else)]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use addonhub::addon::{Addon, DiscoverRow, ExtraValue, MetaItemPreview, Stream, Subtitles};
use addonhub::{Engine, EngineConfig, InstallOutcome, SearchResult};

/// Addon resolution and aggregation engine
#[derive(Parser)]
#[command(name = "addonhub")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Directory holding the installed addon set
    #[arg(long, global = true, env = "ADDONHUB_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Configuration file (defaults to .addonhub.toml, then the user config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List installed addons
    List,

    /// Load the installed set, installing default addons if it is empty
    Init,

    /// Install an addon from its manifest URL
    Install {
        /// Manifest or base URL
        url: String,
    },

    /// Uninstall an addon by id
    Uninstall {
        /// Addon id
        id: String,
    },

    /// Fetch one catalog page from one addon
    Catalog {
        /// Addon id
        addon: String,

        /// Media type (movie, series, ...)
        media_type: String,

        /// Catalog id
        catalog: String,

        /// Extra values (name=value)
        #[arg(short, long, value_parser = parse_extra)]
        extra: Vec<ExtraValue>,

        /// Number of items to skip
        #[arg(long, default_value_t = 0)]
        skip: u32,
    },

    /// Show discovery rows
    Discover {
        /// Media types (defaults to the configured ones)
        #[arg(short = 't', long = "type")]
        types: Vec<String>,
    },

    /// List streams for a title
    Streams {
        /// Media type
        media_type: String,

        /// Title id
        id: String,

        /// Video id (episode) to fetch streams for
        #[arg(long)]
        video: Option<String>,
    },

    /// List subtitles for a title
    Subtitles {
        /// Media type
        media_type: String,

        /// Title id
        id: String,

        /// Extra values (name=value), e.g. videoHash=...
        #[arg(short, long, value_parser = parse_extra)]
        extra: Vec<ExtraValue>,
    },

    /// Show full metadata for a title
    Meta {
        /// Media type
        media_type: String,

        /// Title id
        id: String,
    },

    /// Search every searchable catalog
    Search {
        /// Search query
        query: String,

        /// Media types (defaults to the configured ones)
        #[arg(short = 't', long = "type")]
        types: Vec<String>,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

fn parse_extra(value: &str) -> Result<ExtraValue, String> {
    ExtraValue::parse(value).ok_or_else(|| format!("expected name=value, got '{value}'"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Commands::Config { path } = cli.command {
        return cmd_config(cli.config.as_ref(), path);
    }

    let config = load_config(cli.config.as_ref(), cli.data_dir.clone())?;
    let engine = Engine::from_config(config)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(&engine, cli.command, cli.format))?;

    if engine.is_persist_pending() {
        eprintln!("Warning: installed addons could not be saved");
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>, data_dir: Option<PathBuf>) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::load()?,
    };

    if data_dir.is_some() {
        config.storage.path = data_dir;
    }

    config.validate()?;
    Ok(config)
}

async fn run(engine: &Engine, command: Commands, format: OutputFormat) -> Result<()> {
    if matches!(command, Commands::Init) {
        let count = engine.initialize().await?;
        println!("{count} addon(s) installed");
        return Ok(());
    }

    engine.load()?;

    match command {
        Commands::List => cmd_list(engine, format),
        Commands::Install { url } => cmd_install(engine, &url, format).await,
        Commands::Uninstall { id } => {
            engine.uninstall_addon(&id).await?;
            println!("Uninstalled {id}");
            Ok(())
        }
        Commands::Catalog { addon, media_type, catalog, extra, skip } => {
            cmd_catalog(engine, &addon, &media_type, &catalog, extra, skip, format).await
        }
        Commands::Discover { types } => cmd_discover(engine, &types, format).await,
        Commands::Streams { media_type, id, video } => {
            let streams = engine.get_streams(&media_type, &id, video.as_deref()).await;
            print_streams(&streams, format)
        }
        Commands::Subtitles { media_type, id, extra } => {
            let subtitles = engine.get_subtitles(&media_type, &id, extra).await;
            print_subtitles(&subtitles, format)
        }
        Commands::Meta { media_type, id } => cmd_meta(engine, &media_type, &id, format).await,
        Commands::Search { query, types } => {
            let results = engine.search(&query, &types).await;
            print_search(&results, format)
        }
        Commands::Init | Commands::Config { .. } => Ok(()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// List installed addons.
fn cmd_list(engine: &Engine, format: OutputFormat) -> Result<()> {
    let addons = engine.installed_addons();

    match format {
        OutputFormat::Json => print_json(addons.as_slice()),
        OutputFormat::Text => {
            if addons.is_empty() {
                println!("No addons installed.");
                println!("\nInstall addons with:");
                println!("  addonhub install <manifest-url>");
                println!("  addonhub init                      # Default addons");
                return Ok(());
            }

            println!("Installed addons:\n");
            for addon in addons.iter() {
                let marker = if addon.flags.is_locked() { " [official]" } else { "" };
                println!("  {} v{}{}", addon.name(), addon.manifest.version, marker);
                println!("      {} ({})", addon.id(), addon.transport_url);
            }
            println!("\nTotal: {} addon(s)", addons.len());
            Ok(())
        }
    }
}

async fn cmd_install(engine: &Engine, url: &str, format: OutputFormat) -> Result<()> {
    let outcome = engine.install_addon(url).await?;

    match (&outcome, format) {
        (InstallOutcome::Installed(addon), OutputFormat::Json) => print_json(addon),
        (InstallOutcome::Installed(addon), OutputFormat::Text) => {
            println!("Installed {} v{} ({})", addon.name(), addon.manifest.version, addon.id());
            Ok(())
        }
        (InstallOutcome::AlreadyInstalled(id), _) => {
            println!("Addon {id} is already installed");
            Ok(())
        }
    }
}

async fn cmd_catalog(
    engine: &Engine,
    addon_id: &str,
    media_type: &str,
    catalog_id: &str,
    extra: Vec<ExtraValue>,
    skip: u32,
    format: OutputFormat,
) -> Result<()> {
    let (addon, catalog) = engine.find_catalog(addon_id, media_type, catalog_id)?;

    let Some(page) = engine.get_catalog(&addon, &catalog, extra, skip).await else {
        anyhow::bail!("No response from {addon_id} for catalog {media_type}/{catalog_id}");
    };

    match format {
        OutputFormat::Json => print_json(&page),
        OutputFormat::Text => {
            print_items(&page.metas);
            if page.has_more {
                println!("\nMore available: --skip {}", skip as usize + page.metas.len());
            }
            Ok(())
        }
    }
}

async fn cmd_discover(engine: &Engine, types: &[String], format: OutputFormat) -> Result<()> {
    let rows: Vec<DiscoverRow> = if types.is_empty() {
        engine.discover_all().await
    } else {
        engine.aggregator().discover_all(types, &CancellationToken::new()).await
    };

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("Nothing to discover.");
            }
            for row in &rows {
                println!("{}  ({})", row.title, row.deep_link);
                print_items(&row.items);
                println!();
            }
            Ok(())
        }
    }
}

async fn cmd_meta(engine: &Engine, media_type: &str, id: &str, format: OutputFormat) -> Result<()> {
    let Some((addon, meta)) = engine.get_meta(media_type, id).await else {
        anyhow::bail!("No addon returned metadata for {media_type}/{id}");
    };

    match format {
        OutputFormat::Json => print_json(&meta),
        OutputFormat::Text => {
            let preview = &meta.preview;
            println!("{} ({})", preview.name, preview.release_info.as_deref().unwrap_or("-"));
            println!("  From: {}", addon.name());
            if let Some(ref description) = preview.description {
                println!("  {description}");
            }
            for season in meta.seasons() {
                println!("  Season {season}: {} episode(s)", meta.videos_for_season(season).len());
            }
            Ok(())
        }
    }
}

fn print_items(items: &[MetaItemPreview]) {
    for item in items {
        match item.release_info {
            Some(ref info) => println!("  {} ({}) [{}]", item.name, info, item.id),
            None => println!("  {} [{}]", item.name, item.id),
        }
    }
}

#[derive(Serialize)]
struct AddonItem<'a, T> {
    addon: &'a str,
    #[serde(flatten)]
    item: &'a T,
}

fn with_addon<T>(pairs: &[(Addon, T)]) -> Vec<AddonItem<'_, T>> {
    pairs.iter().map(|(addon, item)| AddonItem { addon: addon.id(), item }).collect()
}

fn print_streams(streams: &[(Addon, Stream)], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&with_addon(streams)),
        OutputFormat::Text => {
            if streams.is_empty() {
                println!("No streams found.");
            }
            for (addon, stream) in streams {
                let label = stream.title.as_deref().or(stream.name.as_deref()).unwrap_or("stream");
                let target = stream
                    .playable_url()
                    .or_else(|| stream.magnet_url())
                    .unwrap_or_else(|| "-".to_string());
                println!("  [{}] {} -> {}", addon.name(), label.replace('\n', " "), target);
            }
            Ok(())
        }
    }
}

fn print_subtitles(subtitles: &[(Addon, Subtitles)], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&with_addon(subtitles)),
        OutputFormat::Text => {
            if subtitles.is_empty() {
                println!("No subtitles found.");
            }
            for (addon, subtitle) in subtitles {
                println!("  [{}] {} {}", addon.name(), subtitle.lang, subtitle.url);
            }
            Ok(())
        }
    }
}

fn print_search(results: &[SearchResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(results),
        OutputFormat::Text => {
            if results.is_empty() {
                println!("No results.");
            }
            for result in results {
                println!("{} ({} result(s))", result.addon.name(), result.items.len());
                print_items(&result.items);
                println!();
            }
            Ok(())
        }
    }
}

/// Show configuration.
fn cmd_config(path: Option<&PathBuf>, show_path: bool) -> Result<()> {
    if show_path {
        let path =
            path.cloned().or_else(|| EngineConfig::config_dir().map(|d| d.join("config.toml")));
        if let Some(path) = path {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let config = match path {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::load()?,
    };
    println!("{}", config.to_toml()?);

    Ok(())
}
