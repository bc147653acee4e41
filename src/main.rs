use std::fs::OpenOptions;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::{debug, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{
    EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use shelfcache::application::{
    BatchPreloader, ImageSlotInput, LibraryPreloader, PreloadWindow, SingleItemLoader,
};
use shelfcache::domain::LibraryItem;
use shelfcache::infrastructure::config::Command;
use shelfcache::infrastructure::image::http_fetcher::DEFAULT_MAX_LOW_PRIORITY;
use shelfcache::infrastructure::{
    AppConfig, CliArgs, HttpImageFetcher, LocalImageStore, ResourceCache, StorageManager,
};

const PRELOAD_POLL: Duration = Duration::from_millis(50);

fn init_logging(config: &AppConfig) -> Result<()> {
    let default_level = LevelFilter::from_level(config.log_level.to_tracing_level());
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let log_path = config.effective_log_path();
    let file_layer = match &log_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .wrap_err_with(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_writer(file).with_ansi(false))
        }
        None => None,
    };

    // stdout carries command output; stderr only gets warnings once a file
    // receives the full log.
    let stderr_level = if file_layer.is_some() {
        LevelFilter::WARN
    } else {
        LevelFilter::TRACE
    };
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_level);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    if let Some(path) = log_path {
        debug!(path = %path.display(), "Logging to file");
    }
    Ok(())
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let storage = StorageManager::new().wrap_err("Failed to locate config directory")?;
    let mut config = storage
        .load_config(args.config.as_deref())
        .wrap_err("Failed to load configuration")?;
    config.merge_with_args(args);
    Ok(config)
}

fn build_items(ids: &[i64], manga: bool, server: Option<&str>) -> Arc<[LibraryItem]> {
    ids.iter()
        .map(|&id| {
            if manga {
                LibraryItem::Series {
                    id,
                    series_id: id,
                    server: server.map(str::to_string),
                }
            } else {
                LibraryItem::Book { id, file_id: id }
            }
        })
        .collect()
}

async fn warm_offline(
    cache: &ResourceCache,
    config: &AppConfig,
    items: &[LibraryItem],
) -> Result<()> {
    let root = config
        .effective_data_dir()
        .ok_or_else(|| color_eyre::eyre::eyre!("No offline data directory available"))?;
    let store = Arc::new(LocalImageStore::new(root));

    for item in items {
        let loader = SingleItemLoader::new(
            cache.clone(),
            store.clone(),
            config.server.clone(),
            ImageSlotInput::offline(item.clone()),
        );
        loader.load().await;
        let state = loader.snapshot();
        match (&state.resolved_location, &state.error) {
            (Some(location), None) => println!("{} {location}", item.id()),
            (_, Some(error)) => println!("{} {error}", item.id()),
            (None, None) => println!("{} -", item.id()),
        }
    }
    Ok(())
}

async fn warm_online(
    cache: &ResourceCache,
    config: &AppConfig,
    items: Arc<[LibraryItem]>,
    visible: usize,
) {
    if config.server.is_none() || config.library_id.is_none() {
        warn!("Server or library not configured, nothing to warm");
        return;
    }

    let window = PreloadWindow {
        items: Arc::clone(&items),
        start: 0,
        end: Some(visible),
        library_id: config.library_id,
        offline: false,
    };
    let preloader = BatchPreloader::new(
        cache.clone(),
        config.server.clone(),
        config.preload.clone(),
    );
    preloader.update(&window);
    while preloader.is_preloading() {
        tokio::time::sleep(PRELOAD_POLL).await;
    }
    info!(preloaded = preloader.preloaded_count(), "Visible window warmed");

    let library = LibraryPreloader::new(
        cache.clone(),
        config.server.clone(),
        config.preload.clone(),
    );
    let requested = library.preload_now(config.library_id, &items, false).await;
    info!(requested, "Remaining covers warmed");
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();
    let config = load_config(&args)?;

    init_logging(&config)?;
    info!(version = shelfcache::VERSION, "Starting {}", shelfcache::NAME);

    match args.command {
        Some(Command::Config { json }) => {
            let rendered = if json {
                serde_json::to_string_pretty(&config).wrap_err("Failed to render configuration")?
            } else {
                toml::to_string_pretty(&config).wrap_err("Failed to render configuration")?
            };
            println!("{rendered}");
        }
        Some(Command::Warm {
            ids,
            manga,
            visible,
            json,
        }) => {
            let fetcher = HttpImageFetcher::new(DEFAULT_MAX_LOW_PRIORITY)
                .wrap_err("Failed to create HTTP client")?;
            let cache = ResourceCache::new(config.cache.clone(), Arc::new(fetcher));
            let sweeper = cache.start_sweeper();

            let items = build_items(&ids, manga, config.server.as_deref());
            if config.offline {
                warm_offline(&cache, &config, &items).await?;
            } else {
                warm_online(&cache, &config, items, visible).await;
            }

            let stats = cache.stats();
            if json {
                println!("{}", serde_json::to_string(&stats)?);
            } else {
                println!("{stats}");
            }
            sweeper.abort();
        }
        None => {
            println!("{}", cache_summary(&config));
        }
    }

    Ok(())
}

fn cache_summary(config: &AppConfig) -> String {
    format!(
        "{} {}: server {}, library {}, capacity {}",
        shelfcache::NAME,
        shelfcache::VERSION,
        config.server.as_deref().unwrap_or("-"),
        config
            .library_id
            .map_or_else(|| "-".to_string(), |id| id.to_string()),
        config.cache.capacity
    )
}
