//! streamsift CLI: run aggregation queries and manage the result cache.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use debrid::{DebridService, Vendor};
use release_types::{EpisodeTarget, StreamKind};
use sift_engine::{SearchCoordinator, SharedHttp};
use std::sync::Arc;
use streamsift::aggregator::AggregatorService;
use streamsift::config::AppConfig;
use streamsift::database::batching::CacheWriteBuffer;
use streamsift::database::maintenance::CacheSweeper;
use streamsift::database::store::{NoopStreamCacheStore, SqliteStreamCacheStore, StreamCacheStore};
use streamsift::home_library::StoreHomeLibrary;
use streamsift::metadata::CinemetaClient;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "streamsift", version, about = "Streaming-metadata aggregator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    Movie,
    Series,
}

impl From<KindArg> for StreamKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Movie => StreamKind::Movie,
            KindArg::Series => StreamKind::Series,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run one aggregation query and print the ranked candidates.
    Query {
        #[arg(value_enum)]
        kind: KindArg,
        /// Content id (e.g. an imdb id like tt0903747).
        id: String,
        #[arg(long, requires = "episode")]
        season: Option<u32>,
        #[arg(long, requires = "season")]
        episode: Option<u32>,
        /// Debrid service to check against.
        #[arg(long, default_value = "homemedia")]
        service: String,
    },
    /// Remove expired cache rows now.
    Sweep,
    /// Clear cached state.
    Clear {
        /// Clear one service's rows.
        #[arg(long, conflicts_with_all = ["search_results", "all"])]
        service: Option<String>,
        /// Clear rows that came out of searches.
        #[arg(long)]
        search_results: bool,
        /// Clear everything.
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Arc::new(AppConfig::from_env()?);
    let _log_guard = streamsift::logging::init_logging(&config.log_dir)?;

    // A broken cache never takes the request path down with it: fall back to
    // the no-op store and keep serving.
    let store: Arc<dyn StreamCacheStore> =
        match streamsift::database::create_pools_at(&config.database_path()).await {
            Ok((pool, write_pool)) => Arc::new(SqliteStreamCacheStore::new(pool, write_pool)),
            Err(err) => {
                warn!(error = %err, "cache unavailable, running without persistence");
                Arc::new(NoopStreamCacheStore)
            }
        };

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                shutdown.cancel();
            }
        });
    }

    match cli.command {
        Command::Query {
            kind,
            id,
            season,
            episode,
            service,
        } => {
            let episode_target = match (season, episode) {
                (Some(season), Some(episode)) => Some(EpisodeTarget::new(season, episode)),
                _ => None,
            };
            let kind = StreamKind::from(kind);
            if kind == StreamKind::Series && episode_target.is_none() {
                bail!("series queries need --season and --episode");
            }

            run_query(config, store, &service, kind, &id, episode_target, shutdown).await?;
        }
        Command::Sweep => {
            let removed = store.sweep_expired().await?;
            println!("removed {removed} expired rows");
        }
        Command::Clear {
            service,
            search_results,
            all,
        } => {
            let removed = if all {
                store.clear_all().await?
            } else if search_results {
                store.clear_search_results().await?
            } else if let Some(service) = service {
                store.clear_service(&service).await?
            } else {
                bail!("pass --service <name>, --search-results or --all");
            };
            println!("removed {removed} rows");
        }
    }

    Ok(())
}

async fn run_query(
    config: Arc<AppConfig>,
    store: Arc<dyn StreamCacheStore>,
    service: &str,
    kind: StreamKind,
    id: &str,
    episode: Option<EpisodeTarget>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let http = Arc::new(SharedHttp::new(config.http_settings()));

    let coordinator = Arc::new(SearchCoordinator::new(config.coordinator_config()));
    let _share_sweep = coordinator.start_sweeper();
    let _ttl_sweep =
        CacheSweeper::new(store.clone(), config.sweep_interval).start(shutdown.child_token());
    let write_buffer = Arc::new(CacheWriteBuffer::spawn(
        store.clone(),
        Default::default(),
        shutdown.child_token(),
    ));

    let mut scrapers: Vec<Arc<dyn indexers::Scraper>> = Vec::new();
    if let Some(url) = &config.jackett_url {
        let scraper = indexers::JackettScraper::new(
            "jackett",
            url,
            config.jackett_api_key.clone().unwrap_or_default(),
            http.client_for("jackett").map_err(streamsift::Error::from)?,
        )
        .context("invalid jackett configuration")?;
        scrapers.push(Arc::new(scraper));
    }
    if scrapers.is_empty() {
        warn!("no scrapers configured, only cached/personal results can appear");
    }

    let vendor: Vendor = service
        .parse()
        .with_context(|| format!("unknown debrid service `{service}`"))?;
    let library = Arc::new(StoreHomeLibrary::new(store.clone()));
    let driver: Arc<dyn DebridService> = debrid::registry::build_driver(vendor, Some(library))
        .with_context(|| format!("debrid service `{service}` is not usable here"))?;

    let aggregator = AggregatorService::new(
        config.clone(),
        Arc::new(CinemetaClient::new(http.clone())),
        store,
        coordinator.clone(),
        scrapers,
        Arc::new(relname::MemoizedParser::default()),
        write_buffer.clone(),
    );

    let results = aggregator
        .search(driver, kind, id, episode, Vec::new(), &shutdown.child_token())
        .await?;

    if results.is_empty() {
        println!("no playable candidates found");
    } else {
        for (index, stream) in results.iter().enumerate() {
            let gib = stream.size as f64 / f64::from(1u32 << 30);
            let hint = stream
                .episode_file_hint
                .as_ref()
                .map(|h| format!(" -> {}", h.file_path))
                .unwrap_or_default();
            println!(
                "{:>2}. [{} {} {}] {} ({:.2} GiB) via {} ({}){}",
                index + 1,
                stream.category,
                stream.resolution,
                stream.codec,
                stream.title,
                gib,
                stream.source,
                stream.from,
                hint,
            );
        }
    }

    // Flush pending upserts, stop background loops, drain transports.
    write_buffer.close().await;
    coordinator.shutdown();
    http.shutdown();
    shutdown.cancel();
    Ok(())
}
