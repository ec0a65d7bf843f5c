use std::{process, sync::Arc};

use futures::stream::{self, StreamExt};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use youyou::{
    application::{context::AppContext, error::AppError, repos::EntityStore},
    cache::{CacheBackendKind, CacheConfig, MemoryCache, ObjectCache, RedisCache},
    config,
    domain::{
        snapshots::{
            ArticleSnapshot, CommentSnapshot, EntitySnapshot, ReviewSnapshot, ShareSnapshot,
            SiteSnapshot, UserSnapshot,
        },
        types::{EntityKind, EntityRef},
    },
    infra::{db::PostgresStore, error::InfraError, telemetry},
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let report = error.report();
    if dispatcher::has_been_set() {
        error!(error = %error, status = %report.status, chain = ?report.messages, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, status = %report.status, chain = ?report.messages, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Recount(args) => run_recount(settings, args).await,
        config::Command::Inspect(args) => run_inspect(settings, args).await,
        config::Command::Evict(args) => run_evict(settings, args).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_recount(settings: config::Settings, args: config::RecountArgs) -> Result<(), AppError> {
    let app = build_context(&settings).await?;
    let concurrency = args.concurrency.clamp(1, 32);

    for kind in args.kinds() {
        let ids = app.store.entity_ids(kind).await?;
        info!(
            target = "youyou::recount",
            kind = %kind,
            entities = ids.len(),
            concurrency,
            "Starting recount"
        );

        let counters = app.counters.clone();
        let mut results = stream::iter(ids)
            .map(|id| {
                let counters = counters.clone();
                async move { (id, counters.recompute_and_cache(EntityRef::new(kind, id)).await) }
            })
            .buffer_unordered(concurrency);

        let mut refreshed = 0usize;
        let mut failed = 0usize;
        while let Some((id, result)) = results.next().await {
            match result {
                Ok(Some(_)) => refreshed += 1,
                Ok(None) => {}
                Err(err) => {
                    failed += 1;
                    warn!(
                        target = "youyou::recount",
                        kind = %kind,
                        id,
                        error = %err,
                        "Recount failed"
                    );
                }
            }
        }

        info!(
            target = "youyou::recount",
            kind = %kind,
            refreshed,
            failed,
            "Recount completed"
        );
    }
    Ok(())
}

async fn run_inspect(settings: config::Settings, args: config::EntityArgs) -> Result<(), AppError> {
    let app = build_context(&settings).await?;
    let loader = &app.loader;
    let ids = &args.ids;

    let snapshots: Vec<EntitySnapshot> = match args.kind {
        EntityKind::User => wrap(loader.load::<UserSnapshot>(ids, false).await?, EntitySnapshot::User),
        EntityKind::Site => wrap(loader.load::<SiteSnapshot>(ids, false).await?, EntitySnapshot::Site),
        EntityKind::Review => wrap(
            loader.load::<ReviewSnapshot>(ids, false).await?,
            EntitySnapshot::Review,
        ),
        EntityKind::Comment => wrap(
            loader.load::<CommentSnapshot>(ids, false).await?,
            EntitySnapshot::Comment,
        ),
        EntityKind::Article => wrap(
            loader.load::<ArticleSnapshot>(ids, false).await?,
            EntitySnapshot::Article,
        ),
        EntityKind::Share => wrap(
            loader.load::<ShareSnapshot>(ids, false).await?,
            EntitySnapshot::Share,
        ),
    };

    let rendered = serde_json::to_string_pretty(&snapshots)
        .map_err(|err| AppError::unexpected(format!("failed to render snapshots: {err}")))?;
    println!("{rendered}");
    Ok(())
}

async fn run_evict(settings: config::Settings, args: config::EntityArgs) -> Result<(), AppError> {
    let app = build_context(&settings).await?;

    let evicted = app.loader.evict_kind(args.kind, &args.ids).await;
    info!(
        target = "youyou::evict",
        kind = %args.kind,
        ids = args.ids.len(),
        backend = app.cache.backend_name(),
        evicted,
        "Snapshot eviction finished"
    );
    if !evicted {
        return Err(AppError::unexpected("cache backend rejected the eviction"));
    }
    Ok(())
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let store = PostgresStore::open(&settings.database).await?;
    store.health_check().await?;
    info!(target = "youyou::migrate", "Schema is up to date");
    Ok(())
}

fn wrap<S>(snapshots: Vec<S>, variant: fn(S) -> EntitySnapshot) -> Vec<EntitySnapshot> {
    snapshots.into_iter().map(variant).collect()
}

fn build_backend(config: &CacheConfig) -> Result<Arc<dyn ObjectCache>, AppError> {
    match config.backend {
        CacheBackendKind::Memory => Ok(Arc::new(MemoryCache::new(config))),
        CacheBackendKind::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| InfraError::missing("cache.redis_url"))?;
            let cache = RedisCache::new(url).map_err(InfraError::from)?;
            Ok(Arc::new(cache))
        }
    }
}

async fn build_context(settings: &config::Settings) -> Result<AppContext, AppError> {
    let config = CacheConfig::from(&settings.cache);
    let backend = build_backend(&config)?;
    let store: Arc<dyn EntityStore> = Arc::new(PostgresStore::open(&settings.database).await?);
    info!(
        target = "youyou::startup",
        backend = backend.name(),
        cache_enabled = config.is_enabled(),
        "Cache layer ready"
    );
    Ok(AppContext::new(store, backend, config))
}
