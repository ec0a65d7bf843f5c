use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

use crate::cache::CacheBackendKind;
use crate::domain::types::EntityKind;

/// Command-line arguments for the YouYou cache maintenance binary.
#[derive(Debug, Parser)]
#[command(name = "youyou", version, about = "YouYou cache and counter maintenance")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "YOUYOU_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Recompute denormalized counters and refresh cached snapshots.
    Recount(RecountArgs),
    /// Print the snapshots the cache would serve for the given ids.
    Inspect(EntityArgs),
    /// Remove cached snapshots for the given ids.
    Evict(EntityArgs),
    /// Apply pending database migrations.
    Migrate(MigrateArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RecountArgs {
    #[command(flatten)]
    pub overrides: RuntimeOverrides,

    /// Recount sites; when no kind flag is supplied, every kind is recounted.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub sites: bool,

    /// Recount users.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub users: bool,

    /// Recount reviews.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub reviews: bool,

    /// Recount articles.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub articles: bool,

    /// Maximum number of entities recounted concurrently.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(usize))]
    pub concurrency: usize,
}

impl RecountArgs {
    /// Entity kinds selected on the command line.
    pub fn kinds(&self) -> Vec<EntityKind> {
        let selected: Vec<EntityKind> = [
            (self.sites, EntityKind::Site),
            (self.users, EntityKind::User),
            (self.reviews, EntityKind::Review),
            (self.articles, EntityKind::Article),
        ]
        .into_iter()
        .filter_map(|(flag, kind)| flag.then_some(kind))
        .collect();

        if selected.is_empty() {
            vec![
                EntityKind::Site,
                EntityKind::User,
                EntityKind::Review,
                EntityKind::Article,
            ]
        } else {
            selected
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct EntityArgs {
    #[command(flatten)]
    pub overrides: RuntimeOverrides,

    /// Entity kind (user, site, review, comment, article, share).
    #[arg(value_name = "KIND", value_parser = parse_entity_kind)]
    pub kind: EntityKind,

    /// Entity ids.
    #[arg(value_name = "ID", required = true, num_args = 1..)]
    pub ids: Vec<i64>,
}

#[derive(Debug, Args, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RuntimeOverrides {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Toggle the object cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the cache backend (memory|redis).
    #[arg(long = "cache-backend", value_name = "BACKEND", value_parser = parse_backend)]
    pub cache_backend: Option<CacheBackendKind>,

    /// Override the redis connection URL.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,

    /// Override the cache key prefix.
    #[arg(long = "cache-key-prefix", value_name = "PREFIX")]
    pub cache_key_prefix: Option<String>,
}

fn parse_entity_kind(value: &str) -> Result<EntityKind, String> {
    EntityKind::parse(value).ok_or_else(|| format!("unknown entity kind `{value}`"))
}

fn parse_backend(value: &str) -> Result<CacheBackendKind, String> {
    CacheBackendKind::parse(value).ok_or_else(|| format!("unknown cache backend `{value}`"))
}
