use super::*;
use crate::domain::types::EntityKind;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("info".to_string());
    raw.cache.key_prefix = Some("file".to_string());

    let overrides = RuntimeOverrides {
        log_level: Some("debug".to_string()),
        cache_key_prefix: Some("cli".to_string()),
        ..Default::default()
    };

    raw.apply_runtime_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.cache.key_prefix, "cli");
}

#[test]
fn cache_defaults() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.backend, CacheBackendKind::Memory);
    assert_eq!(settings.cache.default_ttl_secs, 900);
    assert_eq!(settings.cache.memory_capacity, 10_000);
    assert_eq!(settings.database.max_connections.get(), 8);
    assert!(settings.database.url.is_none());
}

#[test]
fn redis_backend_requires_url() {
    let mut raw = RawSettings::default();
    raw.cache.backend = Some(CacheBackendKind::Redis);
    let err = Settings::from_raw(raw.clone()).expect_err("missing url");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.redis_url",
            ..
        }
    ));

    raw.cache.redis_url = Some("redis://127.0.0.1/".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cache.backend, CacheBackendKind::Redis);
}

#[test]
fn zero_ttl_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.default_ttl_secs = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn blank_database_url_is_ignored() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = RuntimeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_runtime_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn parse_recount_arguments() {
    let args = CliArgs::parse_from([
        "youyou",
        "recount",
        "--database-url",
        "postgres://example",
        "--sites",
        "--concurrency",
        "8",
    ]);

    match args.command {
        Command::Recount(recount) => {
            assert_eq!(
                recount.overrides.database.database_url.as_deref(),
                Some("postgres://example")
            );
            assert_eq!(recount.kinds(), vec![EntityKind::Site]);
            assert_eq!(recount.concurrency, 8);
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn recount_without_flags_covers_every_kind() {
    let args = CliArgs::parse_from(["youyou", "recount"]);
    match args.command {
        Command::Recount(recount) => assert_eq!(recount.kinds().len(), 4),
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_inspect_arguments() {
    let args = CliArgs::parse_from([
        "youyou",
        "inspect",
        "--cache-backend",
        "redis",
        "--redis-url",
        "redis://cache/",
        "review",
        "3",
        "4",
    ]);

    match args.command {
        Command::Inspect(inspect) => {
            assert_eq!(inspect.kind, EntityKind::Review);
            assert_eq!(inspect.ids, vec![3, 4]);
            assert_eq!(
                inspect.overrides.cache_backend,
                Some(CacheBackendKind::Redis)
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn unknown_entity_kind_is_rejected() {
    let result = CliArgs::try_parse_from(["youyou", "evict", "brand", "1"]);
    assert!(result.is_err());
}

#[test]
fn parse_migrate_arguments() {
    let args = CliArgs::parse_from(["youyou", "migrate", "--database-url", "postgres://m"]);
    match args.command {
        Command::Migrate(migrate) => {
            assert_eq!(migrate.database.database_url.as_deref(), Some("postgres://m"));
        }
        _ => panic!("wrong command parsed"),
    }
}
