use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.jobs.fanout_batch_concurrency = Some(4);
    raw.logging.level = Some("info".to_string());

    let overrides = WorkerOverrides {
        jobs_fanout_batch_concurrency: Some(16),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_worker_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.jobs.fanout_batch_concurrency.get(), 16);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn feed_defaults() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
    assert_eq!(settings.feed.page_size.get(), DEFAULT_FEED_PAGE_SIZE);
    assert_eq!(
        settings.feed.fanout_batch_size.get(),
        DEFAULT_FEED_FANOUT_BATCH_SIZE
    );
    assert_eq!(settings.feed.task_time_limit, Duration::from_secs(3600));
    assert_eq!(settings.cache.list_limit.get(), DEFAULT_CACHE_LIST_LIMIT);
    assert!(settings.cache.enable_list_cache);
    assert!(settings.redis.url.is_none());
}

#[test]
fn zero_sizes_are_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.list_limit = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero list limit");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.list_limit",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.feed.fanout_batch_size = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero batch size");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "feed.fanout_batch_size",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.feed.task_time_limit_seconds = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn blank_redis_url_means_in_memory() {
    let mut raw = RawSettings::default();
    raw.redis.url = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.redis.url.is_none());
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = WorkerOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_worker_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn default_to_worker_command() {
    let args = CliArgs::parse_from(["murmur"]);
    let command = args
        .command
        .unwrap_or(Command::Worker(Box::<WorkerArgs>::default()));
    assert!(matches!(command, Command::Worker(_)));
}

#[test]
fn parse_fanout_arguments() {
    let args = CliArgs::parse_from([
        "murmur",
        "fanout",
        "--item-id",
        "42",
        "--owner-id",
        "7",
        "--redis-url",
        "redis://cache",
    ]);

    match args.command.expect("fanout command") {
        Command::Fanout(fanout) => {
            assert_eq!(fanout.item_id, 42);
            assert_eq!(fanout.owner_id, 7);
            assert_eq!(fanout.stores.redis_url.as_deref(), Some("redis://cache"));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn feed_cursors_conflict() {
    let result = CliArgs::try_parse_from([
        "murmur",
        "feed",
        "--user-id",
        "1",
        "--newer-than",
        "a",
        "--older-than",
        "b",
    ]);
    assert!(result.is_err());
}

#[test]
fn parse_gate_set_arguments() {
    let args = CliArgs::parse_from(["murmur", "gate", "set", "switch", "percent", "30"]);

    match args.command.expect("gate command") {
        Command::Gate(gate) => match gate.command {
            GateCommand::Set { name, key, value } => {
                assert_eq!(name, "switch");
                assert_eq!(key, "percent");
                assert_eq!(value, "30");
            }
            GateCommand::Get { .. } => panic!("wrong gate command parsed"),
        },
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn feed_page_size_override_applies() {
    let args = CliArgs::parse_from(["murmur", "feed", "--user-id", "1", "--page-size", "5"]);
    let settings = load(&args).expect("valid settings");
    assert_eq!(settings.feed.page_size.get(), 5);
}
