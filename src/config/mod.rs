//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod cli;

pub use cli::{
    CliArgs, Command, FanoutArgs, FeedArgs, GateArgs, GateCommand, StoreOverrides, WorkerArgs,
    WorkerOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "murmur";
const DEFAULT_DB_HTTP_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_DB_JOBS_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_JOB_FANOUT_MAIN_CONCURRENCY: u32 = 2;
const DEFAULT_JOB_FANOUT_BATCH_CONCURRENCY: u32 = 8;
const DEFAULT_FEED_PAGE_SIZE: usize = 20;
const DEFAULT_FEED_FANOUT_BATCH_SIZE: usize = 1000;
const DEFAULT_FEED_TASK_TIME_LIMIT_SECS: u64 = 3600;
const DEFAULT_CACHE_LIST_LIMIT: usize = 200;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub cache: CacheSettings,
    pub feed: FeedSettings,
    pub jobs: JobsSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub http_max_connections: NonZeroU32,
    pub jobs_max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    /// Shared store URL. Without one the process falls back to an in-memory store.
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enable_list_cache: bool,
    pub list_limit: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub page_size: NonZeroUsize,
    pub fanout_batch_size: NonZeroUsize,
    pub task_time_limit: Duration,
}

#[derive(Debug, Clone)]
pub struct JobsSettings {
    pub fanout_main_concurrency: NonZeroU32,
    pub fanout_batch_concurrency: NonZeroU32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("MURMUR").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Worker(args)) => raw.apply_worker_overrides(&args.overrides),
        Some(Command::Fanout(args)) => raw.apply_store_overrides(&args.stores),
        Some(Command::Feed(args)) => {
            raw.apply_store_overrides(&args.stores);
            if let Some(page_size) = args.page_size {
                raw.feed.page_size = Some(page_size);
            }
        }
        Some(Command::Gate(args)) => {
            if let Some(url) = args.redis_url.as_ref() {
                raw.redis.url = Some(url.clone());
            }
        }
        None => raw.apply_worker_overrides(&WorkerOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    redis: RawRedisSettings,
    cache: RawCacheSettings,
    feed: RawFeedSettings,
    jobs: RawJobsSettings,
}

impl RawSettings {
    fn apply_worker_overrides(&mut self, overrides: &WorkerOverrides) {
        self.apply_store_overrides(&overrides.stores);
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(max) = overrides.database_jobs_max_connections {
            self.database.jobs_max_connections = Some(max);
        }
        if let Some(value) = overrides.jobs_fanout_main_concurrency {
            self.jobs.fanout_main_concurrency = Some(value);
        }
        if let Some(value) = overrides.jobs_fanout_batch_concurrency {
            self.jobs.fanout_batch_concurrency = Some(value);
        }
        if let Some(value) = overrides.feed_fanout_batch_size {
            self.feed.fanout_batch_size = Some(value);
        }
        if let Some(value) = overrides.feed_task_time_limit_seconds {
            self.feed.task_time_limit_seconds = Some(value);
        }
    }

    fn apply_store_overrides(&mut self, overrides: &StoreOverrides) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.redis.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            redis,
            cache,
            feed,
            jobs,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let redis = build_redis_settings(redis);
        let cache = build_cache_settings(cache)?;
        let feed = build_feed_settings(feed)?;
        let jobs = build_jobs_settings(jobs)?;

        Ok(Self {
            logging,
            database,
            redis,
            cache,
            feed,
            jobs,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_empty(database.url);

    let http_max_connections = non_zero_u32(
        database
            .http_max_connections
            .unwrap_or(DEFAULT_DB_HTTP_MAX_CONNECTIONS),
        "database.http_max_connections",
    )?;
    let jobs_max_connections = non_zero_u32(
        database
            .jobs_max_connections
            .unwrap_or(DEFAULT_DB_JOBS_MAX_CONNECTIONS),
        "database.jobs_max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        http_max_connections,
        jobs_max_connections,
    })
}

fn build_redis_settings(redis: RawRedisSettings) -> RedisSettings {
    RedisSettings {
        url: non_empty(redis.url),
    }
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let list_limit = non_zero_usize(
        cache.list_limit.unwrap_or(DEFAULT_CACHE_LIST_LIMIT),
        "cache.list_limit",
    )?;

    Ok(CacheSettings {
        enable_list_cache: cache.enable_list_cache.unwrap_or(true),
        list_limit,
    })
}

fn build_feed_settings(feed: RawFeedSettings) -> Result<FeedSettings, LoadError> {
    let page_size = non_zero_usize(
        feed.page_size.unwrap_or(DEFAULT_FEED_PAGE_SIZE),
        "feed.page_size",
    )?;
    let fanout_batch_size = non_zero_usize(
        feed.fanout_batch_size
            .unwrap_or(DEFAULT_FEED_FANOUT_BATCH_SIZE),
        "feed.fanout_batch_size",
    )?;

    let time_limit_secs = feed
        .task_time_limit_seconds
        .unwrap_or(DEFAULT_FEED_TASK_TIME_LIMIT_SECS);
    if time_limit_secs == 0 {
        return Err(LoadError::invalid(
            "feed.task_time_limit_seconds",
            "must be greater than zero",
        ));
    }

    Ok(FeedSettings {
        page_size,
        fanout_batch_size,
        task_time_limit: Duration::from_secs(time_limit_secs),
    })
}

fn build_jobs_settings(jobs: RawJobsSettings) -> Result<JobsSettings, LoadError> {
    Ok(JobsSettings {
        fanout_main_concurrency: non_zero_u32(
            jobs.fanout_main_concurrency
                .unwrap_or(DEFAULT_JOB_FANOUT_MAIN_CONCURRENCY),
            "jobs.fanout_main_concurrency",
        )?,
        fanout_batch_concurrency: non_zero_u32(
            jobs.fanout_batch_concurrency
                .unwrap_or(DEFAULT_JOB_FANOUT_BATCH_CONCURRENCY),
            "jobs.fanout_batch_concurrency",
        )?,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    http_max_connections: Option<u32>,
    jobs_max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRedisSettings {
    url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enable_list_cache: Option<bool>,
    list_limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFeedSettings {
    page_size: Option<usize>,
    fanout_batch_size: Option<usize>,
    task_time_limit_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawJobsSettings {
    fanout_main_concurrency: Option<u32>,
    fanout_batch_concurrency: Option<u32>,
}

fn non_zero_u32(value: u32, key: &'static str) -> Result<NonZeroU32, LoadError> {
    NonZeroU32::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_usize(value: usize, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
