use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the Murmur binary.
#[derive(Debug, Parser)]
#[command(name = "murmur", version, about = "Murmur feed fan-out engine")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MURMUR_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the fan-out workers.
    Worker(Box<WorkerArgs>),
    /// Publish an item: write the owner's feed entry and schedule fan-out.
    Fanout(FanoutArgs),
    /// Print one page of a user's feed as JSON.
    Feed(FeedArgs),
    /// Inspect or change feature gates.
    Gate(GateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct StoreOverrides {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the shared key-value store URL.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct WorkerArgs {
    #[command(flatten)]
    pub overrides: WorkerOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct WorkerOverrides {
    #[command(flatten)]
    pub stores: StoreOverrides,

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

    /// Override the jobs database pool size.
    #[arg(long = "database-jobs-max-connections", value_name = "COUNT")]
    pub database_jobs_max_connections: Option<u32>,

    /// Override the fanout-main worker concurrency.
    #[arg(long = "jobs-fanout-main-concurrency", value_name = "COUNT")]
    pub jobs_fanout_main_concurrency: Option<u32>,

    /// Override the fanout-batch worker concurrency.
    #[arg(long = "jobs-fanout-batch-concurrency", value_name = "COUNT")]
    pub jobs_fanout_batch_concurrency: Option<u32>,

    /// Override the number of followers handled by one batch job.
    #[arg(long = "feed-fanout-batch-size", value_name = "COUNT")]
    pub feed_fanout_batch_size: Option<usize>,

    /// Override the wall-clock limit of a single fan-out job.
    #[arg(long = "feed-task-time-limit-seconds", value_name = "SECONDS")]
    pub feed_task_time_limit_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct FanoutArgs {
    #[command(flatten)]
    pub stores: StoreOverrides,

    /// Item being published.
    #[arg(long = "item-id", value_name = "ID")]
    pub item_id: i64,

    /// Author of the item.
    #[arg(long = "owner-id", value_name = "ID")]
    pub owner_id: i64,
}

#[derive(Debug, Args, Clone)]
pub struct FeedArgs {
    #[command(flatten)]
    pub stores: StoreOverrides,

    /// Feed owner.
    #[arg(long = "user-id", value_name = "ID")]
    pub user_id: i64,

    /// Only entries newer than this cursor token.
    #[arg(long = "newer-than", value_name = "CURSOR", conflicts_with = "older_than")]
    pub newer_than: Option<String>,

    /// Only entries older than this cursor token.
    #[arg(long = "older-than", value_name = "CURSOR")]
    pub older_than: Option<String>,

    /// Override the page size.
    #[arg(long = "page-size", value_name = "COUNT")]
    pub page_size: Option<usize>,
}

#[derive(Debug, Args, Clone)]
pub struct GateArgs {
    /// Override the shared key-value store URL.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,

    #[command(subcommand)]
    pub command: GateCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum GateCommand {
    /// Show a gate's percent and description.
    Get {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Set one field of a gate (`percent` or `description`).
    Set {
        #[arg(value_name = "NAME")]
        name: String,
        #[arg(value_name = "KEY")]
        key: String,
        #[arg(value_name = "VALUE")]
        value: String,
    },
}
