use std::{process, sync::Arc};

use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_sql::{Config as ApalisSqlConfig, postgres::PostgresStorage};
use murmur::{
    application::{
        error::AppError,
        fanout::FanoutDispatcher,
        feed::FeedService,
        friendships::{FollowerResolver, FriendshipService},
        gatekeeper::GateKeeper,
        jobs::{FanoutWorkerContext, process_fanout_batch_job, process_fanout_main_job},
        pagination::CursorParams,
        repos::{FeedEntriesRepo, FollowGraph, JobsRepo},
    },
    cache::{CacheConfig, KeyValueStore, ListCache, MemoryStore},
    config,
    domain::types::JobType,
    infra::{
        db::{PostgresEdgeStore, PostgresRepositories},
        error::InfraError,
        redis::RedisStore,
        telemetry,
    },
};
use serde_json::json;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

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
        error!(error = %error, chain = ?report.messages, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?report.messages, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Worker(Box::<config::WorkerArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Worker(_) => run_worker(settings).await,
        config::Command::Fanout(args) => run_fanout(settings, args).await,
        config::Command::Feed(args) => run_feed(settings, args).await,
        config::Command::Gate(args) => run_gate(settings, args).await,
    }
}

async fn run_worker(settings: config::Settings) -> Result<(), AppError> {
    let (repositories, job_repositories) = init_repositories(&settings).await?;
    let store = open_store(&settings).await?;

    let entries: Arc<dyn FeedEntriesRepo> = repositories.clone();
    let jobs: Arc<dyn JobsRepo> = repositories.clone();
    let feed = build_feed_service(&settings, entries.clone(), store.clone());
    let followers: Arc<dyn FollowerResolver> =
        Arc::new(build_friendship_service(&repositories, store));

    let context = FanoutWorkerContext {
        entries,
        followers,
        feed,
        jobs,
        batch_size: settings.feed.fanout_batch_size,
        time_limit: settings.feed.task_time_limit,
    };

    let main_storage = PostgresStorage::new_with_config(
        job_repositories.pool().clone(),
        ApalisSqlConfig::new(JobType::FanoutMain.as_str()),
    );
    let batch_storage = PostgresStorage::new_with_config(
        job_repositories.pool().clone(),
        ApalisSqlConfig::new(JobType::FanoutBatch.as_str()),
    );

    let main_concurrency = settings.jobs.fanout_main_concurrency.get() as usize;
    let batch_concurrency = settings.jobs.fanout_batch_concurrency.get() as usize;

    let main_worker = WorkerBuilder::new("fanout-main-worker")
        .concurrency(main_concurrency)
        .data(context.clone())
        .backend(main_storage)
        .build_fn(process_fanout_main_job);
    let batch_worker = WorkerBuilder::new("fanout-batch-worker")
        .concurrency(batch_concurrency)
        .data(context)
        .backend(batch_storage)
        .build_fn(process_fanout_batch_job);

    info!(
        target = "murmur::worker",
        main_concurrency,
        batch_concurrency,
        batch_size = settings.feed.fanout_batch_size.get(),
        time_limit_seconds = settings.feed.task_time_limit.as_secs(),
        "Starting fan-out workers"
    );

    Monitor::new()
        .register(main_worker)
        .register(batch_worker)
        .run_with_signal(tokio::signal::ctrl_c())
        .await
        .map_err(|err| AppError::unexpected(format!("job monitor stopped: {err}")))?;

    info!(target = "murmur::worker", "Fan-out workers stopped");
    Ok(())
}

async fn run_fanout(settings: config::Settings, args: config::FanoutArgs) -> Result<(), AppError> {
    let (repositories, _) = init_repositories(&settings).await?;
    let store = open_store(&settings).await?;

    let entries: Arc<dyn FeedEntriesRepo> = repositories.clone();
    let jobs: Arc<dyn JobsRepo> = repositories;
    let feed = build_feed_service(&settings, entries.clone(), store);
    let dispatcher = FanoutDispatcher::new(entries, feed, jobs);

    let receipt = dispatcher
        .dispatch_fanout(args.item_id, args.owner_id)
        .await?;

    print_json(&json!({
        "entry": receipt.entry,
        "job_id": receipt.job_id,
    }))
}

async fn run_feed(settings: config::Settings, args: config::FeedArgs) -> Result<(), AppError> {
    let params = CursorParams::from_tokens(args.newer_than.as_deref(), args.older_than.as_deref())
        .map_err(|err| AppError::validation(err.to_string()))?;

    let (repositories, _) = init_repositories(&settings).await?;
    let store = open_store(&settings).await?;

    let entries: Arc<dyn FeedEntriesRepo> = repositories;
    let feed = build_feed_service(&settings, entries, store);
    let page = feed.list_feed(args.user_id, params).await?;
    let next_cursor = page.next_cursor().map(|cursor| cursor.encode());

    print_json(&json!({
        "has_next_page": page.has_next_page,
        "results": page.results,
        "next_cursor": next_cursor,
    }))
}

async fn run_gate(settings: config::Settings, args: config::GateArgs) -> Result<(), AppError> {
    let store = open_store(&settings).await?;
    let gate = GateKeeper::new(store);

    match args.command {
        config::GateCommand::Get { name } => {
            let state = gate.get(&name).await?;
            print_json(&json!({
                "name": name,
                "percent": state.percent,
                "description": state.description,
            }))
        }
        config::GateCommand::Set { name, key, value } => {
            if key == "percent" {
                let percent = value.trim().parse::<u8>().map_err(|_| {
                    AppError::validation(format!("gate percent must be 0-100, got `{value}`"))
                })?;
                gate.set_percent(&name, percent).await?;
            } else {
                gate.set(&name, &key, &value).await?;
            }
            info!(
                target = "murmur::gate",
                gate = %name,
                field = %key,
                "Gate updated"
            );
            Ok(())
        }
    }
}

fn build_feed_service(
    settings: &config::Settings,
    entries: Arc<dyn FeedEntriesRepo>,
    store: Arc<dyn KeyValueStore>,
) -> Arc<FeedService> {
    let cache = ListCache::new(store, CacheConfig::from(&settings.cache));
    Arc::new(FeedService::new(
        entries,
        cache,
        settings.feed.page_size.get(),
    ))
}

fn build_friendship_service(
    repositories: &Arc<PostgresRepositories>,
    store: Arc<dyn KeyValueStore>,
) -> FriendshipService {
    let relational: Arc<dyn FollowGraph> = repositories.clone();
    let edge_store: Arc<dyn FollowGraph> =
        Arc::new(PostgresEdgeStore::new(repositories.as_ref().clone()));
    FriendshipService::new(GateKeeper::new(store.clone()), store, relational, edge_store)
}

async fn open_store(settings: &config::Settings) -> Result<Arc<dyn KeyValueStore>, AppError> {
    let Some(url) = settings.redis.url.as_deref() else {
        warn!(
            target = "murmur::store",
            "No redis url configured, using a process-local store"
        );
        return Ok(Arc::new(MemoryStore::new()));
    };
    Ok(Arc::new(RedisStore::connect(url).await?))
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<(Arc<PostgresRepositories>, Arc<PostgresRepositories>), AppError> {
    let database_url = settings
        .database
        .url
        .as_deref()
        .ok_or(InfraError::missing("database.url"))?;

    let repositories =
        PostgresRepositories::connect(database_url, settings.database.http_max_connections)
            .await?;
    repositories.migrate().await?;

    let job_repositories =
        PostgresRepositories::connect(database_url, settings.database.jobs_max_connections)
            .await?;

    Ok((Arc::new(repositories), Arc::new(job_repositories)))
}

fn print_json(value: &serde_json::Value) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
