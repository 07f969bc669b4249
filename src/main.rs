use std::{process, sync::Arc};

use edge_images::{
    application::{
        error::AppError,
        images::ImageService,
        repos::ImageRepository,
        updates::{PoolConfig, UpdatePool, UpdateQueue},
    },
    config,
    domain::image::BuildStatusCheck,
    infra::{
        build_status::ImmediateBuildStatus,
        cache::{CacheImageRepository, KeyValueStore, MemoryKvStore},
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        read_through::ReadThroughImageRepository,
        telemetry,
    },
};
use tokio_util::sync::CancellationToken;
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
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings.database).await?;

    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKvStore::new());
    let cache: Arc<dyn ImageRepository> =
        Arc::new(CacheImageRepository::with_ttl(kv, settings.cache.ttl));
    let store: Arc<dyn ImageRepository> = repositories.clone();
    let repo: Arc<dyn ImageRepository> = Arc::new(ReadThroughImageRepository::new(cache, store));
    let builds: Arc<dyn BuildStatusCheck> = Arc::new(ImmediateBuildStatus);

    let queue = UpdateQueue::new();
    let images = Arc::new(ImageService::new(repo, builds, queue.clone()));

    let pool = UpdatePool::new(
        queue.clone(),
        PoolConfig {
            max_workers: settings.updates.max_workers,
            poll_interval: settings.updates.poll_interval,
        },
    );
    let shutdown = CancellationToken::new();
    let pool_handle = tokio::spawn(pool.run(shutdown.clone()));

    let state = HttpState {
        images,
        auth: settings.auth.clone(),
        db: Some(repositories),
    };
    let result = serve_http(&settings, state, shutdown.clone()).await;

    shutdown.cancel();
    queue.close().await;
    match tokio::time::timeout(settings.server.graceful_shutdown, pool_handle).await {
        Ok(Ok(())) => info!("update pool stopped"),
        Ok(Err(err)) => warn!(error = %err, "update pool task failed"),
        Err(_) => warn!(
            timeout_secs = settings.server.graceful_shutdown.as_secs(),
            "update pool did not stop before the shutdown timeout"
        ),
    }

    result
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let database_url = database_url(&settings.database)?;
    let pool = PostgresRepositories::connect(database_url, 1)
        .await
        .map_err(InfraError::from)?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::migration(err.to_string()))?;
    info!("migrations applied");
    Ok(())
}

fn database_url(database: &config::DatabaseSettings) -> Result<&str, AppError> {
    database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)
}

async fn init_repositories(
    database: &config::DatabaseSettings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = database_url(database)?;

    let pool = PostgresRepositories::connect(database_url, database.max_connections.get())
        .await
        .map_err(InfraError::from)?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::migration(err.to_string()))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn serve_http(
    settings: &config::Settings,
    state: HttpState,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(addr = %settings.server.addr, "listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                warn!(error = %err, "failed to listen for ctrl-c");
            }
            info!("shutdown requested");
        }
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
