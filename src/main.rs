use std::{process, sync::Arc};

use gazzetta::{
    application::{
        articles::ArticleService,
        error::AppError,
        images::{ImageOptimizer, ImageService, StorageBackedOptimizer},
        repos::ArticlesRepo,
    },
    cache::{
        CacheBackendKind, CacheConfig, ListingCache, ListingInvalidator, ListingStore,
        PlainMemoryStore, TaggedMemoryStore,
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState},
        storage::UploadStorage,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
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
        .unwrap_or(config::Command::Serve(config::ServeArgs::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let repositories = Arc::new(PostgresRepositories::new(pool));

    let storage = Arc::new(
        UploadStorage::new(
            settings.uploads.directory.clone(),
            settings.uploads.public_base_url.clone(),
        )
        .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );

    // Backend capability is fixed at startup from configuration; the gateway
    // and invalidator probe the store they are handed.
    let cache_config = CacheConfig::from(&settings.cache);
    let store: Arc<dyn ListingStore> = match cache_config.backend {
        CacheBackendKind::Tagged => Arc::new(TaggedMemoryStore::new(&cache_config)),
        CacheBackendKind::Plain => Arc::new(PlainMemoryStore::new(&cache_config)),
    };
    let cache = ListingCache::new(store.clone(), cache_config.ttl());
    let invalidator = ListingInvalidator::new(store);

    let optimizer: Arc<dyn ImageOptimizer> = Arc::new(StorageBackedOptimizer::new(storage.clone()));
    let articles_repo: Arc<dyn ArticlesRepo> = repositories.clone();
    let articles = Arc::new(ArticleService::new(
        articles_repo,
        storage.clone(),
        optimizer,
        cache,
        invalidator,
    ));
    let images = Arc::new(ImageService::new(storage));

    let state = ApiState {
        articles,
        images,
        max_image_bytes: settings.uploads.max_image_bytes.get() as usize,
    };
    let router = http::build_router(state, settings.uploads.max_request_bytes.get() as usize);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(addr = %settings.server.addr, "gazzetta listening");

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
