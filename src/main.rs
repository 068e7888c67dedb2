mod accountant;
mod blob;
mod config;
mod coordinator;
mod errors;
mod extractors;
mod instrumentation;
mod models;
mod password;
mod policy;
mod reaper;
mod routes;
mod store;
mod tests;
mod token;
mod utilities;

#[cfg(not(unix))]
use std::future;
use std::{sync::Arc, time::Duration};

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use tokio::{fs, net::TcpListener, signal};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
};

use crate::{
    accountant::DownloadAccountant,
    blob::{BlobStore, FsBlobStore},
    config::Config,
    coordinator::UploadCoordinator,
    errors::AppResult,
    reaper::ExpiryReaper,
    routes::{
        download::download_endpoint, list::list_endpoint, revoke::revoke_endpoint,
        upload::upload_endpoint,
    },
    store::{MemoryShareStore, PgShareStore, ShareStore},
};

#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn ShareStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub coordinator: Arc<UploadCoordinator>,
    pub accountant: Arc<DownloadAccountant>,
}

impl AppContext {
    pub fn new(cfg: &Config, store: Arc<dyn ShareStore>, blobs: Arc<dyn BlobStore>) -> Self {
        let coordinator = Arc::new(UploadCoordinator::new(
            store.clone(),
            cfg.general.base_url.clone(),
            cfg.general.max_file_bytes,
        ));
        let accountant = Arc::new(DownloadAccountant::new(store.clone()));

        Self {
            store,
            blobs,
            coordinator,
            accountant,
        }
    }
}

fn router(cfg: &Config, ctx: AppContext) -> Router {
    let cors_origin = HeaderValue::from_str(&cfg.general.cors_origin)
        .expect("cors_origin is not a valid header value");
    let cors_layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(cors_origin))
        .allow_credentials(true);

    let router = Router::new()
        .route("/upload", post(upload_endpoint))
        .route("/download/:token", get(download_endpoint))
        .route("/files", get(list_endpoint))
        .route("/revoke/:token", post(revoke_endpoint))
        .layer((
            DefaultBodyLimit::disable(),
            RequestBodyLimitLayer::new(cfg.general.max_file_bytes as usize + 1024),
            Extension(ctx),
            cors_layer,
        ));

    instrumentation::add_layer(router)
}

async fn build_store(cfg: &Config) -> AppResult<Arc<dyn ShareStore>> {
    match &cfg.database {
        Some(database) => {
            let pool = PgPoolOptions::new()
                .max_connections(database.max_connections)
                .connect(&database.url)
                .await?;
            let store = PgShareStore::new(pool);
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("no [database] configured, using the in-memory share store");
            Ok(Arc::new(MemoryShareStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| String::from("config.toml"));
    let cfg = config::load_config(&config_path).await?;

    instrumentation::setup(&cfg.instrumentation.directives)?;

    fs::create_dir_all(&cfg.general.storage_dir).await?;

    let store = build_store(&cfg).await?;
    let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(&cfg.general.storage_dir));
    let ctx = AppContext::new(&cfg, store.clone(), blobs.clone());

    let reaper = ExpiryReaper::new(store, blobs, Duration::from_secs(cfg.reaper.interval_secs));
    tokio::spawn(reaper.run());

    let listener = TcpListener::bind(&cfg.general.bind_address).await?;
    tracing::info!("api is available on http://{}", cfg.general.bind_address);

    axum::serve(listener, router(&cfg, ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
