/*
 * Responsibility
 * - プロセス初期化: tracing, panic hook
 * - Config -> 依存 (Postgres, Valkey, profile service) -> AppState
 * - Router 組み立て (pipeline, CORS, HTTP layer) と axum::serve()
 */
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::middleware;
use crate::repos::{PgMessageRepo, PgRoomRepo};
use crate::services::cache::ValkeyClient;
use crate::services::profiles::HttpProfileDirectory;
use crate::state::{AppState, Collaborators};

pub fn init_tracing() {
    // RUST_LOG wins when set, e.g. RUST_LOG=info,chat_api=debug,tower_http=debug
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // Development fails fast; production keeps serving other requests.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn connect_db(config: &Config) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(config.store_timeout)
        .connect(&config.database_url)
        .await
        .context("connect to postgres")
}

async fn build_state(config: &Config) -> Result<AppState> {
    let pool = connect_db(config).await?;
    let cache = ValkeyClient::new(&config.redis_url)
        .await
        .context("connect to valkey")?;
    let directory = HttpProfileDirectory::new(&config.profile_api_base_url, config.store_timeout)
        .context("build profile service client")?;

    Ok(AppState::new(
        Collaborators {
            rooms: Arc::new(PgRoomRepo::new(pool.clone())),
            messages: Arc::new(PgMessageRepo::new(pool)),
            cache: Arc::new(cache),
            directory: Arc::new(directory),
        },
        config,
    ))
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let v1 = middleware::pipeline::apply(api::v1::routes(), state.clone());

    let router = Router::new().nest("/api/v1", v1).with_state(state);
    let router = middleware::cors::apply(router, config);
    middleware::http::apply(router, config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

pub async fn run(config: Config) -> Result<()> {
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting chat API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("bind {}", config.addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
