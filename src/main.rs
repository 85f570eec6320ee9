use anyhow::Context;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use physiocare::api::razorpay::RazorpayGateway;
use physiocare::api::sms::TextlocalGateway;
use physiocare::config::AppConfig;
use physiocare::db::{build_pool, run_migrations};
use physiocare::repositories::booking_repository::SqliteRecordStore;
use physiocare::tasks::maintenance::spawn_maintenance_task;
use physiocare::{build_router, AppState};

const POOL_SIZE: u32 = 8;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = AppConfig::from_env()?;

    let _guard = config.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((dsn, sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(config.environment.clone().into()),
            ..Default::default()
        }))
    });

    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,physiocare=debug"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let pool = build_pool(&config.database_url, POOL_SIZE).context("Failed to create pool")?;
    run_migrations(&pool)?;

    let store = Arc::new(SqliteRecordStore::new(pool));
    let payments = Arc::new(RazorpayGateway::new(config.razorpay()));
    let sms = Arc::new(TextlocalGateway::new(config.textlocal()));
    let bind_addr = config.bind_addr.clone();
    let is_prod = config.is_prod();

    let state = Arc::new(AppState::new(config, store, payments, sms)?);
    spawn_maintenance_task(state.clone());
    let app = build_router(state)?;

    tracing::info!("Starting server on {} (production: {})", bind_addr, is_prod);
    let listener = TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
