use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reminder_service::api::router;
use reminder_service::config::AppConfig;
use reminder_service::db::{SqliteReminderStore, SqliteSubscriptionRegistry};
use reminder_service::push::{HttpPushTransport, NoopPushTransport, PushTransport};
use reminder_service::services::{NotificationDispatcher, ReminderScheduler, SchedulerConfig};
use reminder_service::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "reminder_service=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let transport: Arc<dyn PushTransport> = match &config.push_gateway {
        Some(gateway) => {
            info!("delivering push notifications through {}", gateway.url);
            Arc::new(HttpPushTransport::new(gateway.clone(), config.send_timeout)?)
        }
        None => {
            warn!("PUSH_GATEWAY_URL not set, reminders stay pending until a gateway is configured");
            Arc::new(NoopPushTransport)
        }
    };

    let reminders = Arc::new(SqliteReminderStore::new(pool.clone()));
    let subscriptions = Arc::new(SqliteSubscriptionRegistry::new(pool.clone()));

    let dispatcher = NotificationDispatcher::new(
        reminders.clone(),
        subscriptions.clone(),
        transport,
        config.send_timeout,
    )
    .with_assets(config.icon.clone(), config.badge.clone());

    let scheduler = Arc::new(ReminderScheduler::new(
        reminders,
        Arc::new(dispatcher),
        SchedulerConfig::from(&config),
    ));
    scheduler.start();

    let state = AppState {
        db: pool.clone(),
        subscriptions,
        scheduler: scheduler.clone(),
    };

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    pool.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
