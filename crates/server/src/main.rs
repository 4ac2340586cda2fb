//! Delayed notifier server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use apalis::prelude::*;
use notifier_api::AppState;
use notifier_common::Config;
use notifier_core::{
    EmailSender, MultiSender, NotifyService, QueueHandle, RetryPolicy, SenderHandle, StatusCache,
    TelegramSender,
};
use notifier_db::entities::notification::NotifyChannel;
use notifier_queue::{
    channel_namespace, run_scheduler, send_worker, RedisQueuePublisher, SchedulerConfig,
    SendContext, SendJob,
};
use fred::prelude::*;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
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
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notifier=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting delayed notifier...");

    // Load configuration (validated; startup fails fast on bad bounds)
    let config = Config::load()?;

    // Connect to database and run migrations
    let db = notifier_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    notifier_db::migrate(&db).await?;
    info!("Migrations completed");
    let db = Arc::new(db);

    // Connect fred client for the status cache
    let fred_config = fred::types::config::Config::from_url(&config.redis.url)?;
    let fred_client = fred::clients::Client::new(fred_config, None, None, None);
    fred_client.connect();
    fred_client.wait_for_connect().await?;
    let status_cache = StatusCache::new(Arc::new(fred_client));
    info!("Connected to Redis status cache");

    // Connect the job queue (ConnectionManager reconnects automatically)
    let redis_client = redis::Client::open(config.redis.url.as_str())?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client).await?;
    let telegram_storage = apalis_redis::RedisStorage::<SendJob>::new_with_config(
        redis_conn.clone(),
        apalis_redis::Config::default()
            .set_namespace(&channel_namespace(NotifyChannel::Telegram)),
    );
    let email_storage = apalis_redis::RedisStorage::<SendJob>::new_with_config(
        redis_conn,
        apalis_redis::Config::default().set_namespace(&channel_namespace(NotifyChannel::Email)),
    );
    info!("Connected to Redis job queue");

    // Channel senders
    let telegram_sender = config
        .telegram
        .as_ref()
        .map(|c| TelegramSender::new(c.bot_token.clone()));
    let email_sender = match &config.email {
        Some(c) => Some(EmailSender::new(c)?),
        None => None,
    };
    let multi_sender = MultiSender::new(telegram_sender, email_sender);
    if !multi_sender.has_any_channel() {
        warn!("no channel senders configured; deliveries will fail until one is set up");
    }
    let sender: SenderHandle = Arc::new(multi_sender);

    // Publisher + notification service
    let publisher: QueueHandle = Arc::new(RedisQueuePublisher::new(
        telegram_storage.clone(),
        email_storage.clone(),
    ));
    let retry_policy = RetryPolicy {
        max_retries: config.retry.max_retries,
        base_delay: Duration::from_secs(config.retry.base_delay_secs),
        max_delay: Duration::from_secs(config.retry.max_delay_secs),
    };
    let notify_service = NotifyService::new(Arc::clone(&db), publisher)
        .with_cache(status_cache)
        .with_sender(sender)
        .with_retry_policy(retry_policy);

    let shutdown = CancellationToken::new();
    let background_service = Arc::new(notify_service.clone());

    // Start the claim-and-publish scheduler
    let scheduler_config = SchedulerConfig {
        tick_interval: Duration::from_secs(config.scheduler.tick_interval_secs),
        batch_limit: config.scheduler.query_limit,
        retention_days: config.cleanup.retention_days,
        ..SchedulerConfig::default()
    };
    let scheduler_handle = tokio::spawn(run_scheduler(
        scheduler_config,
        Arc::clone(&background_service),
        shutdown.clone(),
    ));
    info!("Scheduler started");

    // Start the delivery workers
    let send_ctx = SendContext::new(background_service);
    let monitor_shutdown = shutdown.clone();
    let worker_handle = tokio::spawn(async move {
        let monitor = Monitor::new()
            .register(
                WorkerBuilder::new("send-telegram")
                    .data(send_ctx.clone())
                    .backend(telegram_storage)
                    .build_fn(send_worker),
            )
            .register(
                WorkerBuilder::new("send-email")
                    .data(send_ctx)
                    .backend(email_storage)
                    .build_fn(send_worker),
            );

        let signal = async move {
            monitor_shutdown.cancelled().await;
            Ok::<(), std::io::Error>(())
        };
        if let Err(e) = monitor.run_with_signal(signal).await {
            error!(error = %e, "Delivery worker monitor failed");
        }
    });
    info!("Delivery workers started");

    // Build router
    let state = AppState { notify_service };
    let app = notifier_api::router()
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let serve_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            serve_shutdown.cancel();
        })
        .await?;

    // Stop background tasks, newest dependency first
    shutdown.cancel();
    if let Err(e) = scheduler_handle.await {
        error!(error = %e, "scheduler task panicked");
    }
    if let Err(e) = worker_handle.await {
        error!(error = %e, "worker task panicked");
    }

    info!("Server shutdown complete");
    Ok(())
}
