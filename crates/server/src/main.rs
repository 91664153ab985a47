//! Janta Garage server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use janta_api::AppState;
use janta_common::Config;
use janta_core::{
    AssignmentService, EventPublisherService, MailerService, NoOpMailer, NotificationService,
    OverdueService, ReportService, ResolutionService, SmtpMailer, UserChannelHub,
};
use janta_db::repositories::{NotificationRepository, ReportRepository, UserRepository};
use janta_db::{NotificationStoreRef, ReportStoreRef, UserStoreRef};
use janta_queue::{RedisPubSub, SchedulerConfig, run_scheduler};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
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

/// Install the global subscriber. `JANTA_LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "janta=debug,tower_http=debug".into());

    let json = std::env::var("JANTA_LOG_FORMAT").is_ok_and(|f| f == "json");
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Janta Garage server...");

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Connect to database
    let db = janta_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    janta_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let db = Arc::new(db);
    let reports: ReportStoreRef = Arc::new(ReportRepository::new(Arc::clone(&db)));
    let users: UserStoreRef = Arc::new(UserRepository::new(Arc::clone(&db)));
    let notifications: NotificationStoreRef =
        Arc::new(NotificationRepository::new(Arc::clone(&db)));

    // Live events: through Redis when configured, otherwise in-process
    let hub = Arc::new(UserChannelHub::new());
    let mut pubsub = None;
    let event_publisher: EventPublisherService = match &config.redis {
        Some(redis) => {
            let ps = RedisPubSub::new(&redis.url, &redis.prefix, hub.clone())
                .await
                .context("failed to connect to Redis")?;
            ps.start().await.context("failed to subscribe to Redis")?;
            pubsub = Some(ps.clone());
            Arc::new(ps)
        }
        None => {
            info!("Redis not configured, live events stay in this process");
            hub.clone()
        }
    };

    let mailer: MailerService = match &config.mail {
        Some(mail) => Arc::new(SmtpMailer::new(mail)?),
        None => {
            warn!("Mail not configured, outgoing mail will only be logged");
            Arc::new(NoOpMailer)
        }
    };

    // Initialize services
    let mut notification_service = NotificationService::new(notifications);
    notification_service.set_event_publisher(event_publisher);

    let mut report_service = ReportService::new(reports.clone(), users.clone());
    report_service.set_mailer(mailer.clone());

    let mut resolution_service =
        ResolutionService::new(reports.clone(), users.clone(), notification_service.clone());
    resolution_service.set_mailer(mailer.clone());

    let mut assignment_service =
        AssignmentService::new(reports.clone(), users.clone(), notification_service.clone());
    assignment_service.set_mailer(mailer.clone());

    let mut overdue_service =
        OverdueService::new(reports, users.clone(), notification_service.clone());
    overdue_service.set_mailer(mailer);

    // Overdue sweep
    let scheduler_config = SchedulerConfig::from(&config.sweep);
    let sweep_handle = run_scheduler(&scheduler_config, Arc::new(overdue_service));

    let state = AppState {
        users,
        report_service,
        resolution_service,
        assignment_service,
        notification_service,
        hub,
    };

    let app = janta_api::app(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(Duration::from_secs(30)))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
    );

    // Start server with graceful shutdown
    let ip = config
        .server
        .host
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("invalid server.host {}", config.server.host))?;
    let addr = SocketAddr::new(ip, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweep_handle {
        handle.abort();
    }
    if let Some(pubsub) = pubsub {
        if let Err(e) = pubsub.shutdown().await {
            warn!(error = %e, "Failed to close Redis Pub/Sub");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
