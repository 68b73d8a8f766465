use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use panorama::app::auth::GithubClient;
use panorama::app::email::Mailer;
use panorama::app::notifications::NotificationService;
use panorama::config::AppConfig;
use panorama::infra::{
    cache::RedisCache, db::Db, queue::NotificationQueue, realtime::NotificationHub,
    storage::ObjectStorage,
};
use panorama::jobs::notifier::NotifierHandle;
use panorama::{http, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let db = Db::connect(&config).await?;
    let cache = RedisCache::connect(&config.redis_url).await?;
    let storage = ObjectStorage::new(&config).await?;
    let hub = NotificationHub::new(config.notification_queue_capacity);
    let (queue, receiver) = NotificationQueue::channel(config.notification_queue_capacity);

    let notifier = NotifierHandle::spawn(NotificationService::new(db.clone(), hub.clone()), receiver);

    let github = config
        .github
        .clone()
        .map(|github| GithubClient::new(reqwest::Client::new(), github));
    if github.is_none() {
        tracing::warn!("GITHUB_CLIENT_ID/GITHUB_CLIENT_SECRET not set, github login disabled");
    }

    let state = AppState {
        db,
        cache,
        storage,
        queue,
        hub,
        mailer: Mailer::new(config.mail.clone(), config.home_url.clone(), config.is_production()),
        github,
        upload_max_bytes: config.upload_max_bytes,
        paseto_access_key: config.paseto_access_key,
        access_ttl_minutes: config.access_ttl_minutes,
    };

    let app: Router = http::router(state).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!(env = %config.app_env, "listening on {}", config.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router (and with it every queue sender) is gone; let the worker drain.
    notifier.shutdown().await?;
    tracing::info!("notification worker drained");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
