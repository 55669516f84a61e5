use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use waypool_api::{app, worker, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waypool=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = waypool_store::Config::load().expect("Failed to load config");
    tracing::info!("Starting Waypool API on port {}", config.server.port);

    let db = waypool_store::DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let store = Arc::new(waypool_store::PgEntityStore::new(db.pool.clone()));
    let app_state = AppState::new(store, config.reconciler.default_window_min);

    // Time-based trip transitions run on their own task so a slow sweep
    // never sits in front of a request.
    let sweeper = worker::spawn_reconciler(
        app_state.reconciler.clone(),
        config.reconciler.interval_seconds,
    );

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");
    axum::serve(listener, app).await.expect("Server error");

    sweeper.abort();
}
