//! jottery-server binary entry point.

use std::net::SocketAddr;

use tracing::info;
use tracing_subscriber::EnvFilter;

use jottery_server::{app, db, AppState, Config};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = Config::from_env();
    info!(
        subsystem = "server",
        op = "startup",
        database_url = %config.database_url,
        port = config.port,
        "Starting Jottery sync server"
    );

    let pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to initialize database");

    let state = AppState { pool };
    let router = app(state, &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listen address");
    info!(subsystem = "server", op = "listen", %addr, "Listening");

    axum::serve(listener, router).await.expect("Server failed");
}
