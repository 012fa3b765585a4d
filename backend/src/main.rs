use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use points_chart_backend::{rest, storage::DbConnection, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let db_url = match std::env::var("DB_PATH") {
        Ok(path) => format!("sqlite:{}", path),
        Err(_) => "sqlite:data/points_chart.db".to_string(),
    };

    // File-backed databases need their directory to exist before connect
    if let Some(path) = db_url.strip_prefix("sqlite:") {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    info!("Setting up database at {}", db_url);
    let db = Arc::new(DbConnection::new(&db_url).await?);
    let state = AppState::new(db);
    let app = rest::router(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
