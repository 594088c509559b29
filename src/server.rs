//! HTTP surface: the metrics endpoint, a liveness probe and a landing page
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::encoder;
use crate::error::Result;
use crate::scrape::Scraper;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub scraper: Arc<Scraper>,
    pub metrics_path: Arc<str>,
}

/// Build the router serving `metrics_path`, `/live` and `/`
pub fn create_router(scraper: Arc<Scraper>, metrics_path: &str) -> Router {
    let state = AppState {
        scraper,
        metrics_path: Arc::from(metrics_path),
    };

    Router::new()
        .route(metrics_path, get(metrics))
        .route("/live", get(live))
        .route("/", get(index))
        .with_state(state)
}

/// Scrape every device and render the result
async fn metrics(State(state): State<AppState>) -> Response {
    match encoder::gather(&state.scraper).await {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response()
        }
    }
}

async fn live() -> &'static str {
    "ok"
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n\
         <head><title>Mikrotik Exporter</title></head>\n\
         <body>\n\
         <h1>Mikrotik Exporter</h1>\n\
         <p><a href=\"{}\">Metrics</a></p>\n\
         </body>\n\
         </html>\n",
        state.metrics_path
    ))
}

/// Listen on all interfaces at `port` until Ctrl+C
pub async fn serve(router: Router, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
