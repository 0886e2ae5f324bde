use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::api::handler::{
    get_seller_balance, health_check, payment_webhook, run_reconciliation, run_settlement,
    AppState,
};

pub async fn create_app(state: AppState) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    let app = Router::new()
        // Public health check endpoint
        .route("/health", get(health_check))
        .nest(
            "/api/v1",
            Router::new()
                // Gateway webhook endpoint
                .route("/webhook/payment", post(payment_webhook))
                // Seller balance lookup
                .route("/sellers/:seller_id/balance", get(get_seller_balance))
                // Admin pass triggers (cron-equivalent entry points)
                .route("/admin/settlement/run", post(run_settlement))
                .route("/admin/reconciliation/run", post(run_reconciliation)),
        )
        // Request tracing outermost, then a request timeout
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(60))),
        )
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(app: Router, bind_address: &str) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
