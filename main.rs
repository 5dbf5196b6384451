//! x402 Gate Demo Server
//!
//! Serves a free `/health` route and a paid `/weather` route. Configuration comes
//! from `X402_*` environment variables, see [`GateConfig::from_env`].

use axum::{response::Json, routing::get, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use x402_gate::middleware::{payment_gate, PaymentGate};
use x402_gate::GateConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = GateConfig::from_env()?;
    let gate = PaymentGate::from_config(&config)?;

    let paid = Router::new()
        .route("/weather", get(weather))
        .layer(axum::middleware::from_fn_with_state(gate, payment_gate));

    let app = Router::new()
        .route("/health", get(health))
        .merge(paid)
        .layer(TraceLayer::new_for_http());

    tracing::info!("🚀 x402 gate listening on http://{}", config.bind_address);
    tracing::info!(
        "💰 /weather costs {} atomic units on {}",
        config.payment.price.to_atomic()?,
        config.payment.network
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": x402_gate::VERSION,
    }))
}

async fn weather() -> Json<serde_json::Value> {
    Json(json!({
        "report": {
            "weather": "sunny",
            "temperature": 70,
        }
    }))
}
