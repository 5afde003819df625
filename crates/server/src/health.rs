use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use loa_discord::gateway::GatewayStatus;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    gateway: Arc<GatewayStatus>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub gateway: HealthCheck,
    pub checked_at: String,
}

pub fn router(gateway: Arc<GatewayStatus>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { gateway })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    gateway: Arc<GatewayStatus>,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(gateway)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let gateway = gateway_check(&state.gateway);
    let ready = gateway.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck { status: "ready", detail: "loa-bot runtime initialized".to_string() },
        gateway,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn gateway_check(status: &GatewayStatus) -> HealthCheck {
    if status.is_connected() {
        HealthCheck { status: "ready", detail: "gateway session is live".to_string() }
    } else {
        HealthCheck { status: "degraded", detail: "gateway session is not connected".to_string() }
    }
}
