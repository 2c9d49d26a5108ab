//! HTTP surface: the dispense endpoints the chat collaborator calls, plus
//! health and metrics.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use eyre::eyre;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::commands;
use crate::dispatcher::{DispenseOutcome, DispenseRequest, FaucetDispatcher};

/// Prometheus metrics
pub struct Metrics {
    pub dispensed_total: IntCounter,
    pub rate_limited_total: IntCounter,
    pub invalid_requests_total: IntCounter,
    pub submission_failures_total: IntCounter,
    pub active_cooldowns: IntGauge,
    pub registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let dispensed_total = IntCounter::new(
            "faucet_dispensed_total",
            "Total number of successful dispenses",
        )
        .expect("constant metric name is valid");

        let rate_limited_total = IntCounter::new(
            "faucet_rate_limited_total",
            "Total number of requests refused by the cooldown",
        )
        .expect("constant metric name is valid");

        let invalid_requests_total = IntCounter::new(
            "faucet_invalid_requests_total",
            "Total number of requests with a missing or invalid address",
        )
        .expect("constant metric name is valid");

        let submission_failures_total = IntCounter::new(
            "faucet_submission_failures_total",
            "Total number of transfer submissions that failed",
        )
        .expect("constant metric name is valid");

        let active_cooldowns = IntGauge::new(
            "faucet_active_cooldowns",
            "Requesters currently inside their cooldown window",
        )
        .expect("constant metric name is valid");

        // expect is safe here because names are unique constants and
        // registration runs exactly once at startup
        registry
            .register(Box::new(dispensed_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(rate_limited_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(invalid_requests_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(submission_failures_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(active_cooldowns.clone()))
            .expect("metric registration must not be called twice");

        Self {
            dispensed_total,
            rate_limited_total,
            invalid_requests_total,
            submission_failures_total,
            active_cooldowns,
            registry,
        }
    }

    /// Count one terminal outcome
    pub fn record(&self, outcome: &DispenseOutcome) {
        match outcome {
            DispenseOutcome::Sent { .. } => self.dispensed_total.inc(),
            DispenseOutcome::RateLimited { .. } => self.rate_limited_total.inc(),
            DispenseOutcome::InvalidAddress | DispenseOutcome::MissingArgument => {
                self.invalid_requests_total.inc()
            }
            DispenseOutcome::SubmissionFailed { .. } => self.submission_failures_total.inc(),
        }
    }
}

/// Static service identity shown on /health
pub struct StatusInfo {
    pub chain_id: String,
    pub faucet_address: String,
    pub symbol: String,
    pub command_prefix: String,
    pub started_at: Instant,
}

/// Combined app state
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<FaucetDispatcher>,
    pub metrics: Arc<Metrics>,
    pub status: Arc<StatusInfo>,
}

/// A pre-parsed dispense request: the collaborator already stripped the
/// command trigger and split the arguments.
#[derive(Debug, Deserialize)]
pub struct DispenseApiRequest {
    pub requester_id: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DispenseApiResponse {
    pub status: &'static str,
    pub reply: String,
}

/// A raw chat line; the command trigger is applied server-side.
#[derive(Debug, Deserialize)]
pub struct MessageApiRequest {
    pub author_id: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct MessageApiResponse {
    /// None when the line was not a faucet command
    pub reply: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    chain_id: String,
    faucet_address: String,
    symbol: String,
    uptime_seconds: u64,
    dispensed_total: u64,
    rate_limited_total: u64,
    submission_failures_total: u64,
    active_cooldowns: usize,
}

fn outcome_label(outcome: &DispenseOutcome) -> &'static str {
    match outcome {
        DispenseOutcome::Sent { .. } => "sent",
        DispenseOutcome::RateLimited { .. } => "rate_limited",
        DispenseOutcome::InvalidAddress => "invalid_address",
        DispenseOutcome::MissingArgument => "missing_argument",
        DispenseOutcome::SubmissionFailed { .. } => "submission_failed",
    }
}

async fn handle_outcome(state: &AppState, request: DispenseRequest) -> (String, &'static str) {
    let outcome = state.dispatcher.dispatch(&request).await;
    state.metrics.record(&outcome);
    state
        .metrics
        .active_cooldowns
        .set(state.dispatcher.active_cooldowns() as i64);
    (state.dispatcher.reply(&outcome), outcome_label(&outcome))
}

/// Dispense endpoint for collaborators that parse commands themselves
async fn dispense(
    State(state): State<AppState>,
    Json(request): Json<DispenseApiRequest>,
) -> Json<DispenseApiResponse> {
    let (reply, status) = handle_outcome(
        &state,
        DispenseRequest { requester_id: request.requester_id, args: request.args },
    )
    .await;
    Json(DispenseApiResponse { status, reply })
}

/// Raw chat-line endpoint; applies the command trigger first
async fn message(
    State(state): State<AppState>,
    Json(request): Json<MessageApiRequest>,
) -> Json<MessageApiResponse> {
    let Some(args) = commands::parse_faucet_command(&request.content, &state.status.command_prefix)
    else {
        return Json(MessageApiResponse { reply: None });
    };
    let (reply, _) = handle_outcome(
        &state,
        DispenseRequest { requester_id: request.author_id, args },
    )
    .await;
    Json(MessageApiResponse { reply: Some(reply) })
}

/// Health check endpoint handler
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        chain_id: state.status.chain_id.clone(),
        faucet_address: state.status.faucet_address.clone(),
        symbol: state.status.symbol.clone(),
        uptime_seconds: state.status.started_at.elapsed().as_secs(),
        dispensed_total: state.metrics.dispensed_total.get(),
        rate_limited_total: state.metrics.rate_limited_total.get(),
        submission_failures_total: state.metrics.submission_failures_total.get(),
        active_cooldowns: state.dispatcher.active_cooldowns(),
    })
}

/// Liveness probe (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Prometheus metrics endpoint
async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    state
        .metrics
        .active_cooldowns
        .set(state.dispatcher.active_cooldowns() as i64);

    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry.gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response();
    }

    match Response::builder()
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(axum::body::Body::from(buffer))
    {
        Ok(resp) => resp,
        Err(_) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to build metrics response",
        )
            .into_response(),
    }
}

/// Start the HTTP server
pub async fn start_server(
    bind_address: &str,
    port: u16,
    dispatcher: Arc<FaucetDispatcher>,
    metrics: Arc<Metrics>,
    status: Arc<StatusInfo>,
) -> eyre::Result<()> {
    let state = AppState { dispatcher, metrics, status };

    let app = Router::new()
        .route("/api/v1/dispense", post(dispense))
        .route("/api/v1/message", post(message))
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .map_err(|e| eyre!("Invalid bind address {}:{}: {}", bind_address, port, e))?;
    info!("Faucet server listening on {}", addr);
    info!("  /api/v1/dispense - Pre-parsed dispense requests (POST)");
    info!("  /api/v1/message  - Raw chat lines (POST)");
    info!("  /health          - Full health status (JSON)");
    info!("  /metrics         - Prometheus metrics");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_record_by_outcome() {
        let metrics = Metrics::new();

        metrics.record(&DispenseOutcome::Sent {
            tx_hash: "A".into(),
            amount: "10".into(),
            symbol: "LUNC".into(),
            recipient: "terra1abc".into(),
        });
        metrics.record(&DispenseOutcome::MissingArgument);
        metrics.record(&DispenseOutcome::InvalidAddress);
        metrics.record(&DispenseOutcome::RateLimited {
            remaining: std::time::Duration::from_secs(60),
        });
        metrics.record(&DispenseOutcome::SubmissionFailed { reason: "nope".into() });

        assert_eq!(metrics.dispensed_total.get(), 1);
        assert_eq!(metrics.invalid_requests_total.get(), 2);
        assert_eq!(metrics.rate_limited_total.get(), 1);
        assert_eq!(metrics.submission_failures_total.get(), 1);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome_label(&DispenseOutcome::MissingArgument), "missing_argument");
        assert_eq!(outcome_label(&DispenseOutcome::InvalidAddress), "invalid_address");
        assert_eq!(
            outcome_label(&DispenseOutcome::SubmissionFailed { reason: String::new() }),
            "submission_failed"
        );
    }

    #[test]
    fn test_dispense_request_args_default_to_empty() {
        let parsed: DispenseApiRequest =
            serde_json::from_str(r#"{"requester_id":"user-1"}"#).unwrap();
        assert!(parsed.args.is_empty());
    }
}
