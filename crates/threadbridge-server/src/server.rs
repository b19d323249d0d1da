//! axum router and server lifecycle.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use threadbridge_discord::{
    parse_admin_command, verify_discord_signature, Interaction, InteractionResponse,
    INTERACTION_APPLICATION_COMMAND, INTERACTION_PING,
};
use threadbridge_reconciler::{AdminCommand, ReconcilerHandle, ReconcilerLoopError};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::intake::{EventIntake, IntakeError, IntakeResponse};

mod types;

use types::BridgeApiError;

pub const JIRA_WEBHOOK_ENDPOINT: &str = "/jira-webhook";
pub const DISCORD_INTERACTIONS_ENDPOINT: &str = "/discord/interactions";
pub const HEALTH_ENDPOINT: &str = "/healthz";

const SIGNATURE_HEADER: &str = "x-signature-ed25519";
const SIGNATURE_TIMESTAMP_HEADER: &str = "x-signature-timestamp";
/// Discord drops interactions that are not answered within three seconds.
const ADMIN_REPLY_DEADLINE: Duration = Duration::from_millis(2_500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeServerConfig {
    pub bind: String,
}

pub struct BridgeServerState {
    intake: EventIntake,
    reconciler: ReconcilerHandle,
    discord_public_key: Option<String>,
}

impl BridgeServerState {
    pub fn new(
        reconciler: ReconcilerHandle,
        in_progress_status: impl Into<String>,
        discord_public_key: Option<String>,
    ) -> Self {
        Self {
            intake: EventIntake::new(reconciler.clone(), in_progress_status),
            reconciler,
            discord_public_key: discord_public_key
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
        }
    }
}

pub fn build_bridge_router(state: Arc<BridgeServerState>) -> Router {
    Router::new()
        .route(JIRA_WEBHOOK_ENDPOINT, post(handle_jira_webhook))
        .route(
            DISCORD_INTERACTIONS_ENDPOINT,
            post(handle_discord_interaction),
        )
        .route(HEALTH_ENDPOINT, get(handle_health))
        .with_state(state)
}

/// Binds `config.bind` and serves until Ctrl-C.
pub async fn run_bridge_server(
    config: BridgeServerConfig,
    state: Arc<BridgeServerState>,
) -> Result<()> {
    let bind_addr = config
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid --bind '{}'", config.bind))?;
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind bridge server on {bind_addr}"))?;
    serve_bridge(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

pub async fn serve_bridge(
    listener: TcpListener,
    state: Arc<BridgeServerState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound bridge server address")?;
    info!(
        addr = %local_addr,
        webhook = JIRA_WEBHOOK_ENDPOINT,
        interactions = DISCORD_INTERACTIONS_ENDPOINT,
        interactions_enabled = state.discord_public_key.is_some(),
        "bridge server listening"
    );
    axum::serve(listener, build_bridge_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("bridge server exited unexpectedly")?;
    info!("bridge server stopped");
    Ok(())
}

async fn handle_health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn handle_jira_webhook(
    State(state): State<Arc<BridgeServerState>>,
    body: Bytes,
) -> Result<Json<IntakeResponse>, BridgeApiError> {
    match state.intake.handle(&body) {
        Ok(response) => Ok(Json(response)),
        Err(IntakeError::Validation(message)) => {
            warn!(%message, "rejected webhook payload");
            Err(BridgeApiError::bad_request(format!(
                "invalid webhook payload: {message}"
            )))
        }
        Err(error @ IntakeError::Submission { .. }) => {
            Err(BridgeApiError::internal(error.to_string()))
        }
    }
}

async fn handle_discord_interaction(
    State(state): State<Arc<BridgeServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<InteractionResponse>, BridgeApiError> {
    let Some(public_key) = state.discord_public_key.as_deref() else {
        return Err(BridgeApiError::not_found(
            "discord interactions are not configured",
        ));
    };
    let signature = header_value(&headers, SIGNATURE_HEADER);
    let timestamp = header_value(&headers, SIGNATURE_TIMESTAMP_HEADER);
    let verified = match (signature, timestamp) {
        (Some(signature), Some(timestamp)) => {
            verify_discord_signature(public_key, signature, timestamp, &body)
        }
        _ => false,
    };
    if !verified {
        warn!("rejected interaction with missing or invalid signature");
        return Err(BridgeApiError::unauthorized("invalid request signature"));
    }

    let interaction: Interaction = serde_json::from_slice(&body)
        .map_err(|error| BridgeApiError::bad_request(format!("invalid interaction: {error}")))?;
    match interaction.kind {
        INTERACTION_PING => Ok(Json(InteractionResponse::pong())),
        INTERACTION_APPLICATION_COMMAND => {
            let content = match parse_admin_command(&interaction) {
                Ok(command) => {
                    info!(command = command.name(), "admin command received");
                    run_admin_command(&state.reconciler, command).await
                }
                Err(error) => {
                    warn!(%error, "unusable admin command");
                    format!("Cannot run this command: {error}.")
                }
            };
            Ok(Json(InteractionResponse::message(content)))
        }
        other => Err(BridgeApiError::bad_request(format!(
            "unsupported interaction type {other}"
        ))),
    }
}

async fn run_admin_command(
    reconciler: &ReconcilerHandle,
    command: AdminCommand,
) -> String {
    match tokio::time::timeout(ADMIN_REPLY_DEADLINE, reconciler.admin(command)).await {
        Ok(Ok(reply)) => reply,
        Ok(Err(ReconcilerLoopError::Stopped)) | Ok(Err(ReconcilerLoopError::NoRuntime)) => {
            "The bridge is shutting down; try again later.".to_string()
        }
        Ok(Err(ReconcilerLoopError::ReplyDropped)) => {
            "The command could not be completed.".to_string()
        }
        Err(_) => {
            warn!("admin command missed the interaction reply deadline");
            "The bridge is busy; the command is still queued and will be applied shortly."
                .to_string()
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
