//! HTTP surface of the bridge: Jira webhook intake, Discord interactions and
//! health.

pub mod intake;
pub mod jira_payload;
pub mod server;

pub use intake::{
    is_actionable, EventIntake, IntakeError, IntakeResponse, IntakeStatus,
    DEFAULT_IN_PROGRESS_STATUS,
};
pub use jira_payload::JiraWebhookPayload;
pub use server::{
    build_bridge_router, run_bridge_server, serve_bridge, BridgeServerConfig, BridgeServerState,
    DISCORD_INTERACTIONS_ENDPOINT, HEALTH_ENDPOINT, JIRA_WEBHOOK_ENDPOINT,
};
