//! Webhook validation, the "in progress" predicate and hand-off to the
//! reconciler loop.

use serde::Serialize;
use thiserror::Error;
use threadbridge_reconciler::{ReconcilerHandle, ReconcilerLoopError};
use tracing::{error, info};

use crate::jira_payload::JiraWebhookPayload;

pub const DEFAULT_IN_PROGRESS_STATUS: &str = "Em andamento";
const IN_PROGRESS_CATEGORY: &str = "in progress";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntakeStatus {
    Success,
    Skipped,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntakeResponse {
    pub status: IntakeStatus,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("invalid webhook payload: {0}")]
    Validation(String),
    #[error("failed to hand {task_key} to the reconciler")]
    Submission {
        task_key: String,
        #[source]
        source: ReconcilerLoopError,
    },
}

/// True when either the localized status name or the tracker's status
/// category says work has started. Both comparisons ignore case.
pub fn is_actionable(status_name: &str, status_category: &str, in_progress_status: &str) -> bool {
    status_name.trim().to_lowercase() == in_progress_status.trim().to_lowercase()
        || status_category.trim().to_lowercase() == IN_PROGRESS_CATEGORY
}

#[derive(Debug, Clone)]
pub struct EventIntake {
    reconciler: ReconcilerHandle,
    in_progress_status: String,
}

impl EventIntake {
    pub fn new(reconciler: ReconcilerHandle, in_progress_status: impl Into<String>) -> Self {
        Self {
            reconciler,
            in_progress_status: in_progress_status.into(),
        }
    }

    /// Validates `body` and enqueues it when actionable. Never waits for the
    /// reconciliation itself.
    pub fn handle(&self, body: &[u8]) -> Result<IntakeResponse, IntakeError> {
        let payload = JiraWebhookPayload::parse(body).map_err(IntakeError::Validation)?;
        let task_key = payload.task_key().to_string();
        info!(
            task_key = %task_key,
            status = payload.status_name(),
            category = payload.status_category(),
            "webhook received"
        );

        if !is_actionable(
            payload.status_name(),
            payload.status_category(),
            &self.in_progress_status,
        ) {
            return Ok(IntakeResponse {
                status: IntakeStatus::Skipped,
                message: "Task is not in progress".to_string(),
            });
        }

        if let Err(source) = self.reconciler.submit(payload.into_event()) {
            error!(task_key = %task_key, error = %source, "could not enqueue event");
            return Err(IntakeError::Submission { task_key, source });
        }
        info!(task_key = %task_key, "event queued for reconciliation");
        Ok(IntakeResponse {
            status: IntakeStatus::Success,
            message: format!("Webhook processed: {task_key}"),
        })
    }
}
