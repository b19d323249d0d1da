//! Jira issue webhook body.

use serde::Deserialize;
use threadbridge_reconciler::{ActionableEvent, AssigneeDescriptor};

#[derive(Debug, Clone, Deserialize)]
pub struct JiraWebhookPayload {
    pub issue: JiraIssue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraIssue {
    pub key: String,
    pub fields: JiraIssueFields,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraIssueFields {
    pub summary: String,
    pub status: JiraStatus,
    #[serde(default)]
    pub assignee: Option<JiraAssignee>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraStatus {
    pub name: String,
    #[serde(rename = "statusCategory")]
    pub status_category: JiraStatusCategory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraStatusCategory {
    pub name: String,
}

/// Server and Data Center send `key`/`name`; Cloud sends `accountId`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraAssignee {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl From<JiraAssignee> for AssigneeDescriptor {
    fn from(assignee: JiraAssignee) -> Self {
        AssigneeDescriptor::new(
            assignee.key,
            assignee.account_id,
            assignee.name,
            assignee.email_address,
            assignee.display_name,
        )
    }
}

impl JiraWebhookPayload {
    /// Decodes and validates a raw webhook body.
    pub fn parse(body: &[u8]) -> Result<Self, String> {
        let payload: Self = serde_json::from_slice(body).map_err(|error| error.to_string())?;
        if payload.issue.key.trim().is_empty() {
            return Err("issue.key must not be empty".to_string());
        }
        Ok(payload)
    }

    pub fn task_key(&self) -> &str {
        self.issue.key.trim()
    }

    pub fn status_name(&self) -> &str {
        &self.issue.fields.status.name
    }

    pub fn status_category(&self) -> &str {
        &self.issue.fields.status.status_category.name
    }

    pub fn into_event(self) -> ActionableEvent {
        let task_key = self.task_key().to_string();
        let fields = self.issue.fields;
        ActionableEvent {
            task_key,
            summary: fields.summary,
            status_name: fields.status.name,
            status_category: fields.status.status_category.name,
            assignee: fields.assignee.map(AssigneeDescriptor::from),
        }
    }
}
