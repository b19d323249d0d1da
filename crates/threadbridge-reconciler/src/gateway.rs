//! Chat platform operations the reconciler depends on.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatThread {
    pub id: u64,
    pub name: String,
    pub parent_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: u64,
    pub content: String,
    pub author_id: Option<String>,
}

/// Classified chat platform failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The referenced thread or channel no longer exists.
    #[error("{resource} was not found")]
    NotFound { resource: String },
    #[error("permission denied for {action}: {detail}")]
    Permission { action: String, detail: String },
    #[error("{action} failed: {detail}")]
    Transport { action: String, detail: String },
}

impl GatewayError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn permission(action: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Permission {
            action: action.into(),
            detail: detail.into(),
        }
    }

    pub fn transport(action: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Transport {
            action: action.into(),
            detail: detail.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Permission { .. } => "permission",
            Self::Transport { .. } => "transport",
        }
    }
}

/// Thread and message operations on the chat platform.
///
/// Implementations are only ever driven from the reconciler loop, one call at a
/// time.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn fetch_thread(&self, thread_id: u64) -> Result<ChatThread, GatewayError>;

    /// Opens a public thread named `name` under `channel_id`.
    async fn create_thread(&self, channel_id: u64, name: &str) -> Result<ChatThread, GatewayError>;

    async fn edit_thread(&self, thread_id: u64, name: &str) -> Result<ChatThread, GatewayError>;

    async fn send_message(&self, channel_id: u64, content: &str)
        -> Result<ChatMessage, GatewayError>;

    /// Latest messages, newest first.
    async fn recent_history(
        &self,
        channel_id: u64,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, GatewayError>;
}
