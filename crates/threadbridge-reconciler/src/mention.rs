//! Assignee notification inside a task thread.

use threadbridge_store::IdentityDirectory;
use tracing::{debug, info, warn};

use crate::event::AssigneeDescriptor;
use crate::gateway::{ChatGateway, ChatMessage, ChatThread, GatewayError};
use crate::identity::{resolve_identity, IdentityResolution};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionOutcome {
    Mentioned { chat_user_id: String },
    /// The newest message already pings this user.
    AlreadyMentioned { chat_user_id: String },
    FallbackAnnounced { label: String },
    FallbackAlreadyAnnounced { label: String },
    NoAssigneeInformation,
}

impl MentionOutcome {
    pub fn sent_message(&self) -> bool {
        matches!(
            self,
            Self::Mentioned { .. } | Self::FallbackAnnounced { .. }
        )
    }
}

pub fn mention_text(chat_user_id: &str) -> String {
    format!("<@{chat_user_id}>")
}

pub fn fallback_notice(label: &str) -> String {
    format!("**{label}** was assigned as responsible for this task.")
}

fn mentions_user(content: &str, chat_user_id: &str) -> bool {
    content.contains(&format!("<@{chat_user_id}>"))
        || content.contains(&format!("<@!{chat_user_id}>"))
}

/// Notifies the assignee in `thread` unless the newest message already did.
///
/// A mapped assignee is pinged; an unmapped one gets a plain-text notice with
/// their label; an empty descriptor only produces a diagnostic.
pub async fn apply_mention_policy(
    gateway: &dyn ChatGateway,
    directory: &dyn IdentityDirectory,
    thread: &ChatThread,
    assignee: &AssigneeDescriptor,
) -> Result<MentionOutcome, GatewayError> {
    match resolve_identity(assignee, directory) {
        IdentityResolution::Resolved {
            chat_user_id,
            matched_identity,
        } => {
            debug!(
                thread_id = thread.id,
                matched_identity = %matched_identity,
                chat_user_id = %chat_user_id,
                "assignee mapping found"
            );
            let already_mentioned = latest_message(gateway, thread.id)
                .await?
                .is_some_and(|message| mentions_user(&message.content, &chat_user_id));
            if already_mentioned {
                return Ok(MentionOutcome::AlreadyMentioned { chat_user_id });
            }
            gateway
                .send_message(thread.id, &mention_text(&chat_user_id))
                .await?;
            Ok(MentionOutcome::Mentioned { chat_user_id })
        }
        IdentityResolution::Fallback { label } => {
            let notice = fallback_notice(&label);
            let already_announced = latest_message(gateway, thread.id)
                .await?
                .is_some_and(|message| message.content.trim() == notice);
            if already_announced {
                return Ok(MentionOutcome::FallbackAlreadyAnnounced { label });
            }
            gateway.send_message(thread.id, &notice).await?;
            warn!(
                thread_id = thread.id,
                assignee = %label,
                "no identity mapping found for assignee; add one with /map-user"
            );
            Ok(MentionOutcome::FallbackAnnounced { label })
        }
        IdentityResolution::NoAssigneeInformation => {
            info!(
                thread_id = thread.id,
                "assignee carries no identity fields; nothing to mention"
            );
            Ok(MentionOutcome::NoAssigneeInformation)
        }
    }
}

async fn latest_message(
    gateway: &dyn ChatGateway,
    channel_id: u64,
) -> Result<Option<ChatMessage>, GatewayError> {
    Ok(gateway
        .recent_history(channel_id, 1)
        .await?
        .into_iter()
        .next())
}
