//! Operator commands that mutate bridge state.
//!
//! They run on the reconciler loop like events do, so identity and channel
//! updates never race a reconciliation.

use threadbridge_store::StorageError;
use tracing::{error, info};

use crate::mention::mention_text;
use crate::reconciler::ThreadReconciler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    MapUser {
        tracker_identity: String,
        chat_user_id: String,
    },
    ListMappings,
    RemoveMapping {
        tracker_identity: String,
    },
    /// `text_channel` is false when the command was issued from a thread, DM or
    /// any other non-text channel.
    Activate {
        channel_id: u64,
        text_channel: bool,
    },
    Deactivate {
        channel_id: u64,
    },
}

impl AdminCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MapUser { .. } => "map-user",
            Self::ListMappings => "list-mappings",
            Self::RemoveMapping { .. } => "remove-mapping",
            Self::Activate { .. } => "activate",
            Self::Deactivate { .. } => "deactivate",
        }
    }
}

fn normalize_identity(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed)
}

fn storage_failure_reply(command: &AdminCommand, error: &StorageError) -> String {
    error!(command = command.name(), %error, "admin command could not persist its change");
    format!("Failed to save the change: {error}")
}

impl ThreadReconciler {
    /// Applies `command` and returns the operator-facing reply.
    pub fn execute_admin(&mut self, command: AdminCommand) -> String {
        match &command {
            AdminCommand::MapUser {
                tracker_identity,
                chat_user_id,
            } => {
                let identity = normalize_identity(tracker_identity);
                if identity.is_empty() {
                    return "A tracker identity is required.".to_string();
                }
                match self.identities.associate(identity, chat_user_id) {
                    Ok(()) => {
                        info!(identity, chat_user_id = %chat_user_id, "identity mapping saved");
                        format!(
                            "Tracker user '{identity}' is now mapped to {}.",
                            mention_text(chat_user_id)
                        )
                    }
                    Err(error) => storage_failure_reply(&command, &error),
                }
            }
            AdminCommand::ListMappings => {
                let associations = self.identities.associations();
                if associations.is_empty() {
                    return "No users are mapped.".to_string();
                }
                let mut reply = String::from("**Tracker → chat user mappings**:\n");
                for (identity, chat_user_id) in associations {
                    reply.push_str(&format!(
                        "• **{identity}** → {}\n",
                        mention_text(&chat_user_id)
                    ));
                }
                reply
            }
            AdminCommand::RemoveMapping { tracker_identity } => {
                let identity = normalize_identity(tracker_identity);
                match self.identities.dissociate(identity) {
                    Ok(true) => {
                        info!(identity, "identity mapping removed");
                        format!("Mapping for '{identity}' removed.")
                    }
                    Ok(false) => format!("User '{identity}' was not found in the mappings."),
                    Err(error) => storage_failure_reply(&command, &error),
                }
            }
            AdminCommand::Activate {
                channel_id,
                text_channel,
            } => {
                if !text_channel {
                    return "This command can only be used in text channels.".to_string();
                }
                match self.active_channel.set(*channel_id) {
                    Ok(()) => {
                        info!(channel_id, "bridge activated");
                        format!("Bridge activated in <#{channel_id}>.")
                    }
                    Err(error) => storage_failure_reply(&command, &error),
                }
            }
            AdminCommand::Deactivate { channel_id } => match self.active_channel.get() {
                Some(active) if active == *channel_id => match self.active_channel.clear() {
                    Ok(_) => {
                        info!(channel_id, "bridge deactivated");
                        "Bridge deactivated in this channel.".to_string()
                    }
                    Err(error) => storage_failure_reply(&command, &error),
                },
                Some(active) => {
                    format!("The bridge is not active here; it is active in <#{active}>.")
                }
                None => "The bridge is not active in any channel.".to_string(),
            },
        }
    }
}
