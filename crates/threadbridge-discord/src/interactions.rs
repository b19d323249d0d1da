//! Interaction webhook payloads, signature checks and command parsing.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use threadbridge_reconciler::AdminCommand;

use crate::commands::{
    ACTIVATE, CHAT_USER_OPTION, DEACTIVATE, LIST_MAPPINGS, MAP_USER, REMOVE_MAPPING,
    TRACKER_USER_OPTION,
};

pub const INTERACTION_PING: u8 = 1;
pub const INTERACTION_APPLICATION_COMMAND: u8 = 2;

const RESPONSE_PONG: u8 = 1;
const RESPONSE_CHANNEL_MESSAGE: u8 = 4;

const CHANNEL_TYPE_GUILD_TEXT: u8 = 0;
const CHANNEL_TYPE_GUILD_ANNOUNCEMENT: u8 = 5;

/// Verifies the Ed25519 signature Discord attaches to interaction webhooks.
///
/// The signed message is the `X-Signature-Timestamp` header followed by the raw
/// body. Malformed keys or signatures simply fail verification.
pub fn verify_discord_signature(
    public_key_hex: &str,
    signature_hex: &str,
    timestamp: &str,
    body: &[u8],
) -> bool {
    let Ok(key_bytes) = hex::decode(public_key_hex.trim()) else {
        return false;
    };
    let Ok(key_array) = <[u8; 32]>::try_from(key_bytes) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&key_array) else {
        return false;
    };
    let Ok(signature_bytes) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(signature_array) = <[u8; 64]>::try_from(signature_bytes) else {
        return false;
    };
    let signature = Signature::from_bytes(&signature_array);

    let mut message = Vec::with_capacity(timestamp.len() + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.extend_from_slice(body);
    verifying_key.verify(&message, &signature).is_ok()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub channel: Option<InteractionChannel>,
    #[serde(default)]
    pub data: Option<CommandData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InteractionChannel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandData {
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

impl CommandData {
    fn string_option(&self, name: &str) -> Option<String> {
        self.options
            .iter()
            .find(|option| option.name == name)
            .and_then(|option| match &option.value {
                Value::String(value) => Some(value.clone()),
                Value::Number(value) => Some(value.to_string()),
                _ => None,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InteractionParseError {
    #[error("interaction is not an application command")]
    NotACommand,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("missing required option '{0}'")]
    MissingOption(&'static str),
    #[error("interaction did not include a usable channel")]
    MissingChannel,
}

impl Interaction {
    fn channel_id(&self) -> Option<u64> {
        self.channel
            .as_ref()
            .map(|channel| channel.id.as_str())
            .or(self.channel_id.as_deref())
            .and_then(|raw| raw.parse().ok())
    }

    fn in_text_channel(&self) -> bool {
        self.channel.as_ref().is_some_and(|channel| {
            matches!(
                channel.kind,
                CHANNEL_TYPE_GUILD_TEXT | CHANNEL_TYPE_GUILD_ANNOUNCEMENT
            )
        })
    }
}

/// Maps a slash command invocation onto the admin command it stands for.
pub fn parse_admin_command(interaction: &Interaction) -> Result<AdminCommand, InteractionParseError> {
    let data = match (interaction.kind, interaction.data.as_ref()) {
        (INTERACTION_APPLICATION_COMMAND, Some(data)) => data,
        _ => return Err(InteractionParseError::NotACommand),
    };
    match data.name.as_str() {
        MAP_USER => Ok(AdminCommand::MapUser {
            tracker_identity: data
                .string_option(TRACKER_USER_OPTION)
                .ok_or(InteractionParseError::MissingOption(TRACKER_USER_OPTION))?,
            chat_user_id: data
                .string_option(CHAT_USER_OPTION)
                .ok_or(InteractionParseError::MissingOption(CHAT_USER_OPTION))?,
        }),
        LIST_MAPPINGS => Ok(AdminCommand::ListMappings),
        REMOVE_MAPPING => Ok(AdminCommand::RemoveMapping {
            tracker_identity: data
                .string_option(TRACKER_USER_OPTION)
                .ok_or(InteractionParseError::MissingOption(TRACKER_USER_OPTION))?,
        }),
        ACTIVATE => Ok(AdminCommand::Activate {
            channel_id: interaction
                .channel_id()
                .ok_or(InteractionParseError::MissingChannel)?,
            text_channel: interaction.in_text_channel(),
        }),
        DEACTIVATE => Ok(AdminCommand::Deactivate {
            channel_id: interaction
                .channel_id()
                .ok_or(InteractionParseError::MissingChannel)?,
        }),
        other => Err(InteractionParseError::UnknownCommand(other.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionResponseData {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<InteractionResponseData>,
}

impl InteractionResponse {
    pub fn pong() -> Self {
        Self {
            kind: RESPONSE_PONG,
            data: None,
        }
    }

    pub fn message(content: impl Into<String>) -> Self {
        Self {
            kind: RESPONSE_CHANNEL_MESSAGE,
            data: Some(InteractionResponseData {
                content: content.into(),
            }),
        }
    }
}
