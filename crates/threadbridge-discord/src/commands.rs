//! Slash commands exposed to operators.

use serde_json::{json, Value};
use threadbridge_reconciler::GatewayError;

use crate::client::DiscordApiClient;

pub(crate) const OPTION_TYPE_STRING: u8 = 3;
pub(crate) const OPTION_TYPE_USER: u8 = 6;

pub const MAP_USER: &str = "map-user";
pub const LIST_MAPPINGS: &str = "list-mappings";
pub const REMOVE_MAPPING: &str = "remove-mapping";
pub const ACTIVATE: &str = "activate";
pub const DEACTIVATE: &str = "deactivate";

pub const TRACKER_USER_OPTION: &str = "tracker_user";
pub const CHAT_USER_OPTION: &str = "discord_user";

fn string_option(name: &str, description: &str) -> Value {
    json!({
        "type": OPTION_TYPE_STRING,
        "name": name,
        "description": description,
        "required": true,
    })
}

/// Global application command payloads for `PUT /applications/{id}/commands`.
pub fn admin_command_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": MAP_USER,
            "description": "Map a Jira user to a Discord user",
            "options": [
                string_option(TRACKER_USER_OPTION, "Jira e-mail, username or user key"),
                {
                    "type": OPTION_TYPE_USER,
                    "name": CHAT_USER_OPTION,
                    "description": "Discord user to mention",
                    "required": true,
                },
            ],
        }),
        json!({
            "name": LIST_MAPPINGS,
            "description": "List every Jira to Discord user mapping",
        }),
        json!({
            "name": REMOVE_MAPPING,
            "description": "Remove the mapping of a Jira user",
            "options": [string_option(TRACKER_USER_OPTION, "Jira identity to unmap")],
        }),
        json!({
            "name": ACTIVATE,
            "description": "Create task threads in this channel",
        }),
        json!({
            "name": DEACTIVATE,
            "description": "Stop creating task threads in this channel",
        }),
    ]
}

pub async fn register_admin_commands(
    client: &DiscordApiClient,
    application_id: &str,
) -> Result<usize, GatewayError> {
    client
        .register_commands(application_id, &admin_command_definitions())
        .await
}
