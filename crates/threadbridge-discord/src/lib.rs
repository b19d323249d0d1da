//! Discord side of the bridge: REST client, slash commands and interaction
//! handling.

pub mod client;
pub mod commands;
pub mod interactions;

pub use client::{
    DiscordApiClient, DiscordClientConfig, DiscordClientError, DiscordUser,
    DEFAULT_DISCORD_API_BASE,
};
pub use commands::{admin_command_definitions, register_admin_commands};
pub use interactions::{
    parse_admin_command, verify_discord_signature, Interaction, InteractionParseError,
    InteractionResponse, INTERACTION_APPLICATION_COMMAND, INTERACTION_PING,
};
