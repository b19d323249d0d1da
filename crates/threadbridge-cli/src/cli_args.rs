use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use threadbridge_discord::DEFAULT_DISCORD_API_BASE;
use threadbridge_server::DEFAULT_IN_PROGRESS_STATUS;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "threadbridge",
    about = "Opens a Discord thread for every Jira task that moves to in progress",
    version
)]
pub(crate) struct Cli {
    #[arg(
        long,
        env = "THREADBRIDGE_BIND",
        default_value = "0.0.0.0:5000",
        help = "Socket address the webhook server listens on (host:port)"
    )]
    pub(crate) bind: String,

    #[arg(
        long = "state-dir",
        env = "THREADBRIDGE_STATE_DIR",
        default_value = ".",
        help = "Directory holding task_thread_map.json, user_mapping.json and active_channel.json"
    )]
    pub(crate) state_dir: PathBuf,

    #[arg(
        long = "discord-bot-token",
        env = "DISCORD_BOT_TOKEN",
        hide_env_values = true,
        help = "Bot token used for Discord REST calls; required unless --dry-run"
    )]
    pub(crate) discord_bot_token: Option<String>,

    #[arg(
        long = "discord-api-base",
        env = "DISCORD_API_BASE",
        default_value = DEFAULT_DISCORD_API_BASE,
        help = "Discord REST API base URL"
    )]
    pub(crate) discord_api_base: String,

    #[arg(
        long = "discord-application-id",
        env = "DISCORD_APPLICATION_ID",
        help = "Application id used to register slash commands at startup"
    )]
    pub(crate) discord_application_id: Option<String>,

    #[arg(
        long = "discord-public-key",
        env = "DISCORD_PUBLIC_KEY",
        help = "Hex application public key; enables POST /discord/interactions"
    )]
    pub(crate) discord_public_key: Option<String>,

    #[arg(
        long = "active-channel-id",
        env = "THREADBRIDGE_ACTIVE_CHANNEL_ID",
        help = "Channel to create threads in when none has been activated yet"
    )]
    pub(crate) active_channel_id: Option<u64>,

    #[arg(
        long = "jira-url",
        env = "JIRA_URL",
        help = "Browse URL prefix for task links, e.g. https://acme.atlassian.net/browse/"
    )]
    pub(crate) jira_url: Option<String>,

    #[arg(
        long = "in-progress-status",
        env = "THREADBRIDGE_IN_PROGRESS_STATUS",
        default_value = DEFAULT_IN_PROGRESS_STATUS,
        help = "Status name that counts as in progress (case-insensitive)"
    )]
    pub(crate) in_progress_status: String,

    #[arg(
        long = "request-timeout-ms",
        env = "THREADBRIDGE_REQUEST_TIMEOUT_MS",
        default_value_t = 10_000,
        help = "Timeout for each Discord REST request in milliseconds"
    )]
    pub(crate) request_timeout_ms: u64,

    #[arg(
        long = "dry-run",
        env = "THREADBRIDGE_DRY_RUN",
        default_value_t = false,
        help = "Keep threads in memory instead of calling Discord"
    )]
    pub(crate) dry_run: bool,
}

impl Cli {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            bail!("--request-timeout-ms must be greater than 0");
        }
        if self.in_progress_status.trim().is_empty() {
            bail!("--in-progress-status must not be empty");
        }
        if !self.dry_run && self.bot_token().is_none() {
            bail!("--discord-bot-token (DISCORD_BOT_TOKEN) is required unless --dry-run is set");
        }
        Ok(())
    }

    pub(crate) fn bot_token(&self) -> Option<&str> {
        non_blank(self.discord_bot_token.as_deref())
    }

    pub(crate) fn application_id(&self) -> Option<&str> {
        non_blank(self.discord_application_id.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
