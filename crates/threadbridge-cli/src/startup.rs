use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use threadbridge_discord::{register_admin_commands, DiscordApiClient, DiscordClientConfig};
use threadbridge_reconciler::{
    start_reconciler_loop, ChatGateway, InMemoryChatGateway, ReconcilerConfig, ThreadReconciler,
    DRY_RUN_RETAINED_ENTRIES,
};
use threadbridge_server::{run_bridge_server, BridgeServerConfig, BridgeServerState};
use threadbridge_store::{
    ActiveChannelStore, IdentityStore, TaskThreadStore, ACTIVE_CHANNEL_FILE,
    TASK_THREAD_MAP_FILE, USER_MAPPING_FILE,
};
use tracing::{info, warn};

use crate::cli_args::Cli;

pub(crate) async fn run_bridge(cli: Cli) -> Result<()> {
    let reconciler = build_reconciler(&cli, connect_gateway(&cli).await?)?;
    let (handle, reconciler_loop) =
        start_reconciler_loop(reconciler).context("failed to start reconciler loop")?;

    let state = Arc::new(BridgeServerState::new(
        handle,
        cli.in_progress_status.clone(),
        cli.discord_public_key.clone(),
    ));
    let serve_result = run_bridge_server(
        BridgeServerConfig {
            bind: cli.bind.clone(),
        },
        state,
    )
    .await;

    if reconciler_loop.shutdown().await.is_none() {
        warn!("reconciler loop did not shut down cleanly");
    }
    serve_result
}

/// Loads bridge state from `cli.state_dir` and wires it to `gateway`.
pub(crate) fn build_reconciler(cli: &Cli, gateway: Arc<dyn ChatGateway>) -> Result<ThreadReconciler> {
    let state_dir = cli.state_dir.as_path();
    std::fs::create_dir_all(state_dir)
        .with_context(|| format!("failed to create {}", state_dir.display()))?;

    let task_threads = TaskThreadStore::load(state_dir.join(TASK_THREAD_MAP_FILE));
    let identities = IdentityStore::load(state_dir.join(USER_MAPPING_FILE));
    let active_channel = load_active_channel(state_dir, cli.active_channel_id)?;
    info!(
        state_dir = %state_dir.display(),
        task_threads = task_threads.len(),
        identities = identities.len(),
        active_channel = ?active_channel.get(),
        "bridge state loaded"
    );

    Ok(ThreadReconciler::new(
        gateway,
        task_threads,
        identities,
        active_channel,
        ReconcilerConfig {
            tracker_browse_url: cli.jira_url.clone(),
        },
    ))
}

/// A persisted activation or deactivation wins; the configured channel only
/// seeds a state dir that never recorded one.
fn load_active_channel(state_dir: &Path, configured: Option<u64>) -> Result<ActiveChannelStore> {
    let mut active_channel = ActiveChannelStore::load(state_dir.join(ACTIVE_CHANNEL_FILE));
    if let (false, Some(channel_id)) = (active_channel.is_recorded(), configured) {
        active_channel
            .set(channel_id)
            .context("failed to persist configured active channel")?;
    }
    Ok(active_channel)
}

async fn connect_gateway(cli: &Cli) -> Result<Arc<dyn ChatGateway>> {
    if cli.dry_run {
        info!("dry run: threads and messages are kept in memory");
        return Ok(Arc::new(InMemoryChatGateway::bounded(DRY_RUN_RETAINED_ENTRIES)));
    }

    let client = DiscordApiClient::new(DiscordClientConfig {
        api_base: cli.discord_api_base.clone(),
        bot_token: cli.bot_token().unwrap_or_default().to_string(),
        request_timeout_ms: cli.request_timeout_ms,
    })
    .context("failed to configure discord client")?;

    let user = client
        .current_user()
        .await
        .context("discord login failed; check DISCORD_BOT_TOKEN")?;
    info!(user_id = %user.id, username = %user.username, "logged in to discord");

    match cli.application_id() {
        Some(application_id) => {
            if let Err(error) = register_admin_commands(&client, application_id).await {
                warn!(%error, application_id, "failed to register slash commands");
            }
        }
        None => info!("no application id configured; slash commands not registered"),
    }
    Ok(Arc::new(client))
}
