use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::{json, Value};
use threadbridge_discord::{DiscordApiClient, DiscordClientConfig};
use threadbridge_reconciler::{
    start_reconciler_loop, ReconcilerConfig, ReconcilerHandle, ReconcilerLoop, ThreadReconciler,
};
use threadbridge_server::{serve_bridge, BridgeServerState, DEFAULT_IN_PROGRESS_STATUS};
use threadbridge_store::{
    ActiveChannelStore, IdentityStore, TaskThreadStore, ACTIVE_CHANNEL_FILE,
    TASK_THREAD_MAP_FILE, USER_MAPPING_FILE,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const CHANNEL: u64 = 500;

struct Bridge {
    addr: SocketAddr,
    handle: ReconcilerHandle,
    reconciler_loop: ReconcilerLoop,
    stop_server: oneshot::Sender<()>,
    server: tokio::task::JoinHandle<Result<()>>,
}

impl Bridge {
    async fn start(discord: &MockServer, state_dir: &Path) -> Result<Self> {
        let client = DiscordApiClient::new(DiscordClientConfig {
            api_base: discord.base_url(),
            bot_token: "discord-token".to_string(),
            request_timeout_ms: 2_000,
        })
        .context("discord client")?;
        let mut active_channel = ActiveChannelStore::load(state_dir.join(ACTIVE_CHANNEL_FILE));
        active_channel.set(CHANNEL).context("activate channel")?;
        let reconciler = ThreadReconciler::new(
            Arc::new(client),
            TaskThreadStore::load(state_dir.join(TASK_THREAD_MAP_FILE)),
            IdentityStore::load(state_dir.join(USER_MAPPING_FILE)),
            active_channel,
            ReconcilerConfig {
                tracker_browse_url: Some("https://jira.example.com/browse".to_string()),
            },
        );
        let (handle, reconciler_loop) =
            start_reconciler_loop(reconciler).context("reconciler loop")?;

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind ephemeral listener")?;
        let addr = listener.local_addr().context("resolve listener addr")?;
        let state = Arc::new(BridgeServerState::new(
            handle.clone(),
            DEFAULT_IN_PROGRESS_STATUS,
            None,
        ));
        let (stop_server, stopped) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_bridge(listener, state, async move {
            let _ = stopped.await;
        }));
        Ok(Self {
            addr,
            handle,
            reconciler_loop,
            stop_server,
            server,
        })
    }

    async fn post_webhook(&self, payload: &Value) -> Result<Value> {
        let response = reqwest::Client::new()
            .post(format!("http://{}/jira-webhook", self.addr))
            .json(payload)
            .send()
            .await
            .context("webhook request")?;
        response.json().await.context("webhook response body")
    }

    async fn stop(self) -> Result<()> {
        let _ = self.stop_server.send(());
        self.server.await.context("join server")??;
        self.reconciler_loop
            .shutdown()
            .await
            .context("reconciler loop panicked")?;
        Ok(())
    }
}

fn in_progress(key: &str, summary: &str) -> Value {
    json!({
        "issue": {
            "key": key,
            "fields": {
                "summary": summary,
                "status": {"name": "Em andamento", "statusCategory": {"name": "In Progress"}},
                "assignee": {"key": "JIRAUSER10", "name": "jdoe", "displayName": "Jane Doe"}
            }
        }
    })
}

fn read_json(path: &Path) -> Value {
    let raw = std::fs::read_to_string(path).expect("read state file");
    serde_json::from_str(&raw).expect("state file is json")
}

#[tokio::test]
async fn integration_webhook_creates_discord_thread_and_persists_record() {
    let discord = MockServer::start();
    let temp = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        temp.path().join(USER_MAPPING_FILE),
        r#"{"jdoe": "4242"}"#,
    )
    .expect("seed mapping");

    let create = discord.mock(|when, then| {
        when.method(POST)
            .path("/channels/500/threads")
            .header("authorization", "Bot discord-token")
            .json_body(json!({
                "name": "Task T-1 - Fix bug",
                "type": 11,
                "auto_archive_duration": 10080
            }));
        then.status(201)
            .json_body(json!({"id": "9001", "name": "Task T-1 - Fix bug", "parent_id": "500"}));
    });
    let initial = discord.mock(|when, then| {
        when.method(POST)
            .path("/channels/9001/messages")
            .json_body(json!({
                "content": "**T-1** - Fix bug\n\nhttps://jira.example.com/browse/T-1"
            }));
        then.status(200)
            .json_body(json!({"id": "1", "content": "initial"}));
    });
    let history = discord.mock(|when, then| {
        when.method(GET)
            .path("/channels/9001/messages")
            .query_param("limit", "1");
        then.status(200).json_body(json!([]));
    });
    let mention = discord.mock(|when, then| {
        when.method(POST)
            .path("/channels/9001/messages")
            .json_body(json!({"content": "<@4242>"}));
        then.status(200)
            .json_body(json!({"id": "2", "content": "<@4242>"}));
    });

    let bridge = Bridge::start(&discord, temp.path()).await.expect("bridge");
    let reply = bridge
        .post_webhook(&in_progress("T-1", "Fix bug"))
        .await
        .expect("webhook");
    bridge.handle.barrier().await.expect("barrier");

    assert_eq!(reply["status"], "success");
    create.assert_calls(1);
    initial.assert_calls(1);
    history.assert_calls(1);
    mention.assert_calls(1);
    assert_eq!(
        read_json(&temp.path().join(TASK_THREAD_MAP_FILE)),
        json!({"T-1": 9001})
    );
    bridge.stop().await.expect("stop");
}

#[tokio::test]
async fn integration_stale_string_record_is_replaced_after_thread_deletion() {
    let discord = MockServer::start();
    let temp = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        temp.path().join(TASK_THREAD_MAP_FILE),
        r#"{"T-9": "777"}"#,
    )
    .expect("seed record");

    let lookup = discord.mock(|when, then| {
        when.method(GET).path("/channels/777");
        then.status(404)
            .json_body(json!({"message": "Unknown Channel", "code": 10003}));
    });
    let create = discord.mock(|when, then| {
        when.method(POST).path("/channels/500/threads");
        then.status(201)
            .json_body(json!({"id": "9100", "name": "Task T-9 - Recreated", "parent_id": "500"}));
    });
    discord.mock(|when, then| {
        when.method(POST).path("/channels/9100/messages");
        then.status(200).json_body(json!({"id": "3", "content": "x"}));
    });
    discord.mock(|when, then| {
        when.method(GET).path("/channels/9100/messages");
        then.status(200).json_body(json!([]));
    });

    let bridge = Bridge::start(&discord, temp.path()).await.expect("bridge");
    bridge
        .post_webhook(&in_progress("T-9", "Recreated"))
        .await
        .expect("webhook");
    bridge.handle.barrier().await.expect("barrier");

    lookup.assert_calls(1);
    create.assert_calls(1);
    assert_eq!(
        read_json(&temp.path().join(TASK_THREAD_MAP_FILE)),
        json!({"T-9": 9100})
    );
    bridge.stop().await.expect("stop");
}

#[tokio::test]
async fn integration_permission_denied_leaves_no_record_and_bridge_keeps_serving() {
    let discord = MockServer::start();
    let temp = tempfile::tempdir().expect("tempdir");
    let create = discord.mock(|when, then| {
        when.method(POST).path("/channels/500/threads");
        then.status(403)
            .json_body(json!({"message": "Missing Permissions", "code": 50013}));
    });

    let bridge = Bridge::start(&discord, temp.path()).await.expect("bridge");
    let first = bridge
        .post_webhook(&in_progress("T-2", "Locked"))
        .await
        .expect("webhook");
    bridge.handle.barrier().await.expect("barrier");
    let second = bridge
        .post_webhook(&in_progress("T-2", "Locked"))
        .await
        .expect("webhook");
    bridge.handle.barrier().await.expect("barrier");

    assert_eq!(first["status"], "success");
    assert_eq!(second["status"], "success");
    create.assert_calls(2);
    assert_eq!(
        read_json(&temp.path().join(TASK_THREAD_MAP_FILE)),
        json!({})
    );
    bridge.stop().await.expect("stop");
}
