//! Discord REST v10 client implementing the chat gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use threadbridge_reconciler::{ChatGateway, ChatMessage, ChatThread, GatewayError};
use tracing::{debug, info};

pub const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const PUBLIC_THREAD_CHANNEL_TYPE: u8 = 11;
/// One week, the longest auto-archive window Discord offers.
const THREAD_AUTO_ARCHIVE_MINUTES: u32 = 10_080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscordClientConfig {
    pub api_base: String,
    pub bot_token: String,
    pub request_timeout_ms: u64,
}

impl Default for DiscordClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_DISCORD_API_BASE.to_string(),
            bot_token: String::new(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Error)]
pub enum DiscordClientError {
    #[error("discord bot token is empty")]
    MissingToken,
    #[error("discord request timeout must be greater than 0")]
    ZeroTimeout,
    #[error("failed to build discord http client")]
    HttpClient(#[source] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Deserialize)]
struct DiscordChannel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiscordMessageAuthor {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DiscordMessage {
    id: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    author: Option<DiscordMessageAuthor>,
}

pub struct DiscordApiClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl DiscordApiClient {
    pub fn new(config: DiscordClientConfig) -> Result<Self, DiscordClientError> {
        let bot_token = config.bot_token.trim().to_string();
        if bot_token.is_empty() {
            return Err(DiscordClientError::MissingToken);
        }
        if config.request_timeout_ms == 0 {
            return Err(DiscordClientError::ZeroTimeout);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(DiscordClientError::HttpClient)?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token,
        })
    }

    /// The bot account behind the token; fails when the token is rejected.
    pub async fn current_user(&self) -> Result<DiscordUser, GatewayError> {
        self.call(Method::GET, "/users/@me", "fetch current user", "current user", None)
            .await
    }

    /// Overwrites the application's global command set with `commands`.
    pub async fn register_commands(
        &self,
        application_id: &str,
        commands: &[Value],
    ) -> Result<usize, GatewayError> {
        let registered: Vec<Value> = self
            .call(
                Method::PUT,
                &format!("/applications/{application_id}/commands"),
                "register commands",
                &format!("application {application_id}"),
                Some(Value::Array(commands.to_vec())),
            )
            .await?;
        info!(application_id, count = registered.len(), "slash commands registered");
        Ok(registered.len())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        action: &str,
        resource: &str,
        body: Option<Value>,
    ) -> Result<T, GatewayError> {
        let url = format!("{}{path}", self.api_base);
        debug!(%method, %url, action, "discord request");
        let mut request = self
            .http
            .request(method, &url)
            .header(AUTHORIZATION, format!("Bot {}", self.bot_token));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .map_err(|error| GatewayError::transport(action, error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, action, resource, detail));
        }
        response.json::<T>().await.map_err(|error| {
            GatewayError::transport(action, format!("unexpected response body: {error}"))
        })
    }
}

fn classify_failure(status: StatusCode, action: &str, resource: &str, detail: String) -> GatewayError {
    match status {
        StatusCode::NOT_FOUND => GatewayError::not_found(resource),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            GatewayError::permission(action, format!("{status}: {detail}"))
        }
        _ => GatewayError::transport(action, format!("{status}: {detail}")),
    }
}

fn parse_snowflake(raw: &str, action: &str) -> Result<u64, GatewayError> {
    raw.parse()
        .map_err(|_| GatewayError::transport(action, format!("invalid snowflake '{raw}'")))
}

fn into_thread(channel: DiscordChannel, action: &str) -> Result<ChatThread, GatewayError> {
    Ok(ChatThread {
        id: parse_snowflake(&channel.id, action)?,
        name: channel.name.unwrap_or_default(),
        parent_id: channel
            .parent_id
            .as_deref()
            .map(|raw| parse_snowflake(raw, action))
            .transpose()?,
    })
}

fn into_message(message: DiscordMessage, action: &str) -> Result<ChatMessage, GatewayError> {
    Ok(ChatMessage {
        id: parse_snowflake(&message.id, action)?,
        content: message.content,
        author_id: message.author.map(|author| author.id),
    })
}

#[async_trait]
impl ChatGateway for DiscordApiClient {
    async fn fetch_thread(&self, thread_id: u64) -> Result<ChatThread, GatewayError> {
        let action = "fetch thread";
        let channel = self
            .call(
                Method::GET,
                &format!("/channels/{thread_id}"),
                action,
                &format!("thread {thread_id}"),
                None,
            )
            .await?;
        into_thread(channel, action)
    }

    async fn create_thread(&self, channel_id: u64, name: &str) -> Result<ChatThread, GatewayError> {
        let action = "create thread";
        let channel = self
            .call(
                Method::POST,
                &format!("/channels/{channel_id}/threads"),
                action,
                &format!("channel {channel_id}"),
                Some(json!({
                    "name": name,
                    "type": PUBLIC_THREAD_CHANNEL_TYPE,
                    "auto_archive_duration": THREAD_AUTO_ARCHIVE_MINUTES,
                })),
            )
            .await?;
        into_thread(channel, action)
    }

    async fn edit_thread(&self, thread_id: u64, name: &str) -> Result<ChatThread, GatewayError> {
        let action = "rename thread";
        let channel = self
            .call(
                Method::PATCH,
                &format!("/channels/{thread_id}"),
                action,
                &format!("thread {thread_id}"),
                Some(json!({ "name": name })),
            )
            .await?;
        into_thread(channel, action)
    }

    async fn send_message(
        &self,
        channel_id: u64,
        content: &str,
    ) -> Result<ChatMessage, GatewayError> {
        let action = "send message";
        let message = self
            .call(
                Method::POST,
                &format!("/channels/{channel_id}/messages"),
                action,
                &format!("channel {channel_id}"),
                Some(json!({ "content": content })),
            )
            .await?;
        into_message(message, action)
    }

    async fn recent_history(
        &self,
        channel_id: u64,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, GatewayError> {
        let action = "read message history";
        let messages: Vec<DiscordMessage> = self
            .call(
                Method::GET,
                &format!("/channels/{channel_id}/messages?limit={limit}"),
                action,
                &format!("channel {channel_id}"),
                None,
            )
            .await?;
        messages
            .into_iter()
            .map(|message| into_message(message, action))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use httpmock::Method::{GET, PATCH, POST, PUT};
    use httpmock::MockServer;
    use serde_json::json;
    use threadbridge_reconciler::ChatGateway;

    use super::{DiscordApiClient, DiscordClientConfig, DiscordClientError};

    fn client(server: &MockServer) -> DiscordApiClient {
        DiscordApiClient::new(DiscordClientConfig {
            api_base: server.base_url(),
            bot_token: "discord-token".to_string(),
            request_timeout_ms: 2_000,
        })
        .expect("client")
    }

    #[test]
    fn unit_blank_token_is_rejected() {
        let error = DiscordApiClient::new(DiscordClientConfig {
            bot_token: "  ".to_string(),
            ..DiscordClientConfig::default()
        })
        .err()
        .expect("missing token");
        assert!(matches!(error, DiscordClientError::MissingToken));
    }

    #[tokio::test]
    async fn integration_create_thread_posts_public_thread_request() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/channels/500/threads")
                .header("authorization", "Bot discord-token")
                .json_body(json!({
                    "name": "Task T-1 - Fix bug",
                    "type": 11,
                    "auto_archive_duration": 10080
                }));
            then.status(201).json_body(json!({
                "id": "9001",
                "name": "Task T-1 - Fix bug",
                "parent_id": "500",
                "type": 11
            }));
        });

        let thread = client(&server)
            .create_thread(500, "Task T-1 - Fix bug")
            .await
            .expect("thread");

        create.assert_calls(1);
        assert_eq!(thread.id, 9001);
        assert_eq!(thread.parent_id, Some(500));
        assert_eq!(thread.name, "Task T-1 - Fix bug");
    }

    #[tokio::test]
    async fn integration_missing_thread_maps_to_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/channels/42");
            then.status(404)
                .json_body(json!({"message": "Unknown Channel", "code": 10003}));
        });

        let error = client(&server).fetch_thread(42).await.expect_err("gone");
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn integration_forbidden_and_server_errors_are_classified() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PATCH).path("/channels/42");
            then.status(403)
                .json_body(json!({"message": "Missing Permissions", "code": 50013}));
        });
        server.mock(|when, then| {
            when.method(POST).path("/channels/42/messages");
            then.status(502).body("bad gateway");
        });

        let client = client(&server);
        let rename = client.edit_thread(42, "x").await.expect_err("forbidden");
        let send = client.send_message(42, "hi").await.expect_err("upstream");
        assert_eq!(rename.kind(), "permission");
        assert_eq!(send.kind(), "transport");
    }

    #[tokio::test]
    async fn integration_recent_history_reads_newest_message_with_limit() {
        let server = MockServer::start();
        let history = server.mock(|when, then| {
            when.method(GET)
                .path("/channels/42/messages")
                .query_param("limit", "1");
            then.status(200).json_body(json!([
                {"id": "77", "content": "<@4242>", "author": {"id": "1"}}
            ]));
        });

        let messages = client(&server)
            .recent_history(42, 1)
            .await
            .expect("history");

        history.assert_calls(1);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, 77);
        assert_eq!(messages[0].content, "<@4242>");
        assert_eq!(messages[0].author_id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn integration_current_user_and_command_registration() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/users/@me")
                .header("authorization", "Bot discord-token");
            then.status(200)
                .json_body(json!({"id": "1", "username": "bridge", "bot": true}));
        });
        let register = server.mock(|when, then| {
            when.method(PUT).path("/applications/app-1/commands");
            then.status(200)
                .json_body(json!([{"id": "c1", "name": "activate"}]));
        });

        let client = client(&server);
        let user = client.current_user().await.expect("user");
        let count = client
            .register_commands("app-1", &[json!({"name": "activate"})])
            .await
            .expect("register");

        assert_eq!(user.username, "bridge");
        assert!(user.bot);
        assert_eq!(count, 1);
        register.assert_calls(1);
    }

    #[tokio::test]
    async fn regression_rejected_token_is_a_permission_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/users/@me");
            then.status(401).json_body(json!({"message": "401: Unauthorized"}));
        });

        let error = client(&server).current_user().await.expect_err("rejected");
        assert_eq!(error.kind(), "permission");
    }
}
