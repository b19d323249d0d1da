//! In-process chat gateway used for dry runs and tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::info;

use crate::gateway::{ChatGateway, ChatMessage, ChatThread, GatewayError};

const FIRST_SNOWFLAKE: u64 = 1_000;
/// Calls and per-channel messages kept by a dry-run gateway.
pub const DRY_RUN_RETAINED_ENTRIES: usize = 64;

/// One recorded gateway operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    FetchThread { thread_id: u64 },
    CreateThread { channel_id: u64, name: String },
    EditThread { thread_id: u64, name: String },
    SendMessage { channel_id: u64, content: String },
    RecentHistory { channel_id: u64, limit: usize },
}

impl GatewayCall {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::CreateThread { .. } | Self::EditThread { .. } | Self::SendMessage { .. }
        )
    }
}

#[derive(Debug, Default)]
struct InMemoryState {
    last_id: u64,
    threads: BTreeMap<u64, ChatThread>,
    messages: BTreeMap<u64, Vec<ChatMessage>>,
    calls: Vec<GatewayCall>,
    denied_channels: BTreeSet<u64>,
    failing_sends: Option<GatewayError>,
    retain: Option<usize>,
}

impl InMemoryState {
    fn next_id(&mut self) -> u64 {
        self.last_id = self.last_id.max(FIRST_SNOWFLAKE - 1) + 1;
        self.last_id
    }

    fn record(&mut self, call: GatewayCall) {
        self.calls.push(call);
        if let Some(retain) = self.retain {
            trim_front(&mut self.calls, retain);
        }
    }

    fn push_message(&mut self, channel_id: u64, message: ChatMessage) {
        let messages = self.messages.entry(channel_id).or_default();
        messages.push(message);
        if let Some(retain) = self.retain {
            trim_front(messages, retain);
        }
    }
}

fn trim_front<T>(entries: &mut Vec<T>, retain: usize) {
    if entries.len() > retain {
        entries.drain(..entries.len() - retain);
    }
}

/// Keeps threads and messages in memory and records every call it receives.
#[derive(Debug, Default)]
pub struct InMemoryChatGateway {
    state: Mutex<InMemoryState>,
}

impl InMemoryChatGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway for long-running dry runs: only the newest `retain` calls and
    /// the newest `retain` messages of each channel are kept.
    pub fn bounded(retain: usize) -> Self {
        let gateway = Self::default();
        gateway.state().retain = Some(retain.max(1));
        gateway
    }

    fn state(&self) -> MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds a thread that already exists on the platform.
    pub fn insert_thread(&self, parent_id: u64, name: &str) -> ChatThread {
        let mut state = self.state();
        let thread = ChatThread {
            id: state.next_id(),
            name: name.to_string(),
            parent_id: Some(parent_id),
        };
        state.threads.insert(thread.id, thread.clone());
        thread
    }

    /// Seeds a message without recording a call.
    pub fn insert_message(&self, channel_id: u64, content: &str) -> ChatMessage {
        let mut state = self.state();
        let message = ChatMessage {
            id: state.next_id(),
            content: content.to_string(),
            author_id: None,
        };
        state.push_message(channel_id, message.clone());
        message
    }

    /// Simulates a thread deleted by someone outside the bridge.
    pub fn delete_thread(&self, thread_id: u64) -> bool {
        let mut state = self.state();
        state.messages.remove(&thread_id);
        state.threads.remove(&thread_id).is_some()
    }

    /// Makes thread creation under `channel_id` fail with a permission error.
    pub fn deny_thread_creation(&self, channel_id: u64) {
        self.state().denied_channels.insert(channel_id);
    }

    /// Makes every subsequent `send_message` fail with `error`.
    pub fn fail_sends_with(&self, error: GatewayError) {
        self.state().failing_sends = Some(error);
    }

    pub fn thread(&self, thread_id: u64) -> Option<ChatThread> {
        self.state().threads.get(&thread_id).cloned()
    }

    pub fn threads(&self) -> Vec<ChatThread> {
        self.state().threads.values().cloned().collect()
    }

    /// Messages of a channel in posting order.
    pub fn messages(&self, channel_id: u64) -> Vec<ChatMessage> {
        self.state()
            .messages
            .get(&channel_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state().calls.clone()
    }

    pub fn write_calls(&self) -> Vec<GatewayCall> {
        self.state()
            .calls
            .iter()
            .filter(|call| call.is_write())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

#[async_trait]
impl ChatGateway for InMemoryChatGateway {
    async fn fetch_thread(&self, thread_id: u64) -> Result<ChatThread, GatewayError> {
        let mut state = self.state();
        state.record(GatewayCall::FetchThread { thread_id });
        state
            .threads
            .get(&thread_id)
            .cloned()
            .ok_or_else(|| GatewayError::not_found(format!("thread {thread_id}")))
    }

    async fn create_thread(&self, channel_id: u64, name: &str) -> Result<ChatThread, GatewayError> {
        let mut state = self.state();
        state.record(GatewayCall::CreateThread {
            channel_id,
            name: name.to_string(),
        });
        if state.denied_channels.contains(&channel_id) {
            return Err(GatewayError::permission(
                "create thread",
                format!("missing permission to create threads in channel {channel_id}"),
            ));
        }
        let thread = ChatThread {
            id: state.next_id(),
            name: name.to_string(),
            parent_id: Some(channel_id),
        };
        state.threads.insert(thread.id, thread.clone());
        info!(channel_id, thread_id = thread.id, name, "in-memory thread created");
        Ok(thread)
    }

    async fn edit_thread(&self, thread_id: u64, name: &str) -> Result<ChatThread, GatewayError> {
        let mut state = self.state();
        state.record(GatewayCall::EditThread {
            thread_id,
            name: name.to_string(),
        });
        let thread = state
            .threads
            .get_mut(&thread_id)
            .ok_or_else(|| GatewayError::not_found(format!("thread {thread_id}")))?;
        thread.name = name.to_string();
        info!(thread_id, name, "in-memory thread renamed");
        Ok(thread.clone())
    }

    async fn send_message(
        &self,
        channel_id: u64,
        content: &str,
    ) -> Result<ChatMessage, GatewayError> {
        let mut state = self.state();
        state.record(GatewayCall::SendMessage {
            channel_id,
            content: content.to_string(),
        });
        if let Some(error) = state.failing_sends.clone() {
            return Err(error);
        }
        if !state.threads.contains_key(&channel_id) {
            return Err(GatewayError::not_found(format!("channel {channel_id}")));
        }
        let message = ChatMessage {
            id: state.next_id(),
            content: content.to_string(),
            author_id: None,
        };
        state.push_message(channel_id, message.clone());
        info!(channel_id, content, "in-memory message sent");
        Ok(message)
    }

    async fn recent_history(
        &self,
        channel_id: u64,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, GatewayError> {
        let mut state = self.state();
        state.record(GatewayCall::RecentHistory { channel_id, limit });
        Ok(state
            .messages
            .get(&channel_id)
            .map(|messages| messages.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
