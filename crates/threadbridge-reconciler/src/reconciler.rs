//! Create / update / skip decision for a task's discussion thread.

use std::sync::Arc;

use threadbridge_store::{ActiveChannelStore, IdentityDirectory, TaskThreadRecords};
use tracing::{error, info, warn};

use crate::event::ActionableEvent;
use crate::gateway::{ChatGateway, ChatThread, GatewayError};
use crate::mention::{apply_mention_policy, MentionOutcome};
use crate::title::{derive_thread_title, summary_from_thread_name};

#[derive(Debug, Clone, Default)]
pub struct ReconcilerConfig {
    /// Base URL tasks are browsed under, e.g. `https://acme.atlassian.net/browse/`.
    pub tracker_browse_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoActiveChannel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStage {
    FetchThread,
    CreateThread,
    InitialMessage,
    RenameThread,
    Mention,
}

impl ReconcileStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FetchThread => "fetch_thread",
            Self::CreateThread => "create_thread",
            Self::InitialMessage => "initial_message",
            Self::RenameThread => "rename_thread",
            Self::Mention => "mention",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created {
        thread: ChatThread,
        mention: Option<MentionOutcome>,
    },
    Updated {
        thread: ChatThread,
        renamed: bool,
        mention: Option<MentionOutcome>,
    },
    Skipped(SkipReason),
    Failed {
        stage: ReconcileStage,
        error: GatewayError,
    },
}

impl ReconcileOutcome {
    /// The live thread, or `None` when no thread was produced.
    pub fn thread(&self) -> Option<&ChatThread> {
        match self {
            Self::Created { thread, .. } | Self::Updated { thread, .. } => Some(thread),
            Self::Skipped(_) | Self::Failed { .. } => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Updated { .. } => "updated",
            Self::Skipped(_) => "skipped",
            Self::Failed { .. } => "failed",
        }
    }
}

type StageResult<T> = Result<T, (ReconcileStage, GatewayError)>;

/// Owns the chat gateway and bridge state; driven only from the reconciler loop.
pub struct ThreadReconciler {
    pub(crate) gateway: Arc<dyn ChatGateway>,
    pub(crate) task_threads: Box<dyn TaskThreadRecords>,
    pub(crate) identities: Box<dyn IdentityDirectory>,
    pub(crate) active_channel: ActiveChannelStore,
    config: ReconcilerConfig,
}

impl ThreadReconciler {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        task_threads: impl TaskThreadRecords + 'static,
        identities: impl IdentityDirectory + 'static,
        active_channel: ActiveChannelStore,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            gateway,
            task_threads: Box::new(task_threads),
            identities: Box::new(identities),
            active_channel,
            config,
        }
    }

    pub fn active_channel(&self) -> Option<u64> {
        self.active_channel.get()
    }

    pub fn task_threads(&self) -> &dyn TaskThreadRecords {
        self.task_threads.as_ref()
    }

    pub fn identities(&self) -> &dyn IdentityDirectory {
        self.identities.as_ref()
    }

    /// Brings the task's thread in line with `event`. Never fails: gateway
    /// errors are logged and reported as [`ReconcileOutcome::Failed`].
    pub async fn reconcile(&mut self, event: &ActionableEvent) -> ReconcileOutcome {
        let Some(channel_id) = self.active_channel.get() else {
            warn!(
                task_key = %event.task_key,
                "no active channel; activate one with /activate before threads can be created"
            );
            return ReconcileOutcome::Skipped(SkipReason::NoActiveChannel);
        };

        let result = match self.existing_thread(&event.task_key).await {
            Ok(Some(thread)) => self.update_thread(thread, event).await,
            Ok(None) => self.create_thread(channel_id, event).await,
            Err(error) => Err((ReconcileStage::FetchThread, error)),
        };

        match result {
            Ok(outcome) => outcome,
            Err((stage, error)) => {
                error!(
                    task_key = %event.task_key,
                    stage = stage.as_str(),
                    kind = error.kind(),
                    %error,
                    "thread reconciliation failed"
                );
                ReconcileOutcome::Failed { stage, error }
            }
        }
    }

    /// Resolves the recorded thread, purging the record when it is gone.
    async fn existing_thread(&mut self, task_key: &str) -> Result<Option<ChatThread>, GatewayError> {
        let Some(thread_id) = self.task_threads.thread_for_task(task_key) else {
            return Ok(None);
        };
        match self.gateway.fetch_thread(thread_id).await {
            Ok(thread) => Ok(Some(thread)),
            Err(error) if error.is_not_found() => {
                info!(task_key, thread_id, "recorded thread no longer exists; purging record");
                if let Err(storage_error) = self.task_threads.purge_task(task_key) {
                    error!(task_key, error = %storage_error, "failed to persist stale thread purge");
                }
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    async fn create_thread(
        &mut self,
        channel_id: u64,
        event: &ActionableEvent,
    ) -> StageResult<ReconcileOutcome> {
        let title = derive_thread_title(&event.task_key, &event.summary);
        let thread = self
            .gateway
            .create_thread(channel_id, &title)
            .await
            .map_err(|error| (ReconcileStage::CreateThread, error))?;

        if let Err(storage_error) = self.task_threads.record_thread(&event.task_key, thread.id) {
            error!(
                task_key = %event.task_key,
                thread_id = thread.id,
                error = %storage_error,
                "failed to persist task thread record"
            );
        }

        self.gateway
            .send_message(thread.id, &self.initial_message(event))
            .await
            .map_err(|error| (ReconcileStage::InitialMessage, error))?;

        let mention = self.mention(&thread, event).await?;
        info!(
            task_key = %event.task_key,
            thread_id = thread.id,
            channel_id,
            "created thread for task"
        );
        Ok(ReconcileOutcome::Created { thread, mention })
    }

    async fn update_thread(
        &mut self,
        thread: ChatThread,
        event: &ActionableEvent,
    ) -> StageResult<ReconcileOutcome> {
        let title = derive_thread_title(&event.task_key, &event.summary);
        let summary_changed = summary_from_thread_name(&thread.name) != event.summary;
        // A truncated title never equals the raw summary; comparing the full
        // name keeps that case from renaming on every event.
        let (thread, renamed) = if summary_changed && thread.name != title {
            let renamed_thread = self
                .gateway
                .edit_thread(thread.id, &title)
                .await
                .map_err(|error| (ReconcileStage::RenameThread, error))?;
            info!(
                task_key = %event.task_key,
                thread_id = renamed_thread.id,
                "thread title updated after summary change"
            );
            (renamed_thread, true)
        } else {
            (thread, false)
        };

        let mention = self.mention(&thread, event).await?;
        Ok(ReconcileOutcome::Updated {
            thread,
            renamed,
            mention,
        })
    }

    async fn mention(
        &self,
        thread: &ChatThread,
        event: &ActionableEvent,
    ) -> StageResult<Option<MentionOutcome>> {
        let Some(assignee) = event.assignee.as_ref() else {
            return Ok(None);
        };
        apply_mention_policy(
            self.gateway.as_ref(),
            self.identities.as_ref(),
            thread,
            assignee,
        )
        .await
        .map(Some)
        .map_err(|error| (ReconcileStage::Mention, error))
    }

    fn initial_message(&self, event: &ActionableEvent) -> String {
        let headline = format!("**{}** - {}", event.task_key, event.summary);
        match self
            .config
            .tracker_browse_url
            .as_deref()
            .map(str::trim)
            .filter(|base| !base.is_empty())
        {
            Some(base) => format!("{headline}\n\n{}", tracker_item_url(base, &event.task_key)),
            None => headline,
        }
    }
}

/// Joins a browse base and a task key, inserting `/` unless the base already
/// ends in a separator.
pub fn tracker_item_url(base: &str, task_key: &str) -> String {
    if base.ends_with('/') || base.ends_with('=') {
        format!("{base}{task_key}")
    } else {
        format!("{base}/{task_key}")
    }
}
