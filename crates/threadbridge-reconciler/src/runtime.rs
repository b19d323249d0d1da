//! Single-consumer reconciler loop and its submission handle.
//!
//! HTTP handlers only ever enqueue; one tokio task owns the reconciler and
//! processes commands in arrival order.

use std::fmt;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::admin::AdminCommand;
use crate::event::ActionableEvent;
use crate::reconciler::ThreadReconciler;

#[derive(Debug)]
pub enum ReconcilerCommand {
    Reconcile(ActionableEvent),
    Admin {
        command: AdminCommand,
        reply: oneshot::Sender<String>,
    },
    /// Resolves once every earlier command has been processed.
    Barrier(oneshot::Sender<()>),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerLoopError {
    #[error("reconciler loop requires a running tokio runtime")]
    NoRuntime,
    #[error("reconciler loop is not running")]
    Stopped,
    #[error("reconciler loop dropped the reply")]
    ReplyDropped,
}

/// Cheap, cloneable sender side of the reconciler queue.
#[derive(Debug, Clone)]
pub struct ReconcilerHandle {
    sender: mpsc::UnboundedSender<ReconcilerCommand>,
}

impl ReconcilerHandle {
    /// Enqueues `event` without waiting for it to be processed.
    pub fn submit(&self, event: ActionableEvent) -> Result<(), ReconcilerLoopError> {
        self.sender
            .send(ReconcilerCommand::Reconcile(event))
            .map_err(|_| ReconcilerLoopError::Stopped)
    }

    pub async fn admin(&self, command: AdminCommand) -> Result<String, ReconcilerLoopError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(ReconcilerCommand::Admin { command, reply })
            .map_err(|_| ReconcilerLoopError::Stopped)?;
        response.await.map_err(|_| ReconcilerLoopError::ReplyDropped)
    }

    pub async fn barrier(&self) -> Result<(), ReconcilerLoopError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(ReconcilerCommand::Barrier(reply))
            .map_err(|_| ReconcilerLoopError::Stopped)?;
        response.await.map_err(|_| ReconcilerLoopError::ReplyDropped)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Owner side of a running loop.
pub struct ReconcilerLoop {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<ThreadReconciler>,
}

impl fmt::Debug for ReconcilerLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconcilerLoop")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl ReconcilerLoop {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops accepting commands, finishes the queued ones and hands the
    /// reconciler back. `None` when the loop task panicked.
    pub async fn shutdown(mut self) -> Option<ThreadReconciler> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        match self.task.await {
            Ok(reconciler) => Some(reconciler),
            Err(error) => {
                warn!(%error, "reconciler loop task ended abnormally");
                None
            }
        }
    }
}

pub fn start_reconciler_loop(
    reconciler: ThreadReconciler,
) -> Result<(ReconcilerHandle, ReconcilerLoop), ReconcilerLoopError> {
    let runtime = Handle::try_current().map_err(|_| ReconcilerLoopError::NoRuntime)?;
    let (sender, receiver) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = runtime.spawn(run_loop(reconciler, receiver, shutdown_rx));
    info!("reconciler loop started");
    Ok((
        ReconcilerHandle { sender },
        ReconcilerLoop {
            shutdown_tx: Some(shutdown_tx),
            task,
        },
    ))
}

async fn run_loop(
    mut reconciler: ThreadReconciler,
    mut receiver: mpsc::UnboundedReceiver<ReconcilerCommand>,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> ThreadReconciler {
    // Dropping the owner without calling shutdown leaves the loop running
    // until every handle is gone.
    let mut shutdown_armed = true;
    loop {
        tokio::select! {
            biased;
            signal = &mut shutdown_rx, if shutdown_armed => {
                if signal.is_ok() {
                    break;
                }
                shutdown_armed = false;
            }
            command = receiver.recv() => match command {
                Some(command) => process(&mut reconciler, command).await,
                None => break,
            },
        }
    }

    receiver.close();
    let mut drained = 0usize;
    while let Some(command) = receiver.recv().await {
        process(&mut reconciler, command).await;
        drained += 1;
    }
    info!(drained, "reconciler loop stopped");
    reconciler
}

async fn process(reconciler: &mut ThreadReconciler, command: ReconcilerCommand) {
    match command {
        ReconcilerCommand::Reconcile(event) => {
            let outcome = reconciler.reconcile(&event).await;
            debug!(
                task_key = %event.task_key,
                outcome = outcome.label(),
                "event reconciled"
            );
        }
        ReconcilerCommand::Admin { command, reply } => {
            let name = command.name();
            let response = reconciler.execute_admin(command);
            if reply.send(response).is_err() {
                debug!(command = name, "admin reply receiver went away");
            }
        }
        ReconcilerCommand::Barrier(reply) => {
            let _ = reply.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use threadbridge_store::{ActiveChannelStore, IdentityStore, TaskThreadStore};

    use super::{start_reconciler_loop, ReconcilerLoopError};
    use crate::admin::AdminCommand;
    use crate::event::{ActionableEvent, AssigneeDescriptor};
    use crate::memory_gateway::{GatewayCall, InMemoryChatGateway};
    use crate::reconciler::{ReconcilerConfig, ThreadReconciler};

    fn reconciler(gateway: &Arc<InMemoryChatGateway>, channel: Option<u64>) -> ThreadReconciler {
        ThreadReconciler::new(
            gateway.clone(),
            TaskThreadStore::in_memory(),
            IdentityStore::in_memory(),
            ActiveChannelStore::in_memory(channel),
            ReconcilerConfig::default(),
        )
    }

    fn event(task_key: &str, assignee: Option<AssigneeDescriptor>) -> ActionableEvent {
        ActionableEvent {
            task_key: task_key.to_string(),
            summary: "Fix bug".to_string(),
            status_name: "Em andamento".to_string(),
            status_category: "In Progress".to_string(),
            assignee,
        }
    }

    #[test]
    fn unit_start_without_runtime_is_rejected() {
        let gateway = Arc::new(InMemoryChatGateway::new());
        let error = start_reconciler_loop(reconciler(&gateway, None)).expect_err("no runtime");
        assert_eq!(error, ReconcilerLoopError::NoRuntime);
    }

    #[tokio::test]
    async fn functional_burst_of_duplicates_creates_exactly_one_thread() {
        let gateway = Arc::new(InMemoryChatGateway::new());
        let (handle, reconciler_loop) =
            start_reconciler_loop(reconciler(&gateway, Some(10))).expect("loop");

        for _ in 0..5 {
            handle.submit(event("T-1", None)).expect("submit");
        }
        handle.barrier().await.expect("barrier");

        let creates = gateway
            .calls()
            .into_iter()
            .filter(|call| matches!(call, GatewayCall::CreateThread { .. }))
            .count();
        assert_eq!(creates, 1);
        assert!(reconciler_loop.is_running());
        reconciler_loop.shutdown().await.expect("reconciler back");
    }

    #[tokio::test]
    async fn functional_admin_mapping_applies_to_later_events() {
        let gateway = Arc::new(InMemoryChatGateway::new());
        let (handle, reconciler_loop) =
            start_reconciler_loop(reconciler(&gateway, Some(10))).expect("loop");

        let reply = handle
            .admin(AdminCommand::MapUser {
                tracker_identity: "@jdoe".to_string(),
                chat_user_id: "4242".to_string(),
            })
            .await
            .expect("admin reply");
        assert!(reply.contains("<@4242>"));

        let assignee =
            AssigneeDescriptor::new(None, None, Some("jdoe".to_string()), None, None);
        handle.submit(event("T-2", Some(assignee))).expect("submit");
        handle.barrier().await.expect("barrier");

        let thread = gateway.threads().pop().expect("thread");
        assert!(gateway
            .messages(thread.id)
            .iter()
            .any(|message| message.content == "<@4242>"));
        reconciler_loop.shutdown().await.expect("reconciler back");
    }

    #[tokio::test]
    async fn regression_shutdown_drains_queue_and_rejects_later_submissions() {
        let gateway = Arc::new(InMemoryChatGateway::new());
        let (handle, reconciler_loop) =
            start_reconciler_loop(reconciler(&gateway, Some(10))).expect("loop");

        handle.submit(event("T-3", None)).expect("submit");
        let reconciler = reconciler_loop.shutdown().await.expect("reconciler back");

        assert!(reconciler.task_threads().thread_for_task("T-3").is_some());
        assert!(handle.is_closed());
        assert_eq!(
            handle.submit(event("T-4", None)),
            Err(ReconcilerLoopError::Stopped)
        );
    }
}
