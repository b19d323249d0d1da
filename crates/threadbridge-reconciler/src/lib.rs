//! Thread reconciliation engine for the Jira → Discord bridge.
//!
//! Decides, per actionable issue event, whether to create, update, or skip the
//! task's discussion thread, applies the assignee mention policy, and runs all
//! of it on one reconciler loop fed through a non-blocking queue.

pub mod admin;
pub mod event;
pub mod gateway;
pub mod identity;
pub mod memory_gateway;
pub mod mention;
pub mod reconciler;
pub mod runtime;
pub mod title;

pub use admin::AdminCommand;
pub use event::{ActionableEvent, AssigneeDescriptor};
pub use gateway::{ChatGateway, ChatMessage, ChatThread, GatewayError};
pub use identity::{resolve_identity, IdentityResolution};
pub use memory_gateway::{GatewayCall, InMemoryChatGateway, DRY_RUN_RETAINED_ENTRIES};
pub use mention::{apply_mention_policy, MentionOutcome};
pub use reconciler::{
    ReconcileOutcome, ReconcileStage, ReconcilerConfig, SkipReason, ThreadReconciler,
};
pub use runtime::{
    start_reconciler_loop, ReconcilerCommand, ReconcilerHandle, ReconcilerLoop,
    ReconcilerLoopError,
};
pub use title::{derive_thread_title, summary_from_thread_name, MAX_THREAD_TITLE_CHARS};
