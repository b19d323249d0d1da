#![no_main]

use libfuzzer_sys::fuzz_target;
use threadbridge_reconciler::{
    derive_thread_title, resolve_identity, IdentityResolution, MAX_THREAD_TITLE_CHARS,
};
use threadbridge_server::{is_actionable, JiraWebhookPayload, DEFAULT_IN_PROGRESS_STATUS};
use threadbridge_store::IdentityStore;

fuzz_target!(|data: &[u8]| {
    let Ok(payload) = JiraWebhookPayload::parse(data) else {
        return;
    };
    assert!(!payload.task_key().is_empty());
    let _ = is_actionable(
        payload.status_name(),
        payload.status_category(),
        DEFAULT_IN_PROGRESS_STATUS,
    );

    let event = payload.into_event();
    let title = derive_thread_title(&event.task_key, &event.summary);
    assert!(title.chars().count() <= MAX_THREAD_TITLE_CHARS);

    if let Some(assignee) = event.assignee {
        let directory = IdentityStore::in_memory();
        match resolve_identity(&assignee, &directory) {
            IdentityResolution::Fallback { label } => assert!(!label.trim().is_empty()),
            IdentityResolution::NoAssigneeInformation => assert!(assignee.is_empty()),
            IdentityResolution::Resolved { .. } => panic!("empty directory resolved an identity"),
        }
    }
});
