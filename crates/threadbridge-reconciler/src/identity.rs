//! Assignee → chat user resolution.

use threadbridge_store::IdentityDirectory;

use crate::event::AssigneeDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityResolution {
    Resolved {
        chat_user_id: String,
        matched_identity: String,
    },
    /// No candidate is mapped; `label` is what humans should see instead.
    Fallback { label: String },
    /// The descriptor carried no usable identity field at all.
    NoAssigneeInformation,
}

/// Probes `directory` with the assignee's candidates in precedence order.
///
/// First match wins: a stable-key hit is returned even when the display name
/// maps somewhere else.
pub fn resolve_identity(
    assignee: &AssigneeDescriptor,
    directory: &dyn IdentityDirectory,
) -> IdentityResolution {
    let candidates = assignee.candidates();
    let Some(&first_candidate) = candidates.first() else {
        return IdentityResolution::NoAssigneeInformation;
    };

    for candidate in &candidates {
        if let Some(chat_user_id) = directory.chat_user_for(candidate) {
            return IdentityResolution::Resolved {
                chat_user_id: chat_user_id.to_string(),
                matched_identity: (*candidate).to_string(),
            };
        }
    }

    let label = assignee
        .display_name
        .as_deref()
        .unwrap_or(first_candidate)
        .to_string();
    IdentityResolution::Fallback { label }
}
