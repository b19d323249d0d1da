//! Normalised inputs handed from intake to the reconciler.

/// Identity fields of an issue assignee. Blank values are stored as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssigneeDescriptor {
    pub key: Option<String>,
    pub account_id: Option<String>,
    pub name: Option<String>,
    pub email_address: Option<String>,
    pub display_name: Option<String>,
}

impl AssigneeDescriptor {
    /// Builds a descriptor, trimming every field and dropping blank ones.
    pub fn new(
        key: Option<String>,
        account_id: Option<String>,
        name: Option<String>,
        email_address: Option<String>,
        display_name: Option<String>,
    ) -> Self {
        Self {
            key: non_blank(key),
            account_id: non_blank(account_id),
            name: non_blank(name),
            email_address: non_blank(email_address),
            display_name: non_blank(display_name),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates().is_empty()
    }

    /// Candidate identities by precedence: stable key, account id, username,
    /// email, display name. Duplicates keep their first (strongest) position.
    pub fn candidates(&self) -> Vec<&str> {
        let ordered = [
            self.key.as_deref(),
            self.account_id.as_deref(),
            self.name.as_deref(),
            self.email_address.as_deref(),
            self.display_name.as_deref(),
        ];
        let mut candidates: Vec<&str> = Vec::with_capacity(ordered.len());
        for candidate in ordered.into_iter().flatten() {
            if !candidate.is_empty() && !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
        candidates
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

/// An issue update that passed the "work has started" predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionableEvent {
    pub task_key: String,
    pub summary: String,
    pub status_name: String,
    pub status_category: String,
    pub assignee: Option<AssigneeDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::AssigneeDescriptor;

    #[test]
    fn unit_blank_fields_are_dropped() {
        let descriptor = AssigneeDescriptor::new(
            Some("  ".to_string()),
            None,
            Some(" jdoe ".to_string()),
            Some(String::new()),
            None,
        );
        assert_eq!(descriptor.key, None);
        assert_eq!(descriptor.name.as_deref(), Some("jdoe"));
        assert_eq!(descriptor.email_address, None);
        assert_eq!(descriptor.candidates(), vec!["jdoe"]);
    }

    #[test]
    fn unit_candidates_follow_precedence_and_deduplicate() {
        let descriptor = AssigneeDescriptor::new(
            Some("jdoe".to_string()),
            Some("acc-1".to_string()),
            Some("jdoe".to_string()),
            Some("jdoe@example.com".to_string()),
            Some("Jane Doe".to_string()),
        );
        assert_eq!(
            descriptor.candidates(),
            vec!["jdoe", "acc-1", "jdoe@example.com", "Jane Doe"]
        );
    }

    #[test]
    fn unit_default_descriptor_is_empty() {
        assert!(AssigneeDescriptor::default().is_empty());
    }
}
