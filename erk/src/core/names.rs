//! Naming rules for branches, slot worktrees, and placeholder branches.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::errors::StepError;

/// Directory-name prefix of pooled worktrees.
pub const SLOT_PREFIX: &str = "erk-slot-";

static SLOT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^erk-slot-(\d{2,})$").expect("slot pattern is valid")
});

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^__erk-slot-\d{2,}-placeholder__$").expect("placeholder pattern is valid")
});

/// Slot number for a worktree directory named `erk-slot-NN`.
pub fn slot_number(dir_name: &str) -> Option<u32> {
    SLOT_RE
        .captures(dir_name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Synthetic branch that occupies a released slot.
///
/// Placeholders never enter push/PR workflows, so they are always managed by
/// the plain git backend.
pub fn placeholder_branch(slot: u32) -> String {
    format!("__erk-slot-{slot:02}-placeholder__")
}

pub fn is_placeholder_branch(name: &str) -> bool {
    PLACEHOLDER_RE.is_match(name)
}

/// Reject names git would refuse or that would break generated scripts.
pub fn validate_branch_name(name: &str) -> Result<(), StepError> {
    let invalid = |reason: &str| -> Result<(), StepError> {
        Err(StepError::precondition(format!(
            "invalid branch name '{name}': {reason}"
        )))
    };
    if name.is_empty() {
        return invalid("must not be empty");
    }
    if name.starts_with('-') || name.starts_with('/') || name.ends_with('/') {
        return invalid("must not start with '-' or start/end with '/'");
    }
    if name.ends_with(".lock") || name.ends_with('.') {
        return invalid("must not end with '.lock' or '.'");
    }
    if name.contains("..") || name.contains("//") || name.contains("@{") {
        return invalid("must not contain '..', '//' or '@{'");
    }
    if name
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || "~^:?*[\\".contains(c))
    {
        return invalid("contains a character git does not allow");
    }
    if is_placeholder_branch(name) {
        return invalid("reserved for slot placeholders");
    }
    Ok(())
}

/// Directory name used for a branch's dedicated worktree.
pub fn worktree_dir_name(branch: &str) -> String {
    branch.replace('/', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_numbers_parse() {
        assert_eq!(slot_number("erk-slot-03"), Some(3));
        assert_eq!(slot_number("erk-slot-120"), Some(120));
        assert_eq!(slot_number("erk-slot-3"), None);
        assert_eq!(slot_number("feature-x"), None);
    }

    #[test]
    fn placeholder_round_trips_through_matcher() {
        let name = placeholder_branch(7);
        assert_eq!(name, "__erk-slot-07-placeholder__");
        assert!(is_placeholder_branch(&name));
        assert!(!is_placeholder_branch("feature-x"));
    }

    #[test]
    fn branch_name_rules() {
        assert!(validate_branch_name("feature-x").is_ok());
        assert!(validate_branch_name("user/feature.x_1").is_ok());
        let placeholder = placeholder_branch(1);
        for bad in ["", "-x", "a..b", "a b", "x.lock", "a~1", "dir/", placeholder.as_str()] {
            assert!(validate_branch_name(bad).is_err(), "expected '{bad}' to be rejected");
        }
    }

    #[test]
    fn worktree_dir_flattens_slashes() {
        assert_eq!(worktree_dir_name("user/feature"), "user-feature");
    }
}
