//! Required-action resolution.
//!
//! This is where the safety policy lives: resources are idempotent and may be
//! reapplied, change scripts are not and a drifted one must never be rerun.

use regex::Regex;
use serde::Serialize;

use crate::error::{ConfigError, Result};

use super::diff::removed_lines;
use super::status::{ChangeStatus, DefinitionStatus, ResourceStatus};

/// Action that reconciles a definition with the live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequiredAction {
    /// Nothing to do.
    Noop,
    /// Create the missing object.
    Create,
    /// Run the change script.
    Apply,
    /// Recreate or alter the out-of-sync object.
    Reapply,
    /// Unsafe to resolve automatically.
    Error,
}

impl RequiredAction {
    /// Returns the wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Noop => "NOOP",
            Self::Create => "CREATE",
            Self::Apply => "APPLY",
            Self::Reapply => "REAPPLY",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for RequiredAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a status to its required action.
///
/// `DRIFTED` is always `ERROR`. Strict mode alone does not change the
/// outcome; see [`ActionPolicy`] for guarded reapplies.
#[must_use]
pub const fn resolve_action(status: DefinitionStatus, strict: bool) -> RequiredAction {
    match (status, strict) {
        (DefinitionStatus::Resource(ResourceStatus::NotYetApplied), _) => RequiredAction::Create,
        (DefinitionStatus::Resource(ResourceStatus::UpToDate), _)
        | (DefinitionStatus::Change(ChangeStatus::UpToDate), _) => RequiredAction::Noop,
        (DefinitionStatus::Resource(ResourceStatus::OutOfSync), false | true) => RequiredAction::Reapply,
        (DefinitionStatus::Change(ChangeStatus::NotYetApplied), _) => RequiredAction::Apply,
        (DefinitionStatus::Change(ChangeStatus::Drifted), _) => RequiredAction::Error,
    }
}

/// Patterns that make a reapply unsafe when they match a removed line.
#[derive(Debug, Clone, Default)]
pub struct ReapplyGuard {
    patterns: Vec<Regex>,
}

impl ReapplyGuard {
    /// Compiles guard patterns.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first invalid pattern.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .enumerate()
            .map(|(i, pattern)| {
                Regex::new(pattern.as_ref()).map_err(|e| {
                    ConfigError::validation(
                        format!("Invalid guard pattern '{}': {e}", pattern.as_ref()),
                        format!("strict_guards[{i}]"),
                    )
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Returns true if no patterns are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns true if any removed line of `difference` matches a pattern.
    #[must_use]
    pub fn blocks(&self, difference: &str) -> bool {
        removed_lines(difference).any(|line| self.patterns.iter().any(|p| p.is_match(line)))
    }
}

/// Strictness policy of a planning run.
#[derive(Debug, Clone, Default)]
pub struct ActionPolicy {
    strict: bool,
    guard: ReapplyGuard,
}

impl ActionPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(strict: bool, guard: ReapplyGuard) -> Self {
        Self { strict, guard }
    }

    /// Returns true in strict mode.
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    /// Resolves the action for `status`, escalating a guarded reapply to `ERROR`.
    #[must_use]
    pub fn resolve(&self, status: DefinitionStatus, difference: Option<&str>) -> RequiredAction {
        let action = resolve_action(status, self.strict);
        if action == RequiredAction::Reapply && self.strict && difference.is_some_and(|d| self.guard.blocks(d)) {
            return RequiredAction::Error;
        }
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [DefinitionStatus; 6] = [
        DefinitionStatus::Resource(ResourceStatus::NotYetApplied),
        DefinitionStatus::Resource(ResourceStatus::UpToDate),
        DefinitionStatus::Resource(ResourceStatus::OutOfSync),
        DefinitionStatus::Change(ChangeStatus::NotYetApplied),
        DefinitionStatus::Change(ChangeStatus::UpToDate),
        DefinitionStatus::Change(ChangeStatus::Drifted),
    ];

    #[test]
    fn test_action_table() {
        let expected = [
            RequiredAction::Create,
            RequiredAction::Noop,
            RequiredAction::Reapply,
            RequiredAction::Apply,
            RequiredAction::Noop,
            RequiredAction::Error,
        ];
        for strict in [false, true] {
            for (status, action) in ALL_STATUSES.iter().zip(expected) {
                assert_eq!(resolve_action(*status, strict), action, "{status} strict={strict}");
            }
        }
    }

    #[test]
    fn test_drift_is_error_regardless_of_policy() {
        let guard = ReapplyGuard::new(&["DROP"]).expect("valid pattern");
        for policy in [ActionPolicy::default(), ActionPolicy::new(true, guard)] {
            assert_eq!(
                policy.resolve(DefinitionStatus::Change(ChangeStatus::Drifted), Some("- a\n+ b")),
                RequiredAction::Error
            );
        }
    }

    #[test]
    fn test_guard_escalates_only_in_strict_mode() {
        let out_of_sync = DefinitionStatus::Resource(ResourceStatus::OutOfSync);
        let difference = "  CREATE TABLE `t` (\n-   `legacy` INT,\n    `id` INT NOT NULL\n  )";

        let guard = ReapplyGuard::new(&["`legacy`"]).expect("valid pattern");
        assert!(guard.blocks(difference));

        let strict = ActionPolicy::new(true, guard.clone());
        assert_eq!(strict.resolve(out_of_sync, Some(difference)), RequiredAction::Error);

        let relaxed = ActionPolicy::new(false, guard);
        assert_eq!(relaxed.resolve(out_of_sync, Some(difference)), RequiredAction::Reapply);
    }

    #[test]
    fn test_guard_ignores_added_and_shared_lines() {
        let guard = ReapplyGuard::new(&["`id`"]).expect("valid pattern");
        assert!(!guard.blocks("  `id` INT\n+ `name` TEXT"));
        assert!(!ReapplyGuard::default().blocks("- anything"));
        assert!(ReapplyGuard::default().is_empty());
    }

    #[test]
    fn test_invalid_guard_pattern() {
        let err = ReapplyGuard::new(&["ok", "DROP ("]).expect_err("unbalanced group should fail");
        assert!(err.to_string().contains("Invalid guard pattern 'DROP ('"));
    }
}
