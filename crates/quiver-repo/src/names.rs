//! Branch name validation.
//!
//! Valid names are at least 3 characters, start with an ASCII letter or
//! digit, and continue with letters, digits, `-`, `_`, or `.`. The rule is
//! deliberately narrow so names are safe in store paths and remote URLs.

use crate::error::{RepoError, RepoResult};

/// Validate a branch name, returning `Ok(())` if valid.
pub fn validate_branch_name(name: &str) -> RepoResult<()> {
    let invalid = || RepoError::InvalidBranchName {
        name: name.to_string(),
    };

    // The alphabet is ASCII-only, so byte length is a safe minimum check.
    if name.len() < 3 {
        return Err(invalid());
    }

    let mut chars = name.chars();
    if !chars.next().is_some_and(|first| first.is_ascii_alphanumeric()) {
        return Err(invalid());
    }

    if chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.')) {
        Ok(())
    } else {
        Err(invalid())
    }
}
