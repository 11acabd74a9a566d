//! Multi-file, multi-block conflict resolution.
//!
//! Merges, rebases, cherry-picks and reverts all surface the same way: a list
//! of conflicted files, each with ordered blocks. A [`ConflictSession`] walks
//! the user through resolving every block, marking every file, and finally
//! continuing or aborting the operation.

pub mod file;
pub mod session;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::BackendError;

pub use file::{FilePhase, FileResolution};
pub use session::{ConflictSession, SessionState};

/// A delimited region where both sides changed the same lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictBlock {
    pub ours: String,
    pub theirs: String,
    /// Common ancestor text, present with `diff3` style markers
    pub base: Option<String>,
    /// 1-based line of the opening marker
    pub start_line: u32,
    /// 1-based line of the closing marker
    pub end_line: u32,
}

/// A conflicted file with its blocks in file order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictFile {
    pub path: String,
    pub conflict_count: usize,
    pub conflicts: Vec<ConflictBlock>,
}

impl ConflictFile {
    pub fn new(path: impl Into<String>, conflicts: Vec<ConflictBlock>) -> Self {
        Self {
            path: path.into(),
            conflict_count: conflicts.len(),
            conflicts,
        }
    }
}

/// Which text replaces a conflict block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
pub enum ConflictResolution {
    Ours,
    Theirs,
    /// Ours followed by theirs
    Both,
    /// Hand-edited replacement
    Manual(String),
}

impl ConflictResolution {
    /// Replacement text for `block`
    pub fn apply(&self, block: &ConflictBlock) -> String {
        match self {
            ConflictResolution::Ours => block.ours.clone(),
            ConflictResolution::Theirs => block.theirs.clone(),
            ConflictResolution::Both => format!("{}{}", block.ours, block.theirs),
            ConflictResolution::Manual(content) => content.clone(),
        }
    }
}

/// Whole-file versions of a conflicted path, one per side of the merge.
///
/// A side is `None` when the file does not exist there (added on one side,
/// deleted on the other).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MergeBaseContent {
    pub base: Option<String>,
    pub ours: Option<String>,
    pub theirs: Option<String>,
}

/// Result of continuing a conflicted operation
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContinueOutcome {
    /// False when the operation stopped on new conflicts
    pub completed: bool,
    /// Paths conflicted after the continue attempt
    pub conflicts: Vec<String>,
}

/// Backend operations behind conflict resolution.
///
/// `resolve_conflict_block` addresses blocks by their position among the
/// blocks still present in the working file.
pub trait ConflictService {
    fn get_conflict_files(&self) -> Result<Vec<ConflictFile>, BackendError>;

    /// Apply one resolution to every block of a file
    fn resolve_conflict(
        &self,
        path: &str,
        resolution: &ConflictResolution,
    ) -> Result<(), BackendError>;

    fn resolve_conflict_block(
        &self,
        path: &str,
        block_index: usize,
        resolution: &ConflictResolution,
    ) -> Result<(), BackendError>;

    /// Record the file as resolved (stage it)
    fn mark_resolved(&self, path: &str) -> Result<(), BackendError>;

    /// Common ancestor, ours and theirs versions of a whole conflicted file
    fn get_merge_base_content(&self, path: &str) -> Result<MergeBaseContent, BackendError>;

    fn abort_merge(&self) -> Result<(), BackendError>;
    fn abort_rebase(&self) -> Result<(), BackendError>;
    fn abort_cherry_pick(&self) -> Result<(), BackendError>;
    fn abort_revert(&self) -> Result<(), BackendError>;

    /// Conclude a merge, with git's prepared message when `message` is `None`
    fn continue_merge(&self, message: Option<&str>) -> Result<ContinueOutcome, BackendError>;
    fn continue_rebase(&self) -> Result<ContinueOutcome, BackendError>;
    fn continue_cherry_pick(&self) -> Result<ContinueOutcome, BackendError>;
    fn continue_revert(&self) -> Result<ContinueOutcome, BackendError>;

    fn is_rebasing(&self) -> Result<bool, BackendError>;
    fn is_cherry_picking(&self) -> Result<bool, BackendError>;
    fn is_reverting(&self) -> Result<bool, BackendError>;
}

/// The operation that stopped on conflicts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictOperation {
    #[default]
    Merge,
    Rebase,
    CherryPick,
    Revert,
}

impl ConflictOperation {
    /// Ask the service which operation is in progress. Anything that is not
    /// a rebase, cherry-pick or revert is handled as a merge.
    pub fn detect<S: ConflictService + ?Sized>(service: &S) -> Result<Self, BackendError> {
        if service.is_rebasing()? {
            Ok(ConflictOperation::Rebase)
        } else if service.is_cherry_picking()? {
            Ok(ConflictOperation::CherryPick)
        } else if service.is_reverting()? {
            Ok(ConflictOperation::Revert)
        } else {
            Ok(ConflictOperation::Merge)
        }
    }

    pub fn abort<S: ConflictService + ?Sized>(self, service: &S) -> Result<(), BackendError> {
        match self {
            ConflictOperation::Merge => service.abort_merge(),
            ConflictOperation::Rebase => service.abort_rebase(),
            ConflictOperation::CherryPick => service.abort_cherry_pick(),
            ConflictOperation::Revert => service.abort_revert(),
        }
    }

    /// Continue the operation. `message` is only used for merges; the others
    /// keep the message of the commit being replayed.
    pub fn conclude<S: ConflictService + ?Sized>(
        self,
        service: &S,
        message: Option<&str>,
    ) -> Result<ContinueOutcome, BackendError> {
        match self {
            ConflictOperation::Merge => service.continue_merge(message),
            ConflictOperation::Rebase => service.continue_rebase(),
            ConflictOperation::CherryPick => service.continue_cherry_pick(),
            ConflictOperation::Revert => service.continue_revert(),
        }
    }
}

impl fmt::Display for ConflictOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConflictOperation::Merge => "merge",
            ConflictOperation::Rebase => "rebase",
            ConflictOperation::CherryPick => "cherry-pick",
            ConflictOperation::Revert => "revert",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn block() -> ConflictBlock {
        ConflictBlock {
            ours: "ours\n".to_string(),
            theirs: "theirs\n".to_string(),
            base: None,
            start_line: 3,
            end_line: 7,
        }
    }

    #[test]
    fn resolutions_pick_text() {
        assert_eq!(ConflictResolution::Ours.apply(&block()), "ours\n");
        assert_eq!(ConflictResolution::Theirs.apply(&block()), "theirs\n");
        assert_eq!(ConflictResolution::Both.apply(&block()), "ours\ntheirs\n");
        assert_eq!(
            ConflictResolution::Manual("merged\n".to_string()).apply(&block()),
            "merged\n"
        );
    }

    #[test]
    fn resolution_serializes_tagged() {
        insta::assert_json_snapshot!(
            vec![
                ConflictResolution::Ours,
                ConflictResolution::Manual("x = 1;\n".to_string()),
            ],
            @r#"
        [
          {
            "type": "Ours"
          },
          {
            "type": "Manual",
            "content": "x = 1;\n"
          }
        ]
        "#
        );
    }

    #[test]
    fn resolution_deserializes_tagged() {
        let parsed: ConflictResolution =
            serde_json::from_str(r#"{"type":"Both"}"#).unwrap();
        assert_eq!(parsed, ConflictResolution::Both);

        let manual: ConflictResolution =
            serde_json::from_str(r#"{"type":"Manual","content":"a\nb\n"}"#).unwrap();
        assert_eq!(manual, ConflictResolution::Manual("a\nb\n".to_string()));
    }

    #[test]
    fn operation_names_match_git_commands() {
        assert_eq!(ConflictOperation::CherryPick.to_string(), "cherry-pick");
        assert_eq!(
            serde_json::to_string(&ConflictOperation::CherryPick).unwrap(),
            "\"cherry-pick\""
        );
        assert_eq!(ConflictOperation::Merge.to_string(), "merge");
    }
}
