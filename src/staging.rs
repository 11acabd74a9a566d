//! Staging dispatch onto a repository service.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::diff::{FileDiff, Hunk, HunkIdentifier, LineRange};
use crate::selection::Selection;
use crate::{BackendError, StagingError};

/// Source of diff snapshots and sink for staging operations.
///
/// Implementations own the working tree and index; callers never mutate
/// either directly and re-fetch after every successful call since hunk
/// identifiers shift.
pub trait RepositoryService {
    /// Working tree diff against the index (`staged == false`) or index
    /// against HEAD (`staged == true`), optionally restricted to one path
    fn get_diff(&self, path: Option<&str>, staged: bool) -> Result<Vec<FileDiff>, BackendError>;

    /// Changes a commit made to one file
    fn get_commit_file_diff(
        &self,
        commit_id: &str,
        path: &str,
    ) -> Result<Vec<FileDiff>, BackendError>;

    fn stage_hunk(&self, path: &str, hunk: &HunkIdentifier) -> Result<(), BackendError>;
    fn unstage_hunk(&self, path: &str, hunk: &HunkIdentifier) -> Result<(), BackendError>;
    fn discard_hunk(&self, path: &str, hunk: &HunkIdentifier) -> Result<(), BackendError>;

    fn stage_lines(&self, path: &str, range: &LineRange) -> Result<(), BackendError>;
    fn unstage_lines(&self, path: &str, range: &LineRange) -> Result<(), BackendError>;
    fn discard_lines(&self, path: &str, range: &LineRange) -> Result<(), BackendError>;
}

/// What to do with a hunk or a set of lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingAction {
    /// Copy working tree changes into the index
    Stage,
    /// Remove changes from the index, keeping them in the working tree
    Unstage,
    /// Revert working tree changes
    Discard,
}

impl StagingAction {
    /// Whether the action makes sense for the staged or unstaged view.
    ///
    /// Staged changes can only be unstaged; unstaged changes can be staged
    /// or discarded.
    pub fn applies_to(self, staged: bool) -> bool {
        match self {
            StagingAction::Unstage => staged,
            StagingAction::Stage | StagingAction::Discard => !staged,
        }
    }

    /// Reject the action when it does not apply to the view
    pub fn check_view(self, staged: bool) -> Result<(), StagingError> {
        if self.applies_to(staged) {
            Ok(())
        } else {
            Err(StagingError::ActionUnavailable {
                action: self.to_string(),
                view: if staged { "staged" } else { "unstaged" }.to_string(),
            })
        }
    }
}

impl fmt::Display for StagingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StagingAction::Stage => "stage",
            StagingAction::Unstage => "unstage",
            StagingAction::Discard => "discard",
        };
        f.write_str(name)
    }
}

/// Build the line range for the selected lines of one hunk
pub fn line_range_for(
    hunk: &Hunk,
    hunk_index: usize,
    selection: &Selection,
) -> Result<LineRange, StagingError> {
    let indices = selection.collect_indices(hunk_index);
    if indices.is_empty() {
        return Err(StagingError::NoLinesSelected { index: hunk_index });
    }
    hunk.line_range(indices)
}

/// Forwards staging requests to a [`RepositoryService`].
///
/// Calls are passed through unchanged; there is no retry and no local
/// bookkeeping. Callers refresh their snapshot after a successful call.
pub struct StagingDispatcher<'a, S: RepositoryService + ?Sized> {
    service: &'a S,
}

impl<'a, S: RepositoryService + ?Sized> StagingDispatcher<'a, S> {
    pub fn new(service: &'a S) -> Self {
        Self { service }
    }

    pub fn stage_hunk(&self, path: &str, hunk: &HunkIdentifier) -> Result<(), BackendError> {
        self.apply_hunk(StagingAction::Stage, path, hunk)
    }

    pub fn unstage_hunk(&self, path: &str, hunk: &HunkIdentifier) -> Result<(), BackendError> {
        self.apply_hunk(StagingAction::Unstage, path, hunk)
    }

    pub fn discard_hunk(&self, path: &str, hunk: &HunkIdentifier) -> Result<(), BackendError> {
        self.apply_hunk(StagingAction::Discard, path, hunk)
    }

    pub fn stage_lines(&self, path: &str, range: &LineRange) -> Result<(), BackendError> {
        self.apply_lines(StagingAction::Stage, path, range)
    }

    pub fn unstage_lines(&self, path: &str, range: &LineRange) -> Result<(), BackendError> {
        self.apply_lines(StagingAction::Unstage, path, range)
    }

    pub fn discard_lines(&self, path: &str, range: &LineRange) -> Result<(), BackendError> {
        self.apply_lines(StagingAction::Discard, path, range)
    }

    pub fn apply_hunk(
        &self,
        action: StagingAction,
        path: &str,
        hunk: &HunkIdentifier,
    ) -> Result<(), BackendError> {
        debug!(%action, path, %hunk, "dispatching hunk");
        let result = match action {
            StagingAction::Stage => self.service.stage_hunk(path, hunk),
            StagingAction::Unstage => self.service.unstage_hunk(path, hunk),
            StagingAction::Discard => self.service.discard_hunk(path, hunk),
        };
        log_outcome(action, path, "hunk", &result);
        result
    }

    pub fn apply_lines(
        &self,
        action: StagingAction,
        path: &str,
        range: &LineRange,
    ) -> Result<(), BackendError> {
        debug!(%action, path, hunk = %range.hunk, lines = ?range.line_indices, "dispatching lines");
        let result = match action {
            StagingAction::Stage => self.service.stage_lines(path, range),
            StagingAction::Unstage => self.service.unstage_lines(path, range),
            StagingAction::Discard => self.service.discard_lines(path, range),
        };
        log_outcome(action, path, "lines", &result);
        result
    }
}

fn log_outcome(action: StagingAction, path: &str, scope: &str, result: &Result<(), BackendError>) {
    match result {
        Ok(()) => info!(%action, path, scope, "applied"),
        Err(e) => warn!(%action, path, scope, error = %e, "service rejected request"),
    }
}
