use serde::Serialize;
use tracing::{debug, info, warn};

use super::{
    ConflictFile, ConflictOperation, ConflictResolution, ConflictService, ContinueOutcome,
    FileResolution, MergeBaseContent,
};
use crate::ConflictError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    /// The merge or rebase was concluded
    Completed,
    Aborted,
}

/// One merge or rebase worth of conflict resolution.
///
/// The total number of files is fixed when the session opens. Files that
/// come back into conflict after a continue attempt lose their marked state
/// but never change the total.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictSession {
    operation: ConflictOperation,
    total: usize,
    files: Vec<FileResolution>,
    state: SessionState,
}

impl ConflictSession {
    /// Open a session over the service's current conflicts
    pub fn open<S: ConflictService + ?Sized>(service: &S) -> Result<Self, ConflictError> {
        let operation = ConflictOperation::detect(service)?;
        let files = service.get_conflict_files()?;
        info!(files = files.len(), %operation, "opened conflict session");
        Ok(Self::with_files(operation, &files))
    }

    pub fn with_files(operation: ConflictOperation, files: &[ConflictFile]) -> Self {
        Self {
            operation,
            total: files.len(),
            files: files.iter().map(FileResolution::new).collect(),
            state: SessionState::Active,
        }
    }

    pub fn operation(&self) -> ConflictOperation {
        self.operation
    }

    pub fn is_rebasing(&self) -> bool {
        self.operation == ConflictOperation::Rebase
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn files(&self) -> &[FileResolution] {
        &self.files
    }

    pub fn file(&self, path: &str) -> Option<&FileResolution> {
        self.files.iter().find(|f| f.path() == path)
    }

    pub fn total_count(&self) -> usize {
        self.total
    }

    /// Marked files, never more than the total
    pub fn resolved_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.is_marked())
            .count()
            .min(self.total)
    }

    /// Whether every conflicted file has been marked resolved
    pub fn can_continue(&self) -> bool {
        self.state == SessionState::Active
            && self.total > 0
            && self.resolved_count() == self.total
            && self.files.iter().all(FileResolution::is_marked)
    }

    /// First file not yet marked, in listing order
    pub fn next_unresolved(&self) -> Option<&FileResolution> {
        self.files.iter().find(|f| !f.is_marked())
    }

    pub fn progress_percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let resolved = self.resolved_count();
        ((resolved * 200 + self.total) / (2 * self.total)) as u8
    }

    /// Resolve one block of a file by its stable index
    pub fn resolve_block<S: ConflictService + ?Sized>(
        &mut self,
        service: &S,
        path: &str,
        index: usize,
        resolution: ConflictResolution,
    ) -> Result<(), ConflictError> {
        self.ensure_active()?;
        let file = self.file_mut(path)?;
        let backend_index = file.backend_index(index)?;

        debug!(path, index, backend_index, "resolving conflict block");
        service.resolve_conflict_block(path, backend_index, &resolution)?;
        file.record_block(index, resolution)?;
        info!(path, index, remaining = file.remaining(), "block resolved");

        self.refresh(service)
    }

    /// Resolve every remaining block of a file at once and mark it
    pub fn resolve_file<S: ConflictService + ?Sized>(
        &mut self,
        service: &S,
        path: &str,
        resolution: ConflictResolution,
    ) -> Result<(), ConflictError> {
        self.ensure_active()?;
        let file = self.file_mut(path)?;
        if file.is_marked() {
            return Err(ConflictError::AlreadyMarked {
                path: path.to_string(),
            });
        }

        service.resolve_conflict(path, &resolution)?;
        file.record_file(&resolution)?;
        service.mark_resolved(path)?;
        file.mark()?;
        info!(path, "file resolved");

        self.refresh(service)
    }

    /// Mark a file whose blocks are all resolved
    pub fn mark_resolved<S: ConflictService + ?Sized>(
        &mut self,
        service: &S,
        path: &str,
    ) -> Result<(), ConflictError> {
        self.ensure_active()?;
        let file = self.file_mut(path)?;
        file.check_markable()?;

        service.mark_resolved(path)?;
        file.mark()?;
        info!(path, "file marked resolved");

        self.refresh(service)
    }

    /// Re-read the conflict list and reconcile file state with it.
    ///
    /// Marked files are expected to drop out of the listing. Unmarked files
    /// that drop out were resolved outside the session.
    pub fn refresh<S: ConflictService + ?Sized>(&mut self, service: &S) -> Result<(), ConflictError> {
        let fresh = service.get_conflict_files()?;

        for file in &mut self.files {
            if !fresh.iter().any(|f| f.path == file.path()) && !file.is_marked() {
                info!(path = file.path(), "conflict resolved outside the session");
                file.mark_external();
            }
        }

        for conflict in &fresh {
            match self.files.iter().position(|f| f.path() == conflict.path) {
                Some(i) => self.files[i].reconcile(conflict),
                None => {
                    debug!(path = %conflict.path, "new conflicted file");
                    self.files.push(FileResolution::new(conflict));
                }
            }
        }

        Ok(())
    }

    /// Base, ours and theirs versions of a file in the session, for a
    /// three-way view whose result goes back in as a manual resolution
    pub fn merge_base_content<S: ConflictService + ?Sized>(
        &self,
        service: &S,
        path: &str,
    ) -> Result<MergeBaseContent, ConflictError> {
        self.ensure_active()?;
        if self.file(path).is_none() {
            return Err(ConflictError::UnknownFile {
                path: path.to_string(),
            });
        }
        Ok(service.get_merge_base_content(path)?)
    }

    /// Conclude the merge or rebase.
    ///
    /// When the backend stops on new conflicts the session stays active and
    /// the conflicted files are listed again.
    pub fn continue_session<S: ConflictService + ?Sized>(
        &mut self,
        service: &S,
        message: Option<&str>,
    ) -> Result<ContinueOutcome, ConflictError> {
        self.ensure_active()?;
        if !self.can_continue() {
            return Err(ConflictError::NotReadyToContinue {
                resolved: self.resolved_count(),
                total: self.total,
            });
        }

        let outcome = self.operation.conclude(service, message)?;

        if outcome.completed {
            info!(operation = %self.operation, "conflict session completed");
            self.state = SessionState::Completed;
        } else {
            warn!(conflicts = outcome.conflicts.len(), "continue stopped on new conflicts");
            self.refresh(service)?;
        }

        Ok(outcome)
    }

    /// Abort the underlying merge, rebase, cherry-pick or revert
    pub fn abort<S: ConflictService + ?Sized>(&mut self, service: &S) -> Result<(), ConflictError> {
        self.ensure_active()?;
        self.operation.abort(service)?;
        info!(operation = %self.operation, "conflict session aborted");
        self.state = SessionState::Aborted;
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), ConflictError> {
        match self.state {
            SessionState::Active => Ok(()),
            _ => Err(ConflictError::SessionClosed),
        }
    }

    fn file_mut(&mut self, path: &str) -> Result<&mut FileResolution, ConflictError> {
        self.files
            .iter_mut()
            .find(|f| f.path() == path)
            .ok_or_else(|| ConflictError::UnknownFile {
                path: path.to_string(),
            })
    }
}
