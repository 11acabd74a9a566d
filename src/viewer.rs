//! Diff viewer state: the current snapshot, its selection, and the ordering
//! of fetches and staging calls.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::diff::{FileDiff, hunk_at, hunk_count};
use crate::selection::{Selection, SelectionKey};
use crate::staging::{RepositoryService, StagingAction, StagingDispatcher, line_range_for};
use crate::{BackendError, StagingError};

/// What a viewer shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiffTarget {
    /// Uncommitted changes, either unstaged or staged
    WorkingTree { path: Option<String>, staged: bool },
    /// One file of a commit, read-only
    Commit { commit_id: String, path: String },
}

impl DiffTarget {
    pub fn fetch<S: RepositoryService + ?Sized>(
        &self,
        service: &S,
    ) -> Result<Vec<FileDiff>, BackendError> {
        match self {
            DiffTarget::WorkingTree { path, staged } => service.get_diff(path.as_deref(), *staged),
            DiffTarget::Commit { commit_id, path } => {
                service.get_commit_file_diff(commit_id, path)
            }
        }
    }

    fn staged(&self) -> Result<bool, StagingError> {
        match self {
            DiffTarget::WorkingTree { staged, .. } => Ok(*staged),
            DiffTarget::Commit { .. } => Err(StagingError::ReadOnlySnapshot),
        }
    }
}

/// Token identifying one fetch request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchTicket(u64);

/// Monotonic counter deciding which fetch response is the latest.
///
/// Owned by the component issuing the fetches.
#[derive(Debug, Clone, Default)]
pub struct RequestGeneration {
    latest: u64,
}

impl RequestGeneration {
    /// Start a request, superseding every earlier ticket
    pub fn begin(&mut self) -> FetchTicket {
        self.latest += 1;
        FetchTicket(self.latest)
    }

    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        ticket.0 == self.latest
    }
}

/// Whether a fetch response replaced the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// A newer request was started before this one finished
    Superseded,
}

/// Owns one diff snapshot and the selection made against it
#[derive(Debug, Clone)]
pub struct DiffViewer {
    target: DiffTarget,
    files: Vec<FileDiff>,
    selection: Selection,
    generation: RequestGeneration,
    pending: Option<FetchTicket>,
}

impl DiffViewer {
    pub fn new(target: DiffTarget) -> Self {
        Self {
            target,
            files: Vec::new(),
            selection: Selection::new(),
            generation: RequestGeneration::default(),
            pending: None,
        }
    }

    pub fn target(&self) -> &DiffTarget {
        &self.target
    }

    pub fn files(&self) -> &[FileDiff] {
        &self.files
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Commit diffs offer no staging actions and no checkboxes
    pub fn is_read_only(&self) -> bool {
        matches!(self.target, DiffTarget::Commit { .. })
    }

    /// True while the latest request has not finished
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Point the viewer at something else. The old snapshot is dropped and
    /// any request still in flight becomes stale.
    pub fn set_target(&mut self, target: DiffTarget) {
        self.target = target;
        self.replace_files(Vec::new());
        self.pending = None;
        self.generation.begin();
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        let ticket = self.generation.begin();
        self.pending = Some(ticket);
        ticket
    }

    /// Apply a fetch response if `ticket` is still the latest request.
    ///
    /// Stale responses are dropped, errors included.
    pub fn finish_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<FileDiff>, BackendError>,
    ) -> Result<FetchOutcome, BackendError> {
        if !self.generation.is_current(ticket) {
            debug!(?ticket, "discarding superseded diff response");
            return Ok(FetchOutcome::Superseded);
        }
        self.pending = None;

        let files = result?;
        self.replace_files(files);
        Ok(FetchOutcome::Applied)
    }

    /// Fetch the target and replace the snapshot
    pub fn refresh<S: RepositoryService + ?Sized>(
        &mut self,
        service: &S,
    ) -> Result<FetchOutcome, BackendError> {
        let ticket = self.begin_fetch();
        let result = self.target.fetch(service);
        self.finish_fetch(ticket, result)
    }

    /// Install a new snapshot. The selection is always cleared, even when
    /// the new snapshot equals the old one.
    pub fn replace_files(&mut self, files: Vec<FileDiff>) {
        self.files = files;
        self.selection.clear();
    }

    /// Toggle the checkbox of one line
    pub fn toggle_line(&mut self, key: SelectionKey) -> Result<(), StagingError> {
        self.target.staged()?;
        let indexed = self.indexed(key.hunk)?;
        indexed.hunk.line_range([key.line])?;
        self.selection.toggle(key);
        Ok(())
    }

    /// Stage, unstage or discard a whole hunk, then refresh
    pub fn apply_hunk<S: RepositoryService + ?Sized>(
        &mut self,
        service: &S,
        hunk_index: usize,
        action: StagingAction,
    ) -> Result<FetchOutcome, StagingError> {
        action.check_view(self.target.staged()?)?;
        let indexed = self.indexed(hunk_index)?;
        let path = indexed.file.display_path().ok_or(StagingError::NoFilePath)?;
        let id = indexed.hunk.identifier();

        StagingDispatcher::new(service).apply_hunk(action, path, &id)?;
        info!(%action, hunk = hunk_index, "hunk applied, refreshing");
        Ok(self.refresh(service)?)
    }

    /// Apply an action to the selected lines of one hunk, then refresh
    pub fn apply_selected_lines<S: RepositoryService + ?Sized>(
        &mut self,
        service: &S,
        hunk_index: usize,
        action: StagingAction,
    ) -> Result<FetchOutcome, StagingError> {
        action.check_view(self.target.staged()?)?;
        let indexed = self.indexed(hunk_index)?;
        let path = indexed.file.display_path().ok_or(StagingError::NoFilePath)?;
        let range = line_range_for(indexed.hunk, hunk_index, &self.selection)?;

        StagingDispatcher::new(service).apply_lines(action, path, &range)?;
        info!(%action, hunk = hunk_index, lines = range.line_indices.len(), "lines applied, refreshing");
        Ok(self.refresh(service)?)
    }

    /// Apply an action to every selected line across all hunks, then refresh
    /// once.
    ///
    /// Hunks are dispatched from the last to the first so the identifiers of
    /// hunks not yet sent stay valid. If a dispatch fails after earlier ones
    /// went through, the snapshot is refreshed before the error is returned.
    pub fn apply_selection<S: RepositoryService + ?Sized>(
        &mut self,
        service: &S,
        action: StagingAction,
    ) -> Result<FetchOutcome, StagingError> {
        action.check_view(self.target.staged()?)?;

        let mut requests = Vec::new();
        for hunk_index in self.selection.hunks() {
            let indexed = self.indexed(hunk_index)?;
            let path = indexed.file.display_path().ok_or(StagingError::NoFilePath)?;
            let range = line_range_for(indexed.hunk, hunk_index, &self.selection)?;
            requests.push((path.to_string(), range));
        }
        if requests.is_empty() {
            return Err(StagingError::NoLinesSelected { index: 0 });
        }

        let dispatcher = StagingDispatcher::new(service);
        for (applied, (path, range)) in requests.iter().rev().enumerate() {
            if let Err(e) = dispatcher.apply_lines(action, path, range) {
                if applied > 0 {
                    warn!(applied, error = %e, "selection partially applied, refreshing");
                    self.refresh(service)?;
                }
                return Err(e.into());
            }
        }

        Ok(self.refresh(service)?)
    }

    fn indexed(&self, hunk_index: usize) -> Result<crate::diff::IndexedHunk<'_>, StagingError> {
        hunk_at(&self.files, hunk_index).ok_or(StagingError::HunkIndexOutOfRange {
            index: hunk_index,
            count: hunk_count(&self.files),
        })
    }
}
