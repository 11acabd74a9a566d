//! Interactive diff staging and conflict resolution engine.
//!
//! The crate consumes hunk-based file differences produced by a
//! [`RepositoryService`] and offers hunk and line level stage, unstage and
//! discard operations, a split (two column) view of hunks, word level change
//! highlighting, and a multi-file conflict resolution workflow on top of a
//! [`ConflictService`].
//!
//! [`GitCli`] implements both services by driving the `git` command line.

use error_set::error_set;

pub mod config;
pub mod conflict;
pub mod diff;
pub mod git;
pub mod highlight;
pub mod selection;
pub mod split;
pub mod staging;
pub mod viewer;

pub use config::Config;
pub use conflict::{
    ConflictBlock, ConflictFile, ConflictOperation, ConflictResolution, ConflictService,
    ConflictSession, ContinueOutcome, FilePhase, FileResolution, MergeBaseContent, SessionState,
};
pub use diff::{DiffLine, FileDiff, Hunk, HunkIdentifier, LineKind, LineRange, WordSegment};
pub use git::GitCli;
pub use selection::{Selection, SelectionKey, SelectionKeyError};
pub use split::{SplitCell, SplitRow, SplitRowKind, build_split_rows};
pub use staging::{RepositoryService, StagingAction, StagingDispatcher};
pub use viewer::{DiffTarget, DiffViewer, FetchOutcome, FetchTicket, RequestGeneration};

error_set! {
    /// Top-level error for hunkwise operations
    HunkwiseError := {
        #[display("No changes found in {path}")]
        NoChanges { path: String },
        #[display("Failed to read {path}: {message}")]
        ReadInput { path: String, message: String },
        #[display("Failed to write output: {message}")]
        WriteOutput { message: String },
        SelectionKeyError(SelectionKeyError),
    } || StagingError || ConflictError

    /// Errors from hunk addressing and staging dispatch
    StagingError := {
        #[display("Hunk {index} does not exist ({count} hunks shown)")]
        HunkIndexOutOfRange { index: usize, count: usize },
        #[display("No lines selected in hunk {index}")]
        NoLinesSelected { index: usize },
        #[display("Line {line} of hunk {hunk} is not an addition or deletion")]
        NotAChangeLine { hunk: String, line: usize },
        #[display("Line {line} is outside hunk {hunk}")]
        LineOutOfRange { hunk: String, line: usize },
        #[display("{action} is not available for {view} changes")]
        ActionUnavailable { action: String, view: String },
        #[display("Commit diffs are read-only")]
        ReadOnlySnapshot,
        #[display("Diff has no file path")]
        NoFilePath,
    } || BackendError

    /// Errors from the conflict resolution workflow
    ConflictError := {
        #[display("{path} is not part of the conflict session")]
        UnknownFile { path: String },
        #[display("Block {index} does not exist in {path} ({count} blocks)")]
        BlockOutOfRange { path: String, index: usize, count: usize },
        #[display("Block {index} of {path} is already resolved")]
        BlockAlreadyResolved { path: String, index: usize },
        #[display("{path} still has {remaining} unresolved blocks")]
        BlocksRemaining { path: String, remaining: usize },
        #[display("{path} is already marked as resolved")]
        AlreadyMarked { path: String },
        #[display("Cannot continue: {resolved} of {total} files resolved")]
        NotReadyToContinue { resolved: usize, total: usize },
        #[display("The conflict session has ended")]
        SessionClosed,
    } || BackendError

    /// Failures reported by a repository service
    BackendError := {
        #[display("{operation} rejected: {message}")]
        Rejected { operation: String, message: String },
        #[display("Hunk {hunk} not found in {path}; refresh the diff")]
        HunkNotFound { path: String, hunk: String },
    } || GitCommandError

    /// Errors from git command execution
    GitCommandError := {
        #[display("Failed to run git {command}: {message}")]
        SpawnFailed { command: String, message: String },
        #[display("git {command} failed: {stderr}")]
        ExitError { command: String, stderr: String },
        #[display("Invalid UTF-8 in git {command} output: {message}")]
        InvalidUtf8 { command: String, message: String },
        #[display("Failed to get stdin handle for git {command}")]
        StdinUnavailable { command: String },
        #[display("Failed to write to git {command}: {message}")]
        StdinWriteFailed { command: String, message: String },
        #[display("Failed to access {path}: {message}")]
        FileAccess { path: String, message: String },
    }
}
