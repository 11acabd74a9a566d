//! Repository and conflict services backed by the `git` command line.

pub mod markers;
pub mod parse;
pub mod patch;
pub mod word_diff;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::conflict::{
    ConflictFile, ConflictResolution, ConflictService, ContinueOutcome, MergeBaseContent,
};
use crate::diff::{FileDiff, Hunk, HunkIdentifier, LineRange};
use crate::staging::RepositoryService;
use crate::{BackendError, GitCommandError};

use patch::PatchDirection;

/// Runs git in one working tree
#[derive(Debug, Clone)]
pub struct GitCli {
    config: Config,
    /// Top level of the working tree; git paths are relative to it
    workdir: PathBuf,
}

impl GitCli {
    /// Locate the working tree containing `config.repo_path`
    pub fn open(config: Config) -> Result<Self, GitCommandError> {
        let unresolved = Self {
            workdir: config.repo_path.clone(),
            config,
        };
        let toplevel = unresolved.run(&["rev-parse", "--show-toplevel"])?;
        let workdir = PathBuf::from(toplevel.trim_end());
        debug!(workdir = %workdir.display(), "opened repository");
        Ok(Self { workdir, ..unresolved })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.config.git_binary);
        cmd.current_dir(&self.workdir)
            .env("LC_ALL", "C")
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn output(&self, mut cmd: Command, args: &[&str]) -> Result<Output, GitCommandError> {
        debug!(args = ?args, "running git");
        cmd.output().map_err(|e| GitCommandError::SpawnFailed {
            command: args.join(" "),
            message: e.to_string(),
        })
    }

    fn check(output: Output, args: &[&str]) -> Result<String, GitCommandError> {
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GitCommandError::ExitError {
                command: args.join(" "),
                stderr,
            });
        }
        String::from_utf8(output.stdout).map_err(|e| GitCommandError::InvalidUtf8 {
            command: args.join(" "),
            message: e.to_string(),
        })
    }

    fn run(&self, args: &[&str]) -> Result<String, GitCommandError> {
        let output = self.output(self.command(args), args)?;
        Self::check(output, args)
    }

    fn run_with_stdin(&self, args: &[&str], input: &str) -> Result<String, GitCommandError> {
        let command = args.join(" ");
        let mut cmd = self.command(args);
        cmd.stdin(Stdio::piped());

        debug!(args = ?args, "running git with input");
        let mut child = cmd.spawn().map_err(|e| GitCommandError::SpawnFailed {
            command: command.clone(),
            message: e.to_string(),
        })?;

        {
            let stdin = child
                .stdin
                .as_mut()
                .ok_or_else(|| GitCommandError::StdinUnavailable {
                    command: command.clone(),
                })?;
            stdin
                .write_all(input.as_bytes())
                .map_err(|e| GitCommandError::StdinWriteFailed {
                    command: command.clone(),
                    message: e.to_string(),
                })?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| GitCommandError::SpawnFailed {
                command,
                message: e.to_string(),
            })?;
        Self::check(output, args)
    }

    fn read_file(&self, path: &str) -> Result<String, GitCommandError> {
        let full = self.workdir.join(path);
        fs::read_to_string(&full).map_err(|e| GitCommandError::FileAccess {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    fn write_file(&self, path: &str, content: &str) -> Result<(), GitCommandError> {
        let full = self.workdir.join(path);
        fs::write(&full, content).map_err(|e| GitCommandError::FileAccess {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    fn context_arg(&self) -> String {
        format!("-U{}", self.config.context_lines)
    }

    fn finish_diff(&self, output: &str) -> Result<Vec<FileDiff>, BackendError> {
        let mut files = parse::parse_unified_diff(output)?;
        if self.config.word_diff {
            word_diff::annotate(&mut files);
        }
        Ok(files)
    }

    fn fetch_diff(&self, path: Option<&str>, staged: bool) -> Result<Vec<FileDiff>, BackendError> {
        let context = self.context_arg();
        let mut args = vec!["diff", "--no-ext-diff", "--no-color", context.as_str()];
        if staged {
            args.push("--cached");
        }
        if let Some(path) = path {
            args.extend(["--", path]);
        }
        let output = self.run(&args)?;
        self.finish_diff(&output)
    }

    /// Re-fetch a file's diff and find the hunk with the given identifier
    fn find_hunk(
        &self,
        path: &str,
        staged: bool,
        id: &HunkIdentifier,
    ) -> Result<(FileDiff, Hunk), BackendError> {
        let files = self.fetch_diff(Some(path), staged)?;
        files
            .into_iter()
            .filter(|f| f.display_path() == Some(path))
            .find_map(|file| {
                let hunk = file.hunks.iter().find(|h| id.matches(h)).cloned()?;
                Some((file, hunk))
            })
            .ok_or_else(|| BackendError::HunkNotFound {
                path: path.to_string(),
                hunk: id.to_string(),
            })
    }

    fn apply(&self, patch: &str, flags: &[&str]) -> Result<(), BackendError> {
        let mut args = vec!["apply"];
        args.extend_from_slice(flags);
        if self.config.context_lines == 0 {
            args.push("--unidiff-zero");
        }
        self.run_with_stdin(&args, patch)?;
        Ok(())
    }

    fn apply_hunk(
        &self,
        path: &str,
        id: &HunkIdentifier,
        staged: bool,
        flags: &[&str],
    ) -> Result<(), BackendError> {
        let (file, hunk) = self.find_hunk(path, staged, id)?;
        let patch = patch::hunk_patch(&file, &hunk);
        self.apply(&patch, flags)
    }

    fn apply_lines(
        &self,
        path: &str,
        range: &LineRange,
        staged: bool,
        direction: PatchDirection,
        flags: &[&str],
    ) -> Result<(), BackendError> {
        let (_, hunk) = self.find_hunk(path, staged, &range.hunk)?;
        let selects_change = range
            .line_indices
            .iter()
            .any(|&i| hunk.lines.get(i).is_some_and(|l| l.kind.is_change()));
        if !selects_change {
            return Err(BackendError::Rejected {
                operation: "apply lines".to_string(),
                message: format!("no change lines selected in {} of {}", range.hunk, path),
            });
        }

        let patch = patch::line_patch(path, &hunk, &range.line_indices, direction);
        self.apply(&patch, flags)
    }

    /// Paths with unmerged index entries
    fn conflict_paths(&self) -> Result<Vec<String>, GitCommandError> {
        let output = self.run(&["diff", "--name-only", "--diff-filter=U"])?;
        let mut paths: Vec<String> = output.lines().map(str::to_string).collect();
        paths.dedup();
        Ok(paths)
    }

    fn git_path_exists(&self, name: &str) -> Result<bool, GitCommandError> {
        let path = self.run(&["rev-parse", "--git-path", name])?;
        Ok(self.workdir.join(path.trim_end()).exists())
    }

    /// Continue a rebase, cherry-pick or revert without opening an editor.
    /// Stopping on the next commit's conflicts is not an error.
    fn continue_sequence(&self, args: &[&str]) -> Result<ContinueOutcome, GitCommandError> {
        let mut cmd = self.command(args);
        cmd.env("GIT_EDITOR", "true");
        let output = self.output(cmd, args)?;
        if output.status.success() {
            return Ok(ContinueOutcome {
                completed: true,
                conflicts: Vec::new(),
            });
        }

        let text = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        if text.contains("CONFLICT") || text.contains("conflict") {
            let conflicts = self.conflict_paths()?;
            warn!(command = %args.join(" "), conflicts = conflicts.len(), "stopped on conflicts");
            return Ok(ContinueOutcome {
                completed: false,
                conflicts,
            });
        }

        Self::check(output, args)?;
        Ok(ContinueOutcome {
            completed: true,
            conflicts: Vec::new(),
        })
    }

    /// Index stages of an unmerged path as `(stage, blob id)` pairs
    fn unmerged_stages(&self, path: &str) -> Result<Vec<(u8, String)>, GitCommandError> {
        let output = self.run(&["ls-files", "-u", "-z", "--", path])?;
        let mut stages = Vec::new();
        for entry in output.split('\0').filter(|e| !e.is_empty()) {
            // <mode> SP <object> SP <stage> TAB <path>
            let Some((meta, entry_path)) = entry.split_once('\t') else {
                continue;
            };
            if entry_path != path {
                continue;
            }
            let mut fields = meta.split(' ');
            let (Some(_mode), Some(object), Some(stage)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            if let Ok(stage) = stage.parse::<u8>() {
                stages.push((stage, object.to_string()));
            }
        }
        Ok(stages)
    }
}

impl RepositoryService for GitCli {
    fn get_diff(&self, path: Option<&str>, staged: bool) -> Result<Vec<FileDiff>, BackendError> {
        self.fetch_diff(path, staged)
    }

    fn get_commit_file_diff(
        &self,
        commit_id: &str,
        path: &str,
    ) -> Result<Vec<FileDiff>, BackendError> {
        let context = self.context_arg();
        let output = self.run(&[
            "diff-tree",
            "-p",
            "-r",
            "--root",
            "--no-commit-id",
            "--no-color",
            context.as_str(),
            commit_id,
            "--",
            path,
        ])?;
        self.finish_diff(&output)
    }

    fn stage_hunk(&self, path: &str, hunk: &HunkIdentifier) -> Result<(), BackendError> {
        self.apply_hunk(path, hunk, false, &["--cached"])
    }

    fn unstage_hunk(&self, path: &str, hunk: &HunkIdentifier) -> Result<(), BackendError> {
        self.apply_hunk(path, hunk, true, &["--cached", "-R"])
    }

    fn discard_hunk(&self, path: &str, hunk: &HunkIdentifier) -> Result<(), BackendError> {
        self.apply_hunk(path, hunk, false, &["-R"])
    }

    fn stage_lines(&self, path: &str, range: &LineRange) -> Result<(), BackendError> {
        self.apply_lines(path, range, false, PatchDirection::Forward, &["--cached"])
    }

    fn unstage_lines(&self, path: &str, range: &LineRange) -> Result<(), BackendError> {
        self.apply_lines(path, range, true, PatchDirection::Reverse, &["--cached", "-R"])
    }

    fn discard_lines(&self, path: &str, range: &LineRange) -> Result<(), BackendError> {
        self.apply_lines(path, range, false, PatchDirection::Reverse, &["-R"])
    }
}

impl ConflictService for GitCli {
    fn get_conflict_files(&self) -> Result<Vec<ConflictFile>, BackendError> {
        let mut files = Vec::new();
        for path in self.conflict_paths()? {
            // Delete/modify conflicts leave no file with markers behind
            let content = match self.read_file(&path) {
                Ok(content) => content,
                Err(e) => {
                    debug!(path = %path, error = %e, "conflicted file unreadable");
                    String::new()
                }
            };
            let blocks = markers::parse_conflict_markers(&content);
            files.push(ConflictFile::new(path, blocks));
        }
        Ok(files)
    }

    fn resolve_conflict(
        &self,
        path: &str,
        resolution: &ConflictResolution,
    ) -> Result<(), BackendError> {
        let content = self.read_file(path)?;
        let resolved = markers::resolve_all(&content, resolution);
        self.write_file(path, &resolved)?;
        info!(path, "rewrote conflicted file");
        Ok(())
    }

    fn resolve_conflict_block(
        &self,
        path: &str,
        block_index: usize,
        resolution: &ConflictResolution,
    ) -> Result<(), BackendError> {
        let content = self.read_file(path)?;
        let resolved = markers::resolve_block(&content, block_index, resolution).ok_or_else(
            || BackendError::Rejected {
                operation: "resolve block".to_string(),
                message: format!("{} has no conflict block {}", path, block_index),
            },
        )?;
        self.write_file(path, &resolved)?;
        Ok(())
    }

    fn mark_resolved(&self, path: &str) -> Result<(), BackendError> {
        self.run(&["add", "--", path])?;
        Ok(())
    }

    fn abort_merge(&self) -> Result<(), BackendError> {
        self.run(&["merge", "--abort"])?;
        Ok(())
    }

    fn abort_rebase(&self) -> Result<(), BackendError> {
        self.run(&["rebase", "--abort"])?;
        Ok(())
    }

    fn continue_merge(&self, message: Option<&str>) -> Result<ContinueOutcome, BackendError> {
        let args: Vec<&str> = match message.filter(|m| !m.trim().is_empty()) {
            Some(message) => vec!["commit", "-m", message],
            None => vec!["commit", "--no-edit"],
        };
        let output = self.output(self.command(&args), &args)?;
        if output.status.success() {
            return Ok(ContinueOutcome {
                completed: true,
                conflicts: Vec::new(),
            });
        }

        let conflicts = self.conflict_paths()?;
        if conflicts.is_empty() {
            Self::check(output, &args)?;
        }
        warn!(conflicts = conflicts.len(), "merge commit blocked by conflicts");
        Ok(ContinueOutcome {
            completed: false,
            conflicts,
        })
    }

    fn continue_rebase(&self) -> Result<ContinueOutcome, BackendError> {
        Ok(self.continue_sequence(&["rebase", "--continue"])?)
    }

    fn abort_cherry_pick(&self) -> Result<(), BackendError> {
        self.run(&["cherry-pick", "--abort"])?;
        Ok(())
    }

    fn abort_revert(&self) -> Result<(), BackendError> {
        self.run(&["revert", "--abort"])?;
        Ok(())
    }

    fn continue_cherry_pick(&self) -> Result<ContinueOutcome, BackendError> {
        Ok(self.continue_sequence(&["cherry-pick", "--continue"])?)
    }

    fn continue_revert(&self) -> Result<ContinueOutcome, BackendError> {
        Ok(self.continue_sequence(&["revert", "--continue"])?)
    }

    fn is_rebasing(&self) -> Result<bool, BackendError> {
        Ok(self.git_path_exists("rebase-merge")? || self.git_path_exists("rebase-apply")?)
    }

    fn is_cherry_picking(&self) -> Result<bool, BackendError> {
        Ok(self.git_path_exists("CHERRY_PICK_HEAD")?)
    }

    fn is_reverting(&self) -> Result<bool, BackendError> {
        Ok(self.git_path_exists("REVERT_HEAD")?)
    }

    fn get_merge_base_content(&self, path: &str) -> Result<MergeBaseContent, BackendError> {
        let stages = self.unmerged_stages(path)?;
        if stages.is_empty() {
            return Err(BackendError::Rejected {
                operation: "merge base content".to_string(),
                message: format!("{} has no unmerged entries", path),
            });
        }

        let mut content = MergeBaseContent::default();
        for (stage, object) in stages {
            let blob = self.run(&["cat-file", "blob", &object])?;
            match stage {
                1 => content.base = Some(blob),
                2 => content.ours = Some(blob),
                3 => content.theirs = Some(blob),
                _ => debug!(path, stage, "ignoring index stage"),
            }
        }
        Ok(content)
    }
}
