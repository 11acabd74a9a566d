//! Parser for `git diff` unified output.

use crate::BackendError;
use crate::diff::{DiffLine, FileDiff, Hunk, HunkIdentifier, LineKind};

const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

struct OpenHunk {
    hunk: Hunk,
    old_remaining: u32,
    new_remaining: u32,
    old_lineno: u32,
    new_lineno: u32,
}

impl OpenHunk {
    fn is_complete(&self) -> bool {
        self.old_remaining == 0 && self.new_remaining == 0
    }

    fn push(&mut self, kind: LineKind, content: &str) {
        let line = match kind {
            LineKind::Context => {
                let line = DiffLine::context(content, self.old_lineno, self.new_lineno);
                self.old_lineno += 1;
                self.new_lineno += 1;
                self.old_remaining = self.old_remaining.saturating_sub(1);
                self.new_remaining = self.new_remaining.saturating_sub(1);
                line
            }
            LineKind::Deletion => {
                let line = DiffLine::deletion(content, self.old_lineno);
                self.old_lineno += 1;
                self.old_remaining = self.old_remaining.saturating_sub(1);
                line
            }
            _ => {
                let line = DiffLine::addition(content, self.new_lineno);
                self.new_lineno += 1;
                self.new_remaining = self.new_remaining.saturating_sub(1);
                line
            }
        };
        self.hunk.lines.push(line);
    }
}

/// Strip the `a/` or `b/` prefix; `/dev/null` means the side is absent
fn side_path(raw: &str, prefix: &str) -> Option<String> {
    let raw = raw.trim_end_matches('\t');
    let raw = raw
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(raw);
    if raw == "/dev/null" {
        return None;
    }
    Some(raw.strip_prefix(prefix).unwrap_or(raw).to_string())
}

/// Paths from `diff --git a/old b/new`, used when `---`/`+++` are absent
/// (binary files, mode-only changes)
fn header_paths(rest: &str) -> (Option<String>, Option<String>) {
    match rest.rfind(" b/") {
        Some(split) => (
            side_path(&rest[..split], "a/"),
            side_path(&rest[split + 1..], "b/"),
        ),
        None => (None, None),
    }
}

/// Parse unified diff text into file diffs.
///
/// Hunk bodies are read by the counts in their headers, so content lines
/// that look like headers (`--- x`, `+++ y`) are kept as content. Lines are
/// split on `\n` only; a `\r` stays part of the content.
pub fn parse_unified_diff(output: &str) -> Result<Vec<FileDiff>, BackendError> {
    let mut files: Vec<FileDiff> = Vec::new();
    let mut current: Option<OpenHunk> = None;

    let close_hunk = |files: &mut Vec<FileDiff>, current: &mut Option<OpenHunk>| {
        if let (Some(open), Some(file)) = (current.take(), files.last_mut()) {
            file.hunks.push(open.hunk);
        }
    };

    let body = output.strip_suffix('\n').unwrap_or(output);
    if body.is_empty() {
        return Ok(files);
    }

    for line in body.split('\n') {
        if line == NO_NEWLINE_MARKER {
            if let Some(last) = current.as_mut().and_then(|o| o.hunk.lines.last_mut()) {
                last.no_newline_at_eof = true;
            }
            continue;
        }

        if let Some(open) = current.as_mut().filter(|o| !o.is_complete()) {
            let (kind, content) = match line.as_bytes().first() {
                Some(b' ') => (LineKind::Context, &line[1..]),
                Some(b'-') => (LineKind::Deletion, &line[1..]),
                Some(b'+') => (LineKind::Addition, &line[1..]),
                // Some tools trim the lone space of an empty context line
                None => (LineKind::Context, ""),
                Some(_) => {
                    return Err(BackendError::Rejected {
                        operation: "parse diff".to_string(),
                        message: format!("unexpected line in hunk: {line}"),
                    });
                }
            };
            open.push(kind, content);
            continue;
        }

        if let Some(rest) = line.strip_prefix("diff --git ") {
            close_hunk(&mut files, &mut current);
            let (old_path, new_path) = header_paths(rest);
            files.push(FileDiff {
                old_path,
                new_path,
                hunks: Vec::new(),
            });
        } else if let Some(rest) = line.strip_prefix("--- ") {
            close_hunk(&mut files, &mut current);
            if let Some(file) = files.last_mut() {
                file.old_path = side_path(rest, "a/");
            }
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            if let Some(file) = files.last_mut() {
                file.new_path = side_path(rest, "b/");
            }
        } else if line.starts_with("@@ ") {
            close_hunk(&mut files, &mut current);
            let (id, _) =
                HunkIdentifier::parse_header(line).ok_or_else(|| BackendError::Rejected {
                    operation: "parse diff".to_string(),
                    message: format!("malformed hunk header: {line}"),
                })?;
            if files.is_empty() {
                files.push(FileDiff {
                    old_path: None,
                    new_path: None,
                    hunks: Vec::new(),
                });
            }
            current = Some(OpenHunk {
                hunk: Hunk {
                    header: line.to_string(),
                    old_start: id.old_start,
                    old_lines: id.old_lines,
                    new_start: id.new_start,
                    new_lines: id.new_lines,
                    lines: Vec::new(),
                },
                old_remaining: id.old_lines,
                new_remaining: id.new_lines,
                old_lineno: id.old_start,
                new_lineno: id.new_start,
            });
        }
        // index, mode, rename and binary lines carry nothing we model
    }

    close_hunk(&mut files, &mut current);
    Ok(files)
}
