//! Read-only diff snapshot model.
//!
//! A repository service hands out `Vec<FileDiff>` snapshots. Nothing in this
//! crate mutates them; after any staging call the caller fetches a new one.

pub mod file;
pub mod hunk;

use serde::{Deserialize, Serialize};

use crate::highlight;

pub use file::{FileDiff, IndexedHunk, hunk_at, hunk_count, indexed_hunks};
pub use hunk::{Hunk, HunkIdentifier, LineRange};

/// Kind of a single diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Context,
    Addition,
    Deletion,
    FileHeader,
    HunkHeader,
}

impl LineKind {
    /// Whether lines of this kind can be staged individually
    pub fn is_change(self) -> bool {
        matches!(self, LineKind::Addition | LineKind::Deletion)
    }

    /// Unified diff prefix, `None` for header lines
    pub fn prefix(self) -> Option<char> {
        match self {
            LineKind::Context => Some(' '),
            LineKind::Addition => Some('+'),
            LineKind::Deletion => Some('-'),
            LineKind::FileHeader | LineKind::HunkHeader => None,
        }
    }
}

/// Fragment of a changed line, flagged when it differs from its counterpart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordSegment {
    pub text: String,
    pub highlighted: bool,
}

impl WordSegment {
    pub fn new(text: impl Into<String>, highlighted: bool) -> Self {
        Self {
            text: text.into(),
            highlighted,
        }
    }
}

/// A single line within a hunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub kind: LineKind,
    /// Line text without its trailing newline
    pub content: String,
    pub old_lineno: Option<u32>,
    pub new_lineno: Option<u32>,
    pub word_diff: Option<Vec<WordSegment>>,
    /// Set when git reported `\ No newline at end of file` after this line
    #[serde(default)]
    pub no_newline_at_eof: bool,
}

impl DiffLine {
    pub fn context(content: impl Into<String>, old_lineno: u32, new_lineno: u32) -> Self {
        Self::new(LineKind::Context, content, Some(old_lineno), Some(new_lineno))
    }

    pub fn addition(content: impl Into<String>, new_lineno: u32) -> Self {
        Self::new(LineKind::Addition, content, None, Some(new_lineno))
    }

    pub fn deletion(content: impl Into<String>, old_lineno: u32) -> Self {
        Self::new(LineKind::Deletion, content, Some(old_lineno), None)
    }

    fn new(
        kind: LineKind,
        content: impl Into<String>,
        old_lineno: Option<u32>,
        new_lineno: Option<u32>,
    ) -> Self {
        Self {
            kind,
            content: content.into(),
            old_lineno,
            new_lineno,
            word_diff: None,
            no_newline_at_eof: false,
        }
    }

    #[must_use]
    pub fn with_word_diff(mut self, segments: Vec<WordSegment>) -> Self {
        self.word_diff = Some(segments);
        self
    }
}

/// Format diffs for terminal display with the indices used to address them
///
/// Every hunk is prefixed with its global index and every line with its
/// local index, so `h-l` selection keys can be read straight off the output.
///
/// Example output:
/// ```text
/// gtk.nix:
///   #0 @@ -10,2 +10,2 @@
///      0  -    gtk.theme.name = "[-Adwaita-]";
///      1  +    gtk.theme.name = "{+Stylix+}";
/// ```
pub fn format_diff(diffs: &[FileDiff]) -> String {
    format_files(diffs, |result, _, hunk| {
        for (line_index, line) in hunk.lines.iter().enumerate() {
            let Some(prefix) = line.kind.prefix() else {
                continue;
            };
            let text = highlight::render_plain_text(&highlight::render_line(line));
            result.push_str(&format!("    {:>3}  {}{}\n", line_index, prefix, text));
        }
    })
}

/// Per file headings and globally numbered hunk headers shared by the text
/// layouts; `write_hunk` renders each hunk body.
///
/// Files without hunks (binary or mode-only changes) still get a line so they
/// do not vanish from the listing.
pub(crate) fn format_files(
    diffs: &[FileDiff],
    mut write_hunk: impl FnMut(&mut String, usize, &Hunk),
) -> String {
    let mut result = String::new();
    let mut index = 0;

    for file in diffs {
        if !result.is_empty() {
            result.push('\n');
        }
        let path = file.display_path().unwrap_or("<unknown>");
        if file.hunks.is_empty() {
            result.push_str(&format!("{}: (no textual changes)\n", path));
            continue;
        }

        result.push_str(path);
        result.push_str(":\n");
        for hunk in &file.hunks {
            result.push_str(&format!("  #{} {}\n", index, hunk.header));
            write_hunk(&mut result, index, hunk);
            index += 1;
        }
    }

    result
}
