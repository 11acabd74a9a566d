//! Two column (old | new) layout of a unified hunk.

use serde::Serialize;

use crate::diff::{DiffLine, FileDiff, Hunk, LineKind, format_files};
use crate::highlight::{render_line, render_plain_text};

/// One side of a split row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitCell<'a> {
    /// Index of the line within its hunk, the `l` of an `h-l` key
    pub index: usize,
    pub line: &'a DiffLine,
    /// Whether the cell offers a selection checkbox
    pub selectable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitRowKind {
    Context,
    Modify,
    Remove,
    Add,
}

/// A row of the split view; either side may be empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitRow<'a> {
    pub left: Option<SplitCell<'a>>,
    pub right: Option<SplitCell<'a>>,
}

impl SplitRow<'_> {
    pub fn kind(&self) -> SplitRowKind {
        let is_context = |cell: &Option<SplitCell<'_>>| {
            cell.is_some_and(|c| c.line.kind == LineKind::Context)
        };
        if is_context(&self.left) || is_context(&self.right) {
            return SplitRowKind::Context;
        }
        match (self.left.is_some(), self.right.is_some()) {
            (true, true) => SplitRowKind::Modify,
            (true, false) => SplitRowKind::Remove,
            _ => SplitRowKind::Add,
        }
    }
}

/// Lay out a hunk as aligned rows.
///
/// Context lines appear on both sides. A run of deletions directly followed
/// by a run of additions is paired positionally: the i-th deletion sits next
/// to the i-th addition and the longer run continues with empty cells on the
/// other side. Header lines are skipped.
pub fn build_split_rows(hunk: &Hunk) -> Vec<SplitRow<'_>> {
    let mut rows = Vec::with_capacity(hunk.lines.len());
    let mut pending_removes: Vec<(usize, &DiffLine)> = Vec::new();
    let mut pending_adds: Vec<(usize, &DiffLine)> = Vec::new();

    fn flush<'a>(
        rows: &mut Vec<SplitRow<'a>>,
        removes: &mut Vec<(usize, &'a DiffLine)>,
        adds: &mut Vec<(usize, &'a DiffLine)>,
    ) {
        let pairs = removes.len().max(adds.len());
        for i in 0..pairs {
            let cell = |&(index, line): &(usize, &'a DiffLine)| SplitCell {
                index,
                line,
                selectable: true,
            };
            rows.push(SplitRow {
                left: removes.get(i).map(cell),
                right: adds.get(i).map(cell),
            });
        }
        removes.clear();
        adds.clear();
    }

    for (index, line) in hunk.lines.iter().enumerate() {
        match line.kind {
            LineKind::Context => {
                flush(&mut rows, &mut pending_removes, &mut pending_adds);
                let cell = SplitCell {
                    index,
                    line,
                    selectable: false,
                };
                rows.push(SplitRow {
                    left: Some(cell),
                    right: Some(cell),
                });
            }
            LineKind::Deletion => {
                // Deletions after additions start a new group
                if !pending_adds.is_empty() {
                    flush(&mut rows, &mut pending_removes, &mut pending_adds);
                }
                pending_removes.push((index, line));
            }
            LineKind::Addition => pending_adds.push((index, line)),
            LineKind::FileHeader | LineKind::HunkHeader => {}
        }
    }

    flush(&mut rows, &mut pending_removes, &mut pending_adds);
    rows
}

fn render_cell(cell: Option<SplitCell<'_>>, hunk_index: usize) -> String {
    let Some(cell) = cell else {
        return String::new();
    };
    let lineno = match cell.line.kind {
        LineKind::Addition => cell.line.new_lineno,
        _ => cell.line.old_lineno,
    };
    let lineno = lineno.map(|n| n.to_string()).unwrap_or_default();
    let text = render_plain_text(&render_line(cell.line));
    if cell.selectable {
        let key = format!("{}-{}", hunk_index, cell.index);
        format!("{:>4} {:>6} {}", lineno, key, text)
    } else {
        format!("{:>4} {:>6} {}", lineno, "", text)
    }
}

fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        text.chars().take(width).collect()
    } else {
        format!("{}{}", text, " ".repeat(width - len))
    }
}

/// Format diffs as two columns, labelling selectable cells with their key
pub fn format_split(diffs: &[FileDiff], column_width: usize) -> String {
    format_files(diffs, |result, hunk_index, hunk| {
        for row in build_split_rows(hunk) {
            let left = pad(&render_cell(row.left, hunk_index), column_width);
            let right = render_cell(row.right, hunk_index);
            result.push_str(format!("{} | {}", left, right).trim_end());
            result.push('\n');
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use similar_asserts::assert_eq;

    fn kinds(rows: &[SplitRow<'_>]) -> Vec<SplitRowKind> {
        rows.iter().map(SplitRow::kind).collect()
    }

    #[test]
    fn unequal_runs_pad_shorter_side() {
        let hunk = Hunk::from_lines(
            1,
            1,
            vec![
                DiffLine::deletion("a", 1),
                DiffLine::deletion("b", 2),
                DiffLine::addition("A", 1),
                DiffLine::addition("B", 2),
                DiffLine::addition("C", 3),
            ],
        );

        let rows = build_split_rows(&hunk);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].left.unwrap().index, 0);
        assert_eq!(rows[0].right.unwrap().index, 2);
        assert_eq!(rows[1].left.unwrap().index, 1);
        assert_eq!(rows[1].right.unwrap().index, 3);
        assert!(rows[2].left.is_none());
        assert_eq!(rows[2].right.unwrap().line.content, "C");
        assert_eq!(
            kinds(&rows),
            vec![SplitRowKind::Modify, SplitRowKind::Modify, SplitRowKind::Add]
        );
    }

    #[test]
    fn context_spans_both_sides_and_is_not_selectable() {
        let hunk = Hunk::from_lines(
            1,
            1,
            vec![
                DiffLine::context("same", 1, 1),
                DiffLine::deletion("gone", 2),
                DiffLine::context("tail", 3, 2),
            ],
        );

        let rows = build_split_rows(&hunk);
        assert_eq!(
            kinds(&rows),
            vec![SplitRowKind::Context, SplitRowKind::Remove, SplitRowKind::Context]
        );
        assert_eq!(rows[0].left, rows[0].right);
        assert!(!rows[0].left.unwrap().selectable);
        assert!(rows[1].left.unwrap().selectable);
        assert!(rows[1].right.is_none());
    }

    #[test]
    fn additions_before_deletions_stay_right_only() {
        let hunk = Hunk::from_lines(
            1,
            1,
            vec![
                DiffLine::addition("new", 1),
                DiffLine::deletion("old", 1),
                DiffLine::addition("newer", 2),
            ],
        );

        let rows = build_split_rows(&hunk);
        assert_eq!(kinds(&rows), vec![SplitRowKind::Add, SplitRowKind::Modify]);
        assert_eq!(rows[1].left.unwrap().index, 1);
        assert_eq!(rows[1].right.unwrap().index, 2);
    }

    #[test]
    fn header_lines_are_skipped() {
        let mut header = DiffLine::context("@@ -1 +1 @@", 0, 0);
        header.kind = LineKind::HunkHeader;
        header.old_lineno = None;
        header.new_lineno = None;

        let hunk = Hunk::from_lines(1, 1, vec![header, DiffLine::addition("x", 1)]);
        let rows = build_split_rows(&hunk);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].right.unwrap().index, 1);
    }

    #[test]
    fn format_split_labels_selectable_cells() {
        let diffs = vec![FileDiff {
            old_path: Some("zsh.nix".to_string()),
            new_path: Some("zsh.nix".to_string()),
            hunks: vec![Hunk::from_lines(
                14,
                14,
                vec![
                    DiffLine::context("programs.zsh = {", 14, 14),
                    DiffLine::deletion("  enable = false;", 15),
                    DiffLine::addition("  enable = true;", 15),
                    DiffLine::addition("  autosuggestion.enable = true;", 16),
                ],
            )],
        }];

        insta::assert_snapshot!(format_split(&diffs, 36), @r"
        zsh.nix:
          #0 @@ -14,2 +14,3 @@
          14        programs.zsh = {         |   14        programs.zsh = {
          15    0-1   enable = false;        |   15    0-2   enable = true;
                                             |   16    0-3   autosuggestion.enable = true;
        ");
    }

    #[test]
    fn format_split_keeps_files_without_hunks() {
        let diffs = vec![
            FileDiff {
                old_path: None,
                new_path: Some("font.ttf".to_string()),
                hunks: vec![],
            },
            FileDiff {
                old_path: Some("zsh.nix".to_string()),
                new_path: Some("zsh.nix".to_string()),
                hunks: vec![Hunk::from_lines(1, 1, vec![DiffLine::addition("x", 1)])],
            },
        ];

        let output = format_split(&diffs, 20);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "font.ttf: (no textual changes)");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "zsh.nix:");
        assert!(lines[3].starts_with("  #0 @@"));
        assert!(lines[4].ends_with("   1    0-0 x"));
    }

    fn line_strategy() -> impl Strategy<Value = DiffLine> {
        prop_oneof![
            Just(DiffLine::context("c", 1, 1)),
            Just(DiffLine::addition("a", 1)),
            Just(DiffLine::deletion("d", 1)),
        ]
    }

    proptest! {
        #[test]
        fn cells_account_for_every_change(lines in prop::collection::vec(line_strategy(), 0..40)) {
            let hunk = Hunk::from_lines(1, 1, lines);
            let rows = build_split_rows(&hunk);

            let left_changes = rows
                .iter()
                .filter(|r| r.left.is_some_and(|c| c.line.kind == LineKind::Deletion))
                .count();
            let right_changes = rows
                .iter()
                .filter(|r| r.right.is_some_and(|c| c.line.kind == LineKind::Addition))
                .count();

            prop_assert_eq!(left_changes, hunk.count(LineKind::Deletion));
            prop_assert_eq!(right_changes, hunk.count(LineKind::Addition));

            for row in &rows {
                if let Some(cell) = row.left {
                    prop_assert_ne!(cell.line.kind, LineKind::Addition);
                    prop_assert_eq!(cell.selectable, cell.line.kind == LineKind::Deletion);
                }
                if let Some(cell) = row.right {
                    prop_assert_ne!(cell.line.kind, LineKind::Deletion);
                    prop_assert_eq!(cell.selectable, cell.line.kind == LineKind::Addition);
                }
            }
        }
    }
}
