//! Patches fed to `git apply`.

use crate::diff::{DiffLine, FileDiff, Hunk, HunkIdentifier, LineKind};

/// Which side of the diff the patch will be applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchDirection {
    /// Applied as-is onto the old side (staging into the index)
    Forward,
    /// Applied with `-R` onto the new side (unstaging, discarding)
    Reverse,
}

fn file_header(old_path: Option<&str>, new_path: Option<&str>) -> String {
    let name = new_path.or(old_path).unwrap_or_default();
    let mut header = format!("diff --git a/{} b/{}\n", name, name);
    match old_path {
        Some(path) => header.push_str(&format!("--- a/{}\n", path)),
        None => header.push_str("--- /dev/null\n"),
    }
    match new_path {
        Some(path) => header.push_str(&format!("+++ b/{}\n", path)),
        None => header.push_str("+++ /dev/null\n"),
    }
    header
}

fn push_line(patch: &mut String, prefix: char, line: &DiffLine) {
    patch.push(prefix);
    patch.push_str(&line.content);
    patch.push('\n');
    if line.no_newline_at_eof {
        patch.push_str("\\ No newline at end of file\n");
    }
}

/// Patch containing one whole hunk
pub fn hunk_patch(file: &FileDiff, hunk: &Hunk) -> String {
    let mut patch = file_header(file.old_path.as_deref(), file.new_path.as_deref());
    patch.push_str(&hunk.identifier().to_string());
    patch.push('\n');

    for line in &hunk.lines {
        if let Some(prefix) = line.kind.prefix() {
            push_line(&mut patch, prefix, line);
        }
    }

    patch
}

/// Patch containing only the selected change lines of a hunk.
///
/// Unselected lines that exist on the side the patch applies to become
/// context; the others are dropped. Forward patches keep unselected
/// deletions as context, reverse patches keep unselected additions.
pub fn line_patch(
    path: &str,
    hunk: &Hunk,
    selected: &[usize],
    direction: PatchDirection,
) -> String {
    let mut body = String::new();
    let mut old_count = 0u32;
    let mut new_count = 0u32;

    for (index, line) in hunk.lines.iter().enumerate() {
        let is_selected = selected.contains(&index);
        let prefix = match (line.kind, is_selected, direction) {
            (LineKind::Context, _, _) => ' ',
            (LineKind::Deletion, true, _) => '-',
            (LineKind::Addition, true, _) => '+',
            (LineKind::Deletion, false, PatchDirection::Forward) => ' ',
            (LineKind::Addition, false, PatchDirection::Reverse) => ' ',
            _ => continue,
        };
        match prefix {
            ' ' => {
                old_count += 1;
                new_count += 1;
            }
            '-' => old_count += 1,
            _ => new_count += 1,
        }
        push_line(&mut body, prefix, line);
    }

    let header = HunkIdentifier {
        old_start: match direction {
            PatchDirection::Forward => hunk.old_start,
            PatchDirection::Reverse => other_start(hunk.new_start, new_count, old_count),
        },
        old_lines: old_count,
        new_start: match direction {
            PatchDirection::Forward => other_start(hunk.old_start, old_count, new_count),
            PatchDirection::Reverse => hunk.new_start,
        },
        new_lines: new_count,
    };

    let mut patch = file_header(Some(path), Some(path));
    patch.push_str(&header.to_string());
    patch.push('\n');
    patch.push_str(&body);
    patch
}

/// Start line of the derived side. A zero-length range names the line
/// before the change, so the start shifts by one when exactly one side is
/// empty.
fn other_start(anchor_start: u32, anchor_count: u32, other_count: u32) -> u32 {
    match (anchor_count, other_count) {
        (0, n) if n > 0 => anchor_start + 1,
        (n, 0) if n > 0 => anchor_start.saturating_sub(1),
        _ => anchor_start,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn file(path: &str) -> FileDiff {
        FileDiff {
            old_path: Some(path.to_string()),
            new_path: Some(path.to_string()),
            hunks: vec![],
        }
    }

    fn mixed_hunk() -> Hunk {
        Hunk::from_lines(
            9,
            9,
            vec![
                DiffLine::context("line 9", 9, 9),
                DiffLine::deletion("old 10", 10),
                DiffLine::deletion("old 11", 11),
                DiffLine::addition("new 10", 10),
                DiffLine::addition("new 11", 11),
                DiffLine::context("line 12", 12, 12),
            ],
        )
    }

    #[test]
    fn whole_hunk_patch() {
        insta::assert_snapshot!(hunk_patch(&file("gtk.nix"), &mixed_hunk()), @r"
        diff --git a/gtk.nix b/gtk.nix
        --- a/gtk.nix
        +++ b/gtk.nix
        @@ -9,4 +9,4 @@
         line 9
        -old 10
        -old 11
        +new 10
        +new 11
         line 12
        ");
    }

    #[test]
    fn forward_patch_keeps_unselected_deletions_as_context() {
        insta::assert_snapshot!(line_patch("gtk.nix", &mixed_hunk(), &[2, 3], PatchDirection::Forward), @r"
        diff --git a/gtk.nix b/gtk.nix
        --- a/gtk.nix
        +++ b/gtk.nix
        @@ -9,4 +9,4 @@
         line 9
         old 10
        -old 11
        +new 10
         line 12
        ");
    }

    #[test]
    fn reverse_patch_keeps_unselected_additions_as_context() {
        insta::assert_snapshot!(line_patch("gtk.nix", &mixed_hunk(), &[4], PatchDirection::Reverse), @r"
        diff --git a/gtk.nix b/gtk.nix
        --- a/gtk.nix
        +++ b/gtk.nix
        @@ -9,3 +9,4 @@
         line 9
         new 10
        +new 11
         line 12
        ");
    }

    #[test]
    fn zero_context_addition_shifts_new_start() {
        let hunk = Hunk::from_lines(
            136,
            137,
            vec![
                DiffLine::addition("      debug = true;", 137),
                DiffLine::addition("      verbose = true;", 138),
            ],
        );
        let patch = line_patch("flake.nix", &hunk, &[1], PatchDirection::Forward);
        assert!(patch.contains("@@ -136,0 +137 @@\n+      verbose = true;\n"));
    }

    #[test]
    fn missing_newline_marker_is_preserved() {
        let mut deleted = DiffLine::deletion("last", 3);
        deleted.no_newline_at_eof = true;
        let hunk = Hunk::from_lines(3, 3, vec![deleted, DiffLine::addition("last", 3)]);

        let patch = hunk_patch(&file("a.txt"), &hunk);
        assert!(patch.ends_with("-last\n\\ No newline at end of file\n+last\n"));
    }

    #[test]
    fn deleted_file_uses_dev_null() {
        let deleted = FileDiff {
            old_path: Some("gone.txt".to_string()),
            new_path: None,
            hunks: vec![],
        };
        let hunk = Hunk::from_lines(1, 0, vec![DiffLine::deletion("bye", 1)]);
        let patch = hunk_patch(&deleted, &hunk);
        assert!(patch.starts_with("diff --git a/gone.txt b/gone.txt\n--- a/gone.txt\n+++ /dev/null\n@@ -1 +0,0 @@\n"));
    }
}
