use serde::{Deserialize, Serialize};

use super::hunk::Hunk;
use super::LineKind;

/// A complete diff for a single file.
///
/// Contains all hunks (change blocks) for one file. Either path may be absent
/// when the file was created or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    pub hunks: Vec<Hunk>,
}

impl FileDiff {
    /// Path to show the user and to address the file in service calls.
    ///
    /// Prefers the new path, falling back to the old one for deletions.
    #[must_use]
    pub fn display_path(&self) -> Option<&str> {
        self.new_path.as_deref().or(self.old_path.as_deref())
    }

    /// Count lines of the given kind over all hunks
    #[must_use]
    pub fn count(&self, kind: LineKind) -> usize {
        self.hunks.iter().map(|h| h.count(kind)).sum()
    }
}

/// A hunk paired with its position in a multi-file snapshot
#[derive(Debug, Clone, Copy)]
pub struct IndexedHunk<'a> {
    /// Global index, increasing across all files of the snapshot
    pub index: usize,
    /// Position of the hunk within its own file
    pub index_in_file: usize,
    pub file: &'a FileDiff,
    pub hunk: &'a Hunk,
}

/// Iterate every hunk of a snapshot with its global index.
///
/// Indices run across file boundaries so a flat multi-file view can address
/// any hunk with a single number.
pub fn indexed_hunks(files: &[FileDiff]) -> impl Iterator<Item = IndexedHunk<'_>> {
    files
        .iter()
        .flat_map(|file| {
            file.hunks
                .iter()
                .enumerate()
                .map(move |(index_in_file, hunk)| (file, index_in_file, hunk))
        })
        .enumerate()
        .map(|(index, (file, index_in_file, hunk))| IndexedHunk {
            index,
            index_in_file,
            file,
            hunk,
        })
}

/// Look up a hunk by global index
pub fn hunk_at(files: &[FileDiff], index: usize) -> Option<IndexedHunk<'_>> {
    indexed_hunks(files).nth(index)
}

/// Total number of hunks in a snapshot
pub fn hunk_count(files: &[FileDiff]) -> usize {
    files.iter().map(|f| f.hunks.len()).sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::diff::DiffLine;
    use similar_asserts::assert_eq;

    fn hunk(old_start: u32, lines: Vec<DiffLine>) -> Hunk {
        Hunk::from_lines(old_start, old_start, lines)
    }

    fn file(path: &str, hunks: Vec<Hunk>) -> FileDiff {
        FileDiff {
            old_path: Some(path.to_string()),
            new_path: Some(path.to_string()),
            hunks,
        }
    }

    fn snapshot() -> Vec<FileDiff> {
        vec![
            file(
                "flake.nix",
                vec![
                    hunk(3, vec![DiffLine::addition("# FIRST", 3)]),
                    hunk(10, vec![DiffLine::addition("# SECOND", 11)]),
                ],
            ),
            file("empty.nix", vec![]),
            file(
                "zsh.nix",
                vec![hunk(15, vec![DiffLine::deletion("autosuggest", 15)])],
            ),
        ]
    }

    #[test]
    fn indices_run_across_files() {
        let files = snapshot();
        let indexed: Vec<_> = indexed_hunks(&files)
            .map(|h| (h.index, h.index_in_file, h.file.display_path().unwrap()))
            .collect();

        assert_eq!(
            indexed,
            vec![
                (0, 0, "flake.nix"),
                (1, 1, "flake.nix"),
                (2, 0, "zsh.nix"),
            ]
        );
    }

    #[test]
    fn hunk_at_finds_hunk_in_later_file() {
        let files = snapshot();
        let found = hunk_at(&files, 2).unwrap();
        assert_eq!(found.file.display_path(), Some("zsh.nix"));
        assert_eq!(found.hunk.old_start, 15);
        assert!(hunk_at(&files, 3).is_none());
        assert_eq!(hunk_count(&files), 3);
    }

    #[test]
    fn display_path_falls_back_to_old_path() {
        let deleted = FileDiff {
            old_path: Some("gone.txt".to_string()),
            new_path: None,
            hunks: vec![],
        };
        assert_eq!(deleted.display_path(), Some("gone.txt"));

        let created = FileDiff {
            old_path: None,
            new_path: Some("new.txt".to_string()),
            hunks: vec![],
        };
        assert_eq!(created.display_path(), Some("new.txt"));
    }

    #[test]
    fn counts_lines_over_hunks() {
        let files = snapshot();
        assert_eq!(files[0].count(LineKind::Addition), 2);
        assert_eq!(files[2].count(LineKind::Deletion), 1);
        assert_eq!(files[1].count(LineKind::Addition), 0);
    }
}
