//! Line selection keyed by global hunk index and local line index.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use error_set::error_set;
use nom::{
    IResult, Parser,
    character::complete::{char, u32 as number},
    combinator::all_consuming,
};
use serde::{Deserialize, Serialize};

error_set! {
    /// Malformed selection key
    SelectionKeyError := {
        #[display("Invalid selection key '{input}': expected HUNK-LINE, e.g. 2-0")]
        InvalidKey { input: String },
    }
}

/// Identifies one line of the current snapshot as `{hunk}-{line}`.
///
/// Keys are only valid against the snapshot they were made from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SelectionKey {
    /// Global hunk index
    pub hunk: usize,
    /// Line index within the hunk
    pub line: usize,
}

impl SelectionKey {
    pub fn new(hunk: usize, line: usize) -> Self {
        Self { hunk, line }
    }
}

impl fmt::Display for SelectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.hunk, self.line)
    }
}

fn key(input: &str) -> IResult<&str, SelectionKey> {
    (number, char('-'), number)
        .map(|(hunk, _, line)| SelectionKey {
            hunk: hunk as usize,
            line: line as usize,
        })
        .parse(input)
}

impl FromStr for SelectionKey {
    type Err = SelectionKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        all_consuming(key)
            .parse(s.trim())
            .map(|(_, key)| key)
            .map_err(|_| SelectionKeyError::InvalidKey {
                input: s.to_string(),
            })
    }
}

/// Parse a comma separated list of keys, e.g. `0-1,0-2,3-0`
pub fn parse_keys(input: &str) -> Result<Vec<SelectionKey>, SelectionKeyError> {
    input
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse::<SelectionKey>)
        .collect()
}

/// Set of selected lines.
///
/// Ordered so that keys of one hunk are contiguous and sorted by line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    keys: BTreeSet<SelectionKey>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the key if absent, remove it if present
    pub fn toggle(&mut self, key: SelectionKey) {
        if !self.keys.remove(&key) {
            self.keys.insert(key);
        }
    }

    pub fn contains(&self, key: SelectionKey) -> bool {
        self.keys.contains(&key)
    }

    pub fn has_selection_in_hunk(&self, hunk: usize) -> bool {
        self.keys_in_hunk(hunk).next().is_some()
    }

    /// Sorted local line indices selected in `hunk`
    pub fn collect_indices(&self, hunk: usize) -> Vec<usize> {
        self.keys_in_hunk(hunk).map(|k| k.line).collect()
    }

    /// Hunk indices with at least one selected line, ascending
    pub fn hunks(&self) -> Vec<usize> {
        let mut hunks: Vec<usize> = self.keys.iter().map(|k| k.hunk).collect();
        hunks.dedup();
        hunks
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = SelectionKey> + '_ {
        self.keys.iter().copied()
    }

    fn keys_in_hunk(&self, hunk: usize) -> impl Iterator<Item = &SelectionKey> {
        self.keys
            .range(SelectionKey::new(hunk, 0)..=SelectionKey::new(hunk, usize::MAX))
    }
}

impl FromIterator<SelectionKey> for Selection {
    fn from_iter<T: IntoIterator<Item = SelectionKey>>(iter: T) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use similar_asserts::assert_eq;

    #[test]
    fn collect_indices_after_toggles() {
        let mut selection = Selection::new();
        selection.toggle("2-0".parse().unwrap());
        selection.toggle("2-1".parse().unwrap());

        assert_eq!(selection.collect_indices(2), vec![0, 1]);
        assert!(selection.has_selection_in_hunk(2));
        assert!(!selection.has_selection_in_hunk(1));
    }

    #[test]
    fn collect_indices_sorted_and_scoped_to_hunk() {
        let selection: Selection = [
            SelectionKey::new(1, 7),
            SelectionKey::new(0, 3),
            SelectionKey::new(1, 2),
            SelectionKey::new(12, 0),
        ]
        .into_iter()
        .collect();

        assert_eq!(selection.collect_indices(1), vec![2, 7]);
        assert_eq!(selection.collect_indices(12), vec![0]);
        assert_eq!(selection.collect_indices(5), Vec::<usize>::new());
        assert_eq!(selection.hunks(), vec![0, 1, 12]);
    }

    #[test]
    fn clear_empties_selection() {
        let mut selection = Selection::new();
        selection.toggle(SelectionKey::new(0, 1));
        assert_eq!(selection.len(), 1);

        selection.clear();
        assert!(selection.is_empty());
        assert!(!selection.contains(SelectionKey::new(0, 1)));
    }

    #[test]
    fn parse_and_display() {
        let key: SelectionKey = "10-3".parse().unwrap();
        assert_eq!(key, SelectionKey::new(10, 3));
        assert_eq!(key.to_string(), "10-3");
    }

    #[test]
    fn parse_rejects_malformed_keys() {
        for input in ["", "2", "2-", "-1", "a-b", "1-2-3", "1,2"] {
            assert!(
                input.parse::<SelectionKey>().is_err(),
                "expected '{input}' to be rejected"
            );
        }
    }

    #[test]
    fn parse_key_list() {
        let keys = parse_keys("0-1, 0-2,3-0").unwrap();
        assert_eq!(
            keys,
            vec![
                SelectionKey::new(0, 1),
                SelectionKey::new(0, 2),
                SelectionKey::new(3, 0),
            ]
        );

        let err = parse_keys("0-1,x").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid selection key 'x': expected HUNK-LINE, e.g. 2-0"
        );
    }

    proptest! {
        #[test]
        fn toggle_twice_is_identity(
            initial in prop::collection::vec((0usize..8, 0usize..16), 0..20),
            hunk in 0usize..8,
            line in 0usize..16,
        ) {
            let before: Selection = initial
                .into_iter()
                .map(|(h, l)| SelectionKey::new(h, l))
                .collect();

            let mut after = before.clone();
            after.toggle(SelectionKey::new(hunk, line));
            after.toggle(SelectionKey::new(hunk, line));

            prop_assert_eq!(before, after);
        }
    }
}
