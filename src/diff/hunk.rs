use std::fmt;

use nom::{
    IResult, Parser,
    bytes::complete::tag,
    character::complete::{char, u32 as number},
    combinator::opt,
    sequence::preceded,
};
use serde::{Deserialize, Serialize};

use super::{DiffLine, LineKind};
use crate::StagingError;

/// A single hunk from a diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    /// Header line as reported by the service, e.g. `@@ -10,2 +10,3 @@ fn main`
    pub header: String,
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub lines: Vec<DiffLine>,
}

impl Hunk {
    /// Build a hunk from its lines, deriving counts and header
    pub fn from_lines(old_start: u32, new_start: u32, lines: Vec<DiffLine>) -> Self {
        let old_lines = lines
            .iter()
            .filter(|l| matches!(l.kind, LineKind::Context | LineKind::Deletion))
            .count() as u32;
        let new_lines = lines
            .iter()
            .filter(|l| matches!(l.kind, LineKind::Context | LineKind::Addition))
            .count() as u32;
        let id = HunkIdentifier {
            old_start,
            old_lines,
            new_start,
            new_lines,
        };

        Hunk {
            header: id.to_string(),
            old_start,
            old_lines,
            new_start,
            new_lines,
            lines,
        }
    }

    /// Structural key used to address this hunk in service calls
    #[must_use]
    pub fn identifier(&self) -> HunkIdentifier {
        HunkIdentifier {
            old_start: self.old_start,
            old_lines: self.old_lines,
            new_start: self.new_start,
            new_lines: self.new_lines,
        }
    }

    /// Number of lines of the given kind
    #[must_use]
    pub fn count(&self, kind: LineKind) -> usize {
        self.lines.iter().filter(|l| l.kind == kind).count()
    }

    /// Local indices of every addition and deletion line
    #[must_use]
    pub fn change_indices(&self) -> Vec<usize> {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.kind.is_change())
            .map(|(i, _)| i)
            .collect()
    }

    /// Address a set of lines in this hunk.
    ///
    /// Indices are sorted and deduplicated. Every index must point at an
    /// addition or deletion; context and header lines cannot be staged.
    pub fn line_range<I>(&self, indices: I) -> Result<LineRange, StagingError>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut line_indices: Vec<usize> = indices.into_iter().collect();
        line_indices.sort_unstable();
        line_indices.dedup();

        for &line in &line_indices {
            match self.lines.get(line) {
                None => {
                    return Err(StagingError::LineOutOfRange {
                        hunk: self.identifier().to_string(),
                        line,
                    });
                }
                Some(l) if !l.kind.is_change() => {
                    return Err(StagingError::NotAChangeLine {
                        hunk: self.identifier().to_string(),
                        line,
                    });
                }
                Some(_) => {}
            }
        }

        Ok(LineRange {
            hunk: self.identifier(),
            line_indices,
        })
    }
}

/// Old/new start and length of a hunk.
///
/// Two hunks with equal identifiers are treated as the same hunk. Identifiers
/// are only meaningful against the snapshot they came from: any staging call
/// can shift every hunk after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HunkIdentifier {
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
}

impl HunkIdentifier {
    /// Whether `hunk` carries this identifier
    #[must_use]
    pub fn matches(&self, hunk: &Hunk) -> bool {
        *self == hunk.identifier()
    }

    /// Parse a unified hunk header, returning the identifier and any trailing
    /// section heading.
    ///
    /// Format: `@@ -old_start[,old_lines] +new_start[,new_lines] @@ [heading]`
    pub fn parse_header(header: &str) -> Option<(Self, &str)> {
        let (rest, id) = parse_header(header).ok()?;
        Some((id, rest.trim_start()))
    }
}

impl From<&Hunk> for HunkIdentifier {
    fn from(hunk: &Hunk) -> Self {
        hunk.identifier()
    }
}

impl fmt::Display for HunkIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let old_part = match self.old_lines {
            1 => format!("-{}", self.old_start),
            n => format!("-{},{}", self.old_start, n),
        };

        let new_part = match self.new_lines {
            1 => format!("+{}", self.new_start),
            n => format!("+{},{}", self.new_start, n),
        };

        write!(f, "@@ {} {} @@", old_part, new_part)
    }
}

/// Range like `136,0` or `137` (count defaults to 1)
fn range(input: &str) -> IResult<&str, (u32, u32)> {
    (number, opt(preceded(char(','), number)))
        .map(|(start, count)| (start, count.unwrap_or(1)))
        .parse(input)
}

fn parse_header(input: &str) -> IResult<&str, HunkIdentifier> {
    (tag("@@ -"), range, tag(" +"), range, tag(" @@"))
        .map(
            |(_, (old_start, old_lines), _, (new_start, new_lines), _)| HunkIdentifier {
                old_start,
                old_lines,
                new_start,
                new_lines,
            },
        )
        .parse(input)
}

/// Selected change lines within one hunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub hunk: HunkIdentifier,
    /// Sorted local indices of addition/deletion lines
    pub line_indices: Vec<usize>,
}
