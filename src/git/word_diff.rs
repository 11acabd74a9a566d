//! Word segments for paired deletion/addition lines.

use similar::{Algorithm, DiffTag, capture_diff_slices};

use crate::diff::{FileDiff, Hunk, LineKind, WordSegment};

/// Split into words, with every whitespace or punctuation byte as its own
/// token
fn tokenize(s: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;

    for (i, c) in s.char_indices() {
        if c.is_ascii_whitespace() || c.is_ascii_punctuation() {
            if start < i {
                tokens.push(&s[start..i]);
            }
            tokens.push(&s[i..i + 1]);
            start = i + 1;
        }
    }
    if start < s.len() {
        tokens.push(&s[start..]);
    }
    tokens
}

/// Join tokens into segments, merging neighbours with the same flag
fn segments(tokens: &[&str], marked: &[bool]) -> Vec<WordSegment> {
    let mut out: Vec<WordSegment> = Vec::new();
    for (token, &highlighted) in tokens.iter().zip(marked) {
        match out.last_mut() {
            Some(last) if last.highlighted == highlighted => last.text.push_str(token),
            _ => out.push(WordSegment::new(*token, highlighted)),
        }
    }
    out
}

/// Word level difference between an old and a new line
pub fn diff_pair(old: &str, new: &str) -> (Vec<WordSegment>, Vec<WordSegment>) {
    let old_tokens = tokenize(old);
    let new_tokens = tokenize(new);
    let mut old_marked = vec![false; old_tokens.len()];
    let mut new_marked = vec![false; new_tokens.len()];

    for op in capture_diff_slices(Algorithm::Myers, &old_tokens, &new_tokens) {
        if op.tag() == DiffTag::Equal {
            continue;
        }
        for i in op.old_range() {
            old_marked[i] = true;
        }
        for i in op.new_range() {
            new_marked[i] = true;
        }
    }

    (
        segments(&old_tokens, &old_marked),
        segments(&new_tokens, &new_marked),
    )
}

/// Fill `word_diff` for each run of deletions followed by additions.
///
/// The i-th deletion is compared with the i-th addition; surplus lines of
/// the longer run get no segments.
pub fn annotate_hunk(hunk: &mut Hunk) {
    let lines = &mut hunk.lines;
    let mut i = 0;

    while i < lines.len() {
        if lines[i].kind != LineKind::Deletion {
            i += 1;
            continue;
        }

        let del_start = i;
        while i < lines.len() && lines[i].kind == LineKind::Deletion {
            i += 1;
        }
        let add_start = i;
        while i < lines.len() && lines[i].kind == LineKind::Addition {
            i += 1;
        }

        let pairs = (add_start - del_start).min(i - add_start);
        for p in 0..pairs {
            let (old, new) = diff_pair(
                &lines[del_start + p].content,
                &lines[add_start + p].content,
            );
            lines[del_start + p].word_diff = Some(old);
            lines[add_start + p].word_diff = Some(new);
        }
    }
}

pub fn annotate(files: &mut [FileDiff]) {
    for hunk in files.iter_mut().flat_map(|f| f.hunks.iter_mut()) {
        annotate_hunk(hunk);
    }
}
