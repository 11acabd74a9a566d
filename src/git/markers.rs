//! Conflict marker parsing and rewriting of conflicted files.

use crate::conflict::{ConflictBlock, ConflictResolution};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Block {
        block: ConflictBlock,
        /// Marker lines and both sides, verbatim
        raw: String,
    },
}

/// Split file content into plain text and conflict blocks.
///
/// Lines keep their terminators. A block without its `=======` or `>>>>>>>`
/// marker is kept as plain text.
fn segments(content: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut buf = String::new();
    let mut lineno = 0u32;
    let mut lines = content.split_inclusive('\n');

    while let Some(line) = lines.next() {
        lineno += 1;
        if !line.starts_with("<<<<<<<") {
            buf.push_str(line);
            continue;
        }

        let start_line = lineno;
        let mut raw = line.to_string();
        let mut ours = String::new();
        let mut base: Option<String> = None;
        let mut theirs = String::new();
        let mut found_sep = false;
        let mut found_end = false;

        for l in lines.by_ref() {
            lineno += 1;
            raw.push_str(l);
            if l.starts_with("=======") {
                found_sep = true;
                break;
            }
            if l.starts_with("|||||||") {
                base = Some(String::new());
                continue;
            }
            match base.as_mut() {
                Some(base) => base.push_str(l),
                None => ours.push_str(l),
            }
        }

        if found_sep {
            for l in lines.by_ref() {
                lineno += 1;
                raw.push_str(l);
                if l.starts_with(">>>>>>>") {
                    found_end = true;
                    break;
                }
                theirs.push_str(l);
            }
        }

        if !found_end {
            buf.push_str(&raw);
            continue;
        }

        if !buf.is_empty() {
            segments.push(Segment::Text(std::mem::take(&mut buf)));
        }
        segments.push(Segment::Block {
            block: ConflictBlock {
                ours,
                theirs,
                base,
                start_line,
                end_line: lineno,
            },
            raw,
        });
    }

    if !buf.is_empty() {
        segments.push(Segment::Text(buf));
    }
    segments
}

/// Conflict blocks of a file, in order
pub fn parse_conflict_markers(content: &str) -> Vec<ConflictBlock> {
    segments(content)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Block { block, .. } => Some(block),
            Segment::Text(_) => None,
        })
        .collect()
}

fn resolved_text(block: &ConflictBlock, resolution: &ConflictResolution) -> String {
    let mut text = resolution.apply(block);
    if matches!(resolution, ConflictResolution::Manual(_)) && !text.is_empty() && !text.ends_with('\n')
    {
        text.push('\n');
    }
    text
}

/// Rewrite content, replacing each block `choose` returns a resolution for
fn rewrite<'r>(
    content: &str,
    mut choose: impl FnMut(usize) -> Option<&'r ConflictResolution>,
) -> String {
    let mut out = String::with_capacity(content.len());
    let mut block_index = 0;

    for segment in segments(content) {
        match segment {
            Segment::Text(text) => out.push_str(&text),
            Segment::Block { block, raw } => {
                match choose(block_index) {
                    Some(resolution) => out.push_str(&resolved_text(&block, resolution)),
                    None => out.push_str(&raw),
                }
                block_index += 1;
            }
        }
    }

    out
}

/// Replace the `index`-th block currently in the content. Returns `None`
/// when there is no such block.
pub fn resolve_block(
    content: &str,
    index: usize,
    resolution: &ConflictResolution,
) -> Option<String> {
    if index >= parse_conflict_markers(content).len() {
        return None;
    }
    Some(rewrite(content, |i| (i == index).then_some(resolution)))
}

/// Apply one resolution to every block. Manual content replaces the whole
/// file.
pub fn resolve_all(content: &str, resolution: &ConflictResolution) -> String {
    match resolution {
        ConflictResolution::Manual(text) => text.clone(),
        _ => rewrite(content, |_| Some(resolution)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    const TWO_BLOCKS: &str = "\
header
<<<<<<< HEAD
ours one
=======
theirs one
>>>>>>> feature
middle
<<<<<<< HEAD
ours two
||||||| base
base two
=======
theirs two
>>>>>>> feature
footer
";

    #[test]
    fn parses_blocks_with_positions() {
        let blocks = parse_conflict_markers(TWO_BLOCKS);
        assert_eq!(
            blocks,
            vec![
                ConflictBlock {
                    ours: "ours one\n".to_string(),
                    theirs: "theirs one\n".to_string(),
                    base: None,
                    start_line: 2,
                    end_line: 6,
                },
                ConflictBlock {
                    ours: "ours two\n".to_string(),
                    theirs: "theirs two\n".to_string(),
                    base: Some("base two\n".to_string()),
                    start_line: 8,
                    end_line: 14,
                },
            ]
        );
    }

    #[test]
    fn resolves_single_block_and_keeps_others() {
        let resolved = resolve_block(TWO_BLOCKS, 1, &ConflictResolution::Theirs).unwrap();
        insta::assert_snapshot!(resolved, @r"
        header
        <<<<<<< HEAD
        ours one
        =======
        theirs one
        >>>>>>> feature
        middle
        theirs two
        footer
        ");
        assert_eq!(parse_conflict_markers(&resolved).len(), 1);
    }

    #[test]
    fn both_keeps_ours_then_theirs() {
        let resolved = resolve_block(TWO_BLOCKS, 0, &ConflictResolution::Both).unwrap();
        assert!(resolved.starts_with("header\nours one\ntheirs one\nmiddle\n"));
    }

    #[test]
    fn manual_block_gets_trailing_newline() {
        let resolution = ConflictResolution::Manual("merged".to_string());
        let resolved = resolve_block(TWO_BLOCKS, 0, &resolution).unwrap();
        assert!(resolved.starts_with("header\nmerged\nmiddle\n"));

        let resolved = resolve_block(TWO_BLOCKS, 0, &ConflictResolution::Manual(String::new()));
        assert!(resolved.unwrap().starts_with("header\nmiddle\n"));
    }

    #[test]
    fn out_of_range_block() {
        assert!(resolve_block(TWO_BLOCKS, 2, &ConflictResolution::Ours).is_none());
    }

    #[test]
    fn resolve_all_blocks() {
        let resolved = resolve_all(TWO_BLOCKS, &ConflictResolution::Ours);
        assert_eq!(resolved, "header\nours one\nmiddle\nours two\nfooter\n");

        let manual = resolve_all(TWO_BLOCKS, &ConflictResolution::Manual("all new\n".into()));
        assert_eq!(manual, "all new\n");
    }

    #[test]
    fn unterminated_block_is_plain_text() {
        let content = "a\n<<<<<<< HEAD\none\n=======\ntwo\n";
        assert!(parse_conflict_markers(content).is_empty());
        assert_eq!(resolve_all(content, &ConflictResolution::Theirs), content);
    }
}
