use serde::Serialize;
use tracing::warn;

use super::{ConflictBlock, ConflictFile, ConflictResolution};
use crate::ConflictError;

/// Where a file stands in the resolution workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum FilePhase {
    Unresolved { remaining: usize },
    /// Every block has a resolution but the file is not marked yet
    AllBlocksResolved,
    MarkedResolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct BlockSlot {
    block: ConflictBlock,
    resolution: Option<ConflictResolution>,
}

/// Resolution state of one conflicted file.
///
/// Blocks keep the index they had when the file entered conflict, even after
/// the backend drops resolved blocks from the working file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileResolution {
    path: String,
    blocks: Vec<BlockSlot>,
    marked: bool,
}

impl FileResolution {
    pub fn new(file: &ConflictFile) -> Self {
        Self {
            path: file.path.clone(),
            blocks: Self::slots(file),
            marked: false,
        }
    }

    fn slots(file: &ConflictFile) -> Vec<BlockSlot> {
        file.conflicts
            .iter()
            .map(|block| BlockSlot {
                block: block.clone(),
                resolution: None,
            })
            .collect()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Blocks with their stable indices and chosen resolutions
    pub fn blocks(
        &self,
    ) -> impl Iterator<Item = (usize, &ConflictBlock, Option<&ConflictResolution>)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, slot)| (i, &slot.block, slot.resolution.as_ref()))
    }

    pub fn remaining(&self) -> usize {
        self.blocks.iter().filter(|s| s.resolution.is_none()).count()
    }

    pub fn is_marked(&self) -> bool {
        self.marked
    }

    pub fn phase(&self) -> FilePhase {
        if self.marked {
            FilePhase::MarkedResolved
        } else {
            match self.remaining() {
                0 => FilePhase::AllBlocksResolved,
                remaining => FilePhase::Unresolved { remaining },
            }
        }
    }

    /// Mark-resolved is offered only once every block is resolved
    pub fn can_mark_resolved(&self) -> bool {
        self.phase() == FilePhase::AllBlocksResolved
    }

    /// Position of a pending block among the blocks still in the working file
    pub fn backend_index(&self, index: usize) -> Result<usize, ConflictError> {
        self.ensure_unmarked()?;
        let slot = self
            .blocks
            .get(index)
            .ok_or_else(|| ConflictError::BlockOutOfRange {
                path: self.path.clone(),
                index,
                count: self.blocks.len(),
            })?;
        if slot.resolution.is_some() {
            return Err(ConflictError::BlockAlreadyResolved {
                path: self.path.clone(),
                index,
            });
        }

        Ok(self.blocks[..index]
            .iter()
            .filter(|s| s.resolution.is_none())
            .count())
    }

    /// Record a block resolution the backend accepted
    pub fn record_block(
        &mut self,
        index: usize,
        resolution: ConflictResolution,
    ) -> Result<(), ConflictError> {
        self.backend_index(index)?;
        self.blocks[index].resolution = Some(resolution);
        Ok(())
    }

    /// Record a whole-file resolution: every pending block takes it
    pub fn record_file(&mut self, resolution: &ConflictResolution) -> Result<(), ConflictError> {
        self.ensure_unmarked()?;
        for slot in self.blocks.iter_mut().filter(|s| s.resolution.is_none()) {
            slot.resolution = Some(resolution.clone());
        }
        Ok(())
    }

    /// Check that the file may be marked resolved
    pub fn check_markable(&self) -> Result<(), ConflictError> {
        self.ensure_unmarked()?;
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(ConflictError::BlocksRemaining {
                path: self.path.clone(),
                remaining,
            }),
        }
    }

    /// Enter the terminal state
    pub fn mark(&mut self) -> Result<(), ConflictError> {
        self.check_markable()?;
        self.marked = true;
        Ok(())
    }

    /// The file disappeared from the conflict list without being marked here
    pub(crate) fn mark_external(&mut self) {
        for slot in self.blocks.iter_mut().filter(|s| s.resolution.is_none()) {
            slot.resolution = Some(ConflictResolution::Manual(String::new()));
        }
        self.marked = true;
    }

    /// Bring pending blocks in line with a fresh backend listing.
    ///
    /// Pending blocks pick up the fresh positions in order. When the counts
    /// disagree the file was edited outside the workflow and its block list
    /// restarts from the fresh listing.
    pub fn reconcile(&mut self, fresh: &ConflictFile) {
        if self.marked {
            warn!(path = %self.path, "marked file is conflicted again");
            *self = Self::new(fresh);
            return;
        }

        let pending = self.remaining();
        if pending != fresh.conflicts.len() {
            warn!(
                path = %self.path,
                expected = pending,
                found = fresh.conflicts.len(),
                "conflict blocks changed outside the session, restarting file"
            );
            *self = Self::new(fresh);
            return;
        }

        let pending_slots = self.blocks.iter_mut().filter(|s| s.resolution.is_none());
        for (slot, block) in pending_slots.zip(&fresh.conflicts) {
            slot.block = block.clone();
        }
    }

    fn ensure_unmarked(&self) -> Result<(), ConflictError> {
        if self.marked {
            Err(ConflictError::AlreadyMarked {
                path: self.path.clone(),
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn block(start_line: u32) -> ConflictBlock {
        ConflictBlock {
            ours: format!("ours {start_line}\n"),
            theirs: format!("theirs {start_line}\n"),
            base: None,
            start_line,
            end_line: start_line + 4,
        }
    }

    fn three_blocks() -> FileResolution {
        FileResolution::new(&ConflictFile::new(
            "src/lib.rs",
            vec![block(1), block(10), block(20)],
        ))
    }

    #[test]
    fn blocks_resolve_in_any_order() {
        let mut file = three_blocks();
        assert_eq!(file.phase(), FilePhase::Unresolved { remaining: 3 });

        file.record_block(2, ConflictResolution::Theirs).unwrap();
        file.record_block(0, ConflictResolution::Ours).unwrap();
        assert_eq!(file.phase(), FilePhase::Unresolved { remaining: 1 });
        assert!(!file.can_mark_resolved());

        file.record_block(1, ConflictResolution::Both).unwrap();
        assert_eq!(file.phase(), FilePhase::AllBlocksResolved);
        assert!(file.can_mark_resolved());

        file.mark().unwrap();
        assert_eq!(file.phase(), FilePhase::MarkedResolved);
    }

    #[test]
    fn backend_index_skips_resolved_blocks() {
        let mut file = three_blocks();
        assert_eq!(file.backend_index(2).unwrap(), 2);

        file.record_block(0, ConflictResolution::Ours).unwrap();
        assert_eq!(file.backend_index(1).unwrap(), 0);
        assert_eq!(file.backend_index(2).unwrap(), 1);

        file.record_block(2, ConflictResolution::Ours).unwrap();
        assert_eq!(file.backend_index(1).unwrap(), 0);
    }

    #[test]
    fn resolved_block_cannot_be_resolved_again() {
        let mut file = three_blocks();
        file.record_block(1, ConflictResolution::Ours).unwrap();

        let err = file.record_block(1, ConflictResolution::Theirs).unwrap_err();
        assert!(matches!(err, ConflictError::BlockAlreadyResolved { index: 1, .. }));

        let err = file.backend_index(3).unwrap_err();
        assert!(matches!(
            err,
            ConflictError::BlockOutOfRange {
                index: 3,
                count: 3,
                ..
            }
        ));
    }

    #[test]
    fn resolving_blocks_does_not_mark() {
        let mut file = three_blocks();
        file.record_file(&ConflictResolution::Ours).unwrap();
        assert_eq!(file.phase(), FilePhase::AllBlocksResolved);
        assert!(!file.is_marked());
    }

    #[test]
    fn mark_requires_all_blocks() {
        let mut file = three_blocks();
        file.record_block(0, ConflictResolution::Ours).unwrap();

        let err = file.mark().unwrap_err();
        assert_eq!(err.to_string(), "src/lib.rs still has 2 unresolved blocks");

        file.record_file(&ConflictResolution::Theirs).unwrap();
        file.mark().unwrap();
        let err = file.mark().unwrap_err();
        assert!(matches!(err, ConflictError::AlreadyMarked { .. }));
    }

    #[test]
    fn reconcile_updates_pending_positions() {
        let mut file = three_blocks();
        file.record_block(0, ConflictResolution::Ours).unwrap();

        // Resolving the first block shortened the file by four lines
        let fresh = ConflictFile::new("src/lib.rs", vec![block(6), block(16)]);
        file.reconcile(&fresh);

        let starts: Vec<u32> = file.blocks().map(|(_, b, _)| b.start_line).collect();
        assert_eq!(starts, vec![1, 6, 16]);
        assert_eq!(file.remaining(), 2);
    }

    #[test]
    fn reconcile_restarts_on_count_mismatch() {
        let mut file = three_blocks();
        file.record_block(0, ConflictResolution::Ours).unwrap();

        let fresh = ConflictFile::new("src/lib.rs", vec![block(6)]);
        file.reconcile(&fresh);

        assert_eq!(file.block_count(), 1);
        assert_eq!(file.phase(), FilePhase::Unresolved { remaining: 1 });
    }

    #[test]
    fn reconcile_unmarks_file_in_conflict_again() {
        let mut file = three_blocks();
        file.record_file(&ConflictResolution::Ours).unwrap();
        file.mark().unwrap();

        file.reconcile(&ConflictFile::new("src/lib.rs", vec![block(2)]));
        assert_eq!(file.phase(), FilePhase::Unresolved { remaining: 1 });
    }
}
