use crate::{
    TranslateStats,
    bounds::{is_eligible_chunk, is_eligible_target},
    chunk::{Chunk, FileSize},
    scan::scan_sites,
};
use tracing::trace;

/// Encode-side rewrite: relative call displacements become normalized targets.
///
/// Only chunks passing [`is_eligible_chunk`] are rewritten. Other chunks are
/// still scanned, but every site is left as-is.
#[derive(Debug, Clone)]
pub struct ForwardTranslator {
    file_size: FileSize,
    stats: TranslateStats,
}

impl ForwardTranslator {
    pub fn new(file_size: FileSize) -> Self {
        Self {
            file_size,
            stats: TranslateStats::default(),
        }
    }

    pub fn apply(&mut self, chunk: &mut Chunk<'_>) {
        let eligible = is_eligible_chunk(chunk.offset(), chunk.len());
        if !eligible {
            trace!(
                offset = chunk.offset(),
                len = chunk.len(),
                "chunk not eligible for forward translation"
            );
        }

        let file_size = self.file_size.get();
        let mut rewritten = 0;
        let sites = scan_sites(chunk, |chunk, i| {
            if eligible && rewrite_site(chunk, i, file_size) {
                rewritten += 1;
            }
        });

        self.stats.chunks += 1;
        self.stats.sites += sites;
        self.stats.rewritten += rewritten;
    }

    pub fn stats(&self) -> &TranslateStats {
        &self.stats
    }
}

fn rewrite_site(chunk: &mut Chunk<'_>, i: usize, file_size: i32) -> bool {
    let displacement = chunk.operand(i);
    let current_pointer = chunk.current_pointer(i);
    let mut target = current_pointer as i64 + displacement as i64;

    if !is_eligible_target(target, file_size, current_pointer) {
        return false;
    }
    if target >= file_size as i64 {
        // folded from the raw displacement, not from `target`
        target = displacement as i64 - file_size as i64;
    }
    // in range: target is in [-current_pointer, file_size) here
    chunk.set_operand(i, target as i32);
    true
}
