use crate::{
    TranslateStats,
    bounds::is_eligible_value,
    chunk::{Chunk, FileSize},
    scan::scan_sites,
};

/// Apply-side rewrite: normalized targets become relative displacements again.
///
/// Unlike [`ForwardTranslator`](crate::ForwardTranslator), there is no
/// chunk-level gate: every site found by the scan is considered, whatever the
/// chunk's offset.
#[derive(Debug, Clone)]
pub struct InverseTranslator {
    file_size: FileSize,
    stats: TranslateStats,
}

impl InverseTranslator {
    pub fn new(file_size: FileSize) -> Self {
        Self {
            file_size,
            stats: TranslateStats::default(),
        }
    }

    pub fn apply(&mut self, chunk: &mut Chunk<'_>) {
        let file_size = self.file_size.get();
        let mut rewritten = 0;
        let sites = scan_sites(chunk, |chunk, i| {
            if rewrite_site(chunk, i, file_size) {
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
    let value = chunk.operand(i);
    let current_pointer = chunk.current_pointer(i);

    if !is_eligible_value(value, file_size, current_pointer) {
        return false;
    }
    let displacement = if value >= 0 {
        value.wrapping_sub(current_pointer)
    } else {
        value.wrapping_add(file_size)
    };
    chunk.set_operand(i, displacement);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inverse(offset: u32, file_size: u64, data: &mut [u8]) -> TranslateStats {
        let mut chunk = Chunk::new(offset, data).unwrap();
        let mut t = InverseTranslator::new(FileSize::new(file_size).unwrap());
        t.apply(&mut chunk);
        t.stats().clone()
    }

    fn site(operand: i32, len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        data[0] = 0xE8;
        data[1..5].copy_from_slice(&operand.to_le_bytes());
        data
    }

    fn operand(data: &[u8]) -> i32 {
        i32::from_le_bytes([data[1], data[2], data[3], data[4]])
    }

    #[test]
    fn positive_value_becomes_relative() {
        let mut data = site(0xF0, 16);
        inverse(0x100, 0x10000, &mut data);
        assert_eq!(operand(&data), -0x10);
    }

    #[test]
    fn negative_value_unwraps() {
        let mut data = site(-940, 11);
        let stats = inverse(990, 1000, &mut data);
        assert_eq!(operand(&data), 60);
        assert_eq!(stats.rewritten, 1);
    }

    #[test]
    fn out_of_range_values_are_untouched() {
        for value in [-991, 1000, i32::MIN, i32::MAX] {
            let mut data = site(value, 11);
            let before = data.clone();
            let stats = inverse(990, 1000, &mut data);
            assert_eq!(data, before, "value = {}", value);
            assert_eq!(stats.rewritten, 0);
        }
    }

    #[test]
    fn no_chunk_gate_past_offset_limit() {
        // the forward pass would leave this chunk alone
        let mut data = site(0x10, 16);
        let stats = inverse(0x4000_0000, 0x5000_0000, &mut data);
        assert_eq!(operand(&data), 0x10 - 0x4000_0000);
        assert_eq!(stats.rewritten, 1);
    }

    #[test]
    fn short_chunks_are_not_scanned() {
        let mut data = site(0x10, 10);
        let before = data.clone();
        let stats = inverse(0, 0x10000, &mut data);
        assert_eq!(data, before);
        assert_eq!(stats.sites, 0);
    }
}
