use crate::{
    bounds::MIN_CHUNK_LEN,
    chunk::{Chunk, OPERAND_LEN},
};

/// Opcode byte of a call with a 32-bit relative displacement.
pub const CALL_OPCODE: u8 = 0xE8;

/// Walk `chunk` looking for call sites and hand each one to `step`.
///
/// Indices `0..len - 10` are tested, so any site has at least four operand
/// bytes behind it. Operand bytes of a matched site are skipped, never
/// re-tested as opcodes. Returns the number of sites dispatched.
pub fn scan_sites<F>(chunk: &mut Chunk<'_>, mut step: F) -> usize
where
    F: FnMut(&mut Chunk<'_>, usize),
{
    let len = chunk.len();
    if len <= MIN_CHUNK_LEN {
        return 0;
    }
    let end = len - MIN_CHUNK_LEN;

    let mut sites = 0;
    let mut i = 0;
    while i < end {
        if chunk.byte(i) == CALL_OPCODE {
            step(&mut *chunk, i);
            sites += 1;
            i += OPERAND_LEN;
        }
        i += 1;
    }
    sites
}
