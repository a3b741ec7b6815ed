//! Eligibility predicates shared by both translation directions.
//!
//! All comparisons are carried out on operands widened to `i64`, so sums such
//! as `file_size + current_pointer` are exact even when they exceed `i32`.

/// Chunks starting at or past this offset are never rewritten by the forward pass.
pub const ELIGIBLE_OFFSET_LIMIT: u32 = 0x4000_0000;

/// Chunks of this many bytes or fewer cannot hold a scannable site.
pub const MIN_CHUNK_LEN: usize = 10;

#[inline]
pub fn is_eligible_chunk(chunk_offset: u32, chunk_size: usize) -> bool {
    chunk_offset < ELIGIBLE_OFFSET_LIMIT && chunk_size > MIN_CHUNK_LEN
}

/// Forward direction: `0 <= target < file_size + current_pointer`.
#[inline]
pub fn is_eligible_target(target: i64, file_size: i32, current_pointer: i32) -> bool {
    target >= 0 && target < file_size as i64 + current_pointer as i64
}

/// Inverse direction: `-current_pointer <= value < file_size`.
#[inline]
pub fn is_eligible_value(value: i32, file_size: i32, current_pointer: i32) -> bool {
    value as i64 >= -(current_pointer as i64) && value < file_size
}
