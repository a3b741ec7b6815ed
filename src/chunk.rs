use crate::error::FilterError;

/// Size of the displacement operand following a call opcode.
pub const OPERAND_LEN: usize = 4;

/// Total size of the file a chunk belongs to. Used as the wraparound modulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSize(i32);

impl FileSize {
    pub fn new(size: u64) -> Result<Self, FilterError> {
        i32::try_from(size)
            .map(Self)
            .map_err(|_| FilterError::FileSizeTooLarge(size))
    }

    #[inline(always)]
    pub fn get(self) -> i32 {
        self.0
    }
}

/// A mutable window into a file, starting at an absolute file offset.
///
/// `offset + data.len()` is guaranteed to fit in a non-negative `i32`, so the
/// absolute position of every byte in the chunk is a valid `current_pointer`.
#[derive(Debug)]
pub struct Chunk<'a> {
    offset: u32,
    data: &'a mut [u8],
}

impl<'a> Chunk<'a> {
    pub fn new(offset: u32, data: &'a mut [u8]) -> Result<Self, FilterError> {
        let end = offset as u64 + data.len() as u64;
        if end > i32::MAX as u64 {
            return Err(FilterError::ChunkOutOfRange {
                offset: offset as u64,
                len: data.len(),
            });
        }
        Ok(Self { offset, data })
    }

    #[inline(always)]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        self.data
    }

    #[inline(always)]
    pub(crate) fn byte(&self, i: usize) -> u8 {
        self.data[i]
    }

    /// Absolute file offset of the byte at index `i`.
    #[inline(always)]
    pub fn current_pointer(&self, i: usize) -> i32 {
        // fits: offset + len <= i32::MAX, checked in `new`
        (self.offset as usize + i) as i32
    }

    /// Little-endian operand following the opcode at `i`.
    #[inline(always)]
    pub(crate) fn operand(&self, i: usize) -> i32 {
        let b = &self.data[i + 1..i + 1 + OPERAND_LEN];
        i32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    #[inline(always)]
    pub(crate) fn set_operand(&mut self, i: usize, value: i32) {
        self.data[i + 1..i + 1 + OPERAND_LEN].copy_from_slice(&value.to_le_bytes());
    }
}
