//! Reversible rewriting of x86 `CALL rel32` operands.
//!
//! Before two executables are diffed, [`Direction::Forward`] turns each call's
//! relative displacement into the absolute position it points to, so code that
//! merely moved still diffs well. After a patch is applied,
//! [`Direction::Inverse`] turns those positions back into displacements.

use std::ops::{Add, AddAssign};

pub mod bounds;
pub mod chunk;
pub mod error;
pub mod filter;
pub mod scan;

mod forward;
mod inverse;

#[cfg(any(test, feature = "instructions"))]
pub mod instructions;

pub use chunk::{Chunk, FileSize};
pub use error::FilterError;
pub use filter::{DEFAULT_CHUNK_SIZE, FilterParams, filter};
pub use forward::ForwardTranslator;
pub use inverse::InverseTranslator;
pub use scan::CALL_OPCODE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// relative displacement -> normalized target, before diffing
    Forward,
    /// normalized target -> relative displacement, after patching
    Inverse,
}

/// Counters gathered while translating. Informational only.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TranslateStats {
    pub chunks: usize,
    pub sites: usize,
    pub rewritten: usize,
}

impl Add for TranslateStats {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for TranslateStats {
    fn add_assign(&mut self, rhs: Self) {
        self.chunks += rhs.chunks;
        self.sites += rhs.sites;
        self.rewritten += rhs.rewritten;
    }
}

/// Translate a single chunk in place.
pub fn translate(chunk: &mut Chunk<'_>, file_size: FileSize, direction: Direction) {
    match direction {
        Direction::Forward => ForwardTranslator::new(file_size).apply(chunk),
        Direction::Inverse => InverseTranslator::new(file_size).apply(chunk),
    }
}
