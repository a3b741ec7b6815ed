use crate::{
    Direction, ForwardTranslator, InverseTranslator, TranslateStats,
    chunk::{Chunk, FileSize},
    error::FilterError,
};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::info;

/// Default chunk size: one 32 KiB cabinet frame.
pub const DEFAULT_CHUNK_SIZE: usize = 0x8000;

/// Parameters used when filtering a whole buffer
#[derive(Debug, Clone)]
pub struct FilterParams {
    /// Size of each independently translated chunk. The last chunk may be shorter.
    pub chunk_size: usize,
    /// Translation modulus. `None` uses the length of the filtered buffer.
    pub file_size: Option<u64>,
    /// Max threads for parallel filtering. `None` = use all available cores.
    pub(crate) num_threads: Option<usize>,
}

impl FilterParams {
    /// Construct new filter params and check validity
    ///
    /// # Parameters
    ///
    /// - `chunk_size`: Size of chunks the buffer is split into. Needs to be at
    ///   least 1; chunks of 10 bytes or fewer are never rewritten.
    /// - `file_size`: Translation modulus, see [`FileSize`]. When `None`, the
    ///   buffer's own length is used.
    pub fn new(chunk_size: usize, file_size: Option<u64>) -> Result<Self, FilterError> {
        Self::with_threads(chunk_size, file_size, None)
    }

    /// Like `new`, but also sets the maximum number of threads for parallel filtering.
    pub fn with_threads(
        chunk_size: usize,
        file_size: Option<u64>,
        num_threads: Option<usize>,
    ) -> Result<Self, FilterError> {
        if chunk_size < 1 {
            return Err(FilterError::InvalidParams("chunk size cannot be less than 1"));
        }
        if num_threads.filter(|n| *n < 1).is_some() {
            return Err(FilterError::InvalidParams("num_threads cannot be less than 1"));
        }
        if let Some(size) = file_size {
            FileSize::new(size)?;
        }

        Ok(Self {
            chunk_size,
            file_size,
            num_threads,
        })
    }

    pub fn num_threads(&self) -> Option<usize> {
        self.num_threads
    }
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            file_size: None,
            num_threads: None,
        }
    }
}

/// Translate every chunk of `buf` in place.
///
/// Chunk `k` covers `buf[k * chunk_size..]` and is translated as if it sat at
/// that offset in the file. Chunks never share bytes, so with the `parallel`
/// feature they are handed out to a rayon pool.
pub fn filter(
    buf: &mut [u8],
    direction: Direction,
    params: &FilterParams,
) -> Result<TranslateStats, FilterError> {
    let file_size = FileSize::new(params.file_size.unwrap_or(buf.len() as u64))?;
    if buf.len() as u64 > i32::MAX as u64 {
        return Err(FilterError::ChunkOutOfRange {
            offset: 0,
            len: buf.len(),
        });
    }

    let chunk_size = params.chunk_size;
    let num_chunks = buf.len().div_ceil(chunk_size);
    info!(
        "filtering ({:?}) with {}B chunks... ({} chunks total)",
        direction, chunk_size, num_chunks
    );

    let stats = run(buf, direction, file_size, params)?;

    info!("rewrote {} of {} call sites", stats.rewritten, stats.sites);
    Ok(stats)
}

fn translate_one(
    k: usize,
    data: &mut [u8],
    chunk_size: usize,
    direction: Direction,
    file_size: FileSize,
) -> Result<TranslateStats, FilterError> {
    let offset = u32::try_from(k * chunk_size).map_err(|_| FilterError::ChunkOutOfRange {
        offset: (k * chunk_size) as u64,
        len: data.len(),
    })?;
    let mut chunk = Chunk::new(offset, data)?;

    Ok(match direction {
        Direction::Forward => {
            let mut t = ForwardTranslator::new(file_size);
            t.apply(&mut chunk);
            t.stats().clone()
        }
        Direction::Inverse => {
            let mut t = InverseTranslator::new(file_size);
            t.apply(&mut chunk);
            t.stats().clone()
        }
    })
}

#[cfg(not(feature = "parallel"))]
fn run(
    buf: &mut [u8],
    direction: Direction,
    file_size: FileSize,
    params: &FilterParams,
) -> Result<TranslateStats, FilterError> {
    let chunk_size = params.chunk_size;
    let mut total = TranslateStats::default();
    for (k, data) in buf.chunks_mut(chunk_size).enumerate() {
        total += translate_one(k, data, chunk_size, direction, file_size)?;
    }
    Ok(total)
}

#[cfg(feature = "parallel")]
fn run(
    buf: &mut [u8],
    direction: Direction,
    file_size: FileSize,
    params: &FilterParams,
) -> Result<TranslateStats, FilterError> {
    let chunk_size = params.chunk_size;
    let do_filter = |buf: &mut [u8]| {
        buf.par_chunks_mut(chunk_size)
            .enumerate()
            .map(|(k, data)| translate_one(k, data, chunk_size, direction, file_size))
            .try_reduce(TranslateStats::default, |a, b| Ok(a + b))
    };

    if let Some(n) = params.num_threads {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(n).build()?;
        pool.install(|| do_filter(buf))
    } else {
        do_filter(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::call_heavy;

    #[test]
    fn params_are_validated() {
        assert!(FilterParams::new(0, None).is_err());
        assert!(FilterParams::with_threads(16, None, Some(0)).is_err());
        assert!(matches!(
            FilterParams::new(16, Some(1 << 31)),
            Err(FilterError::FileSizeTooLarge(_))
        ));
        assert!(FilterParams::with_threads(16, Some(1000), Some(2)).is_ok());
    }

    #[test]
    fn chunks_get_their_file_offset() {
        // one site at the start of the second chunk
        let mut buf = vec![0u8; 64];
        buf[32] = 0xE8;
        buf[33..37].copy_from_slice(&(-0x10i32).to_le_bytes());

        let params = FilterParams::new(32, None).unwrap();
        let stats = filter(&mut buf, Direction::Forward, &params).unwrap();
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.rewritten, 1);
        assert_eq!(i32::from_le_bytes([buf[33], buf[34], buf[35], buf[36]]), 0x10);
    }

    #[test]
    fn sites_in_chunk_tails_are_skipped() {
        // index 28 of a 32-byte chunk is past the scan bound
        let mut buf = vec![0u8; 64];
        buf[28] = 0xE8;
        let before = buf.clone();

        let params = FilterParams::new(32, None).unwrap();
        let stats = filter(&mut buf, Direction::Forward, &params).unwrap();
        assert_eq!(stats.sites, 0);
        assert_eq!(buf, before);
    }

    #[test]
    fn cycle_restores_buffer() {
        let original = call_heavy(&[7, 3, 200, 1, 250, 9, 17, 0, 199, 42], 100_000);
        let mut buf = original.clone();

        let params = FilterParams::new(4096, None).unwrap();
        let fwd = filter(&mut buf, Direction::Forward, &params).unwrap();
        assert!(fwd.rewritten > 0);
        assert_ne!(buf, original);

        let inv = filter(&mut buf, Direction::Inverse, &params).unwrap();
        assert_eq!(fwd.sites, inv.sites);
        assert_eq!(buf, original);
    }

    #[test]
    fn thread_count_does_not_change_output() {
        let original = call_heavy(&[1, 2, 3, 4, 5, 6, 7, 8], 50_000);
        let params = FilterParams::new(1000, Some(60_000)).unwrap();
        let mut a = original.clone();
        filter(&mut a, Direction::Forward, &params).unwrap();

        let params = FilterParams::with_threads(1000, Some(60_000), Some(1)).unwrap();
        let mut b = original.clone();
        filter(&mut b, Direction::Forward, &params).unwrap();

        assert_eq!(a, b);
    }
}
