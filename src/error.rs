use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("file size {0} does not fit in a signed 32-bit address space")]
    FileSizeTooLarge(u64),
    #[error("chunk at offset {offset} with length {len} extends past the 32-bit address space")]
    ChunkOutOfRange { offset: u64, len: usize },
    #[error("invalid filter parameters: {0}")]
    InvalidParams(&'static str),
    #[cfg(feature = "parallel")]
    #[error("failed to build thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
