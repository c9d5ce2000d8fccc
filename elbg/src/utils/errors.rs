#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TrainError {
    #[error("Failed to allocate {requested} elements for the {buffer} buffer")]
    OutOfMemory {
        buffer: &'static str,
        requested: usize,
    },

    #[error("Bootstrap scratch size overflows: {numpoints} points of dimension {dim}")]
    SizeOverflow { numpoints: usize, dim: usize },

    #[error("dim must be at least 1")]
    ZeroDimension,

    #[error("Codebook must hold at least one codeword")]
    EmptyCodebook,

    #[error("Point set is empty")]
    NoPoints,

    #[error("Point buffer length {len} is not a multiple of dim = {dim}")]
    RaggedPoints { len: usize, dim: usize },

    #[error("Codebook length {len} is not a multiple of dim = {dim}")]
    RaggedCodebook { len: usize, dim: usize },

    #[error("nearest_cb holds {len} entries, need at least {numpoints}")]
    NearestTooShort { len: usize, numpoints: usize },

    #[error("Reserved flags must be zero. Got {0:#X}")]
    ReservedFlags(u32),
}
