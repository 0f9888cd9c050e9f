use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlockError {
    #[error("block {index}: payload cannot be canonically serialized: {source}")]
    MalformedPayload {
        index: u64,
        #[source]
        source: serde_json::Error,
    },
    #[error("block {index}: nonce space exhausted without a solution")]
    NonceExhausted { index: u64 },
}

/// Which of the three validation checks failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViolationKind {
    #[error("stored hash {stored} does not match recomputed hash {computed}")]
    HashMismatch { stored: String, computed: String },
    #[error("prior hash {found} does not match previous block hash {expected}")]
    BrokenLink { expected: String, found: String },
    #[error("hash {hash} has fewer than {difficulty} leading zero digits")]
    InsufficientDifficulty { hash: String, difficulty: usize },
}

/// First integrity violation found by `Chain::validate`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("block {index}: {kind}")]
pub struct IntegrityViolation {
    pub index: usize,
    pub kind: ViolationKind,
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Block(#[from] BlockError),
    #[error("chain must contain at least the genesis block")]
    Empty,
    #[error("chain serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum MinerError {
    #[error("at least one worker is required")]
    NoWorkers,
    #[error("worker {worker} start nonce overflows u64 (offset {offset})")]
    OffsetOverflow { worker: usize, offset: u64 },
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Block(#[from] BlockError),
}
