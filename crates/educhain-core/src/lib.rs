//! Hash-linked ledger primitives: block hashing, chain validation and
//! proof-of-work mining, single-threaded or raced across worker threads.

pub mod block;
pub mod cancel;
pub mod chain;
pub mod constants;
pub mod error;
pub mod hash;
pub mod miner;
mod payload;
pub mod transaction;

pub use block::{Block, MiningProgress};
pub use cancel::CancellationToken;
pub use chain::Chain;
pub use error::{BlockError, ChainError, IntegrityViolation, MinerError, ViolationKind};
pub use miner::{benchmark, default_thread_counts, BenchmarkEntry, ConcurrentMiner, MiningReport, Winner};
pub use transaction::Transaction;
