pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const DEFAULT_DIFFICULTY: usize = 4;
/// Attempts between two progress notifications of a single-worker search.
pub const PROGRESS_INTERVAL: u64 = 10_000;
/// Attempts between two progress log lines of a concurrent worker.
pub const WORKER_PROGRESS_INTERVAL: u64 = 5_000;
pub const DEFAULT_WORKER_OFFSET: u64 = 10_000;
pub const DEFAULT_MINING_REWARD: u64 = 100;
pub const HASH_PREVIEW_LEN: usize = 10;

pub const GENESIS_TIMESTAMP: &str = "01/01/2024 00:00:00";
pub const GENESIS_DATA: &str = "Genesis Block - EduChain v1.0";
pub const GENESIS_PRIOR_HASH: &str = "0";
pub const REWARD_SENDER: &str = "SYSTEM";
