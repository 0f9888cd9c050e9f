use crate::block::Block;
use crate::cancel::CancellationToken;
use crate::constants::{DEFAULT_WORKER_OFFSET, WORKER_PROGRESS_INTERVAL};
use crate::error::{BlockError, MinerError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Races `workers` threads over disjoint nonce progressions of one block.
///
/// Worker `k` starts at `k * offset` and strides by `workers`. The offset is
/// normalized so that `offset % workers == 1`, which puts every worker on a
/// distinct residue class: no nonce is tried twice, and every nonce from
/// [`ConcurrentMiner::coverage_floor`] upwards belongs to some worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConcurrentMiner {
    workers: usize,
    offset: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Winner {
    pub worker: usize,
    pub nonce: u64,
    pub hash: String,
    pub attempts: u64,
}

/// Outcome of one round, produced only after every worker has exited.
#[derive(Clone, Debug)]
pub struct MiningReport {
    pub workers: usize,
    pub difficulty: usize,
    pub elapsed: Duration,
    pub winner: Option<Winner>,
    template: Block,
}

impl MiningReport {
    pub fn found(&self) -> bool {
        self.winner.is_some()
    }

    /// The input block with the winning nonce and hash applied.
    pub fn mined_block(&self) -> Option<Block> {
        self.winner.as_ref().map(|w| {
            let mut block = self.template.clone();
            block.nonce = w.nonce;
            block.hash = w.hash.clone();
            block
        })
    }
}

#[derive(Clone, Debug)]
pub struct BenchmarkEntry {
    pub threads: usize,
    pub elapsed: Duration,
    pub winner_nonce: Option<u64>,
    /// Baseline (first configuration) elapsed time over this one.
    pub speedup: f64,
    /// `speedup / threads * 100`.
    pub efficiency: f64,
}

/// Claim-once result slot shared by the workers of a round.
#[derive(Default)]
struct WinnerSlot {
    claimed: AtomicBool,
    winner: OnceLock<Winner>,
}

impl WinnerSlot {
    /// Returns true for exactly one caller per slot.
    fn claim(&self, winner: Winner) -> bool {
        if self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.winner.get_or_init(|| winner);
        true
    }

    fn into_inner(self) -> Option<Winner> {
        self.winner.into_inner()
    }
}

impl ConcurrentMiner {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            offset: DEFAULT_WORKER_OFFSET,
        }
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Smallest value `>= offset` congruent to 1 modulo the worker count.
    pub fn effective_offset(&self) -> Option<u64> {
        let n = self.workers.max(1) as u64;
        let bump = (1 + n - self.offset % n) % n;
        self.offset.checked_add(bump)
    }

    pub fn start_nonce(&self, worker: usize) -> Result<u64, MinerError> {
        let overflow = MinerError::OffsetOverflow {
            worker,
            offset: self.offset,
        };
        self.effective_offset()
            .and_then(|offset| offset.checked_mul(worker as u64))
            .ok_or(overflow)
    }

    /// Every nonce at or above this value lies in exactly one worker's progression.
    pub fn coverage_floor(&self) -> Result<u64, MinerError> {
        self.start_nonce(self.workers.saturating_sub(1))
    }

    /// Run one round to completion. Blocks until a worker wins.
    pub fn mine(&self, block: &Block, difficulty: usize) -> Result<MiningReport, MinerError> {
        self.mine_with_token(block, difficulty, &CancellationToken::new())
    }

    /// Run one round, cancelling it if no worker wins within `timeout`.
    pub fn mine_with_timeout(
        &self,
        block: &Block,
        difficulty: usize,
        timeout: Duration,
    ) -> Result<MiningReport, MinerError> {
        let token = CancellationToken::new();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let watchdog = {
            let token = token.clone();
            thread::spawn(move || {
                if let Err(mpsc::RecvTimeoutError::Timeout) = done_rx.recv_timeout(timeout) {
                    debug!(?timeout, "mining deadline reached");
                    token.cancel();
                }
            })
        };

        let report = self.mine_with_token(block, difficulty, &token);
        drop(done_tx);
        if watchdog.join().is_err() {
            warn!("mining deadline watchdog panicked");
        }
        report
    }

    /// Run one round that also stops when `token` is cancelled from outside.
    ///
    /// The winner, if any, cancels `token`. Returns only after every worker
    /// has exited; `winner` is `None` when the round was cancelled first.
    pub fn mine_with_token(
        &self,
        block: &Block,
        difficulty: usize,
        token: &CancellationToken,
    ) -> Result<MiningReport, MinerError> {
        if self.workers == 0 {
            return Err(MinerError::NoWorkers);
        }
        let starts = (0..self.workers)
            .map(|worker| self.start_nonce(worker))
            .collect::<Result<Vec<_>, _>>()?;
        let stride = self.workers as u64;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("educhain-miner-{i}"))
            .build()?;

        info!(
            workers = self.workers,
            difficulty,
            index = block.index,
            "starting concurrent mining round"
        );

        let slot = WinnerSlot::default();
        let failure: OnceLock<BlockError> = OnceLock::new();
        let started = Instant::now();

        pool.scope(|scope| {
            for (worker, start) in starts.into_iter().enumerate() {
                let mut local = block.clone();
                let (slot, failure) = (&slot, &failure);
                scope.spawn(move |_| {
                    local.nonce = start;
                    let outcome = local.search(
                        difficulty,
                        stride,
                        Some(token),
                        WORKER_PROGRESS_INTERVAL,
                        |p| debug!(worker, attempts = p.attempts, hash = %p.hash_preview, "worker progress"),
                    );
                    match outcome {
                        Ok(Some(attempts)) => {
                            let winner = Winner {
                                worker,
                                nonce: local.nonce,
                                hash: local.hash.clone(),
                                attempts,
                            };
                            if slot.claim(winner) {
                                token.cancel();
                                info!(worker, nonce = local.nonce, attempts, "worker won the round");
                            }
                        }
                        Ok(None) => debug!(worker, "worker stopped"),
                        Err(err) => {
                            failure.get_or_init(|| err);
                        }
                    }
                });
            }
        });

        let elapsed = started.elapsed();
        let winner = slot.into_inner();
        if winner.is_none() {
            if let Some(err) = failure.into_inner() {
                return Err(err.into());
            }
        }

        info!(
            workers = self.workers,
            elapsed_ms = elapsed.as_millis() as u64,
            found = winner.is_some(),
            "mining round finished"
        );

        Ok(MiningReport {
            workers: self.workers,
            difficulty,
            elapsed,
            winner,
            template: block.clone(),
        })
    }
}

/// `[1, 2, 4, max]`, sorted and without duplicates.
pub fn default_thread_counts(max: usize) -> Vec<usize> {
    let mut counts = vec![1, 2, 4, max.max(1)];
    counts.sort_unstable();
    counts.dedup();
    counts
}

/// Mine `block` once per thread count, one configuration at a time, and
/// relate each run to the first one.
pub fn benchmark(
    block: &Block,
    difficulty: usize,
    thread_counts: &[usize],
) -> Result<Vec<BenchmarkEntry>, MinerError> {
    let mut runs = Vec::with_capacity(thread_counts.len());
    for &threads in thread_counts {
        let report = ConcurrentMiner::new(threads).mine(block, difficulty)?;
        info!(threads, elapsed_ms = report.elapsed.as_millis() as u64, "benchmark run");
        runs.push(report);
    }

    let baseline = runs.first().map(|r| r.elapsed.as_secs_f64()).unwrap_or(0.0);
    Ok(runs
        .into_iter()
        .map(|r| {
            let secs = r.elapsed.as_secs_f64();
            let speedup = if secs > 0.0 && baseline > 0.0 {
                baseline / secs
            } else {
                1.0
            };
            BenchmarkEntry {
                threads: r.workers,
                elapsed: r.elapsed,
                winner_nonce: r.winner.map(|w| w.nonce),
                speedup,
                efficiency: speedup / r.workers as f64 * 100.0,
            }
        })
        .collect())
}
