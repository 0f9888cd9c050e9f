use crate::cancel::CancellationToken;
use crate::constants::{HASH_PREVIEW_LEN, PROGRESS_INTERVAL};
use crate::error::BlockError;
use crate::hash::{digest, digest_with_prefix, meets_difficulty, preimage_prefix};
use crate::payload::ensure_finite;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, info};

/// A ledger block. Field order is the exported JSON shape.
///
/// Fields are public: mutating one without recomputing `hash` is allowed and
/// is what `Chain::validate` exists to catch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: String,
    pub data: Value,
    pub prior_hash: String,
    pub nonce: u64,
    pub hash: String,
}

/// Periodic snapshot of a running nonce search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MiningProgress {
    pub attempts: u64,
    pub nonce: u64,
    pub hash_preview: String,
}

impl Block {
    /// Build an unmined block, serializing `data` to its canonical value first.
    pub fn new<T: Serialize + ?Sized>(
        index: u64,
        timestamp: impl Into<String>,
        data: &T,
        prior_hash: impl Into<String>,
    ) -> Result<Self, BlockError> {
        let data = ensure_finite(data)
            .and_then(|()| serde_json::to_value(data))
            .map_err(|source| BlockError::MalformedPayload { index, source })?;
        Ok(Self::from_value(index, timestamp, data, prior_hash))
    }

    pub fn from_value(
        index: u64,
        timestamp: impl Into<String>,
        data: Value,
        prior_hash: impl Into<String>,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp: timestamp.into(),
            data,
            prior_hash: prior_hash.into(),
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.recompute();
        block
    }

    /// Hash the current field values would produce. Does not touch `self.hash`.
    pub fn recompute(&self) -> String {
        digest(
            self.index,
            &self.prior_hash,
            &self.timestamp,
            &self.data,
            self.nonce,
        )
    }

    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        meets_difficulty(&self.hash, difficulty)
    }

    pub fn hash_preview(&self) -> &str {
        preview(&self.hash)
    }

    /// Proof-of-work search: bump the nonce until the hash has `difficulty`
    /// leading zero digits or `cancel` fires.
    ///
    /// Returns `Ok(true)` when a solution was found (and signals `cancel`),
    /// `Ok(false)` when cancelled first. Unbounded without a token.
    pub fn mine(
        &mut self,
        difficulty: usize,
        cancel: Option<&CancellationToken>,
    ) -> Result<bool, BlockError> {
        self.mine_with_progress(difficulty, cancel, |_| {})
    }

    /// Like [`Block::mine`], calling `on_progress` every `PROGRESS_INTERVAL` attempts.
    pub fn mine_with_progress<F>(
        &mut self,
        difficulty: usize,
        cancel: Option<&CancellationToken>,
        on_progress: F,
    ) -> Result<bool, BlockError>
    where
        F: FnMut(&MiningProgress),
    {
        debug!(index = self.index, difficulty, "mining block");
        let found = self
            .search(difficulty, 1, cancel, PROGRESS_INTERVAL, on_progress)?
            .is_some();
        if found {
            info!(
                "Mined block {} with nonce {} and hash {}",
                self.index,
                self.nonce,
                self.hash_preview()
            );
            if let Some(token) = cancel {
                token.cancel();
            }
        }
        Ok(found)
    }

    /// Core nonce loop shared with the concurrent miner.
    ///
    /// Advances the nonce by `stride` per attempt. Returns the number of
    /// attempts on success, `None` if `cancel` was observed first. The
    /// predicate is checked before the flag, and nothing is mutated after the
    /// flag is seen.
    pub(crate) fn search<F>(
        &mut self,
        difficulty: usize,
        stride: u64,
        cancel: Option<&CancellationToken>,
        progress_every: u64,
        mut on_progress: F,
    ) -> Result<Option<u64>, BlockError>
    where
        F: FnMut(&MiningProgress),
    {
        let prefix = preimage_prefix(self.index, &self.prior_hash, &self.timestamp, &self.data);
        self.hash = digest_with_prefix(&prefix, self.nonce);
        let mut attempts = 0u64;

        loop {
            if meets_difficulty(&self.hash, difficulty) {
                return Ok(Some(attempts));
            }
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Ok(None);
            }
            self.nonce = self
                .nonce
                .checked_add(stride)
                .ok_or(BlockError::NonceExhausted { index: self.index })?;
            self.hash = digest_with_prefix(&prefix, self.nonce);
            attempts += 1;

            if progress_every > 0 && attempts % progress_every == 0 {
                on_progress(&MiningProgress {
                    attempts,
                    nonce: self.nonce,
                    hash_preview: preview(&self.hash).to_string(),
                });
            }
        }
    }
}

fn preview(hash: &str) -> &str {
    hash.get(..HASH_PREVIEW_LEN).unwrap_or(hash)
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Block #{}", self.index)?;
        writeln!(f, "  timestamp:  {}", self.timestamp)?;
        writeln!(f, "  prior hash: {}", preview(&self.prior_hash))?;
        writeln!(f, "  hash:       {}", self.hash)?;
        writeln!(f, "  nonce:      {}", self.nonce)?;
        match &self.data {
            Value::Array(items) => write!(f, "  entries:    {}", items.len()),
            Value::String(s) => write!(f, "  data:       {s}"),
            other => write!(f, "  data:       {other}"),
        }
    }
}
