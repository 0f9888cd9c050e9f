use crate::block::Block;
use crate::constants::{
    DEFAULT_MINING_REWARD, GENESIS_DATA, GENESIS_PRIOR_HASH, GENESIS_TIMESTAMP, REWARD_SENDER,
};
use crate::error::{ChainError, IntegrityViolation, ViolationKind};
use crate::transaction::Transaction;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::fmt;
use std::io::Write;
use tracing::{debug, info, warn};

/// Append-only sequence of blocks starting at a fixed genesis block.
#[derive(Clone, Debug)]
pub struct Chain {
    blocks: Vec<Block>,
    difficulty: usize,
    pending: Vec<Transaction>,
    mining_reward: u64,
}

impl Chain {
    pub fn new(difficulty: usize) -> Self {
        let genesis = Self::genesis_block();
        info!(difficulty, genesis = %genesis.hash_preview(), "chain initialised");
        Self {
            blocks: vec![genesis],
            difficulty,
            pending: Vec::new(),
            mining_reward: DEFAULT_MINING_REWARD,
        }
    }

    /// Rebuild a chain from previously exported blocks. Does not validate.
    pub fn from_blocks(blocks: Vec<Block>, difficulty: usize) -> Result<Self, ChainError> {
        if blocks.is_empty() {
            return Err(ChainError::Empty);
        }
        Ok(Self {
            blocks,
            difficulty,
            pending: Vec::new(),
            mining_reward: DEFAULT_MINING_REWARD,
        })
    }

    pub fn with_mining_reward(mut self, reward: u64) -> Self {
        self.mining_reward = reward;
        self
    }

    /// The fixed first block. Hashed once at nonce 0 and never mined.
    pub fn genesis_block() -> Block {
        Block::from_value(
            0,
            GENESIS_TIMESTAMP,
            Value::String(GENESIS_DATA.to_string()),
            GENESIS_PRIOR_HASH,
        )
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Direct mutable access to a stored block, for tamper experiments.
    /// Changes made here are only caught by [`Chain::validate`].
    pub fn block_mut(&mut self, index: usize) -> Option<&mut Block> {
        self.blocks.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn tip(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    /// Link `block` to the current tip, mine it at the chain difficulty and
    /// append it. Blocks until a nonce is found.
    pub fn append_mined(&mut self, mut block: Block) -> Result<&Block, ChainError> {
        block.prior_hash = self.tip().hash.clone();
        block.hash = block.recompute();
        block.mine(self.difficulty, None)?;
        info!(
            index = block.index,
            nonce = block.nonce,
            hash = %block.hash_preview(),
            "block appended"
        );
        self.blocks.push(block);
        Ok(self.tip())
    }

    /// Check every link after genesis and report the first violation.
    ///
    /// Per block, in order: stored hash matches the recomputed one, prior hash
    /// matches the previous block, hash meets the difficulty.
    pub fn validate(&self) -> Result<(), IntegrityViolation> {
        for (offset, pair) in self.blocks.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            let index = offset + 1;

            let computed = current.recompute();
            let kind = if current.hash != computed {
                Some(ViolationKind::HashMismatch {
                    stored: current.hash.clone(),
                    computed,
                })
            } else if current.prior_hash != previous.hash {
                Some(ViolationKind::BrokenLink {
                    expected: previous.hash.clone(),
                    found: current.prior_hash.clone(),
                })
            } else if !current.meets_difficulty(self.difficulty) {
                Some(ViolationKind::InsufficientDifficulty {
                    hash: current.hash.clone(),
                    difficulty: self.difficulty,
                })
            } else {
                None
            };

            if let Some(kind) = kind {
                let violation = IntegrityViolation { index, kind };
                warn!("chain invalid: {violation}");
                return Err(violation);
            }
        }
        debug!(blocks = self.blocks.len(), "chain valid");
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Queue a transaction. Returns the index of the block that will hold it.
    pub fn add_transaction(&mut self, tx: Transaction) -> u64 {
        debug!(%tx, "transaction queued");
        self.pending.push(tx);
        self.tip().index + 1
    }

    /// Seal the pending pool plus a reward for `miner` into a new block and
    /// mine it. The pool is cleared only once the block is appended.
    pub fn mine_pending_transactions(
        &mut self,
        miner: &str,
        timestamp: impl Into<String>,
    ) -> Result<&Block, ChainError> {
        let mut sealed = self.pending.clone();
        sealed.push(Transaction::new(REWARD_SENDER, miner, self.mining_reward));
        let block = Block::new(self.blocks.len() as u64, timestamp, &sealed, "")?;

        self.append_mined(block)?;
        self.pending.clear();
        info!(miner, reward = self.mining_reward, "pending transactions mined");
        Ok(self.tip())
    }

    /// Credits minus debits for `address` over every block whose payload is
    /// a list of transactions.
    pub fn balance_of(&self, address: &str) -> i128 {
        let mut balance = 0i128;
        for entry in self.blocks.iter().filter_map(|b| b.data.as_array()).flatten() {
            let amount = entry.get("amount").and_then(Value::as_u64).unwrap_or(0) as i128;
            if entry.get("sender").and_then(Value::as_str) == Some(address) {
                balance -= amount;
            }
            if entry.get("receiver").and_then(Value::as_str) == Some(address) {
                balance += amount;
            }
        }
        balance
    }

    /// Write the blocks as a JSON array, pretty printed with `indent` spaces.
    pub fn write_json<W: Write>(&self, writer: W, indent: usize) -> Result<(), ChainError> {
        let pad = vec![b' '; indent];
        let mut ser = serde_json::Serializer::with_formatter(writer, PrettyFormatter::with_indent(&pad));
        self.blocks.serialize(&mut ser)?;
        Ok(())
    }

    pub fn to_json(&self, indent: usize) -> Result<String, ChainError> {
        let mut buf = Vec::new();
        self.write_json(&mut buf, indent)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn from_json(text: &str, difficulty: usize) -> Result<Self, ChainError> {
        let blocks: Vec<Block> = serde_json::from_str(text)?;
        Self::from_blocks(blocks, difficulty)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(70))?;
        for block in &self.blocks {
            writeln!(f, "{block}")?;
        }
        writeln!(f, "{}", "=".repeat(70))?;
        write!(
            f,
            "{} blocks, difficulty {}",
            self.blocks.len(),
            self.difficulty
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HASH_HEX_SIZE;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use serde_json::json;

    fn text_block(index: u64, data: &str) -> Block {
        Block::new(index, "01/01/2024 10:00", data, "").unwrap()
    }

    fn chain_with(difficulty: usize, payloads: &[&str]) -> Chain {
        let mut chain = Chain::new(difficulty);
        for (i, payload) in payloads.iter().enumerate() {
            chain.append_mined(text_block(i as u64 + 1, payload)).unwrap();
        }
        chain
    }

    #[test]
    fn genesis_block_example() {
        let genesis = Chain::genesis_block();
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.prior_hash, "0");
        assert_eq!(genesis.nonce, 0);
        assert_eq!(genesis.data, json!("Genesis Block - EduChain v1.0"));
        assert_eq!(
            genesis.hash,
            "c243a9acbc6f9c9ba7c7e40560db5b5c165378bd10fb85459207973fe687a978"
        );
    }

    #[test]
    fn genesis_only_chain_is_valid_at_any_difficulty() {
        for difficulty in 0..8 {
            let chain = Chain::new(difficulty);
            assert_eq!(chain.len(), 1);
            assert_eq!(chain.validate(), Ok(()));
        }
    }

    #[test]
    fn appended_chain_stays_valid() {
        let chain = chain_with(2, &["one", "two", "three"]);
        assert_eq!(chain.len(), 4);
        assert!(chain.is_valid());
        for pair in chain.blocks().windows(2) {
            assert_eq!(pair[1].prior_hash, pair[0].hash);
            assert!(pair[1].hash.starts_with("00"));
            assert_eq!(pair[1].hash.len(), HASH_HEX_SIZE);
        }
    }

    #[test]
    fn hello_then_tampered_scenario() {
        let mut chain = chain_with(2, &["hello"]);
        assert!(chain.blocks()[1].hash.starts_with("00"));
        assert_eq!(chain.validate(), Ok(()));

        chain.block_mut(1).unwrap().data = json!("tampered");
        let violation = chain.validate().unwrap_err();
        assert_eq!(violation.index, 1);
        assert!(matches!(violation.kind, ViolationKind::HashMismatch { .. }));
    }

    #[test]
    fn tampering_any_field_reports_that_block() {
        let base = chain_with(2, &["a", "b", "c"]);
        let tampers: [fn(&mut Block); 6] = [
            |b| b.data = json!("forged"),
            |b| b.prior_hash = "f".repeat(64),
            |b| b.nonce += 1,
            |b| b.timestamp.push('!'),
            |b| b.index += 10,
            |b| b.hash = "0".repeat(64),
        ];
        for target in 1..base.len() {
            for tamper in &tampers {
                let mut chain = base.clone();
                tamper(chain.block_mut(target).unwrap());
                let violation = chain.validate().unwrap_err();
                assert_eq!(violation.index, target);
                assert!(matches!(violation.kind, ViolationKind::HashMismatch { .. }));
            }
        }
    }

    #[test]
    fn random_tampering_is_always_located() {
        let base = chain_with(1, &["p0", "p1", "p2", "p3", "p4"]);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let mut chain = base.clone();
            let target = rng.gen_range(1..chain.len());
            let block = chain.block_mut(target).unwrap();
            block.data = json!({ "noise": rng.gen::<u32>() });
            assert_eq!(chain.validate().unwrap_err().index, target);
        }
    }

    #[test]
    fn remined_tamper_breaks_next_link() {
        let mut chain = chain_with(2, &["a", "b"]);
        let block = chain.block_mut(1).unwrap();
        block.data = json!("rewritten history");
        block.mine(2, None).unwrap();

        let violation = chain.validate().unwrap_err();
        assert_eq!(violation.index, 2);
        assert!(matches!(violation.kind, ViolationKind::BrokenLink { .. }));
    }

    #[test]
    fn substituted_block_breaks_link() {
        let mut chain = chain_with(2, &["a"]);
        let mut forged = Block::new(1, "01/01/2024 10:00", "a", "ab".repeat(32)).unwrap();
        forged.mine(2, None).unwrap();
        *chain.block_mut(1).unwrap() = forged;

        let violation = chain.validate().unwrap_err();
        assert_eq!(violation.index, 1);
        assert!(matches!(violation.kind, ViolationKind::BrokenLink { .. }));
    }

    #[test]
    fn low_effort_block_fails_difficulty() {
        let mut chain = chain_with(2, &["a"]);
        let genesis_hash = chain.blocks()[0].hash.clone();
        let mut cheap = Block::new(1, "ts", "cheap", genesis_hash).unwrap();
        while cheap.meets_difficulty(2) {
            cheap.nonce += 1;
            cheap.hash = cheap.recompute();
        }
        *chain.block_mut(1).unwrap() = cheap;

        let violation = chain.validate().unwrap_err();
        assert_eq!(violation.index, 1);
        assert_eq!(
            violation.kind,
            ViolationKind::InsufficientDifficulty {
                hash: chain.blocks()[1].hash.clone(),
                difficulty: 2,
            }
        );
    }

    #[test]
    fn validation_stops_at_first_violation() {
        let mut chain = chain_with(1, &["a", "b", "c"]);
        chain.block_mut(3).unwrap().data = json!("late");
        chain.block_mut(2).unwrap().data = json!("early");
        assert_eq!(chain.validate().unwrap_err().index, 2);
    }

    #[test]
    fn independent_chains_converge() {
        let payloads = ["tx batch 1", "tx batch 2", "tx batch 3"];
        let a = chain_with(2, &payloads);
        let b = chain_with(2, &payloads);
        let hashes = |c: &Chain| c.blocks().iter().map(|b| b.hash.clone()).collect::<Vec<_>>();
        assert_eq!(hashes(&a), hashes(&b));
        assert_eq!(a.to_json(2).unwrap(), b.to_json(2).unwrap());
    }

    #[test]
    fn transactions_and_balances() {
        let mut chain = Chain::new(2);
        assert_eq!(chain.add_transaction(Transaction::new("Alice", "Bob", 50)), 1);
        chain.mine_pending_transactions("Miner1", "01/01/2024 10:00").unwrap();
        assert!(chain.pending().is_empty());

        assert_eq!(chain.balance_of("Alice"), -50);
        assert_eq!(chain.balance_of("Bob"), 50);
        assert_eq!(chain.balance_of("Miner1"), 100);

        chain.add_transaction(Transaction::new("Bob", "Carol", 30));
        chain.add_transaction(Transaction::new("Carol", "Alice", 20));
        chain.mine_pending_transactions("Miner2", "01/01/2024 11:00").unwrap();

        assert_eq!(chain.len(), 3);
        assert_eq!(chain.balance_of("Bob"), 20);
        assert_eq!(chain.balance_of("Carol"), 10);
        assert_eq!(chain.balance_of("Alice"), -30);
        assert_eq!(chain.balance_of("Miner2"), 100);
        assert_eq!(chain.balance_of("nobody"), 0);
        assert!(chain.is_valid());
    }

    #[test]
    fn custom_mining_reward() {
        let mut chain = Chain::new(1).with_mining_reward(7);
        chain.mine_pending_transactions("Miner", "ts").unwrap();
        assert_eq!(chain.balance_of("Miner"), 7);
        assert_eq!(chain.balance_of(REWARD_SENDER), -7);
    }

    #[test]
    fn json_export_uses_requested_indent() {
        let chain = chain_with(1, &["x"]);
        let two = chain.to_json(2).unwrap();
        let four = chain.to_json(4).unwrap();
        assert!(two.contains("\n  {\n    \"index\": 0"));
        assert!(four.contains("\n    {\n        \"index\": 0"));
    }

    #[test]
    fn json_export_reloads() {
        let chain = chain_with(2, &["x", "y"]);
        let text = chain.to_json(4).unwrap();
        let back = Chain::from_json(&text, 2).unwrap();
        assert_eq!(back.blocks(), chain.blocks());
        assert!(back.is_valid());
    }

    #[test]
    fn empty_export_is_rejected() {
        assert!(matches!(Chain::from_json("[]", 2), Err(ChainError::Empty)));
        assert!(matches!(
            Chain::from_json("{not json", 2),
            Err(ChainError::Serialization(_))
        ));
    }
}
