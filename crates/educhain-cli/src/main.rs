use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use educhain_core::constants::DEFAULT_DIFFICULTY;
use educhain_core::hash::{leading_zero_digits, salted_sha256, sha256_hex, sha512_hex};
use educhain_core::{benchmark, default_thread_counts, Block, Chain, ConcurrentMiner, Transaction};
use educhain_storage::json_store::{JsonFileStore, DEFAULT_INDENT};
use educhain_storage::Storage;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "educhain")]
#[command(about = "Hash-linked ledger with proof-of-work mining")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a chain of text blocks, validate it and print it
    Chain {
        #[arg(long, default_value_t = 3)]
        difficulty: usize,
        /// Number of blocks to mine after genesis
        #[arg(long, default_value_t = 2)]
        blocks: u64,
    },
    /// Show that editing a mined block is detected
    Tamper {
        #[arg(long, default_value_t = 2)]
        difficulty: usize,
    },
    /// Transfer funds between accounts and print balances
    Ledger {
        #[arg(long, default_value_t = 2)]
        difficulty: usize,
    },
    /// Race worker threads for one block
    Race {
        #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
        difficulty: usize,
        #[arg(long, default_value_t = 4)]
        workers: usize,
        /// Give up after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Compare mining time across worker counts 1, 2, 4 and max
    Bench {
        #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
        difficulty: usize,
        #[arg(long, default_value_t = 8)]
        max_workers: usize,
    },
    /// Mine a chain and save it as JSON
    Export {
        #[arg(long, default_value_t = 2)]
        difficulty: usize,
        #[arg(long, default_value_t = 3)]
        blocks: u64,
        /// Destination file
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = DEFAULT_INDENT)]
        indent: usize,
    },
    /// Load a JSON chain and validate it
    Verify {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = 2)]
        difficulty: usize,
    },
    /// Hashing basics: avalanche effect and salting
    Crypto {
        #[arg(long, default_value = "Blockchain")]
        text: String,
    },
}

fn now() -> String {
    Local::now().format("%d/%m/%Y %H:%M:%S").to_string()
}

fn text_chain(difficulty: usize, blocks: u64) -> Result<Chain> {
    let mut chain = Chain::new(difficulty);
    for index in 1..=blocks {
        let block = Block::new(index, now(), &format!("Block {index} data"), "")?;
        chain.append_mined(block)?;
    }
    Ok(chain)
}

fn report_validation(chain: &Chain) -> bool {
    match chain.validate() {
        Ok(()) => {
            println!("chain valid: {} blocks intact", chain.len());
            true
        }
        Err(violation) => {
            println!("chain INVALID at {violation}");
            false
        }
    }
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Chain { difficulty, blocks } => {
            let chain = text_chain(difficulty, blocks)?;
            report_validation(&chain);
            println!("{chain}");
        }
        Command::Tamper { difficulty } => {
            let mut chain = Chain::new(difficulty);
            chain.append_mined(Block::new(1, now(), "Original data", "")?)?;
            report_validation(&chain);

            println!("tampering with block 1...");
            if let Some(block) = chain.block_mut(1) {
                block.data = json!("Tampered data!");
            }
            if report_validation(&chain) {
                bail!("tampering went undetected");
            }
        }
        Command::Ledger { difficulty } => {
            let mut chain = Chain::new(difficulty);
            chain.add_transaction(Transaction::new("Alice", "Bob", 50));
            chain.add_transaction(Transaction::new("Bob", "Carol", 30));
            chain.mine_pending_transactions("Miner1", now())?;
            chain.add_transaction(Transaction::new("Carol", "Alice", 20));
            chain.mine_pending_transactions("Miner2", now())?;

            for account in ["Alice", "Bob", "Carol", "Miner1", "Miner2"] {
                println!("{account:<8} {:>6}", chain.balance_of(account));
            }
            report_validation(&chain);
        }
        Command::Race {
            difficulty,
            workers,
            timeout_ms,
        } => {
            let block = Block::new(1, now(), "Concurrent mining test", "0")?;
            let miner = ConcurrentMiner::new(workers);
            let report = match timeout_ms {
                Some(ms) => miner.mine_with_timeout(&block, difficulty, Duration::from_millis(ms))?,
                None => miner.mine(&block, difficulty)?,
            };
            match &report.winner {
                Some(w) => println!(
                    "worker {} won after {:.2?}: nonce {} hash {}",
                    w.worker, report.elapsed, w.nonce, w.hash
                ),
                None => println!("no winner after {:.2?}", report.elapsed),
            }
        }
        Command::Bench {
            difficulty,
            max_workers,
        } => {
            let block = Block::new(1, now(), "Concurrent mining test", "0")?;
            let entries = benchmark(&block, difficulty, &default_thread_counts(max_workers))?;
            println!("{:>7} {:>10} {:>8} {:>10}", "threads", "time", "speedup", "efficiency");
            for e in &entries {
                println!(
                    "{:>7} {:>10.2?} {:>7.2}x {:>9.1}%",
                    e.threads, e.elapsed, e.speedup, e.efficiency
                );
            }
        }
        Command::Export {
            difficulty,
            blocks,
            out,
            indent,
        } => {
            let chain = text_chain(difficulty, blocks)?;
            let store = JsonFileStore::new(&out).with_indent(indent);
            store.save(&chain)?;
            println!("saved {} blocks to {}", chain.len(), out.display());
        }
        Command::Verify { input, difficulty } => {
            let store = JsonFileStore::new(&input);
            let chain = store
                .load(difficulty)
                .with_context(|| format!("loading {}", input.display()))?;
            info!(blocks = chain.len(), "verifying");
            if !report_validation(&chain) {
                bail!("{} failed validation", input.display());
            }
        }
        Command::Crypto { text } => {
            let mut altered = text.clone();
            let last = altered.pop().map_or('x', |c| if c == 'x' { 'y' } else { 'x' });
            altered.push(last);

            let (h1, h2) = (sha256_hex(&text), sha256_hex(&altered));
            println!("sha256({text:?})  = {h1}");
            println!("sha256({altered:?})  = {h2}");
            let shared = h1.chars().zip(h2.chars()).filter(|(a, b)| a == b).count();
            println!("matching hex positions: {shared}/64");
            println!("sha512({text:?})  = {}", sha512_hex(&text));
            println!("salt abc123: {}", salted_sha256(&text, "abc123"));
            println!("salt xyz789: {}", salted_sha256(&text, "xyz789"));
            println!("leading zeros of sha256: {}", leading_zero_digits(&h1));
        }
    }
    Ok(())
}
