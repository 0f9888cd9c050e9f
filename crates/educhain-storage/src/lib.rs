pub mod json_store;

use anyhow::Result;
use educhain_core::Chain;

/// Persistence for whole chains. Loading never validates; run
/// `Chain::validate` on the result.
pub trait Storage: Send + Sync {
  fn save(&self, chain: &Chain) -> Result<()>;
  fn load(&self, difficulty: usize) -> Result<Chain>;
  fn exists(&self) -> bool;
}
