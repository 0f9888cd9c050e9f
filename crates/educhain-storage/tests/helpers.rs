use educhain_core::{Block, Chain};
use educhain_storage::json_store::JsonFileStore;
use tempfile::{tempdir, TempDir};

pub fn create_temp_store() -> (TempDir, JsonFileStore) {
    // Keep the TempDir alive for as long as the store is used
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("chain.json");
    (temp_dir, JsonFileStore::new(path))
}

pub fn build_chain(difficulty: usize, blocks: usize) -> Chain {
    let mut chain = Chain::new(difficulty);
    for i in 1..=blocks {
        let block = Block::new(i as u64, "01/01/2024 10:00", &format!("payload {i}"), "")
            .expect("string payload");
        chain.append_mined(block).expect("mining");
    }
    chain
}
