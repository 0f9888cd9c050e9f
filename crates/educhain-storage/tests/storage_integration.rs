mod helpers;

use educhain_core::{Chain, Transaction, ViolationKind};
use educhain_storage::json_store::JsonFileStore;
use educhain_storage::Storage;
use helpers::{build_chain, create_temp_store};
use rand::Rng;
use serde_json::json;
use std::fs;

#[test]
fn test_save_and_load_roundtrip() -> anyhow::Result<()> {
    let (_dir, store) = create_temp_store();
    let chain = build_chain(2, 3);

    assert!(!store.exists());
    store.save(&chain)?;
    assert!(store.exists());

    let loaded = store.load(2)?;
    assert_eq!(loaded.blocks(), chain.blocks());
    assert!(loaded.is_valid());
    Ok(())
}

#[test]
fn test_export_shape_and_indent() -> anyhow::Result<()> {
    let (_dir, store) = create_temp_store();
    let store = store.with_indent(2);
    store.save(&build_chain(1, 1))?;

    let text = fs::read_to_string(store.path())?;
    assert!(text.starts_with("[\n  {\n    \"index\": 0,\n    \"timestamp\""));

    let value: serde_json::Value = serde_json::from_str(&text)?;
    let first = value[0].as_object().expect("block object");
    let keys: Vec<&str> = first.keys().map(String::as_str).collect();
    for key in ["index", "timestamp", "data", "prior_hash", "nonce", "hash"] {
        assert!(keys.contains(&key), "missing {key}");
    }
    Ok(())
}

#[test]
fn test_tampered_file_fails_validation() -> anyhow::Result<()> {
    let (_dir, store) = create_temp_store();
    store.save(&build_chain(2, 2))?;

    let text = fs::read_to_string(store.path())?;
    let mut value: serde_json::Value = serde_json::from_str(&text)?;
    value[2]["data"] = json!("edited on disk");
    fs::write(store.path(), serde_json::to_string_pretty(&value)?)?;

    let loaded = store.load(2)?;
    let violation = loaded.validate().unwrap_err();
    assert_eq!(violation.index, 2);
    assert!(matches!(violation.kind, ViolationKind::HashMismatch { .. }));
    Ok(())
}

#[test]
fn test_loading_with_higher_difficulty_flags_blocks() -> anyhow::Result<()> {
    let (_dir, store) = create_temp_store();
    store.save(&build_chain(1, 2))?;

    // every block carries at least one zero; demanding 64 cannot hold
    let loaded = store.load(64)?;
    let violation = loaded.validate().unwrap_err();
    assert_eq!(violation.index, 1);
    assert!(matches!(
        violation.kind,
        ViolationKind::InsufficientDifficulty { difficulty: 64, .. }
    ));
    Ok(())
}

#[test]
fn test_transaction_ledger_persists() -> anyhow::Result<()> {
    let (_dir, store) = create_temp_store();
    let mut rng = rand::thread_rng();
    let mut chain = Chain::new(1);
    let amount: u64 = rng.gen_range(1..1_000);
    chain.add_transaction(Transaction::new("Alice", "Bob", amount));
    chain.mine_pending_transactions("Miner1", "01/01/2024 12:00")?;
    store.save(&chain)?;

    let loaded = store.load(1)?;
    assert_eq!(loaded.balance_of("Bob"), amount as i128);
    assert_eq!(loaded.balance_of("Alice"), -(amount as i128));
    assert_eq!(loaded.balance_of("Miner1"), 100);
    Ok(())
}

#[test]
fn test_save_creates_parent_directories() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = JsonFileStore::new(dir.path().join("nested/deeper/chain.json"));
    store.save(&Chain::new(0))?;
    assert!(store.exists());
    assert_eq!(store.load(0)?.len(), 1);
    Ok(())
}

#[test]
fn test_load_errors_name_the_file() {
    let (_dir, store) = create_temp_store();
    let err = store.load(2).unwrap_err();
    assert!(format!("{err:#}").contains("chain.json"));

    fs::write(store.path(), "[]").unwrap();
    let err = store.load(2).unwrap_err();
    assert!(format!("{err:#}").contains("at least the genesis block"));

    fs::write(store.path(), "{ broken").unwrap();
    assert!(store.load(2).is_err());
}
