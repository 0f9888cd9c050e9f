use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub receiver: String,
    pub amount: u64,
    pub timestamp: u64,
}

impl Transaction {
    /// A transfer stamped with the current Unix time in seconds.
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, amount: u64) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self::at(sender, receiver, amount, timestamp)
    }

    pub fn at(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: u64,
        timestamp: u64,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
            timestamp,
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.sender, self.receiver, self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_display_example() {
        let tx = Transaction::at("Alice", "Bob", 50, 1_600_000_000);
        assert_eq!(tx.to_string(), "Alice -> Bob: 50");
    }

    #[test]
    fn transaction_serialization_example() {
        let tx = Transaction::at("Alice", "Bob", 10, 1_600_000_000);
        let json = serde_json::to_string(&tx).unwrap();
        let expected = r#"{"sender":"Alice","receiver":"Bob","amount":10,"timestamp":1600000000}"#;
        assert_eq!(json, expected);
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, back);
    }

    #[test]
    fn new_stamps_current_time() {
        let tx = Transaction::new("Alice", "Bob", 1);
        assert!(tx.timestamp > 1_600_000_000);
    }
}
