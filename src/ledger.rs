//! Append-only transaction ledger.
//!
//! The ledger records every consumed transaction reference. The payment
//! verifier probes it (through [`ReplayGuard`]) before touching the chain so
//! a replayed reference fails fast and cheaply; the action handlers append to
//! it inside the same atomic unit as the business mutation it pays for. The
//! reference is the unique key: two appends with one reference must resolve
//! to exactly one winner, whether the race is caught pre-emptively or at
//! commit.

use crate::errors::PaymentError;
use crate::types::{AccountId, ActionKind, TxStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers::types::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One consumed transaction reference and what it paid for.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Unique transaction reference (on-chain hash, or a synthetic
    /// `DEL-...` reference for unpaid audit entries).
    pub reference: String,

    /// Account the action was performed for.
    pub payer_fid: AccountId,

    /// Action kind.
    pub kind: ActionKind,

    /// Amount in atomic units, decimal string.
    pub amount: String,

    /// Recorded outcome.
    pub status: TxStatus,

    /// Human-readable description.
    pub description: String,

    /// When the entry was written.
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    /// Builds an entry for a successful paid action.
    pub fn paid(
        reference: impl Into<String>,
        payer_fid: AccountId,
        kind: ActionKind,
        amount: U256,
        description: impl Into<String>,
    ) -> Self {
        Self {
            reference: reference.into(),
            payer_fid,
            kind,
            amount: amount.to_string(),
            status: TxStatus::Success,
            description: description.into(),
            timestamp: Utc::now(),
        }
    }

    /// Builds an audit entry for an unpaid action (deletions). The reference
    /// is synthesized since no on-chain transaction exists.
    pub fn unpaid(
        payer_fid: AccountId,
        kind: ActionKind,
        resource_id: &str,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            reference: format!("DEL-{}-{}", now.timestamp_millis(), resource_id),
            payer_fid,
            kind,
            amount: "0".to_string(),
            status: TxStatus::Success,
            description: description.into(),
            timestamp: now,
        }
    }
}

/// Read-side replay probe used by the payment verifier.
#[async_trait]
pub trait ReplayGuard: Send + Sync {
    /// Whether `reference` was already consumed.
    async fn is_consumed(&self, reference: &str) -> bool;
}

/// In-memory ledger with first-writer-wins uniqueness on the reference.
///
/// Production deployments back this with the persistence layer's unique
/// constraint; the in-memory form carries the same semantics for tests and
/// single-process use.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    entries: Arc<RwLock<BTreeMap<String, LedgerEntry>>>,
}

impl MemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry. Fails with [`PaymentError::AlreadyUsed`] if the
    /// reference was consumed before; the existing entry is never replaced.
    pub async fn append(&self, entry: LedgerEntry) -> Result<(), PaymentError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&entry.reference) {
            return Err(PaymentError::AlreadyUsed(entry.reference));
        }
        entries.insert(entry.reference.clone(), entry);
        Ok(())
    }

    /// All entries for one payer, newest first.
    pub async fn history(&self, payer_fid: AccountId) -> Vec<LedgerEntry> {
        let entries = self.entries.read().await;
        let mut out: Vec<LedgerEntry> = entries
            .values()
            .filter(|e| e.payer_fid == payer_fid)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out
    }

    /// Number of entries, for audit assertions.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the ledger is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ReplayGuard for MemoryLedger {
    async fn is_consumed(&self, reference: &str) -> bool {
        self.entries.read().await.contains_key(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(reference: &str) -> LedgerEntry {
        LedgerEntry::paid(
            reference,
            194,
            ActionKind::Listing,
            U256::from(5_000_000u64),
            "Listed: Test App",
        )
    }

    #[tokio::test]
    async fn test_append_and_probe() {
        let ledger = MemoryLedger::new();
        assert!(!ledger.is_consumed("0xaaa").await);

        ledger.append(entry("0xaaa")).await.unwrap();
        assert!(ledger.is_consumed("0xaaa").await);
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_reference_rejected() {
        let ledger = MemoryLedger::new();
        ledger.append(entry("0xaaa")).await.unwrap();

        let err = ledger.append(entry("0xaaa")).await.unwrap_err();
        assert!(matches!(err, PaymentError::AlreadyUsed(r) if r == "0xaaa"));
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_append_one_winner() {
        let ledger = MemoryLedger::new();
        let (a, b) = tokio::join!(ledger.append(entry("0xbbb")), ledger.append(entry("0xbbb")));
        assert!(a.is_ok() != b.is_ok());
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let ledger = MemoryLedger::new();
        ledger.append(entry("0x111")).await.unwrap();
        ledger.append(entry("0x222")).await.unwrap();
        ledger
            .append(LedgerEntry::paid(
                "0x333",
                999,
                ActionKind::Featured,
                U256::from(50_000_000u64),
                "Rented slot #1",
            ))
            .await
            .unwrap();

        let history = ledger.history(194).await;
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|e| e.payer_fid == 194));
        assert!(history[0].timestamp >= history[1].timestamp);
    }

    #[test]
    fn test_unpaid_entry_shape() {
        let entry = LedgerEntry::unpaid(194, ActionKind::DeleteListing, "app-7", "Deleted: Test");
        assert!(entry.reference.starts_with("DEL-"));
        assert!(entry.reference.ends_with("app-7"));
        assert_eq!(entry.amount, "0");
        assert_eq!(entry.status, TxStatus::Success);
    }
}
