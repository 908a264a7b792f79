// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded payment database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `identities`: email → serialized IdentityRecord
//! - `transactions`: intent_id → serialized TransferIntent (terminal records)
//! - `pending_transfers`: intent_id → serialized PendingTransfer
//! - `processed_messages`: message_id → marker (append-only dedup set)
//! - `daily_spend`: `email:ASSET:date` → f64 accumulator (big-endian bits)
//!
//! Every mutation commits a redb write transaction before returning, so the
//! triggering operation only reports success after the state is durable.
//! redb serializes write transactions, which makes the read-modify-write on
//! the daily-spend accumulator atomic with respect to other writers.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::models::{Asset, EmailAddress, IdentityRecord, PendingTransfer, TransferIntent};

// =============================================================================
// Table Definitions
// =============================================================================

/// email → serialized IdentityRecord (JSON bytes).
const IDENTITIES: TableDefinition<&str, &[u8]> = TableDefinition::new("identities");

/// intent_id → serialized TransferIntent. Terminal (completed/failed) records.
const TRANSACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("transactions");

/// intent_id → serialized PendingTransfer (awaiting recipient onboarding).
const PENDING_TRANSFERS: TableDefinition<&str, &[u8]> = TableDefinition::new("pending_transfers");

/// message_id → marker byte. Append-only inbound dedup set.
const PROCESSED_MESSAGES: TableDefinition<&str, &[u8]> = TableDefinition::new("processed_messages");

/// `email:ASSET:YYYY-MM-DD` → f64 accumulator (to_bits, big-endian).
const DAILY_SPEND: TableDefinition<&str, &[u8]> = TableDefinition::new("daily_spend");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Composite key for the daily-spend accumulator.
fn spend_key(email: &EmailAddress, asset: Asset, day: NaiveDate) -> String {
    format!("{}:{}:{}", email, asset, day.format("%Y-%m-%d"))
}

// =============================================================================
// PaymentDb
// =============================================================================

/// Embedded ACID database holding identities, transfer records, pending
/// transfers, the inbound dedup set, and daily spend counters.
pub struct PaymentDb {
    db: Database,
}

impl PaymentDb {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(IDENTITIES)?;
            let _ = write_txn.open_table(TRANSACTIONS)?;
            let _ = write_txn.open_table(PENDING_TRANSFERS)?;
            let _ = write_txn.open_table(PROCESSED_MESSAGES)?;
            let _ = write_txn.open_table(DAILY_SPEND)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // =========================================================================
    // Identities
    // =========================================================================

    /// Insert a new identity record. Fails if the email already has one.
    pub fn create_identity(&self, record: &IdentityRecord) -> StoreResult<()> {
        let json = serde_json::to_vec(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(IDENTITIES)?;
            if table.get(record.email.as_str())?.is_some() {
                return Err(StoreError::AlreadyExists(format!(
                    "Identity {}",
                    record.email
                )));
            }
            table.insert(record.email.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up an identity by email.
    pub fn get_identity(&self, email: &EmailAddress) -> StoreResult<Option<IdentityRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(IDENTITIES)?;
        match table.get(email.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Overwrite an existing identity record.
    pub fn update_identity(&self, record: &IdentityRecord) -> StoreResult<()> {
        let json = serde_json::to_vec(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(IDENTITIES)?;
            if table.get(record.email.as_str())?.is_none() {
                return Err(StoreError::NotFound(format!("Identity {}", record.email)));
            }
            table.insert(record.email.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // =========================================================================
    // Terminal transfer records
    // =========================================================================

    /// Insert or update a transfer record (used for terminal states).
    pub fn put_transaction(&self, intent: &TransferIntent) -> StoreResult<()> {
        let json = serde_json::to_vec(intent)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TRANSACTIONS)?;
            table.insert(intent.intent_id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a transfer record by intent id.
    pub fn get_transaction(&self, intent_id: &str) -> StoreResult<Option<TransferIntent>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TRANSACTIONS)?;
        match table.get(intent_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Persist a settled intent and charge the sender's daily counter in one
    /// atomic write transaction. Either both land durably or neither does.
    pub fn record_settlement(&self, intent: &TransferIntent, day: NaiveDate) -> StoreResult<()> {
        let json = serde_json::to_vec(intent)?;
        let key = spend_key(&intent.sender, intent.asset, day);

        let write_txn = self.db.begin_write()?;
        {
            let mut spend_table = write_txn.open_table(DAILY_SPEND)?;
            let current = match spend_table.get(key.as_str())? {
                Some(value) => decode_spend(value.value()),
                None => 0.0,
            };
            let updated = (current + intent.amount).to_bits().to_be_bytes();
            spend_table.insert(key.as_str(), updated.as_slice())?;

            let mut tx_table = write_txn.open_table(TRANSACTIONS)?;
            tx_table.insert(intent.intent_id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // =========================================================================
    // Pending transfers
    // =========================================================================

    /// Park an intent until its recipient finishes onboarding.
    ///
    /// Stamps a fresh expiry of `now + ttl`, so the parked wait gets the
    /// full window even when the intent was minted earlier.
    pub fn put_pending(
        &self,
        intent: &TransferIntent,
        ttl: chrono::Duration,
    ) -> StoreResult<PendingTransfer> {
        let mut pending = PendingTransfer {
            intent: intent.clone(),
            completed: false,
        };
        pending.intent.expires_at = Utc::now() + ttl;

        let json = serde_json::to_vec(&pending)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PENDING_TRANSFERS)?;
            table.insert(pending.intent.intent_id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(pending)
    }

    /// Look up a pending transfer by intent id.
    pub fn get_pending(&self, intent_id: &str) -> StoreResult<Option<PendingTransfer>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PENDING_TRANSFERS)?;
        match table.get(intent_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All uncompleted pending transfers targeting the given recipient.
    pub fn list_pending_for_recipient(
        &self,
        recipient: &EmailAddress,
    ) -> StoreResult<Vec<PendingTransfer>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PENDING_TRANSFERS)?;

        let mut results = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            let pending: PendingTransfer = serde_json::from_slice(entry.1.value())?;
            if !pending.completed && &pending.intent.recipient == recipient {
                results.push(pending);
            }
        }
        // Oldest first, so resumed transfers settle in arrival order.
        results.sort_by_key(|pending| pending.intent.created_at);
        Ok(results)
    }

    /// Mark a pending transfer as resolved. Idempotent: a missing or already
    /// completed entry is a no-op.
    pub fn complete_pending(&self, intent_id: &str) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PENDING_TRANSFERS)?;
            let existing = table.get(intent_id)?.map(|value| value.value().to_vec());

            if let Some(bytes) = existing {
                let mut pending: PendingTransfer = serde_json::from_slice(&bytes)?;
                if !pending.completed {
                    pending.completed = true;
                    let json = serde_json::to_vec(&pending)?;
                    table.insert(intent_id, json.as_slice())?;
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Remove a pending transfer regardless of state.
    pub fn delete_pending(&self, intent_id: &str) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PENDING_TRANSFERS)?;
            table.remove(intent_id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Delete pending transfers whose expiry has passed and that are not
    /// completed. Returns how many entries were purged.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let write_txn = self.db.begin_write()?;
        let purged = {
            let mut table = write_txn.open_table(PENDING_TRANSFERS)?;

            let mut expired_ids = Vec::new();
            for entry in table.iter()? {
                let entry = entry?;
                let pending: PendingTransfer = serde_json::from_slice(entry.1.value())?;
                if !pending.completed && pending.intent.is_expired(now) {
                    expired_ids.push(pending.intent.intent_id);
                }
            }

            for intent_id in &expired_ids {
                table.remove(intent_id.as_str())?;
            }
            expired_ids.len()
        };
        write_txn.commit()?;
        Ok(purged)
    }

    // =========================================================================
    // Inbound message dedup
    // =========================================================================

    /// Whether an inbound message id has already been handled.
    pub fn is_message_processed(&self, message_id: &str) -> StoreResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROCESSED_MESSAGES)?;
        Ok(table.get(message_id)?.is_some())
    }

    /// Record an inbound message id as handled. Append-only.
    pub fn mark_message_processed(&self, message_id: &str) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PROCESSED_MESSAGES)?;
            table.insert(message_id, &[1u8] as &[u8])?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // =========================================================================
    // Daily spend counters
    // =========================================================================

    /// Settled total for (sender, asset) on the given calendar day. A day
    /// with no spending reads as zero; rollover is just a new key.
    pub fn daily_spend(
        &self,
        email: &EmailAddress,
        asset: Asset,
        day: NaiveDate,
    ) -> StoreResult<f64> {
        let key = spend_key(email, asset, day);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DAILY_SPEND)?;
        match table.get(key.as_str())? {
            Some(value) => Ok(decode_spend(value.value())),
            None => Ok(0.0),
        }
    }
}

fn decode_spend(bytes: &[u8]) -> f64 {
    if bytes.len() >= 8 {
        f64::from_bits(u64::from_be_bytes(bytes[..8].try_into().unwrap()))
    } else {
        0.0
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IntentStatus;

    fn temp_db() -> (PaymentDb, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = PaymentDb::open(&dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    fn email(raw: &str) -> EmailAddress {
        EmailAddress::parse(raw).unwrap()
    }

    fn sample_identity(addr: &str) -> IdentityRecord {
        IdentityRecord {
            email: email(addr),
            public_key: "0x04abcd".to_string(),
            address: "0x1111111111111111111111111111111111111111".to_string(),
            otp_code: "123456".to_string(),
            verified: false,
            created_at: Utc::now(),
            verified_at: None,
        }
    }

    fn sample_intent(id: &str, sender: &str, recipient: &str) -> TransferIntent {
        let now = Utc::now();
        TransferIntent {
            intent_id: id.to_string(),
            sender: email(sender),
            recipient: email(recipient),
            amount: 10.0,
            asset: Asset::Pyusd,
            chain_id: 11_155_111,
            created_at: now,
            expires_at: now + chrono::Duration::minutes(30),
            status: IntentStatus::Pending,
            receipt: None,
            failure_reason: None,
        }
    }

    #[test]
    fn create_and_get_identity() {
        let (db, _dir) = temp_db();
        let record = sample_identity("a@b.co");
        db.create_identity(&record).unwrap();

        let loaded = db.get_identity(&record.email).unwrap().unwrap();
        assert_eq!(loaded.email, record.email);
        assert_eq!(loaded.address, record.address);
        assert!(!loaded.verified);
    }

    #[test]
    fn create_identity_twice_fails() {
        let (db, _dir) = temp_db();
        let record = sample_identity("a@b.co");
        db.create_identity(&record).unwrap();

        let result = db.create_identity(&record);
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
    }

    #[test]
    fn update_identity_requires_existing_record() {
        let (db, _dir) = temp_db();
        let record = sample_identity("a@b.co");
        assert!(matches!(
            db.update_identity(&record),
            Err(StoreError::NotFound(_))
        ));

        db.create_identity(&record).unwrap();
        let mut updated = record.clone();
        updated.verified = true;
        db.update_identity(&updated).unwrap();
        assert!(db.get_identity(&record.email).unwrap().unwrap().verified);
    }

    #[test]
    fn pending_lifecycle() {
        let (db, _dir) = temp_db();
        let intent = sample_intent("i-1", "a@b.co", "new@x.co");
        let parked = db.put_pending(&intent, chrono::Duration::minutes(30)).unwrap();
        assert!(!parked.completed);

        let listed = db.list_pending_for_recipient(&email("new@x.co")).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].intent.intent_id, "i-1");

        db.complete_pending("i-1").unwrap();
        assert!(db.get_pending("i-1").unwrap().unwrap().completed);

        // Completed entries stop showing up for resume.
        assert!(db.list_pending_for_recipient(&email("new@x.co")).unwrap().is_empty());

        db.delete_pending("i-1").unwrap();
        assert!(db.get_pending("i-1").unwrap().is_none());
    }

    #[test]
    fn complete_pending_is_idempotent() {
        let (db, _dir) = temp_db();
        // Missing id is a no-op.
        db.complete_pending("missing").unwrap();

        let intent = sample_intent("i-2", "a@b.co", "new@x.co");
        db.put_pending(&intent, chrono::Duration::minutes(30)).unwrap();
        db.complete_pending("i-2").unwrap();
        db.complete_pending("i-2").unwrap();
        assert!(db.get_pending("i-2").unwrap().unwrap().completed);
    }

    #[test]
    fn put_pending_restamps_expiry() {
        let (db, _dir) = temp_db();
        let mut intent = sample_intent("i-3", "a@b.co", "new@x.co");
        // Intent minted long ago with an expiry already in the past.
        intent.expires_at = Utc::now() - chrono::Duration::minutes(5);

        let parked = db.put_pending(&intent, chrono::Duration::minutes(30)).unwrap();
        assert!(parked.intent.expires_at > Utc::now());
    }

    #[test]
    fn sweep_removes_only_expired_uncompleted_entries() {
        let (db, _dir) = temp_db();

        // Fresh entry survives.
        db.put_pending(
            &sample_intent("fresh", "a@b.co", "r@x.co"),
            chrono::Duration::minutes(30),
        )
        .unwrap();
        // Expired entry is purged.
        db.put_pending(
            &sample_intent("stale", "a@b.co", "r@x.co"),
            chrono::Duration::minutes(-1),
        )
        .unwrap();
        // Expired but completed entry is left alone.
        db.put_pending(
            &sample_intent("resolved", "a@b.co", "r@x.co"),
            chrono::Duration::minutes(-1),
        )
        .unwrap();
        db.complete_pending("resolved").unwrap();

        let purged = db.sweep_expired(Utc::now()).unwrap();
        assert_eq!(purged, 1);
        assert!(db.get_pending("fresh").unwrap().is_some());
        assert!(db.get_pending("stale").unwrap().is_none());
        assert!(db.get_pending("resolved").unwrap().is_some());
    }

    #[test]
    fn processed_message_set_is_appended() {
        let (db, _dir) = temp_db();
        assert!(!db.is_message_processed("m-1").unwrap());
        db.mark_message_processed("m-1").unwrap();
        assert!(db.is_message_processed("m-1").unwrap());
    }

    #[test]
    fn daily_spend_accumulates_per_key() {
        let (db, _dir) = temp_db();
        let sender = email("a@b.co");
        let today = Utc::now().date_naive();

        assert_eq!(db.daily_spend(&sender, Asset::Pyusd, today).unwrap(), 0.0);

        let mut intent = sample_intent("t-1", "a@b.co", "r@x.co");
        intent.status = IntentStatus::Completed;
        db.record_settlement(&intent, today).unwrap();

        let mut second = sample_intent("t-2", "a@b.co", "r@x.co");
        second.amount = 2.5;
        second.status = IntentStatus::Completed;
        db.record_settlement(&second, today).unwrap();

        assert_eq!(db.daily_spend(&sender, Asset::Pyusd, today).unwrap(), 12.5);

        // Different asset and different day are independent keys.
        assert_eq!(db.daily_spend(&sender, Asset::Eth, today).unwrap(), 0.0);
        let tomorrow = today.succ_opt().unwrap();
        assert_eq!(db.daily_spend(&sender, Asset::Pyusd, tomorrow).unwrap(), 0.0);
    }

    #[test]
    fn record_settlement_persists_the_terminal_record() {
        let (db, _dir) = temp_db();
        let today = Utc::now().date_naive();
        let mut intent = sample_intent("t-9", "a@b.co", "r@x.co");
        intent.status = IntentStatus::Completed;

        db.record_settlement(&intent, today).unwrap();

        let stored = db.get_transaction("t-9").unwrap().unwrap();
        assert_eq!(stored.status, IntentStatus::Completed);
        assert_eq!(stored.amount, 10.0);
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.redb");

        {
            let db = PaymentDb::open(&path).unwrap();
            db.create_identity(&sample_identity("a@b.co")).unwrap();
            db.put_pending(
                &sample_intent("i-1", "a@b.co", "r@x.co"),
                chrono::Duration::minutes(30),
            )
            .unwrap();
            db.mark_message_processed("m-1").unwrap();
        }

        let db = PaymentDb::open(&path).unwrap();
        assert!(db.get_identity(&email("a@b.co")).unwrap().is_some());
        assert_eq!(
            db.list_pending_for_recipient(&email("r@x.co")).unwrap().len(),
            1
        );
        assert!(db.is_message_processed("m-1").unwrap());
    }
}
