// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded settlement database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - one table per entity: record id → serialized record (JSON bytes)
//! - `asset_reservations`: custody asset id → mint request id
//! - `intent_claims`: trade intent id → in-flight trade id
//! - `redemption_claims`: redemption id → admin running its burn
//! - `settings`: key → value (reference price, minting pause flag)
//! - `audit_log`: zero-padded sequence number → serialized audit record
//!
//! ## Transactions
//!
//! redb serializes write transactions, so every status transition that runs
//! inside [`SettlementDb::write`] observes the latest committed state and
//! either commits all of its writes or none. Closures passed to `write` must
//! stay synchronous: ledger calls happen between transactions, never inside.

use std::path::Path;

use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use serde::{de::DeserializeOwned, Serialize};

use super::audit::AuditRecord;

// =============================================================================
// Table Definitions
// =============================================================================

/// Record table: id → JSON bytes.
pub type RecordTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Index table: key → id.
pub type IndexTable = TableDefinition<'static, &'static str, &'static str>;

/// Custody asset id → id of the mint request holding it.
pub const ASSET_RESERVATIONS: IndexTable = TableDefinition::new("asset_reservations");

/// Trade intent id → id of the trade currently settling it.
pub const INTENT_CLAIMS: IndexTable = TableDefinition::new("intent_claims");

/// Redemption id → admin whose burn is in flight.
pub const REDEMPTION_CLAIMS: IndexTable = TableDefinition::new("redemption_claims");

/// Runtime settings changed by admins.
pub const SETTINGS: IndexTable = TableDefinition::new("settings");

/// Append-only audit trail, keyed by commit order.
const AUDIT_LOG: RecordTable = TableDefinition::new("audit_log");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DbError {
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

    #[error("corrupt value: {0}")]
    Corrupt(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Records
// =============================================================================

/// An entity persisted in its own table.
pub trait StoredRecord: Serialize + DeserializeOwned {
    /// Table holding every record of this type.
    const TABLE: RecordTable;
    /// Human-readable entity name used in error messages.
    const KIND: &'static str;

    /// Primary key.
    fn record_id(&self) -> &str;
}

fn get_in<R, T>(table: &T, id: &str) -> DbResult<Option<R>>
where
    R: StoredRecord,
    T: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(id)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

fn scan_in<R, T>(table: &T, mut keep: impl FnMut(&R) -> bool) -> DbResult<Vec<R>>
where
    R: StoredRecord,
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let mut records = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        let record: R = serde_json::from_slice(value.value())?;
        if keep(&record) {
            records.push(record);
        }
    }
    Ok(records)
}

fn lookup_in<T>(table: &T, key: &str) -> DbResult<Option<String>>
where
    T: ReadableTable<&'static str, &'static str>,
{
    Ok(table.get(key)?.map(|value| value.value().to_string()))
}

/// Read access shared by read-only and read-write scopes.
pub trait RecordReader {
    /// Fetch a record by id.
    fn get<R: StoredRecord>(&self, id: &str) -> DbResult<Option<R>>;

    /// All records of a type matching `keep`, in key order.
    fn scan<R: StoredRecord>(&self, keep: impl FnMut(&R) -> bool) -> DbResult<Vec<R>>;

    /// Look up a key in an index table.
    fn lookup(&self, index: IndexTable, key: &str) -> DbResult<Option<String>>;

    /// Fetch a record by id, failing with `NotFound` if it is absent.
    fn require<R: StoredRecord>(&self, id: &str) -> DbResult<R> {
        self.get(id)?
            .ok_or_else(|| DbError::NotFound(format!("{} {id}", R::KIND)))
    }
}

// =============================================================================
// Scopes
// =============================================================================

/// Read-only view over a consistent snapshot.
pub struct ReadScope<'t> {
    txn: &'t ReadTransaction,
}

impl RecordReader for ReadScope<'_> {
    fn get<R: StoredRecord>(&self, id: &str) -> DbResult<Option<R>> {
        let table = self.txn.open_table(R::TABLE)?;
        get_in(&table, id)
    }

    fn scan<R: StoredRecord>(&self, keep: impl FnMut(&R) -> bool) -> DbResult<Vec<R>> {
        let table = self.txn.open_table(R::TABLE)?;
        scan_in(&table, keep)
    }

    fn lookup(&self, index: IndexTable, key: &str) -> DbResult<Option<String>> {
        let table = self.txn.open_table(index)?;
        lookup_in(&table, key)
    }
}

impl ReadScope<'_> {
    /// Audit records, newest first.
    pub fn audit_records(&self) -> DbResult<Vec<AuditRecord>> {
        let table = self.txn.open_table(AUDIT_LOG)?;
        let mut records = Vec::new();
        for entry in table.iter()?.rev() {
            let (_, value) = entry?;
            records.push(serde_json::from_slice(value.value())?);
        }
        Ok(records)
    }
}

/// Read-write view; all writes commit together or not at all.
pub struct WriteScope<'t> {
    txn: &'t WriteTransaction,
}

impl RecordReader for WriteScope<'_> {
    fn get<R: StoredRecord>(&self, id: &str) -> DbResult<Option<R>> {
        let table = self.txn.open_table(R::TABLE)?;
        get_in(&table, id)
    }

    fn scan<R: StoredRecord>(&self, keep: impl FnMut(&R) -> bool) -> DbResult<Vec<R>> {
        let table = self.txn.open_table(R::TABLE)?;
        scan_in(&table, keep)
    }

    fn lookup(&self, index: IndexTable, key: &str) -> DbResult<Option<String>> {
        let table = self.txn.open_table(index)?;
        lookup_in(&table, key)
    }
}

impl WriteScope<'_> {
    /// Insert a new record, failing if the id is taken.
    pub fn insert<R: StoredRecord>(&self, record: &R) -> DbResult<()> {
        let json = serde_json::to_vec(record)?;
        let mut table = self.txn.open_table(R::TABLE)?;
        if table.get(record.record_id())?.is_some() {
            return Err(DbError::AlreadyExists(format!(
                "{} {}",
                R::KIND,
                record.record_id()
            )));
        }
        table.insert(record.record_id(), json.as_slice())?;
        Ok(())
    }

    /// Overwrite an existing record.
    pub fn update<R: StoredRecord>(&self, record: &R) -> DbResult<()> {
        let json = serde_json::to_vec(record)?;
        let mut table = self.txn.open_table(R::TABLE)?;
        if table.get(record.record_id())?.is_none() {
            return Err(DbError::NotFound(format!(
                "{} {}",
                R::KIND,
                record.record_id()
            )));
        }
        table.insert(record.record_id(), json.as_slice())?;
        Ok(())
    }

    /// Set `key → value` in an index table.
    pub fn link(&self, index: IndexTable, key: &str, value: &str) -> DbResult<()> {
        let mut table = self.txn.open_table(index)?;
        table.insert(key, value)?;
        Ok(())
    }

    /// Remove `key` from an index table. Returns the previous value.
    pub fn unlink(&self, index: IndexTable, key: &str) -> DbResult<Option<String>> {
        let mut table = self.txn.open_table(index)?;
        let previous = table.remove(key)?.map(|value| value.value().to_string());
        Ok(previous)
    }

    /// Append an audit record in the same transaction as the change it describes.
    pub fn append_audit(&self, record: &AuditRecord) -> DbResult<()> {
        let json = serde_json::to_vec(record)?;
        let mut table = self.txn.open_table(AUDIT_LOG)?;
        let next = match table.last()? {
            Some((key, _)) => {
                key.value()
                    .parse::<u64>()
                    .map_err(|e| DbError::Corrupt(format!("audit sequence: {e}")))?
                    + 1
            }
            None => 1,
        };
        let key = format!("{next:020}");
        table.insert(key.as_str(), json.as_slice())?;
        Ok(())
    }
}

// =============================================================================
// SettlementDb
// =============================================================================

/// Embedded ACID settlement database.
pub struct SettlementDb {
    db: Database,
}

impl SettlementDb {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;
        let this = Self { db };
        this.create_tables()?;
        Ok(this)
    }

    /// Pre-create every table so later read transactions don't fail.
    fn create_tables(&self) -> DbResult<()> {
        use super::repository::{
            Account, CustodyAsset, LoanRequest, MintRequest, PriceLock, RedemptionRequest, Trade,
            TradeIntent,
        };

        let write_txn = self.db.begin_write()?;
        {
            let _ = write_txn.open_table(Account::TABLE)?;
            let _ = write_txn.open_table(TradeIntent::TABLE)?;
            let _ = write_txn.open_table(Trade::TABLE)?;
            let _ = write_txn.open_table(CustodyAsset::TABLE)?;
            let _ = write_txn.open_table(PriceLock::TABLE)?;
            let _ = write_txn.open_table(MintRequest::TABLE)?;
            let _ = write_txn.open_table(RedemptionRequest::TABLE)?;
            let _ = write_txn.open_table(LoanRequest::TABLE)?;
            let _ = write_txn.open_table(ASSET_RESERVATIONS)?;
            let _ = write_txn.open_table(INTENT_CLAIMS)?;
            let _ = write_txn.open_table(REDEMPTION_CLAIMS)?;
            let _ = write_txn.open_table(SETTINGS)?;
            let _ = write_txn.open_table(AUDIT_LOG)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Run `f` against a consistent read snapshot.
    pub fn read<T, E>(&self, f: impl FnOnce(&ReadScope<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let txn = self.db.begin_read().map_err(DbError::from)?;
        let scope = ReadScope { txn: &txn };
        f(&scope)
    }

    /// Run `f` inside a write transaction.
    ///
    /// Commits when `f` returns `Ok`; aborts, discarding every write made by
    /// `f` (audit records included), when it returns `Err`.
    pub fn write<T, E>(&self, f: impl FnOnce(&WriteScope<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let txn = self.db.begin_write().map_err(DbError::from)?;
        let result = f(&WriteScope { txn: &txn });
        match result {
            Ok(value) => {
                txn.commit().map_err(DbError::from)?;
                Ok(value)
            }
            Err(e) => {
                txn.abort().map_err(DbError::from)?;
                Err(e)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
