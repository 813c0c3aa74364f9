// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Embedded database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized StoredUser
//! - `users_by_email`: normalized email → user_id
//! - `profiles`: user_id → serialized StoredProfile
//! - `firms`: firm_id → serialized StoredFirm
//! - `firms_by_name`: lowercased name → firm_id
//! - `firms_by_slug`: slug → firm_id
//! - `otps`: composite key (user_id|!created_ts|otp_id) → serialized StoredOtp
//! - `revoked_refresh`: refresh jti → expiry unix ts
//! - `invites`: invite_id → serialized StoredInvite
//! - `clients`: client_id → serialized StoredClient
//! - `cases`: case_id → serialized StoredCase
//! - `case_numbers`: (firm_id|case_number) → case_id
//! - `case_counters`: firm_id → next_number

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use redb::{Database, TableDefinition};

// =============================================================================
// Table Definitions
// =============================================================================

pub(crate) const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
pub(crate) const USERS_BY_EMAIL: TableDefinition<&str, &str> =
    TableDefinition::new("users_by_email");
pub(crate) const PROFILES: TableDefinition<&str, &[u8]> = TableDefinition::new("profiles");
pub(crate) const FIRMS: TableDefinition<&str, &[u8]> = TableDefinition::new("firms");
pub(crate) const FIRMS_BY_NAME: TableDefinition<&str, &str> = TableDefinition::new("firms_by_name");
pub(crate) const FIRMS_BY_SLUG: TableDefinition<&str, &str> = TableDefinition::new("firms_by_slug");

/// OTPs keyed `user_id|!created_ts_be|otp_id` so a forward range scan per
/// user yields newest-first ordering.
pub(crate) const OTPS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("otps");

/// Blacklisted refresh token ids. Value is the token expiry so stale rows
/// can be pruned once they could no longer validate anyway.
pub(crate) const REVOKED_REFRESH: TableDefinition<&str, i64> =
    TableDefinition::new("revoked_refresh");

pub(crate) const INVITES: TableDefinition<&str, &[u8]> = TableDefinition::new("invites");
pub(crate) const CLIENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("clients");
pub(crate) const CASES: TableDefinition<&str, &[u8]> = TableDefinition::new("cases");

/// Uniqueness index for non-blank case numbers, scoped per firm.
pub(crate) const CASE_NUMBERS: TableDefinition<&str, &str> = TableDefinition::new("case_numbers");

/// Exactly one counter row per firm, owned by the case number allocator.
pub(crate) const CASE_COUNTERS: TableDefinition<&str, u32> = TableDefinition::new("case_counters");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
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

pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a composite key `scope|!timestamp_be|id`.
///
/// The inverted timestamp ensures newest-first ordering when scanning forward.
pub(crate) fn make_index_key(scope: &str, timestamp: i64, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(scope.len() + 1 + 8 + 1 + id.len());
    key.extend_from_slice(scope.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&(!timestamp as u64).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(id.as_bytes());
    key
}

/// Build a prefix key for range scanning all entries of a scope.
pub(crate) fn make_prefix(scope: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(scope.len() + 1);
    prefix.extend_from_slice(scope.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Build the upper bound for a range scan over a scope prefix.
pub(crate) fn make_prefix_end(scope: &str) -> Vec<u8> {
    let mut end = make_prefix(scope);
    end.extend_from_slice(&[0xFF; 20]);
    end
}

// =============================================================================
// Db
// =============================================================================

/// Embedded ACID database plus the per-firm allocation lock registry.
pub struct Db {
    db: Database,
    /// One mutex per firm, serializing case number allocation for that firm
    /// only. Allocations for different firms proceed independently.
    counter_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Db {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USERS_BY_EMAIL)?;
            let _ = write_txn.open_table(PROFILES)?;
            let _ = write_txn.open_table(FIRMS)?;
            let _ = write_txn.open_table(FIRMS_BY_NAME)?;
            let _ = write_txn.open_table(FIRMS_BY_SLUG)?;
            let _ = write_txn.open_table(OTPS)?;
            let _ = write_txn.open_table(REVOKED_REFRESH)?;
            let _ = write_txn.open_table(INVITES)?;
            let _ = write_txn.open_table(CLIENTS)?;
            let _ = write_txn.open_table(CASES)?;
            let _ = write_txn.open_table(CASE_NUMBERS)?;
            let _ = write_txn.open_table(CASE_COUNTERS)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db,
            counter_locks: Mutex::new(HashMap::new()),
        })
    }

    pub(crate) fn inner(&self) -> &Database {
        &self.db
    }

    /// Readiness probe: open a read transaction against a known table.
    pub fn check_read(&self) -> StorageResult<()> {
        use redb::ReadableDatabase;
        let read_txn = self.db.begin_read()?;
        read_txn.open_table(USERS)?;
        Ok(())
    }

    /// Get the allocation lock for a firm, creating it on first use.
    pub(crate) fn firm_counter_lock(&self, firm_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.counter_locks.lock().expect("counter lock registry poisoned");
        locks
            .entry(firm_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
