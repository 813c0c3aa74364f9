// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Refresh token blacklist.
//!
//! Refresh tokens are stateless JWTs; revocation works by blacklisting the
//! token's `jti`. A rotated-away or logged-out refresh token is permanently
//! unusable. Rows carry the token expiry so they can be pruned once the
//! token could no longer validate anyway.

use redb::{ReadableDatabase, ReadableTable};

use crate::storage::db::{Db, StorageResult, REVOKED_REFRESH};

pub struct RevokedTokenRepository<'a> {
    db: &'a Db,
}

impl<'a> RevokedTokenRepository<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Blacklist a refresh token id.
    ///
    /// Returns `false` if the jti was already blacklisted. Rotation uses
    /// this check-and-insert so only one of two concurrent rotations of the
    /// same token can win.
    pub fn revoke(&self, jti: &str, expires_at_ts: i64) -> StorageResult<bool> {
        let write_txn = self.db.inner().begin_write()?;
        let newly_revoked = {
            let mut table = write_txn.open_table(REVOKED_REFRESH)?;
            // Bind first: the guard returned by insert borrows the table.
            let inserted = table.insert(jti, expires_at_ts)?.is_none();
            inserted
        };
        write_txn.commit()?;
        Ok(newly_revoked)
    }

    pub fn is_revoked(&self, jti: &str) -> StorageResult<bool> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(REVOKED_REFRESH)?;
        Ok(table.get(jti)?.is_some())
    }

    /// Drop blacklist rows for tokens that expired before `now_ts`.
    pub fn prune(&self, now_ts: i64) -> StorageResult<usize> {
        let write_txn = self.db.inner().begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(REVOKED_REFRESH)?;
            let stale: Vec<String> = table
                .iter()?
                .filter_map(|entry| entry.ok())
                .filter(|(_, exp)| exp.value() < now_ts)
                .map(|(jti, _)| jti.value().to_string())
                .collect();
            for jti in &stale {
                table.remove(jti.as_str())?;
            }
            stale.len()
        };
        write_txn.commit()?;
        Ok(removed)
    }
}
