// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Invite token repository.
//!
//! An invite binds a firm, an invited user stub, a proposed role, and an
//! opaque token. Status is computed from `used_at`/`expires_at`, never
//! stored: PENDING → USED | EXPIRED.

use chrono::{DateTime, Duration, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::db::{Db, StorageError, StorageResult, INVITES};

/// Invite validity window.
pub const INVITE_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InviteStatus {
    Pending,
    Used,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredInvite {
    pub id: String,
    pub firm_id: String,
    pub invited_user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Opaque unique token string
    pub token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl StoredInvite {
    pub fn new(
        firm_id: &str,
        invited_user_id: &str,
        role: Option<String>,
        token: String,
        created_by: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            firm_id: firm_id.to_string(),
            invited_user_id: invited_user_id.to_string(),
            role,
            token,
            expires_at: now + Duration::days(INVITE_TTL_DAYS),
            used_at: None,
            created_by: created_by.to_string(),
            created_at: now,
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> InviteStatus {
        if self.used_at.is_some() {
            InviteStatus::Used
        } else if self.expires_at <= now {
            InviteStatus::Expired
        } else {
            InviteStatus::Pending
        }
    }
}

pub struct InviteRepository<'a> {
    db: &'a Db,
}

impl<'a> InviteRepository<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    pub fn get(&self, invite_id: &str) -> StorageResult<StoredInvite> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(INVITES)?;
        match table.get(invite_id)? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Err(StorageError::NotFound(format!("Invite {invite_id}"))),
        }
    }

    pub fn create(&self, invite: &StoredInvite) -> StorageResult<()> {
        let json = serde_json::to_vec(invite)?;
        let write_txn = self.db.inner().begin_write()?;
        {
            let mut table = write_txn.open_table(INVITES)?;
            if table.get(invite.id.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists(format!("Invite {}", invite.id)));
            }
            table.insert(invite.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn delete(&self, invite_id: &str) -> StorageResult<()> {
        let write_txn = self.db.inner().begin_write()?;
        {
            let mut table = write_txn.open_table(INVITES)?;
            if table.remove(invite_id)?.is_none() {
                return Err(StorageError::NotFound(format!("Invite {invite_id}")));
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// All invites of a firm, newest first.
    pub fn list_by_firm(&self, firm_id: &str) -> StorageResult<Vec<StoredInvite>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(INVITES)?;
        let mut invites = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let invite: StoredInvite = serde_json::from_slice(value.value())?;
            if invite.firm_id == firm_id {
                invites.push(invite);
            }
        }
        invites.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invites)
    }
}
