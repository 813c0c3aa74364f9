// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! User repository: the credential store.
//!
//! A user row holds the login identity (email + password hash) and the
//! directly-attached role/firm fields. The optional [`StoredProfile`]
//! extension is authoritative for role and firm when present; it also
//! carries the `email_verified` flag set by OTP verification.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::storage::db::{Db, StorageError, StorageResult, PROFILES, USERS, USERS_BY_EMAIL};

/// Canonical form used for the case-insensitive unique email index.
///
/// NFKC-normalized, trimmed, lowercased. Two emails are "the same account"
/// iff their canonical forms are byte-equal.
pub fn normalize_email(email: &str) -> String {
    email.trim().nfkc().collect::<String>().to_lowercase()
}

/// Persisted user record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredUser {
    /// Unique user identifier (UUID)
    pub id: String,
    /// Normalized email (case-insensitive unique)
    pub email: String,
    /// Argon2 PHC-format password hash
    pub password_hash: String,
    /// Role string attached directly to the user, if any.
    /// Compared case-insensitively; the profile role wins when both are set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Direct firm association, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firm_id: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Deactivated users cannot log in
    pub is_active: bool,
    /// Platform superuser flag (resolves to SUPER_ADMIN)
    #[serde(default)]
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
}

impl StoredUser {
    /// Fresh active user with the given credentials and no role/firm yet.
    pub fn new(email: &str, password_hash: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: normalize_email(email),
            password_hash,
            role: None,
            firm_id: None,
            first_name: String::new(),
            last_name: String::new(),
            is_active: true,
            is_superuser: false,
            created_at: Utc::now(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Optional 1:1 user extension, authoritative for role/firm when present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredProfile {
    pub user_id: String,
    pub email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firm_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StoredProfile {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            email_verified: false,
            role: None,
            firm_id: None,
            created_at: Utc::now(),
        }
    }
}

/// Repository for user and profile records.
pub struct UserRepository<'a> {
    db: &'a Db,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    pub fn get(&self, user_id: &str) -> StorageResult<StoredUser> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(user_id)? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Err(StorageError::NotFound(format!("User {user_id}"))),
        }
    }

    /// Case-insensitive email lookup.
    pub fn find_by_email(&self, email: &str) -> StorageResult<Option<StoredUser>> {
        let normalized = normalize_email(email);
        let read_txn = self.db.inner().begin_read()?;
        let index = read_txn.open_table(USERS_BY_EMAIL)?;
        let user_id = match index.get(normalized.as_str())? {
            Some(value) => value.value().to_string(),
            None => return Ok(None),
        };
        let table = read_txn.open_table(USERS)?;
        match table.get(user_id.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Insert a new user, enforcing email uniqueness.
    pub fn create(&self, user: &StoredUser) -> StorageResult<()> {
        let json = serde_json::to_vec(user)?;
        let write_txn = self.db.inner().begin_write()?;
        {
            let mut index = write_txn.open_table(USERS_BY_EMAIL)?;
            if index.get(user.email.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists(format!(
                    "User with email {}",
                    user.email
                )));
            }
            index.insert(user.email.as_str(), user.id.as_str())?;

            let mut table = write_txn.open_table(USERS)?;
            table.insert(user.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Update an existing user. The email is immutable here; changing it
    /// would require reindexing, which no current flow needs.
    pub fn update(&self, user: &StoredUser) -> StorageResult<()> {
        let json = serde_json::to_vec(user)?;
        let write_txn = self.db.inner().begin_write()?;
        {
            let mut table = write_txn.open_table(USERS)?;
            if table.get(user.id.as_str())?.is_none() {
                return Err(StorageError::NotFound(format!("User {}", user.id)));
            }
            table.insert(user.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Hard-delete a user with their email index entry and profile.
    /// Only reachable via explicit admin action.
    pub fn delete(&self, user_id: &str) -> StorageResult<()> {
        let write_txn = self.db.inner().begin_write()?;
        {
            let mut table = write_txn.open_table(USERS)?;
            let user: StoredUser = match table.remove(user_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StorageError::NotFound(format!("User {user_id}"))),
            };
            let mut index = write_txn.open_table(USERS_BY_EMAIL)?;
            index.remove(user.email.as_str())?;
            let mut profiles = write_txn.open_table(PROFILES)?;
            profiles.remove(user_id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_profile(&self, user_id: &str) -> StorageResult<Option<StoredProfile>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(PROFILES)?;
        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Idempotent get-or-create of the profile extension.
    pub fn ensure_profile(&self, user_id: &str) -> StorageResult<StoredProfile> {
        let write_txn = self.db.inner().begin_write()?;
        let profile = {
            let mut table = write_txn.open_table(PROFILES)?;
            // Read fully before inserting; the access guard borrows the table.
            let existing: Option<StoredProfile> = match table.get(user_id)? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };
            match existing {
                Some(profile) => profile,
                None => {
                    let profile = StoredProfile::new(user_id);
                    let json = serde_json::to_vec(&profile)?;
                    table.insert(user_id, json.as_slice())?;
                    profile
                }
            }
        };
        write_txn.commit()?;
        Ok(profile)
    }

    pub fn update_profile(&self, profile: &StoredProfile) -> StorageResult<()> {
        let json = serde_json::to_vec(profile)?;
        let write_txn = self.db.inner().begin_write()?;
        {
            let mut table = write_txn.open_table(PROFILES)?;
            table.insert(profile.user_id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Active users belonging to a firm (via profile or direct field),
    /// newest first. The firm owner is included through their profile.
    pub fn list_by_firm(&self, firm_id: &str) -> StorageResult<Vec<(StoredUser, Option<StoredProfile>)>> {
        let read_txn = self.db.inner().begin_read()?;
        let users = read_txn.open_table(USERS)?;
        let profiles = read_txn.open_table(PROFILES)?;

        let mut result = Vec::new();
        for entry in users.iter()? {
            let (_, value) = entry?;
            let user: StoredUser = serde_json::from_slice(value.value())?;
            if !user.is_active {
                continue;
            }
            let profile: Option<StoredProfile> = match profiles.get(user.id.as_str())? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };
            let in_firm = user.firm_id.as_deref() == Some(firm_id)
                || profile
                    .as_ref()
                    .and_then(|p| p.firm_id.as_deref())
                    .map(|f| f == firm_id)
                    .unwrap_or(false);
            if in_firm {
                result.push((user, profile));
            }
        }
        result.sort_by(|a, b| b.0.created_at.cmp(&a.0.created_at));
        Ok(result)
    }

    pub fn count_active_by_firm(&self, firm_id: &str) -> StorageResult<usize> {
        Ok(self.list_by_firm(firm_id)?.len())
    }
}
