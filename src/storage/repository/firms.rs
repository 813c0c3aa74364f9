// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Firm (tenant) repository.
//!
//! Firm names are unique case-insensitively; slugs are derived from the
//! name with `-1`, `-2`, … suffixes on collision. Registration creates the
//! owner user, their profile, the firm, and the firm's case counter in one
//! write transaction so a failure anywhere leaves nothing behind.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};

use crate::storage::db::{
    Db, StorageError, StorageResult, CASE_COUNTERS, FIRMS, FIRMS_BY_NAME, FIRMS_BY_SLUG, PROFILES,
    USERS, USERS_BY_EMAIL,
};
use crate::storage::repository::users::{StoredProfile, StoredUser};

/// Persisted firm record. The owner is immutable post-creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredFirm {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub owner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    pub created_at: DateTime<Utc>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Derive a URL-safe slug from a firm name.
///
/// Lowercases, keeps alphanumerics, collapses everything else into single
/// hyphens. Falls back to `firm` when nothing survives.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_was_dash = true;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "firm".to_string()
    } else {
        slug
    }
}

/// Repository for firm records.
pub struct FirmRepository<'a> {
    db: &'a Db,
}

impl<'a> FirmRepository<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    pub fn get(&self, firm_id: &str) -> StorageResult<StoredFirm> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(FIRMS)?;
        match table.get(firm_id)? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Err(StorageError::NotFound(format!("Firm {firm_id}"))),
        }
    }

    /// Case-insensitive name lookup.
    pub fn find_by_name(&self, name: &str) -> StorageResult<Option<StoredFirm>> {
        let read_txn = self.db.inner().begin_read()?;
        let index = read_txn.open_table(FIRMS_BY_NAME)?;
        let firm_id = match index.get(name.trim().to_lowercase().as_str())? {
            Some(value) => value.value().to_string(),
            None => return Ok(None),
        };
        drop(index);
        let table = read_txn.open_table(FIRMS)?;
        match table.get(firm_id.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn find_by_slug(&self, slug: &str) -> StorageResult<Option<StoredFirm>> {
        let read_txn = self.db.inner().begin_read()?;
        let index = read_txn.open_table(FIRMS_BY_SLUG)?;
        let firm_id = match index.get(slug)? {
            Some(value) => value.value().to_string(),
            None => return Ok(None),
        };
        drop(index);
        let table = read_txn.open_table(FIRMS)?;
        match table.get(firm_id.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// The firm a user registered as owner of, if any.
    pub fn get_by_owner(&self, user_id: &str) -> StorageResult<Option<StoredFirm>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(FIRMS)?;
        for entry in table.iter()? {
            let (_, value) = entry?;
            let firm: StoredFirm = serde_json::from_slice(value.value())?;
            if firm.owner_id == user_id {
                return Ok(Some(firm));
            }
        }
        Ok(None)
    }

    /// Update firm contact fields. Name and owner are immutable; callers
    /// reject those changes at the API edge before getting here.
    pub fn update(&self, firm: &StoredFirm) -> StorageResult<()> {
        let json = serde_json::to_vec(firm)?;
        let write_txn = self.db.inner().begin_write()?;
        {
            let mut table = write_txn.open_table(FIRMS)?;
            if table.get(firm.id.as_str())?.is_none() {
                return Err(StorageError::NotFound(format!("Firm {}", firm.id)));
            }
            table.insert(firm.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Atomically create the owner user, their FIRM_OWNER profile, the firm
    /// (with a collision-free slug), and the firm's case counter.
    ///
    /// Uniqueness of email and firm name is re-checked inside the
    /// transaction; the caller's eager validation only exists for nicer
    /// field errors.
    pub fn register_owner(
        &self,
        user: &StoredUser,
        firm_name: &str,
    ) -> StorageResult<StoredFirm> {
        let name = firm_name.trim();
        let name_key = name.to_lowercase();

        let write_txn = self.db.inner().begin_write()?;
        let firm = {
            let mut email_index = write_txn.open_table(USERS_BY_EMAIL)?;
            if email_index.get(user.email.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists(format!(
                    "User with email {}",
                    user.email
                )));
            }

            let mut name_index = write_txn.open_table(FIRMS_BY_NAME)?;
            if name_index.get(name_key.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists(format!("Firm named {name}")));
            }

            let mut slug_index = write_txn.open_table(FIRMS_BY_SLUG)?;
            let base_slug = slugify(name);
            let mut slug = base_slug.clone();
            let mut suffix = 1;
            while slug_index.get(slug.as_str())?.is_some() {
                slug = format!("{base_slug}-{suffix}");
                suffix += 1;
            }

            let firm = StoredFirm {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.to_string(),
                slug: slug.clone(),
                owner_id: user.id.clone(),
                contact_email: Some(user.email.clone()),
                phone: None,
                address: None,
                timezone: default_timezone(),
                created_at: Utc::now(),
            };

            email_index.insert(user.email.as_str(), user.id.as_str())?;
            let mut users = write_txn.open_table(USERS)?;
            let mut owner = user.clone();
            owner.role = Some("FIRM_OWNER".to_string());
            owner.firm_id = Some(firm.id.clone());
            users.insert(owner.id.as_str(), serde_json::to_vec(&owner)?.as_slice())?;

            let mut profiles = write_txn.open_table(PROFILES)?;
            let mut profile = StoredProfile::new(&owner.id);
            profile.role = Some("FIRM_OWNER".to_string());
            profile.firm_id = Some(firm.id.clone());
            profiles.insert(owner.id.as_str(), serde_json::to_vec(&profile)?.as_slice())?;

            name_index.insert(name_key.as_str(), firm.id.as_str())?;
            slug_index.insert(slug.as_str(), firm.id.as_str())?;
            let mut firms = write_txn.open_table(FIRMS)?;
            firms.insert(firm.id.as_str(), serde_json::to_vec(&firm)?.as_slice())?;

            let mut counters = write_txn.open_table(CASE_COUNTERS)?;
            counters.insert(firm.id.as_str(), 1u32)?;

            firm
        };
        write_txn.commit()?;
        Ok(firm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Db) {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(&dir.path().join("test.redb")).unwrap();
        (dir, db)
    }

    #[test]
    fn slugify_basics() {
        assert_eq!(slugify("Acme Law"), "acme-law");
        assert_eq!(slugify("  A & B, LLP  "), "a-b-llp");
        assert_eq!(slugify("法律"), "firm");
    }

    #[test]
    fn register_owner_creates_everything() {
        let (_dir, db) = test_db();
        let repo = FirmRepository::new(&db);
        let user = StoredUser::new("a@x.com", "hash".into());

        let firm = repo.register_owner(&user, "Acme Law").unwrap();
        assert_eq!(firm.slug, "acme-law");
        assert_eq!(firm.owner_id, user.id);

        let users = crate::storage::repository::users::UserRepository::new(&db);
        let owner = users.get(&user.id).unwrap();
        assert_eq!(owner.role.as_deref(), Some("FIRM_OWNER"));
        assert_eq!(owner.firm_id.as_deref(), Some(firm.id.as_str()));

        let profile = users.get_profile(&user.id).unwrap().unwrap();
        assert_eq!(profile.role.as_deref(), Some("FIRM_OWNER"));
        assert!(!profile.email_verified);

        assert!(repo.find_by_name("ACME LAW").unwrap().is_some());
        assert_eq!(repo.get_by_owner(&user.id).unwrap().unwrap().id, firm.id);
    }

    #[test]
    fn duplicate_firm_name_rolls_back_user() {
        let (_dir, db) = test_db();
        let repo = FirmRepository::new(&db);
        repo.register_owner(&StoredUser::new("a@x.com", "h".into()), "Acme Law")
            .unwrap();

        let second = StoredUser::new("b@x.com", "h".into());
        let err = repo.register_owner(&second, "acme law").unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));

        // Nothing of the failed registration was committed.
        let users = crate::storage::repository::users::UserRepository::new(&db);
        assert!(users.find_by_email("b@x.com").unwrap().is_none());
    }

    #[test]
    fn slug_collisions_get_numeric_suffixes() {
        let (_dir, db) = test_db();
        let repo = FirmRepository::new(&db);
        repo.register_owner(&StoredUser::new("a@x.com", "h".into()), "Acme Law")
            .unwrap();
        // Different name, same slug base after slugification.
        let second = repo
            .register_owner(&StoredUser::new("b@x.com", "h".into()), "Acme  Law!")
            .unwrap();
        assert_eq!(second.slug, "acme-law-1");

        let third = repo
            .register_owner(&StoredUser::new("c@x.com", "h".into()), "acme? law?")
            .unwrap();
        assert_eq!(third.slug, "acme-law-2");
    }
}
