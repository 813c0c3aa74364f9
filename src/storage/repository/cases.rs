// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Case and client-profile repositories.
//!
//! Cases are soft-deleted only; `(firm, case_number)` is unique for
//! non-blank numbers via the `case_numbers` index. Creation without a
//! number runs the allocator inside the same write transaction, under the
//! firm's allocation mutex.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::db::{Db, StorageError, StorageResult, CASES, CASE_NUMBERS, CLIENTS};
use crate::storage::repository::counters::{allocate_in_txn, number_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    #[default]
    Open,
    Hold,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CasePriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// A client of a firm, linked 1:1 to a login user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredClient {
    pub id: String,
    pub firm_id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl StoredClient {
    pub fn new(firm_id: &str, user_id: &str, name: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            firm_id: firm_id.to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Persisted case record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredCase {
    pub id: String,
    pub firm_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_number: Option<String>,
    pub status: CaseStatus,
    pub priority: CasePriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge_name: Option<String>,
    pub open_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_lead: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl StoredCase {
    pub fn new(firm_id: &str, title: &str, created_by: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            firm_id: firm_id.to_string(),
            client_id: None,
            title: title.to_string(),
            case_type: None,
            case_number: None,
            status: CaseStatus::default(),
            priority: CasePriority::default(),
            description: None,
            court_name: None,
            judge_name: None,
            open_date: now.date_naive(),
            close_date: None,
            close_reason: None,
            assigned_lead: None,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }

    fn nonblank_number(&self) -> Option<&str> {
        self.case_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

pub struct ClientRepository<'a> {
    db: &'a Db,
}

impl<'a> ClientRepository<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    pub fn get(&self, client_id: &str) -> StorageResult<StoredClient> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(CLIENTS)?;
        match table.get(client_id)? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Err(StorageError::NotFound(format!("Client {client_id}"))),
        }
    }

    pub fn create(&self, client: &StoredClient) -> StorageResult<()> {
        let json = serde_json::to_vec(client)?;
        let write_txn = self.db.inner().begin_write()?;
        {
            let mut table = write_txn.open_table(CLIENTS)?;
            table.insert(client.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// The client record owned by a login user, if any.
    pub fn find_by_user(&self, user_id: &str) -> StorageResult<Option<StoredClient>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(CLIENTS)?;
        for entry in table.iter()? {
            let (_, value) = entry?;
            let client: StoredClient = serde_json::from_slice(value.value())?;
            if client.user_id == user_id {
                return Ok(Some(client));
            }
        }
        Ok(None)
    }
}

pub struct CaseRepository<'a> {
    db: &'a Db,
}

impl<'a> CaseRepository<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Insert a case. When no non-blank number is supplied, one is
    /// allocated inside this same transaction under the firm's allocation
    /// mutex; the allocated number is written back into `case`.
    ///
    /// A manually-supplied number that already exists for the firm fails
    /// with `AlreadyExists` (surfaced as a 409 conflict, not a crash).
    pub fn create(&self, case: &mut StoredCase) -> StorageResult<()> {
        match case.nonblank_number().map(str::to_string) {
            Some(number) => {
                case.case_number = Some(number.clone());
                self.insert_with_number(case, &number)
            }
            None => {
                case.case_number = None;
                let lock = self.db.firm_counter_lock(&case.firm_id);
                let _guard = lock.lock().expect("firm counter lock poisoned");

                let txn = self.db.inner().begin_write()?;
                let number = allocate_in_txn(&txn, &case.firm_id, Utc::now().year())?;
                case.case_number = Some(number.clone());
                {
                    let mut numbers = txn.open_table(CASE_NUMBERS)?;
                    numbers.insert(
                        number_key(&case.firm_id, &number).as_str(),
                        case.id.as_str(),
                    )?;
                    let mut cases = txn.open_table(CASES)?;
                    cases.insert(case.id.as_str(), serde_json::to_vec(&*case)?.as_slice())?;
                }
                txn.commit()?;
                Ok(())
            }
        }
    }

    fn insert_with_number(&self, case: &StoredCase, number: &str) -> StorageResult<()> {
        let key = number_key(&case.firm_id, number);
        let txn = self.db.inner().begin_write()?;
        {
            let mut numbers = txn.open_table(CASE_NUMBERS)?;
            if numbers.get(key.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists(format!(
                    "Case number {number}"
                )));
            }
            numbers.insert(key.as_str(), case.id.as_str())?;
            let mut cases = txn.open_table(CASES)?;
            cases.insert(case.id.as_str(), serde_json::to_vec(case)?.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get(&self, case_id: &str) -> StorageResult<StoredCase> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(CASES)?;
        match table.get(case_id)? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Err(StorageError::NotFound(format!("Case {case_id}"))),
        }
    }

    /// Update a case, keeping the `(firm, case_number)` index in sync when
    /// the number changed.
    pub fn update(&self, case: &StoredCase) -> StorageResult<()> {
        let txn = self.db.inner().begin_write()?;
        {
            let mut cases = txn.open_table(CASES)?;
            let previous: StoredCase = match cases.get(case.id.as_str())? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StorageError::NotFound(format!("Case {}", case.id))),
            };

            let old_number = previous.nonblank_number().map(str::to_string);
            let new_number = case.nonblank_number().map(str::to_string);
            if old_number != new_number {
                let mut numbers = txn.open_table(CASE_NUMBERS)?;
                if let Some(old) = &old_number {
                    numbers.remove(number_key(&case.firm_id, old).as_str())?;
                }
                if let Some(new) = &new_number {
                    let key = number_key(&case.firm_id, new);
                    if numbers.get(key.as_str())?.is_some() {
                        return Err(StorageError::AlreadyExists(format!(
                            "Case number {new}"
                        )));
                    }
                    numbers.insert(key.as_str(), case.id.as_str())?;
                }
            }

            cases.insert(case.id.as_str(), serde_json::to_vec(case)?.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Soft delete: the row stays, the number stays reserved.
    pub fn soft_delete(&self, case_id: &str) -> StorageResult<StoredCase> {
        let txn = self.db.inner().begin_write()?;
        let case = {
            let mut cases = txn.open_table(CASES)?;
            let mut case: StoredCase = match cases.get(case_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StorageError::NotFound(format!("Case {case_id}"))),
            };
            case.is_deleted = true;
            case.deleted_at = Some(Utc::now());
            case.updated_at = Utc::now();
            cases.insert(case_id, serde_json::to_vec(&case)?.as_slice())?;
            case
        };
        txn.commit()?;
        Ok(case)
    }

    /// All non-deleted cases, newest first. Tenant scoping and filtering
    /// happen in the access guard / handlers.
    pub fn list(&self) -> StorageResult<Vec<StoredCase>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(CASES)?;
        let mut cases = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let case: StoredCase = serde_json::from_slice(value.value())?;
            if !case.is_deleted {
                cases.push(case);
            }
        }
        cases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(cases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::repository::counters::CaseNumberAllocator;

    fn test_db() -> (tempfile::TempDir, Db) {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(&dir.path().join("test.redb")).unwrap();
        (dir, db)
    }

    #[test]
    fn create_allocates_number_when_blank() {
        let (_dir, db) = test_db();
        let repo = CaseRepository::new(&db);
        CaseNumberAllocator::new(&db).set_next("f1", 7).unwrap();

        let year = Utc::now().year();
        let mut case = StoredCase::new("f1", "Estate of Doe", "u1");
        repo.create(&mut case).unwrap();
        assert_eq!(case.case_number.as_deref(), Some(format!("CIA-{year}-007").as_str()));

        let mut next = StoredCase::new("f1", "Doe v. Roe", "u1");
        next.case_number = Some("   ".to_string()); // blank counts as absent
        repo.create(&mut next).unwrap();
        assert_eq!(next.case_number.as_deref(), Some(format!("CIA-{year}-008").as_str()));
    }

    #[test]
    fn manual_number_bypasses_allocator_but_must_be_unique() {
        let (_dir, db) = test_db();
        let repo = CaseRepository::new(&db);

        let mut first = StoredCase::new("f1", "First", "u1");
        first.case_number = Some("CUSTOM-1".into());
        repo.create(&mut first).unwrap();

        let mut dup = StoredCase::new("f1", "Second", "u1");
        dup.case_number = Some("CUSTOM-1".into());
        assert!(matches!(
            repo.create(&mut dup),
            Err(StorageError::AlreadyExists(_))
        ));

        // Same number in another firm is fine.
        let mut other_firm = StoredCase::new("f2", "Third", "u1");
        other_firm.case_number = Some("CUSTOM-1".into());
        repo.create(&mut other_firm).unwrap();
    }

    #[test]
    fn allocator_skips_manual_numbers() {
        let (_dir, db) = test_db();
        let repo = CaseRepository::new(&db);
        let year = Utc::now().year();

        let mut manual = StoredCase::new("f1", "Manual", "u1");
        manual.case_number = Some(format!("CIA-{year}-001"));
        repo.create(&mut manual).unwrap();

        let mut auto = StoredCase::new("f1", "Auto", "u1");
        repo.create(&mut auto).unwrap();
        assert_eq!(auto.case_number.as_deref(), Some(format!("CIA-{year}-002").as_str()));
    }

    #[test]
    fn soft_delete_keeps_number_reserved() {
        let (_dir, db) = test_db();
        let repo = CaseRepository::new(&db);

        let mut case = StoredCase::new("f1", "Gone", "u1");
        case.case_number = Some("CUSTOM-9".into());
        repo.create(&mut case).unwrap();
        let deleted = repo.soft_delete(&case.id).unwrap();
        assert!(deleted.is_deleted);
        assert!(deleted.deleted_at.is_some());

        // Listing hides it but the number stays taken.
        assert!(repo.list().unwrap().is_empty());
        let mut reuse = StoredCase::new("f1", "Reuse", "u1");
        reuse.case_number = Some("CUSTOM-9".into());
        assert!(matches!(
            repo.create(&mut reuse),
            Err(StorageError::AlreadyExists(_))
        ));
    }

    #[test]
    fn update_reindexes_changed_number() {
        let (_dir, db) = test_db();
        let repo = CaseRepository::new(&db);

        let mut case = StoredCase::new("f1", "Case", "u1");
        case.case_number = Some("A-1".into());
        repo.create(&mut case).unwrap();

        case.case_number = Some("A-2".into());
        repo.update(&case).unwrap();

        // Old number is free again, new one is taken.
        let mut takes_old = StoredCase::new("f1", "Old slot", "u1");
        takes_old.case_number = Some("A-1".into());
        repo.create(&mut takes_old).unwrap();

        let mut takes_new = StoredCase::new("f1", "New slot", "u1");
        takes_new.case_number = Some("A-2".into());
        assert!(matches!(
            repo.create(&mut takes_new),
            Err(StorageError::AlreadyExists(_))
        ));
    }
}
