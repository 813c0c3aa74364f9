// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Firm-scoped sequential case number allocation.
//!
//! Each firm has exactly one counter row, owned by this module. Allocation
//! runs under the firm's mutex plus a single write transaction covering the
//! whole read-increment-check-write cycle, so two concurrent creations for
//! the same firm can never receive the same number. Firms do not contend
//! with each other.
//!
//! Numbers are invoice-style: `CIA-<year>-<NNN>` (zero-padded to 3 digits,
//! growing naturally past 999).

use chrono::{Datelike, Utc};
use redb::{ReadableDatabase, ReadableTable, WriteTransaction};

use crate::storage::db::{Db, StorageResult, CASE_COUNTERS, CASE_NUMBERS};

/// Format a candidate case number.
pub(crate) fn format_case_number(year: i32, n: u32) -> String {
    format!("CIA-{year}-{n:03}")
}

/// Uniqueness index key for a `(firm, case_number)` pair.
pub(crate) fn number_key(firm_id: &str, case_number: &str) -> String {
    format!("{firm_id}|{case_number}")
}

/// Run the allocation cycle inside an already-open write transaction.
///
/// Reads the counter (starting at 1), probes candidates against the
/// `(firm, case_number)` index until a free one is found (manually-supplied
/// numbers may occupy slots), persists the incremented counter, and returns
/// the candidate. The caller holds the firm's allocation mutex and commits
/// the transaction; the chosen number stays invisible to other writers
/// until then.
pub(crate) fn allocate_in_txn(
    txn: &WriteTransaction,
    firm_id: &str,
    year: i32,
) -> StorageResult<String> {
    let mut counters = txn.open_table(CASE_COUNTERS)?;
    let numbers = txn.open_table(CASE_NUMBERS)?;

    let mut next = counters.get(firm_id)?.map(|g| g.value()).unwrap_or(1);
    loop {
        let candidate = format_case_number(year, next);
        let key = number_key(firm_id, &candidate);
        next += 1;
        if numbers.get(key.as_str())?.is_none() {
            counters.insert(firm_id, next)?;
            return Ok(candidate);
        }
    }
}

/// The case number allocator: `allocate(firm) -> unique number`.
pub struct CaseNumberAllocator<'a> {
    db: &'a Db,
}

impl<'a> CaseNumberAllocator<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Allocate the next case number for a firm.
    ///
    /// Blocks on the firm's allocation mutex; allocations for different
    /// firms interleave freely.
    pub fn allocate(&self, firm_id: &str) -> StorageResult<String> {
        let lock = self.db.firm_counter_lock(firm_id);
        let _guard = lock.lock().expect("firm counter lock poisoned");

        let txn = self.db.inner().begin_write()?;
        let number = allocate_in_txn(&txn, firm_id, Utc::now().year())?;
        txn.commit()?;
        Ok(number)
    }

    /// Current `next_number` for a firm (1 when the counter is missing).
    pub fn peek_next(&self, firm_id: &str) -> StorageResult<u32> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(CASE_COUNTERS)?;
        Ok(table.get(firm_id)?.map(|g| g.value()).unwrap_or(1))
    }

    /// Administrative override of a firm's counter.
    pub fn set_next(&self, firm_id: &str, next: u32) -> StorageResult<()> {
        let lock = self.db.firm_counter_lock(firm_id);
        let _guard = lock.lock().expect("firm counter lock poisoned");

        let txn = self.db.inner().begin_write()?;
        {
            let mut table = txn.open_table(CASE_COUNTERS)?;
            table.insert(firm_id, next)?;
        }
        txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn test_db() -> (tempfile::TempDir, Arc<Db>) {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(&dir.path().join("test.redb")).unwrap();
        (dir, Arc::new(db))
    }

    fn reserve(db: &Db, firm_id: &str, number: &str) {
        let txn = db.inner().begin_write().unwrap();
        {
            let mut numbers = txn.open_table(CASE_NUMBERS).unwrap();
            numbers
                .insert(number_key(firm_id, number).as_str(), "case-x")
                .unwrap();
        }
        txn.commit().unwrap();
    }

    #[test]
    fn allocates_sequential_numbers() {
        let (_dir, db) = test_db();
        let allocator = CaseNumberAllocator::new(&db);
        let year = Utc::now().year();

        assert_eq!(allocator.allocate("f1").unwrap(), format!("CIA-{year}-001"));
        assert_eq!(allocator.allocate("f1").unwrap(), format!("CIA-{year}-002"));
        assert_eq!(allocator.peek_next("f1").unwrap(), 3);

        // Other firms have their own sequence.
        assert_eq!(allocator.allocate("f2").unwrap(), format!("CIA-{year}-001"));
    }

    #[test]
    fn continues_from_counter_position() {
        let (_dir, db) = test_db();
        let allocator = CaseNumberAllocator::new(&db);
        allocator.set_next("f1", 7).unwrap();

        let year = Utc::now().year();
        assert_eq!(allocator.allocate("f1").unwrap(), format!("CIA-{year}-007"));
        assert_eq!(allocator.allocate("f1").unwrap(), format!("CIA-{year}-008"));
    }

    #[test]
    fn skips_manually_occupied_numbers() {
        let (_dir, db) = test_db();
        let year = Utc::now().year();
        reserve(&db, "f1", &format!("CIA-{year}-001"));
        reserve(&db, "f1", &format!("CIA-{year}-002"));

        let allocator = CaseNumberAllocator::new(&db);
        assert_eq!(allocator.allocate("f1").unwrap(), format!("CIA-{year}-003"));
        // The counter ends up past the occupied slots.
        assert_eq!(allocator.peek_next("f1").unwrap(), 4);
    }

    #[test]
    fn concurrent_allocations_never_collide() {
        let (_dir, db) = test_db();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let db = Arc::clone(&db);
                std::thread::spawn(move || {
                    let allocator = CaseNumberAllocator::new(&db);
                    let mut numbers = Vec::new();
                    for _ in 0..10 {
                        numbers.push(allocator.allocate("f1").unwrap());
                    }
                    numbers
                })
            })
            .collect();

        let mut all: Vec<String> = threads
            .into_iter()
            .flat_map(|t| t.join().unwrap())
            .collect();
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total, "duplicate case numbers allocated");
        assert_eq!(
            CaseNumberAllocator::new(&db).peek_next("f1").unwrap(),
            total as u32 + 1
        );
    }

    #[test]
    fn numbers_grow_past_three_digits() {
        assert_eq!(format_case_number(2025, 7), "CIA-2025-007");
        assert_eq!(format_case_number(2025, 1234), "CIA-2025-1234");
    }
}
