// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Email OTP persistence.
//!
//! OTPs are keyed `user_id|!created_ts|otp_id` so a forward range scan per
//! user yields newest-first ordering; verification only ever looks at the
//! most-recently-created unused code for a purpose.

use chrono::{DateTime, Duration, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};

use crate::storage::db::{
    make_index_key, make_prefix, make_prefix_end, Db, StorageError, StorageResult, OTPS, PROFILES,
};
use crate::storage::repository::users::StoredProfile;

/// OTP purpose for first-time email verification.
pub const PURPOSE_EMAIL_VERIFICATION: &str = "email_verification";

/// OTP validity window.
pub const OTP_TTL_MINUTES: i64 = 10;

/// One-time passcode bound to a user and purpose.
///
/// State machine: ISSUED → CONSUMED (`used_at` set, terminal) or
/// EXPIRED (time-based, never stored).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredOtp {
    pub id: String,
    pub user_id: String,
    /// 6 decimal digits, leading zeros preserved
    pub code: String,
    pub purpose: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Immutable once set; gates any reuse
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
}

impl StoredOtp {
    pub fn new(user_id: &str, code: String, purpose: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            code,
            purpose: purpose.to_string(),
            created_at: now,
            expires_at: now + Duration::minutes(OTP_TTL_MINUTES),
            used_at: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    fn key(&self) -> Vec<u8> {
        make_index_key(&self.user_id, self.created_at.timestamp(), &self.id)
    }
}

/// Repository for OTP rows.
pub struct OtpRepository<'a> {
    db: &'a Db,
}

impl<'a> OtpRepository<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    pub fn create(&self, otp: &StoredOtp) -> StorageResult<()> {
        let json = serde_json::to_vec(otp)?;
        let key = otp.key();
        let write_txn = self.db.inner().begin_write()?;
        {
            let mut table = write_txn.open_table(OTPS)?;
            table.insert(key.as_slice(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Most-recently-created OTP of a purpose that has not been consumed.
    /// Expired codes are still returned; the verifier folds expiry into the
    /// single INVALID_CODE outcome.
    pub fn latest_unused(&self, user_id: &str, purpose: &str) -> StorageResult<Option<StoredOtp>> {
        let start = make_prefix(user_id);
        let end = make_prefix_end(user_id);
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(OTPS)?;
        for entry in table.range(start.as_slice()..end.as_slice())? {
            let (_, value) = entry?;
            let otp: StoredOtp = serde_json::from_slice(value.value())?;
            if otp.purpose == purpose && otp.used_at.is_none() {
                return Ok(Some(otp));
            }
        }
        Ok(None)
    }

    /// Consume an OTP and flag the user's email as verified, atomically.
    ///
    /// Fails if the OTP was already consumed (the `used_at` gate) so two
    /// racing verifications cannot both succeed.
    pub fn consume_and_verify_email(&self, otp: &StoredOtp) -> StorageResult<()> {
        let key = otp.key();
        let write_txn = self.db.inner().begin_write()?;
        {
            let mut table = write_txn.open_table(OTPS)?;
            let mut current: StoredOtp = match table.get(key.as_slice())? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StorageError::NotFound(format!("OTP {}", otp.id))),
            };
            if current.used_at.is_some() {
                return Err(StorageError::AlreadyExists(format!("OTP {}", otp.id)));
            }
            current.used_at = Some(Utc::now());
            table.insert(key.as_slice(), serde_json::to_vec(&current)?.as_slice())?;

            let mut profiles = write_txn.open_table(PROFILES)?;
            let mut profile: StoredProfile = match profiles.get(otp.user_id.as_str())? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => StoredProfile::new(&otp.user_id),
            };
            profile.email_verified = true;
            profiles.insert(
                otp.user_id.as_str(),
                serde_json::to_vec(&profile)?.as_slice(),
            )?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
