// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! # Storage Module
//!
//! Persistent storage on the embedded redb database.
//!
//! ## Layout
//!
//! - `db` - database wrapper: table definitions, open, per-firm lock registry
//! - `repository` - typed per-entity access (users, firms, otps, tokens,
//!   invites, cases, counters)
//!
//! All values are serialized as JSON; secondary indexes use composite keys
//! (`scope|!timestamp|id`) for newest-first range scans, and plain string
//! keys for uniqueness indexes (email, firm name/slug, case numbers).

pub mod db;
pub mod repository;

pub use db::{Db, StorageError, StorageResult};
pub use repository::{
    normalize_email, slugify, CaseNumberAllocator, CasePriority, CaseRepository, CaseStatus,
    ClientRepository, FirmRepository, InviteRepository, InviteStatus, OtpRepository,
    RevokedTokenRepository, StoredCase, StoredClient, StoredFirm, StoredInvite, StoredOtp,
    StoredProfile, StoredUser, UserRepository, OTP_TTL_MINUTES, PURPOSE_EMAIL_VERIFICATION,
};
