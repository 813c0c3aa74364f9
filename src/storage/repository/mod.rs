// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Repository layer providing typed access to the embedded database.
//!
//! Each repository provides CRUD operations for one entity type. Multi-
//! entity operations that must be atomic (owner registration, case
//! creation with number allocation, OTP consumption) run inside a single
//! write transaction in the repository that owns the primary entity.

pub mod cases;
pub mod counters;
pub mod firms;
pub mod invites;
pub mod otps;
pub mod tokens;
pub mod users;

pub use cases::{CasePriority, CaseRepository, CaseStatus, ClientRepository, StoredCase, StoredClient};
pub use counters::CaseNumberAllocator;
pub use firms::{slugify, FirmRepository, StoredFirm};
pub use invites::{InviteRepository, InviteStatus, StoredInvite};
pub use otps::{OtpRepository, StoredOtp, OTP_TTL_MINUTES, PURPOSE_EMAIL_VERIFICATION};
pub use tokens::RevokedTokenRepository;
pub use users::{normalize_email, StoredProfile, StoredUser, UserRepository};
