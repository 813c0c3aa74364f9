// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Authentication and authorization.
//!
//! - [`tokens`]: HS256 access/refresh issuance with mandatory rotation
//! - [`otp`]: email verification codes
//! - [`roles`]: the effective-role resolver
//! - [`guard`]: tenant access decisions
//! - [`session`]: register/login/refresh/logout orchestration
//! - [`extractor`]: the axum `Auth` extractor

pub mod cookies;
pub mod error;
pub mod extractor;
pub mod guard;
pub mod otp;
pub mod password;
pub mod roles;
pub mod session;
pub mod tokens;

pub use cookies::{clear_refresh_cookie, refresh_cookie_value, set_refresh_cookie};
pub use error::AuthError;
pub use extractor::{load_current_user, Auth, CurrentUser, SuperAdminOnly};
pub use guard::{can_access, can_access_case, case_scope, CaseScope};
pub use otp::OtpService;
pub use roles::{resolve, Role};
pub use session::{AuthOutcome, RegisterOwner, SessionService};
pub use tokens::{Claims, TokenIssuer, TokenPair};
