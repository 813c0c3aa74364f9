// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Roles and the effective-role resolver.
//!
//! Role strings live in several overlapping places (profile, user row,
//! superuser flag, firm ownership). [`resolve`] is the single pure function
//! that folds them into one effective role; nothing else in the codebase
//! re-implements the precedence.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::{StoredProfile, StoredUser};

/// Authorization roles.
///
/// ## Role Hierarchy
///
/// - `SuperAdmin` - platform operator, crosses tenant boundaries
/// - `FirmOwner` - full access within their own firm
/// - `Staff` / `Accountant` / `Viewer` - firm members (no case access yet)
/// - `Client` - read-only access to their own cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    FirmOwner,
    Staff,
    Accountant,
    Viewer,
    Client,
}

impl Role {
    /// Parse a role from a stored string, case-insensitively.
    ///
    /// `"owner"` is accepted as a synonym for FIRM_OWNER; legacy rows use
    /// it interchangeably.
    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_uppercase().as_str() {
            "SUPER_ADMIN" => Some(Role::SuperAdmin),
            "FIRM_OWNER" | "OWNER" => Some(Role::FirmOwner),
            "STAFF" => Some(Role::Staff),
            "ACCOUNTANT" => Some(Role::Accountant),
            "VIEWER" => Some(Role::Viewer),
            "CLIENT" => Some(Role::Client),
            _ => None,
        }
    }
}

impl Default for Role {
    /// Least privilege for authenticated users.
    fn default() -> Self {
        Role::Client
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::FirmOwner => "FIRM_OWNER",
            Role::Staff => "STAFF",
            Role::Accountant => "ACCOUNTANT",
            Role::Viewer => "VIEWER",
            Role::Client => "CLIENT",
        };
        write!(f, "{s}")
    }
}

/// Derive the effective role for a principal.
///
/// Resolution order, first hit wins:
/// 1. role on the profile extension (authoritative when present)
/// 2. role attached directly to the user row
/// 3. superuser flag → SUPER_ADMIN
/// 4. firm ownership or a direct firm association → FIRM_OWNER
/// 5. CLIENT
///
/// Unparseable role strings are skipped rather than denied here; the
/// access guard fails closed on anything it does not recognize.
pub fn resolve(user: &StoredUser, profile: Option<&StoredProfile>, owns_firm: bool) -> Role {
    if let Some(role) = profile
        .and_then(|p| p.role.as_deref())
        .and_then(Role::parse)
    {
        return role;
    }
    if let Some(role) = user.role.as_deref().and_then(Role::parse) {
        return role;
    }
    if user.is_superuser {
        return Role::SuperAdmin;
    }
    if owns_firm || user.firm_id.is_some() {
        return Role::FirmOwner;
    }
    Role::Client
}
