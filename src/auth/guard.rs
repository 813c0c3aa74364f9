// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Tenant access guard.
//!
//! Pure decision functions over resolved roles. Fail-closed: any role or
//! combination not explicitly granted is denied, so adding a role never
//! silently widens access.

use crate::auth::roles::Role;
use crate::storage::{StoredCase, StoredClient};

/// Visible slice of the case collection for a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseScope {
    /// Every case on the platform (super admin)
    All,
    /// Non-deleted cases of one firm
    Firm(String),
    /// Cases linked to the principal's own client profile
    OwnClient(String),
    /// No cases at all
    Empty,
}

/// Whether a role may touch the case collection at all.
///
/// Staff, accountants, and viewers have no case access; their roles exist
/// for firm membership and future granular permissions.
pub fn can_access(role: Role, write: bool) -> bool {
    match role {
        Role::SuperAdmin | Role::FirmOwner => true,
        Role::Client => !write,
        Role::Staff | Role::Accountant | Role::Viewer => false,
    }
}

/// Compute the case listing scope for a principal.
///
/// A firm owner without a resolvable firm gets [`CaseScope::Empty`], not an
/// error: the account is in a half-configured state and must see nothing.
pub fn case_scope(role: Role, firm_id: Option<&str>, user_id: &str) -> CaseScope {
    match role {
        Role::SuperAdmin => CaseScope::All,
        Role::FirmOwner => match firm_id {
            Some(firm_id) => CaseScope::Firm(firm_id.to_string()),
            None => CaseScope::Empty,
        },
        Role::Client => CaseScope::OwnClient(user_id.to_string()),
        Role::Staff | Role::Accountant | Role::Viewer => CaseScope::Empty,
    }
}

/// Per-object access check for a single case.
///
/// `client` is the requester's own client profile, if any; it is only
/// consulted for the CLIENT role.
pub fn can_access_case(
    role: Role,
    requester_firm_id: Option<&str>,
    client: Option<&StoredClient>,
    case: &StoredCase,
    write: bool,
) -> bool {
    match role {
        Role::SuperAdmin => true,
        Role::FirmOwner => requester_firm_id == Some(case.firm_id.as_str()),
        Role::Client => {
            if write {
                return false;
            }
            match (client, case.client_id.as_deref()) {
                (Some(client), Some(case_client)) => client.id == case_client,
                _ => false,
            }
        }
        Role::Staff | Role::Accountant | Role::Viewer => false,
    }
}
