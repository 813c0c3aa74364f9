// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! API request and response types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Role;
use crate::storage::{
    CasePriority, CaseStatus, InviteStatus, StoredCase, StoredFirm, StoredInvite, StoredUser,
};

// ---------------------------------------------------------------------------
// Auth

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterFirmRequest {
    pub firm_name: String,
    pub email: String,
    pub password: String,
    pub password2: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Refresh/logout body. The token is optional: the cookie is the fallback.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendOtpRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firm_id: Option<String>,
    pub is_active: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl UserResponse {
    pub fn from_user(user: &StoredUser, role: Role, firm_id: Option<String>, email_verified: bool) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            role,
            firm_id,
            is_active: user.is_active,
            email_verified,
            created_at: user.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Firms

#[derive(Debug, Serialize, ToSchema)]
pub struct FirmResponse {
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
    pub timezone: String,
    pub created_at: DateTime<Utc>,
}

impl From<&StoredFirm> for FirmResponse {
    fn from(firm: &StoredFirm) -> Self {
        Self {
            id: firm.id.clone(),
            name: firm.name.clone(),
            slug: firm.slug.clone(),
            owner_id: firm.owner_id.clone(),
            contact_email: firm.contact_email.clone(),
            phone: firm.phone.clone(),
            address: firm.address.clone(),
            timezone: firm.timezone.clone(),
            created_at: firm.created_at,
        }
    }
}

/// Firm profile update. `name` and `owner` are present only so the handler
/// can reject attempts to change them explicitly.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateFirmRequest {
    pub name: Option<String>,
    pub owner: Option<String>,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub timezone: Option<String>,
}

// ---------------------------------------------------------------------------
// Firm users

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateFirmUserRequest {
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Member role; defaults to STAFF
    #[serde(default)]
    pub role: Option<String>,
    /// Initial password; a default is assigned when omitted
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FirmUserSummaryResponse {
    pub total_users: usize,
    pub user_limit: usize,
    pub remaining: usize,
}

// ---------------------------------------------------------------------------
// Invites

#[derive(Debug, Serialize, ToSchema)]
pub struct InviteResponse {
    pub id: String,
    pub firm_id: String,
    pub invited_user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub status: InviteStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl InviteResponse {
    pub fn from_invite(invite: &StoredInvite, now: DateTime<Utc>) -> Self {
        Self {
            id: invite.id.clone(),
            firm_id: invite.firm_id.clone(),
            invited_user_id: invite.invited_user_id.clone(),
            role: invite.role.clone(),
            status: invite.status(now),
            expires_at: invite.expires_at,
            created_at: invite.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Cases

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCaseRequest {
    pub title: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub case_type: Option<String>,
    /// Manual case number; allocated when omitted or blank
    #[serde(default)]
    pub case_number: Option<String>,
    #[serde(default)]
    pub status: Option<CaseStatus>,
    #[serde(default)]
    pub priority: Option<CasePriority>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub court_name: Option<String>,
    #[serde(default)]
    pub judge_name: Option<String>,
    #[serde(default)]
    pub open_date: Option<NaiveDate>,
    #[serde(default)]
    pub assigned_lead: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateCaseRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub case_type: Option<String>,
    #[serde(default)]
    pub case_number: Option<String>,
    #[serde(default)]
    pub status: Option<CaseStatus>,
    #[serde(default)]
    pub priority: Option<CasePriority>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub court_name: Option<String>,
    #[serde(default)]
    pub judge_name: Option<String>,
    #[serde(default)]
    pub open_date: Option<NaiveDate>,
    #[serde(default)]
    pub close_date: Option<NaiveDate>,
    #[serde(default)]
    pub close_reason: Option<String>,
    #[serde(default)]
    pub assigned_lead: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CaseResponse {
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
}

impl From<&StoredCase> for CaseResponse {
    fn from(case: &StoredCase) -> Self {
        Self {
            id: case.id.clone(),
            firm_id: case.firm_id.clone(),
            client_id: case.client_id.clone(),
            title: case.title.clone(),
            case_type: case.case_type.clone(),
            case_number: case.case_number.clone(),
            status: case.status,
            priority: case.priority,
            description: case.description.clone(),
            court_name: case.court_name.clone(),
            judge_name: case.judge_name.clone(),
            open_date: case.open_date,
            close_date: case.close_date,
            close_reason: case.close_reason.clone(),
            assigned_lead: case.assigned_lead.clone(),
            created_by: case.created_by.clone(),
            created_at: case.created_at,
            updated_at: case.updated_at,
        }
    }
}

/// Case list query string.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CaseListQuery {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub status: Option<CaseStatus>,
    #[serde(default)]
    pub priority: Option<CasePriority>,
    /// Case-insensitive substring match on title or case number
    #[serde(default)]
    pub search: Option<String>,
}
