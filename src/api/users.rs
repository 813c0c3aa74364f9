// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Firm member management: list, summary, create, delete.
//!
//! All endpoints are scoped to the caller's firm and gated on the
//! FIRM_OWNER role (super admins pass too). Firms are capped at
//! [`FIRM_USER_LIMIT`] active members, owner included.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde_json::json;

use crate::auth::password::hash_password;
use crate::auth::{resolve, Auth, CurrentUser, Role};
use crate::config::FIRM_USER_LIMIT;
use crate::error::{api_success, ApiError};
use crate::models::{CreateFirmUserRequest, FirmUserSummaryResponse, UserResponse};
use crate::state::AppState;
use crate::storage::{FirmRepository, StoredUser, UserRepository};

/// Initial password for members created without one. Meant to be changed
/// at first login.
const DEFAULT_MEMBER_PASSWORD: &str = "ChangeMe@123";

fn require_owner_firm(current: &CurrentUser) -> Result<String, ApiError> {
    if current.role != Role::FirmOwner && current.role != Role::SuperAdmin {
        return Err(ApiError::forbidden("Only firm owners can manage users"));
    }
    current
        .firm_id
        .clone()
        .ok_or_else(|| ApiError::not_found("No firm associated with this account"))
}

fn member_responses(state: &AppState, firm_id: &str) -> Result<Vec<UserResponse>, ApiError> {
    let users = UserRepository::new(&state.db);
    let firms = FirmRepository::new(&state.db);
    let members = users.list_by_firm(firm_id)?;

    let mut out = Vec::with_capacity(members.len());
    for (user, profile) in &members {
        let owns_firm = firms
            .get_by_owner(&user.id)?
            .map(|f| f.id == firm_id)
            .unwrap_or(false);
        let role = resolve(user, profile.as_ref(), owns_firm);
        let email_verified = profile.as_ref().map(|p| p.email_verified).unwrap_or(false);
        out.push(UserResponse::from_user(
            user,
            role,
            Some(firm_id.to_string()),
            email_verified,
        ));
    }
    Ok(out)
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    security(("bearer" = [])),
    responses((status = 200, body = [UserResponse]))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Auth(current): Auth,
) -> Result<Response, ApiError> {
    let firm_id = require_owner_firm(&current)?;
    let members = member_responses(&state, &firm_id)?;
    Ok(api_success("OK", json!(members), StatusCode::OK))
}

#[utoipa::path(
    get,
    path = "/api/users/summary",
    tag = "Users",
    security(("bearer" = [])),
    responses((status = 200, body = FirmUserSummaryResponse))
)]
pub async fn user_summary(
    State(state): State<AppState>,
    Auth(current): Auth,
) -> Result<Response, ApiError> {
    let firm_id = require_owner_firm(&current)?;
    let total_users = UserRepository::new(&state.db).count_active_by_firm(&firm_id)?;
    let summary = FirmUserSummaryResponse {
        total_users,
        user_limit: FIRM_USER_LIMIT,
        remaining: FIRM_USER_LIMIT.saturating_sub(total_users),
    };
    Ok(api_success("OK", json!(summary), StatusCode::OK))
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateFirmUserRequest,
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 201, body = UserResponse),
        (status = 409, description = "User limit reached")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Auth(current): Auth,
    Json(request): Json<CreateFirmUserRequest>,
) -> Result<Response, ApiError> {
    let firm_id = require_owner_firm(&current)?;
    let users = UserRepository::new(&state.db);

    let total = users.count_active_by_firm(&firm_id)?;
    if total >= FIRM_USER_LIMIT {
        return Err(ApiError::conflict(format!(
            "User limit reached ({FIRM_USER_LIMIT} users per firm)"
        )));
    }

    let role = match request.role.as_deref() {
        None => Role::Staff,
        Some(raw) => match Role::parse(raw) {
            Some(Role::Staff) => Role::Staff,
            Some(Role::Accountant) => Role::Accountant,
            Some(Role::Viewer) => Role::Viewer,
            Some(Role::Client) => Role::Client,
            // Owner and super-admin roles cannot be handed out here.
            _ => return Err(ApiError::field("role", "Invalid role for a firm member.")),
        },
    };

    if users.find_by_email(&request.email)?.is_some() {
        return Err(ApiError::field("email", "A user with this email already exists."));
    }

    let password = request.password.as_deref().unwrap_or(DEFAULT_MEMBER_PASSWORD);
    let password_hash = hash_password(password).map_err(|e| ApiError::internal(e.to_string()))?;

    let mut user = StoredUser::new(&request.email, password_hash);
    user.first_name = request.first_name.trim().to_string();
    user.last_name = request.last_name.trim().to_string();
    user.firm_id = Some(firm_id.clone());
    users.create(&user)?;

    let mut profile = users.ensure_profile(&user.id)?;
    profile.role = Some(role.to_string());
    profile.firm_id = Some(firm_id.clone());
    users.update_profile(&profile)?;

    let response = UserResponse::from_user(&user, role, Some(firm_id), false);
    Ok(api_success("User created successfully", json!(response), StatusCode::CREATED))
}

#[utoipa::path(
    delete,
    path = "/api/users/{user_id}",
    params(("user_id" = String, Path, description = "User to delete")),
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Cannot delete self or the firm owner"),
        (status = 404, description = "Not a member of this firm")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Auth(current): Auth,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let firm_id = require_owner_firm(&current)?;
    if user_id == current.user_id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let users = UserRepository::new(&state.db);
    let target = users.get(&user_id)?;
    let profile = users.get_profile(&user_id)?;

    let target_firm = profile
        .as_ref()
        .and_then(|p| p.firm_id.clone())
        .or_else(|| target.firm_id.clone());
    if target_firm.as_deref() != Some(firm_id.as_str()) {
        return Err(ApiError::not_found(format!("User {user_id}")));
    }

    let owns_firm = FirmRepository::new(&state.db)
        .get_by_owner(&user_id)?
        .is_some();
    if owns_firm {
        return Err(ApiError::bad_request("The firm owner cannot be deleted"));
    }

    users.delete(&user_id)?;
    Ok(StatusCode::NO_CONTENT)
}
