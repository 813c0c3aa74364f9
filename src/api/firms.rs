// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Firm profile endpoints, scoped to the caller's own firm.

use axum::{extract::State, http::StatusCode, response::Response, Json};
use serde_json::json;

use crate::auth::{Auth, CurrentUser, Role};
use crate::error::{api_success, ApiError};
use crate::models::{FirmResponse, UpdateFirmRequest};
use crate::state::AppState;
use crate::storage::{FirmRepository, StoredFirm};

fn own_firm(state: &AppState, current: &CurrentUser) -> Result<StoredFirm, ApiError> {
    if current.role != Role::FirmOwner && current.role != Role::SuperAdmin {
        return Err(ApiError::forbidden("Only firm owners can manage the firm profile"));
    }
    let firm_id = current
        .firm_id
        .as_deref()
        .ok_or_else(|| ApiError::not_found("No firm associated with this account"))?;
    Ok(FirmRepository::new(&state.db).get(firm_id)?)
}

#[utoipa::path(
    get,
    path = "/api/firms/me",
    tag = "Firms",
    security(("bearer" = [])),
    responses(
        (status = 200, body = FirmResponse),
        (status = 403, description = "Not a firm owner"),
        (status = 404, description = "No firm associated")
    )
)]
pub async fn get_my_firm(
    State(state): State<AppState>,
    Auth(current): Auth,
) -> Result<Response, ApiError> {
    let firm = own_firm(&state, &current)?;
    Ok(api_success("OK", json!(FirmResponse::from(&firm)), StatusCode::OK))
}

#[utoipa::path(
    patch,
    path = "/api/firms/me",
    request_body = UpdateFirmRequest,
    tag = "Firms",
    security(("bearer" = [])),
    responses(
        (status = 200, body = FirmResponse),
        (status = 400, description = "Attempted name/owner change")
    )
)]
pub async fn update_my_firm(
    State(state): State<AppState>,
    Auth(current): Auth,
    Json(request): Json<UpdateFirmRequest>,
) -> Result<Response, ApiError> {
    let mut firm = own_firm(&state, &current)?;

    // The name drives the slug and the uniqueness index; ownership transfer
    // is a manual operation. Both are rejected at the edge.
    if request.name.is_some() {
        return Err(ApiError::field("name", "The firm name cannot be changed."));
    }
    if request.owner.is_some() {
        return Err(ApiError::field("owner", "The firm owner cannot be changed."));
    }

    if let Some(contact_email) = request.contact_email {
        firm.contact_email = Some(contact_email).filter(|v| !v.trim().is_empty());
    }
    if let Some(phone) = request.phone {
        firm.phone = Some(phone).filter(|v| !v.trim().is_empty());
    }
    if let Some(address) = request.address {
        firm.address = Some(address).filter(|v| !v.trim().is_empty());
    }
    if let Some(timezone) = request.timezone {
        firm.timezone = timezone;
    }

    FirmRepository::new(&state.db).update(&firm)?;
    Ok(api_success(
        "Firm updated successfully",
        json!(FirmResponse::from(&firm)),
        StatusCode::OK,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{RegisterOwner, SessionService};
    use crate::config::AppConfig;
    use crate::storage::Db;
    use axum::body::to_bytes;
    use tempfile::TempDir;

    fn state_with_owner() -> (AppState, CurrentUser, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(&dir.path().join("test.redb")).unwrap();
        let state = AppState::new(db, AppConfig::default());
        let outcome = SessionService::new(&state)
            .register(&RegisterOwner {
                firm_name: "Acme Legal".to_string(),
                email: "owner@acme.law".to_string(),
                password: "Str0ng.Pass!".to_string(),
                password2: "Str0ng.Pass!".to_string(),
                first_name: "Jane".to_string(),
                last_name: "Doe".to_string(),
            })
            .unwrap();
        let current = outcome.current;
        (state, current, dir)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn owner_reads_their_firm() {
        let (state, current, _dir) = state_with_owner();
        let response = get_my_firm(State(state), Auth(current)).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["data"]["name"], json!("Acme Legal"));
        assert_eq!(body["data"]["slug"], json!("acme-legal"));
    }

    #[tokio::test]
    async fn patch_updates_contact_fields() {
        let (state, current, _dir) = state_with_owner();
        let response = update_my_firm(
            State(state),
            Auth(current),
            Json(UpdateFirmRequest {
                contact_email: Some("office@acme.law".to_string()),
                phone: Some("+1 555 0100".to_string()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["data"]["contact_email"], json!("office@acme.law"));
        assert_eq!(body["data"]["phone"], json!("+1 555 0100"));
    }

    #[tokio::test]
    async fn name_and_owner_changes_rejected() {
        let (state, current, _dir) = state_with_owner();

        let err = update_my_firm(
            State(state.clone()),
            Auth(current.clone()),
            Json(UpdateFirmRequest {
                name: Some("New Name".to_string()),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = update_my_firm(
            State(state),
            Auth(current),
            Json(UpdateFirmRequest {
                owner: Some("someone-else".to_string()),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn non_owner_is_forbidden() {
        let (state, mut current, _dir) = state_with_owner();
        current.role = Role::Client;
        let err = get_my_firm(State(state), Auth(current)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }
}
