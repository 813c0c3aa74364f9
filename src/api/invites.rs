// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Invite audit endpoints: list and delete.
//!
//! Invites are records only; there is no public accept flow. They exist so
//! owners can see and clean up what was issued.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use chrono::Utc;
use serde_json::json;

use crate::auth::{Auth, CurrentUser, Role};
use crate::error::{api_success, ApiError};
use crate::models::InviteResponse;
use crate::state::AppState;
use crate::storage::InviteRepository;

fn require_owner_firm(current: &CurrentUser) -> Result<String, ApiError> {
    if current.role != Role::FirmOwner && current.role != Role::SuperAdmin {
        return Err(ApiError::forbidden("Only firm owners can manage invites"));
    }
    current
        .firm_id
        .clone()
        .ok_or_else(|| ApiError::not_found("No firm associated with this account"))
}

#[utoipa::path(
    get,
    path = "/api/invites",
    tag = "Invites",
    security(("bearer" = [])),
    responses((status = 200, body = [InviteResponse]))
)]
pub async fn list_invites(
    State(state): State<AppState>,
    Auth(current): Auth,
) -> Result<Response, ApiError> {
    let firm_id = require_owner_firm(&current)?;
    let now = Utc::now();
    let invites = InviteRepository::new(&state.db)
        .list_by_firm(&firm_id)?
        .iter()
        .map(|invite| InviteResponse::from_invite(invite, now))
        .collect::<Vec<_>>();
    Ok(api_success("OK", json!(invites), StatusCode::OK))
}

#[utoipa::path(
    delete,
    path = "/api/invites/{invite_id}",
    params(("invite_id" = String, Path, description = "Invite to delete")),
    tag = "Invites",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not an invite of this firm")
    )
)]
pub async fn delete_invite(
    State(state): State<AppState>,
    Auth(current): Auth,
    Path(invite_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let firm_id = require_owner_firm(&current)?;
    let invites = InviteRepository::new(&state.db);

    let invite = invites.get(&invite_id)?;
    if invite.firm_id != firm_id {
        // Do not reveal that the invite exists in another firm.
        return Err(ApiError::not_found(format!("Invite {invite_id}")));
    }

    invites.delete(&invite_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{RegisterOwner, SessionService};
    use crate::config::AppConfig;
    use crate::storage::{Db, StoredInvite};
    use axum::body::to_bytes;
    use chrono::Duration;
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
        (state, outcome.current, dir)
    }

    #[tokio::test]
    async fn list_reports_computed_status() {
        let (state, owner, _dir) = state_with_owner();
        let firm_id = owner.firm_id.clone().unwrap();
        let repo = InviteRepository::new(&state.db);

        let pending = StoredInvite::new(&firm_id, "u-a", Some("STAFF".into()), "t1".into(), &owner.user_id);
        repo.create(&pending).unwrap();
        let mut expired = StoredInvite::new(&firm_id, "u-b", None, "t2".into(), &owner.user_id);
        expired.expires_at = Utc::now() - Duration::hours(1);
        repo.create(&expired).unwrap();

        let response = list_invites(State(state), Auth(owner)).await.unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        let statuses = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["status"].as_str().unwrap().to_string())
            .collect::<Vec<_>>();
        assert!(statuses.contains(&"PENDING".to_string()));
        assert!(statuses.contains(&"EXPIRED".to_string()));
    }

    #[tokio::test]
    async fn delete_is_firm_scoped() {
        let (state, owner, _dir) = state_with_owner();
        let firm_id = owner.firm_id.clone().unwrap();
        let repo = InviteRepository::new(&state.db);

        let own = StoredInvite::new(&firm_id, "u-a", None, "t1".into(), &owner.user_id);
        repo.create(&own).unwrap();
        let foreign = StoredInvite::new("other-firm", "u-b", None, "t2".into(), "someone");
        repo.create(&foreign).unwrap();

        let status = delete_invite(State(state.clone()), Auth(owner.clone()), Path(own.id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let err = delete_invite(State(state), Auth(owner), Path(foreign.id))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
