// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Axum extractor for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is CurrentUser
//! }
//! ```
//!
//! The extractor verifies the bearer access token, re-loads the user from
//! storage (so deactivation takes effect immediately, not at token expiry),
//! and resolves the effective role and firm.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{resolve, AuthError, Role};
use crate::state::AppState;
use crate::storage::{FirmRepository, StorageError, UserRepository};

/// The authenticated principal, resolved per request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    /// The firm this principal belongs to, if any. For firm owners this is
    /// their owned firm even when no membership field is set.
    pub firm_id: Option<String>,
}

impl CurrentUser {
    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}

/// Extractor requiring a valid access token.
pub struct Auth(pub CurrentUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Tests can inject a principal directly.
        if let Some(user) = parts.extensions.get::<CurrentUser>().cloned() {
            return Ok(Auth(user));
        }

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let claims = state.tokens.verify_access(token)?;
        let user = load_current_user(state, &claims.sub)?;
        Ok(Auth(user))
    }
}

/// Load and resolve a principal by user id.
///
/// Shared between the extractor and the login/refresh flows so every path
/// derives role and firm identically.
pub fn load_current_user(state: &AppState, user_id: &str) -> Result<CurrentUser, AuthError> {
    let users = UserRepository::new(&state.db);
    let user = match users.get(user_id) {
        Ok(user) => user,
        // Token subject no longer exists; the token is as good as invalid.
        Err(StorageError::NotFound(_)) => return Err(AuthError::InvalidAccessToken),
        Err(e) => return Err(AuthError::Internal(e.to_string())),
    };
    if !user.is_active {
        return Err(AuthError::AccountDisabled);
    }

    let profile = users
        .get_profile(&user.id)
        .map_err(|e| AuthError::Internal(e.to_string()))?;
    let owned_firm = FirmRepository::new(&state.db)
        .get_by_owner(&user.id)
        .map_err(|e| AuthError::Internal(e.to_string()))?;

    let role = resolve(&user, profile.as_ref(), owned_firm.is_some());
    let firm_id = profile
        .as_ref()
        .and_then(|p| p.firm_id.clone())
        .or_else(|| user.firm_id.clone())
        .or_else(|| owned_firm.map(|f| f.id));

    Ok(CurrentUser {
        user_id: user.id,
        email: user.email,
        role,
        firm_id,
    })
}

/// Extractor requiring the SUPER_ADMIN role.
pub struct SuperAdminOnly(pub CurrentUser);

impl FromRequestParts<AppState> for SuperAdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;
        if !user.is_super_admin() {
            return Err(AuthError::InsufficientPermissions);
        }
        Ok(SuperAdminOnly(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::storage::{Db, StoredUser};
    use axum::http::Request;
    use tempfile::TempDir;

    fn test_state() -> (AppState, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(&dir.path().join("test.redb")).unwrap();
        (AppState::new(db, AppConfig::default()), dir)
    }

    fn parts_with_header(value: Option<String>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = value {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn missing_and_malformed_headers_rejected() {
        let (state, _dir) = test_state();

        let mut parts = parts_with_header(None);
        assert!(matches!(
            Auth::from_request_parts(&mut parts, &state).await,
            Err(AuthError::MissingAuthHeader)
        ));

        let mut parts = parts_with_header(Some("Token abc".to_string()));
        assert!(matches!(
            Auth::from_request_parts(&mut parts, &state).await,
            Err(AuthError::InvalidAuthHeader)
        ));
    }

    #[tokio::test]
    async fn valid_token_resolves_the_user() {
        let (state, _dir) = test_state();
        let users = UserRepository::new(&state.db);
        let user = StoredUser::new("a@x.com", "h".into());
        users.create(&user).unwrap();

        let pair = state.tokens.issue(&user.id, &user.email).unwrap();
        let mut parts = parts_with_header(Some(format!("Bearer {}", pair.access)));

        let Auth(current) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(current.user_id, user.id);
        assert_eq!(current.role, Role::Client);
        assert_eq!(current.firm_id, None);
    }

    #[tokio::test]
    async fn deactivated_user_rejected_even_with_valid_token() {
        let (state, _dir) = test_state();
        let users = UserRepository::new(&state.db);
        let mut user = StoredUser::new("a@x.com", "h".into());
        users.create(&user).unwrap();
        let pair = state.tokens.issue(&user.id, &user.email).unwrap();

        user.is_active = false;
        users.update(&user).unwrap();

        let mut parts = parts_with_header(Some(format!("Bearer {}", pair.access)));
        assert!(matches!(
            Auth::from_request_parts(&mut parts, &state).await,
            Err(AuthError::AccountDisabled)
        ));
    }

    #[tokio::test]
    async fn deleted_user_token_is_invalid() {
        let (state, _dir) = test_state();
        let pair = state.tokens.issue("ghost", "ghost@x.com").unwrap();
        let mut parts = parts_with_header(Some(format!("Bearer {}", pair.access)));
        assert!(matches!(
            Auth::from_request_parts(&mut parts, &state).await,
            Err(AuthError::InvalidAccessToken)
        ));
    }

    #[tokio::test]
    async fn super_admin_gate() {
        let (state, _dir) = test_state();
        let mut parts = parts_with_header(None);
        parts.extensions.insert(CurrentUser {
            user_id: "u1".to_string(),
            email: "a@x.com".to_string(),
            role: Role::FirmOwner,
            firm_id: Some("f1".to_string()),
        });
        assert!(matches!(
            SuperAdminOnly::from_request_parts(&mut parts, &state).await,
            Err(AuthError::InsufficientPermissions)
        ));
    }
}
