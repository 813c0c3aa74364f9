// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Session orchestration: register, login, refresh, logout.
//!
//! This is the one place that stitches together the credential store, the
//! token issuer, the OTP service, and the role resolver. Handlers stay
//! thin; every rule about how a session starts or ends lives here.

use serde_json::json;

use crate::auth::extractor::{load_current_user, CurrentUser};
use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::auth::tokens::TokenPair;
use crate::auth::AuthError;
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::{
    normalize_email, FirmRepository, StorageError, StoredFirm, StoredUser, UserRepository,
};
use axum::http::StatusCode;

/// Registration input, already deserialized by the handler.
#[derive(Debug)]
pub struct RegisterOwner {
    pub firm_name: String,
    pub email: String,
    pub password: String,
    pub password2: String,
    pub first_name: String,
    pub last_name: String,
}

/// Everything a successful auth flow produces.
#[derive(Debug)]
pub struct AuthOutcome {
    pub user: StoredUser,
    pub current: CurrentUser,
    pub firm: Option<StoredFirm>,
    pub pair: TokenPair,
    pub email_verification_required: bool,
}

/// 401 with field-scoped errors. Login deliberately distinguishes an
/// unknown email from a wrong password.
fn auth_field(field: &str, detail: &str) -> ApiError {
    ApiError {
        status: StatusCode::UNAUTHORIZED,
        message: "Authentication failed".to_string(),
        errors: Some(json!({ field: [detail] })),
    }
}

pub struct SessionService<'a> {
    state: &'a AppState,
}

impl<'a> SessionService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Register a firm with its owner account.
    ///
    /// Validation errors are accumulated and reported field-scoped in one
    /// response. User, profile, firm, slug, and the case-number counter are
    /// created in a single write transaction; a duplicate email or firm
    /// name aborts the whole registration.
    pub fn register(&self, req: &RegisterOwner) -> Result<AuthOutcome, ApiError> {
        let mut errors = serde_json::Map::new();

        let email = normalize_email(&req.email);
        if email.is_empty() {
            errors.insert("email".into(), json!(["This field is required."]));
        } else if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            errors.insert("email".into(), json!(["Enter a valid email address."]));
        }
        if req.firm_name.trim().is_empty() {
            errors.insert("firm_name".into(), json!(["This field is required."]));
        }
        if let Err(violations) = validate_password_strength(&req.password) {
            errors.insert("password".into(), json!(violations));
        }
        if req.password != req.password2 {
            errors.insert("password2".into(), json!(["Passwords do not match."]));
        }
        if !errors.is_empty() {
            return Err(ApiError::validation(
                "Validation error",
                serde_json::Value::Object(errors),
            ));
        }

        let password_hash =
            hash_password(&req.password).map_err(|e| ApiError::internal(e.to_string()))?;
        let mut user = StoredUser::new(&email, password_hash);
        user.first_name = req.first_name.trim().to_string();
        user.last_name = req.last_name.trim().to_string();

        let firms = FirmRepository::new(&self.state.db);
        let firm = match firms.register_owner(&user, &req.firm_name) {
            Ok(firm) => firm,
            Err(StorageError::AlreadyExists(what)) if what.starts_with("User with email") => {
                return Err(ApiError::field(
                    "email",
                    "A user with this email already exists.",
                ));
            }
            Err(StorageError::AlreadyExists(what)) if what.starts_with("Firm named") => {
                return Err(ApiError::field(
                    "firm_name",
                    "A firm with this name already exists.",
                ));
            }
            Err(e) => return Err(e.into()),
        };

        // The verification code is issued outside the registration
        // transaction. The account exists once that commits, so a failed
        // issue is logged and the registration still succeeds; resend
        // covers the recovery.
        if let Err(e) = self.state.otp_service().issue_for_user(&user) {
            tracing::warn!(error = %e, email = %user.email, "verification code issue failed after registration");
        }

        let current = load_current_user(self.state, &user.id)?;
        let pair = self.state.tokens.issue(&user.id, &user.email)?;
        // Re-read: register_owner stamped role and firm onto the row.
        let user = UserRepository::new(&self.state.db).get(&user.id)?;

        Ok(AuthOutcome {
            user,
            current,
            firm: Some(firm),
            pair,
            email_verification_required: true,
        })
    }

    /// Authenticate with email and password.
    pub fn login(&self, email: &str, password: &str) -> Result<AuthOutcome, ApiError> {
        let users = UserRepository::new(&self.state.db);
        let user = users
            .find_by_email(email)?
            .ok_or_else(|| auth_field("email", "No account found with this email address."))?;

        if !verify_password(password, &user.password_hash) {
            return Err(auth_field("password", "Incorrect password."));
        }
        if !user.is_active {
            return Err(ApiError::auth("Account is disabled"));
        }

        self.outcome_for(user)
    }

    /// Rotate a refresh token into a new session.
    pub fn refresh(&self, refresh_token: &str) -> Result<AuthOutcome, ApiError> {
        let (claims, pair) = self.state.tokens.rotate(&self.state.db, refresh_token)?;
        let current = load_current_user(self.state, &claims.sub)?;
        let user = UserRepository::new(&self.state.db).get(&current.user_id)?;
        let firm = self.firm_of(&current)?;
        let email_verification_required = !self.email_verified(&user.id)?;

        Ok(AuthOutcome {
            user,
            current,
            firm,
            pair,
            email_verification_required,
        })
    }

    /// Revoke a refresh token. Best-effort and idempotent: an absent or
    /// already-dead token still logs the caller out.
    pub fn logout(&self, refresh_token: Option<&str>) -> Result<(), ApiError> {
        if let Some(token) = refresh_token {
            match self.state.tokens.revoke(&self.state.db, token) {
                Ok(()) | Err(AuthError::InvalidRefreshToken) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn outcome_for(&self, user: StoredUser) -> Result<AuthOutcome, ApiError> {
        let current = load_current_user(self.state, &user.id)?;
        let pair = self.state.tokens.issue(&user.id, &user.email)?;
        let firm = self.firm_of(&current)?;
        let email_verification_required = !self.email_verified(&user.id)?;

        Ok(AuthOutcome {
            user,
            current,
            firm,
            pair,
            email_verification_required,
        })
    }

    fn firm_of(&self, current: &CurrentUser) -> Result<Option<StoredFirm>, ApiError> {
        match &current.firm_id {
            Some(firm_id) => match FirmRepository::new(&self.state.db).get(firm_id) {
                Ok(firm) => Ok(Some(firm)),
                // A dangling firm reference must not break login.
                Err(StorageError::NotFound(_)) => Ok(None),
                Err(e) => Err(e.into()),
            },
            None => Ok(None),
        }
    }

    fn email_verified(&self, user_id: &str) -> Result<bool, ApiError> {
        Ok(UserRepository::new(&self.state.db)
            .get_profile(user_id)?
            .map(|p| p.email_verified)
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::config::AppConfig;
    use crate::storage::Db;
    use tempfile::TempDir;

    fn test_state() -> (AppState, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(&dir.path().join("test.redb")).unwrap();
        (AppState::new(db, AppConfig::default()), dir)
    }

    fn register_req(email: &str, firm: &str) -> RegisterOwner {
        RegisterOwner {
            firm_name: firm.to_string(),
            email: email.to_string(),
            password: "Str0ng.Pass!".to_string(),
            password2: "Str0ng.Pass!".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
        }
    }

    #[test]
    fn register_creates_owner_with_firm_and_tokens() {
        let (state, _dir) = test_state();
        let service = SessionService::new(&state);

        let outcome = service
            .register(&register_req("Owner@Acme.law", "Acme Legal"))
            .unwrap();
        assert_eq!(outcome.current.role, Role::FirmOwner);
        assert!(outcome.email_verification_required);
        let firm = outcome.firm.unwrap();
        assert_eq!(firm.name, "Acme Legal");
        assert_eq!(outcome.current.firm_id.as_deref(), Some(firm.id.as_str()));
        assert_eq!(outcome.user.email, "owner@acme.law");
        assert!(state.tokens.verify_access(&outcome.pair.access).is_ok());
    }

    #[test]
    fn register_accumulates_validation_errors() {
        let (state, _dir) = test_state();
        let service = SessionService::new(&state);

        let mut req = register_req("not-an-email", "");
        req.password = "weak".to_string();
        req.password2 = "different".to_string();

        let err = service.register(&req).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        let errors = err.errors.unwrap();
        assert!(errors.get("email").is_some());
        assert!(errors.get("firm_name").is_some());
        assert!(errors.get("password").is_some());
        assert!(errors.get("password2").is_some());
    }

    #[test]
    fn duplicate_firm_name_aborts_registration_entirely() {
        let (state, _dir) = test_state();
        let service = SessionService::new(&state);
        service
            .register(&register_req("first@acme.law", "Acme Legal"))
            .unwrap();

        let err = service
            .register(&register_req("second@acme.law", "acme legal"))
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.errors.unwrap().get("firm_name").is_some());

        // The second user must not exist: the registration was atomic.
        let users = UserRepository::new(&state.db);
        assert!(users.find_by_email("second@acme.law").unwrap().is_none());
    }

    #[test]
    fn login_distinguishes_unknown_email_from_bad_password() {
        let (state, _dir) = test_state();
        let service = SessionService::new(&state);
        service
            .register(&register_req("owner@acme.law", "Acme Legal"))
            .unwrap();

        let err = service.login("nobody@acme.law", "Str0ng.Pass!").unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert!(err.errors.unwrap().get("email").is_some());

        let err = service.login("owner@acme.law", "wrong").unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert!(err.errors.unwrap().get("password").is_some());

        let outcome = service.login("Owner@ACME.law", "Str0ng.Pass!").unwrap();
        assert_eq!(outcome.current.role, Role::FirmOwner);
    }

    #[test]
    fn disabled_account_cannot_log_in() {
        let (state, _dir) = test_state();
        let service = SessionService::new(&state);
        let outcome = service
            .register(&register_req("owner@acme.law", "Acme Legal"))
            .unwrap();

        let users = UserRepository::new(&state.db);
        let mut user = users.get(&outcome.user.id).unwrap();
        user.is_active = false;
        users.update(&user).unwrap();

        let err = service.login("owner@acme.law", "Str0ng.Pass!").unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "Account is disabled");
    }

    #[test]
    fn refresh_rotates_and_old_token_dies() {
        let (state, _dir) = test_state();
        let service = SessionService::new(&state);
        let outcome = service
            .register(&register_req("owner@acme.law", "Acme Legal"))
            .unwrap();

        let refreshed = service.refresh(&outcome.pair.refresh).unwrap();
        assert_ne!(refreshed.pair.refresh, outcome.pair.refresh);

        let err = service.refresh(&outcome.pair.refresh).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn logout_is_idempotent() {
        let (state, _dir) = test_state();
        let service = SessionService::new(&state);
        let outcome = service
            .register(&register_req("owner@acme.law", "Acme Legal"))
            .unwrap();

        service.logout(Some(&outcome.pair.refresh)).unwrap();
        service.logout(Some(&outcome.pair.refresh)).unwrap();
        service.logout(Some("garbage")).unwrap();
        service.logout(None).unwrap();

        // The revoked token no longer refreshes.
        assert!(service.refresh(&outcome.pair.refresh).is_err());
    }
}
