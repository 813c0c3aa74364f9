// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Authentication endpoints: firm registration, login, token refresh,
//! logout, current-user, and email verification.
//!
//! The refresh token is never echoed in a JSON body; it travels only in
//! the HttpOnly cookie set alongside the response.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;

use crate::auth::{
    clear_refresh_cookie, refresh_cookie_value, set_refresh_cookie, Auth, AuthError, AuthOutcome,
    RegisterOwner, SessionService,
};
use crate::error::{api_success, ApiError};
use crate::models::{
    FirmResponse, LoginRequest, RefreshRequest, RegisterFirmRequest, SendOtpRequest, UserResponse,
    VerifyOtpRequest,
};
use crate::state::AppState;
use crate::storage::{FirmRepository, StorageError, UserRepository};

/// The `data` object shared by register/login/refresh responses.
fn auth_body(outcome: &AuthOutcome) -> serde_json::Value {
    let user = UserResponse::from_user(
        &outcome.user,
        outcome.current.role,
        outcome.current.firm_id.clone(),
        !outcome.email_verification_required,
    );
    json!({
        "user": user,
        "firm": outcome.firm.as_ref().map(FirmResponse::from),
        "tokens": { "access": outcome.pair.access },
        "email_verification_required": outcome.email_verification_required,
    })
}

#[utoipa::path(
    post,
    path = "/api/auth/register-firm",
    request_body = RegisterFirmRequest,
    tag = "Auth",
    responses(
        (status = 201, description = "Firm and owner created"),
        (status = 400, description = "Validation error")
    )
)]
pub async fn register_firm(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<RegisterFirmRequest>,
) -> Result<Response, ApiError> {
    let outcome = SessionService::new(&state).register(&RegisterOwner {
        firm_name: request.firm_name,
        email: request.email,
        password: request.password,
        password2: request.password2,
        first_name: request.first_name,
        last_name: request.last_name,
    })?;

    let jar = set_refresh_cookie(jar, &outcome.pair.refresh, outcome.pair.refresh_expires_at);
    let body = auth_body(&outcome);
    Ok((jar, api_success("Registration successful", body, StatusCode::CREATED)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "Authenticated"),
        (status = 401, description = "Bad credentials or disabled account")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let outcome = SessionService::new(&state).login(&request.email, &request.password)?;
    let jar = set_refresh_cookie(jar, &outcome.pair.refresh, outcome.pair.refresh_expires_at);
    let body = auth_body(&outcome);
    Ok((jar, api_success("Login successful", body, StatusCode::OK)).into_response())
}

/// Refresh token discovery: a non-empty body field wins, else the cookie.
fn discover_refresh(body: Option<&RefreshRequest>, jar: &CookieJar) -> Option<String> {
    body.and_then(|b| b.refresh.clone())
        .filter(|t| !t.is_empty())
        .or_else(|| refresh_cookie_value(jar))
}

#[utoipa::path(
    post,
    path = "/api/auth/token/refresh",
    request_body = RefreshRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "New token pair issued"),
        (status = 401, description = "Invalid or expired refresh token")
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<Response, ApiError> {
    let token = discover_refresh(body.as_ref().map(|Json(b)| b), &jar)
        .ok_or(AuthError::InvalidRefreshToken)?;

    let outcome = SessionService::new(&state).refresh(&token)?;
    let jar = set_refresh_cookie(jar, &outcome.pair.refresh, outcome.pair.refresh_expires_at);
    let body = auth_body(&outcome);
    Ok((jar, api_success("Token refreshed successfully", body, StatusCode::OK)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    request_body = RefreshRequest,
    tag = "Auth",
    security(("bearer" = [])),
    responses((status = 200, description = "Logged out"))
)]
pub async fn logout(
    State(state): State<AppState>,
    Auth(_user): Auth,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<Response, ApiError> {
    let token = discover_refresh(body.as_ref().map(|Json(b)| b), &jar);
    SessionService::new(&state).logout(token.as_deref())?;

    let jar = clear_refresh_cookie(jar);
    Ok((
        jar,
        api_success("Logged out successfully", serde_json::Value::Null, StatusCode::OK),
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    security(("bearer" = [])),
    responses((status = 200, description = "Current user and firm"))
)]
pub async fn me(State(state): State<AppState>, Auth(current): Auth) -> Result<Response, ApiError> {
    let users = UserRepository::new(&state.db);
    let user = users.get(&current.user_id)?;
    let email_verified = users
        .get_profile(&current.user_id)?
        .map(|p| p.email_verified)
        .unwrap_or(false);

    let firm = match &current.firm_id {
        Some(firm_id) => match FirmRepository::new(&state.db).get(firm_id) {
            Ok(firm) => Some(FirmResponse::from(&firm)),
            Err(StorageError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        },
        None => None,
    };

    let body = json!({
        "user": UserResponse::from_user(&user, current.role, current.firm_id.clone(), email_verified),
        "firm": firm,
    });
    Ok(api_success("OK", body, StatusCode::OK))
}

#[utoipa::path(
    post,
    path = "/api/auth/send-otp",
    request_body = SendOtpRequest,
    tag = "Auth",
    responses((status = 200, description = "Always succeeds; no account oracle"))
)]
pub async fn send_otp(
    State(state): State<AppState>,
    Json(request): Json<SendOtpRequest>,
) -> Result<Response, ApiError> {
    state.otp_service().send_to_email(&request.email)?;
    Ok(api_success(
        "If the email exists and is unverified, a code has been sent",
        serde_json::Value::Null,
        StatusCode::OK,
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/verify-otp",
    request_body = VerifyOtpRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "Email verified"),
        (status = 400, description = "Invalid or expired code")
    )
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<Response, ApiError> {
    if state.otp_service().verify(&request.email, &request.code)? {
        Ok(api_success(
            "Email verified successfully",
            serde_json::Value::Null,
            StatusCode::OK,
        ))
    } else {
        Err(ApiError::field("code", "Invalid or expired verification code."))
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/resend-verification",
    request_body = SendOtpRequest,
    tag = "Auth",
    responses((status = 200, description = "Always succeeds; no account oracle"))
)]
pub async fn resend_verification(
    state: State<AppState>,
    request: Json<SendOtpRequest>,
) -> Result<Response, ApiError> {
    send_otp(state, request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, REFRESH_COOKIE_NAME};
    use crate::email::RecordingMailer;
    use crate::storage::Db;
    use axum::body::to_bytes;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_state() -> (AppState, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(&dir.path().join("test.redb")).unwrap();
        let state = AppState::new(db, AppConfig::default())
            .with_mailer(Arc::new(RecordingMailer::default()));
        (state, dir)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn register_request(email: &str, firm: &str) -> RegisterFirmRequest {
        RegisterFirmRequest {
            firm_name: firm.to_string(),
            email: email.to_string(),
            password: "Str0ng.Pass!".to_string(),
            password2: "Str0ng.Pass!".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
        }
    }

    async fn register(state: &AppState, email: &str, firm: &str) -> Response {
        register_firm(
            State(state.clone()),
            CookieJar::new(),
            Json(register_request(email, firm)),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn register_sets_cookie_and_returns_201_envelope() {
        let (state, _dir) = test_state();
        let response = register(&state, "owner@acme.law", "Acme Legal").await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let cookies = response
            .headers()
            .get_all("set-cookie")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect::<Vec<_>>();
        assert!(cookies
            .iter()
            .any(|c| c.starts_with(REFRESH_COOKIE_NAME) && c.contains("HttpOnly")));

        let body = body_json(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["email_verification_required"], json!(true));
        assert_eq!(body["data"]["user"]["role"], json!("FIRM_OWNER"));
        assert_eq!(body["data"]["firm"]["name"], json!("Acme Legal"));
        // The refresh token must not appear in the body.
        assert!(body["data"]["tokens"].get("refresh").is_none());
    }

    #[tokio::test]
    async fn login_roundtrip_and_me() {
        let (state, _dir) = test_state();
        register(&state, "owner@acme.law", "Acme Legal").await;

        let response = login(
            State(state.clone()),
            CookieJar::new(),
            Json(LoginRequest {
                email: "OWNER@acme.law".to_string(),
                password: "Str0ng.Pass!".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let access = body["data"]["tokens"]["access"].as_str().unwrap();

        let claims = state.tokens.verify_access(access).unwrap();
        let current = crate::auth::load_current_user(&state, &claims.sub).unwrap();
        let me_response = me(State(state.clone()), Auth(current)).await.unwrap();
        let me_body = body_json(me_response).await;
        assert_eq!(me_body["data"]["user"]["email"], json!("owner@acme.law"));
        assert_eq!(me_body["data"]["firm"]["name"], json!("Acme Legal"));
    }

    #[tokio::test]
    async fn refresh_prefers_body_over_cookie_and_rotates() {
        let (state, _dir) = test_state();
        let response = register(&state, "owner@acme.law", "Acme Legal").await;

        // Pull the refresh token out of the set-cookie header.
        let cookie_header = response
            .headers()
            .get("set-cookie")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let token = cookie_header
            .trim_start_matches(&format!("{REFRESH_COOKIE_NAME}="))
            .split(';')
            .next()
            .unwrap()
            .to_string();

        let refreshed = refresh_token(
            State(state.clone()),
            CookieJar::new(),
            Some(Json(RefreshRequest {
                refresh: Some(token.clone()),
            })),
        )
        .await
        .unwrap();
        assert_eq!(refreshed.status(), StatusCode::OK);

        // The rotated-away token is dead.
        let err = refresh_token(
            State(state.clone()),
            CookieJar::new(),
            Some(Json(RefreshRequest {
                refresh: Some(token),
            })),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refresh_without_any_token_is_401() {
        let (state, _dir) = test_state();
        let err = refresh_token(State(state), CookieJar::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn verify_otp_flow() {
        let (state, _dir) = test_state();
        register(&state, "owner@acme.law", "Acme Legal").await;

        // Wrong code: single indistinguishable failure.
        let err = verify_otp(
            State(state.clone()),
            Json(VerifyOtpRequest {
                email: "owner@acme.law".to_string(),
                code: "000000".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        // Fetch the issued code straight from storage.
        let users = UserRepository::new(&state.db);
        let user = users.find_by_email("owner@acme.law").unwrap().unwrap();
        let otp = crate::storage::OtpRepository::new(&state.db)
            .latest_unused(&user.id, crate::storage::PURPOSE_EMAIL_VERIFICATION)
            .unwrap()
            .unwrap();

        let response = verify_otp(
            State(state.clone()),
            Json(VerifyOtpRequest {
                email: "owner@acme.law".to_string(),
                code: otp.code.clone(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Second use of the same code fails.
        let err = verify_otp(
            State(state.clone()),
            Json(VerifyOtpRequest {
                email: "owner@acme.law".to_string(),
                code: otp.code,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn send_otp_never_reveals_account_existence() {
        let (state, _dir) = test_state();
        let response = send_otp(
            State(state.clone()),
            Json(SendOtpRequest {
                email: "ghost@nowhere.law".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
