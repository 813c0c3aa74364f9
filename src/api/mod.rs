// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        CaseListQuery, CaseResponse, CreateCaseRequest, CreateFirmUserRequest, FirmResponse,
        FirmUserSummaryResponse, InviteResponse, LoginRequest, RefreshRequest,
        RegisterFirmRequest, SendOtpRequest, UpdateCaseRequest, UpdateFirmRequest, UserResponse,
        VerifyOtpRequest,
    },
    state::AppState,
};

pub mod auth;
pub mod cases;
pub mod firms;
pub mod health;
pub mod invites;
pub mod users;

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/auth/register-firm", post(auth::register_firm))
        .route("/auth/login", post(auth::login))
        .route("/auth/token/refresh", post(auth::refresh_token))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/send-otp", post(auth::send_otp))
        .route("/auth/verify-otp", post(auth::verify_otp))
        .route("/auth/resend-verification", post(auth::resend_verification))
        .route("/firms/me", get(firms::get_my_firm).patch(firms::update_my_firm))
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/summary", get(users::user_summary))
        .route("/users/{user_id}", delete(users::delete_user))
        .route("/invites", get(invites::list_invites))
        .route("/invites/{invite_id}", delete(invites::delete_invite))
        .route("/cases", get(cases::list_cases).post(cases::create_case))
        .route(
            "/cases/{case_id}",
            get(cases::get_case)
                .put(cases::update_case)
                .patch(cases::update_case)
                .delete(cases::delete_case),
        );

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::ready,
        auth::register_firm,
        auth::login,
        auth::refresh_token,
        auth::logout,
        auth::me,
        auth::send_otp,
        auth::verify_otp,
        auth::resend_verification,
        firms::get_my_firm,
        firms::update_my_firm,
        users::list_users,
        users::user_summary,
        users::create_user,
        users::delete_user,
        invites::list_invites,
        invites::delete_invite,
        cases::list_cases,
        cases::create_case,
        cases::get_case,
        cases::update_case,
        cases::delete_case
    ),
    components(
        schemas(
            RegisterFirmRequest,
            LoginRequest,
            RefreshRequest,
            SendOtpRequest,
            VerifyOtpRequest,
            UserResponse,
            FirmResponse,
            UpdateFirmRequest,
            CreateFirmUserRequest,
            FirmUserSummaryResponse,
            InviteResponse,
            CreateCaseRequest,
            UpdateCaseRequest,
            CaseResponse,
            CaseListQuery,
            health::HealthResponse,
            health::ReadyResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Auth", description = "Registration, sessions, email verification"),
        (name = "Firms", description = "Firm profile management"),
        (name = "Users", description = "Firm member management"),
        (name = "Invites", description = "Invite audit"),
        (name = "Cases", description = "Case management with firm-scoped numbering")
    )
)]
struct ApiDoc;
