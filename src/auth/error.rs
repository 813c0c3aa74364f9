// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;

/// Authentication/authorization failure.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Invalid authorization header format
    InvalidAuthHeader,
    /// Access token is malformed, expired, or has a bad signature
    InvalidAccessToken,
    /// Refresh token is malformed, expired, revoked, or already rotated
    InvalidRefreshToken,
    /// Account exists but is deactivated
    AccountDisabled,
    /// Authenticated but not authorized
    InsufficientPermissions,
    /// Internal error during verification
    Internal(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::InvalidAccessToken
            | AuthError::InvalidRefreshToken
            | AuthError::AccountDisabled => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "Authentication credentials were not provided."),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::InvalidAccessToken => write!(f, "invalid or expired access token"),
            AuthError::InvalidRefreshToken => write!(f, "invalid or expired refresh token"),
            AuthError::AccountDisabled => write!(f, "Account is disabled"),
            AuthError::InsufficientPermissions => {
                write!(f, "Insufficient permissions for this operation")
            }
            AuthError::Internal(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match &e {
            AuthError::Internal(detail) => ApiError::internal(detail.clone()),
            _ => ApiError::new(e.status_code(), e.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
