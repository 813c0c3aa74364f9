// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! API error type and the mandated response envelope.
//!
//! Every endpoint responds with the same shape:
//!
//! ```json
//! { "success": bool, "message": "...", "data": ..., "errors": ..., "meta": ... }
//! ```
//!
//! Expected domain failures (validation, auth, permission, not-found,
//! conflict) are translated into this envelope with the matching status
//! code. Unexpected failures are logged with detail and surfaced to the
//! caller as a generic 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::storage::StorageError;

/// The response envelope shared by all endpoints.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    pub data: Value,
    pub errors: Value,
    pub meta: Value,
}

/// Build a success response in the envelope.
pub fn api_success(message: impl Into<String>, data: Value, status: StatusCode) -> Response {
    let body = Envelope {
        success: true,
        message: message.into(),
        data,
        errors: Value::Null,
        meta: Value::Null,
    };
    (status, Json(body)).into_response()
}

/// Build a success response with pagination/summary metadata.
pub fn api_success_meta(
    message: impl Into<String>,
    data: Value,
    meta: Value,
    status: StatusCode,
) -> Response {
    let body = Envelope {
        success: true,
        message: message.into(),
        data,
        errors: Value::Null,
        meta,
    };
    (status, Json(body)).into_response()
}

/// API error carrying a status code, a caller-facing message, and
/// optional field-scoped error details.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub errors: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            errors: None,
        }
    }

    /// 400 with field-scoped errors, e.g. `{"firm_name": ["..."]}`.
    pub fn validation(message: impl Into<String>, errors: Value) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            errors: Some(errors),
        }
    }

    /// 400 for a single offending field.
    pub fn field(field: &str, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self::validation("Validation error", json!({ field: [detail] }))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 401: bad credentials or invalid/expired token.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// 403: authenticated but not authorized.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// 409: uniqueness violation or limit reached.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn conflict_with(message: impl Into<String>, errors: Value) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
            errors: Some(errors),
        }
    }

    /// 500: detail is logged, the caller gets a generic message.
    pub fn internal(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::error!(%detail, "internal server error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(entity) => ApiError::not_found(entity),
            StorageError::AlreadyExists(entity) => {
                ApiError::conflict(format!("{entity} already exists"))
            }
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Envelope {
            success: false,
            message: self.message,
            data: Value::Null,
            errors: self.errors.unwrap_or(Value::Null),
            meta: Value::Null,
        };
        (self.status, Json(body)).into_response()
    }
}
