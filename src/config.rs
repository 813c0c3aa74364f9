// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values, and the
//! [`AppConfig`] snapshot loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for the embedded database | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWT_SECRET` | HMAC secret for signing access/refresh tokens | Required for production |
//! | `ACCESS_TOKEN_TTL_MINUTES` | Access token lifetime | `15` |
//! | `REFRESH_TOKEN_TTL_DAYS` | Refresh token lifetime | `7` |
//! | `OTP_EMAIL_ENABLED` | Deliver OTP emails (`true`/`false`); codes are always logged | `false` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;

/// Environment variable name for the database directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Default database directory when `DATA_DIR` is unset.
pub const DEFAULT_DATA_DIR: &str = "/data";

/// Environment variable name for the server bind address.
pub const HOST_ENV: &str = "HOST";

/// Environment variable name for the server bind port.
pub const PORT_ENV: &str = "PORT";

/// Environment variable selecting the log format (`json` or `pretty`).
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Environment variable name for the JWT signing secret.
///
/// Access and refresh tokens are HS256-signed with this secret. When unset,
/// a random per-process secret is generated, which invalidates all sessions
/// on restart. Set it in any deployment that must survive restarts.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";

/// Environment variable name for the access token lifetime in minutes.
pub const ACCESS_TTL_ENV: &str = "ACCESS_TOKEN_TTL_MINUTES";

/// Environment variable name for the refresh token lifetime in days.
pub const REFRESH_TTL_ENV: &str = "REFRESH_TOKEN_TTL_DAYS";

/// Environment variable gating outbound OTP email delivery.
pub const OTP_EMAIL_ENABLED_ENV: &str = "OTP_EMAIL_ENABLED";

/// Name of the HTTP-only cookie carrying the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Default access token lifetime (minutes).
pub const DEFAULT_ACCESS_TTL_MINUTES: i64 = 15;

/// Default refresh token lifetime (days).
pub const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;

/// Maximum active users per firm (owner included).
pub const FIRM_USER_LIMIT: usize = 10;

/// Configuration snapshot loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Access token lifetime in minutes.
    pub access_ttl_minutes: i64,
    /// Refresh token lifetime in days.
    pub refresh_ttl_days: i64,
    /// Whether OTP emails are actually delivered.
    pub otp_email_enabled: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            access_ttl_minutes: env_parse(ACCESS_TTL_ENV, DEFAULT_ACCESS_TTL_MINUTES),
            refresh_ttl_days: env_parse(REFRESH_TTL_ENV, DEFAULT_REFRESH_TTL_DAYS),
            otp_email_enabled: env::var(OTP_EMAIL_ENABLED_ENV)
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            access_ttl_minutes: DEFAULT_ACCESS_TTL_MINUTES,
            refresh_ttl_days: DEFAULT_REFRESH_TTL_DAYS,
            otp_email_enabled: false,
        }
    }
}

fn env_parse(var: &str, default: i64) -> i64 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
