// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Refresh token cookie handling.
//!
//! The refresh token travels in an HttpOnly cookie alongside the JSON body,
//! so browser clients get rotation for free while API clients can keep
//! using the body field.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::config::REFRESH_COOKIE_NAME;

/// Set the refresh cookie, expiring when the token does.
pub fn set_refresh_cookie(jar: CookieJar, token: &str, expires_at: i64) -> CookieJar {
    let mut cookie = Cookie::build((REFRESH_COOKIE_NAME, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    if let Ok(expiry) = time::OffsetDateTime::from_unix_timestamp(expires_at) {
        cookie.set_expires(expiry);
    }
    jar.add(cookie)
}

/// Clear the refresh cookie on logout.
pub fn clear_refresh_cookie(jar: CookieJar) -> CookieJar {
    let cookie = Cookie::build((REFRESH_COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    jar.remove(cookie)
}

/// Refresh token from the cookie jar, if present and non-empty.
pub fn refresh_cookie_value(jar: &CookieJar) -> Option<String> {
    jar.get(REFRESH_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_read_back() {
        let jar = set_refresh_cookie(CookieJar::new(), "tok-123", 4_102_444_800);
        assert_eq!(refresh_cookie_value(&jar), Some("tok-123".to_string()));

        let cookie = jar.get(REFRESH_COOKIE_NAME).unwrap();
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }

    #[test]
    fn clear_removes_the_cookie() {
        let jar = set_refresh_cookie(CookieJar::new(), "tok-123", 4_102_444_800);
        let jar = clear_refresh_cookie(jar);
        assert_eq!(refresh_cookie_value(&jar), None);
    }
}
