// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Session token issuer.
//!
//! Access tokens are short-lived, stateless HS256 JWTs. Refresh tokens are
//! longer-lived JWTs whose `jti` is tracked in the revocation blacklist so
//! logout and rotation can permanently invalidate them.
//!
//! Rotation is mandatory: presenting a refresh token yields a new pair and
//! blacklists the old token. The blacklist insert is first-wins, so of two
//! concurrent rotations with the same token exactly one succeeds and the
//! other fails with an invalid-token error (replay protection).

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};

use crate::auth::AuthError;
use crate::config::{AppConfig, JWT_SECRET_ENV};
use crate::storage::{Db, RevokedTokenRepository};

const TYP_ACCESS: &str = "access";
const TYP_REFRESH: &str = "refresh";

/// JWT claims for both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// User email (convenience for logging; never trusted for lookups)
    pub email: String,
    /// Token kind: `access` or `refresh`
    pub typ: String,
    /// Token id; refresh jtis feed the revocation blacklist
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    /// Refresh expiry (unix ts); drives the cookie lifetime
    pub refresh_expires_at: i64,
}

/// Creates, validates, rotates, and revokes session tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], config: &AppConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl: Duration::minutes(config.access_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_ttl_days),
        }
    }

    /// Build from `JWT_SECRET`, falling back to a random per-process secret
    /// (which invalidates all sessions on restart).
    pub fn from_env(config: &AppConfig) -> Self {
        match std::env::var(JWT_SECRET_ENV) {
            Ok(secret) if !secret.is_empty() => Self::new(secret.as_bytes(), config),
            _ => {
                tracing::warn!(
                    "{JWT_SECRET_ENV} not set; using a random secret, sessions will not survive restarts"
                );
                let mut secret = [0u8; 32];
                SystemRandom::new()
                    .fill(&mut secret)
                    .expect("system RNG unavailable");
                Self::new(&secret, config)
            }
        }
    }

    /// Issue a fresh access/refresh pair for a principal.
    pub fn issue(&self, user_id: &str, email: &str) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let access = self.sign(user_id, email, TYP_ACCESS, now.timestamp(), (now + self.access_ttl).timestamp())?;
        let refresh_exp = (now + self.refresh_ttl).timestamp();
        let refresh = self.sign(user_id, email, TYP_REFRESH, now.timestamp(), refresh_exp)?;
        Ok(TokenPair {
            access,
            refresh,
            refresh_expires_at: refresh_exp,
        })
    }

    fn sign(
        &self,
        user_id: &str,
        email: &str,
        typ: &str,
        iat: i64,
        exp: i64,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            typ: typ.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat,
            exp,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("token signing failed: {e}")))
    }

    fn decode(&self, token: &str, expected_typ: &str, err: AuthError) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|_| {
            match expected_typ {
                TYP_REFRESH => AuthError::InvalidRefreshToken,
                _ => AuthError::InvalidAccessToken,
            }
        })?;
        if data.claims.typ != expected_typ {
            return Err(err);
        }
        Ok(data.claims)
    }

    /// Validate a bearer access token.
    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        self.decode(token, TYP_ACCESS, AuthError::InvalidAccessToken)
    }

    /// Rotate a refresh token: validate it, permanently blacklist it, and
    /// issue a new pair. Fails with [`AuthError::InvalidRefreshToken`] for
    /// expired, malformed, revoked, or already-rotated tokens.
    pub fn rotate(&self, db: &Db, refresh: &str) -> Result<(Claims, TokenPair), AuthError> {
        let claims = self.decode(refresh, TYP_REFRESH, AuthError::InvalidRefreshToken)?;
        let blacklist = RevokedTokenRepository::new(db);

        // First-wins insert: a concurrent rotation of the same token makes
        // this return false, and this call must then fail.
        let newly_revoked = blacklist
            .revoke(&claims.jti, claims.exp)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        if !newly_revoked {
            return Err(AuthError::InvalidRefreshToken);
        }

        let pair = self.issue(&claims.sub, &claims.email)?;
        Ok((claims, pair))
    }

    /// Revoke a refresh token (logout). Idempotent for already-revoked
    /// tokens; invalid tokens fail.
    pub fn revoke(&self, db: &Db, refresh: &str) -> Result<(), AuthError> {
        let claims = self.decode(refresh, TYP_REFRESH, AuthError::InvalidRefreshToken)?;
        RevokedTokenRepository::new(db)
            .revoke(&claims.jti, claims.exp)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(b"test-secret", &AppConfig::default())
    }

    fn test_db() -> (tempfile::TempDir, Db) {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(&dir.path().join("test.redb")).unwrap();
        (dir, db)
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let issuer = issuer();
        let pair = issuer.issue("u1", "a@x.com").unwrap();

        let claims = issuer.verify_access(&pair.access).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.typ, "access");
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let issuer = issuer();
        let pair = issuer.issue("u1", "a@x.com").unwrap();
        assert_eq!(
            issuer.verify_access(&pair.refresh).unwrap_err(),
            AuthError::InvalidAccessToken
        );
    }

    #[test]
    fn garbage_and_wrong_secret_rejected() {
        let issuer = issuer();
        assert!(issuer.verify_access("not.a.jwt").is_err());

        let other = TokenIssuer::new(b"other-secret", &AppConfig::default());
        let pair = other.issue("u1", "a@x.com").unwrap();
        assert!(issuer.verify_access(&pair.access).is_err());
    }

    #[test]
    fn rotation_invalidates_the_old_token() {
        let issuer = issuer();
        let (_dir, db) = test_db();
        let pair = issuer.issue("u1", "a@x.com").unwrap();

        let (claims, new_pair) = issuer.rotate(&db, &pair.refresh).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_ne!(new_pair.refresh, pair.refresh);

        // Replaying the rotated-away token fails.
        assert_eq!(
            issuer.rotate(&db, &pair.refresh).unwrap_err(),
            AuthError::InvalidRefreshToken
        );
        // The new token still rotates fine.
        assert!(issuer.rotate(&db, &new_pair.refresh).is_ok());
    }

    #[test]
    fn revoked_token_cannot_rotate() {
        let issuer = issuer();
        let (_dir, db) = test_db();
        let pair = issuer.issue("u1", "a@x.com").unwrap();

        issuer.revoke(&db, &pair.refresh).unwrap();
        // Revoking again is idempotent.
        issuer.revoke(&db, &pair.refresh).unwrap();

        assert_eq!(
            issuer.rotate(&db, &pair.refresh).unwrap_err(),
            AuthError::InvalidRefreshToken
        );
    }

    #[test]
    fn expired_refresh_rejected() {
        let issuer = issuer();
        let (_dir, db) = test_db();

        // Hand-craft an expired refresh token (beyond the decoder leeway).
        let past = Utc::now().timestamp() - 3600;
        let token = issuer
            .sign("u1", "a@x.com", "refresh", past - 60, past)
            .unwrap();
        assert_eq!(
            issuer.rotate(&db, &token).unwrap_err(),
            AuthError::InvalidRefreshToken
        );
    }
}
