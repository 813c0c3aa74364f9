// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Email verification via one-time passcodes.
//!
//! Codes are 6 decimal digits from the system CSPRNG, valid for ten
//! minutes. Every failure mode of verification (unknown email,
//! no outstanding code, expired, mismatch, already consumed) collapses into
//! one indistinguishable invalid outcome so the endpoint leaks nothing
//! about account state.

use chrono::Utc;
use ring::rand::{SecureRandom, SystemRandom};

use crate::auth::AuthError;
use crate::email::EmailSender;
use crate::storage::{
    Db, OtpRepository, StorageError, StoredOtp, StoredUser, UserRepository,
    PURPOSE_EMAIL_VERIFICATION,
};

fn internal(e: StorageError) -> AuthError {
    AuthError::Internal(e.to_string())
}

/// Largest multiple of 1_000_000 that fits in a u32; draws at or above it
/// are rejected so the modulo is unbiased.
const REJECTION_BOUND: u32 = 4_294_000_000;

/// Issues and verifies email OTPs.
pub struct OtpService<'a> {
    db: &'a Db,
    mailer: &'a dyn EmailSender,
    email_enabled: bool,
}

impl<'a> OtpService<'a> {
    pub fn new(db: &'a Db, mailer: &'a dyn EmailSender, email_enabled: bool) -> Self {
        Self {
            db,
            mailer,
            email_enabled,
        }
    }

    /// Uniform 6-digit code, leading zeros preserved.
    fn generate_code() -> Result<String, AuthError> {
        let rng = SystemRandom::new();
        let mut bytes = [0u8; 4];
        loop {
            rng.fill(&mut bytes)
                .map_err(|_| AuthError::Internal("system RNG unavailable".to_string()))?;
            let draw = u32::from_be_bytes(bytes);
            if draw < REJECTION_BOUND {
                return Ok(format!("{:06}", draw % 1_000_000));
            }
        }
    }

    /// Create a fresh verification code for a user and dispatch it.
    ///
    /// The code is always written to the log for development; the mailer is
    /// only invoked when email delivery is enabled.
    pub fn issue_for_user(&self, user: &StoredUser) -> Result<StoredOtp, AuthError> {
        let code = Self::generate_code()?;
        let otp = StoredOtp::new(&user.id, code, PURPOSE_EMAIL_VERIFICATION);
        OtpRepository::new(self.db)
            .create(&otp)
            .map_err(internal)?;

        tracing::info!(email = %user.email, code = %otp.code, "email verification code issued");
        if self.email_enabled {
            self.mailer.send(
                &user.email,
                "Verify your email",
                &format!(
                    "Your verification code is {}. It expires in 10 minutes.",
                    otp.code
                ),
            );
        }
        Ok(otp)
    }

    /// (Re)send a verification code to an email address.
    ///
    /// Silently succeeds when the email is unknown or already verified, so
    /// the endpoint cannot be used to enumerate accounts.
    pub fn send_to_email(&self, email: &str) -> Result<(), AuthError> {
        let users = UserRepository::new(self.db);
        let user = match users.find_by_email(email).map_err(internal)? {
            Some(user) => user,
            None => return Ok(()),
        };
        if let Some(profile) = users.get_profile(&user.id).map_err(internal)? {
            if profile.email_verified {
                return Ok(());
            }
        }
        self.issue_for_user(&user)?;
        Ok(())
    }

    /// Verify a code for an email address.
    ///
    /// Returns `true` and marks the email verified on success; `false` for
    /// every invalid case without distinguishing them.
    pub fn verify(&self, email: &str, code: &str) -> Result<bool, AuthError> {
        let users = UserRepository::new(self.db);
        let user = match users.find_by_email(email).map_err(internal)? {
            Some(user) => user,
            None => return Ok(false),
        };

        let otps = OtpRepository::new(self.db);
        let otp = match otps
            .latest_unused(&user.id, PURPOSE_EMAIL_VERIFICATION)
            .map_err(internal)?
        {
            Some(otp) => otp,
            None => return Ok(false),
        };
        if otp.is_expired(Utc::now()) || otp.code != code {
            return Ok(false);
        }

        match otps.consume_and_verify_email(&otp) {
            Ok(()) => Ok(true),
            // Lost a race with a concurrent verification of the same code.
            Err(StorageError::AlreadyExists(_)) | Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(internal(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::RecordingMailer;
    use chrono::Duration;

    fn test_db() -> (tempfile::TempDir, Db) {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(&dir.path().join("test.redb")).unwrap();
        (dir, db)
    }

    fn make_user(db: &Db, email: &str) -> StoredUser {
        let users = UserRepository::new(db);
        let user = StoredUser::new(email, "h".into());
        users.create(&user).unwrap();
        users.ensure_profile(&user.id).unwrap();
        user
    }

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..50 {
            let code = OtpService::generate_code().unwrap();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn verify_happy_path_marks_email_verified() {
        let (_dir, db) = test_db();
        let mailer = RecordingMailer::default();
        let service = OtpService::new(&db, &mailer, true);
        let user = make_user(&db, "a@x.com");

        let otp = service.issue_for_user(&user).unwrap();
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);

        assert!(service.verify("a@x.com", &otp.code).unwrap());
        let users = UserRepository::new(&db);
        assert!(users.get_profile(&user.id).unwrap().unwrap().email_verified);

        // The code is single-use.
        assert!(!service.verify("a@x.com", &otp.code).unwrap());
    }

    #[test]
    fn wrong_code_and_unknown_email_are_indistinguishable() {
        let (_dir, db) = test_db();
        let mailer = RecordingMailer::default();
        let service = OtpService::new(&db, &mailer, false);
        let user = make_user(&db, "a@x.com");
        service.issue_for_user(&user).unwrap();

        assert!(!service.verify("a@x.com", "000000").unwrap());
        assert!(!service.verify("nobody@x.com", "000000").unwrap());
    }

    #[test]
    fn expired_code_rejected() {
        let (_dir, db) = test_db();
        let mailer = RecordingMailer::default();
        let service = OtpService::new(&db, &mailer, false);
        let user = make_user(&db, "a@x.com");

        let mut otp = StoredOtp::new(&user.id, "123456".into(), PURPOSE_EMAIL_VERIFICATION);
        otp.created_at = otp.created_at - Duration::minutes(30);
        otp.expires_at = otp.expires_at - Duration::minutes(30);
        OtpRepository::new(&db).create(&otp).unwrap();

        assert!(!service.verify("a@x.com", "123456").unwrap());
    }

    #[test]
    fn newer_code_supersedes_older_one() {
        let (_dir, db) = test_db();
        let mailer = RecordingMailer::default();
        let service = OtpService::new(&db, &mailer, false);
        let user = make_user(&db, "a@x.com");

        let mut first = StoredOtp::new(&user.id, "111111".into(), PURPOSE_EMAIL_VERIFICATION);
        first.created_at = first.created_at - Duration::minutes(2);
        OtpRepository::new(&db).create(&first).unwrap();
        let second = service.issue_for_user(&user).unwrap();

        assert!(!service.verify("a@x.com", "111111").unwrap());
        assert!(service.verify("a@x.com", &second.code).unwrap());
    }

    #[test]
    fn send_to_email_is_enumeration_safe_and_skips_verified() {
        let (_dir, db) = test_db();
        let mailer = RecordingMailer::default();
        let service = OtpService::new(&db, &mailer, true);

        // Unknown address: silent no-op.
        service.send_to_email("ghost@x.com").unwrap();
        assert!(mailer.sent.lock().unwrap().is_empty());

        // Known, unverified: one email.
        let user = make_user(&db, "a@x.com");
        service.send_to_email("a@x.com").unwrap();
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);

        // Verified: silent no-op again.
        let users = UserRepository::new(&db);
        let mut profile = users.get_profile(&user.id).unwrap().unwrap();
        profile.email_verified = true;
        users.update_profile(&profile).unwrap();
        service.send_to_email("a@x.com").unwrap();
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }
}
