// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Shared application state.

use std::sync::Arc;

use crate::auth::{OtpService, TokenIssuer};
use crate::config::AppConfig;
use crate::email::{EmailSender, LogMailer};
use crate::storage::Db;

/// State shared across all request handlers. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Db>,
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenIssuer>,
    pub mailer: Arc<dyn EmailSender>,
}

impl AppState {
    /// Production state: token secret from the environment, log-only mailer.
    pub fn new(db: Db, config: AppConfig) -> Self {
        let tokens = TokenIssuer::from_env(&config);
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            mailer: Arc::new(LogMailer),
        }
    }

    /// Swap the mailer (tests use a recording one).
    pub fn with_mailer(mut self, mailer: Arc<dyn EmailSender>) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn otp_service(&self) -> OtpService<'_> {
        OtpService::new(&self.db, self.mailer.as_ref(), self.config.otp_email_enabled)
    }
}
