// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Outbound email.
//!
//! Delivery is behind a trait so handlers and the OTP service do not care
//! whether mail actually leaves the process. The default [`LogMailer`]
//! writes messages to the log, which is what development and test
//! environments run with.

use std::sync::Mutex;

/// Something that can deliver a plain-text email.
pub trait EmailSender: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str);
}

/// Mailer that logs instead of sending.
#[derive(Debug, Default)]
pub struct LogMailer;

impl EmailSender for LogMailer {
    fn send(&self, to: &str, subject: &str, body: &str) {
        tracing::info!(to, subject, body, "outbound email");
    }
}

/// Test mailer that records every message it is asked to send.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String, String)>>,
}

impl EmailSender for RecordingMailer {
    fn send(&self, to: &str, subject: &str, body: &str) {
        self.sent
            .lock()
            .expect("mailer mutex poisoned")
            .push((to.to_string(), subject.to_string(), body.to_string()));
    }
}
