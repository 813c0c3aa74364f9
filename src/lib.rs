// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Chambers: multi-tenant legal practice management backend.
//!
//! Firms (tenants) onboard, manage staff and clients, and track legal
//! cases. Identity, sessions and tenant authorization are handled
//! in-process; cases carry firm-scoped sequential numbers allocated under
//! a per-firm lock.

pub mod api;
pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
