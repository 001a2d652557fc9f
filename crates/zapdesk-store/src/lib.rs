// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service reconciliation store and view projections.
//!
//! This crate is the core state machine of Zapdesk: it merges paginated
//! REST snapshots with live socket events into one consistent view of an
//! agent's services, contacts, and availability locks, and derives the
//! UI-facing lists (pending, in-progress, per-contact transcripts) on
//! demand.

pub mod projector;
pub mod store;

pub use store::ReconciliationStore;
