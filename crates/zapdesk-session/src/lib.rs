// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session orchestration for Zapdesk.
//!
//! A [`Session`] ties the pieces together: it keeps the overview store fed
//! by the global socket and periodic snapshot refreshes, and manages at
//! most one [`ChatScope`] at a time, a per-contact store with its own
//! dedicated socket that is torn down and rebuilt whole whenever the
//! selected contact changes.

pub mod session;
pub mod tasks;

pub use session::{refresh_contacts_into, refresh_services_into, ChatScope, Session};
pub use tasks::ScheduledTask;
