// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Zapdesk reconciliation engine.
//!
//! Zapdesk merges paginated REST snapshots of customer-service tickets
//! ("services") with a live WebSocket event stream into one consistent
//! in-memory view. This crate provides the shared domain types, the typed
//! [`event::DomainEvent`] union with its pure frame decoder, and the
//! workspace-wide [`ZapdeskError`].

pub mod error;
pub mod event;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ZapdeskError;
pub use event::{decode, ControlCode, DomainEvent, LifecycleAction};
pub use types::{
    AvailabilityLock, ChatMessage, ConnectionStatus, Contact, ContactId, LockState,
    MediaAttachment, MessageId, Page, Service, ServiceId, ServiceStatus,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_status_display() {
        assert_eq!(ConnectionStatus::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionStatus::Open.to_string(), "open");
        assert_eq!(ConnectionStatus::Closed.to_string(), "closed");
    }

    #[test]
    fn decode_is_reachable_from_crate_root() {
        assert!(decode(&serde_json::json!({})).is_none());
    }
}
