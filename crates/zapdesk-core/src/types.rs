// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Zapdesk workspace.
//!
//! These mirror the backend's REST payloads closely enough to deserialize
//! paginated snapshots directly, while keeping the identity fields
//! normalized (one id per message, one id per service) so the
//! reconciliation store never deals with raw payload ambiguity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Stable identifier of a service (ticket). A backend UUID, or a transient
/// `service_id` before one is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId(pub String);

/// Identifier of a contact (chat counterpart).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactId(pub String);

/// Identifier of a chat message, unique within a service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for ContactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a service.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServiceStatus {
    Pending,
    InProgress,
    Finalized,
    Dismissed,
    Transferred,
}

impl ServiceStatus {
    /// True for the states in which a service is still someone's to handle.
    pub fn is_open(self) -> bool {
        matches!(self, ServiceStatus::Pending | ServiceStatus::InProgress)
    }
}

/// Opaque media fields attached to a message. The reconciliation core never
/// interprets these; they ride along for the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// A single chat message within a service.
///
/// The backend emits the identity field as either `id` or `message_id`
/// depending on the source; the serde alias normalizes both to one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(alias = "message_id")]
    pub id: MessageId,
    /// Send timestamp, used for display ordering. Ties keep arrival order.
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub from_me: bool,
    /// May be empty for media-only messages.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub media: Option<MediaAttachment>,
}

/// One customer-service ticket/session, tied to one contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(alias = "uuid")]
    pub id: ServiceId,
    pub status: ServiceStatus,
    #[serde(alias = "chat_id")]
    pub contact_id: ContactId,
    #[serde(default)]
    pub assigned_user: Option<String>,
    /// Timestamp-ascending at the projection boundary; internally kept in
    /// arrival order.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Service {
    /// The instant used when ordering a contact's services in a transcript.
    pub fn anchor_time(&self) -> Option<DateTime<Utc>> {
        self.created_at.or(self.started_at)
    }
}

/// A chat counterpart (individual or group).
///
/// Contacts are supplied by REST snapshots; events that only carry a phone
/// number may synthesize a `placeholder` contact that lives until the next
/// refresh replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Synthesized from an event payload, never persisted.
    #[serde(default, skip_serializing)]
    pub placeholder: bool,
}

/// Per-contact advisory lock state reflecting backend truth about which
/// agent currently owns the contact's open service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockState {
    Locked,
    Unlocked,
    #[default]
    Unset,
}

/// Availability lock for one contact.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AvailabilityLock {
    pub state: LockState,
    /// Label of the locking agent, present only when `state == Locked`.
    pub locked_by: Option<String>,
}

impl AvailabilityLock {
    pub fn locked(by: impl Into<String>) -> Self {
        Self {
            state: LockState::Locked,
            locked_by: Some(by.into()),
        }
    }

    pub fn unlocked() -> Self {
        Self {
            state: LockState::Unlocked,
            locked_by: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.state == LockState::Locked
    }
}

/// Connection status of one socket instance. Process-wide per handle, no
/// persistence across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Closed,
}

/// One page of a paginated REST response.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}
