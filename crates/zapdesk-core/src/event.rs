// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Frame decoding: raw socket JSON into the typed [`DomainEvent`] union.
//!
//! Frame envelope (both the global and the per-chat channel):
//! ```json
//! {"type": "chat.message", "data": {"uuid": "…", "message": {…}}}
//! {"type": "service.event", "data": {"action": "started", …}}
//! ```
//!
//! `data.action` discriminates lifecycle actions from control codes. Control
//! codes are opaque backend constants; their meaning is fixed by contract
//! and must not be derived.
//!
//! Decoding is pure: [`decode`] never panics and returns `None` on
//! structurally invalid input. All field fallbacks (`uuid` vs `service_id`,
//! `id` vs `message_id`) are resolved here so downstream code only ever
//! sees normalized identities.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::types::{
    ChatMessage, Contact, ContactId, MediaAttachment, MessageId, Service, ServiceId, ServiceStatus,
};

/// Frame `type` discriminators.
pub mod frame_types {
    /// A chat message scoped to one service.
    pub const CHAT_MESSAGE: &str = "chat.message";
    /// A service lifecycle transition or control signal.
    pub const SERVICE_EVENT: &str = "service.event";
}

/// Opaque backend control-code constants.
pub mod control_codes {
    /// Another agent took over the contact's open service.
    pub const LOCKED_BY_OTHER: &str = "code_a10000";
    /// The contact's service was released.
    pub const UNLOCKED: &str = "code_a20000";
    /// The referenced service was superseded or duplicated; stop tracking it.
    pub const DISCARDED: &str = "code_a40000";
}

/// A decoded control signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCode {
    LockedByOther,
    Unlocked,
    Discarded,
}

impl ControlCode {
    pub fn from_wire(code: &str) -> Option<Self> {
        match code {
            control_codes::LOCKED_BY_OTHER => Some(ControlCode::LockedByOther),
            control_codes::UNLOCKED => Some(ControlCode::Unlocked),
            control_codes::DISCARDED => Some(ControlCode::Discarded),
            _ => None,
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            ControlCode::LockedByOther => control_codes::LOCKED_BY_OTHER,
            ControlCode::Unlocked => control_codes::UNLOCKED,
            ControlCode::Discarded => control_codes::DISCARDED,
        }
    }
}

/// A service lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Created,
    Started,
    Finished,
    Dismissed,
    Transferred,
}

impl LifecycleAction {
    pub fn from_wire(action: &str) -> Option<Self> {
        match action {
            "created" => Some(LifecycleAction::Created),
            "started" => Some(LifecycleAction::Started),
            "finished" => Some(LifecycleAction::Finished),
            "dismissed" => Some(LifecycleAction::Dismissed),
            "transferred" => Some(LifecycleAction::Transferred),
            _ => None,
        }
    }

    /// Status a service lands in after this action, used when the event
    /// payload does not carry an explicit `status`.
    pub fn implied_status(self) -> ServiceStatus {
        match self {
            LifecycleAction::Created => ServiceStatus::Pending,
            LifecycleAction::Started => ServiceStatus::InProgress,
            LifecycleAction::Finished => ServiceStatus::Finalized,
            LifecycleAction::Dismissed => ServiceStatus::Dismissed,
            LifecycleAction::Transferred => ServiceStatus::Transferred,
        }
    }
}

/// A typed event decoded from one socket frame.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// A chat message addressed to one service.
    ChatMessage {
        service_id: ServiceId,
        message: ChatMessage,
    },
    /// A service lifecycle transition with its (partial) service payload.
    Lifecycle {
        action: LifecycleAction,
        service: Service,
        /// Label of the agent who performed the action, when present.
        acting_user: Option<String>,
        /// Best-effort placeholder contact synthesized from the payload,
        /// used for rendering until the next REST refresh.
        contact: Option<Contact>,
    },
    /// An opaque control signal.
    Control {
        code: ControlCode,
        service_id: Option<ServiceId>,
        contact_id: Option<ContactId>,
        user: Option<String>,
    },
}

/// Decodes one raw frame into a [`DomainEvent`].
///
/// Returns `None` for unknown frame types and for structurally invalid
/// payloads; never panics.
pub fn decode(frame: &Value) -> Option<DomainEvent> {
    let envelope = frame.as_object()?;
    let frame_type = envelope.get("type")?.as_str()?;
    let data = envelope.get("data")?.as_object().map(|_| &envelope["data"])?;

    match frame_type {
        frame_types::CHAT_MESSAGE => decode_chat_message(data),
        frame_types::SERVICE_EVENT => decode_service_event(data),
        _ => None,
    }
}

fn decode_chat_message(data: &Value) -> Option<DomainEvent> {
    let service_id = service_id_of(data)?;
    // The message may be nested under `message` or inlined in `data`.
    let payload = data.get("message").unwrap_or(data);
    let message = decode_message(payload)?;
    Some(DomainEvent::ChatMessage {
        service_id,
        message,
    })
}

fn decode_service_event(data: &Value) -> Option<DomainEvent> {
    let action = str_field(data, "action")?;

    if let Some(code) = ControlCode::from_wire(&action) {
        return Some(DomainEvent::Control {
            code,
            service_id: service_id_of(data),
            contact_id: contact_id_of(data),
            user: acting_user_of(data),
        });
    }

    let action = LifecycleAction::from_wire(&action)?;
    // The service payload may be nested under `service` or inlined.
    let payload = data.get("service").unwrap_or(data);
    let service = decode_service(payload, action)?;
    let acting_user = acting_user_of(data).or_else(|| service.assigned_user.clone());
    let contact = placeholder_contact_of(data, &service.contact_id);

    Some(DomainEvent::Lifecycle {
        action,
        service,
        acting_user,
        contact,
    })
}

fn decode_message(payload: &Value) -> Option<ChatMessage> {
    let id = str_field(payload, "id")
        .or_else(|| str_field(payload, "message_id"))
        .map(MessageId)?;
    let timestamp = timestamp_field(payload, "timestamp")?;
    let media = payload
        .get("media")
        .and_then(|m| serde_json::from_value::<MediaAttachment>(m.clone()).ok());

    Some(ChatMessage {
        id,
        timestamp,
        from_me: payload.get("from_me").and_then(Value::as_bool).unwrap_or(false),
        text: str_field(payload, "text").unwrap_or_default(),
        media,
    })
}

fn decode_service(payload: &Value, action: LifecycleAction) -> Option<Service> {
    let id = service_id_of(payload)?;
    let contact_id = contact_id_of(payload)?;
    let status = str_field(payload, "status")
        .and_then(|s| s.parse::<ServiceStatus>().ok())
        .unwrap_or_else(|| action.implied_status());

    Some(Service {
        id,
        status,
        contact_id,
        assigned_user: str_field(payload, "assigned_user").or_else(|| str_field(payload, "user")),
        messages: Vec::new(),
        unread_count: 0,
        created_at: timestamp_field(payload, "created_at"),
        started_at: timestamp_field(payload, "started_at"),
        finished_at: timestamp_field(payload, "finished_at"),
    })
}

/// Service identity: `uuid` from the backend, transient `service_id` before
/// one is assigned, plain `id` in REST-shaped payloads.
fn service_id_of(payload: &Value) -> Option<ServiceId> {
    str_field(payload, "uuid")
        .or_else(|| str_field(payload, "service_id"))
        .or_else(|| str_field(payload, "id"))
        .map(ServiceId)
}

/// Contact identity: UUID when present, else the phone number that some
/// events carry as the only contact key.
fn contact_id_of(payload: &Value) -> Option<ContactId> {
    str_field(payload, "contact_id")
        .or_else(|| str_field(payload, "chat_id"))
        .or_else(|| str_field(payload, "phone_number"))
        .map(ContactId)
}

fn acting_user_of(payload: &Value) -> Option<String> {
    str_field(payload, "user").or_else(|| str_field(payload, "username"))
}

/// Synthesizes a transient contact from whatever the event carries.
/// Returned only when the payload has something to show (a name or photo);
/// the store ignores it if the contact is already known from REST.
fn placeholder_contact_of(data: &Value, contact_id: &ContactId) -> Option<Contact> {
    let payload = data.get("contact").unwrap_or(data);
    let name = str_field(payload, "contact_name").or_else(|| str_field(payload, "name"));
    let photo_url = str_field(payload, "photo_url").or_else(|| str_field(payload, "photo"));
    if name.is_none() && photo_url.is_none() {
        return None;
    }

    Some(Contact {
        id: contact_id.clone(),
        phone_number: str_field(payload, "phone_number").unwrap_or_else(|| contact_id.0.clone()),
        name: name.unwrap_or_default(),
        is_group: payload.get("is_group").and_then(Value::as_bool).unwrap_or(false),
        photo_url,
        placeholder: true,
    })
}

fn str_field(payload: &Value, key: &str) -> Option<String> {
    payload.get(key)?.as_str().map(str::to_owned)
}

fn timestamp_field(payload: &Value, key: &str) -> Option<DateTime<Utc>> {
    let raw = payload.get(key)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
