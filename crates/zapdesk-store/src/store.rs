// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The service reconciliation state machine.
//!
//! [`ReconciliationStore`] owns the `service id -> Service` map and the
//! per-contact availability locks, and merges two unordered sources into
//! one view:
//! - paginated REST snapshots ([`ReconciliationStore::seed_services`]),
//!   which are partial and possibly stale;
//! - live socket events ([`ReconciliationStore::apply_event`]), applied
//!   strictly in arrival order.
//!
//! The merge is additive and idempotent: applying any event twice leaves
//! observable state unchanged after the first application, and either
//! interleaving of a snapshot and the events it predates converges to the
//! same final state. Mutations never fail; anomalies are logged and the
//! store keeps going.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use zapdesk_core::event::{ControlCode, DomainEvent, LifecycleAction};
use zapdesk_core::types::{
    AvailabilityLock, ChatMessage, Contact, ContactId, Service, ServiceId, ServiceStatus,
};

/// Max buffered messages per unknown service id.
const ORPHAN_MESSAGE_CAP: usize = 32;
/// Max distinct unknown service ids buffered at once; beyond this the
/// oldest buffered service is evicted wholesale.
const ORPHAN_SERVICE_CAP: usize = 64;

/// In-memory reconciliation state for one UI-facing session.
///
/// Single-owner, no interior locking: all mutations happen synchronously
/// inside a socket-frame or fetch-completion handler.
#[derive(Debug)]
pub struct ReconciliationStore {
    local_user: String,
    services: HashMap<ServiceId, Service>,
    /// Ids whose status and assignment were set by a live lifecycle event;
    /// a later (stale) snapshot must not downgrade those fields. Fields the
    /// event never carries still come from snapshots.
    status_touched: HashSet<ServiceId>,
    /// Ids whose unread counter was advanced by a live message; snapshots
    /// fetched before that message would reset it.
    unread_touched: HashSet<ServiceId>,
    locks: HashMap<ContactId, AvailabilityLock>,
    /// Locally-tracked "current service" designation per contact. Live
    /// events only; snapshots never set this (the projector falls back to
    /// a status match instead).
    current: HashMap<ContactId, ServiceId>,
    /// Services started by another agent: kept, but not surfaced as
    /// pending work for the local user.
    suppressed: HashSet<ServiceId>,
    /// Services the backend told us to stop tracking. Late frames and
    /// stale snapshot rows referencing these are dropped.
    discarded: HashSet<ServiceId>,
    /// Short-lived buffer for messages that arrived before their service.
    orphans: HashMap<ServiceId, Vec<ChatMessage>>,
    orphan_order: VecDeque<ServiceId>,
    contacts: HashMap<ContactId, Contact>,
    phone_index: HashMap<String, ContactId>,
}

impl ReconciliationStore {
    /// Creates an empty store for the given local agent label.
    ///
    /// The label is compared against the `user` field of lifecycle events
    /// to distinguish own actions from another agent's takeover.
    pub fn new(local_user: impl Into<String>) -> Self {
        Self {
            local_user: local_user.into(),
            services: HashMap::new(),
            status_touched: HashSet::new(),
            unread_touched: HashSet::new(),
            locks: HashMap::new(),
            current: HashMap::new(),
            suppressed: HashSet::new(),
            discarded: HashSet::new(),
            orphans: HashMap::new(),
            orphan_order: VecDeque::new(),
            contacts: HashMap::new(),
            phone_index: HashMap::new(),
        }
    }

    /// Drops all state, returning the store to its freshly-constructed
    /// shape. Used when the observed context switches and nothing from the
    /// previous one may leak.
    pub fn reset(&mut self) {
        let local_user = std::mem::take(&mut self.local_user);
        *self = Self::new(local_user);
    }

    pub fn local_user(&self) -> &str {
        &self.local_user
    }

    // ----- snapshot seeding -----------------------------------------------

    /// Merges one REST page of services into the store.
    ///
    /// Snapshots are partial: entries absent from the page are never
    /// removed. For entries already known, field groups learned from live
    /// events win over the snapshot while untouched groups take the
    /// snapshot; messages are merged by id union so a snapshot can never
    /// erase messages learned live.
    pub fn seed_services(&mut self, page: Vec<Service>) {
        for incoming in page {
            if self.discarded.contains(&incoming.id) {
                debug!(service_id = %incoming.id, "snapshot row for discarded service ignored");
                continue;
            }

            match self.services.get_mut(&incoming.id) {
                None => {
                    let id = incoming.id.clone();
                    let mut service = incoming;
                    dedup_messages_in_place(&mut service.messages);
                    self.services.insert(id.clone(), service);
                    self.replay_orphans(&id);
                }
                Some(existing) => {
                    let status_live = self.status_touched.contains(&incoming.id);
                    let unread_live = self.unread_touched.contains(&incoming.id);
                    merge_snapshot_into(existing, incoming, status_live, unread_live);
                }
            }
        }
    }

    /// Replaces or inserts contacts from a REST page, rebuilding the phone
    /// lookup index. A real contact always replaces a placeholder.
    pub fn seed_contacts(&mut self, page: Vec<Contact>) {
        for mut contact in page {
            contact.placeholder = false;
            if !contact.phone_number.is_empty() {
                self.phone_index
                    .insert(contact.phone_number.clone(), contact.id.clone());
            }
            self.contacts.insert(contact.id.clone(), contact);
        }
    }

    // ----- event application ----------------------------------------------

    /// Applies one decoded event, in arrival order.
    ///
    /// Idempotent: re-applying the same event is a no-op after the first
    /// application. Never fails; inconsistencies are logged and skipped.
    pub fn apply_event(&mut self, event: DomainEvent) {
        match event {
            DomainEvent::ChatMessage { service_id, message } => {
                self.apply_chat_message(service_id, message);
            }
            DomainEvent::Lifecycle {
                action,
                service,
                acting_user,
                contact,
            } => {
                self.apply_lifecycle(action, service, acting_user, contact);
            }
            DomainEvent::Control {
                code,
                service_id,
                contact_id,
                user,
            } => {
                self.apply_control(code, service_id, contact_id, user);
            }
        }
    }

    fn apply_chat_message(&mut self, service_id: ServiceId, message: ChatMessage) {
        if self.discarded.contains(&service_id) {
            debug!(service_id = %service_id, "message for discarded service dropped");
            return;
        }

        let Some(service) = self.services.get_mut(&service_id) else {
            self.buffer_orphan(service_id, message);
            return;
        };

        if append_message(service, message) {
            self.unread_touched.insert(service_id);
        }
    }

    fn apply_lifecycle(
        &mut self,
        action: LifecycleAction,
        incoming: Service,
        acting_user: Option<String>,
        contact: Option<Contact>,
    ) {
        let service_id = incoming.id.clone();
        let contact_id = incoming.contact_id.clone();

        if self.discarded.contains(&service_id) {
            debug!(
                service_id = %service_id,
                action = ?action,
                "lifecycle event for discarded service ignored"
            );
            return;
        }

        self.upsert_from_event(incoming);
        self.status_touched.insert(service_id.clone());
        self.replay_orphans(&service_id);

        // Placeholder contacts only fill gaps, never overwrite REST truth.
        if let Some(contact) = contact
            && !self.contacts.contains_key(&contact_id)
        {
            if !contact.phone_number.is_empty() {
                self.phone_index
                    .insert(contact.phone_number.clone(), contact.id.clone());
            }
            self.contacts.insert(contact_id.clone(), contact);
        }

        match action {
            LifecycleAction::Created => {
                let is_pending = self
                    .services
                    .get(&service_id)
                    .is_some_and(|s| s.status == ServiceStatus::Pending);
                if is_pending {
                    self.current
                        .entry(contact_id)
                        .or_insert_with(|| service_id.clone());
                }
            }
            LifecycleAction::Started => {
                let own = acting_user.as_deref() == Some(self.local_user.as_str());
                if own {
                    self.locks.insert(contact_id.clone(), AvailabilityLock::unlocked());
                    self.suppressed.remove(&service_id);
                    self.current.insert(contact_id, service_id);
                } else if let Some(user) = acting_user {
                    debug!(
                        service_id = %service_id,
                        locked_by = %user,
                        "service taken by another agent"
                    );
                    self.locks
                        .insert(contact_id.clone(), AvailabilityLock::locked(user));
                    self.suppressed.insert(service_id.clone());
                    self.drop_current_if(&contact_id, &service_id);
                }
            }
            LifecycleAction::Finished
            | LifecycleAction::Dismissed
            | LifecycleAction::Transferred => {
                self.drop_current_if(&contact_id, &service_id);
                self.suppressed.remove(&service_id);
                if action == LifecycleAction::Finished {
                    self.locks.insert(contact_id, AvailabilityLock::unlocked());
                }
            }
        }
    }

    fn apply_control(
        &mut self,
        code: ControlCode,
        service_id: Option<ServiceId>,
        contact_id: Option<ContactId>,
        user: Option<String>,
    ) {
        match code {
            ControlCode::LockedByOther => {
                if let Some(contact_id) = &contact_id {
                    let lock = match user {
                        Some(user) => AvailabilityLock::locked(user),
                        None => AvailabilityLock::locked("unknown"),
                    };
                    self.locks.insert(contact_id.clone(), lock);
                }
                if let Some(service_id) = service_id {
                    self.discard_service(&service_id);
                }
            }
            ControlCode::Unlocked => {
                if let Some(contact_id) = contact_id {
                    self.locks.insert(contact_id, AvailabilityLock::unlocked());
                } else {
                    warn!("unlock signal without contact id dropped");
                }
            }
            ControlCode::Discarded => {
                if let Some(service_id) = service_id {
                    self.discard_service(&service_id);
                } else {
                    warn!("discard signal without service id dropped");
                }
            }
        }
    }

    /// Removes a service from the active set entirely: it is not this
    /// client's to track. Buffered orphans for it are dropped.
    fn discard_service(&mut self, service_id: &ServiceId) {
        if let Some(service) = self.services.remove(service_id) {
            self.drop_current_if(&service.contact_id, service_id);
        }
        self.status_touched.remove(service_id);
        self.unread_touched.remove(service_id);
        self.suppressed.remove(service_id);
        if self.orphans.remove(service_id).is_some() {
            debug!(service_id = %service_id, "buffered messages dropped with discarded service");
        }
        self.discarded.insert(service_id.clone());
    }

    fn drop_current_if(&mut self, contact_id: &ContactId, service_id: &ServiceId) {
        if self.current.get(contact_id) == Some(service_id) {
            self.current.remove(contact_id);
        }
    }

    /// Event-sourced upsert: the event's fields are more recent than
    /// anything a snapshot said, so they win; messages already known are
    /// kept (lifecycle events do not carry transcripts).
    fn upsert_from_event(&mut self, incoming: Service) {
        match self.services.get_mut(&incoming.id) {
            None => {
                self.services.insert(incoming.id.clone(), incoming);
            }
            Some(existing) => {
                existing.status = incoming.status;
                if incoming.assigned_user.is_some() {
                    existing.assigned_user = incoming.assigned_user;
                }
                existing.created_at = incoming.created_at.or(existing.created_at);
                existing.started_at = incoming.started_at.or(existing.started_at);
                existing.finished_at = incoming.finished_at.or(existing.finished_at);
            }
        }
    }

    fn buffer_orphan(&mut self, service_id: ServiceId, message: ChatMessage) {
        let is_new_key = !self.orphans.contains_key(&service_id);
        let buffer = self.orphans.entry(service_id.clone()).or_default();

        if buffer.iter().any(|m| m.id == message.id) {
            return;
        }
        if buffer.len() >= ORPHAN_MESSAGE_CAP {
            warn!(
                service_id = %service_id,
                message_id = %message.id.0,
                "orphan buffer full, message dropped"
            );
            return;
        }
        debug!(
            service_id = %service_id,
            message_id = %message.id.0,
            "message buffered for unknown service"
        );
        buffer.push(message);

        if is_new_key {
            self.orphan_order.push_back(service_id);
            self.evict_orphans_over_cap();
        }
    }

    fn evict_orphans_over_cap(&mut self) {
        while self.orphans.len() > ORPHAN_SERVICE_CAP {
            let Some(oldest) = self.orphan_order.pop_front() else {
                break;
            };
            // Keys already resolved or discarded are skipped lazily.
            if self.orphans.remove(&oldest).is_some() {
                warn!(service_id = %oldest, "orphan buffer evicted, messages lost");
            }
        }
    }

    /// Replays buffered messages once their service materialized.
    fn replay_orphans(&mut self, service_id: &ServiceId) {
        let Some(buffered) = self.orphans.remove(service_id) else {
            return;
        };
        let Some(service) = self.services.get_mut(service_id) else {
            return;
        };
        let count = buffered.len();
        for message in buffered {
            append_message(service, message);
        }
        self.unread_touched.insert(service_id.clone());
        debug!(service_id = %service_id, count, "replayed buffered messages");
    }

    // ----- reads ----------------------------------------------------------

    pub fn get_service(&self, id: &ServiceId) -> Option<&Service> {
        self.services.get(id)
    }

    /// Current lock for a contact; `Unset` when nothing is known.
    pub fn get_lock(&self, contact_id: &ContactId) -> AvailabilityLock {
        self.locks.get(contact_id).cloned().unwrap_or_default()
    }

    pub fn get_contact(&self, contact_id: &ContactId) -> Option<&Contact> {
        self.contacts.get(contact_id)
    }

    /// Looks a contact up by the phone number some events use as the only
    /// contact key.
    pub fn contact_by_phone(&self, phone: &str) -> Option<&Contact> {
        self.phone_index.get(phone).and_then(|id| self.contacts.get(id))
    }

    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub(crate) fn is_suppressed(&self, id: &ServiceId) -> bool {
        self.suppressed.contains(id)
    }

    pub(crate) fn current_id_for(&self, contact_id: &ContactId) -> Option<&ServiceId> {
        self.current.get(contact_id)
    }
}

/// Appends a message if its id is not already present, maintaining the
/// unread counter. Returns whether the message was actually appended.
fn append_message(service: &mut Service, message: ChatMessage) -> bool {
    if service.messages.iter().any(|m| m.id == message.id) {
        debug!(
            service_id = %service.id,
            message_id = %message.id.0,
            "duplicate message delivery ignored"
        );
        return false;
    }
    if message.from_me {
        // Our own outbound message implies we have seen the thread.
        service.unread_count = 0;
    } else {
        service.unread_count += 1;
    }
    service.messages.push(message);
    true
}

/// Merges a snapshot row into an existing entry. The two flags mark field
/// groups already set by live events; for those the snapshot only fills
/// gaps, since the events are by definition more recent than the page
/// fetch. Field groups no live event touched still take the snapshot, so a
/// re-seed can correct frames this client missed.
fn merge_snapshot_into(
    existing: &mut Service,
    incoming: Service,
    status_live: bool,
    unread_live: bool,
) {
    if status_live {
        if existing.assigned_user.is_none() {
            existing.assigned_user = incoming.assigned_user;
        }
        existing.created_at = existing.created_at.or(incoming.created_at);
        existing.started_at = existing.started_at.or(incoming.started_at);
        existing.finished_at = existing.finished_at.or(incoming.finished_at);
    } else {
        existing.status = incoming.status;
        existing.assigned_user = incoming.assigned_user;
        existing.created_at = incoming.created_at.or(existing.created_at);
        existing.started_at = incoming.started_at.or(existing.started_at);
        existing.finished_at = incoming.finished_at.or(existing.finished_at);
    }
    if !unread_live {
        existing.unread_count = incoming.unread_count;
    }

    for message in incoming.messages {
        if !existing.messages.iter().any(|m| m.id == message.id) {
            existing.messages.push(message);
        }
    }
}

fn dedup_messages_in_place(messages: &mut Vec<ChatMessage>) {
    let mut seen = HashSet::new();
    messages.retain(|m| seen.insert(m.id.clone()));
}
