// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-side projections over the reconciliation store.
//!
//! All derivations are recomputed on demand rather than incrementally
//! maintained; the data volumes involved (one agent's open tickets) make
//! that the simpler and fast-enough choice.

use zapdesk_core::types::{ContactId, Service, ServiceStatus};

use crate::store::ReconciliationStore;

impl ReconciliationStore {
    /// All pending services whose contact is not a group, excluding
    /// services suppressed because another agent already took them.
    /// Ordered by creation time ascending (unknown times last).
    pub fn pending_services(&self) -> Vec<&Service> {
        let mut pending: Vec<&Service> = self
            .services()
            .filter(|s| s.status == ServiceStatus::Pending)
            .filter(|s| !self.is_suppressed(&s.id))
            .filter(|s| !self.is_group_contact(&s.contact_id))
            .collect();
        sort_by_anchor(&mut pending);
        pending
    }

    /// All in-progress services, ordered by start/creation time ascending.
    pub fn in_progress_services(&self) -> Vec<&Service> {
        let mut in_progress: Vec<&Service> = self
            .services()
            .filter(|s| s.status == ServiceStatus::InProgress)
            .collect();
        sort_by_anchor(&mut in_progress);
        in_progress
    }

    /// The service the local user should see as "current" for a contact:
    /// the locally-tracked live designation when one exists, else the
    /// first open (pending/in-progress, not suppressed) match in the store.
    pub fn current_service_for(&self, contact_id: &ContactId) -> Option<&Service> {
        if let Some(id) = self.current_id_for(contact_id)
            && let Some(service) = self.get_service(id)
        {
            return Some(service);
        }

        let mut open: Vec<&Service> = self
            .services()
            .filter(|s| &s.contact_id == contact_id)
            .filter(|s| s.status.is_open())
            .filter(|s| !self.is_suppressed(&s.id))
            .collect();
        sort_by_anchor(&mut open);
        open.first().copied()
    }

    /// Full transcript for a contact: every known service, ordered by
    /// creation/start time ascending, with each service's messages
    /// deduplicated by id and stably sorted by timestamp ascending (ties
    /// keep arrival order).
    pub fn transcript_for(&self, contact_id: &ContactId) -> Vec<Service> {
        let mut services: Vec<Service> = self
            .services()
            .filter(|s| &s.contact_id == contact_id)
            .cloned()
            .collect();
        services.sort_by_key(|s| (s.anchor_time().is_none(), s.anchor_time(), s.id.0.clone()));

        for service in &mut services {
            // Messages are stored in arrival order; a stable sort by
            // timestamp yields display order with arrival ties preserved.
            service.messages.sort_by_key(|m| m.timestamp);
        }
        services
    }

    /// True iff the contact's open service is held by an agent other than
    /// `local_user`.
    pub fn is_contact_locked_by_other(&self, contact_id: &ContactId, local_user: &str) -> bool {
        let lock = self.get_lock(contact_id);
        lock.is_locked() && lock.locked_by.as_deref() != Some(local_user)
    }

    /// Total unread messages across all non-suppressed services.
    pub fn total_unread(&self) -> u64 {
        self.services()
            .filter(|s| !self.is_suppressed(&s.id))
            .map(|s| u64::from(s.unread_count))
            .sum()
    }

    fn is_group_contact(&self, contact_id: &ContactId) -> bool {
        // Unknown contacts count as individuals; the next REST refresh
        // corrects the classification if needed.
        self.get_contact(contact_id).is_some_and(|c| c.is_group)
    }
}

fn sort_by_anchor(services: &mut [&Service]) {
    services.sort_by_key(|s| (s.anchor_time().is_none(), s.anchor_time(), s.id.0.clone()));
}
