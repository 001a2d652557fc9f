// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `tail` subcommand: run a session and print the reconciled view as
//! it evolves, until Ctrl+C.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use zapdesk_api::TokenProvider;
use zapdesk_config::ZapdeskConfig;
use zapdesk_core::error::ZapdeskError;
use zapdesk_core::types::ContactId;
use zapdesk_session::{ScheduledTask, Session};

/// Re-supplies the configured token. The backend invalidates tokens on
/// logout, not on a schedule, so until a login exchange exists the
/// configured one is the freshest we have.
struct ConfigTokenProvider {
    token: String,
}

#[async_trait]
impl TokenProvider for ConfigTokenProvider {
    async fn refresh_token(&self) -> Result<String, ZapdeskError> {
        if self.token.is_empty() {
            return Err(ZapdeskError::Auth("no api.token configured".into()));
        }
        Ok(self.token.clone())
    }
}

pub async fn run(config: ZapdeskConfig, contact: Option<String>) -> Result<(), ZapdeskError> {
    let provider = Arc::new(ConfigTokenProvider {
        token: config.api.token.clone().unwrap_or_default(),
    });
    let mut session = Session::start(&config, provider)?;

    session.refresh_contacts().await?;
    session.refresh_services().await?;

    if let Some(contact) = contact {
        session.select_contact(ContactId(contact)).await?;
    }

    // Periodic re-seed keeps the view honest across missed frames.
    let overview = session.overview();
    let api = session.api_handle();
    let page_size = config.session.page_size;
    let mut refresher = ScheduledTask::spawn(
        "snapshot-refresh",
        Duration::from_secs(config.session.refresh_interval_secs),
        move || {
            let overview = overview.clone();
            let api = api.clone();
            async move {
                if let Err(error) =
                    zapdesk_session::refresh_services_into(&api, &overview, page_size).await
                {
                    warn!(%error, "snapshot refresh failed");
                }
            }
        },
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C, shutting down");
                break;
            }
            _ = ticker.tick() => {
                print_summary(&session).await;
            }
        }
    }

    refresher.shutdown().await;
    session.close();
    Ok(())
}

async fn print_summary(session: &Session) {
    let overview = session.overview();
    let store = overview.lock().await;
    let pending = store.pending_services();
    let in_progress = store.in_progress_services();
    println!(
        "[{}] pending: {}  in progress: {}  unread: {}",
        session.connection_status(),
        pending.len(),
        in_progress.len(),
        store.total_unread(),
    );
    for service in pending {
        let name = store
            .get_contact(&service.contact_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| service.contact_id.0.clone());
        println!("  pending {} from {name}", service.id);
    }

    if let Some(scope) = session.chat() {
        let chat = scope.store();
        let chat_store = chat.lock().await;
        let transcript = chat_store.transcript_for(scope.contact_id());
        let messages: usize = transcript.iter().map(|s| s.messages.len()).sum();
        println!(
            "  chat {}: {} services, {} messages",
            scope.contact_id(),
            transcript.len(),
            messages
        );
    }
}
