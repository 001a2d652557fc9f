// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session: overview state plus at most one per-contact chat scope.
//!
//! Both stores are fed the same way: a socket pump task decodes frames and
//! applies them in arrival order, while snapshot fetches seed pages into
//! the store as they land. The overview store lives as long as the
//! session; a chat scope is built fresh on every contact selection so no
//! state leaks between contacts.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use zapdesk_api::{ApiClient, Pager, ServiceQuery, TokenProvider};
use zapdesk_config::ZapdeskConfig;
use zapdesk_core::error::ZapdeskError;
use zapdesk_core::event::decode;
use zapdesk_core::types::{ConnectionStatus, ContactId, ServiceStatus};
use zapdesk_socket::{connect, SocketConfig, SocketHandle};
use zapdesk_store::ReconciliationStore;

/// Per-contact view state: one store, one dedicated socket, one pump.
///
/// Never mutated in place when the contact changes; the session replaces
/// the scope wholesale so a consumer holding the old store keeps a
/// consistent (if frozen) view.
pub struct ChatScope {
    contact_id: ContactId,
    store: Arc<Mutex<ReconciliationStore>>,
    socket: Arc<SocketHandle>,
    _pump: JoinHandle<()>,
}

impl ChatScope {
    pub fn contact_id(&self) -> &ContactId {
        &self.contact_id
    }

    pub fn store(&self) -> Arc<Mutex<ReconciliationStore>> {
        self.store.clone()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.socket.status()
    }

    fn close(&self) {
        self.socket.close();
    }
}

/// One agent's live session against the backend.
pub struct Session {
    api: Arc<ApiClient>,
    ws_base: String,
    local_user: String,
    page_size: u32,
    socket_defaults: SocketConfig,
    overview: Arc<Mutex<ReconciliationStore>>,
    global_socket: Arc<SocketHandle>,
    _global_pump: JoinHandle<()>,
    chat: Option<ChatScope>,
}

impl Session {
    /// Builds the API client, opens the global socket, and starts pumping
    /// events into the overview store. Must run inside a Tokio runtime.
    ///
    /// The socket comes up in the background; an unreachable endpoint
    /// shows as a connection status that never reaches `Open`, not as an
    /// error here.
    pub fn start(
        config: &ZapdeskConfig,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Result<Self, ZapdeskError> {
        let api = Arc::new(ApiClient::new(
            &config.api.base_url,
            config.api.token.clone().unwrap_or_default(),
            token_provider,
        )?);

        let socket_defaults = {
            let mut defaults = SocketConfig::new(String::new());
            defaults.reconnect_delay =
                std::time::Duration::from_millis(config.socket.reconnect_delay_ms);
            defaults.reconnect_on_clean_close = config.socket.reconnect_on_clean_close;
            defaults.frame_buffer = config.socket.frame_buffer;
            defaults
        };

        let ws_base = config.socket.ws_url.trim_end_matches('/').to_owned();
        let overview = Arc::new(Mutex::new(ReconciliationStore::new(
            config.session.local_user.clone(),
        )));

        let global_url = format!("{ws_base}/ws/global/?token={}", api.current_token());
        let global_socket = Arc::new(connect(SocketConfig {
            url: global_url,
            ..socket_defaults.clone()
        }));
        let global_pump = spawn_pump("global", global_socket.clone(), overview.clone());

        info!(local_user = %config.session.local_user, "session started");

        Ok(Self {
            api,
            ws_base,
            local_user: config.session.local_user.clone(),
            page_size: config.session.page_size,
            socket_defaults,
            overview,
            global_socket,
            _global_pump: global_pump,
            chat: None,
        })
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// A cloneable handle on the API client, for background tasks that
    /// outlive a borrow of the session.
    pub fn api_handle(&self) -> Arc<ApiClient> {
        self.api.clone()
    }

    /// The overview store: every open service the agent can see.
    pub fn overview(&self) -> Arc<Mutex<ReconciliationStore>> {
        self.overview.clone()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.global_socket.status()
    }

    /// The current chat scope, if a contact is selected.
    pub fn chat(&self) -> Option<&ChatScope> {
        self.chat.as_ref()
    }

    /// Fetches every page of open services and seeds them into the
    /// overview store. Safe to run concurrently with live events: the
    /// store reconciles, page by page.
    pub async fn refresh_services(&self) -> Result<(), ZapdeskError> {
        refresh_services_into(&self.api, &self.overview, self.page_size).await
    }

    /// Fetches the contact directory into the overview store.
    pub async fn refresh_contacts(&self) -> Result<(), ZapdeskError> {
        refresh_contacts_into(&self.api, &self.overview, self.page_size).await
    }

    /// Selects a contact: tears the previous scope down and builds a new
    /// one with an empty store, a dedicated socket, and that contact's
    /// full service history.
    pub async fn select_contact(&mut self, contact_id: ContactId) -> Result<(), ZapdeskError> {
        if let Some(previous) = self.chat.take() {
            debug!(contact_id = %previous.contact_id, "closing previous chat scope");
            previous.close();
        }

        let store = Arc::new(Mutex::new(ReconciliationStore::new(self.local_user.clone())));
        let url = format!(
            "{}/ws/chat/{contact_id}/?token={}",
            self.ws_base,
            self.api.current_token()
        );
        let socket = Arc::new(connect(SocketConfig {
            url,
            ..self.socket_defaults.clone()
        }));
        let pump = spawn_pump("chat", socket.clone(), store.clone());

        let scope = ChatScope {
            contact_id: contact_id.clone(),
            store,
            socket,
            _pump: pump,
        };

        // History fetch happens with the socket already attached, so frames
        // racing the pages are reconciled instead of lost.
        let mut pager = Pager::new(self.page_size);
        while let Some(page) = pager.next_page() {
            let query = ServiceQuery {
                chat_id: Some(contact_id.0.clone()),
                page,
                page_size: self.page_size,
                ..Default::default()
            };
            let fetched = self.api.fetch_services(&query).await?;
            let rows = pager.absorb(fetched);
            scope.store.lock().await.seed_services(rows);
        }

        info!(contact_id = %contact_id, services = pager.fetched(), "chat scope ready");
        self.chat = Some(scope);
        Ok(())
    }

    /// Drops the current chat scope, if any.
    pub fn clear_contact(&mut self) {
        if let Some(scope) = self.chat.take() {
            debug!(contact_id = %scope.contact_id, "chat scope cleared");
            scope.close();
        }
    }

    /// Closes every socket and stops the pumps. Idempotent.
    pub fn close(&mut self) {
        self.clear_contact();
        self.global_socket.close();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Fetches every page of open services and seeds them into `overview`.
/// Safe to run concurrently with live events: the store reconciles, page
/// by page.
pub async fn refresh_services_into(
    api: &ApiClient,
    overview: &Mutex<ReconciliationStore>,
    page_size: u32,
) -> Result<(), ZapdeskError> {
    let mut pager = Pager::new(page_size);
    while let Some(page) = pager.next_page() {
        let query = ServiceQuery {
            status_in: vec![ServiceStatus::Pending, ServiceStatus::InProgress],
            page,
            page_size,
            ..Default::default()
        };
        let fetched = api.fetch_services(&query).await?;
        let rows = pager.absorb(fetched);
        overview.lock().await.seed_services(rows);
    }
    debug!(count = pager.fetched(), "service snapshot refreshed");
    Ok(())
}

/// Fetches the whole contact directory into `overview`.
pub async fn refresh_contacts_into(
    api: &ApiClient,
    overview: &Mutex<ReconciliationStore>,
    page_size: u32,
) -> Result<(), ZapdeskError> {
    let mut pager = Pager::new(page_size);
    while let Some(page) = pager.next_page() {
        let fetched = api.fetch_contacts(page, page_size).await?;
        let rows = pager.absorb(fetched);
        overview.lock().await.seed_contacts(rows);
    }
    debug!(count = pager.fetched(), "contact snapshot refreshed");
    Ok(())
}

/// Reads frames off a socket and applies the decoded events to a store,
/// until the socket is closed. Undecodable frames are logged and skipped.
fn spawn_pump(
    label: &'static str,
    socket: Arc<SocketHandle>,
    store: Arc<Mutex<ReconciliationStore>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = socket.next_frame().await {
            match decode(&frame) {
                Some(event) => store.lock().await.apply_event(event),
                None => {
                    warn!(pump = label, "undecodable frame skipped");
                }
            }
        }
        debug!(pump = label, "event pump stopped");
    })
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::SinkExt;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    struct StaticProvider;

    #[async_trait]
    impl TokenProvider for StaticProvider {
        async fn refresh_token(&self) -> Result<String, ZapdeskError> {
            Ok("fresh".to_owned())
        }
    }

    /// A websocket endpoint that sends the given frames to every
    /// connection and then idles until the client goes away.
    async fn spawn_ws_server(frames: Vec<String>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let frames = frames.clone();
                tokio::spawn(async move {
                    let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
                    for frame in frames {
                        let _ = ws.send(Message::Text(frame.into())).await;
                    }
                    use futures::StreamExt;
                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        });
        addr
    }

    fn test_config(api_base: &str, ws_addr: SocketAddr) -> ZapdeskConfig {
        let mut config = ZapdeskConfig::default();
        config.api.base_url = api_base.to_owned();
        config.api.token = Some("tok".to_owned());
        config.socket.ws_url = format!("ws://{ws_addr}");
        config.socket.reconnect_delay_ms = 50;
        config.session.local_user = "ana".to_owned();
        config.session.page_size = 2;
        config
    }

    fn service_row(id: &str, contact: &str) -> serde_json::Value {
        serde_json::json!({"uuid": id, "status": "pending", "chat_id": contact})
    }

    async fn wait_until(mut check: impl AsyncFnMut() -> bool) {
        for _ in 0..200 {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn refresh_services_walks_all_pages_into_the_overview() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/service"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "count": 3,
                "next": "http://x/?page=2",
                "previous": null,
                "results": [service_row("s1", "c1"), service_row("s2", "c2")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/service"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "count": 3,
                "next": null,
                "previous": null,
                "results": [service_row("s3", "c3")]
            })))
            .mount(&server)
            .await;

        let ws = spawn_ws_server(vec![]).await;
        let session = Session::start(&test_config(&server.uri(), ws), Arc::new(StaticProvider))
            .unwrap();

        session.refresh_services().await.unwrap();
        assert_eq!(session.overview().lock().await.service_count(), 3);
    }

    #[tokio::test]
    async fn global_socket_frames_reach_the_overview_store() {
        let server = MockServer::start().await;
        let ws = spawn_ws_server(vec![serde_json::json!({
            "type": "service.event",
            "data": {"action": "created", "uuid": "s9", "contact_id": "c9"}
        })
        .to_string()])
        .await;

        let session = Session::start(&test_config(&server.uri(), ws), Arc::new(StaticProvider))
            .unwrap();

        let overview = session.overview();
        wait_until(async || overview.lock().await.service_count() == 1).await;
    }

    #[tokio::test]
    async fn select_contact_builds_an_isolated_scope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/service"))
            .and(query_param("chat_id", "c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "count": 1, "next": null, "previous": null,
                "results": [service_row("s1", "c1")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/service"))
            .and(query_param("chat_id", "c2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "count": 0, "next": null, "previous": null, "results": []
            })))
            .mount(&server)
            .await;

        let ws = spawn_ws_server(vec![]).await;
        let mut session =
            Session::start(&test_config(&server.uri(), ws), Arc::new(StaticProvider)).unwrap();

        session.select_contact(ContactId("c1".into())).await.unwrap();
        let first_store = session.chat().unwrap().store();
        assert_eq!(first_store.lock().await.service_count(), 1);

        // Selecting another contact replaces the scope wholesale.
        session.select_contact(ContactId("c2".into())).await.unwrap();
        let second = session.chat().unwrap();
        assert_eq!(second.contact_id(), &ContactId("c2".into()));
        let second_store = second.store();
        assert!(!Arc::ptr_eq(&first_store, &second_store));
        assert_eq!(second_store.lock().await.service_count(), 0);
        // The old store froze at its last state.
        assert_eq!(first_store.lock().await.service_count(), 1);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let server = MockServer::start().await;
        let ws = spawn_ws_server(vec![]).await;
        let mut session =
            Session::start(&test_config(&server.uri(), ws), Arc::new(StaticProvider)).unwrap();

        session.close();
        session.close();
        assert!(session.chat().is_none());
        let mut status = session.global_socket.watch_status();
        tokio::time::timeout(
            Duration::from_secs(2),
            status.wait_for(|s| *s == ConnectionStatus::Closed),
        )
        .await
        .unwrap()
        .unwrap();
    }
}
