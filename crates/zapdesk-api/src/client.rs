// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The HTTP client and its auth-refresh behavior.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use zapdesk_core::error::ZapdeskError;
use zapdesk_core::types::{Contact, Page, Service, ServiceStatus};

/// Supplies a fresh bearer token when the current one is rejected.
///
/// Implementations typically re-run the login exchange; the client never
/// caches beyond the single token it holds.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn refresh_token(&self) -> Result<String, ZapdeskError>;
}

/// Query parameters for the paginated `/service` endpoint.
#[derive(Debug, Clone, Default)]
pub struct ServiceQuery {
    /// Restrict to one contact's services.
    pub chat_id: Option<String>,
    /// Restrict to these statuses (serialized comma-joined as `status__in`).
    pub status_in: Vec<ServiceStatus>,
    /// Free-text search over contact name and phone number.
    pub search: Option<String>,
    pub page: u32,
    pub page_size: u32,
}

impl ServiceQuery {
    fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", self.page.to_string()),
            ("page_size", self.page_size.to_string()),
        ];
        if let Some(chat_id) = &self.chat_id {
            params.push(("chat_id", chat_id.clone()));
        }
        if !self.status_in.is_empty() {
            let joined = self
                .status_in
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            params.push(("status__in", joined));
        }
        if let Some(search) = &self.search {
            params.push(("search", search.clone()));
        }
        params
    }
}

/// Authenticated client for the backend's REST surface.
///
/// The bearer token lives in an [`ArcSwap`] so a refresh triggered by one
/// in-flight request is immediately visible to all others.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: ArcSwap<String>,
    token_provider: Arc<dyn TokenProvider>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        initial_token: impl Into<String>,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Result<Self, ZapdeskError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ZapdeskError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: ArcSwap::from_pointee(initial_token.into()),
            token_provider,
        })
    }

    /// Current bearer token, exposed so socket URLs can carry it too.
    pub fn current_token(&self) -> Arc<String> {
        self.token.load_full()
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_owned();
        self
    }

    /// One page of services matching `query`.
    pub async fn fetch_services(&self, query: &ServiceQuery) -> Result<Page<Service>, ZapdeskError> {
        self.get_page("/service", &query.to_params()).await
    }

    /// One page of the contact directory.
    pub async fn fetch_contacts(&self, page: u32, page_size: u32) -> Result<Page<Contact>, ZapdeskError> {
        let params = [("page", page.to_string()), ("page_size", page_size.to_string())];
        self.get_page("/contact", &params).await
    }

    /// Issues an authenticated GET, refreshing the token and retrying once
    /// on 401/403. All other non-success statuses map to [`ZapdeskError::Api`].
    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<Page<T>, ZapdeskError> {
        let url = format!("{}{path}", self.base_url);

        for attempt in 0..=1u32 {
            let response = self
                .http
                .get(&url)
                .query(params)
                .bearer_auth(self.token.load_full())
                .send()
                .await
                .map_err(|e| ZapdeskError::transport(format!("GET {path} failed"), e))?;

            let status = response.status();
            debug!(%path, status = %status, attempt, "page response received");

            if status.is_success() {
                return response
                    .json::<Page<T>>()
                    .await
                    .map_err(|e| ZapdeskError::transport(format!("invalid page body from {path}"), e));
            }

            if matches!(status.as_u16(), 401 | 403) {
                if attempt == 0 {
                    warn!(%path, status = %status, "token rejected, refreshing once");
                    let fresh = self.token_provider.refresh_token().await?;
                    self.token.store(Arc::new(fresh));
                    continue;
                }
                return Err(ZapdeskError::Auth(format!(
                    "token rejected twice on GET {path}"
                )));
            }

            let body = response.text().await.unwrap_or_default();
            return Err(ZapdeskError::Api {
                status: status.as_u16(),
                message: format!("GET {path}: {body}"),
            });
        }

        unreachable!("auth retry loop returns on every branch")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use wiremock::matchers::{bearer_token, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    struct StaticProvider(&'static str);

    #[async_trait]
    impl TokenProvider for StaticProvider {
        async fn refresh_token(&self) -> Result<String, ZapdeskError> {
            Ok(self.0.to_owned())
        }
    }

    struct CountingProvider(AtomicU32);

    #[async_trait]
    impl TokenProvider for CountingProvider {
        async fn refresh_token(&self) -> Result<String, ZapdeskError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("fresh".to_owned())
        }
    }

    fn client(server: &MockServer, token: &str) -> ApiClient {
        ApiClient::new("http://unused", token, Arc::new(StaticProvider("fresh")))
            .unwrap()
            .with_base_url(server.uri())
    }

    fn service_page_body() -> serde_json::Value {
        serde_json::json!({
            "count": 1,
            "next": null,
            "previous": null,
            "results": [{
                "uuid": "s1",
                "status": "pending",
                "chat_id": "c1"
            }]
        })
    }

    #[tokio::test]
    async fn fetches_a_service_page_with_query_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/service"))
            .and(bearer_token("tok"))
            .and(query_param("page", "2"))
            .and(query_param("page_size", "20"))
            .and(query_param("status__in", "pending,in_progress"))
            .respond_with(ResponseTemplate::new(200).set_body_json(service_page_body()))
            .expect(1)
            .mount(&server)
            .await;

        let query = ServiceQuery {
            status_in: vec![ServiceStatus::Pending, ServiceStatus::InProgress],
            page: 2,
            page_size: 20,
            ..Default::default()
        };
        let page = client(&server, "tok").fetch_services(&query).await.unwrap();
        assert_eq!(page.count, 1);
        assert!(!page.has_next());
        assert_eq!(page.results[0].id.0, "s1");
    }

    #[tokio::test]
    async fn refreshes_token_once_on_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contact"))
            .and(bearer_token("stale"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contact"))
            .and(bearer_token("fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "count": 0, "next": null, "previous": null, "results": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = Arc::new(CountingProvider(AtomicU32::new(0)));
        let client = ApiClient::new("http://unused", "stale", provider.clone())
            .unwrap()
            .with_base_url(server.uri());

        let page = client.fetch_contacts(1, 20).await.unwrap();
        assert_eq!(page.count, 0);
        assert_eq!(provider.0.load(Ordering::SeqCst), 1);
        // The refreshed token sticks for subsequent calls.
        assert_eq!(client.current_token().as_str(), "fresh");
    }

    #[tokio::test]
    async fn persistent_unauthorized_becomes_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/service"))
            .respond_with(ResponseTemplate::new(403))
            .expect(2)
            .mount(&server)
            .await;

        let err = client(&server, "tok")
            .fetch_services(&ServiceQuery { page: 1, page_size: 20, ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, ZapdeskError::Auth(_)), "{err}");
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn server_errors_surface_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/service"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client(&server, "tok")
            .fetch_services(&ServiceQuery { page: 1, page_size: 20, ..Default::default() })
            .await
            .unwrap_err();
        let ZapdeskError::Api { status, message } = err else {
            panic!("expected Api error, got {err}");
        };
        assert_eq!(status, 502);
        assert!(message.contains("bad gateway"));
    }
}
