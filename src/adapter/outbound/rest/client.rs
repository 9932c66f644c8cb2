//! CRM REST client.
//!
//! Paths follow `/v1/{resource}[/{id}]`. Reads are retried on timeouts and
//! connect failures; writes go out once. A 404 becomes [`Error::NotFound`],
//! 401/403 become [`Error::Unauthenticated`], any other non-2xx status
//! becomes [`Error::Api`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use super::settings::ApiConfig;
use crate::domain::{
    Customer, CustomerFilter, CustomerId, CustomerPatch, FilterDescriptor, Lead, LeadFilter,
    LeadId, LeadPatch, LeadStatus, NewCustomer, NewLead, Page, PipelineSummary, Resource,
};
use crate::error::{ConfigError, Error, Result};
use crate::port::CrmApi;

/// HTTP client for the CRM backend.
pub struct RestClient {
    http: HttpClient,
    base_url: Url,
    token: Option<String>,
    retry_max_attempts: u32,
    retry_backoff_ms: u64,
}

impl RestClient {
    /// Client with default timeouts and a single attempt per request.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `base_url` is not an
    /// absolute http(s) URL.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(),
            base_url: parse_base_url(base_url)?,
            token,
            retry_max_attempts: 1,
            retry_backoff_ms: 0,
        })
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `api.base_url` is unusable.
    pub fn from_config(config: &ApiConfig, token: Option<String>) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Failed to build HTTP client, using defaults");
                HttpClient::new()
            });

        Ok(Self {
            http,
            base_url: parse_base_url(&config.base_url)?,
            token,
            retry_max_attempts: config.retry_max_attempts,
            retry_backoff_ms: config.retry_backoff_ms,
        })
    }

    /// `/v1/{resource}` plus `segments`, percent-encoded.
    fn endpoint(&self, resource: Resource, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| ConfigError::InvalidValue {
                field: "api.base_url",
                reason: "cannot be a base URL".into(),
            })?;
            path.pop_if_empty().push("v1");
            path.extend(resource.path().split('/'));
            path.extend(segments);
        }
        Ok(url)
    }

    fn list_url(&self, resource: Resource, filter: &FilterDescriptor) -> Result<Url> {
        let mut url = self.endpoint(resource, &[])?;
        if filter.pairs().next().is_some() {
            url.query_pairs_mut().extend_pairs(filter.pairs());
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_with_retry<T>(&self, url: Url, resource: Resource, id: Option<&str>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let mut attempt = 0;
        let max_attempts = self.retry_max_attempts.max(1);

        loop {
            attempt += 1;
            let response = self.authorize(self.http.get(url.clone())).send().await;
            let response = match response {
                Ok(response) => response,
                Err(err) => {
                    if attempt >= max_attempts || !Self::should_retry(&err) {
                        return Err(err.into());
                    }
                    self.backoff(attempt, max_attempts, &err).await;
                    continue;
                }
            };

            let response = check_status(response, resource, id).await?;

            match response.json::<T>().await {
                Ok(parsed) => return Ok(parsed),
                Err(err) => {
                    if attempt >= max_attempts || !Self::should_retry(&err) {
                        return Err(err.into());
                    }
                    self.backoff(attempt, max_attempts, &err).await;
                }
            }
        }
    }

    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        resource: Resource,
        id: Option<&str>,
    ) -> Result<Response> {
        debug!(method = %method, url = %url, "Sending request");
        let mut request = self.authorize(self.http.request(method, url));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        check_status(response, resource, id).await
    }

    async fn send_json<T, B>(
        &self,
        method: Method,
        url: Url,
        body: &B,
        resource: Resource,
        id: Option<&str>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let response = self.send(method, url, Some(body), resource, id).await?;
        Ok(response.json::<T>().await?)
    }

    fn should_retry(err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect()
    }

    async fn backoff(&self, attempt: u32, max_attempts: u32, err: &reqwest::Error) {
        warn!(
            attempt,
            max_attempts,
            error = %err,
            "HTTP request failed, retrying"
        );
        if self.retry_backoff_ms > 0 {
            sleep(Duration::from_millis(self.retry_backoff_ms)).await;
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        field: "api.base_url",
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ConfigError::InvalidValue {
            field: "api.base_url",
            reason: format!("expected an http(s) URL, got '{raw}'"),
        }
        .into());
    }
    Ok(url)
}

async fn check_status(response: Response, resource: Resource, id: Option<&str>) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body, resource, id))
}

/// Map a non-2xx response to the error taxonomy.
fn status_error(status: StatusCode, body: &str, resource: Resource, id: Option<&str>) -> Error {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    match status {
        StatusCode::NOT_FOUND => Error::NotFound {
            resource: resource.to_string(),
            id: id.unwrap_or_default().to_string(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Unauthenticated(message),
        _ => Error::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl CrmApi for RestClient {
    async fn list_leads(&self, filter: &LeadFilter) -> Result<Page<Lead>> {
        let url = self.list_url(Resource::Leads, &filter.to_descriptor())?;
        info!(url = %url, "Fetching leads");
        let page: Page<Lead> = self.get_with_retry(url, Resource::Leads, None).await?;
        debug!(count = page.data.len(), "Fetched leads");
        Ok(page)
    }

    async fn get_lead(&self, id: &LeadId) -> Result<Lead> {
        let url = self.endpoint(Resource::Leads, &[id.as_str()])?;
        self.get_with_retry(url, Resource::Leads, Some(id.as_str()))
            .await
    }

    async fn create_lead(&self, draft: &NewLead) -> Result<Lead> {
        let url = self.endpoint(Resource::Leads, &[])?;
        self.send_json(Method::POST, url, draft, Resource::Leads, None)
            .await
    }

    async fn update_lead(&self, id: &LeadId, patch: &LeadPatch) -> Result<Lead> {
        let url = self.endpoint(Resource::Leads, &[id.as_str()])?;
        self.send_json(Method::PATCH, url, patch, Resource::Leads, Some(id.as_str()))
            .await
    }

    async fn update_lead_status(&self, id: &LeadId, status: LeadStatus) -> Result<Lead> {
        let url = self.endpoint(Resource::Leads, &[id.as_str()])?;
        let body = serde_json::json!({ "status": status });
        self.send_json(Method::PATCH, url, &body, Resource::Leads, Some(id.as_str()))
            .await
    }

    async fn delete_lead(&self, id: &LeadId) -> Result<()> {
        let url = self.endpoint(Resource::Leads, &[id.as_str()])?;
        self.send::<()>(Method::DELETE, url, None, Resource::Leads, Some(id.as_str()))
            .await?;
        Ok(())
    }

    async fn pipeline_summary(&self) -> Result<PipelineSummary> {
        let url = self.endpoint(Resource::PipelineSummary, &[])?;
        self.get_with_retry(url, Resource::PipelineSummary, None)
            .await
    }

    async fn list_customers(&self, filter: &CustomerFilter) -> Result<Page<Customer>> {
        let url = self.list_url(Resource::Customers, &filter.to_descriptor())?;
        info!(url = %url, "Fetching customers");
        self.get_with_retry(url, Resource::Customers, None).await
    }

    async fn get_customer(&self, id: &CustomerId) -> Result<Customer> {
        let url = self.endpoint(Resource::Customers, &[id.as_str()])?;
        self.get_with_retry(url, Resource::Customers, Some(id.as_str()))
            .await
    }

    async fn create_customer(&self, draft: &NewCustomer) -> Result<Customer> {
        let url = self.endpoint(Resource::Customers, &[])?;
        self.send_json(Method::POST, url, draft, Resource::Customers, None)
            .await
    }

    async fn update_customer(&self, id: &CustomerId, patch: &CustomerPatch) -> Result<Customer> {
        let url = self.endpoint(Resource::Customers, &[id.as_str()])?;
        self.send_json(
            Method::PATCH,
            url,
            patch,
            Resource::Customers,
            Some(id.as_str()),
        )
        .await
    }

    async fn delete_customer(&self, id: &CustomerId) -> Result<()> {
        let url = self.endpoint(Resource::Customers, &[id.as_str()])?;
        self.send::<()>(
            Method::DELETE,
            url,
            None,
            Resource::Customers,
            Some(id.as_str()),
        )
        .await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "rest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client() -> RestClient {
        RestClient::new("https://api.example.com/", Some("t0ken".into())).unwrap()
    }

    /// Answer one HTTP request with `status` and `body`, returning the base
    /// URL and the raw request text.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut request = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request_complete(&request) {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let Some(head_end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let head = String::from_utf8_lossy(&raw[..head_end]).to_ascii_lowercase();
        let body_len = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() >= head_end + 4 + body_len
    }

    #[test]
    fn test_builds_resource_paths() {
        let client = client();
        assert_eq!(
            client.endpoint(Resource::Leads, &["42"]).unwrap().as_str(),
            "https://api.example.com/v1/leads/42"
        );
        assert_eq!(
            client
                .endpoint(Resource::PipelineSummary, &[])
                .unwrap()
                .as_str(),
            "https://api.example.com/v1/leads/pipeline-summary"
        );
        assert_eq!(
            client
                .endpoint(Resource::Customers, &["a/b"])
                .unwrap()
                .as_str(),
            "https://api.example.com/v1/customers/a%2Fb"
        );
    }

    #[test]
    fn test_list_url_carries_filters() {
        let url = client()
            .list_url(
                Resource::Leads,
                &LeadFilter::status(LeadStatus::Pending).to_descriptor(),
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/v1/leads?page=1&perPage=20&status=PENDING"
        );
    }

    #[test]
    fn test_rejects_unusable_base_urls() {
        assert!(matches!(
            RestClient::new("not a url", None),
            Err(Error::Config(ConfigError::InvalidValue { .. }))
        ));
        assert!(matches!(
            RestClient::new("mailto:crm@example.com", None),
            Err(Error::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_maps_statuses() {
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "", Resource::Leads, Some("42")),
            Error::NotFound { ref resource, ref id } if resource == "leads" && id == "42"
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "", Resource::Leads, None),
            Error::Unauthenticated(_)
        ));
        assert!(matches!(
            status_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"message":"database down"}"#,
                Resource::Leads,
                None
            ),
            Error::Api { status: 500, ref message } if message == "database down"
        ));
    }

    #[tokio::test]
    async fn test_get_lead_sends_bearer_token_and_maps_404() {
        let (base, request) = serve_once("404 Not Found", r#"{"message":"no such lead"}"#).await;
        let client = RestClient::new(&base, Some("t0ken".into())).unwrap();

        let result = client.get_lead(&LeadId::new("42")).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));

        let request = request.await.unwrap();
        assert!(request.starts_with("GET /v1/leads/42 HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer t0ken"));
    }

    #[tokio::test]
    async fn test_status_change_is_a_patch_with_status_only() {
        let lead = r#"{"id":"42","customerName":"Anna","source":"MANUAL","status":"IN_PROGRESS","requiresVerification":false,"estimatedValue":"0","createdAt":"2026-03-01T10:00:00Z","updatedAt":"2026-03-01T11:00:00Z"}"#;
        let (base, request) = serve_once("200 OK", lead).await;
        let client = RestClient::new(&base, None).unwrap();

        let updated = client
            .update_lead_status(&LeadId::new("42"), LeadStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(updated.status, LeadStatus::InProgress);

        let request = request.await.unwrap();
        assert!(request.starts_with("PATCH /v1/leads/42 HTTP/1.1"));
    }
}
