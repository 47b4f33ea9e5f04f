//! reqwest-backed implementation of the operation executor port.
//!
//! One attempt per call, bounded by a hard request timeout. Retry and
//! backoff belong to the queue; this layer only reports what happened
//! to a single request.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client as ReqwestClient, Method};
use tracing::debug;

use steeple_core::{ExecutionFailure, OperationExecutor};
use steeple_domain::constants::DEFAULT_REQUEST_TIMEOUT_SECS;
use steeple_domain::{HttpMethod, QueueOperation, Result, SteepleError};

/// Configuration for [`HttpExecutor`].
#[derive(Debug, Clone)]
pub struct HttpExecutorConfig {
    /// Prefix applied to relative endpoints. Absolute endpoints are
    /// sent as-is.
    pub base_url: Option<String>,
    /// Hard per-request deadline covering connect, send, and body.
    pub request_timeout: Duration,
    pub user_agent: Option<String>,
    /// Headers applied to every request, overridden per-operation.
    pub default_headers: BTreeMap<String, String>,
}

impl Default for HttpExecutorConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: None,
            default_headers: BTreeMap::new(),
        }
    }
}

/// Executes queued operations as HTTP requests.
#[derive(Clone)]
pub struct HttpExecutor {
    client: ReqwestClient,
    config: HttpExecutorConfig,
}

impl HttpExecutor {
    /// Build an executor from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `SteepleError::Network` when the underlying client
    /// cannot be constructed.
    pub fn new(config: HttpExecutorConfig) -> Result<Self> {
        let mut builder = ReqwestClient::builder().timeout(config.request_timeout).no_proxy();

        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }

        let client = builder
            .build()
            .map_err(|e| SteepleError::Network(format!("failed to build http client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Convenience constructor with default configuration.
    ///
    /// # Errors
    ///
    /// Returns `SteepleError::Network` when the underlying client
    /// cannot be constructed.
    pub fn with_defaults() -> Result<Self> {
        Self::new(HttpExecutorConfig::default())
    }

    fn resolve_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        match &self.config.base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), endpoint.trim_start_matches('/')),
            None => endpoint.to_string(),
        }
    }

    fn build_headers(
        &self,
        op_headers: &BTreeMap<String, String>,
    ) -> std::result::Result<HeaderMap, ExecutionFailure> {
        let mut headers = HeaderMap::new();
        for (name, value) in self.config.default_headers.iter().chain(op_headers.iter()) {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ExecutionFailure::Serialization(format!("header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ExecutionFailure::Serialization(format!("header value: {e}")))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

const fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

#[async_trait]
impl OperationExecutor for HttpExecutor {
    async fn execute(&self, op: &QueueOperation) -> std::result::Result<(), ExecutionFailure> {
        let url = self.resolve_url(&op.endpoint);
        let method = to_reqwest_method(op.method);
        let headers = self.build_headers(&op.headers)?;

        let mut request = self.client.request(method.clone(), &url).headers(headers);

        if let Some(payload) = &op.payload {
            let body = serde_json::to_vec(payload)
                .map_err(|e| ExecutionFailure::Serialization(format!("payload: {e}")))?;
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        debug!(op_id = %op.id, %method, %url, "executing queued operation");

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                ExecutionFailure::Timeout(self.config.request_timeout)
            } else {
                ExecutionFailure::Transport(err.to_string())
            }
        })?;

        let status = response.status();
        debug!(op_id = %op.id, %status, "operation response received");

        if status.is_success() {
            Ok(())
        } else {
            Err(ExecutionFailure::Protocol { status: status.as_u16() })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use steeple_domain::{OperationKind, Priority};

    fn operation(method: HttpMethod, endpoint: &str) -> QueueOperation {
        QueueOperation {
            id: "op-1".into(),
            kind: OperationKind::Create,
            endpoint: endpoint.into(),
            method,
            payload: None,
            headers: BTreeMap::new(),
            enqueued_at: 1_700_000_000_000,
            retry_count: 0,
            max_retries: 3,
            priority: Priority::Normal,
            metadata: None,
        }
    }

    fn executor_for(server: &MockServer) -> HttpExecutor {
        HttpExecutor::new(HttpExecutorConfig {
            base_url: Some(server.uri()),
            ..HttpExecutorConfig::default()
        })
        .expect("executor built")
    }

    #[tokio::test]
    async fn successful_post_sends_json_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/members"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({"name": "Ada"})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let mut op = operation(HttpMethod::Post, "/api/members");
        op.payload = Some(json!({"name": "Ada"}));

        executor_for(&server).execute(&op).await.expect("execution succeeds");
    }

    #[tokio::test]
    async fn get_without_payload_sends_no_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/events"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let op = operation(HttpMethod::Get, "/api/events");
        executor_for(&server).execute(&op).await.expect("execution succeeds");
    }

    #[tokio::test]
    async fn non_success_status_maps_to_protocol_failure() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let op = operation(HttpMethod::Delete, "/api/members/1");
        let err = executor_for(&server).execute(&op).await.expect_err("must fail");

        match err {
            ExecutionFailure::Protocol { status } => assert_eq!(status, 500),
            other => panic!("expected protocol failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn single_attempt_per_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let op = operation(HttpMethod::Post, "/api/donations");
        let _ = executor_for(&server).execute(&op).await;

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn connection_refused_maps_to_transport_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so the request fails with ECONNREFUSED

        let executor = HttpExecutor::new(HttpExecutorConfig {
            base_url: Some(format!("http://{addr}")),
            ..HttpExecutorConfig::default()
        })
        .expect("executor built");

        let op = operation(HttpMethod::Post, "/api/members");
        let err = executor.execute(&op).await.expect_err("must fail");

        assert!(matches!(err, ExecutionFailure::Transport(_)));
    }

    #[tokio::test]
    async fn slow_response_maps_to_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
            .mount(&server)
            .await;

        let executor = HttpExecutor::new(HttpExecutorConfig {
            base_url: Some(server.uri()),
            request_timeout: Duration::from_millis(50),
            ..HttpExecutorConfig::default()
        })
        .expect("executor built");

        let op = operation(HttpMethod::Get, "/api/events");
        let err = executor.execute(&op).await.expect_err("must fail");

        match err {
            ExecutionFailure::Timeout(limit) => assert_eq!(limit, Duration::from_millis(50)),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn operation_headers_override_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-tenant", "parish-2"))
            .and(header("x-client", "steeple"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let executor = HttpExecutor::new(HttpExecutorConfig {
            base_url: Some(server.uri()),
            default_headers: BTreeMap::from([
                ("x-tenant".to_string(), "parish-1".to_string()),
                ("x-client".to_string(), "steeple".to_string()),
            ]),
            ..HttpExecutorConfig::default()
        })
        .expect("executor built");

        let mut op = operation(HttpMethod::Post, "/api/members");
        op.headers.insert("x-tenant".into(), "parish-2".into());

        executor.execute(&op).await.expect("execution succeeds");
    }

    #[tokio::test]
    async fn absolute_endpoint_ignores_base_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let executor = HttpExecutor::new(HttpExecutorConfig {
            base_url: Some("http://unreachable.invalid".into()),
            ..HttpExecutorConfig::default()
        })
        .expect("executor built");

        let op = operation(HttpMethod::Get, &format!("{}/ping", server.uri()));
        executor.execute(&op).await.expect("execution succeeds");
    }
}
