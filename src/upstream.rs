use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    response::Response,
};
use http::header::HeaderName;

use crate::{
    error::{GatewayError, GatewayResult},
    exchange::Exchange,
    route::Upstream,
};

#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(
        &self,
        exchange: &mut Exchange,
        upstream: &Upstream,
    ) -> GatewayResult<Response<Body>>;
}

pub struct HttpForwarder {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpForwarder {
    pub fn new(upstream_timeout_ms: u64) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            timeout: Duration::from_millis(upstream_timeout_ms),
        })
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(
        &self,
        exchange: &mut Exchange,
        upstream: &Upstream,
    ) -> GatewayResult<Response<Body>> {
        let path_and_query = exchange
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| exchange.uri.path());
        let target_url = format!("{}{}", upstream.uri.trim_end_matches('/'), path_and_query);

        // Bodies stream through in both directions; nothing is buffered.
        let body = reqwest::Body::wrap_stream(exchange.take_body().into_data_stream());
        let mut request = self
            .client
            .request(exchange.method.clone(), &target_url)
            .body(body);

        for (name, value) in &exchange.headers {
            if should_forward_header(name) {
                request = request.header(name, value);
            }
        }
        request = request.header("x-request-id", exchange.request_id.clone());
        if let Some(client_ip) = exchange.client_ip {
            request = request.header("x-forwarded-for", client_ip.to_string());
        }

        let upstream_response = request.timeout(self.timeout).send().await?;

        let status = upstream_response.status();
        if status.is_server_error() {
            return Err(GatewayError::Upstream(format!(
                "upstream answered {status}"
            )));
        }

        let headers = upstream_response.headers().clone();
        let mut response = Response::new(Body::from_stream(upstream_response.bytes_stream()));
        *response.status_mut() = status;
        for (name, value) in &headers {
            if should_forward_header(name) {
                response.headers_mut().append(name.clone(), value.clone());
            }
        }

        Ok(response)
    }
}

fn should_forward_header(name: &HeaderName) -> bool {
    let lowercase = name.as_str().to_ascii_lowercase();
    !matches!(
        lowercase.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
            | "host"
            | "content-length"
    )
}
