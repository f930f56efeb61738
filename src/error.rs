use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

pub mod code {
    pub const AUTH_FAILURE: i64 = 28004;
    pub const GATEWAY_ERROR: i64 = 28005;
    pub const ROUTE_NOT_FOUND: i64 = 28006;
}

/// Uniform result shape every client of the platform parses. The HTTP
/// status line is 200 even for logical failures; `code` carries the real
/// outcome.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub success: bool,
    pub code: i64,
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    pub fn auth_failure() -> Self {
        Self {
            success: false,
            code: code::AUTH_FAILURE,
            data: Some("认证失败".to_string()),
            message: None,
        }
    }

    pub fn gateway_failure() -> Self {
        Self {
            success: false,
            code: code::GATEWAY_ERROR,
            data: None,
            message: Some("网关失败".to_string()),
        }
    }

    pub fn route_not_found() -> Self {
        Self {
            success: false,
            code: code::ROUTE_NOT_FOUND,
            data: None,
            message: None,
        }
    }

    pub fn cors_rejected() -> Self {
        Self {
            success: false,
            code: code::GATEWAY_ERROR,
            data: Some("Invalid CORS request".to_string()),
            message: None,
        }
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        let body = serde_json::to_vec(&self).unwrap_or_default();
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = StatusCode::OK;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json;charset=UTF-8"),
        );
        response
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("authentication rejected")]
    AuthRejected,
    #[error("cross-origin request rejected")]
    CorsRejected,
    #[error("no route matched {0}")]
    RouteNotFound(String),
    #[error("upstream timed out")]
    UpstreamTimeout,
    #[error("upstream request failed: {0}")]
    Upstream(String),
    #[error("internal gateway fault: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn envelope(&self) -> Envelope {
        match self {
            Self::AuthRejected => Envelope::auth_failure(),
            Self::CorsRejected => Envelope::cors_rejected(),
            Self::RouteNotFound(_) => Envelope::route_not_found(),
            Self::UpstreamTimeout | Self::Upstream(_) | Self::Internal(_) => {
                Envelope::gateway_failure()
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.envelope().into_response()
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::UpstreamTimeout
        } else {
            Self::Upstream(err.to_string())
        }
    }
}
