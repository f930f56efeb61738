use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderValue, Method, StatusCode, header},
    response::Response,
};

use crate::{
    config::CorsConfig,
    error::{GatewayError, GatewayResult},
    exchange::Exchange,
    filter::{ControlFlow, GatewayFilter},
};

const ALLOW_ORIGIN_ATTR: &str = "cors.allow-origin";

pub struct CorsFilter {
    cfg: CorsConfig,
}

impl CorsFilter {
    pub fn new(cfg: CorsConfig) -> Self {
        Self { cfg }
    }

    fn allow_origin(&self, origin: &str) -> Option<String> {
        if self.cfg.allowed_origins.iter().any(|o| o == "*") {
            if self.cfg.allow_credentials {
                // `*` is forbidden on credentialed responses; echo instead.
                Some(origin.to_string())
            } else {
                Some("*".to_string())
            }
        } else if self.cfg.allowed_origins.iter().any(|o| o == origin) {
            Some(origin.to_string())
        } else {
            None
        }
    }

    fn preflight(&self, exchange: &Exchange, allow_origin: &str) -> GatewayResult<Response<Body>> {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::OK;
        let headers = response.headers_mut();

        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_str(allow_origin)
                .map_err(|e| GatewayError::Internal(e.to_string()))?,
        );

        let allow_methods = if self.cfg.allowed_methods.iter().any(|m| m == "*") {
            exchange
                .headers
                .get(header::ACCESS_CONTROL_REQUEST_METHOD)
                .cloned()
        } else {
            HeaderValue::from_str(&self.cfg.allowed_methods.join(", ")).ok()
        };
        if let Some(value) = allow_methods {
            headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, value);
        }

        let allow_headers = if self.cfg.allowed_headers.iter().any(|h| h == "*") {
            exchange
                .headers
                .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
                .cloned()
        } else {
            HeaderValue::from_str(&self.cfg.allowed_headers.join(", ")).ok()
        };
        if let Some(value) = allow_headers {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, value);
        }

        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from(self.cfg.max_age_secs),
        );

        if self.cfg.allow_credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        if allow_origin != "*" {
            headers.insert(header::VARY, HeaderValue::from_static("Origin"));
        }

        Ok(response)
    }

    fn request_origin(exchange: &Exchange) -> Option<String> {
        exchange
            .headers
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }
}

#[async_trait]
impl GatewayFilter for CorsFilter {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn order(&self) -> i32 {
        -100
    }

    async fn on_request(&self, exchange: &mut Exchange) -> GatewayResult<ControlFlow> {
        let Some(origin) = Self::request_origin(exchange) else {
            return Ok(ControlFlow::Continue);
        };

        let Some(allow_origin) = self.allow_origin(&origin) else {
            return Err(GatewayError::CorsRejected);
        };

        let is_preflight = exchange.method == Method::OPTIONS
            && exchange
                .headers
                .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);
        if is_preflight {
            return Ok(ControlFlow::ShortCircuit(
                self.preflight(exchange, &allow_origin)?,
            ));
        }

        // Negotiated once here; the response walk picks it up so every
        // downstream write inherits the same origin decision.
        exchange
            .attributes
            .insert(ALLOW_ORIGIN_ATTR.to_string(), allow_origin);

        Ok(ControlFlow::Continue)
    }

    async fn on_response(
        &self,
        exchange: &Exchange,
        response: &mut Response<Body>,
    ) -> GatewayResult<()> {
        let Some(allow_origin) = exchange.attributes.get(ALLOW_ORIGIN_ATTR) else {
            return Ok(());
        };

        if let Ok(value) = HeaderValue::from_str(allow_origin) {
            response
                .headers_mut()
                .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        if self.cfg.allow_credentials {
            response.headers_mut().insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        if allow_origin != "*" {
            response
                .headers_mut()
                .append(header::VARY, HeaderValue::from_static("Origin"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorsConfig;
    use axum::{body::to_bytes, http::HeaderMap, http::Uri};

    fn exchange(method: Method, headers: HeaderMap) -> Exchange {
        Exchange::new(
            "test".to_string(),
            method,
            Uri::from_static("/api/v1/auth/login"),
            headers,
            Body::empty(),
            None,
        )
    }

    fn preflight_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://x.example"));
        headers.insert(
            header::ACCESS_CONTROL_REQUEST_METHOD,
            HeaderValue::from_static("POST"),
        );
        headers
    }

    #[tokio::test]
    async fn preflight_short_circuits_with_negotiated_headers() {
        let filter = CorsFilter::new(CorsConfig::default());
        let mut exchange = exchange(Method::OPTIONS, preflight_headers());

        let flow = filter.on_request(&mut exchange).await.unwrap();
        let ControlFlow::ShortCircuit(response) = flow else {
            panic!("preflight must not reach the chain");
        };

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
            "POST"
        );
        assert_eq!(response.headers()[header::ACCESS_CONTROL_MAX_AGE], "1800");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn preflight_lists_configured_methods_when_not_wildcard() {
        let cfg = CorsConfig {
            allowed_methods: vec!["GET".to_string(), "POST".to_string()],
            ..CorsConfig::default()
        };
        let filter = CorsFilter::new(cfg);
        let mut exchange = exchange(Method::OPTIONS, preflight_headers());

        let ControlFlow::ShortCircuit(response) =
            filter.on_request(&mut exchange).await.unwrap()
        else {
            panic!("expected short-circuit");
        };
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST"
        );
    }

    #[tokio::test]
    async fn options_without_request_method_is_not_a_preflight() {
        let filter = CorsFilter::new(CorsConfig::default());
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://x.example"));
        let mut exchange = exchange(Method::OPTIONS, headers);

        assert!(matches!(
            filter.on_request(&mut exchange).await.unwrap(),
            ControlFlow::Continue
        ));
    }

    #[tokio::test]
    async fn actual_request_gets_allow_origin_on_the_response() {
        let filter = CorsFilter::new(CorsConfig::default());
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://x.example"));
        let mut exchange = exchange(Method::GET, headers);

        assert!(matches!(
            filter.on_request(&mut exchange).await.unwrap(),
            ControlFlow::Continue
        ));

        let mut response = Response::new(Body::empty());
        filter.on_response(&exchange, &mut response).await.unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        assert!(!response.headers().contains_key(header::VARY));
    }

    #[tokio::test]
    async fn credentialed_requests_echo_the_origin_and_vary() {
        let cfg = CorsConfig {
            allow_credentials: true,
            ..CorsConfig::default()
        };
        let filter = CorsFilter::new(cfg);
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://x.example"));
        let mut exchange = exchange(Method::GET, headers);

        assert!(matches!(
            filter.on_request(&mut exchange).await.unwrap(),
            ControlFlow::Continue
        ));

        let mut response = Response::new(Body::empty());
        filter.on_response(&exchange, &mut response).await.unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://x.example"
        );
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "true"
        );
        assert_eq!(response.headers()[header::VARY], "Origin");
    }

    #[tokio::test]
    async fn disallowed_origin_is_rejected() {
        let cfg = CorsConfig {
            allowed_origins: vec!["https://allowed.example".to_string()],
            ..CorsConfig::default()
        };
        let filter = CorsFilter::new(cfg);
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://evil.example"));
        let mut exchange = exchange(Method::GET, headers);

        assert!(matches!(
            filter.on_request(&mut exchange).await,
            Err(GatewayError::CorsRejected)
        ));
    }

    #[tokio::test]
    async fn requests_without_origin_pass_through_untouched() {
        let filter = CorsFilter::new(CorsConfig::default());
        let mut exchange = exchange(Method::GET, HeaderMap::new());

        assert!(matches!(
            filter.on_request(&mut exchange).await.unwrap(),
            ControlFlow::Continue
        ));

        let mut response = Response::new(Body::empty());
        filter.on_response(&exchange, &mut response).await.unwrap();
        assert!(
            !response
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
    }
}
