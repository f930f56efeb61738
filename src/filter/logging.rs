use async_trait::async_trait;
use axum::{
    body::Body,
    response::Response,
};

use crate::{
    error::GatewayResult,
    exchange::Exchange,
    filter::{ControlFlow, GatewayFilter},
};

pub struct AccessLogFilter;

#[async_trait]
impl GatewayFilter for AccessLogFilter {
    fn name(&self) -> &'static str {
        "access-log"
    }

    fn order(&self) -> i32 {
        -200
    }

    async fn on_request(&self, exchange: &mut Exchange) -> GatewayResult<ControlFlow> {
        tracing::info!(
            request_id = %exchange.request_id,
            method = %exchange.method,
            path = %exchange.path(),
            client_ip = ?exchange.client_ip,
            "incoming request"
        );
        Ok(ControlFlow::Continue)
    }

    async fn on_response(
        &self,
        exchange: &Exchange,
        response: &mut Response<Body>,
    ) -> GatewayResult<()> {
        let latency_ms = exchange.started_at.elapsed().as_millis();
        tracing::info!(
            request_id = %exchange.request_id,
            method = %exchange.method,
            path = %exchange.path(),
            status = %response.status(),
            route = ?exchange.matched_route,
            upstream = ?exchange.chosen_upstream,
            latency_ms = latency_ms,
            "request completed"
        );
        Ok(())
    }
}
