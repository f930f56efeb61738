use std::{
    net::IpAddr,
    sync::Arc,
};

use anyhow::Result;
use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::{
    config::GatewayConfig,
    error::{GatewayError, GatewayResult},
    exchange::Exchange,
    filter::{
        ControlFlow,
        GatewayFilter,
        auth::{AuthFilter, RefuseAllTokens},
        cors::CorsFilter,
        logging::AccessLogFilter,
    },
    route::RouteTable,
    upstream::{Forwarder, HttpForwarder},
};

pub struct Gateway {
    filters: Vec<Arc<dyn GatewayFilter>>,
    routes: RouteTable,
    forwarder: Arc<dyn Forwarder>,
}

impl Gateway {
    pub fn from_config(config: GatewayConfig) -> Result<Self> {
        let filters: Vec<Arc<dyn GatewayFilter>> = vec![
            Arc::new(AccessLogFilter),
            Arc::new(CorsFilter::new(config.cors.clone())),
            Arc::new(AuthFilter::new(&config.auth, Arc::new(RefuseAllTokens))?),
        ];
        let routes = RouteTable::from_entries(&config.routes)?;
        let forwarder = Arc::new(HttpForwarder::new(config.upstream_timeout_ms)?);
        Ok(Self::new(filters, routes, forwarder))
    }

    pub fn new(
        mut filters: Vec<Arc<dyn GatewayFilter>>,
        routes: RouteTable,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        filters.sort_by_key(|f| f.order());
        Self {
            filters,
            routes,
            forwarder,
        }
    }

    pub async fn handle(&self, request: Request<Body>, client_ip: Option<IpAddr>) -> Response {
        let (parts, body) = request.into_parts();

        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut exchange = Exchange::new(
            request_id,
            parts.method,
            parts.uri,
            parts.headers,
            body,
            client_ip,
        );

        // Ascending-order walk; each filter is entered at most once and a
        // short-circuit stops everything after it.
        let mut executed = Vec::new();
        for (idx, filter) in self.filters.iter().enumerate() {
            match filter.on_request(&mut exchange).await {
                Ok(ControlFlow::Continue) => executed.push(idx),
                Ok(ControlFlow::ShortCircuit(mut response)) => {
                    self.finish(&executed, &exchange, &mut response).await;
                    return response;
                }
                Err(err) => {
                    tracing::warn!(
                        request_id = %exchange.request_id,
                        filter = filter.name(),
                        error = %err,
                        "filter rejected request"
                    );
                    let mut response = err.into_response();
                    self.finish(&executed, &exchange, &mut response).await;
                    return response;
                }
            }
        }

        let mut response = match self.dispatch(&mut exchange).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(
                    request_id = %exchange.request_id,
                    path = %exchange.path(),
                    error = %err,
                    "request failed downstream"
                );
                err.into_response()
            }
        };
        self.finish(&executed, &exchange, &mut response).await;
        response
    }

    async fn dispatch(&self, exchange: &mut Exchange) -> GatewayResult<Response> {
        let Some(route) = self.routes.resolve(exchange.path()) else {
            return Err(GatewayError::RouteNotFound(exchange.path().to_string()));
        };

        exchange.matched_route = Some(route.pattern.source().to_string());
        exchange.chosen_upstream = Some(route.upstream.uri.clone());

        let upstream = route.upstream.clone();
        self.forwarder.forward(exchange, &upstream).await
    }

    async fn finish(&self, executed: &[usize], exchange: &Exchange, response: &mut Response) {
        for idx in executed.iter().rev() {
            let filter = &self.filters[*idx];
            if let Err(err) = filter.on_response(exchange, response).await {
                tracing::warn!(
                    request_id = %exchange.request_id,
                    filter = filter.name(),
                    error = %err,
                    "filter post-response hook failed"
                );
            }
        }
    }
}
