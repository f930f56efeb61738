pub mod auth;
pub mod cors;
pub mod logging;

use async_trait::async_trait;
use axum::{
    body::Body,
    response::Response,
};

use crate::{
    error::GatewayResult,
    exchange::Exchange,
};

pub enum ControlFlow {
    Continue,
    ShortCircuit(Response<Body>),
}

#[async_trait]
pub trait GatewayFilter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower orders run earlier on the request walk and later on the
    /// response walk.
    fn order(&self) -> i32;

    async fn on_request(&self, exchange: &mut Exchange) -> GatewayResult<ControlFlow>;

    async fn on_response(
        &self,
        _exchange: &Exchange,
        _response: &mut Response<Body>,
    ) -> GatewayResult<()> {
        Ok(())
    }
}
