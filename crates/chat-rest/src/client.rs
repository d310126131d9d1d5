//! REST client facade
//!
//! Ties the [`Requester`] to a [`RateLimiter`] and exposes route-level calls.

use crate::ratelimit::RateLimiter;
use crate::request::{RequestHandle, RestRequest, RestResponse};
use crate::requester::Requester;
use chat_common::{ClientConfig, RestResult};
use chat_core::Route;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::info;

/// Rate-limited REST client
///
/// Clones share the same limiter and connection pool.
#[derive(Debug, Clone)]
pub struct RestClient {
    limiter: RateLimiter,
}

impl RestClient {
    /// Build a client from configuration
    ///
    /// Must be called inside a tokio runtime; bucket processing is spawned on it.
    pub fn new(config: &ClientConfig) -> RestResult<Self> {
        let route_limits = config.rate_limit.route_limits()?;
        let requester = Requester::new(config)?;

        info!(
            app = %config.app.name,
            env = ?config.app.env,
            base_url = requester.base_url(),
            account_type = ?config.account_type,
            route_overrides = route_limits.len(),
            "REST client ready"
        );

        let limiter = RateLimiter::builder(Arc::new(requester))
            .account_type(config.account_type)
            .route_limits(route_limits)
            .default_retry_after(config.rate_limit.default_retry_after())
            .build();

        Ok(Self { limiter })
    }

    /// Wrap an existing limiter (custom executor, scheduler, or clock)
    pub fn from_limiter(limiter: RateLimiter) -> Self {
        Self { limiter }
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Compile `route` with `params` and queue it
    pub fn queue(
        &self,
        route: &Route,
        params: &[&str],
        body: Option<serde_json::Value>,
    ) -> RestResult<RequestHandle> {
        let mut request = RestRequest::new(route.compile(params)?);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        Ok(self.submit(request))
    }

    /// Queue a prepared request
    pub fn submit(&self, request: RestRequest) -> RequestHandle {
        self.limiter.queue(request)
    }

    /// Queue a request and wait for a successful response
    ///
    /// Non-2xx statuses are returned as [`chat_common::RestError::Http`].
    pub async fn execute(&self, request: RestRequest) -> RestResult<RestResponse> {
        self.submit(request).await?.error_for_status()
    }

    /// Like [`Self::execute`], decoding the JSON body
    pub async fn execute_json<T: DeserializeOwned>(&self, request: RestRequest) -> RestResult<T> {
        self.execute(request).await?.json()
    }
}
