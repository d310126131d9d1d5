//! Requests, responses, and the caller-side handle of a queued request

use chat_common::{RestError, RestResult};
use chat_core::CompiledRoute;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Header carrying the audit-log reason for moderation actions
pub const AUDIT_LOG_REASON: &str = "X-Audit-Log-Reason";

/// A logical API call: compiled route plus optional JSON body
#[derive(Debug, Clone)]
pub struct RestRequest {
    route: CompiledRoute,
    body: Option<serde_json::Value>,
    headers: Vec<(&'static str, String)>,
}

impl RestRequest {
    #[must_use]
    pub fn new(route: CompiledRoute) -> Self {
        Self {
            route,
            body: None,
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach an audit-log reason
    #[must_use]
    pub fn with_reason(self, reason: impl Into<String>) -> Self {
        self.with_header(AUDIT_LOG_REASON, reason)
    }

    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn route(&self) -> &CompiledRoute {
        &self.route
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &[(&'static str, String)] {
        &self.headers
    }
}

/// A raw HTTP response
#[derive(Debug, Clone)]
pub struct RestResponse {
    status: u16,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl RestResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// Body as text, replacing invalid UTF-8
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Deserialize the JSON body
    pub fn json<T: DeserializeOwned>(&self) -> RestResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| RestError::Decode(e.to_string()))
    }

    /// Turn a non-2xx response into `RestError::Http`
    pub fn error_for_status(self) -> RestResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(RestError::Http {
                status: self.status,
                body: self.text().into_owned(),
            })
        }
    }
}

/// Cloneable cancellation switch for a queued request
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Skip the request if it has not been sent yet
    ///
    /// A request already in flight runs to completion.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Caller side of a queued request; resolves to the response
#[derive(Debug)]
pub struct RequestHandle {
    receiver: oneshot::Receiver<RestResult<RestResponse>>,
    cancel: CancelHandle,
}

impl RequestHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A switch that can cancel the request after the handle has been moved
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

impl Future for RequestHandle {
    type Output = RestResult<RestResponse>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(RestError::Dropped)))
    }
}

/// Limiter side of a queued request
pub(crate) struct QueuedRequest {
    pub(crate) request: RestRequest,
    responder: oneshot::Sender<RestResult<RestResponse>>,
    cancel: CancelHandle,
    pub(crate) attempts: u32,
}

impl QueuedRequest {
    pub(crate) fn new(request: RestRequest) -> (Self, RequestHandle) {
        let (responder, receiver) = oneshot::channel();
        let cancel = CancelHandle::default();
        let queued = Self {
            request,
            responder,
            cancel: cancel.clone(),
            attempts: 0,
        };
        (queued, RequestHandle { receiver, cancel })
    }

    /// Cancelled explicitly, or nobody is waiting for the answer anymore
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.responder.is_closed()
    }

    pub(crate) fn complete(self, result: RestResult<RestResponse>) {
        // The caller may have dropped its handle; nothing to report then.
        let _ = self.responder.send(result);
    }
}
