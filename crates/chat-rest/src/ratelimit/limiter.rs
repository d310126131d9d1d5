//! Rate limit coordinator
//!
//! Owns the bucket registry, the global cooldown, and the scheduling loop.
//!
//! ```text
//!   queue(request)
//!       │
//!       ▼
//!   Bucket queue ──► submitted? ──no──► schedule(process, delay)
//!                        │yes
//!                        ▼
//!                  (already running)
//!
//!   process(bucket), one task per bucket at a time:
//!     loop {
//!       queue empty       -> leave `submitted`, stop
//!       global cooldown   -> reschedule after it, stop
//!       bucket cooldown   -> reschedule after it, stop
//!       send head request -> 429: back to the head
//!                            else: complete the caller
//!     }
//! ```
//!
//! Lock order is `submitted` before a bucket lock. No lock is held across an
//! `.await`.

use super::bucket::Bucket;
use super::global::GlobalCooldown;
use super::headers::{RouteHeaders, TooManyRequests, EXPECTED_ROUTE_HEADERS};
use crate::clock::{Clock, ServerClock, SystemClock};
use crate::executor::{HttpExecutor, TransportError};
use crate::request::{QueuedRequest, RequestHandle, RestRequest, RestResponse};
use crate::scheduler::{TaskScheduler, TokioScheduler};
use chat_common::{AccountType, RestError, RouteLimitTable};
use chat_core::CompiledRoute;
use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Default cooldown for a 429 that carries no retry-after information
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Per-route rate-limit coordinator
///
/// Cheap to clone; clones share buckets and cooldowns. Separate limiters
/// (e.g. one per client session) share nothing.
#[derive(Clone)]
pub struct RateLimiter {
    shared: Arc<Shared>,
}

struct Shared {
    /// Route key -> bucket. Entries are never removed.
    buckets: DashMap<String, Arc<Bucket>>,
    /// Keys of buckets that have a processing task scheduled or running
    submitted: Mutex<HashSet<String>>,
    global: GlobalCooldown,
    clock: ServerClock,
    executor: Arc<dyn HttpExecutor>,
    scheduler: Arc<dyn TaskScheduler>,
    account_type: AccountType,
    route_limits: RouteLimitTable,
    default_retry_after: Duration,
}

/// Builder for [`RateLimiter`]
pub struct RateLimiterBuilder {
    executor: Arc<dyn HttpExecutor>,
    scheduler: Option<Arc<dyn TaskScheduler>>,
    clock: Option<Arc<dyn Clock>>,
    account_type: AccountType,
    route_limits: RouteLimitTable,
    default_retry_after: Duration,
}

impl RateLimiterBuilder {
    fn new(executor: Arc<dyn HttpExecutor>) -> Self {
        Self {
            executor,
            scheduler: None,
            clock: None,
            account_type: AccountType::default(),
            route_limits: RouteLimitTable::builtin(),
            default_retry_after: DEFAULT_RETRY_AFTER,
        }
    }

    /// Task pool used to run bucket processing (default: tokio)
    pub fn scheduler(mut self, scheduler: Arc<dyn TaskScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Local wall clock (default: system clock)
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn account_type(mut self, account_type: AccountType) -> Self {
        self.account_type = account_type;
        self
    }

    /// Per-route overrides (default: [`RouteLimitTable::builtin`])
    pub fn route_limits(mut self, route_limits: RouteLimitTable) -> Self {
        self.route_limits = route_limits;
        self
    }

    pub fn default_retry_after(mut self, retry_after: Duration) -> Self {
        self.default_retry_after = retry_after;
        self
    }

    pub fn build(self) -> RateLimiter {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(TokioScheduler::new()));

        RateLimiter {
            shared: Arc::new(Shared {
                buckets: DashMap::new(),
                submitted: Mutex::new(HashSet::new()),
                global: GlobalCooldown::new(),
                clock: ServerClock::new(clock),
                executor: self.executor,
                scheduler,
                account_type: self.account_type,
                route_limits: self.route_limits,
                default_retry_after: self.default_retry_after,
            }),
        }
    }
}

impl RateLimiter {
    pub fn builder(executor: Arc<dyn HttpExecutor>) -> RateLimiterBuilder {
        RateLimiterBuilder::new(executor)
    }

    /// Limiter with default scheduler, clock, and overrides
    pub fn new(executor: Arc<dyn HttpExecutor>) -> Self {
        Self::builder(executor).build()
    }

    /// Queue a request on its route's bucket
    ///
    /// Requests on the same bucket are sent one at a time in submission order.
    /// The returned handle resolves once the request completes; rate limits
    /// only delay it.
    pub fn queue(&self, request: RestRequest) -> RequestHandle {
        let bucket = self.get_or_create_bucket(request.route());
        let (queued, handle) = QueuedRequest::new(request);
        self.shared.enqueue(&bucket, queued);
        handle
    }

    /// The bucket for a route, created on first use
    pub fn get_or_create_bucket(&self, route: &CompiledRoute) -> Arc<Bucket> {
        self.shared.get_or_create_bucket(route)
    }

    pub fn bucket(&self, key: &str) -> Option<Arc<Bucket>> {
        self.shared.buckets.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn bucket_count(&self) -> usize {
        self.shared.buckets.len()
    }

    /// Whether a processing task is scheduled or running for `key`
    pub fn is_scheduled(&self, key: &str) -> bool {
        self.shared.submitted.lock().contains(key)
    }

    /// Remaining global cooldown, if any
    pub fn global_delay(&self) -> Option<Duration> {
        self.shared.global.current_delay(self.shared.clock.now())
    }

    /// End of the global cooldown in server epoch milliseconds
    pub fn global_cooldown_until(&self) -> Option<i64> {
        self.shared.global.until()
    }

    /// Delay before `bucket` may send, counting the global cooldown
    pub fn current_rate_limit_delay(&self, bucket: &Bucket) -> Option<Duration> {
        self.shared.current_rate_limit_delay(bucket)
    }

    /// Measured `server - local` clock offset in milliseconds
    pub fn clock_offset(&self) -> Option<i64> {
        self.shared.clock.offset()
    }

    /// Current time on the server's clock, in epoch milliseconds
    pub fn now(&self) -> i64 {
        self.shared.clock.now()
    }

    pub fn account_type(&self) -> AccountType {
        self.shared.account_type
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("buckets", &self.shared.buckets.len())
            .field("submitted", &self.shared.submitted.lock().len())
            .field("global_until", &self.shared.global.until())
            .field("clock", &self.shared.clock)
            .field("account_type", &self.shared.account_type)
            .finish()
    }
}

impl Shared {
    fn get_or_create_bucket(&self, route: &CompiledRoute) -> Arc<Bucket> {
        let key = route.rate_limit_key();
        if let Some(bucket) = self.buckets.get(key) {
            return Arc::clone(bucket.value());
        }

        let entry = self.buckets.entry(key.to_string()).or_insert_with(|| {
            debug!(route = %key, template = route.template(), "Creating rate-limit bucket");
            Arc::new(Bucket::new(key, self.route_limits.get(route.template())))
        });
        Arc::clone(entry.value())
    }

    fn enqueue(self: &Arc<Self>, bucket: &Arc<Bucket>, request: QueuedRequest) {
        let delay = {
            let mut submitted = self.submitted.lock();
            bucket.lock().queue.push_back(request);
            if !submitted.insert(bucket.key().to_string()) {
                return;
            }
            self.current_rate_limit_delay(bucket)
        };

        trace!(
            route = %bucket.key(),
            delay_ms = delay.map_or(0, |d| d.as_millis() as u64),
            "Scheduling bucket"
        );
        self.schedule(Arc::clone(bucket), delay.unwrap_or(Duration::ZERO));
    }

    fn schedule(self: &Arc<Self>, bucket: Arc<Bucket>, delay: Duration) {
        let shared = Arc::clone(self);
        self.scheduler
            .schedule(delay, Box::pin(async move { shared.process(bucket).await }));
    }

    fn current_rate_limit_delay(&self, bucket: &Bucket) -> Option<Duration> {
        let now = self.clock.now();
        self.global
            .current_delay(now)
            .or_else(|| bucket.lock().rate_limit_delay(now))
    }

    /// Run one processing task for `bucket`
    ///
    /// A panic anywhere in the loop is contained here so the bucket never
    /// stays marked as submitted with nobody draining it.
    async fn process(self: Arc<Self>, bucket: Arc<Bucket>) {
        let drained = AssertUnwindSafe(self.drain(&bucket)).catch_unwind().await;
        if let Err(panic) = drained {
            error!(
                route = %bucket.key(),
                panic = %panic_message(panic.as_ref()),
                "Bucket processing panicked"
            );
            self.recover(bucket);
        }
    }

    /// Drain `bucket` until it is empty or cooling down
    async fn drain(self: &Arc<Self>, bucket: &Arc<Bucket>) {
        loop {
            if self.release_if_idle(bucket) {
                return;
            }

            if let Some(delay) = self.global.current_delay(self.clock.now()) {
                debug!(
                    route = %bucket.key(),
                    delay_ms = delay.as_millis() as u64,
                    "Global cooldown active, deferring bucket"
                );
                self.schedule(Arc::clone(bucket), delay);
                return;
            }

            let bucket_delay = bucket.lock().rate_limit_delay(self.clock.now());
            if let Some(delay) = bucket_delay {
                debug!(
                    route = %bucket.key(),
                    delay_ms = delay.as_millis() as u64,
                    "Bucket exhausted, deferring until reset"
                );
                self.schedule(Arc::clone(bucket), delay);
                return;
            }

            if let Some(request) = Self::take_next(bucket) {
                self.execute(bucket, request).await;
            }
        }
    }

    /// Put a bucket back in service after its task panicked
    ///
    /// Queued requests are retried after the default cooldown; an idle bucket
    /// leaves the submitted set.
    fn recover(self: &Arc<Self>, bucket: Arc<Bucket>) {
        {
            let mut submitted = self.submitted.lock();
            if bucket.lock().queue.is_empty() {
                submitted.remove(bucket.key());
                return;
            }
        }
        warn!(
            route = %bucket.key(),
            delay_ms = self.default_retry_after.as_millis() as u64,
            "Rescheduling bucket after panic"
        );
        self.schedule(bucket, self.default_retry_after);
    }

    /// Leave the submitted set if the queue is empty
    ///
    /// Checked under the `submitted` lock so a concurrent `enqueue` either
    /// sees this bucket as still submitted or schedules a fresh task.
    fn release_if_idle(&self, bucket: &Bucket) -> bool {
        if !bucket.lock().queue.is_empty() {
            return false;
        }

        let mut submitted = self.submitted.lock();
        if bucket.lock().queue.is_empty() {
            submitted.remove(bucket.key());
            trace!(route = %bucket.key(), "Bucket idle");
            true
        } else {
            false
        }
    }

    /// Pop the first live request, failing cancelled ones on the way
    fn take_next(bucket: &Bucket) -> Option<QueuedRequest> {
        let mut state = bucket.lock();
        while let Some(request) = state.queue.pop_front() {
            if request.is_cancelled() {
                trace!(route = %bucket.key(), "Skipping cancelled request");
                request.complete(Err(RestError::Cancelled));
                continue;
            }
            state.consume();
            return Some(request);
        }
        None
    }

    async fn execute(&self, bucket: &Bucket, mut request: QueuedRequest) {
        request.attempts += 1;
        trace!(
            route = %bucket.key(),
            path = request.request.route().path(),
            attempt = request.attempts,
            "Executing request"
        );

        let outcome = AssertUnwindSafe(self.send(bucket, &request.request))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok((_, Some(_)))) => {
                // Retried before anything queued behind it
                bucket.lock().queue.push_front(request);
            }
            Ok(Ok((response, None))) => request.complete(Ok(response)),
            Ok(Err(err)) => {
                warn!(route = %bucket.key(), error = %err, "Request failed before a response");
                request.complete(Err(err.into()));
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(route = %bucket.key(), panic = %message, "Request processing panicked");
                request.complete(Err(RestError::internal(anyhow::anyhow!(
                    "request processing panicked: {message}"
                ))));
            }
        }
    }

    /// Send a request and fold its response into the limiter state
    async fn send(
        &self,
        bucket: &Bucket,
        request: &RestRequest,
    ) -> Result<(RestResponse, Option<Duration>), TransportError> {
        let response = self.executor.execute(request).await?;
        let retry_after = self.handle_response(bucket, &response);
        Ok((response, retry_after))
    }

    /// Update bucket state from a response
    ///
    /// Returns the retry-after for a 429, `None` otherwise.
    fn handle_response(&self, bucket: &Bucket, response: &RestResponse) -> Option<Duration> {
        self.clock.calibrate(response.headers());
        let now = self.clock.now();

        if response.is_rate_limited() {
            let limited = TooManyRequests::parse(response);
            let retry_after = limited.retry_after.unwrap_or_else(|| {
                warn!(
                    route = %bucket.key(),
                    default_ms = self.default_retry_after.as_millis() as u64,
                    "429 without retry-after, using default cooldown"
                );
                self.default_retry_after
            });
            let until = now.saturating_add(duration_millis(retry_after));

            if limited.global {
                warn!(
                    route = %bucket.key(),
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Hit global rate limit"
                );
                self.global.set_until(until);
            } else {
                warn!(
                    route = %bucket.key(),
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Hit route rate limit"
                );
                bucket.lock().exhaust_until(until);
            }
            return Some(retry_after);
        }

        if !self.account_type.uses_route_headers() {
            if let Some(fixed) = bucket.fixed_limit() {
                bucket.lock().apply_fixed(fixed, now);
            }
            return None;
        }

        let headers = RouteHeaders::parse(response.headers());
        if let Some(fixed) = bucket.fixed_limit() {
            // The hardcoded window wins over the reported reset; a reported
            // remaining count still applies.
            let mut state = bucket.lock();
            state.apply_fixed(fixed, now);
            if let Some(remaining) = headers.remaining {
                state.remaining = remaining;
            }
            return None;
        }

        bucket.lock().apply_headers(&headers);

        if headers.count() < EXPECTED_ROUTE_HEADERS && !bucket.expects_missing_headers() {
            warn!(
                route = %bucket.key(),
                status = response.status(),
                found = headers.count(),
                "Response carried incomplete rate-limit headers"
            );
        }

        None
    }
}

/// Whole milliseconds in `duration`, saturating at `i64::MAX`
fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
