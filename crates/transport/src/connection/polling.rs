//! Submit-then-poll for long running provider operations.
//!
//! A job is submitted with one request, then a derived request is re-issued every
//! [`PollConfig::poll_interval`] until [`AsyncJob::has_completed`] says so or
//! [`PollConfig::timeout`] elapses. A poll still in flight at the deadline is
//! abandoned. The loop runs on the calling task and sleeps between polls; nothing
//! is retried on transport errors.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, warn};

use crate::connection::{Connection, ConnectionHooks, Connector};
use crate::protocol::{HttpError, Request, RequestContext, Response, ResponseFormat};

/// Something that turns a request into a complete response.
#[async_trait]
pub trait PollTarget: Send {
    type Output: Send;

    async fn request(&mut self, request: Request, context: RequestContext) -> Result<Response<Self::Output>, HttpError>;
}

#[async_trait]
impl<F, H, C> PollTarget for Connection<F, H, C>
where
    F: ResponseFormat,
    H: ConnectionHooks,
    C: Connector,
{
    type Output = F::Output;

    async fn request(&mut self, request: Request, context: RequestContext) -> Result<Response<F::Output>, HttpError> {
        self.set_context(context);
        self.send(request).await
    }
}

/// How a provider recognizes and follows one kind of asynchronous operation.
pub trait AsyncJob<T>: Send + Sync {
    /// Adjusts the submitting request, unchanged by default.
    fn initial_request(&self, request: Request, context: &RequestContext) -> Request {
        let _ = context;
        request
    }

    /// The request that asks for the job state, usually built from an id in `initial`.
    fn poll_request(&self, initial: &Response<T>, context: &RequestContext) -> Result<Request, HttpError>;

    fn has_completed(&self, response: &Response<T>) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    poll_interval: Duration,
    timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_millis(500), timeout: Duration::from_secs(200) }
    }
}

impl PollConfig {
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[derive(Debug)]
pub struct PollingConnection<T = Connection> {
    target: T,
    config: PollConfig,
}

impl<T: PollTarget> PollingConnection<T> {
    pub fn new(target: T) -> Self {
        Self::with_config(target, PollConfig::default())
    }

    pub fn with_config(target: T, config: PollConfig) -> Self {
        Self { target, config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn into_inner(self) -> T {
        self.target
    }

    /// Plain request on the wrapped target, without polling.
    pub async fn request(&mut self, request: Request, context: Option<RequestContext>) -> Result<Response<T::Output>, HttpError> {
        self.target.request(request, context.unwrap_or_default()).await
    }

    /// Submits `request`, then polls until `job` reports completion.
    ///
    /// Returns the first poll response for which [`AsyncJob::has_completed`] is true,
    /// or [`HttpError::Timeout`] once the configured timeout elapsed without one.
    pub async fn async_request<J>(
        &mut self,
        request: Request,
        context: Option<RequestContext>,
        job: &J,
    ) -> Result<Response<T::Output>, HttpError>
    where
        J: AsyncJob<T::Output> + ?Sized,
    {
        let context = context.unwrap_or_default();
        let request = job.initial_request(request, &context);
        let initial = self.target.request(request, context.clone()).await?;
        let poll = job.poll_request(&initial, &context)?;

        let PollConfig { poll_interval, timeout } = self.config;
        let deadline = Instant::now() + timeout;
        let mut polls = 0_u32;

        while Instant::now() < deadline {
            // a poll still in flight at the deadline is dropped
            let Ok(response) = timeout_at(deadline, self.target.request(poll.clone(), context.clone())).await else {
                break;
            };
            let response = response?;
            polls += 1;
            if job.has_completed(&response) {
                debug!(polls, action = poll.action(), "async job completed");
                return Ok(response);
            }
            sleep(poll_interval).await;
        }

        warn!(polls, ?timeout, action = poll.action(), "async job did not complete in time");
        Err(HttpError::Timeout { timeout })
    }
}
