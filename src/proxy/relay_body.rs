//! Body adapter for relaying upstream responses
//!
//! Once the response head has been handed to the server no second response can
//! be written. [`RelayBody`] enforces the size limit and the exchange deadline
//! on the remaining chunks and turns any failure into a body error, which makes
//! the server drop the connection.

use crate::infrastructure::error_reporting::{ErrorContext, ErrorReporter};
use crate::infrastructure::log_messages::request_processing;
use crate::proxy::types::{BodySizeLimit, ProxyError};
use axum::BoxError;
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use thiserror::Error;
use tokio::time::{sleep_until, Instant, Sleep};
use tracing::error;

/// Why a relay was cut short
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayFailure {
    #[error("deadline expired while relaying the body")]
    DeadlineExceeded,

    #[error("upstream body exceeds {limit} bytes")]
    TooLarge { limit: BodySizeLimit },

    #[error("upstream body failed: {0}")]
    Upstream(String),
}

/// Who to tell when a relay is cut short
#[derive(Clone)]
pub struct RelayContext {
    reporter: Arc<dyn ErrorReporter>,
    error_context: ErrorContext,
}

impl RelayContext {
    pub fn new(reporter: Arc<dyn ErrorReporter>, error_context: ErrorContext) -> Self {
        Self {
            reporter,
            error_context,
        }
    }

    /// Log and report the failure, then hand back the body error
    fn abort(&self, failure: RelayFailure) -> BoxError {
        let error = ProxyError::ResponseAlreadyStarted {
            reason: failure.to_string(),
        };

        error!(
            request_id = self.error_context.request_id.as_deref().unwrap_or("unknown"),
            path = self.error_context.path.as_deref(),
            target = self.error_context.target.as_deref(),
            outcome = error.kind(),
            error = %error,
            "{}",
            request_processing::RELAY_ABORTED
        );
        self.reporter.capture_exception(&error, &self.error_context);

        Box::new(error)
    }
}

pin_project! {
    /// Upstream body relayed under a size limit and a deadline
    pub struct RelayBody<B> {
        #[pin]
        inner: B,
        #[pin]
        deadline: Sleep,
        limit: BodySizeLimit,
        received: usize,
        context: RelayContext,
        finished: bool,
    }
}

impl<B> RelayBody<B> {
    pub fn new(inner: B, deadline: Instant, limit: BodySizeLimit, context: RelayContext) -> Self {
        Self {
            inner,
            deadline: sleep_until(deadline),
            limit,
            received: 0,
            context,
            finished: false,
        }
    }
}

impl<B> Body for RelayBody<B>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();

        if *this.finished {
            return Poll::Ready(None);
        }

        if this.deadline.poll(cx).is_ready() {
            *this.finished = true;
            return Poll::Ready(Some(Err(this.context.abort(RelayFailure::DeadlineExceeded))));
        }

        match ready!(this.inner.poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    *this.received = this.received.saturating_add(data.len());
                    if *this.received > *this.limit.as_ref() {
                        *this.finished = true;
                        let failure = RelayFailure::TooLarge { limit: *this.limit };
                        return Poll::Ready(Some(Err(this.context.abort(failure))));
                    }
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(e)) => {
                *this.finished = true;
                let error: BoxError = e.into();
                let failure = RelayFailure::Upstream(error.to_string());
                Poll::Ready(Some(Err(this.context.abort(failure))))
            }
            None => {
                *this.finished = true;
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.finished || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
