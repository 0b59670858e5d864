//! Reconnect state machine run on a session's stream thread.
//!
//! Each cycle issues the request, then by status: streams the body (200),
//! waits on the standard curve (503), waits on the aggressive curve
//! (429/420), or gives up (anything else). A transport failure ends the
//! session. Cancellation is checked before every request and around every
//! wait, and the body is closed at the end of every cycle.

mod classify;
mod receive;

pub use classify::{classify_status, StatusClass};
pub(crate) use receive::{receive, ReceiveEnd};

use crossbeam_channel::Sender;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use crate::backoff::BackoffPolicies;
use crate::cancel::Canceller;
use crate::message::StreamData;
use crate::request::StreamRequest;
use crate::session::StreamExit;
use crate::transport::{BodyCloser, Transport};

/// Everything the stream thread shares with its session.
pub(crate) struct StreamContext {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) canceller: Arc<Canceller>,
    pub(crate) messages: Sender<StreamData>,
    pub(crate) dropped: Arc<AtomicU64>,
}

/// Detaches and closes the cycle's body when the cycle ends, whichever way.
struct AttachedBody<'a> {
    canceller: &'a Canceller,
    closer: Arc<dyn BodyCloser>,
}

impl<'a> AttachedBody<'a> {
    fn new(canceller: &'a Canceller, closer: Arc<dyn BodyCloser>) -> Self {
        canceller.attach(Arc::clone(&closer));
        Self { canceller, closer }
    }
}

impl Drop for AttachedBody<'_> {
    fn drop(&mut self) {
        self.canceller.detach();
        self.closer.close();
    }
}

/// What to do after a cycle.
enum Next {
    Reconnect,
    Wait(Duration),
    Exit(StreamExit),
}

/// Run reconnect cycles until stopped, abandoned, exhausted or failed.
pub(crate) fn run(
    ctx: &StreamContext,
    request: &StreamRequest,
    policies: &mut BackoffPolicies,
) -> StreamExit {
    let cancel = ctx.canceller.token();
    while !cancel.is_cancelled() {
        let next = cycle(ctx, request, policies);
        match next {
            Next::Reconnect => {}
            Next::Wait(wait) => {
                if cancel.is_cancelled() {
                    break;
                }
                tracing::info!(wait_ms = wait.as_millis() as u64, "backing off before reconnect");
                if cancel.wait_timeout(wait) {
                    break;
                }
            }
            Next::Exit(exit) => return exit,
        }
    }
    StreamExit::Stopped
}

fn cycle(ctx: &StreamContext, request: &StreamRequest, policies: &mut BackoffPolicies) -> Next {
    tracing::debug!(url = %request.url, "connecting");
    let response = match ctx.transport.execute(request, ctx.canceller.token()) {
        Ok(response) => response,
        Err(e) => {
            if ctx.canceller.is_cancelled() {
                return Next::Exit(StreamExit::Stopped);
            }
            tracing::error!("stream request failed: {}", e);
            return Next::Exit(StreamExit::Failed(Arc::new(e)));
        }
    };
    let status = response.status;
    let _attached = AttachedBody::new(&ctx.canceller, response.body.closer());

    match classify_status(status) {
        StatusClass::Streaming => {
            tracing::info!(status, "stream connected");
            let end = receive(response.body, ctx);
            policies.reset_all();
            match end {
                ReceiveEnd::BodyEnded => Next::Reconnect,
                ReceiveEnd::Cancelled => Next::Exit(StreamExit::Stopped),
                ReceiveEnd::ConsumerGone => {
                    tracing::info!("message receiver dropped; ending stream");
                    Next::Exit(StreamExit::Stopped)
                }
            }
        }
        StatusClass::Unavailable => {
            tracing::warn!(status, "stream service unavailable");
            backoff_or_exhausted(policies.standard.next_backoff(), status)
        }
        StatusClass::RateLimited => {
            tracing::warn!(status, "stream rate limited");
            backoff_or_exhausted(policies.aggressive.next_backoff(), status)
        }
        StatusClass::Unexpected => {
            tracing::warn!(status, "unexpected stream status; giving up");
            Next::Exit(StreamExit::Abandoned { status })
        }
    }
}

fn backoff_or_exhausted(wait: Option<Duration>, status: u16) -> Next {
    match wait {
        Some(wait) => Next::Wait(wait),
        None => {
            tracing::warn!(status, "backoff exhausted; giving up");
            Next::Exit(StreamExit::Exhausted { status })
        }
    }
}
