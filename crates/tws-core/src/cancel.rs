//! Cancellation for a stream session: a broadcast stop token plus teardown of
//! the currently open response body.
//!
//! Line reads on a response body have no native cancellation, so the only way
//! to interrupt a read that is waiting on the next keep-alive is to close the
//! body underneath it. `Canceller::cancel` is the single entry point that does
//! both: it sets the token (observed at every safe re-entry point of the
//! stream thread) and closes whatever body is attached at that moment.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::transport::BodyCloser;

/// Level-triggered, fire-once stop signal.
///
/// Cancelling drops the only sender of an internal channel, so every clone of
/// the receiver observes disconnection forever after. This makes the token
/// usable inside `crossbeam_channel::select!` next to sends and sleeps.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    sender: Mutex<Option<Sender<()>>>,
    receiver: Receiver<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(0);
        Self {
            inner: Arc::new(TokenInner {
                sender: Mutex::new(Some(sender)),
                receiver,
            }),
        }
    }

    /// Fire the token. Calling again is a no-op.
    pub fn cancel(&self) {
        self.inner.sender.lock().unwrap().take();
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.inner.receiver.try_recv(),
            Err(TryRecvError::Disconnected)
        )
    }

    /// Sleep for `timeout` unless the token fires first. Returns true if cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        !matches!(
            self.inner.receiver.recv_timeout(timeout),
            Err(RecvTimeoutError::Timeout)
        )
    }

    /// Block until the token fires.
    pub fn wait(&self) {
        let _ = self.inner.receiver.recv();
    }

    /// Receiver that becomes ready (disconnected) once the token fires.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.inner.receiver
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation via resource teardown: owns the stop token and the close
/// handle of the response body currently being read.
///
/// The stream thread is the only writer of the body slot; the caller only
/// takes from it during `cancel`.
#[derive(Default)]
pub struct Canceller {
    token: CancelToken,
    body: Mutex<Option<Arc<dyn BodyCloser>>>,
}

impl Canceller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Set the stop token and force-close the attached body, if any.
    pub fn cancel(&self) {
        self.token.cancel();
        let attached = self.body.lock().unwrap().take();
        if let Some(closer) = attached {
            tracing::debug!("closing open response body to interrupt read");
            closer.close();
        }
    }

    /// Record the body the stream thread is about to read. If cancellation
    /// already happened the body is closed right away.
    pub(crate) fn attach(&self, closer: Arc<dyn BodyCloser>) {
        let mut slot = self.body.lock().unwrap();
        // Checked under the lock: `cancel` fires the token before taking the slot.
        if self.token.is_cancelled() {
            closer.close();
            return;
        }
        *slot = Some(closer);
    }

    pub(crate) fn detach(&self) {
        self.body.lock().unwrap().take();
    }
}
