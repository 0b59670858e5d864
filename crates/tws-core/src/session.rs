//! Stream session: one background thread, one message channel, one stop.

use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::backoff::BackoffPolicies;
use crate::cancel::Canceller;
use crate::controller::{self, StreamContext};
use crate::message::StreamData;
use crate::request::StreamRequest;
use crate::transport::{Transport, TransportError};

/// Why the stream thread exited.
#[derive(Debug, Clone)]
pub enum StreamExit {
    /// `stop` was called, or the consumer went away.
    Stopped,
    /// The server answered with a status the client does not retry.
    Abandoned { status: u16 },
    /// A backoff curve signalled stop while retrying this status.
    Exhausted { status: u16 },
    /// The request could not be issued at all.
    Failed(Arc<TransportError>),
}

impl std::fmt::Display for StreamExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamExit::Stopped => write!(f, "stopped"),
            StreamExit::Abandoned { status } => write!(f, "abandoned after HTTP {}", status),
            StreamExit::Exhausted { status } => {
                write!(f, "gave up retrying HTTP {} (backoff exhausted)", status)
            }
            StreamExit::Failed(e) => write!(f, "request failed: {}", e),
        }
    }
}

/// A running, auto-reconnecting stream.
///
/// Messages arrive on [`Session::messages`] in the order the server framed
/// them. The channel is a rendezvous channel: the stream thread waits for the
/// consumer on every message. It closes exactly once, when the stream thread
/// exits, either on its own (see [`Session::exit_reason`]) or through
/// [`Session::stop`]. Dropping the session stops it.
pub struct Session {
    messages: Receiver<StreamData>,
    canceller: Arc<Canceller>,
    worker: Mutex<Option<JoinHandle<()>>>,
    exit: Arc<Mutex<Option<StreamExit>>>,
    dropped: Arc<AtomicU64>,
}

impl Session {
    /// Start the stream thread for `request` and return immediately.
    pub fn connect(
        transport: Arc<dyn Transport>,
        request: StreamRequest,
        mut policies: BackoffPolicies,
    ) -> std::io::Result<Session> {
        let (tx, rx) = crossbeam_channel::bounded(0);
        let canceller = Arc::new(Canceller::new());
        let exit = Arc::new(Mutex::new(None));
        let dropped = Arc::new(AtomicU64::new(0));

        let ctx = StreamContext {
            transport,
            canceller: Arc::clone(&canceller),
            messages: tx,
            dropped: Arc::clone(&dropped),
        };
        let exit_slot = Arc::clone(&exit);
        let worker = thread::Builder::new()
            .name("tws-stream".to_string())
            .spawn(move || {
                let reason = controller::run(&ctx, &request, &mut policies);
                tracing::info!("stream ended: {}", reason);
                // Recorded before the sender drops so a closed channel always has a reason.
                *exit_slot.lock().unwrap() = Some(reason);
                drop(ctx);
            })?;

        Ok(Session {
            messages: rx,
            canceller,
            worker: Mutex::new(Some(worker)),
            exit,
            dropped,
        })
    }

    /// Consumer end of the message channel.
    pub fn messages(&self) -> &Receiver<StreamData> {
        &self.messages
    }

    /// Stop the stream and wait for its thread to exit.
    ///
    /// Fires the stop token, closes the body being read (the only way to
    /// interrupt a read waiting for the next keep-alive), then joins the
    /// stream thread. When this returns the message channel is closed. Safe
    /// to call more than once and after the stream ended on its own.
    pub fn stop(&self) {
        self.canceller.cancel();
        // Held across the join so a concurrent `stop` also waits for exit.
        let mut worker = self.worker.lock().unwrap();
        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                tracing::error!("stream thread panicked");
            }
        }
    }

    /// Whether the stream thread has exited.
    pub fn is_finished(&self) -> bool {
        self.exit.lock().unwrap().is_some()
    }

    /// Why the stream thread exited; `None` while it is still running.
    pub fn exit_reason(&self) -> Option<StreamExit> {
        self.exit.lock().unwrap().clone()
    }

    /// Non-empty lines that failed to decode and were skipped.
    pub fn dropped_messages(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("exit", &self.exit_reason())
            .field("dropped", &self.dropped_messages())
            .finish_non_exhaustive()
    }
}
