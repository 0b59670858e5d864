//! libcurl transport.
//!
//! A libcurl transfer is a blocking call that pushes data through callbacks,
//! so each request runs on its own worker thread. The worker hands the status
//! of the last complete header block back when the body starts (or when the
//! transfer ends without one) and then forwards body chunks to a `CurlBody`
//! reader. Proxy CONNECT replies and 1xx blocks therefore never pose as the
//! server's answer. Closing the body makes the write and progress callbacks
//! abort the transfer; dropping it joins the worker so the socket is gone.

use crossbeam_channel::{Receiver, Sender};
use std::cell::Cell;
use std::io::{self, Read};
use std::str;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{BodyCloser, Response, ResponseBody, Transport, TransportError};
use crate::cancel::CancelToken;
use crate::request::StreamRequest;

/// Body chunks buffered between the curl worker and the reader.
const CHUNK_QUEUE: usize = 16;

/// libcurl knobs for long-lived streaming GETs.
#[derive(Debug, Clone, Copy)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    /// When set, abort the transfer once no bytes at all (not even a
    /// keep-alive) arrived for this long. The body then ends and the session
    /// reconnects. Off by default.
    pub stall_timeout: Option<Duration>,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            stall_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurlTransport {
    options: CurlOptions,
}

impl CurlTransport {
    pub fn new(options: CurlOptions) -> Self {
        Self { options }
    }
}

impl Transport for CurlTransport {
    fn execute(
        &self,
        request: &StreamRequest,
        cancel: &CancelToken,
    ) -> Result<Response, TransportError> {
        let (status_tx, status_rx) = crossbeam_channel::bounded(1);
        let (chunk_tx, chunk_rx) = crossbeam_channel::bounded(CHUNK_QUEUE);
        let closed = CancelToken::new();

        let worker = {
            let request = request.clone();
            let options = self.options;
            let closed = closed.clone();
            let cancel = cancel.clone();
            thread::Builder::new()
                .name("tws-curl".to_string())
                .spawn(move || {
                    run_transfer(&request, options, &status_tx, &chunk_tx, &closed, &cancel)
                })?
        };

        let outcome = match status_rx.recv() {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportError::NoResponse),
        };
        match outcome {
            Ok(status) => Ok(Response {
                status,
                body: Box::new(CurlBody {
                    chunks: chunk_rx,
                    pending: Vec::new(),
                    pos: 0,
                    closed,
                    worker: Some(worker),
                }),
            }),
            Err(e) => {
                closed.cancel();
                let _ = worker.join();
                Err(e)
            }
        }
    }
}

/// Parse the numeric code out of an `HTTP/x.y NNN reason` status line.
fn parse_status_line(line: &str) -> Option<u16> {
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Tracks header blocks as libcurl reports them line by line. A transfer may
/// see several blocks (proxy CONNECT reply, `100 Continue`) before the
/// server's final one.
#[derive(Debug, Default)]
struct HeaderBlocks {
    current: Cell<Option<u16>>,
    completed: Cell<Option<u16>>,
}

impl HeaderBlocks {
    fn observe(&self, line: &str) {
        if let Some(code) = parse_status_line(line) {
            // A new block starts; the previous one was not the final answer.
            self.current.set(Some(code));
            self.completed.set(None);
        } else if line.is_empty() {
            if let Some(code) = self.current.get().filter(|c| *c >= 200) {
                self.completed.set(Some(code));
            }
        }
    }

    /// Status of the last complete non-informational block.
    fn completed(&self) -> Option<u16> {
        self.completed.get()
    }

    /// Status of the block being read, complete or not.
    fn latest(&self) -> Option<u16> {
        self.completed().or(self.current.get())
    }
}

/// Channels and signals shared by the transfer callbacks.
struct TransferLinks<'a> {
    status_tx: &'a Sender<Result<u16, TransportError>>,
    chunk_tx: &'a Sender<io::Result<Vec<u8>>>,
    closed: &'a CancelToken,
    cancel: &'a CancelToken,
    headers: HeaderBlocks,
    status_sent: Cell<bool>,
}

impl TransferLinks<'_> {
    /// Hand `status` to the waiting caller once.
    fn send_status(&self, status: u16) {
        if !self.status_sent.replace(true) {
            let _ = self.status_tx.send(Ok(status));
        }
    }
}

fn run_transfer(
    request: &StreamRequest,
    options: CurlOptions,
    status_tx: &Sender<Result<u16, TransportError>>,
    chunk_tx: &Sender<io::Result<Vec<u8>>>,
    closed: &CancelToken,
    cancel: &CancelToken,
) {
    let links = TransferLinks {
        status_tx,
        chunk_tx,
        closed,
        cancel,
        headers: HeaderBlocks::default(),
        status_sent: Cell::new(false),
    };

    let mut easy = curl::easy::Easy::new();
    let result = configure(&mut easy, request, options)
        .and_then(|()| perform(&mut easy, &links, options.stall_timeout));

    if !links.status_sent.get() {
        let outcome = match result {
            Err(e) => Err(TransportError::Curl(e)),
            Ok(()) => easy
                .response_code()
                .map(|c| c as u16)
                .map_err(TransportError::Curl),
        };
        let _ = status_tx.send(outcome);
        return;
    }

    if let Err(e) = result {
        if !closed.is_cancelled() {
            tracing::debug!("stream transfer ended: {}", e);
            let err = io::Error::new(io::ErrorKind::ConnectionAborted, e.to_string());
            crossbeam_channel::select! {
                send(chunk_tx, Err(err)) -> _ => {}
                recv(closed.receiver()) -> _ => {}
            }
        }
    }
}

fn configure(
    easy: &mut curl::easy::Easy,
    request: &StreamRequest,
    options: CurlOptions,
) -> Result<(), curl::Error> {
    easy.url(&request.url)?;
    if !request.method.eq_ignore_ascii_case("GET") {
        easy.custom_request(&request.method)?;
    }
    easy.connect_timeout(options.connect_timeout)?;
    easy.progress(true)?;

    let mut list = curl::easy::List::new();
    for (k, v) in &request.headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    if !request.headers.is_empty() {
        easy.http_headers(list)?;
    }
    Ok(())
}

fn perform(
    easy: &mut curl::easy::Easy,
    links: &TransferLinks<'_>,
    stall_timeout: Option<Duration>,
) -> Result<(), curl::Error> {
    let last_data = Cell::new(Instant::now());

    let mut transfer = easy.transfer();
    transfer.header_function(|data| {
        let line = str::from_utf8(data).unwrap_or("").trim_end();
        links.headers.observe(line);
        true
    })?;
    transfer.write_function(|data| {
        last_data.set(Instant::now());
        match links.headers.latest() {
            Some(status) => links.send_status(status),
            // Body bytes without a status line: not HTTP we can classify.
            None => return Ok(0),
        }
        let delivered = crossbeam_channel::select! {
            send(links.chunk_tx, Ok(data.to_vec())) -> res => res.is_ok(),
            recv(links.closed.receiver()) -> _ => false,
        };
        // Returning a short count makes libcurl abort with a write error.
        Ok(if delivered { data.len() } else { 0 })
    })?;
    transfer.progress_function(|_, _, _, _| {
        if links.closed.is_cancelled() || links.cancel.is_cancelled() {
            return false;
        }
        let stalled = stall_timeout.map_or(false, |limit| {
            links.status_sent.get() && last_data.get().elapsed() > limit
        });
        !stalled
    })?;
    transfer.perform()
}

/// Streaming body fed by a curl worker thread.
pub struct CurlBody {
    chunks: Receiver<io::Result<Vec<u8>>>,
    pending: Vec<u8>,
    pos: usize,
    closed: CancelToken,
    worker: Option<JoinHandle<()>>,
}

struct CurlCloser(CancelToken);

impl BodyCloser for CurlCloser {
    fn close(&self) {
        self.0.cancel();
    }
}

impl ResponseBody for CurlBody {
    fn closer(&self) -> Arc<dyn BodyCloser> {
        Arc::new(CurlCloser(self.closed.clone()))
    }
}

impl Read for CurlBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.closed.is_cancelled() {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    "response body closed",
                ));
            }
            if self.pos < self.pending.len() {
                let n = buf.len().min(self.pending.len() - self.pos);
                buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            let next = crossbeam_channel::select! {
                recv(self.chunks) -> msg => Some(msg),
                recv(self.closed.receiver()) -> _ => None,
            };
            match next {
                Some(Ok(Ok(chunk))) => {
                    self.pending = chunk;
                    self.pos = 0;
                }
                Some(Ok(Err(e))) => return Err(e),
                // Worker finished: end of body.
                Some(Err(_)) => return Ok(0),
                None => {}
            }
        }
    }
}

impl Drop for CurlBody {
    fn drop(&mut self) {
        self.closed.cancel();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("curl worker panicked");
            }
        }
    }
}
