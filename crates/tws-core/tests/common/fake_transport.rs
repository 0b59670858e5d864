//! Scripted in-process transport.
//!
//! Each request pops the next `Reply`. When the script runs out, every
//! further request gets a 200 whose body never ends until it is closed,
//! which is what a quiet stream waiting on keep-alives looks like.

use std::collections::VecDeque;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tws_core::cancel::CancelToken;
use tws_core::transport::{BodyCloser, Response, ResponseBody, Transport, TransportError};
use tws_core::StreamRequest;

#[derive(Debug, Clone)]
pub enum Reply {
    /// Status with an empty body.
    Status(u16),
    /// 200 with these lines (each followed by `\r\n`), then end of body.
    Lines(Vec<String>),
    /// 200 with these lines, then block until the body is closed.
    LinesThenHang(Vec<String>),
    /// The request cannot be issued.
    Fail,
}

impl Reply {
    pub fn lines(lines: &[&str]) -> Self {
        Reply::Lines(lines.iter().map(|s| s.to_string()).collect())
    }

    pub fn lines_then_hang(lines: &[&str]) -> Self {
        Reply::LinesThenHang(lines.iter().map(|s| s.to_string()).collect())
    }
}

#[derive(Default)]
pub struct FakeTransport {
    script: Mutex<VecDeque<Reply>>,
    requests: AtomicUsize,
    open_bodies: Arc<AtomicUsize>,
    seen: Mutex<Vec<StreamRequest>>,
}

impl FakeTransport {
    pub fn new(script: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        })
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Bodies handed out and not yet dropped.
    pub fn open_bodies(&self) -> usize {
        self.open_bodies.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<StreamRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl Transport for FakeTransport {
    fn execute(
        &self,
        request: &StreamRequest,
        _cancel: &CancelToken,
    ) -> Result<Response, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());
        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::LinesThenHang(Vec::new()));
        let (status, lines, hang) = match reply {
            Reply::Status(status) => (status, Vec::new(), false),
            Reply::Lines(lines) => (200, lines, false),
            Reply::LinesThenHang(lines) => (200, lines, true),
            Reply::Fail => return Err(TransportError::Other("connection refused".into())),
        };
        let mut data = Vec::new();
        for line in lines {
            data.extend_from_slice(line.as_bytes());
            data.extend_from_slice(b"\r\n");
        }
        Ok(Response {
            status,
            body: Box::new(FakeBody::new(data, hang, Arc::clone(&self.open_bodies))),
        })
    }
}

pub struct FakeBody {
    data: Cursor<Vec<u8>>,
    hang: bool,
    closed: CancelToken,
    open: Arc<AtomicUsize>,
}

impl FakeBody {
    fn new(data: Vec<u8>, hang: bool, open: Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self {
            data: Cursor::new(data),
            hang,
            closed: CancelToken::new(),
            open,
        }
    }
}

struct FakeCloser(CancelToken);

impl BodyCloser for FakeCloser {
    fn close(&self) {
        self.0.cancel();
    }
}

impl ResponseBody for FakeBody {
    fn closer(&self) -> Arc<dyn BodyCloser> {
        Arc::new(FakeCloser(self.closed.clone()))
    }
}

impl Read for FakeBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::ConnectionAborted, "closed"));
        }
        let n = self.data.read(buf)?;
        if n > 0 || !self.hang {
            return Ok(n);
        }
        self.closed.wait();
        Err(io::Error::new(io::ErrorKind::ConnectionAborted, "closed"))
    }
}

impl Drop for FakeBody {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}
