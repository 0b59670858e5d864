//! HTTP transport boundary.
//!
//! The retry controller only needs "execute this request, give me a status
//! and a readable, closable body". `CurlTransport` is the production
//! implementation; tests plug in scripted fakes.

mod libcurl;

pub use self::libcurl::{CurlBody, CurlOptions, CurlTransport};

use std::io::Read;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::request::StreamRequest;

/// Error issuing a request (no HTTP status was obtained).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("curl: {0}")]
    Curl(#[from] ::curl::Error),
    #[error("transfer worker: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection closed before a response status was received")]
    NoResponse,
    #[error("{0}")]
    Other(String),
}

/// Closes a response body from another thread, unblocking any pending read.
pub trait BodyCloser: Send + Sync {
    fn close(&self);
}

/// A streaming response body.
pub trait ResponseBody: Read + Send {
    /// Handle that can close this body while another thread is reading it.
    fn closer(&self) -> Arc<dyn BodyCloser>;
}

/// Status line plus open body.
pub struct Response {
    pub status: u16,
    pub body: Box<dyn ResponseBody>,
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Something that can issue a stream request.
///
/// `cancel` fires when the session is stopping; implementations should give
/// up on connecting or waiting for headers once it does.
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        request: &StreamRequest,
        cancel: &CancelToken,
    ) -> Result<Response, TransportError>;
}
