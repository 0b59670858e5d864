//! Entry point tying request construction, backoff settings and a transport
//! together.

use std::sync::Arc;

use crate::backoff::BackoffSettings;
use crate::request::{build_stream_request, RequestError, StreamFilterParams};
use crate::session::Session;
use crate::transport::Transport;

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("could not start stream thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Opens filtered-stream sessions against one endpoint with one token.
pub struct StreamService {
    transport: Arc<dyn Transport>,
    endpoint: String,
    token: String,
    backoff: BackoffSettings,
}

impl StreamService {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoint: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            token: token.into(),
            backoff: BackoffSettings::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffSettings) -> Self {
        self.backoff = backoff;
        self
    }

    /// Build the request for `params` and start a session.
    pub fn connect(&self, params: &StreamFilterParams) -> Result<Session, ConnectError> {
        let request = build_stream_request(&self.endpoint, params, &self.token)?;
        tracing::info!(url = %request.url, "starting stream session");
        let session = Session::connect(
            Arc::clone(&self.transport),
            request,
            self.backoff.build(),
        )?;
        Ok(session)
    }
}
