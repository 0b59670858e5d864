//! Map response status codes to controller actions.

/// What a response status means for the reconnect loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 200: read the stream.
    Streaming,
    /// 503: wait on the standard curve.
    Unavailable,
    /// 429, or 420 ("Enhance Your Calm"): wait on the aggressive curve.
    RateLimited,
    /// Anything else: stop talking to the server.
    Unexpected,
}

pub fn classify_status(code: u16) -> StatusClass {
    match code {
        200 => StatusClass::Streaming,
        503 => StatusClass::Unavailable,
        420 | 429 => StatusClass::RateLimited,
        _ => StatusClass::Unexpected,
    }
}
