pub mod config;
pub mod logging;

pub mod backoff;
pub mod cancel;
pub mod controller;
pub mod message;
pub mod reader;
pub mod request;
pub mod service;
pub mod session;
pub mod transport;

pub use message::{MatchingRule, StreamData, Tweet};
pub use request::{StreamFilterParams, StreamRequest};
pub use service::{ConnectError, StreamService};
pub use session::{Session, StreamExit};
