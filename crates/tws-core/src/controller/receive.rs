//! Receive loop: frame lines, skip keep-alives, decode, deliver.

use std::io::Read;
use std::sync::atomic::Ordering;

use super::StreamContext;
use crate::message;
use crate::reader::BodyReader;

/// Why the receive loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReceiveEnd {
    /// Body ended or failed; reconnect.
    BodyEnded,
    /// Stop was requested.
    Cancelled,
    /// The consumer side of the channel is gone.
    ConsumerGone,
}

pub(crate) fn receive<R: Read>(body: R, ctx: &StreamContext) -> ReceiveEnd {
    let mut reader = BodyReader::new(body);
    let cancel = ctx.canceller.token();
    let mut delivered = 0u64;
    let end = loop {
        if cancel.is_cancelled() {
            break ReceiveEnd::Cancelled;
        }
        let line = match reader.read_next() {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::debug!("stream body reached end of stream");
                break ReceiveEnd::BodyEnded;
            }
            Err(e) => {
                if cancel.is_cancelled() {
                    break ReceiveEnd::Cancelled;
                }
                tracing::debug!("stream body read failed: {}", e);
                break ReceiveEnd::BodyEnded;
            }
        };
        if line.is_empty() {
            tracing::trace!("keep-alive");
            continue;
        }
        let msg = match message::decode(&line) {
            Ok(msg) => msg,
            Err(e) => {
                ctx.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(len = line.len(), "dropping stream line: {}", e);
                continue;
            }
        };
        if cancel.is_cancelled() {
            break ReceiveEnd::Cancelled;
        }
        // Never block on a consumer that is not coming back.
        let sent = crossbeam_channel::select! {
            send(ctx.messages, msg) -> res => {
                if res.is_ok() { None } else { Some(ReceiveEnd::ConsumerGone) }
            }
            recv(cancel.receiver()) -> _ => Some(ReceiveEnd::Cancelled),
        };
        if let Some(end) = sent {
            break end;
        }
        delivered += 1;
    };
    tracing::debug!(delivered, ?end, "receive loop finished");
    end
}
