//! `tws stream` – connect, print messages, stop on Ctrl-C / SIGTERM.

use anyhow::{Context, Result};
use std::sync::Arc;
use tws_core::config::TwsConfig;
use tws_core::transport::CurlTransport;
use tws_core::{StreamData, StreamExit, StreamFilterParams, StreamService};

use crate::cli::FilterArgs;

pub async fn run_stream(
    cfg: &TwsConfig,
    filter: FilterArgs,
    endpoint: Option<String>,
    json: bool,
) -> Result<()> {
    let token = std::env::var(&cfg.token_env)
        .with_context(|| format!("bearer token not set; export {}", cfg.token_env))?;
    let params = apply_filter_overrides(cfg.filter.clone().unwrap_or_default(), filter);
    let endpoint = endpoint.unwrap_or_else(|| cfg.endpoint.clone());

    let transport = Arc::new(CurlTransport::new(cfg.curl_options()));
    let service =
        StreamService::new(transport, endpoint, token).with_backoff(cfg.backoff_settings());
    let session = Arc::new(service.connect(&params)?);

    let messages = session.messages().clone();
    let mut printer = tokio::task::spawn_blocking(move || {
        let mut count = 0u64;
        for msg in messages.iter() {
            println!("{}", format_message(&msg, json));
            count += 1;
        }
        count
    });

    let finished = tokio::select! {
        res = &mut printer => Some(res?),
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received; stopping stream");
            None
        }
    };

    let stopper = Arc::clone(&session);
    tokio::task::spawn_blocking(move || stopper.stop()).await?;
    let count = match finished {
        Some(count) => count,
        None => printer.await?,
    };

    tracing::info!(count, dropped = session.dropped_messages(), "stream finished");
    report_exit(session.exit_reason())
}

/// Map the session's terminal reason to the command result. The reason is
/// always recorded once `stop` returns, so its absence means the stream
/// thread died.
pub(crate) fn report_exit(exit: Option<StreamExit>) -> Result<()> {
    match exit {
        Some(StreamExit::Stopped) => Ok(()),
        Some(StreamExit::Failed(e)) => Err(anyhow::anyhow!("stream request failed: {}", e)),
        Some(other) => {
            eprintln!("stream ended: {}", other);
            Ok(())
        }
        None => Err(anyhow::anyhow!("stream thread exited without a reason (panicked?)")),
    }
}

/// Non-empty CLI lists replace the configured ones.
pub(crate) fn apply_filter_overrides(
    mut params: StreamFilterParams,
    args: FilterArgs,
) -> StreamFilterParams {
    let pairs = [
        (&mut params.expansions, args.expansions),
        (&mut params.media_fields, args.media_fields),
        (&mut params.place_fields, args.place_fields),
        (&mut params.poll_fields, args.poll_fields),
        (&mut params.tweet_fields, args.tweet_fields),
        (&mut params.user_fields, args.user_fields),
    ];
    for (slot, value) in pairs {
        if !value.is_empty() {
            *slot = value;
        }
    }
    params
}

/// One output line per message: the tweet id (or `-`) and matched rule tags,
/// or the whole message as JSON.
pub(crate) fn format_message(msg: &StreamData, json: bool) -> String {
    if json {
        return serde_json::to_string(msg).unwrap_or_else(|e| format!("<unprintable: {}>", e));
    }
    let id = msg.tweet.as_ref().map(|t| t.id.as_str()).unwrap_or("-");
    let tags: Vec<&str> = msg
        .matching_rules
        .iter()
        .map(|r| if r.tag.is_empty() { r.id.as_str() } else { r.tag.as_str() })
        .collect();
    if tags.is_empty() {
        id.to_string()
    } else {
        format!("{} [{}]", id, tags.join(","))
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
