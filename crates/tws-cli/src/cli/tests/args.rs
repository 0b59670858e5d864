//! Tests for argument parsing.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_stream_defaults() {
    match parse(&["tws", "stream"]) {
        CliCommand::Stream {
            filter,
            endpoint,
            json,
        } => {
            assert!(filter.expansions.is_empty());
            assert!(filter.tweet_fields.is_empty());
            assert!(endpoint.is_none());
            assert!(!json);
        }
        _ => panic!("expected Stream"),
    }
}

#[test]
fn cli_parse_stream_field_lists() {
    match parse(&[
        "tws",
        "stream",
        "--expansions",
        "author_id,geo.place_id",
        "--tweet-fields",
        "created_at",
        "--user-fields",
        "username",
        "--endpoint",
        "http://127.0.0.1:8080/2/tweets/search",
        "--json",
    ]) {
        CliCommand::Stream {
            filter,
            endpoint,
            json,
        } => {
            assert_eq!(filter.expansions, vec!["author_id", "geo.place_id"]);
            assert_eq!(filter.tweet_fields, vec!["created_at"]);
            assert_eq!(filter.user_fields, vec!["username"]);
            assert!(filter.media_fields.is_empty());
            assert_eq!(
                endpoint.as_deref(),
                Some("http://127.0.0.1:8080/2/tweets/search")
            );
            assert!(json);
        }
        _ => panic!("expected Stream with lists"),
    }
}

#[test]
fn cli_parse_config_path() {
    match parse(&["tws", "config-path"]) {
        CliCommand::ConfigPath => {}
        _ => panic!("expected ConfigPath"),
    }
}

#[test]
fn cli_rejects_unknown_command() {
    assert!(Cli::try_parse_from(["tws", "serve"]).is_err());
}
