//! Outbound stream request construction.
//!
//! The request is built once per session and reissued verbatim on every
//! reconnect.

use serde::{Deserialize, Serialize};
use url::Url;

/// Default filtered-stream endpoint; `/stream` is appended.
pub const DEFAULT_ENDPOINT: &str = "https://api.twitter.com/2/tweets/search";

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("endpoint URL cannot carry a path: {0}")]
    CannotBeABase(String),
}

/// Field and expansion selectors sent as comma-joined query parameters.
/// Empty lists are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFilterParams {
    #[serde(default)]
    pub expansions: Vec<String>,
    #[serde(default)]
    pub media_fields: Vec<String>,
    #[serde(default)]
    pub place_fields: Vec<String>,
    #[serde(default)]
    pub poll_fields: Vec<String>,
    #[serde(default)]
    pub tweet_fields: Vec<String>,
    #[serde(default)]
    pub user_fields: Vec<String>,
}

impl StreamFilterParams {
    /// Query pairs in a stable order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        [
            ("expansions", &self.expansions),
            ("media.fields", &self.media_fields),
            ("place.fields", &self.place_fields),
            ("poll.fields", &self.poll_fields),
            ("tweet.fields", &self.tweet_fields),
            ("user.fields", &self.user_fields),
        ]
        .into_iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(key, values)| (key, values.join(",")))
        .collect()
    }
}

/// Fully formed HTTP request, opaque to the retry controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl StreamRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// `GET {endpoint}/stream?{params}` with a bearer token.
pub fn build_stream_request(
    endpoint: &str,
    params: &StreamFilterParams,
    token: &str,
) -> Result<StreamRequest, RequestError> {
    let mut url = Url::parse(endpoint)?;
    url.path_segments_mut()
        .map_err(|_| RequestError::CannotBeABase(endpoint.to_string()))?
        .pop_if_empty()
        .push("stream");
    let pairs = params.query_pairs();
    if !pairs.is_empty() {
        let mut query = url.query_pairs_mut();
        for (key, value) in &pairs {
            query.append_pair(key, value);
        }
    }
    Ok(StreamRequest::get(url.as_str()).header("Authorization", format!("Bearer {}", token)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_default_request_without_query() {
        let req = build_stream_request(DEFAULT_ENDPOINT, &StreamFilterParams::default(), "tok")
            .unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.url, "https://api.twitter.com/2/tweets/search/stream");
        assert_eq!(
            req.headers,
            vec![("Authorization".to_string(), "Bearer tok".to_string())]
        );
    }

    #[test]
    fn encodes_lists_comma_joined_and_skips_empty() {
        let params = StreamFilterParams {
            expansions: vec!["author_id".into()],
            tweet_fields: vec!["created_at".into(), "lang".into()],
            ..Default::default()
        };
        let req = build_stream_request("http://127.0.0.1:9/2/tweets/search/", &params, "t").unwrap();
        assert_eq!(
            req.url,
            "http://127.0.0.1:9/2/tweets/search/stream?expansions=author_id&tweet.fields=created_at%2Clang"
        );
    }

    #[test]
    fn rejects_invalid_endpoint() {
        let err = build_stream_request("not a url", &StreamFilterParams::default(), "t");
        assert!(matches!(err, Err(RequestError::InvalidUrl(_))));
        let err = build_stream_request("mailto:x@example.com", &StreamFilterParams::default(), "t");
        assert!(matches!(err, Err(RequestError::CannotBeABase(_))));
    }
}
