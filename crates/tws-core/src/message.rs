//! Stream message model and decoding.

use serde::{Deserialize, Deserializer, Serialize};

/// One decoded stream line: an optional tweet plus the rules it matched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamData {
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub tweet: Option<Tweet>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub matching_rules: Vec<MatchingRule>,
}

/// Primary payload object. Fields requested through `tweet.fields` and
/// friends beyond `id`/`text` are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingRule {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tag: String,
}

/// Explicit `null` decodes like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, thiserror::Error)]
#[error("malformed stream message: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// Decode one non-empty line.
pub fn decode(line: &[u8]) -> Result<StreamData, DecodeError> {
    Ok(serde_json::from_slice(line)?)
}
