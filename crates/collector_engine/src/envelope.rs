//! Response envelope of the data.go.kr style JSON APIs.
//!
//! ```json
//! { "header": { "resultCode": "00", "resultMsg": "NORMAL SERVICE." },
//!   "body": { "totalCount": 2, "numOfRows": 100, "pageNo": 1,
//!             "items": [ { "item": { "PRDUCT": "..." } } ] } }
//! ```
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::{FailureKind, FetchError, ItemRecord};

/// Result code the API uses for success.
pub const SUCCESS_CODE: &str = "00";

#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    pub header: ApiHeader,
    #[serde(default)]
    pub body: Option<ApiBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiHeader {
    #[serde(rename = "resultCode")]
    pub result_code: String,
    #[serde(rename = "resultMsg", default)]
    pub result_msg: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiBody {
    #[serde(rename = "totalCount", deserialize_with = "count_field")]
    pub total_count: u64,
    #[serde(rename = "numOfRows", deserialize_with = "count_field")]
    pub num_of_rows: u64,
    #[serde(default)]
    pub items: Value,
}

/// A successfully decoded page with its item wrappers already unwrapped.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub total_count: u64,
    pub num_of_rows: u64,
    pub items: Vec<ItemRecord>,
}

impl ApiEnvelope {
    /// Checks the result code and unwraps the body into a [`Page`].
    pub fn into_page(self) -> Result<Page, FetchError> {
        if self.header.result_code != SUCCESS_CODE {
            return Err(FetchError::new(
                FailureKind::Api {
                    code: self.header.result_code,
                },
                self.header.result_msg,
            ));
        }
        let body = self
            .body
            .ok_or_else(|| FetchError::new(FailureKind::Decode, "response has no body"))?;
        let items = unwrap_items(body.items)?;
        Ok(Page {
            total_count: body.total_count,
            num_of_rows: body.num_of_rows,
            items,
        })
    }
}

/// Decodes a raw response body into a [`Page`].
pub fn decode_page(bytes: &[u8]) -> Result<Page, FetchError> {
    let envelope: ApiEnvelope = serde_json::from_slice(bytes)
        .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;
    envelope.into_page()
}

/// Unwraps `[{"item": {...}}, ...]` into the inner records.
///
/// An empty page may arrive as `null`, `""` or a missing field. Some services
/// nest the list once more as `{"item": [...]}` or `{"item": {...}}`.
fn unwrap_items(items: Value) -> Result<Vec<ItemRecord>, FetchError> {
    match items {
        Value::Null => Ok(Vec::new()),
        Value::String(s) if s.trim().is_empty() => Ok(Vec::new()),
        Value::Array(wrappers) => wrappers
            .into_iter()
            .enumerate()
            .map(|(idx, wrapper)| unwrap_wrapper(idx, wrapper))
            .collect(),
        Value::Object(mut map) => match map.remove("item") {
            Some(Value::Array(records)) => records
                .into_iter()
                .enumerate()
                .map(|(idx, record)| into_record(idx, record))
                .collect(),
            Some(record) => Ok(vec![into_record(0, record)?]),
            None => Err(FetchError::new(
                FailureKind::Decode,
                "items object has no `item` field",
            )),
        },
        other => Err(FetchError::new(
            FailureKind::Decode,
            format!("unexpected items value: {other}"),
        )),
    }
}

fn unwrap_wrapper(idx: usize, wrapper: Value) -> Result<ItemRecord, FetchError> {
    match wrapper {
        Value::Object(mut map) => match map.remove("item") {
            Some(record) => into_record(idx, record),
            None => Err(FetchError::new(
                FailureKind::Decode,
                format!("item wrapper {idx} has no `item` field"),
            )),
        },
        _ => Err(FetchError::new(
            FailureKind::Decode,
            format!("item wrapper {idx} is not an object"),
        )),
    }
}

fn into_record(idx: usize, record: Value) -> Result<ItemRecord, FetchError> {
    match record {
        Value::Object(map) => Ok(map),
        _ => Err(FetchError::new(
            FailureKind::Decode,
            format!("item {idx} is not an object"),
        )),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CountRepr {
    Number(u64),
    Text(String),
}

/// Counts come back as numbers from most services and as strings from a few.
fn count_field<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match CountRepr::deserialize(deserializer)? {
        CountRepr::Number(n) => Ok(n),
        CountRepr::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
