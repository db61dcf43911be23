//! Strict JSON request decoding and enveloped JSON responses.
//!
//! Request bodies are capped at [`MAX_BODY_BYTES`], must hold exactly one JSON
//! value, and may not carry keys the destination type does not know about.
//! Responses are written as a key-ordered, tab-indented object followed by a
//! newline.

use std::collections::BTreeMap;

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Request},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{error::Category, ser::PrettyFormatter, Value};

use crate::error::AppError;

/// Largest request body accepted by [`JsonBody`].
pub const MAX_BODY_BYTES: usize = 256_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("the body contains badly-formed JSON (at character {offset})")]
    Syntax { offset: usize },
    #[error("the body contains badly-formed JSON")]
    UnexpectedEof,
    #[error("the body contains the incorrect JSON type for field {0:?}")]
    FieldType(String),
    #[error("the body contains the incorrect JSON type (at character {offset})")]
    Type { offset: usize },
    #[error("the body must not be empty")]
    Empty,
    #[error("the body must not be larger than {limit} bytes")]
    TooLarge { limit: usize },
    #[error("body contains unknown key {0:?}")]
    UnknownField(String),
    #[error("body must only contain a single JSON value")]
    TrailingContent,
    #[error("the body is invalid: {0}")]
    Invalid(String),
    #[error("the body could not be read")]
    Unreadable,
}

impl DecodeError {
    pub fn code(&self) -> &'static str {
        match self {
            DecodeError::Syntax { .. } | DecodeError::UnexpectedEof => "MALFORMED_JSON",
            DecodeError::FieldType(_) | DecodeError::Type { .. } => "INVALID_JSON_TYPE",
            DecodeError::Empty => "EMPTY_BODY",
            DecodeError::TooLarge { .. } => "BODY_TOO_LARGE",
            DecodeError::UnknownField(_) => "UNKNOWN_FIELD",
            DecodeError::TrailingContent => "TRAILING_CONTENT",
            DecodeError::Invalid(_) => "INVALID_BODY",
            DecodeError::Unreadable => "UNREADABLE_BODY",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DecodeError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Decodes exactly one JSON value of type `T` from `body`.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, DecodeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(DecodeError::Empty);
    }

    let mut de = serde_json::Deserializer::from_slice(body);
    let mut unknown: Option<String> = None;
    let mut on_ignored = |path: serde_ignored::Path<'_>| {
        if unknown.is_none() {
            unknown = Some(path.to_string());
        }
    };
    let result: Result<T, _> =
        serde_path_to_error::deserialize(serde_ignored::Deserializer::new(&mut de, &mut on_ignored));

    // Broken syntax and trailing data outrank an ignored key; an ignored key
    // outranks data errors such as a missing required field.
    let result = match result {
        Err(err) if is_malformed(&err) => return Err(classify(body, err)),
        Ok(value) => {
            de.end().map_err(|_| DecodeError::TrailingContent)?;
            Ok(value)
        }
        Err(err) => Err(err),
    };
    if let Some(field) = unknown {
        return Err(DecodeError::UnknownField(field));
    }
    result.map_err(|err| classify(body, err))
}

fn is_malformed(err: &serde_path_to_error::Error<serde_json::Error>) -> bool {
    matches!(err.inner().classify(), Category::Syntax | Category::Eof)
}

fn classify(body: &[u8], err: serde_path_to_error::Error<serde_json::Error>) -> DecodeError {
    let path = err.path().to_string();
    let inner = err.into_inner();
    match inner.classify() {
        Category::Syntax => DecodeError::Syntax { offset: byte_offset(body, inner.line(), inner.column()) },
        Category::Eof => DecodeError::UnexpectedEof,
        Category::Io => DecodeError::Unreadable,
        Category::Data => {
            let message = strip_position(&inner.to_string());
            if let Some(field) = unknown_field_name(&message) {
                return DecodeError::UnknownField(field);
            }
            let is_type_error = message.starts_with("invalid type")
                || message.starts_with("invalid value")
                || message.starts_with("invalid length");
            if !is_type_error {
                return DecodeError::Invalid(message);
            }
            if path.is_empty() || path == "." {
                DecodeError::Type { offset: byte_offset(body, inner.line(), inner.column()) }
            } else {
                DecodeError::FieldType(path)
            }
        }
    }
}

/// serde_json reports 1-based line and byte column; fold them into a byte offset.
fn byte_offset(body: &[u8], line: usize, column: usize) -> usize {
    let line_start: usize = body
        .split(|b| *b == b'\n')
        .take(line.saturating_sub(1))
        .map(|l| l.len() + 1)
        .sum();
    line_start + column
}

fn strip_position(message: &str) -> String {
    match message.rfind(" at line ") {
        Some(idx) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

/// Pulls `a` out of serde's "unknown field `a`, expected ..." message, which is
/// what types marked `deny_unknown_fields` produce.
fn unknown_field_name(message: &str) -> Option<String> {
    let rest = message.strip_prefix("unknown field `")?;
    let end = rest.find('`')?;
    Some(rest[..end].to_string())
}

/// Buffers a request body, refusing anything above `limit` bytes.
pub async fn read_body(body: Body, limit: usize) -> Result<Bytes, DecodeError> {
    axum::body::to_bytes(body, limit).await.map_err(|err| {
        if is_length_limit(&err) {
            DecodeError::TooLarge { limit }
        } else {
            tracing::debug!("failed to read request body: {}", err);
            DecodeError::Unreadable
        }
    })
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// Extractor that applies [`decode`] to a size-capped request body.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let bytes = read_body(req.into_body(), MAX_BODY_BYTES).await?;
        Ok(JsonBody(decode(&bytes)?))
    }
}

/// Top-level object of every JSON response. Keys serialize in sorted order.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Envelope(BTreeMap<String, Value>);

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `key`, serializing `value` into the envelope.
    pub fn with<T: Serialize + ?Sized>(mut self, key: &str, value: &T) -> Result<Self, serde_json::Error> {
        self.0.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }
}

/// Writes `envelope` with `status`, merging `headers` into the response.
pub fn write_json(status: StatusCode, envelope: &Envelope, headers: HeaderMap) -> Result<Response, serde_json::Error> {
    let mut buf = Vec::with_capacity(256);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"\t"));
    envelope.serialize(&mut ser)?;
    buf.push(b'\n');

    let mut response = (status, Body::from(buf)).into_response();
    let out = response.headers_mut();
    out.extend(headers);
    out.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}
