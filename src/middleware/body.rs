//! Request body parsing stages.
//!
//! Two instances of the same layer run back to back in the pipeline: one for
//! JSON bodies and one for URL-encoded form bodies. A stage only touches
//! requests whose `Content-Type` it understands; everything else passes
//! through untouched.
//!
//! The parsed value is stored as [`ParsedBody`] in the request extensions and
//! the buffered bytes are put back, so `axum::Json` and friends still work in
//! handlers.
//!
//! # Rules
//!
//! - JSON: `application/json` and `application/*+json`. An empty body parses to
//!   `{}`. Only objects and arrays are accepted at the top level.
//! - Form: `application/x-www-form-urlencoded`, flat keys only
//!   (`a[b]=1` stays the literal key `a[b]`). Repeated keys collect into an array.
//! - Bodies larger than the configured limit are rejected with 413.

use std::convert::Infallible;
use std::error::Error as StdError;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{Request, Response, header};
use axum::response::IntoResponse;
use http_body_util::LengthLimitError;
use serde_json::{Map, Value};
use tower::{Layer, Service};
use tracing::debug;

use crate::error::{AppError, AppResult};

/// Body formats understood by [`BodyParserLayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    UrlEncoded,
}

impl BodyFormat {
    /// Whether a `Content-Type` value selects this format.
    pub fn matches(self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match self {
            BodyFormat::Json => {
                essence == "application/json"
                    || (essence.starts_with("application/") && essence.ends_with("+json"))
            }
            BodyFormat::UrlEncoded => essence == "application/x-www-form-urlencoded",
        }
    }

    /// Parse a buffered body.
    pub fn parse(self, bytes: &[u8]) -> AppResult<Value> {
        match self {
            BodyFormat::Json => parse_json(bytes),
            BodyFormat::UrlEncoded => parse_urlencoded(bytes),
        }
    }

    fn applies_to<B>(self, req: &Request<B>) -> bool {
        req.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| self.matches(ct))
    }
}

/// The parsed request body.
///
/// Extracting it never fails: requests without a parsed body yield an empty
/// object.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody(pub Value);

impl ParsedBody {
    pub fn empty() -> Self {
        Self(Value::Object(Map::new()))
    }

    /// A top-level field, if present.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

impl Default for ParsedBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl<S> FromRequestParts<S> for ParsedBody
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<ParsedBody>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Body parsing layer for one [`BodyFormat`].
#[derive(Debug, Clone, Copy)]
pub struct BodyParserLayer {
    format: BodyFormat,
    limit: usize,
}

impl BodyParserLayer {
    pub fn json(limit: usize) -> Self {
        Self {
            format: BodyFormat::Json,
            limit,
        }
    }

    pub fn urlencoded(limit: usize) -> Self {
        Self {
            format: BodyFormat::UrlEncoded,
            limit,
        }
    }
}

impl<S> Layer<S> for BodyParserLayer {
    type Service = BodyParserService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BodyParserService {
            inner,
            format: self.format,
            limit: self.limit,
        }
    }
}

/// Body parsing service wrapper.
#[derive(Clone)]
pub struct BodyParserService<S> {
    inner: S,
    format: BodyFormat,
    limit: usize,
}

impl<S> Service<Request<Body>> for BodyParserService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let format = self.format;
        let limit = self.limit;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            // An earlier parser already consumed the body
            if req.extensions().get::<ParsedBody>().is_some() || !format.applies_to(&req) {
                return inner.call(req).await;
            }

            let (mut parts, body) = req.into_parts();

            if declared_length(&parts).is_some_and(|len| len > limit) {
                return Ok(AppError::PayloadTooLarge.into_response());
            }

            let bytes = match read_limited(body, limit).await {
                Ok(bytes) => bytes,
                Err(e) => return Ok(e.into_response()),
            };

            let parsed = match format.parse(&bytes) {
                Ok(value) => value,
                Err(e) => return Ok(e.into_response()),
            };

            debug!(format = ?format, bytes = bytes.len(), "Parsed request body");
            parts.extensions.insert(ParsedBody(parsed));

            inner.call(Request::from_parts(parts, Body::from(bytes))).await
        })
    }
}

fn declared_length(parts: &Parts) -> Option<usize> {
    parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

async fn read_limited(body: Body, limit: usize) -> AppResult<Bytes> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        if is_length_limit(&e) {
            AppError::PayloadTooLarge
        } else {
            AppError::BodyParse(format!("Failed to read request body: {e}"))
        }
    })
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err as &(dyn StdError + 'static));
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

fn parse_json(bytes: &[u8]) -> AppResult<Value> {
    if bytes.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    match bytes
        .iter()
        .find(|b| !matches!(**b, b' ' | b'\t' | b'\n' | b'\r'))
    {
        Some(b'{') | Some(b'[') => serde_json::from_slice(bytes)
            .map_err(|e| AppError::BodyParse(format!("Malformed JSON in request body: {e}"))),
        Some(_) | None => Err(AppError::BodyParse(
            "JSON body must be an object or an array".to_string(),
        )),
    }
}

fn parse_urlencoded(bytes: &[u8]) -> AppResult<Value> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(bytes)
        .map_err(|e| AppError::BodyParse(format!("Malformed form body: {e}")))?;

    let mut map = Map::new();
    for (key, value) in pairs {
        match map.get_mut(&key) {
            Some(Value::Array(values)) => values.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
            None => {
                map.insert(key, Value::String(value));
            }
        }
    }

    Ok(Value::Object(map))
}
