//! The response envelope translator.
//!
//! Every body leaving the service is wrapped in one canonical envelope:
//!
//! - success: `{"code": 200, "message": "success", "data": ..., "ts": <unix seconds>}`
//! - error: `{"code": <domain code>, "message": ...}`
//!
//! Success payloads that serialize to exactly one field are unwrapped: `data`
//! becomes the field's value directly instead of a one-key object. The
//! decision is made from the *serialized* field count: a payload whose type
//! has more fields but omits them during serialization still unwraps. This is
//! one-directional and lossy by design; clients must know the expected shape.
//!
//! Error responses decouple the domain code from the transport status: the
//! outer status is 200 whenever the domain code falls in the 100..600 band
//! (even for failure codes like 404; clients parse the body for the precise
//! code), and 500 otherwise. The body `code` field is preserved verbatim in
//! both cases.

use crate::web::codec::Codec;
use crate::web::error::ServiceError;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use warp::http::header::CONTENT_TYPE;
use warp::http::{HeaderValue, StatusCode};
use warp::reply::Response;

/// The canonical success envelope.
#[derive(Serialize, Debug)]
pub struct Envelope {
    pub code: i64,
    pub message: String,
    pub data: Value,
    pub ts: i64,
}

/// Encodes a success payload into an enveloped response.
///
/// Fails only if the codec cannot marshal the payload or the envelope; in
/// that case no bytes have been written and the caller should fall back to
/// [`internal_error_fallback`]. The response carries no explicit status, so
/// the transport default of 200 applies.
pub fn encode_success<T: Serialize>(codec: Codec, payload: &T) -> anyhow::Result<Response> {
    let payload_bytes = codec.marshal(payload)?;
    let serialized = codec.unmarshal_value(&payload_bytes)?;

    let envelope = Envelope {
        code: 200,
        message: "success".to_string(),
        data: unwrap_single_field(serialized),
        ts: Utc::now().timestamp(),
    };

    let body = codec.marshal(&envelope)?;
    let mut res = Response::new(body.into());
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(codec.content_type()));
    Ok(res)
}

/// Encodes a domain error into an enveloped response.
///
/// The outer status is 200 iff the domain code lies in `100..600`; anything
/// outside that band becomes 500 at the transport layer while the body keeps
/// the domain code verbatim. If the codec cannot marshal the body, the
/// response is a bodiless 500 (fail-closed, no partial envelope).
pub fn encode_error(codec: Codec, error: &ServiceError) -> Response {
    let body = match codec.marshal(error) {
        Ok(body) => body,
        Err(_) => return internal_error_fallback(),
    };

    let status = if (100..600).contains(&error.code) {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let mut res = Response::new(body.into());
    *res.status_mut() = status;
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(codec.content_type()));
    res
}

/// The minimal fallback when even the envelope cannot be serialized:
/// a bodiless 500.
pub fn internal_error_fallback() -> Response {
    let mut res = Response::new(warp::hyper::Body::empty());
    *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    res
}

/// Replaces a one-entry map with its single value; everything else passes
/// through unchanged.
fn unwrap_single_field(value: Value) -> Value {
    match value {
        Value::Object(map) if map.len() == 1 => {
            match map.into_iter().next() {
                Some((_, single)) => single,
                None => Value::Object(serde_json::Map::new()),
            }
        }
        other => other,
    }
}
