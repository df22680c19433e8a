use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::types::{
    APPLICATION_HTTP, BatchEnvelope, BatchRequest, CONTENT_TYPE, CSRF_TOKEN_HEADER,
    EnvelopeOptions, HttpMethod,
};
use crate::{BatchError, Result};

const BOUNDARY_RANDOM_BYTES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryStrategy {
    /// `batch_<32 hex chars>` from the OS random source.
    #[default]
    Random,
    /// `batch_id_<epoch-ms>_01`, the form older `$batch` clients emit.
    Timestamp,
}

pub fn generate_boundary(strategy: BoundaryStrategy) -> String {
    match strategy {
        BoundaryStrategy::Random => {
            let mut bytes = [0u8; BOUNDARY_RANDOM_BYTES];
            if getrandom::fill(&mut bytes).is_err() {
                tracing::warn!("random source unavailable, using timestamp boundary");
                return timestamp_boundary();
            }
            format!("batch_{}", hex_encode(&bytes))
        }
        BoundaryStrategy::Timestamp => timestamp_boundary(),
    }
}

fn timestamp_boundary() -> String {
    let ts_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0);
    format!("batch_id_{ts_ms}_01")
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}

/// Packs read-only GETs for `urls` into one envelope with a fresh random
/// boundary. An empty `token` leaves the CSRF header off.
pub fn build<S: AsRef<str>>(urls: &[S], token: &str) -> Result<BatchEnvelope> {
    build_with_strategy(urls, token, BoundaryStrategy::default())
}

pub fn build_with_strategy<S: AsRef<str>>(
    urls: &[S],
    token: &str,
    strategy: BoundaryStrategy,
) -> Result<BatchEnvelope> {
    let requests = urls
        .iter()
        .map(|url| BatchRequest::get(url.as_ref()))
        .collect();
    build_requests(requests, token, generate_boundary(strategy))
}

pub fn build_requests(
    requests: Vec<BatchRequest>,
    token: &str,
    boundary: String,
) -> Result<BatchEnvelope> {
    if requests.is_empty() {
        return Err(BatchError::InvalidRequest(
            "at least one url is required".to_string(),
        ));
    }
    validate_boundary(&boundary)?;

    let mut body = String::new();
    for request in &requests {
        validate_request(request, &boundary)?;
        write_part(&mut body, request, &boundary);
    }
    let _ = write!(body, "--{boundary}--\r\n");

    let mut headers = BTreeMap::new();
    headers.insert(
        CONTENT_TYPE.to_string(),
        format!("multipart/mixed;boundary={boundary}"),
    );
    if !token.is_empty() {
        headers.insert(CSRF_TOKEN_HEADER.to_string(), token.to_string());
    }

    Ok(BatchEnvelope {
        requests,
        boundary,
        options: EnvelopeOptions {
            method: HttpMethod::Post,
            headers,
            body,
        },
    })
}

fn write_part(out: &mut String, request: &BatchRequest, boundary: &str) {
    let _ = write!(
        out,
        "--{boundary}\r\n{CONTENT_TYPE}: {APPLICATION_HTTP}\r\nContent-Transfer-Encoding: binary\r\n\r\n"
    );
    let _ = write!(out, "{} {} HTTP/1.1\r\n", request.method, request.url);
    for (name, value) in &request.headers {
        let _ = write!(out, "{name}: {value}\r\n");
    }
    out.push_str("\r\n");
    if let Some(body) = request.body.as_deref() {
        out.push_str(body);
    }
    out.push_str("\r\n");
}

fn validate_boundary(boundary: &str) -> Result<()> {
    // RFC 2046: 1-70 characters, no trailing space.
    let valid = !boundary.is_empty()
        && boundary.len() <= 70
        && !boundary.ends_with(' ')
        && boundary.bytes().all(|b| b.is_ascii_graphic() || b == b' ');
    if valid {
        Ok(())
    } else {
        Err(BatchError::InvalidRequest(format!(
            "invalid multipart boundary {boundary:?}"
        )))
    }
}

fn validate_request(request: &BatchRequest, boundary: &str) -> Result<()> {
    if request.url.is_empty() || request.url.bytes().any(|b| b.is_ascii_whitespace()) {
        return Err(BatchError::InvalidRequest(format!(
            "sub-request url {:?} must be non-empty and percent-encoded",
            request.url
        )));
    }
    for (name, value) in &request.headers {
        let bad_name =
            name.is_empty() || name.bytes().any(|b| !b.is_ascii_graphic() || b == b':');
        if bad_name || value.contains(['\r', '\n']) {
            return Err(BatchError::InvalidRequest(format!(
                "invalid sub-request header {name:?}"
            )));
        }
    }
    if let Some(body) = request.body.as_deref() {
        if body.contains(&format!("--{boundary}")) {
            return Err(BatchError::InvalidRequest(
                "sub-request body contains the multipart boundary".to_string(),
            ));
        }
    }
    Ok(())
}
