use std::collections::BTreeMap;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::{BatchError, Result};

const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

pub(crate) fn header_map_from_pairs(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut out = HeaderMap::new();
    for (name, value) in headers {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
            BatchError::InvalidRequest(format!("invalid http header name {name:?}: {err}"))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|err| {
            BatchError::InvalidRequest(format!(
                "invalid http header value for {name:?} (value={value:?}): {err}"
            ))
        })?;
        out.insert(header_name, header_value);
    }
    Ok(out)
}

pub(crate) fn build_http_client(
    timeout: Duration,
    headers: &BTreeMap<String, String>,
) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if !headers.is_empty() {
        builder = builder.default_headers(header_map_from_pairs(headers)?);
    }
    builder.build().map_err(BatchError::Http)
}

pub(crate) fn apply_http_query_params(
    mut req: reqwest::RequestBuilder,
    params: &BTreeMap<String, String>,
) -> reqwest::RequestBuilder {
    for (name, value) in params {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        req = req.query(&[(name, value)]);
    }
    req
}

/// Reads at most `max_bytes` of the body; the flag reports whether more was
/// left unread.
async fn response_bytes_truncated(
    response: reqwest::Response,
    max_bytes: usize,
) -> Result<(Vec<u8>, bool)> {
    let max_bytes = max_bytes.max(1);
    let mut out = Vec::<u8>::new();
    let mut stream = response.bytes_stream();
    while let Some(next) = stream.next().await {
        let chunk = next?;
        let remaining = max_bytes.saturating_sub(out.len());
        if chunk.len() > remaining {
            out.extend_from_slice(&chunk[..remaining]);
            return Ok((out, true));
        }
        out.extend_from_slice(&chunk);
    }
    Ok((out, false))
}

pub(crate) async fn response_text_bounded(
    response: reqwest::Response,
    max_bytes: usize,
) -> Result<String> {
    let (bytes, truncated) = response_bytes_truncated(response, max_bytes).await?;
    if truncated {
        return Err(BatchError::Parse(format!(
            "response exceeded max bytes ({max_bytes})"
        )));
    }
    String::from_utf8(bytes)
        .map_err(|err| BatchError::Parse(format!("response body is not utf-8: {err}")))
}

/// Sends `req` and maps any non-success status to [`BatchError::Transport`],
/// keeping a bounded copy of the error body for diagnostics.
pub(crate) async fn send_checked(req: reqwest::RequestBuilder) -> Result<reqwest::Response> {
    let response = req.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = match response_bytes_truncated(response, MAX_ERROR_BODY_BYTES).await {
            Ok((bytes, truncated)) => {
                let mut body = String::from_utf8_lossy(&bytes).to_string();
                if truncated {
                    body.push_str("\n...(truncated)");
                }
                body
            }
            Err(_) => String::new(),
        };
        return Err(BatchError::Transport { status, body });
    }
    Ok(response)
}
