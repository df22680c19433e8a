use std::collections::BTreeMap;

use crate::config::TokenPolicy;
use crate::types::CSRF_TOKEN_HEADER;
use crate::utils::http::apply_http_query_params;
use crate::{BatchError, Result};

pub const TOKEN_FETCH_FAILED: &str = "Cannot fetch X-CSRF-Token.";

/// Asks the service for an anti-forgery token with a bodiless HEAD request.
///
/// Under [`TokenPolicy::Optional`] a refused or token-less answer yields an
/// empty token; transport failures abort under either policy.
#[tracing::instrument(level = "debug", skip(http, query_params))]
pub async fn fetch_token(
    http: &reqwest::Client,
    base_url: &str,
    query_params: &BTreeMap<String, String>,
    policy: TokenPolicy,
) -> Result<String> {
    let req = http.head(base_url).header(CSRF_TOKEN_HEADER, "Fetch");
    let response = apply_http_query_params(req, query_params)
        .send()
        .await
        .map_err(|err| BatchError::TokenFetch(err.to_string()))?;

    let status = response.status();
    let token = response
        .headers()
        .get(CSRF_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match (status.is_success(), token) {
        (true, Some(token)) => {
            tracing::debug!(%status, "fetched csrf token");
            Ok(token.to_string())
        }
        _ if policy == TokenPolicy::Optional => {
            tracing::debug!(%status, "no csrf token offered, continuing without one");
            Ok(String::new())
        }
        _ => {
            tracing::warn!(%status, "csrf token fetch failed");
            Err(BatchError::TokenFetch(TOKEN_FETCH_FAILED.to_string()))
        }
    }
}
