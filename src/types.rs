use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CSRF_TOKEN_HEADER: &str = "X-CSRF-Token";
pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_HTTP: &str = "application/http";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sub-request packed as a single part of a batch envelope.
///
/// `url` is written verbatim into the part's request line, so it must already
/// be percent-encoded. [`BatchRequest::get`] takes care of that for raw URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl BatchRequest {
    /// A read-only sub-request asking for a JSON payload.
    pub fn get(url: &str) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Accept".to_string(), APPLICATION_JSON.to_string());
        Self {
            url: crate::multipart::encode_uri(url),
            method: HttpMethod::Get,
            body: None,
            headers,
        }
    }

    pub fn new(method: HttpMethod, url: &str) -> Self {
        Self {
            method,
            ..Self::get(url)
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// The outer POST that physically carries a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeOptions {
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEnvelope {
    pub requests: Vec<BatchRequest>,
    pub boundary: String,
    pub options: EnvelopeOptions,
}

impl BatchEnvelope {
    pub fn content_type(&self) -> Option<&str> {
        self.options.headers.get(CONTENT_TYPE).map(String::as_str)
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.options
            .headers
            .get(CSRF_TOKEN_HEADER)
            .map(String::as_str)
    }
}

/// A decoded response part, positionally matched to its sub-request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchResultItem {
    Json(Value),
    Text(String),
}

impl BatchResultItem {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Json(_) => None,
            Self::Text(text) => Some(text),
        }
    }
}

/// One part of a multipart response, including the embedded HTTP response
/// when the part is `application/http`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponsePart {
    pub part_headers: Vec<(String, String)>,
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ResponsePart {
    pub fn part_header(&self, name: &str) -> Option<&str> {
        find_header(&self.part_headers, name)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_none_or(|status| (200..300).contains(&status))
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
