use crate::config::{BatchConfig, TokenPolicy};
use crate::multipart::{self, BoundaryStrategy, ParseMode};
use crate::types::{BatchEnvelope, BatchRequest, BatchResultItem, ResponsePart};
use crate::utils::http::{
    apply_http_query_params, build_http_client, response_text_bounded, send_checked,
};
use crate::{BatchError, Result, csrf};

fn default_http_client(config: &BatchConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(config.timeout())
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Client for one OData service's `$batch` endpoint.
///
/// Holds no per-call state, so clones can run batches concurrently.
#[derive(Debug, Clone)]
pub struct BatchClient {
    http: reqwest::Client,
    config: BatchConfig,
}

impl BatchClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let config = BatchConfig::new(base_url);
        Self {
            http: default_http_client(&config),
            config,
        }
    }

    pub fn from_config(config: BatchConfig) -> Result<Self> {
        config.validate()?;
        let http = build_http_client(config.timeout(), &config.http_headers)?;
        Ok(Self { http, config })
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_parse_mode(mut self, parse_mode: ParseMode) -> Self {
        self.config.parse_mode = parse_mode;
        self
    }

    pub fn with_token_policy(mut self, token_policy: TokenPolicy) -> Self {
        self.config.token_policy = token_policy;
        self
    }

    pub fn with_boundary(mut self, boundary: BoundaryStrategy) -> Self {
        self.config.boundary = boundary;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn batch_url(&self) -> String {
        self.config.batch_url()
    }

    /// Fetches a CSRF token, sends one GET per url in a single `$batch` POST
    /// and returns the decoded parts in url order.
    pub async fn create_multipart_request<S: AsRef<str>>(
        &self,
        urls: &[S],
    ) -> Result<Vec<BatchResultItem>> {
        let requests = urls
            .iter()
            .map(|url| BatchRequest::get(url.as_ref()))
            .collect();
        self.send(requests).await
    }

    pub async fn send(&self, requests: Vec<BatchRequest>) -> Result<Vec<BatchResultItem>> {
        let (text, content_type) = self.round_trip(requests).await?;
        multipart::parse(&text, self.config.parse_mode, content_type.as_deref())
    }

    /// Like [`BatchClient::send`] but keeps each part's embedded status and
    /// headers. Always parses strictly.
    pub async fn execute(&self, requests: Vec<BatchRequest>) -> Result<Vec<ResponsePart>> {
        let (text, content_type) = self.round_trip(requests).await?;
        multipart::parse_parts(&text, content_type.as_deref())
    }

    pub async fn prepare(&self, requests: Vec<BatchRequest>) -> Result<BatchEnvelope> {
        if requests.is_empty() {
            return Err(BatchError::InvalidRequest(
                "at least one url is required".to_string(),
            ));
        }
        let token = csrf::fetch_token(
            &self.http,
            &self.config.base_url,
            &self.config.http_query_params,
            self.config.token_policy,
        )
        .await?;
        multipart::build_requests(
            requests,
            &token,
            multipart::generate_boundary(self.config.boundary),
        )
    }

    async fn round_trip(&self, requests: Vec<BatchRequest>) -> Result<(String, Option<String>)> {
        let envelope = self.prepare(requests).await?;
        let batch_url = self.batch_url();
        tracing::debug!(
            url = %batch_url,
            parts = envelope.requests.len(),
            bytes = envelope.options.body.len(),
            "sending batch"
        );

        let mut req = self.http.post(&batch_url);
        for (name, value) in &envelope.options.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        let req = apply_http_query_params(req, &self.config.http_query_params)
            .body(envelope.options.body);

        let response = send_checked(req).await.inspect_err(|err| {
            tracing::warn!(url = %batch_url, error = ?err, "batch request failed");
        })?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let text = response_text_bounded(response, self.config.max_response_bytes).await?;
        Ok((text, content_type))
    }
}

/// One-shot batch against `base_url` with default settings.
pub async fn create_multipart_request<S: AsRef<str>>(
    base_url: &str,
    urls: &[S],
) -> Result<Vec<BatchResultItem>> {
    BatchClient::new(base_url).create_multipart_request(urls).await
}
