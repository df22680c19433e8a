//! Client for OData `$batch` endpoints: fetches a CSRF token, packs many
//! sub-requests into one `multipart/mixed` POST and decodes the response
//! parts back in request order.

mod client;
mod config;
mod error;

pub mod csrf;
pub mod multipart;
pub mod types;
pub mod utils;

pub use client::{BatchClient, create_multipart_request};
pub use config::{BatchConfig, DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_TIMEOUT_SECS, TokenPolicy};
pub use error::{BatchError, Result};
pub use multipart::{BoundaryStrategy, ParseMode};
pub use types::{
    BatchEnvelope, BatchRequest, BatchResultItem, EnvelopeOptions, HttpMethod, ResponsePart,
};
