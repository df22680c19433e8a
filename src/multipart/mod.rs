//! `multipart/mixed` encoding and decoding for OData `$batch` payloads.

mod builder;
mod encode;
mod parser;

pub use builder::{
    BoundaryStrategy, build, build_requests, build_with_strategy, generate_boundary,
};
pub use encode::encode_uri;
pub use parser::{ParseMode, decode_part, parse, parse_legacy, parse_parts, parse_strict};
