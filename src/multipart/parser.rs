use serde::{Deserialize, Serialize};

use crate::types::{APPLICATION_HTTP, APPLICATION_JSON, BatchResultItem, ResponsePart};
use crate::{BatchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// Tokenizes on boundary lines and decodes each embedded HTTP response.
    #[default]
    Strict,
    /// Line scan where the last seen `Content-Type:` carries over to later
    /// parts. Kept for comparing against older `$batch` consumers.
    Legacy,
}

/// Decodes a multipart `$batch` response into one item per part, in body
/// order. `content_type` is the response's `Content-Type` header, used by
/// strict mode to find the boundary.
pub fn parse(
    raw: &str,
    mode: ParseMode,
    content_type: Option<&str>,
) -> Result<Vec<BatchResultItem>> {
    match mode {
        ParseMode::Strict => parse_strict(raw, content_type),
        ParseMode::Legacy => parse_legacy(raw),
    }
}

pub fn parse_legacy(raw: &str) -> Result<Vec<BatchResultItem>> {
    let lines: Vec<&str> = raw.split("\r\n").filter(|line| !line.is_empty()).collect();
    let mut out = Vec::new();
    let Some(delimiter) = lines.first().copied() else {
        return Ok(out);
    };

    let mut content_type_value = "";
    for pair in lines[1..].windows(2) {
        let (line, next) = (pair[0], pair[1]);
        if let Some(value) = line.strip_prefix("Content-Type:") {
            content_type_value = value.trim();
        }
        if next.contains(delimiter) {
            if content_type_value == APPLICATION_JSON {
                out.push(BatchResultItem::Json(serde_json::from_str(line)?));
            } else {
                out.push(BatchResultItem::Text(line.to_string()));
            }
        }
    }
    Ok(out)
}

pub fn parse_strict(raw: &str, content_type: Option<&str>) -> Result<Vec<BatchResultItem>> {
    parse_parts(raw, content_type)?
        .into_iter()
        .map(decode_part)
        .collect()
}

/// Splits a multipart response into parts. Nested change set responses
/// (`multipart/mixed` parts) are flattened in place.
pub fn parse_parts(raw: &str, content_type: Option<&str>) -> Result<Vec<ResponsePart>> {
    let boundary = match content_type.and_then(multipart_boundary) {
        Some(boundary) => boundary,
        None => boundary_from_body(raw)?,
    };
    let mut parts = Vec::new();
    split_parts(raw, &boundary, &mut parts)?;
    Ok(parts)
}

pub fn decode_part(part: ResponsePart) -> Result<BatchResultItem> {
    let body = part.body.trim_end_matches(['\r', '\n']);
    if body.trim().is_empty() {
        return Ok(BatchResultItem::Text(String::new()));
    }
    let content_type = if part.status.is_some() {
        part.header("Content-Type")
    } else {
        part.part_header("Content-Type")
    };
    let Some(content_type) = content_type else {
        return Err(BatchError::Parse(
            "response part has a body but no Content-Type".to_string(),
        ));
    };
    if is_json_media_type(content_type) {
        Ok(BatchResultItem::Json(serde_json::from_str(body)?))
    } else {
        Ok(BatchResultItem::Text(body.to_string()))
    }
}

fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_json_media_type(content_type: &str) -> bool {
    let essence = media_type(content_type);
    essence == APPLICATION_JSON || essence.ends_with("+json")
}

fn multipart_boundary(content_type: &str) -> Option<String> {
    for part in content_type.split(';').map(str::trim) {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        if !key.trim().eq_ignore_ascii_case("boundary") {
            continue;
        }
        let value = value.trim();
        let unquoted = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        if !unquoted.trim().is_empty() {
            return Some(unquoted.to_string());
        }
    }
    None
}

fn boundary_from_body(raw: &str) -> Result<String> {
    raw.lines()
        .map(|line| line.trim_end_matches('\r'))
        .find(|line| !line.trim().is_empty())
        .and_then(|line| line.strip_prefix("--"))
        .map(|boundary| boundary.trim_end().to_string())
        .filter(|boundary| !boundary.is_empty())
        .ok_or_else(|| {
            BatchError::Parse("response body does not start with a boundary".to_string())
        })
}

fn split_parts(raw: &str, boundary: &str, out: &mut Vec<ResponsePart>) -> Result<()> {
    let marker = format!("--{boundary}");
    let delimiter = format!("\n{marker}");

    let Some(start) = raw.find(&marker) else {
        return Err(BatchError::Parse(format!(
            "response body missing boundary marker {marker:?}"
        )));
    };
    let mut cursor = start + marker.len();

    loop {
        let rest = &raw[cursor..];
        if rest.starts_with("--") {
            return Ok(());
        }
        let rest = skip_line_break(rest);
        cursor = raw.len() - rest.len();

        let Some(rel) = rest.find(&delimiter) else {
            return Err(BatchError::Parse(
                "response part missing trailing boundary".to_string(),
            ));
        };
        let data = rest[..rel].strip_suffix('\r').unwrap_or(&rest[..rel]);
        cursor += rel + delimiter.len();

        let (header_block, content) = split_head(data);
        let part_headers = parse_headers(header_block)?;
        let part_type = single_header(&part_headers, "Content-Type")?.map(media_type);

        match part_type.as_deref() {
            Some(APPLICATION_HTTP) => out.push(parse_embedded_response(part_headers, content)?),
            Some("multipart/mixed") => {
                let nested = single_header(&part_headers, "Content-Type")?
                    .and_then(multipart_boundary)
                    .map_or_else(|| boundary_from_body(content), Ok)?;
                split_parts(content, &nested, out)?;
            }
            _ => out.push(ResponsePart {
                part_headers,
                status: None,
                headers: Vec::new(),
                body: content.to_string(),
            }),
        }
    }
}

fn skip_line_break(text: &str) -> &str {
    text.strip_prefix("\r\n")
        .or_else(|| text.strip_prefix('\n'))
        .unwrap_or(text)
}

/// Splits at the first blank line. Without one, everything is head.
fn split_head(data: &str) -> (&str, &str) {
    if let Some(idx) = data.find("\r\n\r\n") {
        (&data[..idx], &data[idx + 4..])
    } else if let Some(idx) = data.find("\n\n") {
        (&data[..idx], &data[idx + 2..])
    } else {
        (data, "")
    }
}

fn parse_headers(block: &str) -> Result<Vec<(String, String)>> {
    let mut headers = Vec::new();
    for line in block.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            return Err(BatchError::Parse(format!("malformed header line {line:?}")));
        };
        headers.push((key.trim().to_string(), value.trim().to_string()));
    }
    Ok(headers)
}

fn single_header<'a>(headers: &'a [(String, String)], name: &str) -> Result<Option<&'a str>> {
    let mut found = None;
    for (key, value) in headers {
        if !key.eq_ignore_ascii_case(name) {
            continue;
        }
        if found.is_some() {
            return Err(BatchError::Parse(format!(
                "duplicate {name} header in response part"
            )));
        }
        found = Some(value.as_str());
    }
    Ok(found)
}

fn parse_embedded_response(
    part_headers: Vec<(String, String)>,
    content: &str,
) -> Result<ResponsePart> {
    let content = content.trim_start_matches(['\r', '\n']);
    let (head, body) = split_head(content);
    let (status_line, header_block) = match head.split_once('\n') {
        Some((status_line, rest)) => (status_line.trim_end_matches('\r'), rest),
        None => (head.trim_end_matches('\r'), ""),
    };

    let status = status_line
        .strip_prefix("HTTP/")
        .and_then(|rest| rest.split_whitespace().nth(1))
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| BatchError::Parse(format!("malformed status line {status_line:?}")))?;

    let headers = parse_headers(header_block)?;
    single_header(&headers, "Content-Type")?;

    Ok(ResponsePart {
        part_headers,
        status: Some(status),
        headers,
        body: body.to_string(),
    })
}
