use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Characters `encodeURI` escapes on top of controls and non-ASCII bytes.
/// Reserved URI delimiters (`;,/?:@&=+$#`) and the unreserved marks pass
/// through untouched.
const URI_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

pub fn encode_uri(url: &str) -> String {
    utf8_percent_encode(url, URI_ENCODE_SET).to_string()
}
