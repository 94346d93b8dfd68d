//! Text bodies: encoding `put_text` payloads and decoding `get_string` responses.

use bytes::Bytes;

use crate::webdav::error::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Charset {
    Utf8,
    Latin1,
    Ascii,
}

fn lookup(name: &str) -> Option<Charset> {
    match name.trim().trim_matches('"').to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => Some(Charset::Utf8),
        "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" => Some(Charset::Latin1),
        "us-ascii" | "ascii" => Some(Charset::Ascii),
        _ => None,
    }
}

/// Encode `text` in `charset`. Characters the charset cannot represent become `?`.
///
/// Returns `None` for an unsupported charset name.
pub fn encode_text(text: &str, charset: &str) -> Option<Bytes> {
    let limit = match lookup(charset)? {
        Charset::Utf8 => return Some(Bytes::copy_from_slice(text.as_bytes())),
        Charset::Latin1 => 0x100,
        Charset::Ascii => 0x80,
    };
    let encoded: Vec<u8> = text
        .chars()
        .map(|c| if (c as u32) < limit { c as u8 } else { b'?' })
        .collect();
    Some(Bytes::from(encoded))
}

/// The `charset` parameter of a `Content-Type` value, if any.
pub fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// Decode a response body using the charset of its `Content-Type`, UTF-8 when absent.
pub fn decode_text(body: &[u8], content_type: Option<&str>) -> Result<String, DecodeError> {
    let charset = content_type.and_then(charset_param).and_then(lookup);
    match charset {
        Some(Charset::Latin1) => Ok(body.iter().map(|b| char::from(*b)).collect()),
        _ => String::from_utf8(body.to_vec()).map_err(|_| DecodeError::InvalidText("UTF-8")),
    }
}
