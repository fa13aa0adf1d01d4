//! Inline `data:` URL decoding. These never touch the network.

use base64::Engine;
use tabula_traits::{FetchedResource, ResourceError};

/// Decodes `data:[<mediatype>][;base64],<data>` into bytes.
pub fn decode_data_url(url: &str) -> Result<FetchedResource, ResourceError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| ResourceError::InvalidUrl(format!("not a data URL: {}", url)))?;

    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| ResourceError::InvalidUrl("data URL is missing ','".to_string()))?;

    let is_base64 = header.split(';').any(|part| part.eq_ignore_ascii_case("base64"));
    let media_type = header
        .split(';')
        .next()
        .filter(|s| s.contains('/'))
        .map(str::to_string);

    let bytes = if is_base64 {
        // Tolerate whitespace introduced by line-wrapped exports.
        let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| ResourceError::DecodeFailure {
                url: truncate(url),
                message: format!("invalid base64: {}", e),
            })?
    } else {
        percent_decode(data).ok_or_else(|| ResourceError::DecodeFailure {
            url: truncate(url),
            message: "invalid percent-escape".to_string(),
        })?
    };

    Ok(FetchedResource::new(bytes, media_type))
}

fn percent_decode(input: &str) -> Option<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(out)
}

fn truncate(url: &str) -> String {
    url.chars().take(64).collect()
}
