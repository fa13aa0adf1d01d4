//! Resource URL normalization.
//!
//! Absolute, `data:` and `blob:` URLs are kept byte-for-byte so callers can
//! correlate keys with what they asked for; relative paths are resolved
//! against the configured base.

use tabula_traits::ResourceError;
use tabula_types::ResourceKey;
use url::Url;

/// Parses a base URL, making sure it is treated as a directory so that
/// `join` appends rather than replacing the last path segment.
pub fn parse_base_url(raw: &str) -> Result<Url, ResourceError> {
    let mut base = Url::parse(raw.trim())
        .map_err(|e| ResourceError::InvalidUrl(format!("base URL '{}': {}", raw, e)))?;
    if base.cannot_be_a_base() {
        return Err(ResourceError::InvalidUrl(format!(
            "base URL '{}' cannot carry relative paths",
            raw
        )));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

/// Produces the cache key for a requested resource.
pub fn normalize_url(raw: &str, base: Option<&Url>) -> Result<ResourceKey, ResourceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ResourceError::InvalidUrl("empty resource URL".to_string()));
    }
    if trimmed.starts_with("data:") || trimmed.starts_with("blob:") || is_absolute(trimmed) {
        return Ok(ResourceKey::from(trimmed));
    }

    let base = base.ok_or_else(|| {
        ResourceError::InvalidUrl(format!(
            "relative resource '{}' requested but no base URL is configured",
            trimmed
        ))
    })?;
    base.join(trimmed)
        .map(|url| ResourceKey::from(String::from(url)))
        .map_err(|e| ResourceError::InvalidUrl(format!("'{}': {}", trimmed, e)))
}

fn is_absolute(raw: &str) -> bool {
    Url::parse(raw).is_ok()
}
