//! Cache key derivation
//!
//! A key is `"{width}_{height}_{digest}"` where `digest` is the hex SHA-256 of
//! the canonical origin URL. Canonicalisation makes equivalent locators share
//! one cache entry:
//!
//! - a leading `http:` / `https:` prefix and any leading slashes are dropped
//! - runs of `/` in the path collapse to one
//! - the scheme is fixed to `http`
//! - the host is lowercased and the default port of the stripped scheme
//!   (`80`, or `443` for `https:`) removed
//!
//! Keys contain only digits, `_` and lowercase hex, so they are safe file names.

use crate::transform::ResizeParams;
use crate::{Error, Result};
use reqwest::Url;
use sha2::{Digest, Sha256};

/// Scheme every canonical locator uses
pub const CANONICAL_SCHEME: &str = "http";

/// Canonicalise a raw resource locator taken from a request path.
///
/// # Errors
///
/// Returns [`Error::InvalidRequest`] if no host can be found or the result
/// does not parse as a URL.
pub fn canonicalize_locator(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let without_fragment = trimmed.split_once('#').map_or(trimmed, |(head, _)| head);
    let (location, query) = match without_fragment.split_once('?') {
        Some((location, query)) => (location, Some(query)),
        None => (without_fragment, None),
    };

    let (location, default_port) = strip_scheme(location);
    let location = collapse_slashes(location.trim_start_matches('/'));
    if location.is_empty() {
        return Err(Error::invalid_request("image URL is empty"));
    }

    let mut candidate = format!("{CANONICAL_SCHEME}://{location}");
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        candidate.push('?');
        candidate.push_str(query);
    }

    let mut url = Url::parse(&candidate)
        .map_err(|e| Error::invalid_request(format!("invalid image URL {raw:?}: {e}")))?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::invalid_request(format!(
            "image URL {raw:?} has no host"
        )));
    }
    // The parser only knows the default port of the canonical scheme
    if url.port() == Some(default_port) {
        url.set_port(None)
            .map_err(|()| Error::invalid_request(format!("invalid port in image URL {raw:?}")))?;
    }
    Ok(url)
}

/// Derive the cache key for a canonical locator.
#[must_use]
pub fn derive_key(params: ResizeParams, canonical: &Url) -> String {
    let digest = Sha256::digest(canonical.as_str().as_bytes());
    format!("{}_{}_{}", params.width, params.height, hex::encode(digest))
}

/// Canonicalise a locator and derive its key in one step.
///
/// # Errors
///
/// Propagates [`canonicalize_locator`] failures.
pub fn derive(params: ResizeParams, raw_locator: &str) -> Result<(String, Url)> {
    let url = canonicalize_locator(raw_locator)?;
    Ok((derive_key(params, &url), url))
}

/// Remove a leading scheme, returning the rest and that scheme's default port
fn strip_scheme(location: &str) -> (&str, u16) {
    for (scheme, port) in [("http:", 80), ("https:", 443)] {
        if location.len() >= scheme.len()
            && location.is_char_boundary(scheme.len())
            && location[..scheme.len()].eq_ignore_ascii_case(scheme)
        {
            return (&location[scheme.len()..], port);
        }
    }
    (location, 80)
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        out.push(c);
    }
    out
}
