//! Composite locator parsing (§4.1, §6).
//!
//! Grammar (bit-exact):
//!
//! ```text
//! <scheme>:<proxy-tag>[H1:P1(,H2:P2)*(>PROFILE)?]_<downstream-locator>
//! ```
//!
//! Examples:
//!   `jdbc:ojp[localhost:1059]_h2:mem:test`
//!   `jdbc:ojp[a:1059,b:1059>fast]_postgresql://x/y`

use once_cell::sync::Lazy;
use regex::Regex;

use crate::endpoint::{Endpoint, EndpointSet};
use crate::error::{LocatorError, OjpError};

const DEFAULT_PROFILE: &str = "default";

/// Matches the bracketed portion: `ojp[...]`. The proxy tag itself
/// (`ojp`) is fixed by convention but kept as a named group so future
/// proxy tags don't require touching the regex shape.
static BRACKET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?P<tag>[A-Za-z0-9_]+)\[(?P<inner>[^\]]+)\]").unwrap());

/// Parses the endpoint list out of a composite locator.
///
/// Returns at least one endpoint on success, in original (insertion)
/// order.
pub fn parse_endpoints(locator: &str) -> Result<EndpointSet, OjpError> {
    let inner = bracket_inner(locator)?;
    let (host_list, _profile) = split_profile(inner);

    let mut endpoints = Vec::new();
    for raw in host_list.split(',') {
        let entry = raw.trim();
        if entry.is_empty() {
            // Empty entries between commas are skipped.
            continue;
        }
        endpoints.push(parse_host_port(entry)?);
    }

    EndpointSet::new(endpoints).ok_or(OjpError::InvalidLocator(LocatorError::EmptyEndpointList))
}

/// Extracts the downstream database locator: the original input with the
/// `<proxy-tag>[...]_` prefix removed exactly once.
pub fn extract_downstream_url(locator: &str) -> Result<String, OjpError> {
    let m = BRACKET_RE
        .find(locator)
        .ok_or(OjpError::InvalidLocator(LocatorError::MalformedPattern))?;

    let after_bracket = &locator[m.end()..];
    let rest = after_bracket
        .strip_prefix('_')
        .ok_or(OjpError::InvalidLocator(LocatorError::MalformedPattern))?;

    // The scheme before the proxy tag (e.g. "jdbc:") belongs to the
    // composite locator, not the downstream one.
    Ok(rest.to_string())
}

/// Extracts the optional pool-profile name (`>name` inside the brackets).
/// Returns the literal `"default"` when absent.
pub fn extract_pool_profile(locator: &str) -> Result<String, OjpError> {
    let inner = bracket_inner(locator)?;
    let (_hosts, profile) = split_profile(inner);
    Ok(profile.unwrap_or_else(|| DEFAULT_PROFILE.to_string()))
}

fn bracket_inner(locator: &str) -> Result<&str, OjpError> {
    let caps = BRACKET_RE
        .captures(locator)
        .ok_or(OjpError::InvalidLocator(LocatorError::MalformedPattern))?;
    let inner = caps
        .name("inner")
        .ok_or(OjpError::InvalidLocator(LocatorError::MalformedPattern))?
        .as_str();
    Ok(match_in_original(locator, inner))
}

/// `Regex::captures` borrows from the haystack, so this just exists to
/// make that borrow explicit and documented at the call site rather than
/// relying on lifetime inference alone.
fn match_in_original<'a>(_locator: &'a str, inner: &'a str) -> &'a str {
    inner
}

fn split_profile(inner: &str) -> (&str, Option<String>) {
    match inner.rsplit_once('>') {
        Some((hosts, profile)) if !profile.is_empty() => (hosts, Some(profile.to_string())),
        _ => (inner, None),
    }
}

fn parse_host_port(entry: &str) -> Result<Endpoint, OjpError> {
    let (host, port_str) = entry
        .rsplit_once(':')
        .ok_or(OjpError::InvalidLocator(LocatorError::MissingColon(
            entry.to_string(),
        )))?;

    if host.is_empty() {
        return Err(OjpError::InvalidLocator(LocatorError::MissingColon(
            entry.to_string(),
        )));
    }

    let port: u32 = port_str
        .parse()
        .map_err(|_| OjpError::InvalidLocator(LocatorError::NonNumericPort(entry.to_string())))?;

    if port == 0 || port > 65535 {
        return Err(OjpError::InvalidLocator(LocatorError::PortOutOfRange(
            entry.to_string(),
        )));
    }

    Ok(Endpoint::new(host, port as u16))
}
