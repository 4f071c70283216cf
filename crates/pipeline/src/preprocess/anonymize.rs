//! Scrub IP addresses and credentials from log text.
//!
//! Replacement is per-token and never touches line boundaries, so line
//! counts and ordering are unaffected.

use regex_lite::{Captures, Regex};
use std::borrow::Cow;
use std::net::Ipv6Addr;
use std::sync::LazyLock;

pub const IP_PLACEHOLDER: &str = "<ip>";
pub const SECRET_PLACEHOLDER: &str = "<redacted>";

static RE_IPV4: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\b")
        .unwrap()
});

/// Candidate IPv6 tokens; confirmed by parsing.
static RE_IPV6_CANDIDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9A-Za-z_:.]*:[0-9A-Za-z_:.]*").unwrap());

static RE_KEY_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\b(?:",
        r"(?:sk|pk|rk)-[A-Za-z0-9_-]{16,}",
        r"|gh[pousr]_[A-Za-z0-9]{20,}",
        r"|xox[abposr]-[A-Za-z0-9-]{10,}",
        r"|AKIA[0-9A-Z]{16}",
        r")",
    ))
    .unwrap()
});

static RE_BEARER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\bbearer\s+)[A-Za-z0-9._~+/=-]{8,}").unwrap());

static RE_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(\b(?:password|passwd|pwd|token|secret|api[_-]?key|access[_-]?key|client[_-]?secret)\s*[=:]\s*["']?)[^\s"',;&]+"#,
    )
    .unwrap()
});

static RE_LONG_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z0-9]{32,}\b").unwrap());

/// Replace IPv4 and IPv6 addresses with [`IP_PLACEHOLDER`].
pub fn anonymize_ips(text: &str) -> Cow<'_, str> {
    let v6 = RE_IPV6_CANDIDATE.replace_all(text, |caps: &Captures| {
        let token = &caps[0];
        if looks_like_ipv6(token) {
            IP_PLACEHOLDER.to_string()
        } else {
            token.to_string()
        }
    });
    owned_or(v6, |t| RE_IPV4.replace_all(t, IP_PLACEHOLDER))
}

/// Tokens like `std::io` or `add::` parse or nearly parse as IPv6, so a
/// candidate must contain a digit as well as parse.
fn looks_like_ipv6(token: &str) -> bool {
    let token = token.trim_matches('.');
    token.matches(':').count() >= 2
        && token.bytes().any(|b| b.is_ascii_digit())
        && token.parse::<Ipv6Addr>().is_ok()
}

/// Replace credential-shaped substrings with [`SECRET_PLACEHOLDER`].
pub fn anonymize_secrets(text: &str) -> Cow<'_, str> {
    let s = RE_KEY_PREFIX.replace_all(text, SECRET_PLACEHOLDER);
    let s = owned_or(s, |t| RE_BEARER.replace_all(t, "${1}<redacted>"));
    let s = owned_or(s, |t| RE_ASSIGNMENT.replace_all(t, "${1}<redacted>"));
    owned_or(s, |t| {
        RE_LONG_TOKEN.replace_all(t, |caps: &Captures| {
            let token = &caps[0];
            let has_alpha = token.bytes().any(|b| b.is_ascii_alphabetic());
            let has_digit = token.bytes().any(|b| b.is_ascii_digit());
            if has_alpha && has_digit {
                SECRET_PLACEHOLDER.to_string()
            } else {
                token.to_string()
            }
        })
    })
}

/// Chain a replacement step without giving up an earlier borrow.
fn owned_or<'a>(prev: Cow<'a, str>, step: impl Fn(&str) -> Cow<'_, str>) -> Cow<'a, str> {
    let next = match step(&prev) {
        Cow::Borrowed(_) => None,
        Cow::Owned(s) => Some(s),
    };
    match next {
        Some(s) => Cow::Owned(s),
        None => prev,
    }
}
