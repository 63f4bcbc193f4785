//! Logical key derivation from request headers.
use http::HeaderMap;

/// Key used when no client address can be derived.
pub const ANONYMOUS: &str = "anonymous";

/// How a request is mapped to the caller it is counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStrategy {
    /// Client address: `X-Forwarded-For` first hop, then `X-Real-IP`, then
    /// `CF-Connecting-IP`, then [`ANONYMOUS`].
    #[default]
    ClientIp,
    /// API key or bearer token, falling back to the client address.
    Principal,
}

impl KeyStrategy {
    pub fn key(self, headers: &HeaderMap) -> String {
        match self {
            KeyStrategy::ClientIp => client_ip(headers),
            KeyStrategy::Principal => principal(headers)
                .map(|p| format!("principal:{p}"))
                .unwrap_or_else(|| client_ip(headers)),
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Best-effort client address from proxy headers.
pub fn client_ip(headers: &HeaderMap) -> String {
    header(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header(headers, "x-real-ip"))
        .or_else(|| header(headers, "cf-connecting-ip"))
        .unwrap_or(ANONYMOUS)
        .to_string()
}

fn principal(headers: &HeaderMap) -> Option<&str> {
    header(headers, "x-api-key").or_else(|| {
        header(headers, "authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    })
}
