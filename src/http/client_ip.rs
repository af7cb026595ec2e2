//! Client IP extraction from proxy headers.

use axum::http::HeaderMap;

/// Identifier used when no header names the client.
pub const UNKNOWN_IP: &str = "unknown-ip";

/// Headers consulted, in priority order.
const CLIENT_IP_HEADERS: [&str; 6] = [
    "cf-connecting-ip",
    "x-real-ip",
    "x-forwarded-for",
    "x-client-ip",
    "forwarded",
    "true-client-ip",
];

/// Extract the client identifier from request headers.
///
/// The first non-empty header in [`CLIENT_IP_HEADERS`] order wins. For
/// `x-forwarded-for` only the first hop (before the first comma) is used.
/// Falls back to [`UNKNOWN_IP`].
pub fn extract_client_ip(headers: &HeaderMap) -> String {
    for name in CLIENT_IP_HEADERS {
        let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };

        let value = if name == "x-forwarded-for" {
            value.split(',').next().unwrap_or_default()
        } else {
            value
        };

        let value = value.trim();
        if !value.is_empty() {
            return value.to_string();
        }
    }

    UNKNOWN_IP.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn test_cloudflare_wins() {
        let h = headers(&[
            ("true-client-ip", "6.6.6.6"),
            ("x-forwarded-for", "9.9.9.9"),
            ("x-real-ip", "5.6.7.8"),
            ("CF-Connecting-IP", "1.2.3.4"),
        ]);
        assert_eq!(extract_client_ip(&h), "1.2.3.4");
    }

    #[test]
    fn test_real_ip_before_forwarded_for() {
        let h = headers(&[("x-forwarded-for", "9.9.9.9"), ("X-Real-IP", "5.6.7.8")]);
        assert_eq!(extract_client_ip(&h), "5.6.7.8");
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let h = headers(&[("X-Forwarded-For", "203.0.113.195, 70.41.3.18, 150.172.238.178")]);
        assert_eq!(extract_client_ip(&h), "203.0.113.195");
    }

    #[test]
    fn test_remaining_order() {
        let h = headers(&[("true-client-ip", "3.3.3.3"), ("forwarded", "for=2.2.2.2"), ("x-client-ip", "1.1.1.1")]);
        assert_eq!(extract_client_ip(&h), "1.1.1.1");

        let h = headers(&[("true-client-ip", "3.3.3.3"), ("forwarded", "for=2.2.2.2")]);
        assert_eq!(extract_client_ip(&h), "for=2.2.2.2");

        let h = headers(&[("true-client-ip", "3.3.3.3")]);
        assert_eq!(extract_client_ip(&h), "3.3.3.3");
    }

    #[test]
    fn test_empty_value_is_skipped() {
        let h = headers(&[("cf-connecting-ip", "  "), ("x-real-ip", "5.6.7.8")]);
        assert_eq!(extract_client_ip(&h), "5.6.7.8");
    }

    #[test]
    fn test_ipv6() {
        let h = headers(&[("x-real-ip", "2001:db8::1")]);
        assert_eq!(extract_client_ip(&h), "2001:db8::1");
    }

    #[test]
    fn test_fallback() {
        assert_eq!(extract_client_ip(&HeaderMap::new()), "unknown-ip");
    }
}
