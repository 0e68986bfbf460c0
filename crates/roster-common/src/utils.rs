//! Utility functions for Roster

use std::sync::LazyLock;

use if_addrs::IfAddr;

/// Identifier pattern shared by service names and instance ids
static VALID_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new("^[a-zA-Z0-9_.:@-]*$").expect("Invalid regex pattern"));

/// Validate a string contains only identifier characters
///
/// Allowed characters: alphanumeric, underscore, dot, colon, at-sign, hyphen
///
/// # Examples
///
/// ```
/// use roster_common::is_valid;
///
/// assert!(is_valid("currency-exchange"));
/// assert!(is_valid("10.0.0.5:currency-exchange:8000"));
/// assert!(!is_valid("invalid/path"));
/// assert!(!is_valid("with spaces"));
/// ```
pub fn is_valid(str: &str) -> bool {
    VALID_PATTERN.is_match(str)
}

/// Get the local IP address
///
/// Returns the first non-loopback IPv4 address found,
/// or "127.0.0.1" as fallback.
pub fn local_ip() -> String {
    if_addrs::get_if_addrs()
        .ok()
        .and_then(|addrs| {
            addrs
                .into_iter()
                .find(|iface| !iface.is_loopback() && matches!(iface.addr, IfAddr::V4(_)))
                .and_then(|iface| match iface.addr {
                    IfAddr::V4(addr) => Some(addr.ip.to_string()),
                    _ => None,
                })
        })
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

/// Host and port of a base URL such as `http://registry-b:8762/roster`
///
/// The port falls back to the scheme default (443 for https, else 80).
/// IPv6 hosts are returned without brackets.
pub fn url_host_port(url: &str) -> Option<(String, u16)> {
    let (scheme, rest) = url.trim().split_once("://").unwrap_or(("http", url.trim()));
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);

    let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, tail) = bracketed.split_once(']')?;
        (host, tail.strip_prefix(':'))
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };
    if host.is_empty() {
        return None;
    }

    let port = match port {
        Some(port) => port.parse().ok()?,
        None if scheme.eq_ignore_ascii_case("https") => 443,
        None => 80,
    };
    Some((host.to_ascii_lowercase(), port))
}

/// Current wall-clock time in Unix epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_identifiers() {
        assert!(is_valid("exchange"));
        assert!(is_valid("CURRENCY-EXCHANGE"));
        assert!(is_valid("exchange_v2"));
        assert!(is_valid("host.example.com:exchange:8000"));
        assert!(is_valid("exchange@zone-a"));
    }

    #[test]
    fn test_is_valid_empty() {
        assert!(is_valid(""));
    }

    #[test]
    fn test_is_valid_invalid_chars() {
        assert!(!is_valid("exchange service"));
        assert!(!is_valid("exchange/8000"));
        assert!(!is_valid("exchange#8000"));
        assert!(!is_valid("exchange?x=1"));
    }

    #[test]
    fn test_local_ip_not_empty() {
        let ip = local_ip();
        assert!(!ip.is_empty());
        assert!(ip.parse::<std::net::Ipv4Addr>().is_ok());
    }

    #[test]
    fn test_url_host_port() {
        assert_eq!(
            url_host_port("http://Registry-B:8762/roster"),
            Some(("registry-b".to_string(), 8762))
        );
        assert_eq!(url_host_port("https://registry-b"), Some(("registry-b".to_string(), 443)));
        assert_eq!(url_host_port("http://10.0.0.5"), Some(("10.0.0.5".to_string(), 80)));
        assert_eq!(url_host_port("http://[::1]:8761/"), Some(("::1".to_string(), 8761)));
        assert_eq!(url_host_port("http://user@host:1"), Some(("host".to_string(), 1)));
        assert_eq!(url_host_port("registry-c:9000"), Some(("registry-c".to_string(), 9000)));
        assert_eq!(url_host_port("http://:8761"), None);
        assert_eq!(url_host_port("http://host:notaport"), None);
    }

    #[test]
    fn test_now_millis_is_positive() {
        assert!(now_millis() > 1_600_000_000_000);
    }
}
