//! Input validation for registration requests
//!
//! Each function checks one field and reports a `ValidationError` whose code
//! names the failure, so callers can turn it into a `MalformedRegistration`.

use std::collections::HashMap;

use validator::ValidationError;

use crate::utils::is_valid;

/// Maximum length for service_name field
pub const MAX_SERVICE_NAME_LENGTH: usize = 256;

/// Maximum length for instance_id field
pub const MAX_INSTANCE_ID_LENGTH: usize = 256;

/// Maximum length for host field
pub const MAX_HOST_LENGTH: usize = 255;

/// Maximum number of metadata entries per instance
pub const MAX_METADATA_ENTRIES: usize = 64;

/// Maximum length for a metadata key
pub const MAX_METADATA_KEY_LENGTH: usize = 128;

/// Maximum length for a metadata value
pub const MAX_METADATA_VALUE_LENGTH: usize = 1024;

/// Longest lease a client may ask for (one day)
pub const MAX_LEASE_DURATION_SECS: u64 = 86_400;

/// Schemes a registration may declare
pub const SUPPORTED_SCHEMES: &[&str] = &["http", "https", "tcp", "grpc"];

/// Validate service_name format
///
/// Service name must:
/// - Not be empty
/// - Not exceed MAX_SERVICE_NAME_LENGTH characters
/// - Contain only identifier characters
pub fn validate_service_name(service_name: &str) -> Result<(), ValidationError> {
    if service_name.trim().is_empty() {
        return Err(ValidationError::new("service_name_empty"));
    }
    if service_name.len() > MAX_SERVICE_NAME_LENGTH {
        return Err(ValidationError::new("service_name_too_long"));
    }
    if !is_valid(service_name) {
        return Err(ValidationError::new("service_name_invalid_chars"));
    }
    Ok(())
}

/// Validate instance_id format
pub fn validate_instance_id(instance_id: &str) -> Result<(), ValidationError> {
    if instance_id.trim().is_empty() {
        return Err(ValidationError::new("instance_id_empty"));
    }
    if instance_id.len() > MAX_INSTANCE_ID_LENGTH {
        return Err(ValidationError::new("instance_id_too_long"));
    }
    if !is_valid(instance_id) {
        return Err(ValidationError::new("instance_id_invalid_chars"));
    }
    Ok(())
}

/// Validate host (hostname, IPv4 or IPv6 literal)
pub fn validate_host(host: &str) -> Result<(), ValidationError> {
    if host.trim().is_empty() {
        return Err(ValidationError::new("host_empty"));
    }
    if host.len() > MAX_HOST_LENGTH {
        return Err(ValidationError::new("host_too_long"));
    }
    if host.parse::<std::net::IpAddr>().is_ok() {
        return Ok(());
    }
    let hostname_ok = host
        .split('.')
        .all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        });
    if !hostname_ok {
        return Err(ValidationError::new("host_invalid"));
    }
    Ok(())
}

/// Validate port is inside 1..=65535
pub fn validate_port(port: i64) -> Result<(), ValidationError> {
    if !(1..=i64::from(u16::MAX)).contains(&port) {
        return Err(ValidationError::new("port_out_of_range"));
    }
    Ok(())
}

/// Validate scheme is one of SUPPORTED_SCHEMES
pub fn validate_scheme(scheme: &str) -> Result<(), ValidationError> {
    if !SUPPORTED_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str()) {
        return Err(ValidationError::new("scheme_unsupported"));
    }
    Ok(())
}

/// Validate a client-requested lease TTL is inside 1..=MAX_LEASE_DURATION_SECS
pub fn validate_lease_duration(secs: u64) -> Result<(), ValidationError> {
    if secs == 0 {
        return Err(ValidationError::new("lease_duration_zero"));
    }
    if secs > MAX_LEASE_DURATION_SECS {
        return Err(ValidationError::new("lease_duration_too_long"));
    }
    Ok(())
}

/// Validate metadata size limits
pub fn validate_metadata(metadata: &HashMap<String, String>) -> Result<(), ValidationError> {
    if metadata.len() > MAX_METADATA_ENTRIES {
        return Err(ValidationError::new("metadata_too_many_entries"));
    }
    for (key, value) in metadata {
        if key.trim().is_empty() {
            return Err(ValidationError::new("metadata_key_empty"));
        }
        if key.len() > MAX_METADATA_KEY_LENGTH {
            return Err(ValidationError::new("metadata_key_too_long"));
        }
        if value.len() > MAX_METADATA_VALUE_LENGTH {
            return Err(ValidationError::new("metadata_value_too_long"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_validate_service_name() {
        assert!(validate_service_name("currency-exchange").is_ok());
        assert!(validate_service_name("").is_err());
        assert!(validate_service_name("   ").is_err());
        assert!(validate_service_name("has space").is_err());
        assert!(validate_service_name(&"a".repeat(MAX_SERVICE_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_instance_id() {
        assert!(validate_instance_id("10.0.0.5:exchange:8000").is_ok());
        assert!(validate_instance_id("").is_err());
        assert_eq!(
            validate_instance_id("a/b").unwrap_err().code,
            "instance_id_invalid_chars"
        );
    }

    #[test]
    fn test_validate_host() {
        assert!(validate_host("localhost").is_ok());
        assert!(validate_host("10.0.0.5").is_ok());
        assert!(validate_host("::1").is_ok());
        assert!(validate_host("exchange.prod.internal").is_ok());
        assert!(validate_host("").is_err());
        assert!(validate_host("bad..host").is_err());
        assert!(validate_host("-leading.dash").is_err());
        assert!(validate_host("spa ce").is_err());
    }

    #[test]
    fn test_validate_port() {
        assert!(validate_port(8000).is_ok());
        assert!(validate_port(1).is_ok());
        assert!(validate_port(65535).is_ok());
        assert!(validate_port(0).is_err());
        assert!(validate_port(-1).is_err());
        assert!(validate_port(65536).is_err());
    }

    #[test]
    fn test_validate_scheme() {
        assert!(validate_scheme("http").is_ok());
        assert!(validate_scheme("HTTPS").is_ok());
        assert!(validate_scheme("ftp").is_err());
    }

    #[test]
    fn test_validate_lease_duration() {
        assert!(validate_lease_duration(30).is_ok());
        assert!(validate_lease_duration(MAX_LEASE_DURATION_SECS).is_ok());
        assert_eq!(
            validate_lease_duration(0).unwrap_err().code,
            "lease_duration_zero"
        );
        assert_eq!(
            validate_lease_duration(MAX_LEASE_DURATION_SECS + 1).unwrap_err().code,
            "lease_duration_too_long"
        );
        assert!(validate_lease_duration(u64::MAX).is_err());
    }

    #[test]
    fn test_validate_metadata() {
        let mut metadata = HashMap::new();
        metadata.insert("zone".to_string(), "a".to_string());
        assert!(validate_metadata(&metadata).is_ok());

        metadata.insert(String::new(), "x".to_string());
        assert_eq!(
            validate_metadata(&metadata).unwrap_err().code,
            "metadata_key_empty"
        );

        let too_many: HashMap<String, String> = (0..=MAX_METADATA_ENTRIES)
            .map(|i| (format!("k{}", i), "v".to_string()))
            .collect();
        assert!(validate_metadata(&too_many).is_err());
    }

    proptest! {
        #[test]
        fn prop_identifier_names_are_accepted(name in "[a-zA-Z0-9_.:@-]{1,64}") {
            prop_assume!(!name.trim().is_empty());
            prop_assert!(validate_service_name(&name).is_ok());
            prop_assert!(validate_instance_id(&name).is_ok());
        }

        #[test]
        fn prop_ports_in_range_are_accepted(port in 1i64..=65535) {
            prop_assert!(validate_port(port).is_ok());
        }

        #[test]
        fn prop_ports_out_of_range_are_rejected(port in prop_oneof![i64::MIN..1i64, 65536i64..i64::MAX]) {
            prop_assert!(validate_port(port).is_err());
        }
    }
}
