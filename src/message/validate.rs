//! Address syntax validation.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::MessageError;

/// Loose address shape: local part, `@`, domain with at least one dot.
/// Deliberately permissive — deliverability is the transport's problem.
static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Check a single address against the syntax pattern.
pub fn is_valid_address(address: &str) -> bool {
    EMAIL_REGEX.is_match(address)
}

/// Validate one named address field, producing a typed error on failure.
pub fn check_address(field: &str, address: &str) -> Result<(), MessageError> {
    if is_valid_address(address) {
        Ok(())
    } else {
        Err(MessageError::InvalidAddress {
            field: field.to_string(),
            address: address.to_string(),
        })
    }
}

/// Validate every non-empty entry of an address list field.
pub fn check_addresses(field: &str, addresses: &[String]) -> Result<(), MessageError> {
    for address in addresses.iter().filter(|a| !a.is_empty()) {
        check_address(field, address)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_address() {
        assert!(is_valid_address("alice@example.com"));
    }

    #[test]
    fn accepts_subdomain_and_plus_tag() {
        assert!(is_valid_address("bob+tag@mail.example.co.uk"));
    }

    #[test]
    fn rejects_missing_at() {
        assert!(!is_valid_address("alice.example.com"));
    }

    #[test]
    fn rejects_missing_domain_dot() {
        assert!(!is_valid_address("alice@localhost"));
    }

    #[test]
    fn rejects_embedded_whitespace() {
        assert!(!is_valid_address("alice smith@example.com"));
        assert!(!is_valid_address("alice@exa mple.com"));
    }

    #[test]
    fn rejects_empty() {
        assert!(!is_valid_address(""));
    }

    #[test]
    fn check_address_reports_field() {
        let err = check_address("from", "not-an-address").unwrap_err();
        match err {
            MessageError::InvalidAddress { field, address } => {
                assert_eq!(field, "from");
                assert_eq!(address, "not-an-address");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn check_addresses_skips_empty_entries() {
        let addrs = vec![String::new(), "carol@example.com".into()];
        assert!(check_addresses("cc", &addrs).is_ok());
    }

    #[test]
    fn check_addresses_fails_on_bad_entry() {
        let addrs = vec!["good@example.com".into(), "bad".into()];
        assert!(check_addresses("to", &addrs).is_err());
    }
}
