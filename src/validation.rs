//! Address parsing and validation
//!
//! Pure helpers for the MAC and IPv4 tokens that appear on the command line.
//! The `is_valid_*` variants never fail; the `parse_*` variants report why a
//! token was rejected.

use crate::device::MacAddress;
use crate::error::{LifxError, LifxResult};
use std::net::Ipv4Addr;

/// Number of octets in a MAC address
const MAC_OCTETS: usize = 6;

/// Number of octets in an IPv4 address
const IPV4_OCTETS: usize = 4;

/// Parse a MAC address
///
/// Accepts `XX:XX:XX:XX:XX:XX` or `XX-XX-XX-XX-XX-XX` (hex digits, either
/// case). Mixing separators is rejected.
pub fn parse_mac_address(mac: &str) -> LifxResult<MacAddress> {
    let separator = if mac.contains(':') { ':' } else { '-' };

    let parts: Vec<&str> = mac.split(separator).collect();
    if parts.len() != MAC_OCTETS {
        return Err(LifxError::InvalidAddress(format!(
            "MAC address must have 6 octets separated by ':' or '-': {}",
            mac
        )));
    }

    let mut octets = [0u8; MAC_OCTETS];
    for (octet, part) in octets.iter_mut().zip(parts) {
        if part.len() != 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(LifxError::InvalidAddress(format!(
                "Each MAC address octet must be 2 hex digits: {}",
                mac
            )));
        }
        *octet = u8::from_str_radix(part, 16)
            .map_err(|_| LifxError::InvalidAddress(format!("Invalid hex digit in MAC address: {}", part)))?;
    }

    Ok(MacAddress::new(octets))
}

/// Check whether a token is a MAC address
pub fn is_valid_mac_address(mac: &str) -> bool {
    parse_mac_address(mac).is_ok()
}

/// Parse an IPv4 address
///
/// Exactly four decimal octets in `0..=255` joined by dots.
pub fn parse_ipv4_address(addr: &str) -> LifxResult<Ipv4Addr> {
    let parts: Vec<&str> = addr.split('.').collect();
    if parts.len() != IPV4_OCTETS {
        return Err(LifxError::InvalidAddress(format!(
            "IPv4 address must have 4 octets: {}",
            addr
        )));
    }

    let mut octets = [0u8; IPV4_OCTETS];
    for (octet, part) in octets.iter_mut().zip(parts) {
        // u8::from_str accepts a leading '+', which is not a valid octet
        if part.is_empty() || part.len() > 3 || !part.chars().all(|c| c.is_ascii_digit()) {
            return Err(LifxError::InvalidAddress(format!(
                "Invalid IPv4 octet '{}' in {}",
                part, addr
            )));
        }
        *octet = part.parse::<u8>().map_err(|_| {
            LifxError::InvalidAddress(format!("IPv4 octet out of range '{}' in {}", part, addr))
        })?;
    }

    Ok(Ipv4Addr::from(octets))
}

/// Check whether a token is an IPv4 address
pub fn is_valid_ipv4_address(addr: &str) -> bool {
    parse_ipv4_address(addr).is_ok()
}
