//! # Command Targets
//!
//! Maps the first post-command token onto the bulbs a command applies to:
//! * `all` - every bulb the gateway can reach (case-insensitive).
//! * `gateway` - the gateway bulb itself (case-insensitive).
//! * a MAC address - a single bulb behind the gateway, no lookup needed.
//! * anything else - a bulb label, looked up through the directory.

use std::sync::Arc;

use tracing::debug;

use crate::device::{Device, GatewayLink, MacAddress, Peripheral};
use crate::directory::DeviceDirectory;
use crate::error::{LifxError, LifxResult};
use crate::validation;

/// Which bulbs a command should run against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpecifier {
    All,
    Gateway,
    Mac(MacAddress),
    Name(String),
}

impl TargetSpecifier {
    /// Classify a token. Never fails: unknown text is treated as a label.
    pub fn parse(token: &str) -> Self {
        if token.eq_ignore_ascii_case("all") {
            return TargetSpecifier::All;
        }
        if token.eq_ignore_ascii_case("gateway") {
            return TargetSpecifier::Gateway;
        }
        match validation::parse_mac_address(token) {
            Ok(mac) => TargetSpecifier::Mac(mac),
            Err(_) => TargetSpecifier::Name(token.to_string()),
        }
    }
}

/// Resolves a specifier into the concrete device set.
pub async fn resolve_targets(
    directory: &dyn DeviceDirectory,
    gateway: &Arc<dyn GatewayLink>,
    specifier: &TargetSpecifier,
) -> LifxResult<Vec<Device>> {
    debug!("Resolving target {:?} through gateway {}", specifier, gateway.mac());

    match specifier {
        TargetSpecifier::All => directory
            .discover_all_devices(gateway)
            .await
            .map_err(|e| LifxError::Resolution(e.to_string())),
        TargetSpecifier::Gateway => Ok(vec![Device::Gateway(Arc::clone(gateway))]),
        TargetSpecifier::Mac(mac) => Ok(vec![Device::Peripheral(Peripheral::new(
            *mac,
            Arc::clone(gateway),
        ))]),
        TargetSpecifier::Name(name) => directory
            .discover_by_name(gateway, name)
            .await
            .map_err(|e| LifxError::Resolution(e.to_string()))?
            .map(|device| vec![device])
            .ok_or_else(|| LifxError::DeviceNotFound(name.clone())),
    }
}
