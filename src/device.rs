//! Addressable LIFX devices
//!
//! A gateway bulb owns the LAN connection; every other bulb is a peripheral
//! reached by relaying through that gateway.

use crate::error::{LifxError, LifxResult};
use crate::validation;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::Arc;

/// 6-byte hardware address of a bulb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}", a, b, c, d, e, g)
    }
}

impl FromStr for MacAddress {
    type Err = LifxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validation::parse_mac_address(s)
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Connection to a gateway bulb
///
/// Implementations own whatever transport relays commands to the bulbs
/// behind the gateway. The dispatcher calls `disconnect` exactly once per
/// invocation; the link must not be used afterwards.
#[async_trait]
pub trait GatewayLink: Send + Sync + fmt::Debug {
    /// Hardware address of the gateway bulb
    fn mac(&self) -> MacAddress;

    /// Network address of the gateway bulb
    fn addr(&self) -> Ipv4Addr;

    /// Release the connection
    async fn disconnect(&self) -> LifxResult<()>;
}

/// Bulb reached through a gateway
#[derive(Debug, Clone)]
pub struct Peripheral {
    mac: MacAddress,
    label: Option<String>,
    gateway: Arc<dyn GatewayLink>,
}

impl Peripheral {
    pub fn new(mac: MacAddress, gateway: Arc<dyn GatewayLink>) -> Self {
        Self {
            mac,
            label: None,
            gateway,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn gateway(&self) -> &Arc<dyn GatewayLink> {
        &self.gateway
    }
}

/// Device kind, as shown to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Gateway,
    Peripheral,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Gateway => write!(f, "gateway"),
            DeviceKind::Peripheral => write!(f, "peripheral"),
        }
    }
}

/// A command target
#[derive(Debug, Clone)]
pub enum Device {
    Gateway(Arc<dyn GatewayLink>),
    Peripheral(Peripheral),
}

impl Device {
    pub fn mac(&self) -> MacAddress {
        match self {
            Device::Gateway(gateway) => gateway.mac(),
            Device::Peripheral(peripheral) => peripheral.mac(),
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Device::Gateway(_) => None,
            Device::Peripheral(peripheral) => peripheral.label(),
        }
    }

    pub fn kind(&self) -> DeviceKind {
        match self {
            Device::Gateway(_) => DeviceKind::Gateway,
            Device::Peripheral(_) => DeviceKind::Peripheral,
        }
    }

    /// Gateway the device's traffic goes through (itself, for a gateway)
    pub fn gateway(&self) -> &Arc<dyn GatewayLink> {
        match self {
            Device::Gateway(gateway) => gateway,
            Device::Peripheral(peripheral) => peripheral.gateway(),
        }
    }

    pub fn summary(&self) -> DeviceSummary {
        DeviceSummary {
            mac: self.mac(),
            label: self.label().map(str::to_string),
            kind: self.kind(),
            gateway: self.gateway().addr(),
        }
    }
}

/// Serializable snapshot of a device, used for output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSummary {
    pub mac: MacAddress,
    pub label: Option<String>,
    pub kind: DeviceKind,
    pub gateway: Ipv4Addr,
}
