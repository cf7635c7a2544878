//! Device directory capability
//!
//! Discovery and protocol framing live behind this trait. The dispatcher and
//! the target resolver only ever talk to a `dyn DeviceDirectory`.

use crate::device::{Device, GatewayLink, MacAddress};
use crate::error::LifxResult;
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::sync::Arc;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Find the first responding gateway bulb, or `None` if nobody answers
    async fn discover_gateway(&self) -> LifxResult<Option<Arc<dyn GatewayLink>>>;

    /// Connect to a gateway at a known address without discovery
    async fn open_gateway(&self, addr: Ipv4Addr, mac: MacAddress) -> LifxResult<Arc<dyn GatewayLink>>;

    /// Enumerate every bulb reachable through the gateway
    async fn discover_all_devices(&self, gateway: &Arc<dyn GatewayLink>) -> LifxResult<Vec<Device>>;

    /// Look up a bulb by its label
    ///
    /// A missing bulb is `Ok(None)`; errors are reserved for transport failures.
    async fn discover_by_name(
        &self,
        gateway: &Arc<dyn GatewayLink>,
        name: &str,
    ) -> LifxResult<Option<Device>>;
}
