//! Inventory-backed device directory
//!
//! Answers discovery from the `[gateway]` and `[[devices]]` tables of the
//! configuration file instead of broadcasting on the LAN. The gateway link is
//! a UDP socket connected to the gateway bulb.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::{DeviceEntry, LifxConfig, NameMatch, DEFAULT_LIFX_PORT};
use crate::device::{Device, GatewayLink, MacAddress, Peripheral};
use crate::directory::DeviceDirectory;
use crate::error::{LifxError, LifxResult};

/// UDP connection to a gateway bulb
#[derive(Debug)]
pub struct UdpGatewayLink {
    mac: MacAddress,
    peer: SocketAddrV4,
    socket: Mutex<Option<UdpSocket>>,
}

impl UdpGatewayLink {
    /// Bind an ephemeral local port and connect it to the gateway
    pub async fn connect(addr: Ipv4Addr, port: u16, mac: MacAddress) -> LifxResult<Self> {
        let peer = SocketAddrV4::new(addr, port);
        let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))).await?;
        socket.connect(peer).await?;
        info!("Connected to gateway bulb {} at {}", mac, peer);

        Ok(Self {
            mac,
            peer,
            socket: Mutex::new(Some(socket)),
        })
    }

    pub fn peer(&self) -> SocketAddrV4 {
        self.peer
    }

    pub async fn is_connected(&self) -> bool {
        self.socket.lock().await.is_some()
    }
}

#[async_trait]
impl GatewayLink for UdpGatewayLink {
    fn mac(&self) -> MacAddress {
        self.mac
    }

    fn addr(&self) -> Ipv4Addr {
        *self.peer.ip()
    }

    async fn disconnect(&self) -> LifxResult<()> {
        match self.socket.lock().await.take() {
            Some(socket) => {
                drop(socket);
                debug!("Disconnected from gateway bulb {}", self.mac);
                Ok(())
            }
            None => Err(LifxError::InvalidState(format!(
                "gateway {} already disconnected",
                self.mac
            ))),
        }
    }
}

/// Directory answering from the configuration inventory
#[derive(Debug, Clone)]
pub struct InventoryDirectory {
    config: LifxConfig,
}

impl InventoryDirectory {
    pub fn new(config: LifxConfig) -> Self {
        Self { config }
    }

    fn device(entry: &DeviceEntry, gateway: &Arc<dyn GatewayLink>) -> Device {
        if entry.mac == gateway.mac() {
            return Device::Gateway(Arc::clone(gateway));
        }
        Device::Peripheral(Peripheral::new(entry.mac, Arc::clone(gateway)).with_label(entry.name.clone()))
    }

    fn name_match(&self) -> NameMatch {
        self.config.defaults.name_match
    }
}

#[async_trait]
impl DeviceDirectory for InventoryDirectory {
    async fn discover_gateway(&self) -> LifxResult<Option<Arc<dyn GatewayLink>>> {
        let Some(entry) = &self.config.gateway else {
            debug!("No gateway bulb in inventory");
            return Ok(None);
        };

        let link: Arc<dyn GatewayLink> =
            Arc::new(UdpGatewayLink::connect(entry.addr, entry.port, entry.mac).await?);
        Ok(Some(link))
    }

    async fn open_gateway(&self, addr: Ipv4Addr, mac: MacAddress) -> LifxResult<Arc<dyn GatewayLink>> {
        let port = self
            .config
            .gateway
            .as_ref()
            .filter(|entry| entry.mac == mac)
            .map_or(DEFAULT_LIFX_PORT, |entry| entry.port);

        let link: Arc<dyn GatewayLink> = Arc::new(UdpGatewayLink::connect(addr, port, mac).await?);
        Ok(link)
    }

    async fn discover_all_devices(&self, gateway: &Arc<dyn GatewayLink>) -> LifxResult<Vec<Device>> {
        // The gateway is a bulb too and always reports as one, listed or not
        let mut devices = Vec::with_capacity(self.config.devices.len() + 1);
        devices.push(Device::Gateway(Arc::clone(gateway)));
        devices.extend(
            self.config
                .devices
                .iter()
                .filter(|entry| entry.mac != gateway.mac())
                .map(|entry| Self::device(entry, gateway)),
        );
        Ok(devices)
    }

    async fn discover_by_name(
        &self,
        gateway: &Arc<dyn GatewayLink>,
        name: &str,
    ) -> LifxResult<Option<Device>> {
        let name_match = self.name_match();
        Ok(self
            .config
            .devices
            .iter()
            .find(|entry| name_match.matches(&entry.name, name))
            .map(|entry| Self::device(entry, gateway)))
    }
}
