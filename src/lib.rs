//! lifxctl - LIFX LAN Control Library
//!
//! Command-line plumbing for controlling LIFX bulbs through a gateway bulb:
//! - MAC / IPv4 address parsing
//! - Target resolution (`all`, `gateway`, a MAC address or a bulb label)
//! - Command dispatch with guaranteed gateway release
//! - Cooperative interruption (ENTER key or timer) for long-running commands
//!
//! Discovery and the wire protocol sit behind the `DeviceDirectory` and
//! `GatewayLink` traits.

pub mod error;
pub mod validation;
pub mod device;
pub mod directory;
pub mod target;
pub mod interrupt;
pub mod commands;
pub mod dispatcher;
pub mod config;
pub mod inventory;

// Re-export commonly used types
pub use error::{LifxError, LifxResult};
pub use device::{Device, DeviceKind, DeviceSummary, GatewayLink, MacAddress, Peripheral};
pub use directory::DeviceDirectory;
pub use target::{resolve_targets, TargetSpecifier};
pub use interrupt::{CancellationFlag, InterruptController, WatcherHandle};
pub use commands::{command_for, DeviceCommand, ListCommand, StatusCommand, WatchCommand};
pub use dispatcher::{CommandDispatcher, GatewayOverride};
pub use config::LifxConfig;
pub use inventory::{InventoryDirectory, UdpGatewayLink};
