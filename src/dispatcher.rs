//! Command dispatch
//!
//! Takes the raw command-line tokens, establishes the gateway (explicit
//! `-gw <ipv4> <mac>` override or discovery), resolves the target bulbs and
//! runs the command against them. The gateway connection is released exactly
//! once on every path out, including a panic inside the command.

use std::io::Write;
use std::net::Ipv4Addr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::commands::DeviceCommand;
use crate::device::{GatewayLink, MacAddress};
use crate::directory::DeviceDirectory;
use crate::error::{LifxError, LifxResult};
use crate::interrupt::{CancellationFlag, InterruptController, DEFAULT_POLL_INTERVAL};
use crate::target::{self, TargetSpecifier};
use crate::validation;

/// Flag that introduces an explicit gateway
pub const GATEWAY_OVERRIDE_FLAG: &str = "-gw";

/// Message written when no gateway answers discovery
pub const NO_GATEWAY_MESSAGE: &str = "Could not discover a gateway bulb!";

/// Explicit gateway coordinates taken from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayOverride {
    pub addr: Ipv4Addr,
    pub mac: MacAddress,
}

/// Split `-gw <ipv4> <mac>` off the token stream.
///
/// The override sits right after the command name. Anything that does not
/// match exactly (missing tokens, bad address) leaves the tokens alone and
/// the gateway is discovered instead.
pub fn split_gateway_override(args: &[String]) -> (Option<GatewayOverride>, Vec<String>) {
    if let [command, flag, addr, mac, rest @ ..] = args {
        if flag == GATEWAY_OVERRIDE_FLAG {
            match (validation::parse_ipv4_address(addr), validation::parse_mac_address(mac)) {
                (Ok(addr), Ok(mac)) => {
                    let mut remaining = Vec::with_capacity(rest.len() + 1);
                    remaining.push(command.clone());
                    remaining.extend(rest.iter().cloned());
                    return (Some(GatewayOverride { addr, mac }), remaining);
                }
                (addr, mac) => {
                    debug!(
                        "Ignoring gateway override (address ok: {}, mac ok: {})",
                        addr.is_ok(),
                        mac.is_ok()
                    );
                }
            }
        }
    }
    (None, args.to_vec())
}

/// Runs commands against the bulbs the arguments select
pub struct CommandDispatcher {
    directory: Arc<dyn DeviceDirectory>,
    poll_interval: Duration,
}

impl CommandDispatcher {
    pub fn new(directory: Arc<dyn DeviceDirectory>) -> Self {
        Self {
            directory,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Execute `command` for `args` (`args[0]` is the command name).
    ///
    /// Returns `Ok(false)` when there are too few tokens to name a target;
    /// no gateway is contacted in that case. `GatewayUnreachable` is
    /// returned after the diagnostic has been written to `out`.
    pub async fn execute(
        &self,
        command: &dyn DeviceCommand,
        args: &[String],
        out: &mut (dyn Write + Send),
    ) -> LifxResult<bool> {
        if args.len() < 2 {
            return Ok(false);
        }

        let (gateway_override, args) = split_gateway_override(args);
        let Some((target_token, command_args)) = args.get(1..).and_then(|rest| rest.split_first()) else {
            return Ok(false);
        };

        let gateway = match self.acquire_gateway(gateway_override).await? {
            Some(gateway) => gateway,
            None => {
                writeln!(out, "{}", NO_GATEWAY_MESSAGE)?;
                return Err(LifxError::GatewayUnreachable);
            }
        };
        info!("Using gateway bulb {} at {}", gateway.mac(), gateway.addr());

        let specifier = TargetSpecifier::parse(target_token);
        let outcome = AssertUnwindSafe(self.run(command, &gateway, &specifier, command_args, out))
            .catch_unwind()
            .await;

        let released = gateway.disconnect().await;
        debug!("Released gateway bulb {}", gateway.mac());

        match outcome {
            Ok(Ok(result)) => {
                released?;
                Ok(result)
            }
            Ok(Err(e)) => {
                if let Err(release_err) = released {
                    warn!("Failed to release gateway after error: {}", release_err);
                }
                Err(e)
            }
            Err(panic) => {
                if let Err(release_err) = released {
                    warn!("Failed to release gateway after panic: {}", release_err);
                }
                std::panic::resume_unwind(panic)
            }
        }
    }

    async fn acquire_gateway(
        &self,
        gateway_override: Option<GatewayOverride>,
    ) -> LifxResult<Option<Arc<dyn GatewayLink>>> {
        match gateway_override {
            Some(GatewayOverride { addr, mac }) => {
                debug!("Gateway override {} {}", addr, mac);
                self.directory.open_gateway(addr, mac).await.map(Some)
            }
            None => {
                debug!("Discovering gateway bulb");
                self.directory.discover_gateway().await
            }
        }
    }

    async fn run(
        &self,
        command: &dyn DeviceCommand,
        gateway: &Arc<dyn GatewayLink>,
        specifier: &TargetSpecifier,
        command_args: &[String],
        out: &mut (dyn Write + Send),
    ) -> LifxResult<bool> {
        let devices = target::resolve_targets(self.directory.as_ref(), gateway, specifier).await?;
        debug!("Resolved {} device(s)", devices.len());

        let interrupts = InterruptController::new(CancellationFlag::new()).with_poll_interval(self.poll_interval);
        command.execute(devices, command_args, out, &interrupts).await
    }
}
