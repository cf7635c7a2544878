//! Per-device command operations
//!
//! The dispatcher resolves targets and owns the gateway; a [`DeviceCommand`]
//! only says what to do with the resolved bulbs.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;

use crate::device::Device;
use crate::error::LifxResult;
use crate::interrupt::InterruptController;

/// How often `watch` prints a fresh roll-call
const WATCH_REFRESH: Duration = Duration::from_secs(1);

/// Operation run against the resolved device set
///
/// `args` holds the tokens after the target specifier, uninterpreted.
/// Returning `Ok(false)` means the arguments were not understood.
#[async_trait]
pub trait DeviceCommand: Send + Sync {
    async fn execute(
        &self,
        devices: Vec<Device>,
        args: &[String],
        out: &mut (dyn Write + Send),
        interrupts: &InterruptController,
    ) -> LifxResult<bool>;
}

/// Names accepted by [`command_for`]
pub const COMMAND_NAMES: &[&str] = &["list", "status", "watch"];

/// Look up a bundled command by name (case-insensitive)
pub fn command_for(name: &str) -> Option<Box<dyn DeviceCommand>> {
    match name.to_ascii_lowercase().as_str() {
        "list" => Some(Box::new(ListCommand)),
        "status" => Some(Box::new(StatusCommand)),
        "watch" => Some(Box::new(WatchCommand)),
        _ => None,
    }
}

/// `list <target> [json]`
pub struct ListCommand;

#[async_trait]
impl DeviceCommand for ListCommand {
    async fn execute(
        &self,
        devices: Vec<Device>,
        args: &[String],
        out: &mut (dyn Write + Send),
        _interrupts: &InterruptController,
    ) -> LifxResult<bool> {
        match args.first().map(String::as_str) {
            None => {
                for device in &devices {
                    writeln!(
                        out,
                        "{}  {:<20}  {}",
                        device.mac(),
                        device.label().unwrap_or("-"),
                        device.kind()
                    )?;
                }
                Ok(true)
            }
            Some(format) if format.eq_ignore_ascii_case("json") => {
                let summaries: Vec<_> = devices.iter().map(Device::summary).collect();
                writeln!(out, "{}", serde_json::to_string_pretty(&summaries)?)?;
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }
}

/// `status <target>`
pub struct StatusCommand;

#[async_trait]
impl DeviceCommand for StatusCommand {
    async fn execute(
        &self,
        devices: Vec<Device>,
        _args: &[String],
        out: &mut (dyn Write + Send),
        _interrupts: &InterruptController,
    ) -> LifxResult<bool> {
        if devices.is_empty() {
            writeln!(out, "No bulbs found")?;
            return Ok(true);
        }

        for (idx, device) in devices.iter().enumerate() {
            if idx > 0 {
                writeln!(out)?;
            }
            writeln!(out, "MAC:      {}", device.mac())?;
            writeln!(out, "Label:    {}", device.label().unwrap_or("-"))?;
            writeln!(out, "Kind:     {}", device.kind())?;
            writeln!(out, "Gateway:  {} ({})", device.gateway().addr(), device.gateway().mac())?;
        }
        Ok(true)
    }
}

/// `watch <target> [seconds]`
///
/// Runs until ENTER is pressed, or for `seconds` when given.
pub struct WatchCommand;

#[async_trait]
impl DeviceCommand for WatchCommand {
    async fn execute(
        &self,
        devices: Vec<Device>,
        args: &[String],
        out: &mut (dyn Write + Send),
        interrupts: &InterruptController,
    ) -> LifxResult<bool> {
        let watcher = match args.first() {
            Some(seconds) => match seconds.parse::<u64>() {
                Ok(seconds) => interrupts.start_timer(Duration::from_secs(seconds)),
                Err(_) => return Ok(false),
            },
            None => interrupts.start_key_listener(out)?,
        };

        let mut round = 0u64;
        while !interrupts.is_cancelled() {
            round += 1;
            writeln!(out, "-- round {} --", round)?;
            for device in &devices {
                writeln!(out, "{}  {}", device.mac(), device.label().unwrap_or("-"))?;
            }
            out.flush()?;
            if interrupts.sleep_unless_cancelled(WATCH_REFRESH).await {
                break;
            }
        }

        watcher.abandon();
        writeln!(out, "Stopped after {} round(s)", round)?;
        Ok(true)
    }
}
