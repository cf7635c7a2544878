//! Integration tests for command dispatch
//!
//! These tests drive the dispatcher with an in-memory directory and a gateway
//! that counts how often it is released.

use async_trait::async_trait;
use futures::FutureExt;
use liblifxctl::commands::DeviceCommand;
use liblifxctl::device::{Device, DeviceKind, GatewayLink, MacAddress, Peripheral};
use liblifxctl::directory::DeviceDirectory;
use liblifxctl::dispatcher::{CommandDispatcher, NO_GATEWAY_MESSAGE};
use liblifxctl::error::{LifxError, LifxResult};
use liblifxctl::interrupt::InterruptController;
use std::io::Write;
use std::net::Ipv4Addr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const GATEWAY_MAC: MacAddress = MacAddress::new([0xD0, 0x73, 0xD5, 0x00, 0x00, 0x01]);

#[derive(Debug)]
struct CountingGateway {
    mac: MacAddress,
    addr: Ipv4Addr,
    releases: AtomicUsize,
    fail_release: bool,
}

impl CountingGateway {
    fn new(addr: Ipv4Addr, mac: MacAddress) -> Arc<Self> {
        Arc::new(Self {
            mac,
            addr,
            releases: AtomicUsize::new(0),
            fail_release: false,
        })
    }

    fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GatewayLink for CountingGateway {
    fn mac(&self) -> MacAddress {
        self.mac
    }

    fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    async fn disconnect(&self) -> LifxResult<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        if self.fail_release {
            return Err(LifxError::InvalidState("release failed".to_string()));
        }
        Ok(())
    }
}

/// Directory with a fixed gateway and bulb list; records every call
#[derive(Default)]
struct FakeDirectory {
    gateway: Option<Arc<CountingGateway>>,
    bulbs: Vec<(String, MacAddress)>,
    fail_enumeration: bool,
    opened: Mutex<Vec<Arc<CountingGateway>>>,
    discover_calls: AtomicUsize,
    enumerate_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
}

impl FakeDirectory {
    fn with_gateway() -> Self {
        Self {
            gateway: Some(CountingGateway::new(Ipv4Addr::new(192, 168, 1, 10), GATEWAY_MAC)),
            bulbs: vec![
                ("Kitchen".to_string(), MacAddress::new([0xD0, 0x73, 0xD5, 0, 0, 2])),
                ("Hallway".to_string(), MacAddress::new([0xD0, 0x73, 0xD5, 0, 0, 3])),
            ],
            ..Self::default()
        }
    }

    fn discovered(&self) -> &CountingGateway {
        self.gateway.as_deref().expect("fake has a gateway")
    }

    fn opened(&self) -> Vec<Arc<CountingGateway>> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeviceDirectory for FakeDirectory {
    async fn discover_gateway(&self) -> LifxResult<Option<Arc<dyn GatewayLink>>> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.gateway.clone().map(|gw| gw as Arc<dyn GatewayLink>))
    }

    async fn open_gateway(&self, addr: Ipv4Addr, mac: MacAddress) -> LifxResult<Arc<dyn GatewayLink>> {
        let gateway = CountingGateway::new(addr, mac);
        self.opened.lock().unwrap().push(gateway.clone());
        Ok(gateway as Arc<dyn GatewayLink>)
    }

    async fn discover_all_devices(&self, gateway: &Arc<dyn GatewayLink>) -> LifxResult<Vec<Device>> {
        self.enumerate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_enumeration {
            return Err(LifxError::InvalidState("no response from gateway".to_string()));
        }
        Ok(self
            .bulbs
            .iter()
            .map(|(name, mac)| Device::Peripheral(Peripheral::new(*mac, gateway.clone()).with_label(name.clone())))
            .collect())
    }

    async fn discover_by_name(
        &self,
        gateway: &Arc<dyn GatewayLink>,
        name: &str,
    ) -> LifxResult<Option<Device>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .bulbs
            .iter()
            .find(|(label, _)| label == name)
            .map(|(label, mac)| Device::Peripheral(Peripheral::new(*mac, gateway.clone()).with_label(label.clone()))))
    }
}

/// What a command invocation saw
#[derive(Debug, Default, Clone)]
struct Seen {
    macs: Vec<MacAddress>,
    kinds: Vec<DeviceKind>,
    args: Vec<String>,
    cancelled_at_start: bool,
}

enum Behaviour {
    Succeed(bool),
    Fail,
    Panic,
}

struct RecordingCommand {
    behaviour: Behaviour,
    seen: Mutex<Option<Seen>>,
}

impl RecordingCommand {
    fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            seen: Mutex::new(None),
        }
    }

    fn seen(&self) -> Option<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeviceCommand for RecordingCommand {
    async fn execute(
        &self,
        devices: Vec<Device>,
        args: &[String],
        out: &mut (dyn Write + Send),
        interrupts: &InterruptController,
    ) -> LifxResult<bool> {
        *self.seen.lock().unwrap() = Some(Seen {
            macs: devices.iter().map(Device::mac).collect(),
            kinds: devices.iter().map(Device::kind).collect(),
            args: args.to_vec(),
            cancelled_at_start: interrupts.is_cancelled(),
        });
        writeln!(out, "ran against {} device(s)", devices.len())?;

        match self.behaviour {
            Behaviour::Succeed(result) => Ok(result),
            Behaviour::Fail => Err(LifxError::InvalidState("bulb refused".to_string())),
            Behaviour::Panic => panic!("command blew up"),
        }
    }
}

/// Loops until a zero-length timer cancels it
struct TimedLoopCommand;

#[async_trait]
impl DeviceCommand for TimedLoopCommand {
    async fn execute(
        &self,
        _devices: Vec<Device>,
        _args: &[String],
        out: &mut (dyn Write + Send),
        interrupts: &InterruptController,
    ) -> LifxResult<bool> {
        let _timer = interrupts.start_timer(Duration::ZERO);
        let mut iterations = 0;
        while !interrupts.is_cancelled() {
            iterations += 1;
            interrupts.tick().await;
        }
        writeln!(out, "iterations: {}", iterations)?;
        Ok(true)
    }
}

fn tokens(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn dispatcher(directory: &Arc<FakeDirectory>) -> CommandDispatcher {
    CommandDispatcher::new(directory.clone() as Arc<dyn DeviceDirectory>)
}

#[tokio::test]
async fn test_too_few_arguments_rejected_before_discovery() {
    let directory = Arc::new(FakeDirectory::with_gateway());
    let command = RecordingCommand::new(Behaviour::Succeed(true));
    let mut out = Vec::new();

    for args in [tokens(&[]), tokens(&["power"])] {
        let result = dispatcher(&directory).execute(&command, &args, &mut out).await.unwrap();
        assert!(!result);
    }

    assert_eq!(directory.discover_calls.load(Ordering::SeqCst), 0);
    assert!(command.seen().is_none());
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_no_gateway_reports_and_fails() {
    let directory = Arc::new(FakeDirectory::default());
    let command = RecordingCommand::new(Behaviour::Succeed(true));
    let mut out = Vec::new();

    let err = dispatcher(&directory)
        .execute(&command, &tokens(&["power", "all", "on"]), &mut out)
        .await
        .unwrap_err();

    assert!(matches!(err, LifxError::GatewayUnreachable));
    assert_eq!(String::from_utf8(out).unwrap(), format!("{}\n", NO_GATEWAY_MESSAGE));
    assert!(command.seen().is_none());
}

#[tokio::test]
async fn test_override_builds_gateway_and_consumes_tokens() {
    let directory = Arc::new(FakeDirectory::with_gateway());
    let command = RecordingCommand::new(Behaviour::Succeed(true));
    let mut out = Vec::new();

    let args = tokens(&["power", "-gw", "192.168.1.50", "AA:BB:CC:DD:EE:FF", "all", "on"]);
    let result = dispatcher(&directory).execute(&command, &args, &mut out).await.unwrap();
    assert!(result);

    assert_eq!(directory.discover_calls.load(Ordering::SeqCst), 0);
    let opened = directory.opened();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].addr, Ipv4Addr::new(192, 168, 1, 50));
    assert_eq!(opened[0].mac.to_string(), "AA:BB:CC:DD:EE:FF");
    assert_eq!(opened[0].releases(), 1);
    assert_eq!(directory.discovered().releases(), 0);

    let seen = command.seen().unwrap();
    assert_eq!(directory.enumerate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(seen.macs.len(), 2);
    assert_eq!(seen.args, tokens(&["on"]));
    assert!(!seen.cancelled_at_start);
}

#[tokio::test]
async fn test_override_positional_target_is_next_token() {
    // The token right after the override is the target, not a command argument
    let directory = Arc::new(FakeDirectory::with_gateway());
    let command = RecordingCommand::new(Behaviour::Succeed(true));
    let mut out = Vec::new();

    let args = tokens(&["power", "-gw", "192.168.1.50", "AA:BB:CC:DD:EE:FF", "on"]);
    let err = dispatcher(&directory).execute(&command, &args, &mut out).await.unwrap_err();

    assert!(matches!(&err, LifxError::DeviceNotFound(name) if name == "on"));
    assert_eq!(directory.lookup_calls.load(Ordering::SeqCst), 1);
    assert_eq!(directory.opened()[0].releases(), 1);
    assert!(command.seen().is_none());
}

#[tokio::test]
async fn test_override_without_target_is_rejected() {
    let directory = Arc::new(FakeDirectory::with_gateway());
    let command = RecordingCommand::new(Behaviour::Succeed(true));
    let mut out = Vec::new();

    let args = tokens(&["power", "-gw", "192.168.1.50", "AA:BB:CC:DD:EE:FF"]);
    let result = dispatcher(&directory).execute(&command, &args, &mut out).await.unwrap();

    assert!(!result);
    assert!(directory.opened().is_empty());
    assert_eq!(directory.discover_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_override_falls_back_to_discovery() {
    let directory = Arc::new(FakeDirectory::with_gateway());
    let command = RecordingCommand::new(Behaviour::Succeed(true));
    let mut out = Vec::new();

    let args = tokens(&["power", "-gw", "192.168.1.500", "AA:BB:CC:DD:EE:FF", "all"]);
    let err = dispatcher(&directory).execute(&command, &args, &mut out).await.unwrap_err();

    // Nothing was consumed, so "-gw" itself is taken as a bulb label
    assert!(matches!(&err, LifxError::DeviceNotFound(name) if name == "-gw"));
    assert_eq!(directory.discover_calls.load(Ordering::SeqCst), 1);
    assert!(directory.opened().is_empty());
    assert_eq!(directory.discovered().releases(), 1);
}

#[tokio::test]
async fn test_mac_target_skips_lookup() {
    let directory = Arc::new(FakeDirectory::with_gateway());
    let command = RecordingCommand::new(Behaviour::Succeed(true));
    let mut out = Vec::new();

    let args = tokens(&["power", "aa-bb-cc-dd-ee-ff", "off"]);
    dispatcher(&directory).execute(&command, &args, &mut out).await.unwrap();

    let seen = command.seen().unwrap();
    assert_eq!(seen.macs, vec![MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF])]);
    assert_eq!(seen.kinds, vec![DeviceKind::Peripheral]);
    assert_eq!(seen.args, tokens(&["off"]));
    assert_eq!(directory.lookup_calls.load(Ordering::SeqCst), 0);
    assert_eq!(directory.enumerate_calls.load(Ordering::SeqCst), 0);
    assert_eq!(directory.discovered().releases(), 1);
}

#[tokio::test]
async fn test_gateway_and_name_targets() {
    let directory = Arc::new(FakeDirectory::with_gateway());
    let mut out = Vec::new();

    let command = RecordingCommand::new(Behaviour::Succeed(true));
    dispatcher(&directory)
        .execute(&command, &tokens(&["power", "GATEWAY"]), &mut out)
        .await
        .unwrap();
    let seen = command.seen().unwrap();
    assert_eq!(seen.macs, vec![GATEWAY_MAC]);
    assert_eq!(seen.kinds, vec![DeviceKind::Gateway]);
    assert!(seen.args.is_empty());

    let command = RecordingCommand::new(Behaviour::Succeed(true));
    dispatcher(&directory)
        .execute(&command, &tokens(&["power", "Hallway", "on"]), &mut out)
        .await
        .unwrap();
    let seen = command.seen().unwrap();
    assert_eq!(seen.macs, vec![MacAddress::new([0xD0, 0x73, 0xD5, 0, 0, 3])]);

    assert_eq!(directory.discovered().releases(), 2);
}

#[tokio::test]
async fn test_command_result_is_propagated() {
    let directory = Arc::new(FakeDirectory::with_gateway());
    let command = RecordingCommand::new(Behaviour::Succeed(false));
    let mut out = Vec::new();

    let result = dispatcher(&directory)
        .execute(&command, &tokens(&["power", "all"]), &mut out)
        .await
        .unwrap();

    assert!(!result);
    assert_eq!(String::from_utf8(out).unwrap(), "ran against 2 device(s)\n");
    assert_eq!(directory.discovered().releases(), 1);
}

#[tokio::test]
async fn test_enumeration_failure_still_releases() {
    let directory = Arc::new(FakeDirectory {
        fail_enumeration: true,
        ..FakeDirectory::with_gateway()
    });
    let command = RecordingCommand::new(Behaviour::Succeed(true));
    let mut out = Vec::new();

    let err = dispatcher(&directory)
        .execute(&command, &tokens(&["power", "all"]), &mut out)
        .await
        .unwrap_err();

    assert!(matches!(err, LifxError::Resolution(_)));
    assert!(command.seen().is_none());
    assert_eq!(directory.discovered().releases(), 1);
}

#[tokio::test]
async fn test_command_error_still_releases() {
    let directory = Arc::new(FakeDirectory::with_gateway());
    let command = RecordingCommand::new(Behaviour::Fail);
    let mut out = Vec::new();

    let err = dispatcher(&directory)
        .execute(&command, &tokens(&["power", "Kitchen"]), &mut out)
        .await
        .unwrap_err();

    assert!(matches!(&err, LifxError::InvalidState(msg) if msg == "bulb refused"));
    assert_eq!(directory.discovered().releases(), 1);
}

#[tokio::test]
async fn test_command_panic_still_releases() {
    let directory = Arc::new(FakeDirectory::with_gateway());
    let command = RecordingCommand::new(Behaviour::Panic);
    let mut out = Vec::new();
    let args = tokens(&["power", "all"]);

    let outcome = AssertUnwindSafe(dispatcher(&directory).execute(&command, &args, &mut out))
        .catch_unwind()
        .await;

    assert!(outcome.is_err());
    assert_eq!(directory.discovered().releases(), 1);
}

#[tokio::test]
async fn test_release_failure_after_success_is_reported() {
    let gateway = Arc::new(CountingGateway {
        mac: GATEWAY_MAC,
        addr: Ipv4Addr::new(192, 168, 1, 10),
        releases: AtomicUsize::new(0),
        fail_release: true,
    });
    let directory = Arc::new(FakeDirectory {
        gateway: Some(gateway.clone()),
        ..FakeDirectory::with_gateway()
    });
    let command = RecordingCommand::new(Behaviour::Succeed(true));
    let mut out = Vec::new();

    let err = dispatcher(&directory)
        .execute(&command, &tokens(&["power", "all"]), &mut out)
        .await
        .unwrap_err();
    assert!(matches!(err, LifxError::InvalidState(_)));
    assert_eq!(gateway.releases(), 1);

    // A command error wins over the release error
    let command = RecordingCommand::new(Behaviour::Fail);
    let err = dispatcher(&directory)
        .execute(&command, &tokens(&["power", "all"]), &mut out)
        .await
        .unwrap_err();
    assert!(matches!(&err, LifxError::InvalidState(msg) if msg == "bulb refused"));
    assert_eq!(gateway.releases(), 2);
}

#[tokio::test]
async fn test_zero_timer_stops_loop_on_first_check() {
    let directory = Arc::new(FakeDirectory::with_gateway());
    let mut out = Vec::new();

    let result = dispatcher(&directory)
        .with_poll_interval(Duration::from_millis(10))
        .execute(&TimedLoopCommand, &tokens(&["effect", "all"]), &mut out)
        .await
        .unwrap();

    assert!(result);
    assert_eq!(String::from_utf8(out).unwrap(), "iterations: 0\n");
    assert_eq!(directory.discovered().releases(), 1);
}
