#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use log::LevelFilter;
use uuid::Uuid;

use blemaster::api::address::MacAddress;
use blemaster::api::central::CentralManager;
use blemaster::api::event::{
    ConnectEvent, ConnectHandler, EventHandler, EventKind, GattEvent, PrepareEvent,
    PrepareHandler, ScanHandler, ScanRecord,
};
use blemaster::api::profile::{PermissionOverrides, ProfileTree, ServiceMap};
use blemaster::api::transport::{ConnectionId, ProfileHandle, Transport};
use blemaster::{Central, Config};

pub const ADDRESS: &str = "aa:bb:cc:dd:ee:ff";
pub const PROFILE: ProfileHandle = ProfileHandle(7);
pub const CONNECTION: ConnectionId = ConnectionId(1);

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    StartScan,
    StopScan,
    Connect(MacAddress),
    Disconnect(ConnectionId),
    Pair(ConnectionId),
    BuildProfile(String),
    ReadCharacteristic(Uuid),
    WriteCharacteristic(Uuid, Vec<u8>),
    WriteWithoutResponse(Uuid, Vec<u8>),
    ReadDescriptor(Uuid, Uuid),
    WriteDescriptor(Uuid, Uuid, Vec<u8>),
    DisableAllCallbacks,
    DestroyProfile(ProfileHandle),
}

impl Call {
    pub fn is_attribute_io(&self) -> bool {
        matches!(
            self,
            Call::ReadCharacteristic(_)
                | Call::WriteCharacteristic(..)
                | Call::WriteWithoutResponse(..)
                | Call::ReadDescriptor(..)
                | Call::WriteDescriptor(..)
        )
    }
}

/// Scripted stand-in for the native stack.
#[derive(Default)]
pub struct MockState {
    pub calls: Vec<Call>,
    handlers: HashMap<EventKind, EventHandler>,
    connect_handler: Option<ConnectHandler>,
    prepare_handler: Option<PrepareHandler>,
    scan_handler: Option<ScanHandler>,
    /// Answer delivered synchronously from `connect`.
    pub connect_reply: Option<ConnectEvent>,
    /// Answer delivered synchronously from `build_profile`.
    pub prepare_reply: Option<PrepareEvent>,
    pub refuse_build: bool,
    /// When set, reads complete with this value and writes complete with status 0.
    pub auto_complete: Option<Vec<u8>>,
    pub pair_status: i32,
}

#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn connects_with(&self, status: i32, reported: &str) {
        self.state().connect_reply = Some(ConnectEvent {
            address: reported.to_string(),
            connection: CONNECTION,
            status,
        });
    }

    pub fn prepares_with(&self, status: i32) {
        self.state().prepare_reply = Some(PrepareEvent {
            status,
            profile: PROFILE,
        });
    }

    pub fn completes_with(&self, value: &[u8]) {
        self.state().auto_complete = Some(value.to_vec());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn attribute_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(Call::is_attribute_io)
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state().calls.iter().filter(|call| predicate(call)).count()
    }

    pub fn has_handler(&self, kind: EventKind) -> bool {
        self.state().handlers.contains_key(&kind)
    }

    /// Pushes an attribute event the way the stack would, outside our lock.
    pub fn emit(&self, kind: EventKind, event: GattEvent) {
        let handler = self.state().handlers.get(&kind).cloned();
        if let Some(handler) = handler {
            handler(event);
        }
    }

    pub fn emit_connect(&self, event: ConnectEvent) {
        let handler = self.state().connect_handler.clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }

    pub fn emit_prepare(&self, event: PrepareEvent) {
        let handler = self.state().prepare_handler.clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }

    pub fn emit_scan(&self, record: ScanRecord) {
        let handler = self.state().scan_handler.clone();
        if let Some(handler) = handler {
            handler(record);
        }
    }

    fn record(&self, call: Call) {
        self.state().calls.push(call);
    }

    fn complete(&self, kind: EventKind, event: GattEvent) {
        let value = self.state().auto_complete.clone();
        if let Some(value) = value {
            let event = match kind {
                EventKind::CharacteristicRead | EventKind::DescriptorRead => event.with_data(value),
                _ => event.with_status(0),
            };
            self.emit(kind, event);
        }
    }
}

impl Transport for MockTransport {
    fn start_scan(&self, handler: ScanHandler) -> bool {
        let mut state = self.state();
        state.calls.push(Call::StartScan);
        state.scan_handler = Some(handler);
        true
    }

    fn stop_scan(&self) -> bool {
        let mut state = self.state();
        state.calls.push(Call::StopScan);
        state.scan_handler = None;
        true
    }

    fn connect(&self, address: &MacAddress, handler: ConnectHandler) -> bool {
        let reply = {
            let mut state = self.state();
            state.calls.push(Call::Connect(*address));
            state.connect_handler = Some(handler.clone());
            state.connect_reply.clone()
        };
        if let Some(reply) = reply {
            handler(reply);
        }
        true
    }

    fn disconnect(&self, connection: ConnectionId) -> bool {
        self.record(Call::Disconnect(connection));
        true
    }

    fn pair(&self, connection: ConnectionId) -> i32 {
        let mut state = self.state();
        state.calls.push(Call::Pair(connection));
        state.pair_status
    }

    fn on_prepare(&self, handler: Option<PrepareHandler>) {
        self.state().prepare_handler = handler;
    }

    fn build_profile(&self, tree: &ProfileTree) -> bool {
        let (refuse, reply) = {
            let mut state = self.state();
            state.calls.push(Call::BuildProfile(tree.name.clone()));
            (state.refuse_build, state.prepare_reply)
        };
        if refuse {
            return false;
        }
        if let Some(reply) = reply {
            self.emit_prepare(reply);
        }
        true
    }

    fn read_characteristic(&self, profile: ProfileHandle, characteristic: &Uuid) -> bool {
        self.record(Call::ReadCharacteristic(*characteristic));
        self.complete(
            EventKind::CharacteristicRead,
            GattEvent::new(profile, *characteristic),
        );
        true
    }

    fn write_characteristic(
        &self,
        profile: ProfileHandle,
        characteristic: &Uuid,
        data: &[u8],
    ) -> bool {
        self.record(Call::WriteCharacteristic(*characteristic, data.to_vec()));
        self.complete(
            EventKind::CharacteristicWrite,
            GattEvent::new(profile, *characteristic),
        );
        true
    }

    fn write_characteristic_without_response(
        &self,
        _profile: ProfileHandle,
        characteristic: &Uuid,
        data: &[u8],
    ) -> bool {
        self.record(Call::WriteWithoutResponse(*characteristic, data.to_vec()));
        true
    }

    fn read_descriptor(
        &self,
        profile: ProfileHandle,
        characteristic: &Uuid,
        descriptor: &Uuid,
    ) -> bool {
        self.record(Call::ReadDescriptor(*characteristic, *descriptor));
        self.complete(
            EventKind::DescriptorRead,
            GattEvent::new(profile, *characteristic).with_descriptor(*descriptor),
        );
        true
    }

    fn write_descriptor(
        &self,
        profile: ProfileHandle,
        characteristic: &Uuid,
        descriptor: &Uuid,
        data: &[u8],
    ) -> bool {
        self.record(Call::WriteDescriptor(*characteristic, *descriptor, data.to_vec()));
        self.complete(
            EventKind::DescriptorWrite,
            GattEvent::new(profile, *characteristic).with_descriptor(*descriptor),
        );
        true
    }

    fn on_event(&self, kind: EventKind, handler: Option<EventHandler>) {
        let mut state = self.state();
        match handler {
            Some(handler) => state.handlers.insert(kind, handler),
            None => state.handlers.remove(&kind),
        };
    }

    fn disable_all_callbacks(&self) {
        let mut state = self.state();
        state.calls.push(Call::DisableAllCallbacks);
        state.handlers.clear();
        state.prepare_handler = None;
        state.scan_handler = None;
    }

    fn destroy_profile(&self, profile: ProfileHandle) -> bool {
        self.record(Call::DestroyProfile(profile));
        true
    }
}

pub fn test_config() -> Config {
    Config {
        operation_timeout_ms: 1000,
        poll_interval_ms: 50,
        prepare_delay_ms: 100,
        prepare_timeout_ms: 1000,
        connect_timeout_ms: 1000,
        pair_profile: true,
    }
}

pub fn central(mock: &Arc<MockTransport>) -> Central {
    blemaster::logging::init(LevelFilter::Warn);
    Central::new(mock.clone(), test_config())
}

pub const SERVICE: &str = "4fafc201-1fb5-459e-8fcc-c5c9c331914b";
pub const TX: &str = "beb5483e-36e1-4688-b7f5-ea07361b26a8";
pub const RX: &str = "5a87b4ef-3bfa-76a8-e642-92933c31434f";

pub fn uuid(text: &str) -> Uuid {
    Uuid::parse_str(text).unwrap()
}

/// One service with two characteristics, the second carrying a CCCD.
pub fn two_characteristic_map() -> ServiceMap {
    BTreeMap::from([(
        SERVICE.to_string(),
        BTreeMap::from([
            (TX.to_string(), vec![]),
            (RX.to_string(), vec!["2902".to_string()]),
        ]),
    )])
}

pub async fn connect(mock: &Arc<MockTransport>, central: &Central) {
    mock.connects_with(0, ADDRESS);
    let outcome = central.connect(ADDRESS).await.unwrap();
    assert!(outcome.connected);
}

pub fn profile(central: &Central) -> ProfileTree {
    central
        .generate_profile(&two_characteristic_map(), &PermissionOverrides::new())
        .unwrap()
}

/// Connects and prepares `PROFILE`.
pub async fn ready(mock: &Arc<MockTransport>, central: &Central) {
    connect(mock, central).await;
    mock.prepares_with(0);
    let outcome = central.prepare_profile(&profile(central)).await.unwrap();
    assert!(outcome.success, "{}", outcome.message);
}
