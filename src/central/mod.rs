//! The central engine: one session, one profile, one attribute operation in
//! flight at a time.

pub mod compiler;
pub mod connection;
pub mod correlator;
pub mod queue;
pub mod registry;
pub mod resolver;
pub mod session;

use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use uuid::Uuid;

use crate::api::address::MacAddress;
use crate::api::central::{CentralManager, ConnectOutcome, PrepareOutcome};
use crate::api::device::Device;
use crate::api::event::{EventHandler, EventKind, ScanHandler};
use crate::api::operation::{Operation, OperationOutput, WriteType};
use crate::api::profile::{CCCD_UUID, PermissionOverrides, ProfileTree, ServiceMap};
use crate::api::transport::Transport;
use crate::central::compiler::{ProfileTarget, compile_profile};
use crate::central::connection::ConnectionMachine;
use crate::central::correlator::{Completions, Correlator};
use crate::central::queue::{OperationQueue, PendingOperation, QueueTiming};
use crate::central::session::{ConnectionState, Session, SessionView, lock};
use crate::config::Config;
use crate::{Error, Result};

const CCCD_NOTIFY: [u8; 2] = [0x01, 0x00];
const CCCD_INDICATE: [u8; 2] = [0x02, 0x00];
const CCCD_OFF: [u8; 2] = [0x00, 0x00];

/// Handle to the central engine. Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct Central {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    config: Config,
    connection: ConnectionMachine,
    session: SessionView,
    correlator: Correlator,
    queue: OperationQueue,
}

impl Central {
    /// Must be called from within a tokio runtime; the operation queue worker
    /// is spawned onto it.
    pub fn new(transport: Arc<dyn Transport>, config: Config) -> Self {
        let connection = ConnectionMachine::new(transport.clone(), config.clone());
        let session = connection.view();
        let completions = Arc::new(Completions::new());
        let correlator = Correlator::new(session.clone(), completions.clone());
        correlator.attach(transport.as_ref());
        let queue = OperationQueue::spawn(
            transport.clone(),
            session.clone(),
            completions,
            QueueTiming {
                timeout: config.operation_timeout(),
                poll_interval: config.poll_interval(),
            },
        );
        Central {
            inner: Arc::new(Inner {
                transport,
                config,
                connection,
                session,
                correlator,
                queue,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.session.state()
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.session.session()
    }

    pub fn start_scan(&self, handler: Option<ScanHandler>) -> Result<()> {
        self.inner.connection.start_scan(handler)
    }

    pub fn stop_scan(&self) -> bool {
        self.inner.connection.stop_scan()
    }

    /// Exact address or `xx` wildcard pattern, first-seen order.
    pub fn device(&self, address_or_pattern: &str) -> Option<Device> {
        self.registry(|registry| registry.find(address_or_pattern).cloned())
    }

    pub fn find_by_name(&self, name: &str, partial: bool) -> Option<Device> {
        self.registry(|registry| registry.find_by_name(name, partial).cloned())
    }

    pub fn find_by_service(&self, service: &Uuid) -> Option<Device> {
        self.registry(|registry| registry.find_by_service(service).cloned())
    }

    pub fn find_by_vendor(&self, vendor_id: u16, data: Option<&[u8]>) -> Option<Device> {
        self.registry(|registry| registry.find_by_vendor(vendor_id, data).cloned())
    }

    pub fn devices(&self) -> Vec<Device> {
        self.registry(|registry| registry.devices().to_vec())
    }

    /// Like [`Central::device`], but a miss is an error.
    pub fn require_device(&self, address_or_pattern: &str) -> Result<Device> {
        self.device(address_or_pattern)
            .ok_or_else(|| Error::DeviceNotFound(address_or_pattern.to_string()))
    }

    /// Forgets a device. The device of the live session cannot be forgotten.
    pub fn remove_device(&self, address: &str) -> Result<Device> {
        let address: MacAddress = address.parse()?;
        let mut link = lock(self.inner.connection.link());
        if link.registry.get(&address).is_some_and(|device| device.is_connected) {
            return Err(Error::SessionActive {
                address: address.to_string(),
            });
        }
        link.registry
            .remove(&address)
            .ok_or_else(|| Error::DeviceNotFound(address.to_string()))
    }

    /// Drops every registry entry except the connected device.
    pub fn clear_devices(&self) {
        lock(self.inner.connection.link()).registry.clear();
    }

    fn registry<T>(&self, f: impl FnOnce(&registry::DeviceRegistry) -> T) -> T {
        f(&lock(self.inner.connection.link()).registry)
    }

    /// Queues raw attribute I/O behind everything already waiting.
    pub fn enqueue(&self, operation: Operation) -> PendingOperation {
        self.inner.queue.enqueue(operation)
    }

    /// Compiles `services` into a profile tree for the connected device.
    pub fn generate_profile(
        &self,
        services: &ServiceMap,
        overrides: &PermissionOverrides,
    ) -> Result<ProfileTree> {
        let session = self.inner.session.session();
        let address = session.as_ref().map(|session| session.address.to_string());
        let name = session
            .as_ref()
            .and_then(|session| {
                self.registry(|registry| {
                    registry
                        .get(&session.address)
                        .and_then(|device| device.name.clone())
                })
            })
            .or_else(|| address.clone())
            .unwrap_or_default();
        compile_profile(
            &ProfileTarget {
                address: address.as_deref(),
                name: &name,
                pair: self.inner.config.pair_profile,
            },
            services,
            overrides,
        )
    }

    async fn run(&self, operation: Operation) -> Result<OperationOutput> {
        self.enqueue(operation).await
    }
}

#[async_trait]
impl CentralManager for Central {
    async fn connect(&self, address: &str) -> Result<ConnectOutcome> {
        self.inner.connection.connect(address).await
    }

    async fn disconnect(&self) -> Result<bool> {
        self.inner.connection.disconnect()
    }

    async fn pair(&self) -> Result<()> {
        self.inner.connection.pair()
    }

    async fn prepare_profile(&self, tree: &ProfileTree) -> Result<PrepareOutcome> {
        self.inner.correlator.attach(self.inner.transport.as_ref());
        self.inner.connection.prepare_profile(tree).await
    }

    async fn read_characteristic(&self, characteristic: Uuid) -> Result<Vec<u8>> {
        let output = self
            .run(Operation::ReadCharacteristic { characteristic })
            .await?;
        Ok(output.into_value())
    }

    async fn write_characteristic(
        &self,
        characteristic: Uuid,
        data: &[u8],
        write_type: WriteType,
    ) -> Result<()> {
        self.run(Operation::WriteCharacteristic {
            characteristic,
            data: data.to_vec(),
            write_type,
        })
        .await?;
        Ok(())
    }

    async fn read_descriptor(&self, characteristic: Uuid, descriptor: Uuid) -> Result<Vec<u8>> {
        let output = self
            .run(Operation::ReadDescriptor {
                characteristic,
                descriptor,
            })
            .await?;
        Ok(output.into_value())
    }

    async fn write_descriptor(
        &self,
        characteristic: Uuid,
        descriptor: Uuid,
        data: &[u8],
    ) -> Result<()> {
        self.run(Operation::WriteDescriptor {
            characteristic,
            descriptor,
            data: data.to_vec(),
        })
        .await?;
        Ok(())
    }

    async fn enable_notifications(&self, characteristic: Uuid, indicate: bool) -> Result<()> {
        let value = if indicate { CCCD_INDICATE } else { CCCD_NOTIFY };
        self.write_descriptor(characteristic, CCCD_UUID, &value).await
    }

    async fn disable_notifications(&self, characteristic: Uuid) -> Result<()> {
        self.write_descriptor(characteristic, CCCD_UUID, &CCCD_OFF).await
    }

    fn on(&self, kind: EventKind, handler: EventHandler) {
        self.inner.correlator.on(kind, handler);
    }

    fn off(&self, kind: EventKind) {
        self.inner.correlator.off(kind);
    }

    async fn quit(&self) {
        info!("Shutting down central");
        self.inner.connection.quit();
        self.inner.correlator.clear();
        self.inner.correlator.detach();
    }
}
