//! Connection and profile lifecycle for the single session.
//!
//! `Idle → Connecting → Connected → PreparingProfile → Ready → Disconnecting → Idle`,
//! with `Failed` reachable from `Connecting` (falls back to `Idle`) and from
//! `PreparingProfile` (falls back to `Connected`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};
use tokio::time::{sleep, timeout};

use crate::api::address::MacAddress;
use crate::api::central::{CONNECT_OK, ConnectOutcome, ConnectStatus, PrepareOutcome};
use crate::api::device::DeviceUpdate;
use crate::api::event::{
    ConnectEvent, ConnectHandler, PrepareEvent, PrepareHandler, ScanHandler, ScanRecord,
};
use crate::api::profile::ProfileTree;
use crate::api::transport::Transport;
use crate::central::resolver::{Resolver, SharedResolver, resolve};
use crate::central::session::{ConnectionState, Session, SessionView, SharedLink, lock};
use crate::config::Config;
use crate::error::STATUS_CALL_REJECTED;
use crate::{Error, Result};

pub const PREPARE_OK: i32 = 0;

const PREPARE_STATUS: &[(i32, &str)] = &[
    (0, "Profile prepared"),
    (1, "Profile preparation failed"),
    (2, "Profile already exists for this connection"),
    (3, "Invalid attribute tree"),
    (4, "Out of resources"),
    (5, "Connection lost during preparation"),
];

/// Human message for a prepare status code.
pub fn prepare_message(code: i32) -> &'static str {
    PREPARE_STATUS
        .iter()
        .find(|(known, _)| *known == code)
        .map_or("Unknown prepare status", |(_, message)| message)
}

pub(crate) struct ConnectionMachine {
    transport: Arc<dyn Transport>,
    config: Config,
    link: SharedLink,
    connect: SharedResolver<ConnectEvent>,
    prepare: SharedResolver<PrepareEvent>,
    scanning: AtomicBool,
}

impl ConnectionMachine {
    pub fn new(transport: Arc<dyn Transport>, config: Config) -> Self {
        ConnectionMachine {
            transport,
            config,
            link: SharedLink::default(),
            connect: Arc::new(Mutex::new(Resolver::new())),
            prepare: Arc::new(Mutex::new(Resolver::new())),
            scanning: AtomicBool::new(false),
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView::new(self.link.clone())
    }

    pub fn link(&self) -> &SharedLink {
        &self.link
    }

    pub fn start_scan(&self, forward: Option<ScanHandler>) -> Result<()> {
        let link = self.link.clone();
        let handler: ScanHandler = Arc::new(move |record: ScanRecord| {
            lock(&link).registry.ingest(record.clone());
            if let Some(forward) = &forward {
                forward(record);
            }
        });
        if !self.transport.start_scan(handler) {
            return Err(Error::rejected(STATUS_CALL_REJECTED, "scan refused"));
        }
        self.scanning.store(true, Ordering::Release);
        info!("Scan started");
        Ok(())
    }

    pub fn stop_scan(&self) -> bool {
        if !self.scanning.swap(false, Ordering::AcqRel) {
            return false;
        }
        info!("Scan stopped");
        self.transport.stop_scan()
    }

    pub async fn connect(&self, address: &str) -> Result<ConnectOutcome> {
        let address = MacAddress::parse_strict(address)?;

        let pending = {
            let mut link = lock(&self.link);
            if link.state == ConnectionState::Connecting {
                return Err(Error::AlreadyInProgress);
            }
            if let Some(session) = &link.session {
                if session.address == address {
                    debug!("Already connected to {}", address);
                    return Ok(ConnectOutcome::success(ConnectStatus::AlreadyConnected));
                }
                return Err(Error::SessionActive {
                    address: session.address.to_string(),
                });
            }
            if link.registry.get(&address).is_some_and(|device| device.is_connected) {
                debug!("{} is already marked connected", address);
                return Ok(ConnectOutcome::success(ConnectStatus::AlreadyConnected));
            }
            link.registry.upsert(address, DeviceUpdate::default());
            link.transition(ConnectionState::Connecting);
            lock_resolver(&self.connect).register()
        };

        info!("Connecting to {}", address);
        if !self.transport.connect(&address, self.connect_handler(address)) {
            lock_resolver(&self.connect).cancel();
            self.connect_failed();
            return Ok(ConnectOutcome::failure(ConnectStatus::Failed {
                code: STATUS_CALL_REJECTED,
            }));
        }

        let event = match timeout(self.config.connect_timeout(), pending).await {
            Ok(Ok(event)) => Some(event),
            Ok(Err(_)) => None,
            Err(_) => {
                lock_resolver(&self.connect).cancel();
                warn!("Connect to {} timed out", address);
                if self.connect_failed() {
                    return Ok(ConnectOutcome::failure(ConnectStatus::TimedOut));
                }
                None
            }
        };

        let mut link = lock(&self.link);
        if link.state != ConnectionState::Connecting {
            debug!("Connect to {} abandoned in {:?}", address, link.state);
            return Ok(ConnectOutcome::failure(ConnectStatus::Aborted));
        }
        let Some(event) = event else {
            link.transition(ConnectionState::Failed);
            link.transition(ConnectionState::Idle);
            return Ok(ConnectOutcome::failure(ConnectStatus::Aborted));
        };

        if event.address.parse::<MacAddress>().ok() != Some(address) {
            // the transport reports unrelated addresses on failure; the
            // requested address stays the address of record
            warn!(
                "Transport reported {} for connect to {} (status {})",
                event.address, address, event.status
            );
        }

        if event.status != CONNECT_OK {
            error!("Connect to {} failed with status {}", address, event.status);
            link.transition(ConnectionState::Failed);
            link.transition(ConnectionState::Idle);
            return Ok(ConnectOutcome::failure(ConnectStatus::from_code(event.status)));
        }

        link.registry.mark_connected(&address, event.connection);
        link.session = Some(Session {
            address,
            connection: event.connection,
            profile: None,
        });
        link.transition(ConnectionState::Connected);
        info!("Connected to {} ({:?})", address, event.connection);
        Ok(ConnectOutcome::success(ConnectStatus::Connected))
    }

    /// Returns true if the pending connect was still ours to fail.
    fn connect_failed(&self) -> bool {
        let mut link = lock(&self.link);
        if link.state != ConnectionState::Connecting {
            return false;
        }
        link.transition(ConnectionState::Failed);
        link.transition(ConnectionState::Idle);
        true
    }

    fn connect_handler(&self, address: MacAddress) -> ConnectHandler {
        let resolver = self.connect.clone();
        let link = self.link.clone();
        Arc::new(move |event: ConnectEvent| {
            if resolve(&resolver, event.clone()) {
                return;
            }
            if event.status == CONNECT_OK {
                debug!("Repeated connect callback for {}", address);
                return;
            }
            let mut link = lock(&link);
            let ours = link
                .session
                .as_ref()
                .is_some_and(|session| session.address == address);
            if ours {
                warn!("Link to {} lost (status {})", address, event.status);
                link.end_session();
                link.transition(ConnectionState::Idle);
            }
        })
    }

    pub fn disconnect(&self) -> Result<bool> {
        let session = {
            let mut link = lock(&self.link);
            match link.state {
                ConnectionState::Connected | ConnectionState::Ready => {}
                ConnectionState::Connecting | ConnectionState::PreparingProfile => {
                    return Err(Error::InvalidState(link.state));
                }
                ConnectionState::Disconnecting => return Err(Error::AlreadyInProgress),
                ConnectionState::Idle | ConnectionState::Failed => return Ok(false),
            }
            let Some(session) = link.session.clone() else {
                return Ok(false);
            };
            link.transition(ConnectionState::Disconnecting);
            session
        };

        info!("Disconnecting from {}", session.address);
        if !self.transport.disconnect(session.connection) {
            warn!("Transport refused disconnect of {:?}", session.connection);
        }
        if let Some(profile) = session.profile {
            self.transport.destroy_profile(profile);
        }

        let mut link = lock(&self.link);
        link.end_session();
        link.transition(ConnectionState::Idle);
        Ok(true)
    }

    pub fn pair(&self) -> Result<()> {
        let session = lock(&self.link).session.clone().ok_or(Error::NotConnected)?;
        match self.transport.pair(session.connection) {
            0 => Ok(()),
            code => Err(Error::rejected(code, "pairing failed")),
        }
    }

    pub async fn prepare_profile(&self, tree: &ProfileTree) -> Result<PrepareOutcome> {
        let pending = {
            let mut link = lock(&self.link);
            match link.state {
                ConnectionState::Connected => {}
                ConnectionState::PreparingProfile => return Err(Error::AlreadyInProgress),
                ConnectionState::Idle | ConnectionState::Failed => return Err(Error::NotConnected),
                state => return Err(Error::InvalidState(state)),
            }
            link.transition(ConnectionState::PreparingProfile);
            lock_resolver(&self.prepare).register()
        };

        // The listener must exist before the stack can answer the build.
        let resolver = self.prepare.clone();
        let listener: PrepareHandler = Arc::new(move |event: PrepareEvent| {
            if !resolve(&resolver, event) {
                debug!("Unsolicited prepare event {:?}", event);
            }
        });
        self.transport.on_prepare(Some(listener));
        sleep(self.config.prepare_delay()).await;

        if lock(&self.link).state != ConnectionState::PreparingProfile {
            self.transport.on_prepare(None);
            return Ok(self.prepare_aborted());
        }

        debug!("Building profile {:?} with {} services", tree.name, tree.len);
        if !self.transport.build_profile(tree) {
            self.transport.on_prepare(None);
            lock_resolver(&self.prepare).cancel();
            self.prepare_failed();
            return Ok(PrepareOutcome {
                success: false,
                message: "Transport refused the profile build".to_string(),
                code: None,
            });
        }

        let event = timeout(self.config.prepare_timeout(), pending).await;
        self.transport.on_prepare(None);
        lock_resolver(&self.prepare).cancel();

        let event = match event {
            Ok(Ok(event)) => event,
            Ok(Err(_)) => return Ok(self.prepare_aborted()),
            Err(_) => {
                warn!("Profile prepare timed out");
                self.prepare_failed();
                return Ok(PrepareOutcome {
                    success: false,
                    message: "Timed out waiting for profile prepare".to_string(),
                    code: None,
                });
            }
        };

        let mut link = lock(&self.link);
        if link.state != ConnectionState::PreparingProfile {
            return Ok(self.prepare_aborted());
        }
        let message = prepare_message(event.status).to_string();
        if event.status != PREPARE_OK {
            error!("Profile prepare failed: {} ({})", message, event.status);
            link.transition(ConnectionState::Failed);
            link.transition(ConnectionState::Connected);
            return Ok(PrepareOutcome {
                success: false,
                message,
                code: Some(event.status),
            });
        }

        let Some(address) = link.session.as_ref().map(|session| session.address) else {
            return Ok(self.prepare_aborted());
        };
        if let Some(session) = link.session.as_mut() {
            session.profile = Some(event.profile);
        }
        link.registry.set_profile(&address, event.profile);
        link.transition(ConnectionState::Ready);
        info!("Profile {:?} ready for {}", event.profile, address);
        Ok(PrepareOutcome {
            success: true,
            message,
            code: Some(event.status),
        })
    }

    fn prepare_failed(&self) {
        let mut link = lock(&self.link);
        if link.state == ConnectionState::PreparingProfile {
            link.transition(ConnectionState::Failed);
            link.transition(ConnectionState::Connected);
        }
    }

    fn prepare_aborted(&self) -> PrepareOutcome {
        debug!("Profile prepare abandoned");
        PrepareOutcome {
            success: false,
            message: "Profile preparation aborted".to_string(),
            code: None,
        }
    }

    /// Full teardown, safe from any state.
    pub fn quit(&self) {
        self.stop_scan();
        let session = {
            let mut link = lock(&self.link);
            let session = link.end_session();
            link.transition(ConnectionState::Idle);
            session
        };
        lock_resolver(&self.connect).cancel();
        lock_resolver(&self.prepare).cancel();

        if let Some(session) = &session {
            info!("Tearing down session to {}", session.address);
            self.transport.disconnect(session.connection);
        }
        self.transport.disable_all_callbacks();
        if let Some(profile) = session.and_then(|session| session.profile) {
            self.transport.destroy_profile(profile);
        }
    }
}

fn lock_resolver<T>(resolver: &SharedResolver<T>) -> std::sync::MutexGuard<'_, Resolver<T>> {
    resolver.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
