use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::api::address::MacAddress;
use crate::api::transport::{ConnectionId, ProfileHandle};
use crate::central::registry::DeviceRegistry;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    PreparingProfile,
    Ready,
    Disconnecting,
    Failed,
}

/// The single active connection.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    pub address: MacAddress,
    pub connection: ConnectionId,
    pub profile: Option<ProfileHandle>,
}

/// State owned by the connection state machine. The session and registry
/// live under one lock so a session never outlives its connected device.
#[derive(Debug)]
pub(crate) struct Link {
    pub state: ConnectionState,
    pub session: Option<Session>,
    pub registry: DeviceRegistry,
}

impl Default for Link {
    fn default() -> Self {
        Link {
            state: ConnectionState::Idle,
            session: None,
            registry: DeviceRegistry::new(),
        }
    }
}

impl Link {
    pub fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!("Connection state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Drops the session and clears the device's transient fields.
    pub fn end_session(&mut self) -> Option<Session> {
        let session = self.session.take()?;
        self.registry.mark_disconnected(&session.address);
        Some(session)
    }
}

pub(crate) type SharedLink = Arc<Mutex<Link>>;

pub(crate) fn lock(link: &SharedLink) -> MutexGuard<'_, Link> {
    link.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Read-only access to the session for the queue and the correlator.
#[derive(Clone, Debug)]
pub struct SessionView {
    link: SharedLink,
}

impl SessionView {
    pub(crate) fn new(link: SharedLink) -> Self {
        SessionView { link }
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.link).state
    }

    pub fn session(&self) -> Option<Session> {
        lock(&self.link).session.clone()
    }

    pub fn profile(&self) -> Option<ProfileHandle> {
        lock(&self.link).session.as_ref().and_then(|session| session.profile)
    }
}
