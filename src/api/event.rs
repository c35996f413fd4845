use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use uuid::Uuid;

use crate::api::transport::{ConnectionId, ProfileHandle};

/// Push-event capabilities the transport lets us register handlers for.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum EventKind {
    CharacteristicRead,
    CharacteristicValue,
    CharacteristicWrite,
    DescriptorRead,
    DescriptorValue,
    DescriptorWrite,
    Notification,
    ServiceChangeBegin,
    ServiceChangeEnd,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        EventKind::CharacteristicRead,
        EventKind::CharacteristicValue,
        EventKind::CharacteristicWrite,
        EventKind::DescriptorRead,
        EventKind::DescriptorValue,
        EventKind::DescriptorWrite,
        EventKind::Notification,
        EventKind::ServiceChangeBegin,
        EventKind::ServiceChangeEnd,
    ];

    /// The queue completion this event unblocks, if any. Both "read complete"
    /// and "value arrived" finish a pending read.
    pub fn completion(self) -> Option<CompletionKind> {
        match self {
            EventKind::CharacteristicRead | EventKind::CharacteristicValue => {
                Some(CompletionKind::CharacteristicRead)
            }
            EventKind::DescriptorRead | EventKind::DescriptorValue => {
                Some(CompletionKind::DescriptorRead)
            }
            EventKind::CharacteristicWrite => Some(CompletionKind::CharacteristicWrite),
            EventKind::DescriptorWrite => Some(CompletionKind::DescriptorWrite),
            EventKind::Notification
            | EventKind::ServiceChangeBegin
            | EventKind::ServiceChangeEnd => None,
        }
    }
}

/// The four completions an in-flight operation can wait on.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CompletionKind {
    CharacteristicWrite,
    DescriptorWrite,
    CharacteristicRead,
    DescriptorRead,
}

impl CompletionKind {
    pub(crate) fn index(self) -> usize {
        match self {
            CompletionKind::CharacteristicWrite => 0,
            CompletionKind::DescriptorWrite => 1,
            CompletionKind::CharacteristicRead => 2,
            CompletionKind::DescriptorRead => 3,
        }
    }
}

impl Display for CompletionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let text = match self {
            CompletionKind::CharacteristicWrite => "characteristic write",
            CompletionKind::DescriptorWrite => "descriptor write",
            CompletionKind::CharacteristicRead => "characteristic read",
            CompletionKind::DescriptorRead => "descriptor read",
        };
        f.write_str(text)
    }
}

/// Payload of every attribute push-event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GattEvent {
    pub profile: ProfileHandle,
    /// Characteristic UUID, or the service UUID for service-change events.
    pub uuid: Uuid,
    /// Set for descriptor events.
    pub descriptor: Option<Uuid>,
    pub data: Option<Vec<u8>>,
    pub status: Option<i32>,
}

impl GattEvent {
    pub fn new(profile: ProfileHandle, uuid: Uuid) -> Self {
        GattEvent {
            profile,
            uuid,
            descriptor: None,
            data: None,
            status: None,
        }
    }

    pub fn with_descriptor(mut self, descriptor: Uuid) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_status(mut self, status: i32) -> Self {
        self.status = Some(status);
        self
    }
}

/// Reported by the transport's connect callback.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectEvent {
    /// Address as the transport reports it; not trusted for non-zero codes.
    pub address: String,
    pub connection: ConnectionId,
    pub status: i32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PrepareEvent {
    pub status: i32,
    pub profile: ProfileHandle,
}

/// One raw advertisement sighting.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanRecord {
    pub address: [u8; 6],
    pub name: Option<String>,
    pub rssi: i16,
    pub service_uuids: Vec<Uuid>,
    pub service_data: Vec<(Uuid, Vec<u8>)>,
    pub vendor_id: Option<u16>,
    pub vendor_data: Option<Vec<u8>>,
}

pub type EventHandler = Arc<dyn Fn(GattEvent) + Send + Sync>;
pub type ConnectHandler = Arc<dyn Fn(ConnectEvent) + Send + Sync>;
pub type PrepareHandler = Arc<dyn Fn(PrepareEvent) + Send + Sync>;
pub type ScanHandler = Arc<dyn Fn(ScanRecord) + Send + Sync>;
