use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::api::address::MacAddress;
use crate::api::event::ScanRecord;
use crate::api::transport::{ConnectionId, ProfileHandle};

/// A peripheral seen via scan or a direct connect attempt.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Device {
    pub address: MacAddress,
    pub name: Option<String>,
    pub rssi: Option<i16>,
    pub service_uuids: Vec<Uuid>,
    pub service_data: HashMap<Uuid, Vec<u8>>,
    pub vendor_id: Option<u16>,
    pub vendor_data: Option<Vec<u8>>,
    /// Present only while connected.
    pub connection_id: Option<ConnectionId>,
    /// Present only once a profile has been prepared for the connection.
    pub profile_handle: Option<ProfileHandle>,
    pub is_connected: bool,
}

impl Device {
    pub fn new(address: MacAddress) -> Self {
        Device {
            address,
            name: None,
            rssi: None,
            service_uuids: Vec::new(),
            service_data: HashMap::new(),
            vendor_id: None,
            vendor_data: None,
            connection_id: None,
            profile_handle: None,
            is_connected: false,
        }
    }

    pub(crate) fn merge(&mut self, update: DeviceUpdate) {
        if let Some(name) = update.name {
            self.name = Some(name);
        }
        if let Some(rssi) = update.rssi {
            self.rssi = Some(rssi);
        }
        for uuid in update.service_uuids {
            if !self.service_uuids.contains(&uuid) {
                self.service_uuids.push(uuid);
            }
        }
        self.service_data.extend(update.service_data);
        if let Some(vendor_id) = update.vendor_id {
            self.vendor_id = Some(vendor_id);
        }
        if let Some(vendor_data) = update.vendor_data {
            self.vendor_data = Some(vendor_data);
        }
    }
}

/// Metadata to merge into a registry entry. `None` fields leave the entry as is.
#[derive(Clone, Debug, Default)]
pub struct DeviceUpdate {
    pub name: Option<String>,
    pub rssi: Option<i16>,
    pub service_uuids: Vec<Uuid>,
    pub service_data: HashMap<Uuid, Vec<u8>>,
    pub vendor_id: Option<u16>,
    pub vendor_data: Option<Vec<u8>>,
}

impl From<ScanRecord> for DeviceUpdate {
    fn from(record: ScanRecord) -> Self {
        DeviceUpdate {
            name: record.name.filter(|name| !name.is_empty()),
            rssi: Some(record.rssi),
            service_uuids: record.service_uuids,
            service_data: record.service_data.into_iter().collect(),
            vendor_id: record.vendor_id,
            vendor_data: record.vendor_data,
        }
    }
}
