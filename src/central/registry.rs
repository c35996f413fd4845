//! Identity and metadata store for every peripheral seen via scan or
//! direct connect, keyed by normalized address and kept in first-seen order.

use std::collections::HashMap;

use log::{debug, trace};
use uuid::Uuid;

use crate::api::address::{AddressPattern, MacAddress};
use crate::api::device::{Device, DeviceUpdate};
use crate::api::event::ScanRecord;
use crate::api::transport::{ConnectionId, ProfileHandle};

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
    index: HashMap<MacAddress, usize>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn get(&self, address: &MacAddress) -> Option<&Device> {
        self.index.get(address).map(|&i| &self.devices[i])
    }

    fn get_mut(&mut self, address: &MacAddress) -> Option<&mut Device> {
        self.index.get(address).map(|&i| &mut self.devices[i])
    }

    /// Merges `update` into the entry for `address`, creating it if needed.
    pub fn upsert(&mut self, address: MacAddress, update: DeviceUpdate) -> &Device {
        let i = match self.index.get(&address) {
            Some(&i) => i,
            None => {
                debug!("Registering device {}", address);
                self.devices.push(Device::new(address));
                self.index.insert(address, self.devices.len() - 1);
                self.devices.len() - 1
            }
        };
        self.devices[i].merge(update);
        &self.devices[i]
    }

    pub fn ingest(&mut self, record: ScanRecord) -> &Device {
        let address = MacAddress::new(record.address);
        trace!("Scan record for {} rssi {}", address, record.rssi);
        self.upsert(address, DeviceUpdate::from(record))
    }

    /// Exact lookup, or the first entry matching an `xx` wildcard pattern.
    pub fn find(&self, address_or_pattern: &str) -> Option<&Device> {
        let pattern: AddressPattern = address_or_pattern.parse().ok()?;
        if pattern.is_exact() {
            let address: MacAddress = address_or_pattern.parse().ok()?;
            return self.get(&address);
        }
        self.devices.iter().find(|device| pattern.matches(&device.address))
    }

    pub fn find_by_name(&self, name: &str, partial: bool) -> Option<&Device> {
        self.devices.iter().find(|device| {
            device.name.as_deref().is_some_and(|candidate| {
                if partial {
                    candidate.contains(name)
                } else {
                    candidate == name
                }
            })
        })
    }

    pub fn find_by_service(&self, service: &Uuid) -> Option<&Device> {
        self.devices.iter().find(|device| {
            device.service_uuids.contains(service) || device.service_data.contains_key(service)
        })
    }

    /// Matches on vendor id and, when given, a prefix of the vendor data.
    pub fn find_by_vendor(&self, vendor_id: u16, data: Option<&[u8]>) -> Option<&Device> {
        self.devices.iter().find(|device| {
            device.vendor_id == Some(vendor_id)
                && data.is_none_or(|prefix| {
                    device
                        .vendor_data
                        .as_deref()
                        .is_some_and(|vendor_data| vendor_data.starts_with(prefix))
                })
        })
    }

    /// Returns false when the address is unknown.
    pub fn mark_connected(&mut self, address: &MacAddress, connection: ConnectionId) -> bool {
        match self.get_mut(address) {
            Some(device) => {
                device.is_connected = true;
                device.connection_id = Some(connection);
                true
            }
            None => false,
        }
    }

    /// Clears the transient connection fields. Returns false when the address is unknown.
    pub fn mark_disconnected(&mut self, address: &MacAddress) -> bool {
        match self.get_mut(address) {
            Some(device) => {
                device.is_connected = false;
                device.connection_id = None;
                device.profile_handle = None;
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_profile(&mut self, address: &MacAddress, profile: ProfileHandle) -> bool {
        match self.get_mut(address) {
            Some(device) if device.is_connected => {
                device.profile_handle = Some(profile);
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, address: &MacAddress) -> Option<Device> {
        let i = self.index.remove(address)?;
        let device = self.devices.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(device)
    }

    /// Drops every entry that is not connected, keeping first-seen order.
    pub fn clear(&mut self) {
        self.devices.retain(|device| device.is_connected);
        self.index = self
            .devices
            .iter()
            .enumerate()
            .map(|(i, device)| (device.address, i))
            .collect();
        debug!("Registry cleared, {} connected entries kept", self.devices.len());
    }
}
