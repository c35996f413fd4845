use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use uuid::Uuid;

use crate::{Error, Result};

/// Bluetooth base UUID, `0000xxxx-0000-1000-8000-00805f9b34fb`.
const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// Client Characteristic Configuration descriptor.
pub const CCCD_UUID: Uuid = uuid16(0x2902);

/// Attribute permission bitmask as the stack's attribute table expects it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct Permissions(pub u8);

impl Permissions {
    pub const ALL: Permissions = Permissions(0x20);
}

impl Default for Permissions {
    fn default() -> Self {
        Permissions::ALL
    }
}

/// Service UUID → characteristic UUID → ordered descriptor UUIDs.
///
/// Services and characteristics compile in key order, which is the order of
/// the UUID text as written. Two keys that expand to the same UUID (`"180F"`
/// and `"180f"`) are rejected.
pub type ServiceMap = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// UUID text → permission bitmask overriding [`Permissions::ALL`].
pub type PermissionOverrides = HashMap<String, u8>;

/// Root of the attribute tree handed to [`Transport::build_profile`].
///
/// [`Transport::build_profile`]: crate::api::transport::Transport::build_profile
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ProfileTree {
    pub name: String,
    pub pair: bool,
    pub id: u8,
    pub device: [u8; 6],
    pub len: usize,
    pub services: Vec<ServiceNode>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ServiceNode {
    pub uuid: Uuid,
    pub permissions: Permissions,
    pub len: usize,
    // Firmware reads one or the other of these; both must match `len`.
    pub len1: usize,
    pub len2: usize,
    pub characteristics: Vec<CharacteristicNode>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CharacteristicNode {
    pub uuid: Uuid,
    pub permissions: Permissions,
    pub len: usize,
    pub descriptors: Vec<DescriptorNode>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DescriptorNode {
    pub uuid: Uuid,
    pub permissions: Permissions,
}

impl ProfileTree {
    pub fn characteristic(&self, uuid: &Uuid) -> Option<&CharacteristicNode> {
        self.services
            .iter()
            .flat_map(|service| service.characteristics.iter())
            .find(|characteristic| characteristic.uuid == *uuid)
    }
}

/// Expands a 16-bit assigned number onto the base UUID.
pub const fn uuid16(short: u16) -> Uuid {
    uuid32(short as u32)
}

pub const fn uuid32(short: u32) -> Uuid {
    Uuid::from_u128(BASE_UUID | ((short as u128) << 96))
}

/// Parses 4-digit, 8-digit or full 128-bit UUID text.
pub fn attribute_uuid(text: &str) -> Result<Uuid> {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let invalid = || Error::InvalidUuid(text.to_string());
    match trimmed.len() {
        4 => u16::from_str_radix(trimmed, 16).map(uuid16).map_err(|_| invalid()),
        8 => u32::from_str_radix(trimmed, 16).map(uuid32).map_err(|_| invalid()),
        _ => Uuid::parse_str(trimmed).map_err(|_| invalid()),
    }
}
