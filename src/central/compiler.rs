//! Turns a service → characteristic → descriptor map into the nested
//! attribute tree the transport builds a profile from.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::api::address::MacAddress;
use crate::api::profile::{
    CharacteristicNode, DescriptorNode, PermissionOverrides, Permissions, ProfileTree,
    ServiceMap, ServiceNode, attribute_uuid,
};
use crate::{Error, Result};

/// Root-level settings for the generated tree.
#[derive(Clone, Debug)]
pub struct ProfileTarget<'a> {
    /// Address of the connected device; `None` when nothing is connected.
    pub address: Option<&'a str>,
    pub name: &'a str,
    pub pair: bool,
}

pub fn compile_profile(
    target: &ProfileTarget<'_>,
    services: &ServiceMap,
    overrides: &PermissionOverrides,
) -> Result<ProfileTree> {
    let address = target.address.ok_or(Error::NotConnected)?;
    let device = MacAddress::parse_strict(address)?.octets();
    if services.is_empty() {
        return Err(Error::EmptyServiceMap);
    }

    let overrides = parse_overrides(overrides)?;
    let permissions = |uuid: &Uuid| {
        overrides
            .get(uuid)
            .copied()
            .map(Permissions)
            .unwrap_or_default()
    };

    let mut service_nodes = Vec::with_capacity(services.len());
    let mut seen_services = HashSet::new();
    for (service_text, characteristics) in services {
        let service_uuid = expand_unique(service_text, &mut seen_services)?;
        let mut characteristic_nodes = Vec::with_capacity(characteristics.len());
        let mut seen_characteristics = HashSet::new();
        for (characteristic_text, descriptors) in characteristics {
            let characteristic_uuid =
                expand_unique(characteristic_text, &mut seen_characteristics)?;
            let descriptors = descriptors
                .iter()
                .map(|descriptor| {
                    let uuid = attribute_uuid(descriptor)?;
                    Ok(DescriptorNode {
                        uuid,
                        permissions: permissions(&uuid),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            characteristic_nodes.push(CharacteristicNode {
                uuid: characteristic_uuid,
                permissions: permissions(&characteristic_uuid),
                len: descriptors.len(),
                descriptors,
            });
        }
        let count = characteristic_nodes.len();
        service_nodes.push(ServiceNode {
            uuid: service_uuid,
            permissions: permissions(&service_uuid),
            len: count,
            len1: count,
            len2: count,
            characteristics: characteristic_nodes,
        });
    }

    Ok(ProfileTree {
        name: target.name.to_string(),
        pair: target.pair,
        id: 0,
        device,
        len: service_nodes.len(),
        services: service_nodes,
    })
}

/// Keys that differ only in case or width expand to the same UUID.
fn expand_unique(text: &str, seen: &mut HashSet<Uuid>) -> Result<Uuid> {
    let uuid = attribute_uuid(text)?;
    if !seen.insert(uuid) {
        return Err(Error::InvalidUuid(text.to_string()));
    }
    Ok(uuid)
}

fn parse_overrides(overrides: &PermissionOverrides) -> Result<HashMap<Uuid, u8>> {
    overrides
        .iter()
        .map(|(uuid, permission)| Ok((attribute_uuid(uuid)?, *permission)))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::api::profile::uuid16;

    fn target(address: Option<&str>) -> ProfileTarget<'_> {
        ProfileTarget {
            address,
            name: "ESP32_BLE_PERIPHERAL",
            pair: true,
        }
    }

    fn battery_map() -> ServiceMap {
        BTreeMap::from([(
            "180F".to_string(),
            BTreeMap::from([("2A19".to_string(), vec!["2902".to_string()])]),
        )])
    }

    #[test]
    fn single_service_tree() {
        let tree = compile_profile(
            &target(Some("aa:bb:cc:dd:ee:ff")),
            &battery_map(),
            &PermissionOverrides::new(),
        )
        .unwrap();

        assert_eq!(tree.device, [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert_eq!(tree.len, 1);
        let service = &tree.services[0];
        assert_eq!(service.uuid, uuid16(0x180F));
        assert_eq!((service.len, service.len1, service.len2), (1, 1, 1));

        let characteristic = &service.characteristics[0];
        assert_eq!(characteristic.uuid, uuid16(0x2A19));
        assert_eq!(characteristic.permissions, Permissions(0x20));
        assert_eq!(characteristic.len, 1);

        let descriptor = &characteristic.descriptors[0];
        assert_eq!(descriptor.uuid, uuid16(0x2902));
        assert_eq!(descriptor.permissions, Permissions(0x20));
    }

    #[test]
    fn overrides_apply_after_uuid_expansion() {
        let overrides = PermissionOverrides::from([(
            "00002a19-0000-1000-8000-00805f9b34fb".to_string(),
            0x02,
        )]);
        let tree = compile_profile(
            &target(Some("aa:bb:cc:dd:ee:ff")),
            &battery_map(),
            &overrides,
        )
        .unwrap();

        let characteristic = tree.characteristic(&uuid16(0x2A19)).unwrap();
        assert_eq!(characteristic.permissions, Permissions(0x02));
        assert_eq!(characteristic.descriptors[0].permissions, Permissions::ALL);
    }

    #[test]
    fn child_counts_track_list_lengths() {
        let services = BTreeMap::from([(
            "4fafc201-1fb5-459e-8fcc-c5c9c331914b".to_string(),
            BTreeMap::from([
                ("beb5483e-36e1-4688-b7f5-ea07361b26a8".to_string(), vec![]),
                (
                    "5a87b4ef-3bfa-76a8-e642-92933c31434f".to_string(),
                    vec!["2902".to_string()],
                ),
                (
                    "c656ffc8-67ed-4045-89df-998cb1624adc".to_string(),
                    vec!["2901".to_string(), "2902".to_string()],
                ),
            ]),
        )]);
        let tree = compile_profile(
            &target(Some("aa:bb:cc:dd:ee:ff")),
            &services,
            &PermissionOverrides::new(),
        )
        .unwrap();

        let service = &tree.services[0];
        assert_eq!((service.len, service.len1, service.len2), (3, 3, 3));
        for characteristic in &service.characteristics {
            assert_eq!(characteristic.len, characteristic.descriptors.len());
        }
        let descriptors = &tree
            .characteristic(&attribute_uuid("c656ffc8-67ed-4045-89df-998cb1624adc").unwrap())
            .unwrap()
            .descriptors;
        assert_eq!(descriptors[0].uuid, uuid16(0x2901));
        assert_eq!(descriptors[1].uuid, uuid16(0x2902));
    }

    #[test]
    fn structured_failures() {
        let empty = PermissionOverrides::new();
        assert!(matches!(
            compile_profile(&target(None), &battery_map(), &empty),
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            compile_profile(&target(Some("aa:bb:cc:dd:ee")), &battery_map(), &empty),
            Err(Error::InvalidAddress(_))
        ));
        assert!(matches!(
            compile_profile(&target(Some("aa:bb:cc:dd:ee:ff")), &ServiceMap::new(), &empty),
            Err(Error::EmptyServiceMap)
        ));
    }

    #[test]
    fn keys_naming_the_same_uuid_are_rejected() {
        let empty = PermissionOverrides::new();
        let services = BTreeMap::from([
            ("180F".to_string(), BTreeMap::new()),
            ("180f".to_string(), BTreeMap::new()),
        ]);
        assert!(matches!(
            compile_profile(&target(Some("aa:bb:cc:dd:ee:ff")), &services, &empty),
            Err(Error::InvalidUuid(text)) if text == "180f"
        ));

        let services = BTreeMap::from([(
            "180F".to_string(),
            BTreeMap::from([
                ("00002a19-0000-1000-8000-00805f9b34fb".to_string(), vec![]),
                ("2A19".to_string(), vec![]),
            ]),
        )]);
        assert!(matches!(
            compile_profile(&target(Some("aa:bb:cc:dd:ee:ff")), &services, &empty),
            Err(Error::InvalidUuid(text)) if text == "2A19"
        ));
    }
}
