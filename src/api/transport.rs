use serde::Serialize;
use uuid::Uuid;

use crate::api::address::MacAddress;
use crate::api::event::{ConnectHandler, EventHandler, EventKind, PrepareHandler, ScanHandler};
use crate::api::profile::ProfileTree;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ConnectionId(pub u32);

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ProfileHandle(pub u32);

/// The native BLE stack.
///
/// Every call returns as soon as it has been handed to the stack; outcomes
/// arrive later through the registered handlers, possibly never. A `false`
/// return means the stack refused the call.
pub trait Transport: Send + Sync {
    fn start_scan(&self, handler: ScanHandler) -> bool;

    fn stop_scan(&self) -> bool;

    /// The handler fires once with the connect result and may fire again
    /// later when the link drops.
    fn connect(&self, address: &MacAddress, handler: ConnectHandler) -> bool;

    fn disconnect(&self, connection: ConnectionId) -> bool;

    /// Returns the stack's status code, 0 on success.
    fn pair(&self, connection: ConnectionId) -> i32;

    fn on_prepare(&self, handler: Option<PrepareHandler>);

    fn build_profile(&self, tree: &ProfileTree) -> bool;

    fn read_characteristic(&self, profile: ProfileHandle, characteristic: &Uuid) -> bool;

    fn write_characteristic(
        &self,
        profile: ProfileHandle,
        characteristic: &Uuid,
        data: &[u8],
    ) -> bool;

    fn write_characteristic_without_response(
        &self,
        profile: ProfileHandle,
        characteristic: &Uuid,
        data: &[u8],
    ) -> bool;

    fn read_descriptor(&self, profile: ProfileHandle, characteristic: &Uuid, descriptor: &Uuid)
    -> bool;

    fn write_descriptor(
        &self,
        profile: ProfileHandle,
        characteristic: &Uuid,
        descriptor: &Uuid,
        data: &[u8],
    ) -> bool;

    /// `None` deregisters the handler for `kind`.
    fn on_event(&self, kind: EventKind, handler: Option<EventHandler>);

    fn disable_all_callbacks(&self);

    fn destroy_profile(&self, profile: ProfileHandle) -> bool;
}
