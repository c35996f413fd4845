use async_trait::async_trait;
use uuid::Uuid;

use crate::Result;
use crate::api::event::{EventHandler, EventKind};
use crate::api::operation::WriteType;
use crate::api::profile::ProfileTree;
use crate::error::Error;

/// Transport connect codes.
pub const CONNECT_OK: i32 = 0;
pub const CONNECT_DISCONNECTED: i32 = 2;

#[async_trait]
pub trait CentralManager: Send + Sync {
    async fn connect(&self, address: &str) -> Result<ConnectOutcome>;

    async fn disconnect(&self) -> Result<bool>;

    async fn pair(&self) -> Result<()>;

    async fn prepare_profile(&self, tree: &ProfileTree) -> Result<PrepareOutcome>;

    async fn read_characteristic(&self, characteristic: Uuid) -> Result<Vec<u8>>;

    async fn write_characteristic(
        &self,
        characteristic: Uuid,
        data: &[u8],
        write_type: WriteType,
    ) -> Result<()>;

    async fn read_descriptor(&self, characteristic: Uuid, descriptor: Uuid) -> Result<Vec<u8>>;

    async fn write_descriptor(
        &self,
        characteristic: Uuid,
        descriptor: Uuid,
        data: &[u8],
    ) -> Result<()>;

    // enable notifications or indications through the CCCD
    async fn enable_notifications(&self, characteristic: Uuid, indicate: bool) -> Result<()>;

    async fn disable_notifications(&self, characteristic: Uuid) -> Result<()>;

    fn on(&self, kind: EventKind, handler: EventHandler);

    fn off(&self, kind: EventKind);

    async fn quit(&self);
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConnectStatus {
    Connected,
    AlreadyConnected,
    Disconnected,
    Failed { code: i32 },
    TimedOut,
    Aborted,
}

impl ConnectStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            CONNECT_OK => ConnectStatus::Connected,
            CONNECT_DISCONNECTED => ConnectStatus::Disconnected,
            code => ConnectStatus::Failed { code },
        }
    }
}

/// What the caller learns from a connect attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectOutcome {
    pub connected: bool,
    pub status: ConnectStatus,
}

impl ConnectOutcome {
    pub(crate) fn success(status: ConnectStatus) -> Self {
        ConnectOutcome {
            connected: true,
            status,
        }
    }

    pub(crate) fn failure(status: ConnectStatus) -> Self {
        ConnectOutcome {
            connected: false,
            status,
        }
    }
}

/// What the caller learns from a profile prepare.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PrepareOutcome {
    pub success: bool,
    pub message: String,
    pub code: Option<i32>,
}

impl PrepareOutcome {
    pub fn into_result(self) -> Result<()> {
        if self.success {
            return Ok(());
        }
        Err(Error::BackendRejected {
            code: self.code.unwrap_or(crate::error::STATUS_CALL_REJECTED),
            message: self.message,
        })
    }
}
