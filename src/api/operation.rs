use uuid::Uuid;

use crate::api::event::CompletionKind;

#[derive(Debug, Clone, Copy, PartialOrd, Ord, Eq, PartialEq)]
pub enum WriteType {
    WithResponse,
    WithoutResponse,
}

/// A unit of attribute I/O waiting its turn on the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    ReadCharacteristic {
        characteristic: Uuid,
    },
    WriteCharacteristic {
        characteristic: Uuid,
        data: Vec<u8>,
        write_type: WriteType,
    },
    ReadDescriptor {
        characteristic: Uuid,
        descriptor: Uuid,
    },
    WriteDescriptor {
        characteristic: Uuid,
        descriptor: Uuid,
        data: Vec<u8>,
    },
}

impl Operation {
    /// The completion this operation waits for, or `None` for fire-and-forget writes.
    pub fn completion(&self) -> Option<CompletionKind> {
        match self {
            Operation::ReadCharacteristic { .. } => Some(CompletionKind::CharacteristicRead),
            Operation::WriteCharacteristic {
                write_type: WriteType::WithoutResponse,
                ..
            } => None,
            Operation::WriteCharacteristic { .. } => Some(CompletionKind::CharacteristicWrite),
            Operation::ReadDescriptor { .. } => Some(CompletionKind::DescriptorRead),
            Operation::WriteDescriptor { .. } => Some(CompletionKind::DescriptorWrite),
        }
    }

    pub fn characteristic(&self) -> &Uuid {
        match self {
            Operation::ReadCharacteristic { characteristic }
            | Operation::WriteCharacteristic { characteristic, .. }
            | Operation::ReadDescriptor { characteristic, .. }
            | Operation::WriteDescriptor { characteristic, .. } => characteristic,
        }
    }

    pub fn descriptor(&self) -> Option<&Uuid> {
        match self {
            Operation::ReadDescriptor { descriptor, .. }
            | Operation::WriteDescriptor { descriptor, .. } => Some(descriptor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutput {
    Value(Vec<u8>),
    Written,
}

impl OperationOutput {
    pub fn into_value(self) -> Vec<u8> {
        match self {
            OperationOutput::Value(value) => value,
            OperationOutput::Written => Vec::new(),
        }
    }
}
