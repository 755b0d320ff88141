//! Operation codes.

use crate::codec::{WireReader, WireWriter};
use crate::error::WireError;
use crate::version::SerialVersion;
use std::fmt;

/// Stable integer tag identifying the operation a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // Data operations
    Delete = 0,
    DeleteIfVersion = 1,
    Get = 2,
    Put = 3,
    PutIfAbsent = 4,
    PutIfPresent = 5,
    PutIfVersion = 6,
    Query = 7,
    Prepare = 8,
    WriteMultiple = 9,
    MultiDelete = 10,

    // Table metadata
    GetTable = 11,
    GetIndexes = 12,
    GetTableUsage = 13,
    ListTables = 14,

    // DDL
    TableRequest = 15,
    Scan = 16,
    IndexScan = 17,
    CreateTable = 18,
    AlterTable = 19,
    DropTable = 20,
    CreateIndex = 21,
    DropIndex = 22,

    // System
    SystemRequest = 23,
    SystemStatusRequest = 24,

    // Multi-region tables
    AddReplica = 33,
    DropReplica = 34,
    GetReplicaStats = 35,
}

impl OpCode {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Lowest serial version at which this opcode exists.
    pub fn min_version(self) -> SerialVersion {
        match self {
            OpCode::AddReplica | OpCode::DropReplica | OpCode::GetReplicaStats => {
                SerialVersion::V3
            }
            _ => SerialVersion::V2,
        }
    }

    pub fn is_supported_at(self, version: SerialVersion) -> bool {
        version >= self.min_version()
    }

    /// Writes the opcode byte for the given serial version.
    pub fn write(self, writer: &mut WireWriter, version: SerialVersion) -> Result<(), WireError> {
        if !self.is_supported_at(version) {
            return Err(WireError::UnsupportedFeature {
                feature: format!("opcode {}", self),
                required: self.min_version(),
                negotiated: version,
            });
        }
        writer.write_byte(self.code());
        Ok(())
    }

    /// Reads an opcode byte, rejecting tags unknown at the given version.
    pub fn read(reader: &mut WireReader<'_>, version: SerialVersion) -> Result<Self, WireError> {
        let code = reader.read_byte()?;
        let op = OpCode::try_from(code)?;
        if !op.is_supported_at(version) {
            return Err(WireError::Malformed(format!(
                "opcode {} not valid at serial version {}",
                op, version
            )));
        }
        Ok(op)
    }
}

impl TryFrom<u8> for OpCode {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let op = match value {
            0 => OpCode::Delete,
            1 => OpCode::DeleteIfVersion,
            2 => OpCode::Get,
            3 => OpCode::Put,
            4 => OpCode::PutIfAbsent,
            5 => OpCode::PutIfPresent,
            6 => OpCode::PutIfVersion,
            7 => OpCode::Query,
            8 => OpCode::Prepare,
            9 => OpCode::WriteMultiple,
            10 => OpCode::MultiDelete,
            11 => OpCode::GetTable,
            12 => OpCode::GetIndexes,
            13 => OpCode::GetTableUsage,
            14 => OpCode::ListTables,
            15 => OpCode::TableRequest,
            16 => OpCode::Scan,
            17 => OpCode::IndexScan,
            18 => OpCode::CreateTable,
            19 => OpCode::AlterTable,
            20 => OpCode::DropTable,
            21 => OpCode::CreateIndex,
            22 => OpCode::DropIndex,
            23 => OpCode::SystemRequest,
            24 => OpCode::SystemStatusRequest,
            33 => OpCode::AddReplica,
            34 => OpCode::DropReplica,
            35 => OpCode::GetReplicaStats,
            other => {
                return Err(WireError::Malformed(format!("unknown opcode: {}", other)));
            }
        };
        Ok(op)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}
