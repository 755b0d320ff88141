//! Response decoding and status-code mapping.
//!
//! Response layout:
//!
//! ```text
//! +--------+-------------------------------------------+
//! | status | status == 0: operation payload            |
//! | 1 byte | status != 0: error message (string)       |
//! +--------+-------------------------------------------+
//! ```

use crate::codec::{WireReader, WireWriter};
use crate::error::{ErrorCode, WireError};
use crate::options::TableLimits;
use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Reads the status byte and raises the mapped error for nonzero statuses.
///
/// Every response passes through here before its payload is decoded; the
/// payload of an error response is never looked at.
pub fn read_and_check_error(reader: &mut WireReader<'_>) -> Result<(), WireError> {
    let status = reader.read_byte()?;
    match ErrorCode::from_status(status) {
        None => Ok(()),
        Some(code) => {
            let message = reader.read_string()?.unwrap_or_default();
            Err(WireError::Service { code, message })
        }
    }
}

/// A response payload that can be decoded after a successful status.
pub trait Response: Sized {
    fn read_payload(reader: &mut WireReader<'_>) -> Result<Self, WireError>;
}

/// Checks the status of a raw response and decodes its payload.
pub fn decode_response<T: Response>(bytes: &[u8]) -> Result<T, WireError> {
    let mut reader = WireReader::new(bytes);
    read_and_check_error(&mut reader)?;
    T::read_payload(&mut reader)
}

/// Builds response envelopes. Used by service mocks and benchmarks.
pub struct ResponseWriter;

impl ResponseWriter {
    /// Starts a success response; the caller appends the payload.
    pub fn success() -> WireWriter {
        let mut writer = WireWriter::new();
        writer.write_byte(ErrorCode::SUCCESS);
        writer
    }

    /// Encodes a complete error response.
    pub fn error(code: ErrorCode, message: &str) -> Result<Bytes, WireError> {
        let mut writer = WireWriter::new();
        writer.write_byte(code.status());
        writer.write_string(Some(message))?;
        Ok(writer.freeze())
    }
}

/// Lifecycle state of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TableState {
    Active = 0,
    Creating = 1,
    Dropped = 2,
    Dropping = 3,
    Updating = 4,
}

impl TableState {
    /// Returns whether no further transition is pending.
    pub fn is_terminal(self) -> bool {
        matches!(self, TableState::Active | TableState::Dropped)
    }
}

impl TryFrom<u8> for TableState {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TableState::Active),
            1 => Ok(TableState::Creating),
            2 => Ok(TableState::Dropped),
            3 => Ok(TableState::Dropping),
            4 => Ok(TableState::Updating),
            other => Err(WireError::Malformed(format!(
                "unknown table state: {}",
                other
            ))),
        }
    }
}

/// Table status returned by table requests and table lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct TableResult {
    pub compartment: Option<String>,
    pub table_name: String,
    pub state: TableState,
    pub limits: Option<TableLimits>,
    /// Table schema as JSON text.
    pub schema: Option<String>,
    /// Identifier of the pending DDL operation, if any.
    pub operation_id: Option<String>,
}

impl TableResult {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Parses the schema text as JSON.
    pub fn schema_json(&self) -> Result<Option<serde_json::Value>, WireError> {
        self.schema
            .as_deref()
            .map(|s| {
                serde_json::from_str(s)
                    .map_err(|e| WireError::Malformed(format!("invalid table schema: {}", e)))
            })
            .transpose()
    }

    pub fn write(&self, writer: &mut WireWriter) -> Result<(), WireError> {
        writer.write_string(self.compartment.as_deref())?;
        writer.write_string(Some(&self.table_name))?;
        writer.write_byte(self.state as u8);
        TableLimits::write_block(self.limits.as_ref(), writer);
        writer.write_string(self.schema.as_deref())?;
        writer.write_string(self.operation_id.as_deref())
    }
}

impl Response for TableResult {
    fn read_payload(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        let compartment = reader.read_string()?;
        let table_name = reader.read_required_string("table_name")?;
        let state = TableState::try_from(reader.read_byte()?)?;
        let limits = TableLimits::read_block(reader)?;
        let schema = reader.read_string()?;
        let operation_id = reader.read_string()?;
        Ok(Self {
            compartment,
            table_name,
            state,
            limits,
            schema,
            operation_id,
        })
    }
}

/// One usage period of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    pub start_time: Option<DateTime<Utc>>,
    pub seconds_in_period: i32,
    pub read_units: i32,
    pub write_units: i32,
    pub storage_gb: i32,
    pub read_throttle_count: i32,
    pub write_throttle_count: i32,
    pub storage_throttle_count: i32,
}

impl UsageRecord {
    fn write(&self, writer: &mut WireWriter) {
        writer.write_unix_millis(self.start_time);
        writer.write_int(self.seconds_in_period);
        writer.write_int(self.read_units);
        writer.write_int(self.write_units);
        writer.write_int(self.storage_gb);
        writer.write_int(self.read_throttle_count);
        writer.write_int(self.write_throttle_count);
        writer.write_int(self.storage_throttle_count);
    }

    fn read(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            start_time: reader.read_unix_millis()?,
            seconds_in_period: reader.read_int()?,
            read_units: reader.read_int()?,
            write_units: reader.read_int()?,
            storage_gb: reader.read_int()?,
            read_throttle_count: reader.read_int()?,
            write_throttle_count: reader.read_int()?,
            storage_throttle_count: reader.read_int()?,
        })
    }
}

/// Usage records returned by a table usage request.
#[derive(Debug, Clone, PartialEq)]
pub struct TableUsageResult {
    pub table_name: String,
    pub records: Vec<UsageRecord>,
}

impl TableUsageResult {
    pub fn write(&self, writer: &mut WireWriter) -> Result<(), WireError> {
        writer.write_string(Some(&self.table_name))?;
        let count = i32::try_from(self.records.len()).map_err(|_| {
            WireError::invalid_argument(format!("too many usage records: {}", self.records.len()))
        })?;
        writer.write_int(count);
        for record in &self.records {
            record.write(writer);
        }
        Ok(())
    }
}

impl Response for TableUsageResult {
    fn read_payload(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        let table_name = reader.read_required_string("table_name")?;
        let count = reader.read_int()?;
        if count < 0 {
            return Err(WireError::Malformed(format!(
                "negative usage record count: {}",
                count
            )));
        }

        let mut records = Vec::new();
        for _ in 0..count {
            records.push(UsageRecord::read(reader)?);
        }
        Ok(Self {
            table_name,
            records,
        })
    }
}
