//! Request encoding.
//!
//! Every request shares one envelope:
//!
//! ```text
//! +----------------+--------+------------+---------------------+
//! | serial version | opcode | timeout ms | payload             |
//! | 2 bytes (i16)  | 1 byte | 4 bytes    | operation-specific  |
//! +----------------+--------+------------+---------------------+
//! ```
//!
//! A timeout of 0 asks the service to apply its default.

use crate::codec::{WireReader, WireWriter};
use crate::error::WireError;
use crate::opcode::OpCode;
use crate::options::{validate_timeout_and_poll_delay, TableDdlOptions, TableLimits};
use crate::version::SerialVersion;
use crate::MAX_REQUEST_SIZE;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};

/// An operation that can be encoded into the request envelope.
pub trait Request {
    fn opcode(&self) -> OpCode;

    /// Timeout carried in the envelope and used as the call deadline.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Checks caller-supplied parameters. Runs before anything is written.
    fn validate(&self) -> Result<(), WireError>;

    fn write_payload(
        &self,
        writer: &mut WireWriter,
        version: SerialVersion,
    ) -> Result<(), WireError>;
}

/// Encodes requests at a given serial version.
pub struct RequestSerializer;

impl RequestSerializer {
    /// Validates and encodes a request into a standalone buffer.
    pub fn serialize<R: Request + ?Sized>(
        request: &R,
        version: SerialVersion,
    ) -> Result<Bytes, WireError> {
        request.validate()?;

        let mut writer = WireWriter::new();
        Self::write_header(&mut writer, request, version)?;
        request.write_payload(&mut writer, version)?;

        if writer.len() > MAX_REQUEST_SIZE {
            return Err(WireError::invalid_argument(format!(
                "request too large: {} bytes (max {})",
                writer.len(),
                MAX_REQUEST_SIZE
            )));
        }

        Ok(writer.freeze())
    }

    fn write_header<R: Request + ?Sized>(
        writer: &mut WireWriter,
        request: &R,
        version: SerialVersion,
    ) -> Result<(), WireError> {
        writer.write_short(version.as_i16());
        request.opcode().write(writer, version)?;
        writer.write_duration_millis(request.timeout())
    }
}

/// Decoded request envelope header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestHeader {
    pub version: SerialVersion,
    pub opcode: OpCode,
    pub timeout: Option<Duration>,
}

impl RequestHeader {
    pub fn read(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        let version = SerialVersion::try_from(reader.read_short()?)?;
        let opcode = OpCode::read(reader, version)?;
        let timeout = reader.read_duration_millis()?;
        Ok(Self {
            version,
            opcode,
            timeout,
        })
    }

    fn expect_opcode(&self, opcode: OpCode) -> Result<(), WireError> {
        if self.opcode != opcode {
            return Err(WireError::Malformed(format!(
                "expected opcode {}, got {}",
                opcode, self.opcode
            )));
        }
        Ok(())
    }
}

/// Writes the DDL options block: compartment, then the limits block.
///
/// The options are validated before anything is written. The timeout travels
/// in the envelope header and the poll delay stays on the client, so neither
/// is part of this block.
pub fn write_table_ddl_options(
    writer: &mut WireWriter,
    options: &TableDdlOptions,
) -> Result<(), WireError> {
    options.validate()?;
    writer.write_string(options.compartment.as_deref())?;
    TableLimits::write_block(options.table_limits.as_ref(), writer);
    Ok(())
}

/// Reads a DDL options block; the timeout comes from the envelope header.
pub fn read_table_ddl_options(
    reader: &mut WireReader<'_>,
    timeout: Option<Duration>,
) -> Result<TableDdlOptions, WireError> {
    let compartment = reader.read_string()?;
    let table_limits = TableLimits::read_block(reader)?;
    Ok(TableDdlOptions {
        compartment,
        timeout,
        table_limits,
        poll_delay: None,
    })
}

fn require_non_empty(field: &str, value: &str) -> Result<(), WireError> {
    if value.trim().is_empty() {
        return Err(WireError::invalid_argument(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}

/// DDL statement, or a limits change on an existing table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRequest {
    pub statement: Option<String>,
    pub table_name: Option<String>,
    pub options: TableDdlOptions,
}

impl TableRequest {
    /// Creates a request executing a DDL statement.
    pub fn statement(statement: impl Into<String>) -> Self {
        Self {
            statement: Some(statement.into()),
            table_name: None,
            options: TableDdlOptions::default(),
        }
    }

    /// Creates a request changing the limits of an existing table.
    pub fn limits(table_name: impl Into<String>, limits: TableLimits) -> Self {
        Self {
            statement: None,
            table_name: Some(table_name.into()),
            options: TableDdlOptions::default().with_table_limits(limits),
        }
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Replaces the options. Limits already set on the request are kept
    /// unless the new options carry their own.
    pub fn with_options(mut self, options: TableDdlOptions) -> Self {
        let limits = options.table_limits.or(self.options.table_limits);
        self.options = options;
        self.options.table_limits = limits;
        self
    }

    pub fn read_payload(
        reader: &mut WireReader<'_>,
        header: &RequestHeader,
    ) -> Result<Self, WireError> {
        header.expect_opcode(OpCode::TableRequest)?;
        let statement = reader.read_string()?;
        let table_name = reader.read_string()?;
        let options = read_table_ddl_options(reader, header.timeout)?;
        Ok(Self {
            statement,
            table_name,
            options,
        })
    }
}

impl Request for TableRequest {
    fn opcode(&self) -> OpCode {
        OpCode::TableRequest
    }

    fn timeout(&self) -> Option<Duration> {
        self.options.timeout
    }

    fn validate(&self) -> Result<(), WireError> {
        self.options.validate()?;

        match (&self.statement, &self.table_name) {
            (Some(statement), _) => require_non_empty("statement", statement),
            (None, Some(table_name)) => {
                require_non_empty("table name", table_name)?;
                if self.options.table_limits.is_none() {
                    return Err(WireError::invalid_argument(
                        "table request without a statement must carry table limits",
                    ));
                }
                Ok(())
            }
            (None, None) => Err(WireError::invalid_argument(
                "table request needs a statement or a table name",
            )),
        }
    }

    fn write_payload(
        &self,
        writer: &mut WireWriter,
        _version: SerialVersion,
    ) -> Result<(), WireError> {
        writer.write_string(self.statement.as_deref())?;
        writer.write_string(self.table_name.as_deref())?;
        write_table_ddl_options(writer, &self.options)
    }
}

/// Status lookup for a table, optionally for one pending operation.
#[derive(Debug, Clone, PartialEq)]
pub struct GetTableRequest {
    pub table_name: String,
    pub operation_id: Option<String>,
    pub compartment: Option<String>,
    pub timeout: Option<Duration>,
}

impl GetTableRequest {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            operation_id: None,
            compartment: None,
            timeout: None,
        }
    }

    pub fn with_operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    pub fn with_compartment(mut self, compartment: impl Into<String>) -> Self {
        self.compartment = Some(compartment.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn read_payload(
        reader: &mut WireReader<'_>,
        header: &RequestHeader,
    ) -> Result<Self, WireError> {
        header.expect_opcode(OpCode::GetTable)?;
        let compartment = reader.read_string()?;
        let table_name = reader.read_required_string("table_name")?;
        let operation_id = reader.read_string()?;
        Ok(Self {
            table_name,
            operation_id,
            compartment,
            timeout: header.timeout,
        })
    }
}

impl Request for GetTableRequest {
    fn opcode(&self) -> OpCode {
        OpCode::GetTable
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn validate(&self) -> Result<(), WireError> {
        validate_timeout_and_poll_delay(self.timeout, None)?;
        require_non_empty("table name", &self.table_name)
    }

    fn write_payload(
        &self,
        writer: &mut WireWriter,
        _version: SerialVersion,
    ) -> Result<(), WireError> {
        writer.write_string(self.compartment.as_deref())?;
        writer.write_string(Some(&self.table_name))?;
        writer.write_string(self.operation_id.as_deref())
    }
}

/// Usage records for a table over an optional time window.
#[derive(Debug, Clone, PartialEq)]
pub struct TableUsageRequest {
    pub table_name: String,
    pub compartment: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Maximum number of records; 0 lets the service decide.
    pub limit: i32,
    pub timeout: Option<Duration>,
}

impl TableUsageRequest {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            compartment: None,
            start_time: None,
            end_time: None,
            limit: 0,
            timeout: None,
        }
    }

    pub fn with_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }

    pub fn with_limit(mut self, limit: i32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_compartment(mut self, compartment: impl Into<String>) -> Self {
        self.compartment = Some(compartment.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Request for TableUsageRequest {
    fn opcode(&self) -> OpCode {
        OpCode::GetTableUsage
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn validate(&self) -> Result<(), WireError> {
        validate_timeout_and_poll_delay(self.timeout, None)?;
        require_non_empty("table name", &self.table_name)?;
        if self.limit < 0 {
            return Err(WireError::invalid_argument(format!(
                "usage limit must not be negative, got {}",
                self.limit
            )));
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if start > end {
                return Err(WireError::invalid_argument(format!(
                    "usage window start {} is after end {}",
                    start, end
                )));
            }
        }
        Ok(())
    }

    fn write_payload(
        &self,
        writer: &mut WireWriter,
        _version: SerialVersion,
    ) -> Result<(), WireError> {
        writer.write_string(self.compartment.as_deref())?;
        writer.write_string(Some(&self.table_name))?;
        writer.write_unix_millis(self.start_time);
        writer.write_unix_millis(self.end_time);
        writer.write_int(self.limit);
        Ok(())
    }
}

/// Adds a replica of a table in another region.
#[derive(Debug, Clone, PartialEq)]
pub struct AddReplicaRequest {
    pub table_name: String,
    pub region: String,
    pub compartment: Option<String>,
    /// Read units for the replica; 0 inherits from the source table.
    pub read_units: i32,
    /// Write units for the replica; 0 inherits from the source table.
    pub write_units: i32,
    pub timeout: Option<Duration>,
}

impl AddReplicaRequest {
    pub fn new(table_name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            region: region.into(),
            compartment: None,
            read_units: 0,
            write_units: 0,
            timeout: None,
        }
    }

    pub fn with_units(mut self, read_units: i32, write_units: i32) -> Self {
        self.read_units = read_units;
        self.write_units = write_units;
        self
    }

    pub fn with_compartment(mut self, compartment: impl Into<String>) -> Self {
        self.compartment = Some(compartment.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Request for AddReplicaRequest {
    fn opcode(&self) -> OpCode {
        OpCode::AddReplica
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn validate(&self) -> Result<(), WireError> {
        validate_timeout_and_poll_delay(self.timeout, None)?;
        require_non_empty("table name", &self.table_name)?;
        require_non_empty("region", &self.region)?;
        if self.read_units < 0 || self.write_units < 0 {
            return Err(WireError::invalid_argument(format!(
                "replica units must not be negative, got read={} write={}",
                self.read_units, self.write_units
            )));
        }
        Ok(())
    }

    fn write_payload(
        &self,
        writer: &mut WireWriter,
        _version: SerialVersion,
    ) -> Result<(), WireError> {
        writer.write_string(self.compartment.as_deref())?;
        writer.write_string(Some(&self.table_name))?;
        writer.write_string(Some(&self.region))?;
        writer.write_int(self.read_units);
        writer.write_int(self.write_units);
        Ok(())
    }
}
