//! Per-call options for DDL operations and their validation.
//!
//! Validation is a pure check and always runs before a request touches the
//! output buffer.

use crate::codec::{WireReader, WireWriter};
use crate::error::WireError;
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Throughput and storage limits for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLimits {
    pub read_units: i32,
    pub write_units: i32,
    pub storage_gb: i32,
}

impl TableLimits {
    pub fn new(read_units: i32, write_units: i32, storage_gb: i32) -> Self {
        Self {
            read_units,
            write_units,
            storage_gb,
        }
    }

    /// Checks that every component is strictly positive.
    pub fn validate(&self) -> Result<(), WireError> {
        validate_table_limits(self)
    }

    /// Writes an optional limits block: a presence flag, then three ints.
    pub fn write_block(limits: Option<&TableLimits>, writer: &mut WireWriter) {
        match limits {
            Some(limits) => {
                writer.write_bool(true);
                writer.write_int(limits.read_units);
                writer.write_int(limits.write_units);
                writer.write_int(limits.storage_gb);
            }
            None => writer.write_bool(false),
        }
    }

    pub fn read_block(reader: &mut WireReader<'_>) -> Result<Option<TableLimits>, WireError> {
        if !reader.read_bool()? {
            return Ok(None);
        }
        Ok(Some(TableLimits {
            read_units: reader.read_int()?,
            write_units: reader.read_int()?,
            storage_gb: reader.read_int()?,
        }))
    }
}

/// Options shared by DDL operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableDdlOptions {
    /// Compartment (namespace) the table lives in; service default if unset.
    pub compartment: Option<String>,
    /// Upper bound for the operation, including any wait for completion.
    pub timeout: Option<Duration>,
    /// New limits for the table.
    pub table_limits: Option<TableLimits>,
    /// Interval between completion checks. Never sent to the service.
    pub poll_delay: Option<Duration>,
}

impl TableDdlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compartment(mut self, compartment: impl Into<String>) -> Self {
        self.compartment = Some(compartment.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_table_limits(mut self, limits: TableLimits) -> Self {
        self.table_limits = Some(limits);
        self
    }

    pub fn with_poll_delay(mut self, poll_delay: Duration) -> Self {
        self.poll_delay = Some(poll_delay);
        self
    }

    pub fn validate(&self) -> Result<(), WireError> {
        validate_timeout_and_poll_delay(self.timeout, self.poll_delay)?;
        if let Some(ref limits) = self.table_limits {
            validate_table_limits(limits)?;
        }
        Ok(())
    }
}

/// Validates an optional timeout against an optional poll delay.
///
/// Both must be strictly positive when present, and the poll delay must not
/// exceed the timeout when both are present. The timeout is sent as i32
/// milliseconds, so it must also fit that range.
pub fn validate_timeout_and_poll_delay(
    timeout: Option<Duration>,
    poll_delay: Option<Duration>,
) -> Result<(), WireError> {
    if let Some(timeout) = timeout {
        if timeout <= Duration::zero() {
            return Err(WireError::invalid_argument(format!(
                "timeout must be positive, got {}ms",
                timeout.num_milliseconds()
            )));
        }
        if timeout.num_milliseconds() > i32::MAX as i64 {
            return Err(WireError::invalid_argument(format!(
                "timeout too large: {}ms (max {}ms)",
                timeout.num_milliseconds(),
                i32::MAX
            )));
        }
    }

    if let Some(poll_delay) = poll_delay {
        if poll_delay <= Duration::zero() {
            return Err(WireError::invalid_argument(format!(
                "poll delay must be positive, got {}ms",
                poll_delay.num_milliseconds()
            )));
        }
    }

    if let (Some(timeout), Some(poll_delay)) = (timeout, poll_delay) {
        if poll_delay > timeout {
            return Err(WireError::invalid_argument(format!(
                "poll delay {}ms exceeds timeout {}ms",
                poll_delay.num_milliseconds(),
                timeout.num_milliseconds()
            )));
        }
    }

    Ok(())
}

/// Validates that every limit component is strictly positive.
pub fn validate_table_limits(limits: &TableLimits) -> Result<(), WireError> {
    let components = [
        ("read units", limits.read_units),
        ("write units", limits.write_units),
        ("storage GB", limits.storage_gb),
    ];
    for (name, value) in components {
        if value <= 0 {
            return Err(WireError::invalid_argument(format!(
                "table limit {} must be positive, got {}",
                name, value
            )));
        }
    }
    Ok(())
}
