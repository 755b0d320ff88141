//! Primitive wire encoding.
//!
//! Every field on the wire is built from the primitives below:
//!
//! ```text
//! byte / bool     1 byte            (bool: 0 = false, 1 = true)
//! short           2 bytes  i16 BE
//! int             4 bytes  i32 BE
//! long            8 bytes  i64 BE
//! string          int length + UTF-8 bytes, length -1 = absent
//! duration        int milliseconds, 0 = absent
//! timestamp       long unix milliseconds, 0 = absent
//! ```

use crate::error::WireError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Length marker for an absent string.
const NULL_LENGTH: i32 = -1;

/// Growable output buffer for one message.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn write_byte(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(value as u8);
    }

    pub fn write_short(&mut self, value: i16) {
        self.buf.put_i16(value);
    }

    pub fn write_int(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn write_long(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    /// Writes a length-prefixed UTF-8 string, or the absent marker.
    pub fn write_string(&mut self, value: Option<&str>) -> Result<(), WireError> {
        match value {
            Some(s) => {
                let len = i32::try_from(s.len()).map_err(|_| {
                    WireError::invalid_argument(format!("string too long: {} bytes", s.len()))
                })?;
                self.buf.put_i32(len);
                self.buf.put_slice(s.as_bytes());
            }
            None => self.buf.put_i32(NULL_LENGTH),
        }
        Ok(())
    }

    /// Writes a timestamp as unix milliseconds, or 0 when absent.
    pub fn write_unix_millis(&mut self, value: Option<DateTime<Utc>>) {
        self.buf
            .put_i64(value.map(|ts| ts.timestamp_millis()).unwrap_or(0));
    }

    /// Writes a duration as whole milliseconds, or 0 when absent.
    ///
    /// Durations shorter than a millisecond truncate to 0 and therefore read
    /// back as absent.
    pub fn write_duration_millis(&mut self, value: Option<Duration>) -> Result<(), WireError> {
        let millis = match value {
            Some(d) => {
                let ms = d.num_milliseconds();
                if ms < 0 {
                    return Err(WireError::invalid_argument(format!(
                        "duration must not be negative: {}ms",
                        ms
                    )));
                }
                i32::try_from(ms).map_err(|_| {
                    WireError::invalid_argument(format!("duration too large: {}ms", ms))
                })?
            }
            None => 0,
        };
        self.buf.put_i32(millis);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> BytesMut {
        self.buf
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Sequential reader over a received message.
///
/// Every read checks the remaining length first, so a short buffer yields
/// [`WireError::Truncated`] instead of a partial value.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn ensure(&self, needed: usize) -> Result<(), WireError> {
        if self.buf.remaining() < needed {
            return Err(WireError::Truncated {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<u8, WireError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        match self.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(WireError::Malformed(format!(
                "invalid boolean byte: {:#x}",
                other
            ))),
        }
    }

    pub fn read_short(&mut self) -> Result<i16, WireError> {
        self.ensure(2)?;
        Ok(self.buf.get_i16())
    }

    pub fn read_int(&mut self) -> Result<i32, WireError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_long(&mut self) -> Result<i64, WireError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    /// Reads a length-prefixed string; `None` for the absent marker.
    pub fn read_string(&mut self) -> Result<Option<String>, WireError> {
        let len = self.read_int()?;
        if len == NULL_LENGTH {
            return Ok(None);
        }
        if len < 0 {
            return Err(WireError::Malformed(format!(
                "negative string length: {}",
                len
            )));
        }

        let len = len as usize;
        self.ensure(len)?;
        let bytes = self.buf[..len].to_vec();
        self.buf.advance(len);
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| WireError::InvalidUtf8)
    }

    /// Reads a string that must be present.
    pub fn read_required_string(&mut self, field: &str) -> Result<String, WireError> {
        self.read_string()?
            .ok_or_else(|| WireError::Malformed(format!("missing required field: {}", field)))
    }

    pub fn read_unix_millis(&mut self) -> Result<Option<DateTime<Utc>>, WireError> {
        let millis = self.read_long()?;
        if millis == 0 {
            return Ok(None);
        }
        Utc.timestamp_millis_opt(millis)
            .single()
            .map(Some)
            .ok_or_else(|| WireError::Malformed(format!("timestamp out of range: {}", millis)))
    }

    pub fn read_duration_millis(&mut self) -> Result<Option<Duration>, WireError> {
        match self.read_int()? {
            0 => Ok(None),
            ms if ms < 0 => Err(WireError::Malformed(format!(
                "negative duration: {}ms",
                ms
            ))),
            ms => Ok(Some(Duration::milliseconds(ms as i64))),
        }
    }

    /// Returns the number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }
}
