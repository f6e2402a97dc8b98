// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! InfluxDB v2 Line Protocol encoding of history records.
//!
//! Every record becomes exactly one statement:
//! ```text
//! <measurement>,itemid=<id> <fields> <timestamp_ns>\n
//! ```
//!
//! See: <https://docs.influxdata.com/influxdb/v2/reference/syntax/line-protocol/>

use std::collections::TryReserveError;
use std::fmt::{self, Write as _};

use thiserror::Error;

use crate::escape;
use crate::history::{
    DataType, FloatRecord, IntegerRecord, LogRecord, StringRecord, TextRecord, Timestamp,
};

/// Errors raised while encoding a record.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The payload buffer could not grow.
    #[error("failed to grow line buffer: {0}")]
    OutOfMemory(#[from] TryReserveError),
    /// NaN and infinities have no line protocol representation.
    #[error("item {itemid}: {value} cannot be written as a line protocol float")]
    NonFinite { itemid: u64, value: f64 },
    /// A value's `Display` implementation failed.
    #[error("failed to format field value")]
    Format,
}

impl EncodeError {
    /// Whether the whole batch must be abandoned, as opposed to skipping the
    /// offending record.
    pub fn aborts_batch(&self) -> bool {
        matches!(self, EncodeError::OutOfMemory(_))
    }
}

/// Growable payload buffer with fallible appends.
///
/// Every append reserves first and reports allocation failure as
/// [`EncodeError::OutOfMemory`] rather than aborting.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve room for at least `additional` more bytes.
    pub fn reserve(&mut self, additional: usize) -> Result<(), EncodeError> {
        self.buf.try_reserve(additional)?;
        Ok(())
    }

    /// Append raw text.
    pub fn push_str(&mut self, s: &str) -> Result<(), EncodeError> {
        self.reserve(s.len())?;
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    /// Append formatted text, e.g. `line.push_fmt(format_args!("{}", 42))`.
    pub fn push_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<(), EncodeError> {
        let mut sink = FallibleSink {
            buf: &mut self.buf,
            error: None,
        };
        match sink.write_fmt(args) {
            Ok(()) => Ok(()),
            Err(fmt::Error) => Err(sink.error.map_or(EncodeError::Format, EncodeError::from)),
        }
    }

    /// Append `s` as a double-quoted, escaped string field value.
    pub fn push_quoted(&mut self, s: &str) -> Result<(), EncodeError> {
        self.reserve(escape::escaped_len(s) + 2)?;
        self.buf.push(b'"');
        escape::escape_into(&mut self.buf, s)?;
        self.buf.push(b'"');
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.buf.truncate(len);
    }
}

struct FallibleSink<'a> {
    buf: &'a mut Vec<u8>,
    error: Option<TryReserveError>,
}

impl fmt::Write for FallibleSink<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if let Err(e) = self.buf.try_reserve(s.len()) {
            self.error = Some(e);
            return Err(fmt::Error);
        }
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

/// A history record that can be written as one line protocol statement.
pub trait HistoryRecord {
    /// Value type, which selects the measurement and the destination.
    const DATA_TYPE: DataType;

    fn itemid(&self) -> u64;

    fn timestamp(&self) -> Timestamp;

    /// Append the field set: everything between the tag set and the
    /// timestamp.
    fn write_fields(&self, line: &mut LineBuffer) -> Result<(), EncodeError>;
}

impl<R: HistoryRecord> HistoryRecord for &R {
    const DATA_TYPE: DataType = R::DATA_TYPE;

    fn itemid(&self) -> u64 {
        (**self).itemid()
    }

    fn timestamp(&self) -> Timestamp {
        (**self).timestamp()
    }

    fn write_fields(&self, line: &mut LineBuffer) -> Result<(), EncodeError> {
        (**self).write_fields(line)
    }
}

/// Append one statement for `record` to `line`.
///
/// On error nothing of the statement is left in the buffer.
pub fn encode<R: HistoryRecord>(record: &R, line: &mut LineBuffer) -> Result<(), EncodeError> {
    let start = line.len();
    let result = write_statement(record, line);
    if result.is_err() {
        line.truncate(start);
    }
    result
}

fn write_statement<R: HistoryRecord>(record: &R, line: &mut LineBuffer) -> Result<(), EncodeError> {
    line.push_str(R::DATA_TYPE.measurement())?;
    line.push_fmt(format_args!(",itemid={} ", record.itemid()))?;
    record.write_fields(line)?;
    line.push_fmt(format_args!(" {}\n", record.timestamp().as_nanos()))
}

impl HistoryRecord for FloatRecord {
    const DATA_TYPE: DataType = DataType::Float;

    fn itemid(&self) -> u64 {
        self.itemid
    }

    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn write_fields(&self, line: &mut LineBuffer) -> Result<(), EncodeError> {
        if !self.value.is_finite() {
            return Err(EncodeError::NonFinite {
                itemid: self.itemid,
                value: self.value,
            });
        }
        line.push_fmt(format_args!("value={:.6}", self.value))
    }
}

// Zabbix unsigned values may exceed i64::MAX, the range of an InfluxDB
// integer. They are written without the `i` suffix and stored as floats.
impl HistoryRecord for IntegerRecord {
    const DATA_TYPE: DataType = DataType::Integer;

    fn itemid(&self) -> u64 {
        self.itemid
    }

    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn write_fields(&self, line: &mut LineBuffer) -> Result<(), EncodeError> {
        line.push_fmt(format_args!("value={}", self.value))
    }
}

impl HistoryRecord for StringRecord<'_> {
    const DATA_TYPE: DataType = DataType::String;

    fn itemid(&self) -> u64 {
        self.itemid
    }

    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn write_fields(&self, line: &mut LineBuffer) -> Result<(), EncodeError> {
        line.push_str("value=")?;
        line.push_quoted(&self.value)
    }
}

impl HistoryRecord for TextRecord<'_> {
    const DATA_TYPE: DataType = DataType::Text;

    fn itemid(&self) -> u64 {
        self.itemid
    }

    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn write_fields(&self, line: &mut LineBuffer) -> Result<(), EncodeError> {
        line.push_str("value=")?;
        line.push_quoted(&self.value)
    }
}

impl HistoryRecord for LogRecord<'_> {
    const DATA_TYPE: DataType = DataType::Log;

    fn itemid(&self) -> u64 {
        self.itemid
    }

    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn write_fields(&self, line: &mut LineBuffer) -> Result<(), EncodeError> {
        line.push_str("value=")?;
        line.push_quoted(&self.value)?;
        line.push_str(",source=")?;
        line.push_quoted(&self.source)?;
        line.push_fmt(format_args!(
            ",timestamp={},logeventid={},severity={}",
            self.log_timestamp, self.logeventid, self.severity
        ))
    }
}
