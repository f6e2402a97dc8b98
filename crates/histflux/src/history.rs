// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Zabbix history value types and the records handed over by the host.
//!
//! Records borrow their strings from the host for the duration of a single
//! batch; nothing here outlives the callback that produced it.

use std::borrow::Cow;
use std::fmt;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Zabbix history value type.
///
/// Each type is exported to its own measurement, named after the Zabbix
/// database table holding the same data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Numeric (float).
    Float,
    /// Numeric (unsigned).
    Integer,
    /// Character.
    String,
    /// Text.
    Text,
    /// Log.
    Log,
}

impl DataType {
    /// Number of value types.
    pub const COUNT: usize = 5;

    /// Every value type, in host callback order.
    pub const ALL: [DataType; DataType::COUNT] = [
        DataType::Float,
        DataType::Integer,
        DataType::String,
        DataType::Text,
        DataType::Log,
    ];

    /// Name used in configuration keys and log messages.
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Float => "float",
            DataType::Integer => "integer",
            DataType::String => "string",
            DataType::Text => "text",
            DataType::Log => "log",
        }
    }

    /// Line protocol measurement name.
    pub fn measurement(self) -> &'static str {
        match self {
            DataType::Float => "history",
            DataType::Integer => "history_uint",
            DataType::String => "history_str",
            DataType::Text => "history_text",
            DataType::Log => "history_log",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time of a history value: whole seconds since the Unix epoch plus the
/// nanosecond remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    clock: u32,
    ns: u32,
}

impl Timestamp {
    pub const fn new(clock: u32, ns: u32) -> Self {
        Self { clock, ns }
    }

    pub fn clock(self) -> u32 {
        self.clock
    }

    pub fn ns(self) -> u32 {
        self.ns
    }

    /// Nanoseconds since the Unix epoch, `clock * 1e9 + ns`.
    ///
    /// Both parts are 32-bit, so the sum always fits in a `u64`.
    pub fn as_nanos(self) -> u64 {
        u64::from(self.clock) * NANOS_PER_SEC + u64::from(self.ns)
    }
}

/// Numeric (float) value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatRecord {
    pub itemid: u64,
    pub timestamp: Timestamp,
    pub value: f64,
}

/// Numeric (unsigned) value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerRecord {
    pub itemid: u64,
    pub timestamp: Timestamp,
    pub value: u64,
}

/// Character value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringRecord<'a> {
    pub itemid: u64,
    pub timestamp: Timestamp,
    pub value: Cow<'a, str>,
}

/// Text value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRecord<'a> {
    pub itemid: u64,
    pub timestamp: Timestamp,
    pub value: Cow<'a, str>,
}

/// Log value with its event metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord<'a> {
    pub itemid: u64,
    pub timestamp: Timestamp,
    pub value: Cow<'a, str>,
    /// Event source (e.g. Windows event log source).
    pub source: Cow<'a, str>,
    /// Time the event was logged, as reported by the monitored host.
    pub log_timestamp: i32,
    pub logeventid: i32,
    pub severity: i32,
}
