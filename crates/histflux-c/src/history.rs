// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host history record layouts and the history write callbacks.
//!
//! The structs mirror `ZBX_HISTORY_*` from the host's `module.h`; the host
//! owns every pointer and only guarantees it for the duration of a callback.

use std::borrow::Cow;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::panic::{self, AssertUnwindSafe};
use std::slice;

use histflux::{
    DataType, Exporter, FloatRecord, HistoryRecord, IntegerRecord, LogRecord, StringRecord,
    TextRecord, Timestamp, Transport,
};
use log::{error, trace};

/// `ZBX_HISTORY_FLOAT`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ZbxHistoryFloat {
    pub itemid: u64,
    pub clock: c_int,
    pub ns: c_int,
    pub value: f64,
}

/// `ZBX_HISTORY_INTEGER`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ZbxHistoryInteger {
    pub itemid: u64,
    pub clock: c_int,
    pub ns: c_int,
    pub value: u64,
}

/// `ZBX_HISTORY_STRING`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ZbxHistoryString {
    pub itemid: u64,
    pub clock: c_int,
    pub ns: c_int,
    pub value: *const c_char,
}

/// `ZBX_HISTORY_TEXT`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ZbxHistoryText {
    pub itemid: u64,
    pub clock: c_int,
    pub ns: c_int,
    pub value: *const c_char,
}

/// `ZBX_HISTORY_LOG`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ZbxHistoryLog {
    pub itemid: u64,
    pub clock: c_int,
    pub ns: c_int,
    pub value: *const c_char,
    pub source: *const c_char,
    pub timestamp: c_int,
    pub logeventid: c_int,
    pub severity: c_int,
}

/// Host callback receiving `history_num` records of one type.
pub type HistoryCallback<H> = Option<unsafe extern "C" fn(*const H, c_int)>;

/// `ZBX_HISTORY_WRITE_CBS`: one callback per value type, NULL when the type
/// is not exported.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ZbxHistoryWriteCbs {
    pub history_float_cb: HistoryCallback<ZbxHistoryFloat>,
    pub history_integer_cb: HistoryCallback<ZbxHistoryInteger>,
    pub history_string_cb: HistoryCallback<ZbxHistoryString>,
    pub history_text_cb: HistoryCallback<ZbxHistoryText>,
    pub history_log_cb: HistoryCallback<ZbxHistoryLog>,
}

impl ZbxHistoryWriteCbs {
    /// All callbacks NULL.
    pub const fn none() -> Self {
        Self {
            history_float_cb: None,
            history_integer_cb: None,
            history_string_cb: None,
            history_text_cb: None,
            history_log_cb: None,
        }
    }

    /// Callbacks for the types `exporter` has a destination for.
    pub fn for_exporter<T: Transport>(exporter: &Exporter<T>) -> Self {
        Self {
            history_float_cb: callback_for(exporter),
            history_integer_cb: callback_for(exporter),
            history_string_cb: callback_for(exporter),
            history_text_cb: callback_for(exporter),
            history_log_cb: callback_for(exporter),
        }
    }

    /// Number of non-NULL callbacks.
    pub fn count(&self) -> usize {
        [
            self.history_float_cb.is_some(),
            self.history_integer_cb.is_some(),
            self.history_string_cb.is_some(),
            self.history_text_cb.is_some(),
            self.history_log_cb.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }
}

fn callback_for<H: ZbxHistory, T: Transport>(exporter: &Exporter<T>) -> HistoryCallback<H> {
    if exporter.is_exported(H::DATA_TYPE) {
        Some(history_cb::<H>)
    } else {
        None
    }
}

/// A host record layout and its conversion to a borrowed record.
pub trait ZbxHistory: Sized {
    const DATA_TYPE: DataType;

    type Record<'a>: HistoryRecord
    where
        Self: 'a;

    /// Borrow the host record.
    ///
    /// # Safety
    /// Every string pointer must be NULL or point to a NUL-terminated string
    /// valid for the lifetime of `self`.
    unsafe fn to_record(&self) -> Self::Record<'_>;
}

impl ZbxHistory for ZbxHistoryFloat {
    const DATA_TYPE: DataType = DataType::Float;
    type Record<'a> = FloatRecord;

    unsafe fn to_record(&self) -> FloatRecord {
        FloatRecord {
            itemid: self.itemid,
            timestamp: timestamp(self.clock, self.ns),
            value: self.value,
        }
    }
}

impl ZbxHistory for ZbxHistoryInteger {
    const DATA_TYPE: DataType = DataType::Integer;
    type Record<'a> = IntegerRecord;

    unsafe fn to_record(&self) -> IntegerRecord {
        IntegerRecord {
            itemid: self.itemid,
            timestamp: timestamp(self.clock, self.ns),
            value: self.value,
        }
    }
}

impl ZbxHistory for ZbxHistoryString {
    const DATA_TYPE: DataType = DataType::String;
    type Record<'a> = StringRecord<'a>;

    unsafe fn to_record(&self) -> StringRecord<'_> {
        StringRecord {
            itemid: self.itemid,
            timestamp: timestamp(self.clock, self.ns),
            value: host_str(self.value),
        }
    }
}

impl ZbxHistory for ZbxHistoryText {
    const DATA_TYPE: DataType = DataType::Text;
    type Record<'a> = TextRecord<'a>;

    unsafe fn to_record(&self) -> TextRecord<'_> {
        TextRecord {
            itemid: self.itemid,
            timestamp: timestamp(self.clock, self.ns),
            value: host_str(self.value),
        }
    }
}

impl ZbxHistory for ZbxHistoryLog {
    const DATA_TYPE: DataType = DataType::Log;
    type Record<'a> = LogRecord<'a>;

    unsafe fn to_record(&self) -> LogRecord<'_> {
        LogRecord {
            itemid: self.itemid,
            timestamp: timestamp(self.clock, self.ns),
            value: host_str(self.value),
            source: host_str(self.source),
            log_timestamp: self.timestamp,
            logeventid: self.logeventid,
            severity: self.severity,
        }
    }
}

/// Negative host times are clamped to zero.
fn timestamp(clock: c_int, ns: c_int) -> Timestamp {
    Timestamp::new(
        u32::try_from(clock).unwrap_or(0),
        u32::try_from(ns).unwrap_or(0),
    )
}

/// NULL reads as the empty string; invalid UTF-8 is replaced.
///
/// # Safety
/// `ptr` must be NULL or a NUL-terminated string valid for `'a`.
unsafe fn host_str<'a>(ptr: *const c_char) -> Cow<'a, str> {
    if ptr.is_null() {
        Cow::Borrowed("")
    } else {
        CStr::from_ptr(ptr).to_string_lossy()
    }
}

/// History write callback handed to the host, one instance per layout.
///
/// # Safety
/// `history` must point to `history_num` initialized records whose string
/// pointers satisfy [`ZbxHistory::to_record`].
pub unsafe extern "C" fn history_cb<H: ZbxHistory>(history: *const H, history_num: c_int) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let Some(exporter) = crate::exporter() else {
            trace!("{} history ignored, module not initialized", H::DATA_TYPE);
            return;
        };
        let Some(values) = host_slice(history, history_num) else {
            return;
        };
        exporter.dispatch(values.iter().map(|h| h.to_record()));
    }));

    if result.is_err() {
        error!("Panic while exporting {} history, batch dropped", H::DATA_TYPE);
    }
}

/// # Safety
/// See [`history_cb`].
unsafe fn host_slice<'a, H>(history: *const H, history_num: c_int) -> Option<&'a [H]> {
    let len = usize::try_from(history_num).ok().filter(|&n| n > 0)?;
    if history.is_null() {
        return None;
    }
    Some(slice::from_raw_parts(history, len))
}
