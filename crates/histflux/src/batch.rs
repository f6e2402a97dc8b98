// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Batch formatting.
//!
//! Encodes a batch of same-typed records into one newline-delimited payload.
//! A batch is all or nothing: if the buffer cannot grow, the whole batch is
//! abandoned and nothing is sent.

use log::warn;

use crate::history::DataType;
use crate::line::{self, EncodeError, HistoryRecord, LineBuffer};

/// Rough size of one statement, used to pre-size the payload buffer.
const ESTIMATED_LINE_LEN: usize = 64;

/// An encoded batch, ready for delivery.
#[derive(Debug)]
pub struct Payload {
    data_type: DataType,
    body: Vec<u8>,
    lines: usize,
    skipped: usize,
}

impl Payload {
    /// Value type of every statement in the payload.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Number of statements in the payload.
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Number of records left out because they could not be represented.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Whether there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.lines == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

/// Encode `records` into a single payload.
///
/// Records that cannot be represented (non-finite floats) are skipped with a
/// warning. Allocation failure aborts the batch.
pub fn format_batch<R, I>(records: I) -> Result<Payload, EncodeError>
where
    R: HistoryRecord,
    I: IntoIterator<Item = R>,
{
    let records = records.into_iter();
    let mut buffer = LineBuffer::new();
    buffer.reserve(records.size_hint().0.saturating_mul(ESTIMATED_LINE_LEN))?;

    let mut lines = 0;
    let mut skipped = 0;
    for record in records {
        match line::encode(&record, &mut buffer) {
            Ok(()) => lines += 1,
            Err(e) if e.aborts_batch() => return Err(e),
            Err(e) => {
                warn!("Skipping {} history value: {}", R::DATA_TYPE, e);
                skipped += 1;
            }
        }
    }

    Ok(Payload {
        data_type: R::DATA_TYPE,
        body: buffer.into_bytes(),
        lines,
        skipped,
    })
}
