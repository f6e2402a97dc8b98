// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! History exporter.
//!
//! Connects destination resolution, batch formatting and delivery into a
//! single entry point called once per host batch.

use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, error, warn};
use thiserror::Error;

use crate::batch::format_batch;
use crate::config::{ConfigError, Destinations, ExportConfig};
use crate::delivery::{DeliveryError, HttpWriter, Transport};
use crate::history::DataType;
use crate::line::{EncodeError, HistoryRecord};

/// Errors that can occur while exporting a batch.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The value type has no usable destination.
    #[error("{0} history is not exported")]
    NotExported(DataType),
    /// The batch could not be encoded.
    #[error("failed to encode batch: {0}")]
    Encode(#[from] EncodeError),
    /// The batch could not be delivered.
    #[error("failed to deliver batch: {0}")]
    Delivery(#[from] DeliveryError),
}

/// Counters since the exporter was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub batches_delivered: u64,
    pub batches_failed: u64,
    pub records_delivered: u64,
    pub records_skipped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    batches_delivered: AtomicU64,
    batches_failed: AtomicU64,
    records_delivered: AtomicU64,
    records_skipped: AtomicU64,
}

/// Exports history batches to their configured destinations.
///
/// Destinations are fixed at construction. The exporter is shared between
/// host threads; the transport carries the only mutable state.
#[derive(Debug)]
pub struct Exporter<T = HttpWriter> {
    destinations: Destinations,
    transport: T,
    counters: Counters,
}

impl Exporter<HttpWriter> {
    /// Create an exporter writing over HTTP with the default timeouts.
    pub fn from_config(config: &ExportConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.destinations()?, HttpWriter::new()))
    }
}

impl<T: Transport> Exporter<T> {
    pub fn new(destinations: Destinations, transport: T) -> Self {
        Self {
            destinations,
            transport,
            counters: Counters::default(),
        }
    }

    pub fn destinations(&self) -> &Destinations {
        &self.destinations
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Whether `data_type` has a destination with both url and bucket.
    pub fn is_exported(&self, data_type: DataType) -> bool {
        self.destinations.resolve(data_type).is_exported()
    }

    /// Encode and deliver one batch.
    ///
    /// Returns the number of records delivered. An empty batch, or one in
    /// which every record was skipped, is not sent.
    pub fn export<R, I>(&self, records: I) -> Result<usize, ExportError>
    where
        R: HistoryRecord,
        I: IntoIterator<Item = R>,
    {
        let result = self.try_export(records);
        if result.is_err() {
            self.counters.batches_failed.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn try_export<R, I>(&self, records: I) -> Result<usize, ExportError>
    where
        R: HistoryRecord,
        I: IntoIterator<Item = R>,
    {
        let destination = self.destinations.resolve(R::DATA_TYPE);
        if !destination.is_exported() {
            return Err(ExportError::NotExported(R::DATA_TYPE));
        }

        let payload = format_batch(records)?;
        self.counters
            .records_skipped
            .fetch_add(payload.skipped() as u64, Ordering::Relaxed);
        if payload.is_empty() {
            debug!("Nothing to export in {} history batch", R::DATA_TYPE);
            return Ok(0);
        }

        let lines = payload.lines();
        self.transport.write(destination, payload.into_body())?;

        self.counters.batches_delivered.fetch_add(1, Ordering::Relaxed);
        self.counters
            .records_delivered
            .fetch_add(lines as u64, Ordering::Relaxed);
        Ok(lines)
    }

    /// Export one batch, log the outcome and drop any error.
    ///
    /// Losing a batch is preferred over disturbing the host, so nothing is
    /// returned.
    pub fn dispatch<R, I>(&self, records: I)
    where
        R: HistoryRecord,
        I: IntoIterator<Item = R>,
    {
        match self.export(records) {
            Ok(lines) => debug!("Exported {} {} history values", lines, R::DATA_TYPE),
            Err(e) => report(R::DATA_TYPE, &e),
        }
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> ExportStats {
        ExportStats {
            batches_delivered: self.counters.batches_delivered.load(Ordering::Relaxed),
            batches_failed: self.counters.batches_failed.load(Ordering::Relaxed),
            records_delivered: self.counters.records_delivered.load(Ordering::Relaxed),
            records_skipped: self.counters.records_skipped.load(Ordering::Relaxed),
        }
    }
}

fn report(data_type: DataType, e: &ExportError) {
    match e {
        ExportError::NotExported(_) => debug!("Dropping batch: {}", e),
        ExportError::Encode(EncodeError::OutOfMemory(_)) => {
            error!("Failed to allocate memory for {} history batch, batch dropped", data_type)
        }
        ExportError::Encode(e) => error!("Failed to encode {} history batch: {}", data_type, e),
        ExportError::Delivery(DeliveryError::TimedOut) => {
            warn!("Export of {} history timed out, batch dropped", data_type)
        }
        ExportError::Delivery(e @ DeliveryError::Rejected { .. }) => {
            warn!("InfluxDB rejected {} history batch: {}", data_type, e)
        }
        ExportError::Delivery(e) if e.is_setup() => {
            error!("Failed to set up export of {} history: {}", data_type, e)
        }
        ExportError::Delivery(e) => warn!("Failed to export {} history: {}", data_type, e),
    }
}
