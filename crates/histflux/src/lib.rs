// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! histflux
//!
//! Exports Zabbix history to InfluxDB v2 using the line protocol.
//!
//! This crate provides:
//! - Typed history records for the five Zabbix value types
//! - InfluxDB v2 Line Protocol encoding with string-field escaping
//! - YAML configuration resolving one destination per value type
//! - Synchronous HTTP delivery to the `/api/v2/write` endpoint
//! - An [`Exporter`] context tying the above together per batch
//!
//! # Overview
//!
//! ```text
//! host batch --> format_batch (LineBuffer + escape) --> Transport::write --> InfluxDB
//!                                                   ^
//!                                 Destinations::resolve(data type)
//! ```
//!
//! Failures never propagate to the host: [`Exporter::dispatch`] logs the
//! outcome of a batch and drops it. The C entry points live in the
//! `histflux-c` crate.

pub mod batch;
pub mod config;
pub mod delivery;
pub mod escape;
pub mod exporter;
pub mod history;
pub mod line;

pub use batch::{format_batch, Payload};
pub use config::{ConfigError, Destination, Destinations, ExportConfig};
pub use delivery::{DeliveryError, HttpWriter, Transport};
pub use exporter::{ExportError, ExportStats, Exporter};
pub use history::{
    DataType, FloatRecord, IntegerRecord, LogRecord, StringRecord, TextRecord, Timestamp,
};
pub use line::{EncodeError, HistoryRecord, LineBuffer};
