// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # histflux loadable module
//!
//! C entry points loaded by the monitoring server. The server calls
//! [`zbx_module_init`] once, asks for the history write callbacks with
//! [`zbx_module_history_write_cbs`], then invokes those callbacks from its
//! history syncer processes with batches of values of a single type.
//!
//! The configuration file is named by the `EFFLU_CONFIG` environment
//! variable; see [`histflux::config`] for its format.
//!
//! # Safety
//!
//! Entry points never unwind into the host: every one of them runs inside
//! `catch_unwind` and turns a panic into a logged failure.

mod history;
mod logging;

pub use history::*;

use std::env;
use std::os::raw::c_int;
use std::panic;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock, RwLock};

use histflux::{ConfigError, ExportConfig, Exporter};
use log::{error, info};
use thiserror::Error;

/// Module API version implemented by this module.
pub const ZBX_MODULE_API_VERSION: c_int = 2;
pub const ZBX_MODULE_OK: c_int = 0;
pub const ZBX_MODULE_FAIL: c_int = -1;

/// Environment variable holding the configuration file path.
pub const CONFIG_ENV: &str = "EFFLU_CONFIG";

#[derive(Debug, Error)]
enum InitError {
    #[error("path to configuration file must be set using the EFFLU_CONFIG environment variable")]
    MissingConfigPath,
    #[error("failed to load configuration from {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
}

fn state() -> &'static RwLock<Option<Arc<Exporter>>> {
    static STATE: OnceLock<RwLock<Option<Arc<Exporter>>>> = OnceLock::new();
    STATE.get_or_init(|| RwLock::new(None))
}

/// Exporter installed by the last successful init.
///
/// The lock is released before returning, so a delivery in progress never
/// blocks `uninit` or another callback.
pub(crate) fn exporter() -> Option<Arc<Exporter>> {
    state().read().unwrap_or_else(|e| e.into_inner()).clone()
}

fn install(exporter: Option<Exporter>) -> Option<Arc<Exporter>> {
    let mut guard = state().write().unwrap_or_else(|e| e.into_inner());
    std::mem::replace(&mut *guard, exporter.map(Arc::new))
}

/// Module API version.
#[no_mangle]
pub extern "C" fn zbx_module_api_version() -> c_int {
    ZBX_MODULE_API_VERSION
}

/// Load the configuration and prepare the exporter.
///
/// Returns `ZBX_MODULE_FAIL` if `EFFLU_CONFIG` is unset, or the file cannot
/// be read, parsed or validated. A failed init leaves the module without an
/// exporter.
#[no_mangle]
pub extern "C" fn zbx_module_init() -> c_int {
    panic::catch_unwind(|| match load() {
        Ok(exporter) => {
            if install(Some(exporter)).is_some() {
                info!("Replaced previously initialized history exporter");
            }
            info!("Module histflux has been successfully initialized");
            ZBX_MODULE_OK
        }
        Err(e) => {
            logging::init(None);
            error!("Failed to initialize module histflux: {}", e);
            ZBX_MODULE_FAIL
        }
    })
    .unwrap_or_else(|_| {
        error!("Panic while initializing module histflux");
        ZBX_MODULE_FAIL
    })
}

fn load() -> Result<Exporter, InitError> {
    let path = PathBuf::from(env::var_os(CONFIG_ENV).ok_or(InitError::MissingConfigPath)?);
    let with_path = |source| InitError::Config {
        path: path.clone(),
        source,
    };

    let config = ExportConfig::from_file(&path).map_err(with_path)?;
    logging::init(config.log_level().map_err(with_path)?);
    info!("Read configuration from {}", path.display());

    Exporter::from_config(&config).map_err(with_path)
}

/// Release the exporter and its HTTP client.
///
/// Callbacks already running keep their own reference and finish normally.
#[no_mangle]
pub extern "C" fn zbx_module_uninit() -> c_int {
    panic::catch_unwind(|| {
        if let Some(exporter) = install(None) {
            let stats = exporter.stats();
            info!(
                "Module histflux uninitialized: {} batches ({} values) delivered, {} batches failed, {} values skipped",
                stats.batches_delivered,
                stats.records_delivered,
                stats.batches_failed,
                stats.records_skipped
            );
        }
    })
    .map(|()| ZBX_MODULE_OK)
    .unwrap_or(ZBX_MODULE_FAIL)
}

/// History write callbacks, NULL for every type without a destination.
///
/// All callbacks are NULL if the module is not initialized.
#[no_mangle]
pub extern "C" fn zbx_module_history_write_cbs() -> ZbxHistoryWriteCbs {
    panic::catch_unwind(|| {
        let Some(exporter) = exporter() else {
            error!("History write callbacks requested before module initialization");
            return ZbxHistoryWriteCbs::none();
        };

        for (data_type, destination) in exporter.destinations().iter() {
            match (&destination.url, &destination.bucket) {
                (Some(url), Some(bucket)) if destination.is_exported() => info!(
                    "History of type {} will be exported to {} bucket {}",
                    data_type, url, bucket
                ),
                _ => info!("History of type {} will not be exported", data_type),
            }
        }

        ZbxHistoryWriteCbs::for_exporter(&exporter)
    })
    .unwrap_or_else(|_| {
        error!("Panic while building history write callbacks");
        ZbxHistoryWriteCbs::none()
    })
}
