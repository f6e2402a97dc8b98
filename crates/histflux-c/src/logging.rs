// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logging initialization for the module.

use log::LevelFilter;

/// Level used when neither the configuration nor `RUST_LOG` sets one.
pub const DEFAULT_LEVEL: LevelFilter = LevelFilter::Info;

/// Install `env_logger` with `level` as the default filter.
///
/// `RUST_LOG` overrides `level` when set. Returns `false` if a logger was
/// already installed, in which case only the maximum level is updated.
pub fn init(level: Option<LevelFilter>) -> bool {
    let level = level.unwrap_or(DEFAULT_LEVEL);

    match env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(level.to_string()),
    )
    .format_timestamp_millis()
    .try_init()
    {
        Ok(()) => true,
        Err(_) => {
            // Already initialized (host reloaded the module, or tests)
            if std::env::var_os(env_logger::DEFAULT_FILTER_ENV).is_none() {
                log::set_max_level(level);
            }
            false
        }
    }
}
