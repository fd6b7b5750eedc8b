// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device identity from the key=value identity file.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Default identity file location.
pub const DEFAULT_IDENTITY_FILE: &str = "/etc/nodi-edge/identity";

/// Key carrying the machine serial number.
pub const SERIAL_NUMBER_KEY: &str = "SERIAL_NUMBER";

/// Serial used when no identity source is available.
pub const UNKNOWN_SERIAL: &str = "NE-UNKNOWN";

/// Resolve the identity file path.
///
/// `NE_IDENTITY_FILE` takes priority (used by tests for isolation).
pub fn identity_file() -> PathBuf {
    match std::env::var("NE_IDENTITY_FILE") {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_IDENTITY_FILE),
    }
}

/// Parse a key=value identity file. Blank lines and `#` comments are
/// skipped; later keys win.
pub fn read_identity(path: &Path) -> io::Result<HashMap<String, String>> {
    let text = std::fs::read_to_string(path)?;
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    Ok(map)
}

/// Machine serial number.
///
/// Order: `NE_SERIAL` env var, then the identity file's `SERIAL_NUMBER`
/// key, then [`UNKNOWN_SERIAL`].
pub fn serial_number() -> String {
    if let Ok(serial) = std::env::var("NE_SERIAL") {
        if !serial.is_empty() {
            return serial;
        }
    }

    if let Ok(map) = read_identity(&identity_file()) {
        if let Some(serial) = map.get(SERIAL_NUMBER_KEY) {
            if !serial.is_empty() {
                return serial.clone();
            }
        }
    }

    UNKNOWN_SERIAL.to_string()
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
