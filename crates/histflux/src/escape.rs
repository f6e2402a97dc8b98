// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Escaping of line protocol string field values.
//!
//! Inside a double-quoted string field only `"` and `\` are special; each is
//! prefixed with a backslash. Both are ASCII, so escaping byte-wise never
//! splits a UTF-8 sequence.

use std::collections::TryReserveError;

fn needs_escape(b: u8) -> bool {
    b == b'"' || b == b'\\'
}

/// Length of `s` once escaped.
pub fn escaped_len(s: &str) -> usize {
    s.len() + s.bytes().filter(|&b| needs_escape(b)).count()
}

/// Return an escaped copy of `s`.
///
/// Allocation failure is reported instead of aborting the process.
pub fn escape(s: &str) -> Result<String, TryReserveError> {
    let mut out = String::new();
    out.try_reserve_exact(escaped_len(s))?;
    for ch in s.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    Ok(out)
}

/// Append the escaped form of `s` to `out`.
pub(crate) fn escape_into(out: &mut Vec<u8>, s: &str) -> Result<(), TryReserveError> {
    out.try_reserve(escaped_len(s))?;
    for &b in s.as_bytes() {
        if needs_escape(b) {
            out.push(b'\\');
        }
        out.push(b);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(&next) = chars.peek() {
                if next == '"' || next == '\\' {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(ch);
    }
    out
}
