// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slash-separated key pattern matching.
//!
//! `*` matches exactly one segment, `**` matches any number of trailing
//! or inner segments (including none). A pattern with no wildcards is an
//! exact key.

/// Whether `key` matches `pattern`.
pub fn matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('/').collect();
    let key: Vec<&str> = key.split('/').collect();
    match_segments(&pattern, &key)
}

fn match_segments(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.first() {
        None => key.is_empty(),
        Some(&"**") => (0..=key.len()).any(|skip| match_segments(&pattern[1..], &key[skip..])),
        Some(&seg) => match key.first() {
            Some(&head) if seg == "*" || seg == head => match_segments(&pattern[1..], &key[1..]),
            _ => false,
        },
    }
}

#[cfg(test)]
#[path = "pattern_tests.rs"]
mod tests;
