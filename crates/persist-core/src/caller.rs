// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Caller-info carrier for audit logging.
//!
//! Stable Rust cannot synthesize `file!()`/`line!()` through a derive or
//! trait default the way reflection-based runtimes can, so callers
//! build this explicitly at the call site; the [`caller_info!`] macro
//! does that for you.

use std::fmt;

/// Member name, file path and line number attached to a persistence
/// operation for audit logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerInfo {
    /// Enclosing function/method name.
    pub member: &'static str,
    /// Source file path.
    pub file: &'static str,
    /// Source line number.
    pub line: u32
}

impl CallerInfo {
    /// Builds a `CallerInfo` from the three raw components; prefer
    /// [`caller_info!`] at call sites.
    #[must_use]
    pub const fn new(member: &'static str, file: &'static str, line: u32) -> Self {
        Self { member, file, line }
    }
}

impl fmt::Display for CallerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.member)
    }
}

/// Captures the current `file!()`/`line!()` as a [`CallerInfo`], using
/// the enclosing function name when `proc_macro::Span` isn't available.
#[macro_export]
macro_rules! caller_info {
    ($member:expr) => {
        $crate::CallerInfo::new($member, file!(), line!())
    };
}
