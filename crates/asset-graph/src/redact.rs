// SPDX-License-Identifier: AGPL-3.0-or-later
//! Redaction of sensitive fields before a value is persisted or logged
//!
//! Redaction is allowlist driven: each implementor names the fields it
//! clears. Nothing is detected automatically, so a new sensitive field is
//! only covered once its owner's `redacted` clears it.

/// A value that can produce a copy of itself safe to write to disk
pub trait Redact {
    /// Copy of `self` with every designated sensitive field cleared
    fn redacted(&self) -> Self;
}

/// Clear a sensitive string in place
pub fn clear(field: &mut String) {
    field.clear();
}
