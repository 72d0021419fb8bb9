//! Canonical product-code form.
//!
//! Every lookup and every ledger key goes through [`CodeKey`]: uppercase with
//! all whitespace stripped. Equality is defined on the canonical form only, so
//! `"ab-12 3"` and `"AB-123"` are the same code everywhere downstream.

use std::fmt;

/// A product code in canonical form.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CodeKey(String);

impl CodeKey {
    /// Canonicalize raw input. Returns `None` when nothing is left after
    /// stripping whitespace (a blank cell or whitespace-only argument is not a
    /// code).
    pub fn parse(raw: &str) -> Option<Self> {
        let canonical: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_uppercase)
            .collect();
        if canonical.is_empty() {
            None
        } else {
            Some(Self(canonical))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CodeKey({})", self.0)
    }
}
