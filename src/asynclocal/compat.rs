//! Field lookups whose names differ between runtime generations.
//!
//! The current name is probed first. The first `FieldNotFound` switches the
//! lookup to the legacy name for the rest of the run; the switch happens at
//! most once and is never undone.

use super::DecodeError;
use crate::heap::{Address, FieldValue, HeapIntrospector};
use std::cell::OnceCell;
use tracing::debug;

/// Marker stored once the legacy name has been selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UseLegacy;

/// A field (or short chain of reference fields) known under two names.
#[derive(Debug)]
pub struct CompatField {
    label: &'static str,
    current: &'static [&'static str],
    legacy: &'static [&'static str],
    selected: OnceCell<UseLegacy>,
}

impl CompatField {
    pub const fn new(
        label: &'static str,
        current: &'static [&'static str],
        legacy: &'static [&'static str],
    ) -> Self {
        CompatField {
            label,
            current,
            legacy,
            selected: OnceCell::new(),
        }
    }

    /// Whether lookups have switched to the legacy name.
    pub fn uses_legacy(&self) -> bool {
        self.selected.get().is_some()
    }

    /// The field path the next lookup will try first.
    pub fn active_path(&self) -> &'static [&'static str] {
        if self.uses_legacy() {
            self.legacy
        } else {
            self.current
        }
    }

    /// Read the field from `object`, following the chain with
    /// null-propagation.
    pub fn read<H>(&self, heap: &H, object: Address) -> Result<FieldValue, DecodeError>
    where
        H: HeapIntrospector + ?Sized,
    {
        if !self.uses_legacy() {
            match heap.field_path(object, self.current) {
                Err(e) if e.is_field_not_found() => {
                    debug!(
                        "{} not found as {}, switching to {}",
                        self.label,
                        self.current.join("."),
                        self.legacy.join(".")
                    );
                    let _ = self.selected.set(UseLegacy);
                }
                other => return other.map_err(DecodeError::from),
            }
        }

        heap.field_path(object, self.legacy).map_err(|e| {
            if e.is_field_not_found() {
                DecodeError::UnsupportedLayout {
                    address: object,
                    type_name: heap.type_name(object).unwrap_or("<unknown>").to_string(),
                    detail: format!(
                        "neither {} nor {} resolves the {}",
                        self.current.join("."),
                        self.legacy.join("."),
                        self.label
                    ),
                }
            } else {
                DecodeError::from(e)
            }
        })
    }
}
