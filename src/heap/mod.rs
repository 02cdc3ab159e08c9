//! Read-only access to the objects recorded in a heap snapshot.
//!
//! The analyzer never parses a dump container itself. Everything it knows
//! about the snapshot goes through the [`HeapIntrospector`] trait, which
//! mirrors what a runtime-introspection library exposes: objects enumerated
//! by type name, fields read by name, and the runtime's threads with their
//! stacks.
//!
//! # Module Organization
//!
//! - [`types`]: addresses, field values and thread handles
//! - [`snapshot`]: an in-memory introspector loaded from a JSON heap export

pub mod snapshot;
pub mod types;

pub use snapshot::{JsonSnapshot, SnapshotBuilder};
pub use types::*;

use thiserror::Error;

/// Failures reported by a heap introspector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    #[error("no object at address {0:x}")]
    UnknownObject(Address),

    #[error("field `{field}` not found on {type_name} at {address:x}")]
    FieldNotFound {
        address: Address,
        type_name: String,
        field: String,
    },

    #[error("field `{field}` on {type_name} at {address:x} holds {found}, expected {expected}")]
    UnexpectedValue {
        address: Address,
        type_name: String,
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl HeapError {
    pub fn is_field_not_found(&self) -> bool {
        matches!(self, HeapError::FieldNotFound { .. })
    }
}

/// Read-only view over the objects and threads of a snapshot.
///
/// All sequences are finite and single-pass. Asking again performs a fresh
/// traversal of the (immutable) snapshot.
pub trait HeapIntrospector {
    /// Every object whose runtime type name is exactly `type_name`, in
    /// snapshot order.
    fn objects_of_type<'a>(
        &'a self,
        type_name: &'a str,
    ) -> Box<dyn Iterator<Item = Address> + 'a>;

    /// The runtime type name of `object`.
    fn type_name(&self, object: Address) -> Result<&str, HeapError>;

    /// Read a field by name. Fails with [`HeapError::FieldNotFound`] when the
    /// object's type has no such field.
    fn field(&self, object: Address, name: &str) -> Result<FieldValue, HeapError>;

    /// The runtime threads alive when the snapshot was taken.
    fn threads(&self) -> Box<dyn Iterator<Item = ThreadHandle> + '_>;

    /// Stack frame descriptions for `thread`, innermost first.
    fn stack_frames<'a>(&'a self, thread: &ThreadHandle) -> Box<dyn Iterator<Item = String> + 'a>;

    /// Build an `UnexpectedValue` error for `field` on `object`.
    fn unexpected(
        &self,
        object: Address,
        field: &str,
        expected: &'static str,
        found: &FieldValue,
    ) -> HeapError {
        HeapError::UnexpectedValue {
            address: object,
            type_name: self.type_name(object).unwrap_or("<unknown>").to_string(),
            field: field.to_string(),
            expected,
            found: found.kind(),
        }
    }

    /// Read a reference field. `Ok(None)` means the reference is null.
    fn field_object(&self, object: Address, name: &str) -> Result<Option<Address>, HeapError> {
        self.field(object, name)?
            .into_object()
            .map_err(|other| self.unexpected(object, name, "object", &other))
    }

    fn field_u64(&self, object: Address, name: &str) -> Result<u64, HeapError> {
        let value = self.field(object, name)?;
        value
            .as_u64()
            .ok_or_else(|| self.unexpected(object, name, "integer", &value))
    }

    fn field_bool(&self, object: Address, name: &str) -> Result<bool, HeapError> {
        let value = self.field(object, name)?;
        value
            .as_bool()
            .ok_or_else(|| self.unexpected(object, name, "bool", &value))
    }

    /// Read a string field. A null string reads as empty.
    fn field_string(&self, object: Address, name: &str) -> Result<String, HeapError> {
        match self.field(object, name)? {
            FieldValue::Str(s) => Ok(s),
            FieldValue::Null => Ok(String::new()),
            other => Err(self.unexpected(object, name, "string", &other)),
        }
    }

    /// Follow a chain of reference fields starting at `object` and return the
    /// value of the last one.
    ///
    /// A null reference part way along the chain ends the walk with
    /// `FieldValue::Null` instead of an error.
    fn field_path(&self, object: Address, path: &[&str]) -> Result<FieldValue, HeapError> {
        let mut current = object;
        let mut value = FieldValue::Object(object);
        for (i, name) in path.iter().enumerate() {
            value = self.field(current, name)?;
            if i + 1 == path.len() {
                break;
            }
            match value {
                FieldValue::Object(next) => current = next,
                FieldValue::Null => return Ok(FieldValue::Null),
                ref other => return Err(self.unexpected(current, name, "object", other)),
            }
        }
        Ok(value)
    }
}
