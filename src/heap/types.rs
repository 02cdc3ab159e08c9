//! Value types handed out by a heap introspector.
//!
//! None of these types borrow from the snapshot: an `Address` is only an
//! identity, and every field read produces an owned `FieldValue`.

use serde::Serialize;
use std::fmt;

/// Identity of a heap object inside the snapshot.
///
/// An address is only meaningful while the snapshot it came from is open.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Address(pub u64);

/// Lowercase hex, at least two digits.
impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(self, f)
    }
}

/// The value stored in a field of a heap object.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A null reference or otherwise absent value.
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Str(String),
    /// A reference to another heap object.
    Object(Address),
    /// Elements of an array field. Value-type elements are stored as
    /// objects of their own, so each element is usually `Object` or `Null`.
    Array(Vec<FieldValue>),
}

impl FieldValue {
    /// Short name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::UInt(_) => "uint",
            FieldValue::Str(_) => "string",
            FieldValue::Object(_) => "object",
            FieldValue::Array(_) => "array",
        }
    }

    /// The referenced object, treating `Null` as absent.
    ///
    /// Returns `Err(self)` for any non-reference value so callers can report
    /// what they found instead.
    pub fn into_object(self) -> Result<Option<Address>, FieldValue> {
        match self {
            FieldValue::Object(addr) => Ok(Some(addr)),
            FieldValue::Null => Ok(None),
            other => Err(other),
        }
    }

    /// Integer value widened to `u64`. Signed values are reinterpreted
    /// bit-for-bit, matching how 64-bit ids are stored in either form.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            FieldValue::UInt(v) => Some(v),
            FieldValue::Int(v) => Some(v as u64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            FieldValue::Int(v) => Some(v),
            FieldValue::UInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            FieldValue::Bool(v) => Some(v),
            _ => None,
        }
    }
}

/// A runtime thread as recorded in the snapshot.
///
/// This is the runtime's view of a thread (the one that owns a stack), as
/// opposed to the managed thread object living on the heap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadHandle {
    pub managed_thread_id: i32,
    pub os_thread_id: u32,
}
