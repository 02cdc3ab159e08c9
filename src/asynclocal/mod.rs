//! Resolution of async-local bindings from managed thread objects.
//!
//! Every managed thread carries an execution context whose local values map
//! holds the async-local bindings that were current on that thread. Given the
//! async-local slot object we care about, the resolver walks every thread,
//! decodes its map and reports the value bound to that slot.
//!
//! # Module Organization
//!
//! - [`value_map`]: classification and decoding of the value map encodings
//! - [`compat`]: field lookups renamed between runtime generations

pub mod compat;
pub mod value_map;

pub use compat::CompatField;
pub use value_map::{KeyValueEntry, MapLayout, ThreadLocalMap};

use crate::heap::{Address, HeapError, HeapIntrospector};
use crate::layout;
use thiserror::Error;
use tracing::trace;

/// Failures while decoding runtime structures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The object does not match any layout we know how to read. Nothing
    /// decoded from the snapshot can be trusted after this.
    #[error("unsupported layout for {type_name} at {address:x}: {detail}")]
    UnsupportedLayout {
        address: Address,
        type_name: String,
        detail: String,
    },

    #[error("expected {expected} element, found {found}")]
    UnexpectedElement {
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    Heap(#[from] HeapError),
}

/// The value a thread had bound to an async-local slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncLocalBinding {
    pub thread_id: i32,
    pub value: Option<Address>,
}

/// Resolves async-local bindings across all managed threads of a snapshot.
///
/// The resolver owns the field-name selectors for the run, so one resolver
/// should be used for every lookup against the same snapshot.
pub struct AsyncLocalResolver<'h, H: ?Sized> {
    heap: &'h H,
    thread_id: CompatField,
    local_values: CompatField,
}

impl<'h, H> AsyncLocalResolver<'h, H>
where
    H: HeapIntrospector + ?Sized,
{
    pub fn new(heap: &'h H) -> Self {
        AsyncLocalResolver {
            heap,
            thread_id: CompatField::new(
                "managed thread id",
                layout::THREAD_ID_CURRENT,
                layout::THREAD_ID_LEGACY,
            ),
            local_values: CompatField::new(
                "execution context local values",
                layout::LOCAL_VALUES_CURRENT,
                layout::LOCAL_VALUES_LEGACY,
            ),
        }
    }

    pub fn thread_id_field(&self) -> &CompatField {
        &self.thread_id
    }

    pub fn local_values_field(&self) -> &CompatField {
        &self.local_values
    }

    /// Managed thread id of the thread object at `thread`.
    pub fn thread_id(&self, thread: Address) -> Result<i32, DecodeError> {
        let value = self.thread_id.read(self.heap, thread)?;
        value
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| {
                let field = self.thread_id.active_path().join(".");
                self.heap
                    .unexpected(thread, &field, "32-bit integer", &value)
                    .into()
            })
    }

    /// The local values map of the thread at `thread`, if it has an
    /// execution context with values.
    pub fn local_values(&self, thread: Address) -> Result<Option<Address>, DecodeError> {
        self.local_values
            .read(self.heap, thread)?
            .into_object()
            .map_err(|other| {
                let field = self.local_values.active_path().join(".");
                self.heap.unexpected(thread, &field, "object", &other).into()
            })
    }

    /// The binding for `slot` on one thread. Only the first matching entry
    /// counts: a slot is bound at most once per map.
    pub fn binding_on(
        &self,
        thread: Address,
        slot: Address,
    ) -> Result<Option<AsyncLocalBinding>, DecodeError> {
        let thread_id = self.thread_id(thread)?;
        let map = ThreadLocalMap::classify(self.heap, self.local_values(thread)?)?;
        trace!(
            "thread {} at {:x} stores async-locals as {:?}",
            thread_id,
            thread,
            map.layout()
        );

        for entry in map.entries(self.heap) {
            let entry = entry?;
            if entry.key == slot {
                return Ok(Some(AsyncLocalBinding {
                    thread_id,
                    value: entry.value,
                }));
            }
        }
        Ok(None)
    }

    /// Lazily yield, per managed thread, the value bound to `slot`. Threads
    /// without a binding yield nothing.
    pub fn resolve<'a>(
        &'a self,
        slot: Address,
    ) -> Box<dyn Iterator<Item = Result<AsyncLocalBinding, DecodeError>> + 'a> {
        Box::new(
            self.heap
                .objects_of_type(layout::THREAD_TYPE)
                .filter_map(move |thread| self.binding_on(thread, slot).transpose()),
        )
    }
}
