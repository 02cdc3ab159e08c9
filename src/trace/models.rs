//! Span records extracted from the heap.
//!
//! A [`SpanRecord`] is copied out of the snapshot in one go. Once built it
//! holds no reference back into the heap, so everything downstream of
//! extraction works on plain data.

use crate::heap::{Address, FieldValue, HeapError, HeapIntrospector};
use crate::layout;
use serde::Serialize;
use std::fmt;

/// Frozen copy of one span object.
///
/// # Fields
/// - `address`: where the span object lived, for display only
/// - `span_id` / `trace_id`: identity read from the span's context
/// - `parent_span_id`: the parent context's span id, if the span has one
/// - `start_time`: the runtime's textual rendering of the start timestamp
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SpanRecord {
    pub address: Address,
    pub span_id: u64,
    pub trace_id: u64,
    pub parent_span_id: Option<u64>,
    pub operation_name: String,
    pub resource_name: String,
    pub start_time: String,
    pub is_finished: bool,
}

impl SpanRecord {
    /// Copy the span object at `span` out of the heap.
    pub fn extract<H>(heap: &H, span: Address) -> Result<Self, HeapError>
    where
        H: HeapIntrospector + ?Sized,
    {
        let operation_name = heap.field_string(span, layout::SPAN_OPERATION_NAME)?;
        let resource_name = heap.field_string(span, layout::SPAN_RESOURCE_NAME)?;
        let is_finished = heap.field_bool(span, layout::SPAN_IS_FINISHED)?;
        let start_time = read_timestamp(heap, span, layout::SPAN_START_TIME)?;

        let context = heap.field_object(span, layout::SPAN_CONTEXT)?.ok_or_else(|| {
            heap.unexpected(span, layout::SPAN_CONTEXT, "object", &FieldValue::Null)
        })?;
        let span_id = heap.field_u64(context, layout::CONTEXT_SPAN_ID)?;
        let trace_id = heap.field_u64(context, layout::CONTEXT_TRACE_ID)?;
        let parent_span_id = match heap.field_object(context, layout::CONTEXT_PARENT)? {
            Some(parent) => Some(heap.field_u64(parent, layout::CONTEXT_SPAN_ID)?),
            None => None,
        };

        Ok(SpanRecord {
            address: span,
            span_id,
            trace_id,
            parent_span_id,
            operation_name,
            resource_name,
            start_time,
            is_finished,
        })
    }
}

/// `SpanId: 1, TraceId: 2, Operation name: ..., Start time: ..., Address: ff, Finished: True`
impl fmt::Display for SpanRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SpanId: {}, TraceId: {}, Operation name: {}, Start time: {}, Address: {:x}, Finished: {}",
            self.span_id,
            self.trace_id,
            self.operation_name,
            self.start_time,
            self.address,
            if self.is_finished { "True" } else { "False" }
        )
    }
}

/// Timestamps come through either as the runtime's own string rendering or
/// as raw ticks.
fn read_timestamp<H>(heap: &H, object: Address, field: &str) -> Result<String, HeapError>
where
    H: HeapIntrospector + ?Sized,
{
    match heap.field(object, field)? {
        FieldValue::Str(s) => Ok(s),
        FieldValue::Int(ticks) => Ok(ticks.to_string()),
        FieldValue::UInt(ticks) => Ok(ticks.to_string()),
        other => Err(heap.unexpected(object, field, "timestamp", &other)),
    }
}

/// Extract every span object in the snapshot, in snapshot order.
pub fn extract_spans<'a, H>(
    heap: &'a H,
) -> Box<dyn Iterator<Item = Result<SpanRecord, HeapError>> + 'a>
where
    H: HeapIntrospector + ?Sized,
{
    Box::new(
        heap.objects_of_type(layout::SPAN_TYPE)
            .map(move |span| SpanRecord::extract(heap, span)),
    )
}
