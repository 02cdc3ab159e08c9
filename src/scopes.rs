//! Active scope inspection.
//!
//! The tracer keeps the active scope in an async-local slot owned by its scope
//! manager. For every scope manager in the snapshot we resolve that slot on
//! each managed thread, read the span of the bound scope and attach the stack
//! of the runtime thread it was active on.

use crate::asynclocal::{AsyncLocalResolver, DecodeError};
use crate::heap::{Address, FieldValue, HeapIntrospector};
use crate::layout;
use serde::Serialize;
use tracing::{debug, warn};

/// Stack of the thread a span was active on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ThreadStack {
    Found {
        os_thread_id: u32,
        frames: Vec<String>,
    },
    /// The binding names a managed thread id no runtime thread has.
    NotFound,
}

/// A span bound as the active scope on one thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveSpan {
    pub thread_id: i32,
    pub span_id: u64,
    pub trace_id: u64,
    pub stack: ThreadStack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeManagerReport {
    pub address: Address,
    pub active_spans: Vec<ActiveSpan>,
}

/// Inspect every scope manager in the snapshot.
pub fn inspect_scope_managers<H>(
    heap: &H,
    resolver: &AsyncLocalResolver<'_, H>,
) -> Result<Vec<ScopeManagerReport>, DecodeError>
where
    H: HeapIntrospector + ?Sized,
{
    heap.objects_of_type(layout::SCOPE_MANAGER_TYPE)
        .map(|manager| inspect_scope_manager(heap, resolver, manager))
        .collect()
}

pub fn inspect_scope_manager<H>(
    heap: &H,
    resolver: &AsyncLocalResolver<'_, H>,
    manager: Address,
) -> Result<ScopeManagerReport, DecodeError>
where
    H: HeapIntrospector + ?Sized,
{
    let mut report = ScopeManagerReport {
        address: manager,
        active_spans: Vec::new(),
    };

    let Some(slot) = heap.field_object(manager, layout::SCOPE_MANAGER_ACTIVE_SCOPE)? else {
        debug!("scope manager at {:x} has no active scope slot", manager);
        return Ok(report);
    };

    for binding in resolver.resolve(slot) {
        let binding = binding?;
        let Some(scope) = binding.value else {
            continue;
        };

        let context = match heap.field_path(scope, &[layout::SCOPE_SPAN, layout::SPAN_CONTEXT])? {
            FieldValue::Object(context) => context,
            other => {
                return Err(heap
                    .unexpected(scope, layout::SCOPE_SPAN, "span with a context", &other)
                    .into())
            }
        };

        let span_id = heap.field_u64(context, layout::CONTEXT_SPAN_ID)?;
        let trace_id = heap.field_u64(context, layout::CONTEXT_TRACE_ID)?;
        let stack = thread_stack(heap, binding.thread_id);
        if stack == ThreadStack::NotFound {
            warn!(
                "span {} is active on thread {} but that thread is not in the snapshot",
                span_id, binding.thread_id
            );
        }

        report.active_spans.push(ActiveSpan {
            thread_id: binding.thread_id,
            span_id,
            trace_id,
            stack,
        });
    }

    Ok(report)
}

fn thread_stack<H>(heap: &H, managed_thread_id: i32) -> ThreadStack
where
    H: HeapIntrospector + ?Sized,
{
    match heap
        .threads()
        .find(|t| t.managed_thread_id == managed_thread_id)
    {
        Some(thread) => ThreadStack::Found {
            os_thread_id: thread.os_thread_id,
            frames: heap.stack_frames(&thread).collect(),
        },
        None => ThreadStack::NotFound,
    }
}
