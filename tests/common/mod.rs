//! Common test utilities for spanscope integration tests.
//!
//! [`HeapExport`] assembles a JSON heap export the same way a dump exporter
//! would write it, so tests can describe heaps in terms of spans, threads
//! and async-local maps instead of raw objects.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const SPAN_TYPE: &str = "Datadog.Trace.Span";
pub const CONTEXT_TYPE: &str = "Datadog.Trace.SpanContext";
pub const SCOPE_TYPE: &str = "Datadog.Trace.Scope";
pub const SCOPE_MANAGER_TYPE: &str = "Datadog.Trace.AsyncLocalScopeManager";
pub const THREAD_TYPE: &str = "System.Threading.Thread";
pub const CONTEXT_HOLDER_TYPE: &str = "System.Threading.ExecutionContext";
pub const ONE_ELEMENT_MAP: &str =
    "System.Threading.AsyncLocalValueMap+OneElementAsyncLocalValueMap";
pub const MANY_ELEMENT_MAP: &str =
    "System.Threading.AsyncLocalValueMap+ManyElementAsyncLocalValueMap";
pub const LEGACY_DICTIONARY: &str =
    "System.Collections.Generic.Dictionary<System.Threading.IAsyncLocal, System.Object>";
pub const ENTRY_TYPE: &str = "System.Collections.Generic.KeyValuePair";

/// Reference to another object.
pub fn r(address: u64) -> Value {
    json!({ "ref": address })
}

#[derive(Default)]
pub struct HeapExport {
    objects: Vec<Value>,
    threads: Vec<Value>,
}

impl HeapExport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&mut self, address: u64, type_name: &str, fields: Value) -> &mut Self {
        self.objects
            .push(json!({ "address": address, "type": type_name, "fields": fields }));
        self
    }

    /// A span at `address` with its context at `address + 8`. `parent` is
    /// the address of the parent span, whose context is at `parent + 8`.
    pub fn span(
        &mut self,
        address: u64,
        span_id: u64,
        trace_id: u64,
        parent: Option<u64>,
        operation: &str,
        finished: bool,
    ) -> &mut Self {
        let parent_context = parent.map_or(Value::Null, |p| r(p + 8));
        self.object(
            address,
            SPAN_TYPE,
            json!({
                "OperationName": operation,
                "ResourceName": "GET /",
                "IsFinished": finished,
                "StartTime": "1/2/2024 10:00:00 AM +00:00",
                "Context": r(address + 8),
            }),
        )
        .object(
            address + 8,
            CONTEXT_TYPE,
            json!({ "SpanId": span_id, "TraceId": trace_id, "Parent": parent_context }),
        )
    }

    /// A context-only parent that has no span object of its own.
    pub fn orphan_context(&mut self, address: u64, span_id: u64, trace_id: u64) -> &mut Self {
        self.object(
            address,
            CONTEXT_TYPE,
            json!({ "SpanId": span_id, "TraceId": trace_id, "Parent": null }),
        )
    }

    /// A scope at `address` wrapping the span at `span`.
    pub fn scope(&mut self, address: u64, span: u64) -> &mut Self {
        self.object(address, SCOPE_TYPE, json!({ "Span": r(span) }))
    }

    pub fn scope_manager(&mut self, address: u64, slot: u64) -> &mut Self {
        self.object(address, SCOPE_MANAGER_TYPE, json!({ "_activeScope": r(slot) }))
            .object(slot, "System.Threading.AsyncLocal<Datadog.Trace.Scope>", json!({}))
    }

    /// A current-generation managed thread whose local values map is at
    /// `map`. The execution context sits at `address + 8`.
    pub fn thread(&mut self, address: u64, managed_id: i32, map: Option<u64>) -> &mut Self {
        self.object(
            address,
            THREAD_TYPE,
            json!({ "_managedThreadId": managed_id, "_executionContext": r(address + 8) }),
        )
        .object(
            address + 8,
            CONTEXT_HOLDER_TYPE,
            json!({ "m_localValues": map.map_or(Value::Null, r) }),
        )
    }

    /// A legacy-generation managed thread.
    pub fn legacy_thread(&mut self, address: u64, managed_id: i32, map: u64) -> &mut Self {
        self.object(
            address,
            THREAD_TYPE,
            json!({ "m_ManagedThreadId": managed_id, "m_ExecutionContext": r(address + 8) }),
        )
        .object(address + 8, CONTEXT_HOLDER_TYPE, json!({ "_localValues": r(map) }))
    }

    pub fn one_element_map(&mut self, address: u64, key: u64, value: u64) -> &mut Self {
        self.object(
            address,
            ONE_ELEMENT_MAP,
            json!({ "_key1": r(key), "_value1": r(value) }),
        )
    }

    /// An entries-style map. Entries are laid out at `address + 8 * (i + 1)`;
    /// a `None` entry is a free slot.
    pub fn entries_map(
        &mut self,
        address: u64,
        type_name: &str,
        field: &str,
        entries: &[Option<(u64, u64)>],
    ) -> &mut Self {
        let refs: Vec<Value> = (0..entries.len() as u64)
            .map(|i| r(address + 8 * (i + 1)))
            .collect();
        let mut fields = serde_json::Map::new();
        fields.insert(field.to_string(), Value::Array(refs));
        self.object(address, type_name, Value::Object(fields));
        for (i, entry) in entries.iter().enumerate() {
            let fields = match entry {
                Some((key, value)) => json!({ "key": r(*key), "value": r(*value) }),
                None => json!({ "key": null, "value": null }),
            };
            self.object(address + 8 * (i as u64 + 1), ENTRY_TYPE, fields);
        }
        self
    }

    pub fn runtime_thread(&mut self, managed_id: i32, frames: &[&str]) -> &mut Self {
        self.threads.push(json!({
            "managed_thread_id": managed_id,
            "os_thread_id": 1000 + managed_id,
            "frames": frames,
        }));
        self
    }

    pub fn to_json(&self) -> Value {
        json!({ "objects": self.objects, "threads": self.threads })
    }

    /// Write the export into `dir` and return its path.
    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, serde_json::to_vec_pretty(&self.to_json()).unwrap())
            .expect("Failed to write heap export");
        path
    }
}
