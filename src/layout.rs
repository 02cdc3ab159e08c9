//! Runtime type and field names the analyzer relies on.
//!
//! These are the names reported by the runtime's type system, so they must
//! match the snapshot exactly. Names that changed between runtime
//! generations come in current/legacy pairs.

// Async-local value map encodings
pub const EMPTY_VALUE_MAP: &str = "System.Threading.AsyncLocalValueMap+EmptyAsyncLocalValueMap";
pub const ONE_ELEMENT_VALUE_MAP: &str =
    "System.Threading.AsyncLocalValueMap+OneElementAsyncLocalValueMap";
pub const TWO_ELEMENT_VALUE_MAP: &str =
    "System.Threading.AsyncLocalValueMap+TwoElementAsyncLocalValueMap";
pub const THREE_ELEMENT_VALUE_MAP: &str =
    "System.Threading.AsyncLocalValueMap+ThreeElementAsyncLocalValueMap";
pub const MULTI_ELEMENT_VALUE_MAP: &str =
    "System.Threading.AsyncLocalValueMap+MultiElementAsyncLocalValueMap";
pub const MANY_ELEMENT_VALUE_MAP: &str =
    "System.Threading.AsyncLocalValueMap+ManyElementAsyncLocalValueMap";
pub const LEGACY_DICTIONARY_VALUE_MAP: &str =
    "System.Collections.Generic.Dictionary<System.Threading.IAsyncLocal, System.Object>";

// Fixed-slot map fields, indexed by slot
pub const SLOT_KEYS: [&str; 3] = ["_key1", "_key2", "_key3"];
pub const SLOT_VALUES: [&str; 3] = ["_value1", "_value2", "_value3"];

pub const MULTI_ELEMENT_PAIRS: &str = "_keyValues";
pub const MANY_ELEMENT_ENTRIES: &str = "_entries";
pub const DICTIONARY_ENTRIES: &str = "entries";
pub const ENTRY_KEY: &str = "key";
pub const ENTRY_VALUE: &str = "value";

// Managed threads
pub const THREAD_TYPE: &str = "System.Threading.Thread";
pub const THREAD_ID_CURRENT: &[&str] = &["_managedThreadId"];
pub const THREAD_ID_LEGACY: &[&str] = &["m_ManagedThreadId"];
pub const LOCAL_VALUES_CURRENT: &[&str] = &["_executionContext", "m_localValues"];
pub const LOCAL_VALUES_LEGACY: &[&str] = &["m_ExecutionContext", "_localValues"];

// Tracer objects
pub const SPAN_TYPE: &str = "Datadog.Trace.Span";
pub const SCOPE_MANAGER_TYPE: &str = "Datadog.Trace.AsyncLocalScopeManager";

pub const SPAN_OPERATION_NAME: &str = "OperationName";
pub const SPAN_RESOURCE_NAME: &str = "ResourceName";
pub const SPAN_IS_FINISHED: &str = "IsFinished";
pub const SPAN_START_TIME: &str = "StartTime";
pub const SPAN_CONTEXT: &str = "Context";

pub const CONTEXT_SPAN_ID: &str = "SpanId";
pub const CONTEXT_TRACE_ID: &str = "TraceId";
pub const CONTEXT_PARENT: &str = "Parent";

pub const SCOPE_MANAGER_ACTIVE_SCOPE: &str = "_activeScope";
pub const SCOPE_SPAN: &str = "Span";
