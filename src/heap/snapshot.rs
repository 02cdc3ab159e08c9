//! In-memory heap introspector backed by a JSON heap export.
//!
//! The export lists every object with its address, runtime type name and
//! field values, plus the runtime threads and their stacks:
//!
//! ```json
//! {
//!   "objects": [
//!     { "address": 4096, "type": "Datadog.Trace.Span",
//!       "fields": { "OperationName": "web.request", "Context": { "ref": 8192 } } }
//!   ],
//!   "threads": [ { "managed_thread_id": 1, "os_thread_id": 4242, "frames": ["Main()"] } ]
//! }
//! ```

use super::{Address, FieldValue, HeapError, HeapIntrospector, ThreadHandle};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SnapshotFile {
    #[serde(default)]
    objects: Vec<ObjectEntry>,
    #[serde(default)]
    threads: Vec<ThreadEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ObjectEntry {
    address: u64,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    fields: HashMap<String, RawValue>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ThreadEntry {
    managed_thread_id: i32,
    #[serde(default)]
    os_thread_id: u32,
    #[serde(default)]
    frames: Vec<String>,
}

/// Field value as spelled in the export. Unsigned is tried before signed so
/// that ids above `i64::MAX` survive.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Null,
    Bool(bool),
    UInt(u64),
    Int(i64),
    Str(String),
    Ref {
        #[serde(rename = "ref")]
        address: u64,
    },
    Array(Vec<RawValue>),
}

impl From<RawValue> for FieldValue {
    fn from(raw: RawValue) -> Self {
        match raw {
            RawValue::Null => FieldValue::Null,
            RawValue::Bool(v) => FieldValue::Bool(v),
            RawValue::UInt(v) => FieldValue::UInt(v),
            RawValue::Int(v) => FieldValue::Int(v),
            RawValue::Str(v) => FieldValue::Str(v),
            RawValue::Ref { address } => FieldValue::Object(Address(address)),
            RawValue::Array(items) => {
                FieldValue::Array(items.into_iter().map(FieldValue::from).collect())
            }
        }
    }
}

#[derive(Debug)]
struct HeapObject {
    address: Address,
    type_name: String,
    fields: HashMap<String, FieldValue>,
}

#[derive(Debug)]
struct RuntimeThread {
    handle: ThreadHandle,
    frames: Vec<String>,
}

/// A snapshot held entirely in memory.
#[derive(Debug, Default)]
pub struct JsonSnapshot {
    objects: Vec<HeapObject>,
    index: HashMap<Address, usize>,
    threads: Vec<RuntimeThread>,
}

impl JsonSnapshot {
    /// Load a snapshot from a JSON heap export on disk.
    pub fn open(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to load snapshot {}", path.display()))
    }

    /// Parse a snapshot from JSON text.
    pub fn from_json(content: &str) -> Result<Self> {
        let file: SnapshotFile =
            serde_json::from_str(content).context("Failed to parse snapshot JSON")?;

        let mut builder = SnapshotBuilder::default();
        for entry in file.objects {
            builder.insert(
                Address(entry.address),
                entry.type_name,
                entry
                    .fields
                    .into_iter()
                    .map(|(name, raw)| (name, FieldValue::from(raw)))
                    .collect(),
            )?;
        }
        for thread in file.threads {
            builder = builder.thread(thread.managed_thread_id, thread.os_thread_id, thread.frames);
        }
        Ok(builder.build())
    }

    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    fn object(&self, address: Address) -> Result<&HeapObject, HeapError> {
        self.index
            .get(&address)
            .map(|&i| &self.objects[i])
            .ok_or(HeapError::UnknownObject(address))
    }
}

impl HeapIntrospector for JsonSnapshot {
    fn objects_of_type<'a>(
        &'a self,
        type_name: &'a str,
    ) -> Box<dyn Iterator<Item = Address> + 'a> {
        Box::new(
            self.objects
                .iter()
                .filter(move |o| o.type_name == type_name)
                .map(|o| o.address),
        )
    }

    fn type_name(&self, object: Address) -> Result<&str, HeapError> {
        Ok(self.object(object)?.type_name.as_str())
    }

    fn field(&self, object: Address, name: &str) -> Result<FieldValue, HeapError> {
        let obj = self.object(object)?;
        obj.fields
            .get(name)
            .cloned()
            .ok_or_else(|| HeapError::FieldNotFound {
                address: object,
                type_name: obj.type_name.clone(),
                field: name.to_string(),
            })
    }

    fn threads(&self) -> Box<dyn Iterator<Item = ThreadHandle> + '_> {
        Box::new(self.threads.iter().map(|t| t.handle.clone()))
    }

    fn stack_frames<'a>(&'a self, thread: &ThreadHandle) -> Box<dyn Iterator<Item = String> + 'a> {
        let frames = self
            .threads
            .iter()
            .find(|t| t.handle == *thread)
            .map(|t| t.frames.as_slice())
            .unwrap_or_default();
        Box::new(frames.iter().cloned())
    }
}

/// Incrementally assembles a [`JsonSnapshot`].
///
/// Used by the JSON loader and handy for building synthetic heaps.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    snapshot: JsonSnapshot,
}

impl SnapshotBuilder {
    /// Add an object. Panics on a duplicate address; use the JSON loader for
    /// untrusted input.
    pub fn object<I, S>(mut self, address: u64, type_name: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = (S, FieldValue)>,
        S: Into<String>,
    {
        let fields = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        if let Err(e) = self.insert(Address(address), type_name.to_string(), fields) {
            panic!("{e}");
        }
        self
    }

    pub fn thread(
        mut self,
        managed_thread_id: i32,
        os_thread_id: u32,
        frames: Vec<String>,
    ) -> Self {
        self.snapshot.threads.push(RuntimeThread {
            handle: ThreadHandle {
                managed_thread_id,
                os_thread_id,
            },
            frames,
        });
        self
    }

    fn insert(
        &mut self,
        address: Address,
        type_name: String,
        fields: HashMap<String, FieldValue>,
    ) -> Result<()> {
        if self.snapshot.index.contains_key(&address) {
            bail!("Duplicate object address {address:x} in snapshot");
        }
        self.snapshot
            .index
            .insert(address, self.snapshot.objects.len());
        self.snapshot.objects.push(HeapObject {
            address,
            type_name,
            fields,
        });
        Ok(())
    }

    pub fn build(self) -> JsonSnapshot {
        self.snapshot
    }
}
