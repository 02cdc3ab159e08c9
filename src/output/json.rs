//! JSON report, written as a single document when the run finishes.

use super::ReportOutput;
use crate::scopes::ScopeManagerReport;
use crate::trace::Trace;
use anyhow::Result;
use serde_json::{json, Value};
use std::io::Write;
use std::path::Path;

pub struct JsonOutput<W: Write> {
    out: W,
    document: serde_json::Map<String, Value>,
}

impl<W: Write> JsonOutput<W> {
    pub fn new(out: W) -> Self {
        JsonOutput {
            out,
            document: serde_json::Map::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportOutput for JsonOutput<W> {
    fn write_header(&mut self, snapshot: &Path) -> Result<()> {
        self.document.insert(
            "snapshot".to_string(),
            Value::String(snapshot.display().to_string()),
        );
        Ok(())
    }

    fn write_traces(&mut self, traces: &[Trace]) -> Result<()> {
        let traces: Vec<Value> = traces
            .iter()
            .map(|trace| {
                json!({
                    "trace_id": trace.trace_id,
                    "span_count": trace.span_count(),
                    "unfinished_count": trace.unfinished_count(),
                    "spans": trace.walk(),
                })
            })
            .collect();
        self.document
            .insert("traces".to_string(), Value::Array(traces));
        Ok(())
    }

    fn write_scope_managers(&mut self, managers: &[ScopeManagerReport]) -> Result<()> {
        self.document
            .insert("scope_managers".to_string(), serde_json::to_value(managers)?);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let document = Value::Object(std::mem::take(&mut self.document));
        serde_json::to_writer_pretty(&mut self.out, &document)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}
