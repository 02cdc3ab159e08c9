//! Line-oriented text report.

use super::ReportOutput;
use crate::scopes::{ScopeManagerReport, ThreadStack};
use crate::trace::Trace;
use anyhow::Result;
use std::io::Write;
use std::path::Path;

const INDENT: &str = "    ";

pub struct TextOutput<W: Write> {
    out: W,
}

impl<W: Write> TextOutput<W> {
    pub fn new(out: W) -> Self {
        TextOutput { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_trace(&mut self, trace: &Trace) -> Result<()> {
        writeln!(
            self.out,
            "Trace {} ({} spans, {} unfinished)",
            trace.trace_id,
            trace.span_count(),
            trace.unfinished_count()
        )?;
        writeln!(self.out)?;

        for entry in trace.walk() {
            if entry.parent_not_found {
                writeln!(
                    self.out,
                    "The parent span could not be found: {}",
                    entry.span
                )?;
            } else {
                writeln!(self.out, "{}{}", INDENT.repeat(entry.depth), entry.span)?;
            }
        }
        Ok(())
    }
}

impl<W: Write> ReportOutput for TextOutput<W> {
    fn write_header(&mut self, snapshot: &Path) -> Result<()> {
        writeln!(self.out, "Analyzing {}...", snapshot.display())?;
        Ok(())
    }

    fn write_traces(&mut self, traces: &[Trace]) -> Result<()> {
        writeln!(self.out, "Found {} traces:", traces.len())?;
        for trace in traces {
            self.write_trace(trace)?;
            writeln!(self.out)?;
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn write_scope_managers(&mut self, managers: &[ScopeManagerReport]) -> Result<()> {
        for manager in managers {
            writeln!(
                self.out,
                "Found scope manager at address {:x}",
                manager.address
            )?;
            for active in &manager.active_spans {
                writeln!(
                    self.out,
                    "Span {} (trace id: {}) is active on thread {}:",
                    active.span_id, active.trace_id, active.thread_id
                )?;
                match &active.stack {
                    ThreadStack::Found { frames, .. } => {
                        for frame in frames {
                            writeln!(self.out, "{INDENT}{frame}")?;
                        }
                    }
                    ThreadStack::NotFound => writeln!(self.out, "{INDENT}/!\\ thread not found")?,
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Address;
    use crate::scopes::ActiveSpan;
    use crate::trace::{build_traces, SpanRecord};

    fn record(span_id: u64, parent: Option<u64>, finished: bool) -> SpanRecord {
        SpanRecord {
            address: Address(0xa0 + span_id),
            span_id,
            trace_id: 9,
            parent_span_id: parent,
            operation_name: "op".to_string(),
            resource_name: "res".to_string(),
            start_time: "t0".to_string(),
            is_finished: finished,
        }
    }

    fn render(f: impl FnOnce(&mut TextOutput<Vec<u8>>) -> Result<()>) -> String {
        let mut output = TextOutput::new(Vec::new());
        f(&mut output).unwrap();
        String::from_utf8(output.into_inner()).unwrap()
    }

    #[test]
    fn test_trace_listing() {
        let traces = build_traces(vec![
            record(1, None, true),
            record(2, Some(1), false),
            record(3, Some(99), false),
        ]);
        let text = render(|o| o.write_traces(&traces));
        let expected = "\
Found 1 traces:
Trace 9 (3 spans, 2 unfinished)

SpanId: 1, TraceId: 9, Operation name: op, Start time: t0, Address: a1, Finished: True
    SpanId: 2, TraceId: 9, Operation name: op, Start time: t0, Address: a2, Finished: False
The parent span could not be found: SpanId: 3, TraceId: 9, Operation name: op, Start time: t0, Address: a3, Finished: False


";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_no_traces() {
        assert_eq!(render(|o| o.write_traces(&[])), "Found 0 traces:\n");
    }

    #[test]
    fn test_scope_managers() {
        let managers = vec![ScopeManagerReport {
            address: Address(0x7f00),
            active_spans: vec![
                ActiveSpan {
                    thread_id: 1,
                    span_id: 2,
                    trace_id: 9,
                    stack: ThreadStack::Found {
                        os_thread_id: 4100,
                        frames: vec!["Inner()".to_string(), "Outer()".to_string()],
                    },
                },
                ActiveSpan {
                    thread_id: 5,
                    span_id: 3,
                    trace_id: 9,
                    stack: ThreadStack::NotFound,
                },
            ],
        }];
        let text = render(|o| o.write_scope_managers(&managers));
        let expected = "\
Found scope manager at address 7f00
Span 2 (trace id: 9) is active on thread 1:
    Inner()
    Outer()
Span 3 (trace id: 9) is active on thread 5:
    /!\\ thread not found
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_header() {
        let text = render(|o| o.write_header(Path::new("/tmp/app.dmp")));
        assert_eq!(text, "Analyzing /tmp/app.dmp...\n");
    }
}
