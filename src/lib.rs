//! Spanscope library - offline span analysis of heap snapshots.
//!
//! Given a frozen heap snapshot of a traced process, this library rebuilds the
//! forest of tracing spans that were alive in memory and works out which span
//! was active on each thread by decoding the threads' async-local storage. It
//! never touches a live process.
//!
//! # Modules
//!
//! - [`heap`] - Heap introspection trait and the JSON snapshot backend
//! - [`asynclocal`] - Async-local value map decoding and per-thread resolution
//! - [`trace`] - Span extraction and trace forest reconstruction
//! - [`scopes`] - Active scope inspection for the tracer's scope managers
//! - [`output`] - Text and JSON report writers
//!
//! # Example
//!
//! ```no_run
//! use spanscope::heap::JsonSnapshot;
//! use std::path::Path;
//!
//! let snapshot = JsonSnapshot::open(Path::new("./app-heap.json"))
//!     .expect("Failed to load snapshot");
//! let analysis = spanscope::analyze(&snapshot).expect("Analysis failed");
//! for trace in &analysis.traces {
//!     println!("trace {} has {} spans", trace.trace_id, trace.span_count());
//! }
//! ```

pub mod asynclocal;
pub mod heap;
pub mod layout;
pub mod output;
pub mod scopes;
pub mod trace;

pub use output::OutputFormat;

use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, Level};

use crate::asynclocal::AsyncLocalResolver;
use crate::heap::{HeapIntrospector, JsonSnapshot};
use crate::scopes::ScopeManagerReport;
use crate::trace::{build_traces, extract_spans, SpanRecord, Trace};

/// Configuration for one analysis run, separated from the CLI parsing
/// concerns.
#[derive(Debug, Clone)]
pub struct Config {
    /// Verbosity level (0 = warn, 1 = info, 2 = debug, 3+ = trace)
    pub verbosity: u8,
    /// Heap snapshot to analyze
    pub snapshot: PathBuf,
    /// Report format written to the output
    pub format: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            verbosity: 0,
            snapshot: PathBuf::new(),
            format: OutputFormat::Text,
        }
    }
}

impl Config {
    /// Log level for the configured verbosity.
    pub fn log_level(&self) -> Level {
        match self.verbosity {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

/// Everything recovered from one snapshot.
#[derive(Debug)]
pub struct Analysis {
    pub traces: Vec<Trace>,
    pub scope_managers: Vec<ScopeManagerReport>,
}

/// Analyze a snapshot.
///
/// Any decode failure aborts the whole analysis: nothing is returned for a
/// snapshot whose layout could not be fully understood.
pub fn analyze<H>(heap: &H) -> Result<Analysis>
where
    H: HeapIntrospector + ?Sized,
{
    let records = extract_spans(heap)
        .collect::<Result<Vec<SpanRecord>, _>>()
        .context("Failed to extract spans")?;
    info!("Extracted {} spans", records.len());

    let traces = build_traces(records);
    info!("Grouped spans into {} traces", traces.len());

    let resolver = AsyncLocalResolver::new(heap);
    let scope_managers = scopes::inspect_scope_managers(heap, &resolver)
        .context("Failed to resolve active scopes")?;
    info!(
        "Inspected {} scope managers (legacy thread fields: {}, legacy local values: {})",
        scope_managers.len(),
        resolver.thread_id_field().uses_legacy(),
        resolver.local_values_field().uses_legacy()
    );

    Ok(Analysis {
        traces,
        scope_managers,
    })
}

/// Load the configured snapshot, analyze it and write the report to `out`.
pub fn run<W: Write>(config: &Config, out: W) -> Result<()> {
    let mut output = output::for_format(config.format, out);
    output.write_header(&config.snapshot)?;

    let snapshot = JsonSnapshot::open(&config.snapshot)?;
    info!(
        "Loaded {} objects from {}",
        snapshot.object_count(),
        config.snapshot.display()
    );

    let analysis = analyze(&snapshot)?;

    output.write_traces(&analysis.traces)?;
    output.write_scope_managers(&analysis.scope_managers)?;
    output.finish()
}
