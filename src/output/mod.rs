//! Output format abstraction layer
//!
//! The analysis produces plain data (trace forests and scope manager
//! findings). The `ReportOutput` trait lets the run driver emit that data
//! without knowing whether it ends up as the line-oriented text report or as
//! JSON.

mod json;
mod text;

pub use json::JsonOutput;
pub use text::TextOutput;

use crate::scopes::ScopeManagerReport;
use crate::trace::Trace;
use anyhow::Result;
use clap::ValueEnum;
use std::io::Write;
use std::path::Path;

/// Supported report formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Trait for abstracting report output formats.
pub trait ReportOutput {
    /// Announce the snapshot about to be analyzed.
    fn write_header(&mut self, snapshot: &Path) -> Result<()>;

    /// Write every trace forest.
    fn write_traces(&mut self, traces: &[Trace]) -> Result<()>;

    /// Write scope manager findings.
    fn write_scope_managers(&mut self, managers: &[ScopeManagerReport]) -> Result<()>;

    /// Flush anything buffered.
    fn finish(&mut self) -> Result<()>;
}

/// Build the writer for `format` on top of `out`.
pub fn for_format<'a, W: Write + 'a>(format: OutputFormat, out: W) -> Box<dyn ReportOutput + 'a> {
    match format {
        OutputFormat::Text => Box::new(TextOutput::new(out)),
        OutputFormat::Json => Box::new(JsonOutput::new(out)),
    }
}
