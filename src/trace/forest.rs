//! Reconstruction of span trees from a flat list of span records.
//!
//! Records are grouped by trace id. Inside a trace the records live in a dense
//! arena and every link (id lookup, child lists, roots) is an arena index, so
//! the structure owns no references between records.

use super::models::SpanRecord;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// All spans sharing one trace id, linked into a forest.
#[derive(Debug, Clone)]
pub struct Trace {
    pub trace_id: u64,
    spans: Vec<SpanRecord>,
    by_id: HashMap<u64, usize>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

/// One line of a depth-first walk over a trace.
///
/// The walk is flat: nesting is carried by `depth` alone, which is also how
/// the JSON report lists spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForestEntry<'a> {
    pub depth: usize,
    #[serde(flatten)]
    pub span: &'a SpanRecord,
    /// Set on roots whose declared parent is not part of the trace.
    pub parent_not_found: bool,
}

impl Trace {
    /// Link `records` (all carrying `trace_id`) into a forest.
    ///
    /// A record whose span id was already seen replaces the earlier record.
    pub fn new(trace_id: u64, records: impl IntoIterator<Item = SpanRecord>) -> Self {
        let mut spans: Vec<SpanRecord> = Vec::new();
        let mut by_id: HashMap<u64, usize> = HashMap::new();
        for record in records {
            debug_assert_eq!(record.trace_id, trace_id);
            match by_id.get(&record.span_id) {
                Some(&idx) => {
                    debug!(
                        "trace {}: span {} at {:x} replaces the span at {:x}",
                        trace_id, record.span_id, record.address, spans[idx].address
                    );
                    spans[idx] = record;
                }
                None => {
                    by_id.insert(record.span_id, spans.len());
                    spans.push(record);
                }
            }
        }

        let mut children = vec![Vec::new(); spans.len()];
        let mut roots = Vec::new();
        for (idx, span) in spans.iter().enumerate() {
            match span.parent_span_id.and_then(|p| by_id.get(&p)) {
                Some(&parent) => children[parent].push(idx),
                None => {
                    if let Some(parent) = span.parent_span_id {
                        debug!(
                            "trace {}: parent {} of span {} not found",
                            trace_id, parent, span.span_id
                        );
                    }
                    roots.push(idx);
                }
            }
        }

        Trace {
            trace_id,
            spans,
            by_id,
            children,
            roots,
        }
    }

    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    pub fn unfinished_count(&self) -> usize {
        self.spans.iter().filter(|s| !s.is_finished).count()
    }

    pub fn span(&self, span_id: u64) -> Option<&SpanRecord> {
        self.by_id.get(&span_id).map(|&idx| &self.spans[idx])
    }

    /// Root candidates in discovery order.
    pub fn roots(&self) -> impl Iterator<Item = &SpanRecord> {
        self.roots.iter().map(|&idx| &self.spans[idx])
    }

    /// Direct children of `span_id` in discovery order.
    pub fn children(&self, span_id: u64) -> impl Iterator<Item = &SpanRecord> {
        self.by_id
            .get(&span_id)
            .map(|&idx| self.children[idx].as_slice())
            .unwrap_or_default()
            .iter()
            .map(|&idx| &self.spans[idx])
    }

    /// Whether `span` declares a parent that is not a span of this trace.
    pub fn parent_not_found(&self, span: &SpanRecord) -> bool {
        span.parent_span_id.is_some_and(|parent| !self.by_id.contains_key(&parent))
    }

    /// Depth-first walk from every root candidate.
    ///
    /// Spans caught in a parent cycle (a span naming itself as parent
    /// included) are never reachable from a root and are left out; a visited
    /// set keeps the walk finite regardless.
    pub fn walk(&self) -> Vec<ForestEntry<'_>> {
        let mut entries = Vec::with_capacity(self.spans.len());
        let mut visited = vec![false; self.spans.len()];
        let mut stack: Vec<(usize, usize)> = self.roots.iter().rev().map(|&r| (r, 0)).collect();

        while let Some((idx, depth)) = stack.pop() {
            if std::mem::replace(&mut visited[idx], true) {
                continue;
            }
            let span = &self.spans[idx];
            entries.push(ForestEntry {
                depth,
                span,
                parent_not_found: depth == 0 && self.parent_not_found(span),
            });
            stack.extend(self.children[idx].iter().rev().map(|&c| (c, depth + 1)));
        }

        if entries.len() < self.spans.len() {
            warn!(
                "trace {}: {} spans are not reachable from any root",
                self.trace_id,
                self.spans.len() - entries.len()
            );
        }
        entries
    }
}

/// Group span records by trace id and link each group into a [`Trace`].
///
/// Traces are returned in order of first appearance of their trace id.
pub fn build_traces(records: impl IntoIterator<Item = SpanRecord>) -> Vec<Trace> {
    let mut order: Vec<u64> = Vec::new();
    let mut groups: HashMap<u64, Vec<SpanRecord>> = HashMap::new();
    for record in records {
        groups
            .entry(record.trace_id)
            .or_insert_with(|| {
                order.push(record.trace_id);
                Vec::new()
            })
            .push(record);
    }

    order
        .into_iter()
        .map(|trace_id| {
            let records = groups.remove(&trace_id).unwrap_or_default();
            Trace::new(trace_id, records)
        })
        .collect()
}
