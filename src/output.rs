//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Source
//!
//! ```text
//! Types
//! 001 PrismicPage (node, 6 fields)
//! 002 PrismicPageBodySlicesType (union of 2)
//!     unprocessed: PrismicPage.widget (Sparkle)
//!
//! Documents
//! page 1/1 (3 documents)
//!     XyZ1 PrismicPage (3 nodes)
//!     asset failed: https://images.prismic.io/repo/hero.png
//!
//! Sourced 3 documents, 7 nodes, 24 types
//! Assets: 2 cached, 3 fetched (5 total)
//! ```
//!
//! ## Preview
//!
//! ```text
//! Preview XyZ1 → /home/
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::preview::{PreviewSnapshot, PreviewState};
use crate::source::{SourceEvent, SourceSummary};
use crate::typegraph::{TypeDescriptor, TypeGraph};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Short description of a type: its kind and size.
fn type_detail(descriptor: &TypeDescriptor) -> String {
    match descriptor {
        TypeDescriptor::Object { fields, node, .. } => {
            let fields = plural(fields.len(), "field", "fields");
            if *node {
                format!("node, {fields}")
            } else {
                fields
            }
        }
        TypeDescriptor::Union { members, .. } => format!("union of {}", members.len()),
        TypeDescriptor::Enum { values, .. } => format!("enum of {}", values.len()),
    }
}

// ============================================================================
// Types
// ============================================================================

/// Format a compiled type graph: one line per type, unprocessed fields last.
pub fn format_type_graph(graph: &TypeGraph) -> Vec<String> {
    let mut lines = vec!["Types".to_string()];
    for (i, descriptor) in graph.types.values().enumerate() {
        lines.push(format!(
            "{} {} ({})",
            format_index(i + 1),
            descriptor.name(),
            type_detail(descriptor)
        ));
    }
    for field in &graph.unprocessed {
        lines.push(format!(
            "{}unprocessed: {} ({})",
            indent(1),
            field.path,
            field.field_type
        ));
    }
    lines
}

pub fn print_type_graph(graph: &TypeGraph) {
    for line in format_type_graph(graph) {
        println!("{}", line);
    }
}

// ============================================================================
// Source events
// ============================================================================

/// Format a single sourcing or preview event as display lines.
///
/// Per-document progress is indented under the page it arrived in.
pub fn format_source_event(event: &SourceEvent) -> Vec<String> {
    match event {
        SourceEvent::PageFetched {
            page,
            total_pages,
            documents,
        } => vec![format!(
            "page {}/{} ({})",
            page,
            total_pages,
            plural(*documents, "document", "documents")
        )],
        SourceEvent::DocumentNormalized {
            document_id,
            type_name,
            nodes,
        } => vec![format!(
            "{}{} {} ({})",
            indent(1),
            document_id,
            type_name,
            plural(*nodes, "node", "nodes")
        )],
        SourceEvent::AssetFetchFailed { url, error } => vec![
            format!("{}asset failed: {}", indent(1), url),
            format!("{}{}", indent(2), error),
        ],
        SourceEvent::DepthLimitReached { document_id, path } => vec![format!(
            "{}depth limit: {} at {}",
            indent(1),
            document_id,
            path
        )],
        SourceEvent::UnprocessedField { path, field_type } => {
            vec![format!("{}unprocessed: {} ({})", indent(1), path, field_type)]
        }
        SourceEvent::TypesCompiled { custom_type, types } => vec![format!(
            "{} ({})",
            custom_type,
            plural(*types, "type", "types")
        )],
        SourceEvent::PreviewFetched { document_id, path } => match path {
            Some(path) => vec![format!("Preview {} \u{2192} {}", document_id, path)],
            None => vec![format!("Preview {}", document_id)],
        },
        SourceEvent::PreviewFailed { error } => vec![format!("Preview failed: {}", error)],
    }
}

// ============================================================================
// Summaries
// ============================================================================

pub fn format_source_summary(summary: &SourceSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "Sourced {}, {}, {}",
        plural(summary.documents, "document", "documents"),
        plural(summary.nodes, "node", "nodes"),
        plural(summary.types, "type", "types")
    )];
    if summary.unprocessed > 0 {
        lines.push(format!(
            "{}{} emitted as JSON",
            indent(1),
            plural(summary.unprocessed, "unprocessed field", "unprocessed fields")
        ));
    }
    if summary.assets.total() > 0 {
        lines.push(format!("Assets: {}", summary.assets));
    }
    lines
}

pub fn print_source_summary(summary: &SourceSummary) {
    for line in format_source_summary(summary) {
        println!("{}", line);
    }
}

/// Format the outcome of a preview run.
pub fn format_preview(state: &PreviewState, snapshot: &PreviewSnapshot) -> Vec<String> {
    match state {
        PreviewState::Idle => vec!["No preview".to_string()],
        PreviewState::Fetching { generation } => vec![format!("Fetching preview #{generation}")],
        PreviewState::Failed { error } => vec![format!("Preview failed: {}", error)],
        PreviewState::Merged { node, path } => {
            let mut lines = vec![format!("Preview {} \u{2192} {}", node, path)];
            if let Some(live) = &snapshot.node
                && let Some(type_name) = live
                    .get("internal")
                    .and_then(|i| i.get("type"))
                    .and_then(|t| t.as_str())
            {
                lines.push(format!("{}type: {}", indent(1), type_name));
            }
            lines
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
