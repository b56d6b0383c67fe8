//! Full-build sourcing run.
//!
//! Wires the pipeline end to end:
//!
//! ```text
//! schemas ──compile──► types ──────────────────────────┐
//!                                                       ▼
//! CMS ──query_all──► documents ──document_to_nodes──► GraphSink
//!                     (parallel, order preserved)
//! ```
//!
//! Type compilation and node creation hand their results to a [`GraphSink`],
//! the registration seam owned by the build orchestrator. The run never reads
//! anything back from the sink.
//!
//! Progress and diagnostics are reported as [`SourceEvent`]s over an optional
//! channel; the core never prints. See [`output`](crate::output) for rendering.

use crate::client::{ClientError, CmsClient, Predicate, QueryOptions, query_all};
use crate::config::PluginOptions;
use crate::document::document_to_nodes;
use crate::fetch::{CacheStats, MemoryAssetCache, RemoteFileFetcher};
use crate::normalize::{FieldHooks, NormalizeEnv};
use crate::schema::SchemaSet;
use crate::typegraph::{TypeDescriptor, TypeGraph, base_types, compile_schema};
use crate::types::Node;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("CMS query failed: {0}")]
    Client(#[from] ClientError),
}

/// Progress and diagnostic events emitted while sourcing or previewing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SourceEvent {
    /// One page of query results arrived.
    PageFetched {
        page: usize,
        total_pages: usize,
        documents: usize,
    },
    /// A document was normalized into `nodes` nodes.
    DocumentNormalized {
        document_id: String,
        type_name: String,
        nodes: usize,
    },
    /// An image could not be localized; its `localFile` is null.
    AssetFetchFailed { url: String, error: String },
    /// Content nested deeper than `max_depth` was passed through unchanged.
    DepthLimitReached { document_id: String, path: String },
    /// A schema field could not be typed and was emitted as unprocessed JSON.
    UnprocessedField { path: String, field_type: String },
    /// A custom type schema was compiled into `types` types.
    TypesCompiled { custom_type: String, types: usize },
    /// A preview document was fetched and merged into the session.
    PreviewFetched {
        document_id: String,
        path: Option<String>,
    },
    /// A preview step failed; the page keeps its static content.
    PreviewFailed { error: String },
}

/// Registration sink owned by the build orchestrator.
pub trait GraphSink {
    fn create_type(&mut self, descriptor: TypeDescriptor);
    fn create_node(&mut self, node: Node);
}

/// [`GraphSink`] collecting everything in memory, in registration order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemorySink {
    pub types: Vec<TypeDescriptor>,
    pub nodes: Vec<Node>,
}

impl GraphSink for MemorySink {
    fn create_type(&mut self, descriptor: TypeDescriptor) {
        self.types.push(descriptor);
    }

    fn create_node(&mut self, node: Node) {
        self.nodes.push(node);
    }
}

/// Counts for one sourcing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSummary {
    pub documents: usize,
    pub nodes: usize,
    pub types: usize,
    pub unprocessed: usize,
    pub assets: CacheStats,
}

/// Collaborators of a sourcing run.
pub struct SourceContext<'a> {
    pub options: &'a PluginOptions,
    pub schemas: &'a SchemaSet,
    pub client: &'a dyn CmsClient,
    pub fetcher: Option<&'a dyn RemoteFileFetcher>,
    /// Per-field link resolver and HTML serializer overrides.
    pub hooks: Option<&'a FieldHooks>,
    pub events: Option<Sender<SourceEvent>>,
}

impl SourceContext<'_> {
    fn emit(&self, event: SourceEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Compile every schema plus the shared base types, reporting each custom
/// type and every unprocessed field.
pub fn compile_types(ctx: &SourceContext<'_>) -> TypeGraph {
    let prefix = &ctx.options.type_prefix;
    let mut graph = TypeGraph::default();
    for descriptor in base_types(prefix) {
        graph.types.insert(descriptor.name().to_string(), descriptor);
    }
    for (id, schema) in ctx.schemas {
        let compiled = compile_schema(id, schema, prefix, ctx.options.max_depth);
        ctx.emit(SourceEvent::TypesCompiled {
            custom_type: id.clone(),
            types: compiled.types.len(),
        });
        for field in &compiled.unprocessed {
            ctx.emit(SourceEvent::UnprocessedField {
                path: field.path.clone(),
                field_type: field.field_type.clone(),
            });
        }
        graph.merge(compiled);
    }
    graph
}

/// Run a full build: compile types, fetch every document, normalize them in
/// parallel and register types and nodes with the sink.
///
/// Only the CMS query can fail the run. Everything that goes wrong inside a
/// document is recovered locally and reported as an event.
pub fn source_nodes(
    ctx: &SourceContext<'_>,
    sink: &mut dyn GraphSink,
) -> Result<(TypeGraph, SourceSummary), SourceError> {
    let graph = compile_types(ctx);
    for descriptor in graph.types.values() {
        sink.create_type(descriptor.clone());
    }

    let query = QueryOptions::from_options(ctx.options);
    let documents = query_all(ctx.client, &[] as &[Predicate], &query, ctx.events.as_ref())?;

    let cache = MemoryAssetCache::new();
    let mut env = NormalizeEnv::from_options(ctx.options)
        .with_type_paths(&graph.type_paths)
        .with_cache(&cache);
    if let Some(hooks) = ctx.hooks {
        env = env.with_hooks(hooks);
    }
    if ctx.options.images.localize
        && let Some(fetcher) = ctx.fetcher
    {
        env = env.with_fetcher(fetcher);
    }
    if let Some(tx) = &ctx.events {
        env = env.with_events(tx.clone());
    }

    let per_document: Vec<Vec<Node>> = documents
        .par_iter()
        .map(|doc| document_to_nodes(doc, ctx.schemas.get(&doc.custom_type), &env))
        .collect();

    let mut summary = SourceSummary {
        documents: documents.len(),
        types: graph.types.len(),
        unprocessed: graph.unprocessed.len(),
        ..SourceSummary::default()
    };
    for node in per_document.into_iter().flatten() {
        summary.nodes += 1;
        sink.create_node(node);
    }
    summary.assets = cache.stats();
    Ok((graph, summary))
}
