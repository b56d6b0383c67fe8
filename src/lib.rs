//! # Prismic Graph
//!
//! Turns Prismic CMS content into a typed content graph for static site
//! builds, and keeps that graph live while an editor previews drafts.
//!
//! # Architecture: Two Pipelines Over One Normalizer
//!
//! ```text
//! Build     schemas ──compile──► types ─────────────┐
//!           CMS ──query_all──► documents ──normalize──► nodes ──► GraphSink
//!
//! Preview   token + id ──get_by_id──► document ──normalize──► live nodes
//!                                                           │
//!           static page data ──────────────merge────────────┴──► page data
//! ```
//!
//! Both pipelines share [`document::document_to_nodes`], so a previewed
//! document has exactly the node ids, type names and data shapes of its
//! published build. That is what lets the merge engine swap static nodes for
//! live ones by id.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | Shared types: `Document`, `Node`, `NodeId`, `NodeRef` |
//! | [`naming`] | Casing helpers and the type-name scheme (`TypePath`) |
//! | [`schema`] | Custom type schema parsing and loading |
//! | [`classify`] | Field kind detection from schema or value shape |
//! | [`richtext`] | Rich text to HTML and plain text |
//! | [`link`] | Document links and route-pattern link resolution |
//! | [`fetch`] | Remote file localization with an explicitly scoped cache |
//! | [`normalize`] | Field normalization by kind, recursive and parallel |
//! | [`slices`] | Slice zones materialized as child nodes |
//! | [`node`] | Content-addressed ids and node construction |
//! | [`document`] | One document to its node set |
//! | [`typegraph`] | Schema to GraphQL type compilation |
//! | [`client`] | CMS query client trait, pagination, snapshot client |
//! | [`source`] | Full-build sourcing run and its events |
//! | [`preview`] | Preview session state and merge strategies |
//! | [`config`] | `config.toml` loading, validation and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Content-Addressed Ids
//!
//! Every node id is a SHA-256 over a stable seed (custom type and document id
//! for documents, ancestor id and zone path and index for slices). Nothing
//! random goes into an id, so builds are reproducible and preview nodes line
//! up with static ones.
//!
//! ## Events, Not Logging
//!
//! The core never prints. Progress and recoverable failures (an image that
//! could not be fetched, a field the compiler could not type) are sent as
//! [`source::SourceEvent`]s over an optional channel. The CLI renders them with
//! the pure formatters in [`output`].
//!
//! ## Explicit Scopes
//!
//! Link resolvers, HTML serializers, the asset cache and the type paths all
//! travel in a [`normalize::NormalizeEnv`] built per run. There is no global
//! state, so two builds (or a build and a preview) can share a process.

pub mod classify;
pub mod client;
pub mod config;
pub mod document;
pub mod fetch;
pub mod link;
pub mod naming;
pub mod node;
pub mod normalize;
pub mod output;
pub mod preview;
pub mod richtext;
pub mod schema;
pub mod slices;
pub mod source;
pub mod typegraph;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
