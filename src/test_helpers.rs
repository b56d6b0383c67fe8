//! Shared test utilities for the prismic-graph test suite.
//!
//! Provides fixture loading, a ready-made normalization environment and node
//! lookups that panic with a clear message on miss.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let docs = load_documents();
//! let nodes = document_to_nodes(&docs[0], None, &test_env());
//! let home = find_node(&nodes, "PrismicPage", "home");
//! assert_eq!(home.data["uid"], "home");
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::PluginOptions;
use crate::link::DocumentLink;
use crate::naming::document_type_name;
use crate::node::document_node_id;
use crate::normalize::{AncestorNode, DEFAULT_TYPE_PREFIX, NormalizeEnv};
use crate::types::{Document, Node};

// =========================================================================
// Fixture setup
// =========================================================================

/// Parse `fixtures/documents.json`.
pub fn load_documents() -> Vec<Document> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/documents.json");
    let content = std::fs::read_to_string(&path).unwrap();
    serde_json::from_str(&content).unwrap()
}

/// Options for a repository named `test-repo` with a `/:uid/` route for pages.
pub fn test_options() -> PluginOptions {
    let mut routes = BTreeMap::new();
    routes.insert("page".to_string(), "/:uid/".to_string());
    routes.insert("article".to_string(), "/blog/:uid/".to_string());
    PluginOptions {
        repository_name: "test-repo".to_string(),
        routes,
        ..PluginOptions::default()
    }
}

/// Environment resolving every document link to `/<id>/`.
pub fn test_env() -> NormalizeEnv<'static> {
    NormalizeEnv::new(|link: &DocumentLink| Some(format!("/{}/", link.id)))
}

/// The ancestor record of a document of `custom_type` with id `id`.
pub fn ancestor(custom_type: &str, id: &str) -> AncestorNode {
    AncestorNode {
        id: document_node_id(custom_type, id),
        type_name: document_type_name(DEFAULT_TYPE_PREFIX, custom_type),
        custom_type: custom_type.to_string(),
        document_id: id.to_string(),
    }
}

// =========================================================================
// Node lookups
// =========================================================================

/// Find a node by type and uid. Panics if not found.
pub fn find_node<'a>(nodes: &'a [Node], type_name: &str, uid: &str) -> &'a Node {
    nodes
        .iter()
        .find(|n| n.type_name() == type_name && n.data.get("uid").and_then(|u| u.as_str()) == Some(uid))
        .unwrap_or_else(|| {
            let uids: Vec<&str> = nodes
                .iter()
                .filter(|n| n.type_name() == type_name)
                .filter_map(|n| n.data.get("uid").and_then(|u| u.as_str()))
                .collect();
            panic!("{type_name} '{uid}' not found. Available: {uids:?}")
        })
}
