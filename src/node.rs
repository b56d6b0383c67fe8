//! Node factory and identity assignment.
//!
//! # Identity
//!
//! Node ids are **content-addressed by source position**, not by content:
//! `node_id` is the SHA-256 of a seed that names where the entity came from
//! (document type + id, or parent node id + field path + index). Rebuilding the
//! same documents, in any order, in a build or a preview session, yields the
//! same ids, so cross-references and orchestrator caches stay valid.
//!
//! # Content digest
//!
//! `contentDigest` is the SHA-256 of the serialized type name and data. It
//! changes whenever any normalized value changes and is what the orchestrator
//! uses for change detection. It plays no part in identity.
//!
//! `serde_json` maps are ordered by key, so the digest does not depend on the
//! key order of the API response.
//!
//! # Reserved keys
//!
//! `id`, `children`, `parent`, `internal` and `fields` belong to node metadata.
//! An entity key with one of these names is renamed by prefixing `prismic`
//! (`id` → `prismicId`), repeating the prefix until the name is free.

use crate::naming::pascal_case;
use crate::types::{Node, NodeId, NodeInternal};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Keys owned by node metadata.
pub const RESERVED_KEYS: [&str; 5] = ["id", "children", "parent", "internal", "fields"];

/// Prefix applied to entity keys that collide with [`RESERVED_KEYS`].
pub const RESERVED_PREFIX: &str = "prismic";

/// Namespace mixed into every id so ids never collide with other plugins'.
const ID_NAMESPACE: &[u8] = b"prismic-graph\0";

/// Deterministic node id for a seed.
///
/// Parts are NUL-separated so `["ab", "c"]` and `["a", "bc"]` differ.
pub fn node_id(seed: &[&str]) -> NodeId {
    let mut hasher = Sha256::new();
    hasher.update(ID_NAMESPACE);
    for part in seed {
        hasher.update(part.as_bytes());
        hasher.update(b"\0");
    }
    NodeId::new(format!("{:x}", hasher.finalize()))
}

/// Id of the node built for a document. Link fields use this to reference
/// documents without having them at hand.
pub fn document_node_id(custom_type: &str, document_id: &str) -> NodeId {
    node_id(&["document", custom_type, document_id])
}

/// SHA-256 of a value's JSON serialization, as a hex string.
pub fn content_digest(value: &impl Serialize) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    format!("{:x}", Sha256::digest(&bytes))
}

/// Rename entity keys that collide with node metadata keys.
pub fn rename_reserved(mut entity: Map<String, Value>) -> Map<String, Value> {
    for reserved in RESERVED_KEYS {
        let Some(value) = entity.remove(reserved) else {
            continue;
        };
        let mut renamed = format!("{}{}", RESERVED_PREFIX, pascal_case(reserved));
        while entity.contains_key(&renamed) || RESERVED_KEYS.contains(&renamed.as_str()) {
            renamed = format!("{}{}", RESERVED_PREFIX, pascal_case(&renamed));
        }
        entity.insert(renamed, value);
    }
    entity
}

/// Assemble a node from a type name, a raw entity and an id seed.
///
/// Pure: registration is the caller's job. Parent/child links are attached
/// afterwards with [`Node`]'s builder methods; they do not affect the digest.
pub fn make_node(internal_type: &str, raw_entity: Map<String, Value>, id_seed: &[&str]) -> Node {
    make_node_with_id(internal_type, raw_entity, node_id(id_seed))
}

/// Like [`make_node`] for callers that computed the id up front (because the
/// entity's own data refers to it).
pub fn make_node_with_id(internal_type: &str, raw_entity: Map<String, Value>, id: NodeId) -> Node {
    let data = rename_reserved(raw_entity);
    let content_digest = content_digest(&(internal_type, &data));
    Node {
        id,
        parent: None,
        children: Vec::new(),
        internal: NodeInternal {
            type_name: internal_type.to_string(),
            content_digest,
        },
        data,
    }
}

impl Node {
    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_children(mut self, children: Vec<NodeId>) -> Self {
        self.children = children;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn node_id_is_deterministic() {
        assert_eq!(node_id(&["page", "abc"]), node_id(&["page", "abc"]));
        assert_eq!(node_id(&["page", "abc"]).as_str().len(), 64);
    }

    #[test]
    fn node_id_separates_parts() {
        assert_ne!(node_id(&["ab", "c"]), node_id(&["a", "bc"]));
        assert_ne!(node_id(&["page", "abc"]), node_id(&["post", "abc"]));
    }

    #[test]
    fn document_node_id_matches_seed() {
        assert_eq!(
            document_node_id("page", "abc"),
            node_id(&["document", "page", "abc"])
        );
    }

    #[test]
    fn digest_ignores_source_key_order() {
        let a: Map<String, Value> = serde_json::from_str(r#"{"a": 1, "b": 2}"#).unwrap();
        let b: Map<String, Value> = serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap();
        assert_eq!(content_digest(&a), content_digest(&b));
    }

    #[test]
    fn digest_changes_with_content() {
        assert_ne!(
            content_digest(&json!({"a": 1})),
            content_digest(&json!({"a": 2}))
        );
    }

    #[test]
    fn reserved_keys_are_prefixed() {
        let renamed = rename_reserved(entity(json!({
            "id": "X1", "children": [], "parent": null, "internal": 1, "fields": 2, "uid": "u"
        })));
        assert_eq!(renamed["prismicId"], "X1");
        assert!(renamed.contains_key("prismicChildren"));
        assert!(renamed.contains_key("prismicParent"));
        assert!(renamed.contains_key("prismicInternal"));
        assert!(renamed.contains_key("prismicFields"));
        assert_eq!(renamed["uid"], "u");
        for key in RESERVED_KEYS {
            assert!(!renamed.contains_key(key));
        }
    }

    #[test]
    fn rename_avoids_existing_keys() {
        let renamed = rename_reserved(entity(json!({"id": "new", "prismicId": "existing"})));
        assert_eq!(renamed["prismicId"], "existing");
        assert_eq!(renamed["prismicPrismicId"], "new");
    }

    #[test]
    fn make_node_is_deterministic() {
        let raw = json!({"id": "X1", "title": "Hello"});
        let a = make_node("PrismicPage", entity(raw.clone()), &["document", "page", "X1"]);
        let b = make_node("PrismicPage", entity(raw), &["document", "page", "X1"]);
        assert_eq!(a, b);
        assert_eq!(a.type_name(), "PrismicPage");
        assert_eq!(a.data["prismicId"], "X1");
    }

    #[test]
    fn digest_depends_on_type_name() {
        let a = make_node("A", entity(json!({"x": 1})), &["s"]);
        let b = make_node("B", entity(json!({"x": 1})), &["s"]);
        assert_eq!(a.id, b.id);
        assert_ne!(a.internal.content_digest, b.internal.content_digest);
    }

    #[test]
    fn links_do_not_change_digest() {
        let node = make_node("A", entity(json!({"x": 1})), &["s"]);
        let digest = node.internal.content_digest.clone();
        let linked = node
            .with_parent(NodeId::new("p"))
            .with_children(vec![NodeId::new("c")]);
        assert_eq!(linked.internal.content_digest, digest);
        assert_eq!(linked.parent, Some(NodeId::new("p")));
    }
}
