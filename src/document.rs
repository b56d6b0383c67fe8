//! Document-to-graph driver: one CMS document → its node plus every node
//! created while normalizing it.
//!
//! The document node carries, next to the document's own keys:
//!
//! - `data`: the normalized data record
//! - `dataRaw` / `dataString`: the original data, as JSON and as a JSON string
//! - `url`: the link resolver applied to the document itself (or `null`)
//! - `alternate_languages`: each translation normalized as a document link
//! - `_previewable`: the node id, the marker the preview merge looks for
//!
//! The returned list starts with the document node and continues with the
//! descendants in discovery order. Consumers index nodes by id; position is
//! not a parent-before-child guarantee.

use crate::link::DocumentLink;
use crate::naming::document_type_name;
use crate::node::{document_node_id, make_node_with_id};
use crate::normalize::{
    AncestorNode, FieldContext, NormalizeEnv, Scope, normalize_link, normalize_record,
};
use crate::schema::{CustomTypeSchema, FieldSchema};
use crate::source::SourceEvent;
use crate::types::{Document, Node};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Field holding the preview marker on document nodes.
pub const PREVIEWABLE_KEY: &str = "_previewable";

/// The ancestor record for a document's fields.
pub fn document_ancestor(doc: &Document, type_prefix: &str) -> AncestorNode {
    AncestorNode {
        id: document_node_id(&doc.custom_type, &doc.id),
        type_name: document_type_name(type_prefix, &doc.custom_type),
        custom_type: doc.custom_type.clone(),
        document_id: doc.id.clone(),
    }
}

/// Normalize a document into nodes. The document node comes first.
pub fn document_to_nodes(
    doc: &Document,
    schema: Option<&CustomTypeSchema>,
    env: &NormalizeEnv<'_>,
) -> Vec<Node> {
    let ancestor = document_ancestor(doc, env.type_prefix());
    let fields: Option<BTreeMap<String, FieldSchema>> = schema.map(|s| {
        s.fields()
            .into_iter()
            .map(|(key, field)| (key.to_string(), field.clone()))
            .collect()
    });

    let (data, descendants) =
        normalize_record(&doc.data, fields.as_ref(), &Scope::root(&ancestor), env);

    let raw = serde_json::to_value(doc).unwrap_or(Value::Null);
    let mut entity = match &raw {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    let raw_data = Value::Object(doc.data.clone());
    entity.insert(
        "dataString".to_string(),
        Value::String(raw_data.to_string()),
    );
    entity.insert("dataRaw".to_string(), raw_data);
    entity.insert("data".to_string(), Value::Object(data));
    entity.insert("url".to_string(), document_url(doc, &raw, &ancestor, env));
    entity.insert(
        "alternate_languages".to_string(),
        Value::Array(alternate_languages(doc, &ancestor, env)),
    );
    entity.insert(
        PREVIEWABLE_KEY.to_string(),
        Value::String(ancestor.id.to_string()),
    );

    let children = descendants.iter().map(|n| n.id.clone()).collect();
    let node = make_node_with_id(&ancestor.type_name, entity, ancestor.id.clone())
        .with_children(children);

    env.emit(SourceEvent::DocumentNormalized {
        document_id: doc.id.clone(),
        type_name: ancestor.type_name.clone(),
        nodes: descendants.len() + 1,
    });

    let mut nodes = Vec::with_capacity(descendants.len() + 1);
    nodes.push(node);
    nodes.extend(descendants);
    nodes
}

fn document_url(doc: &Document, raw: &Value, ancestor: &AncestorNode, env: &NormalizeEnv<'_>) -> Value {
    let ctx = FieldContext {
        key: "url",
        value: raw,
        node: ancestor,
    };
    env.link_resolver(&ctx)
        .resolve(&DocumentLink::from_document(doc))
        .map(Value::String)
        .unwrap_or(Value::Null)
}

/// Translations as normalized document links. Entries that are not valid
/// document references are dropped.
fn alternate_languages(doc: &Document, ancestor: &AncestorNode, env: &NormalizeEnv<'_>) -> Vec<Value> {
    doc.alternate_languages
        .iter()
        .filter_map(|alt| {
            let mut link = alt.as_object()?.clone();
            link.insert("link_type".to_string(), Value::String("Document".to_string()));
            let link = Value::Object(link);
            let ctx = FieldContext {
                key: "alternate_languages",
                value: alt,
                node: ancestor,
            };
            normalize_link(&link, &ctx, env).value
        })
        .collect()
}
