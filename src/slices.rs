//! Slice-zone materialization.
//!
//! A slice zone is an ordered, heterogeneous list of slices. Every entry
//! becomes its own node and the zone's value becomes the ordered list of
//! references to those nodes.
//!
//! For entry `i` of zone `body` on a `PrismicPage` document:
//!
//! | | |
//! |---|---|
//! | id | `node_id(["slice", document node id, "body", i])` |
//! | type | `PrismicPageBody` + PascalCase(`slice_type`), e.g. `PrismicPageBodyText` |
//! | parent | the document node |
//! | `primary` | normalized record, nested types owned by `PrismicPageBodyTextPrimary` |
//! | `items` | normalized records, nested types owned by `PrismicPageBodyTextItems` |
//!
//! The type name encodes the variant, so a zone mixing `text` and `quote`
//! slices produces two node types; the zone's union type (see
//! [`typegraph`](crate::typegraph)) lists every variant the schema declares.
//!
//! Entries are normalized in parallel; the output keeps input order.

use crate::naming::{slice_items_owner, slice_primary_owner};
use crate::node::{make_node_with_id, node_id};
use crate::normalize::{NormalizeEnv, Normalized, Scope, normalize_record};
use crate::schema::{FieldSchema, SliceChoice};
use crate::types::{Node, NodeId, NodeRef};
use rayon::prelude::*;
use serde_json::Value;

/// `slice_type` used for entries that do not declare one.
const UNKNOWN_SLICE: &str = "unknown";

/// Id of slice entry `index` of the zone at `zone_path` within a document.
pub fn slice_node_id(ancestor: &NodeId, zone_path: &str, index: usize) -> NodeId {
    node_id(&["slice", ancestor.as_str(), zone_path, &index.to_string()])
}

/// Turn a slice zone into slice nodes.
///
/// `scope` is the scope of the record holding the zone. Returns the list of
/// node references as the value, and every node created (the slices and
/// anything nested inside them), entry by entry.
pub fn materialize_slice_zone(
    zone_key: &str,
    entries: &Value,
    schema: Option<&FieldSchema>,
    scope: &Scope<'_>,
    env: &NormalizeEnv<'_>,
) -> Normalized {
    let Some(entries) = entries.as_array() else {
        return Normalized::value(entries.clone());
    };
    let zone = scope.child(zone_key);

    let materialized: Vec<(NodeRef, Vec<Node>)> = entries
        .par_iter()
        .enumerate()
        .map(|(index, entry)| materialize_entry(entry, index, schema, &zone, env))
        .collect();

    let mut refs = Vec::with_capacity(materialized.len());
    let mut nodes = Vec::new();
    for (node_ref, entry_nodes) in materialized {
        refs.push(node_ref.to_value());
        nodes.extend(entry_nodes);
    }
    Normalized {
        value: Some(Value::Array(refs)),
        nodes,
    }
}

fn materialize_entry(
    entry: &Value,
    index: usize,
    schema: Option<&FieldSchema>,
    zone: &Scope<'_>,
    env: &NormalizeEnv<'_>,
) -> (NodeRef, Vec<Node>) {
    let mut entity = entry.as_object().cloned().unwrap_or_default();
    let slice_type = entity
        .get("slice_type")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_SLICE)
        .to_string();
    let internal_type = zone.type_path.slice_node(&slice_type);
    let id = slice_node_id(&zone.ancestor.id, &zone.id_key(), index);
    let choice = schema.and_then(|s| s.config.choices.get(&slice_type));
    let entry_scope = zone.index(index);

    let mut nested = Vec::new();
    if let Some(primary) = entity.get("primary").and_then(Value::as_object) {
        let scope = entry_scope.owned(slice_primary_owner(&internal_type), "primary");
        let (data, nodes) = normalize_record(primary, choice.map(|c| &c.non_repeat), &scope, env);
        entity.insert("primary".to_string(), Value::Object(data));
        nested.extend(nodes);
    }
    if let Some(items) = entity.get("items").and_then(Value::as_array) {
        let scope = entry_scope.owned(slice_items_owner(&internal_type), "items");
        let (records, nodes) = normalize_items(items, choice, &scope, env);
        entity.insert("items".to_string(), Value::Array(records));
        nested.extend(nodes);
    }
    entity
        .entry("slice_type")
        .or_insert_with(|| Value::String(slice_type.clone()));

    let node = make_node_with_id(&internal_type, entity, id.clone())
        .with_parent(zone.ancestor.id.clone());
    let mut nodes = Vec::with_capacity(nested.len() + 1);
    nodes.push(node);
    nodes.extend(nested);
    (NodeRef::new(id), nodes)
}

fn normalize_items(
    items: &[Value],
    choice: Option<&SliceChoice>,
    scope: &Scope<'_>,
    env: &NormalizeEnv<'_>,
) -> (Vec<Value>, Vec<Node>) {
    let results: Vec<(Value, Vec<Node>)> = items
        .par_iter()
        .enumerate()
        .map(|(index, item)| match item.as_object() {
            Some(record) => {
                let (data, nodes) =
                    normalize_record(record, choice.map(|c| &c.repeat), &scope.index(index), env);
                (Value::Object(data), nodes)
            }
            None => (item.clone(), Vec::new()),
        })
        .collect();

    let mut records = Vec::with_capacity(results.len());
    let mut nodes = Vec::new();
    for (record, item_nodes) in results {
        records.push(record);
        nodes.extend(item_nodes);
    }
    (records, nodes)
}
