//! Field normalization: raw CMS field values → enriched graph data.
//!
//! Each field is [classified](crate::classify) and transformed by kind:
//!
//! | Kind | Normalized value |
//! |------|------------------|
//! | rich text | `{html, text, raw}` |
//! | document link | link fields + `url` (resolved), `document` (node ref), `raw` |
//! | media / web link | link fields + `raw` |
//! | broken or empty link | absent |
//! | image | image fields + `localFile` (node ref or `null`), thumbnails likewise |
//! | group | every entry normalized recursively, order preserved |
//! | slice zone | list of slice node refs, see [`slices`](crate::slices) |
//! | scalar | unchanged |
//!
//! ## Absent values
//!
//! A field that normalizes to nothing (a broken link) is reported as
//! `Normalized { value: None }`. When written into a record it becomes `null`.
//!
//! ## Per-field resolvers
//!
//! The link resolver and HTML serializer are not global: the environment holds
//! *factories* invoked with a [`FieldContext`] (`key`, raw `value`, ancestor
//! `node`) for every field occurrence, so a site can resolve links differently
//! per field. Every recursive call threads the same environment and ancestor.
//!
//! ## Concurrency
//!
//! Sibling fields of a record and entries of a group are normalized in
//! parallel with rayon. Nothing is shared mutably: each call returns its value
//! together with the nodes it created, and `collect` restores input order.
//!
//! ## Recursion limit
//!
//! Content nests through groups and slices. Fields deeper than the
//! environment's `max_depth` are passed through unchanged and reported with
//! [`SourceEvent::DepthLimitReached`].

use crate::classify::{FieldKind, classify, classify_declared, is_image};
use crate::config::PluginOptions;
use crate::fetch::{AssetCache, RemoteFileFetcher, localize};
use crate::link::{DocumentLink, LinkResolver, LinkType, RouteResolver};
use crate::naming::TypePath;
use crate::node::document_node_id;
use crate::richtext::{HtmlSerializer, as_html, as_text};
use crate::schema::FieldSchema;
use crate::slices::materialize_slice_zone;
use crate::source::SourceEvent;
use crate::typegraph::TypePaths;
use crate::types::{Node, NodeId, NodeRef};
use rayon::prelude::*;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::mpsc::Sender;

/// Default nesting limit for groups and slices.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Default prefix of every generated type name.
pub const DEFAULT_TYPE_PREFIX: &str = "Prismic";

/// Image keys that are never thumbnails.
const IMAGE_KEYS: [&str; 6] = ["url", "dimensions", "alt", "copyright", "edit", "localFile"];

/// The document a field belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorNode {
    pub id: NodeId,
    pub type_name: String,
    pub custom_type: String,
    pub document_id: String,
}

/// What resolver and serializer factories see for one field occurrence.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    pub key: &'a str,
    pub value: &'a Value,
    pub node: &'a AncestorNode,
}

pub type LinkResolverFactory = dyn Fn(&FieldContext<'_>) -> Arc<dyn LinkResolver> + Send + Sync;
pub type HtmlSerializerFactory =
    dyn Fn(&FieldContext<'_>) -> Option<Arc<dyn HtmlSerializer>> + Send + Sync;

/// Per-field link resolver and HTML serializer overrides, handed to the
/// build and preview drivers so both produce the same URLs and HTML.
#[derive(Clone, Default)]
pub struct FieldHooks {
    link_resolver_factory: Option<Arc<LinkResolverFactory>>,
    html_serializer_factory: Option<Arc<HtmlSerializerFactory>>,
}

impl FieldHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_link_resolver_factory(
        mut self,
        factory: impl Fn(&FieldContext<'_>) -> Arc<dyn LinkResolver> + Send + Sync + 'static,
    ) -> Self {
        self.link_resolver_factory = Some(Arc::new(factory));
        self
    }

    pub fn with_html_serializer_factory(
        mut self,
        factory: impl Fn(&FieldContext<'_>) -> Option<Arc<dyn HtmlSerializer>> + Send + Sync + 'static,
    ) -> Self {
        self.html_serializer_factory = Some(Arc::new(factory));
        self
    }
}

/// Everything normalization needs besides the value itself.
pub struct NormalizeEnv<'a> {
    link_resolver_factory: Arc<LinkResolverFactory>,
    html_serializer_factory: Option<Arc<HtmlSerializerFactory>>,
    fetcher: Option<&'a dyn RemoteFileFetcher>,
    cache: Option<&'a dyn AssetCache>,
    type_paths: Option<&'a TypePaths>,
    events: Option<Sender<SourceEvent>>,
    type_prefix: String,
    max_depth: usize,
}

impl<'a> NormalizeEnv<'a> {
    /// Environment using one link resolver for every field.
    pub fn new(resolver: impl LinkResolver + 'static) -> Self {
        let resolver: Arc<dyn LinkResolver> = Arc::new(resolver);
        Self {
            link_resolver_factory: Arc::new(move |_: &FieldContext<'_>| resolver.clone()),
            html_serializer_factory: None,
            fetcher: None,
            cache: None,
            type_paths: None,
            events: None,
            type_prefix: DEFAULT_TYPE_PREFIX.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Environment configured from plugin options: route-pattern link
    /// resolver, type prefix and recursion limit.
    pub fn from_options(options: &PluginOptions) -> Self {
        Self::new(RouteResolver::new(options.routes.clone()))
            .with_type_prefix(&options.type_prefix)
            .with_max_depth(options.max_depth)
    }

    pub fn with_link_resolver_factory(
        mut self,
        factory: impl Fn(&FieldContext<'_>) -> Arc<dyn LinkResolver> + Send + Sync + 'static,
    ) -> Self {
        self.link_resolver_factory = Arc::new(factory);
        self
    }

    pub fn with_html_serializer(mut self, serializer: impl HtmlSerializer + 'static) -> Self {
        let serializer: Arc<dyn HtmlSerializer> = Arc::new(serializer);
        self.html_serializer_factory =
            Some(Arc::new(move |_: &FieldContext<'_>| Some(serializer.clone())));
        self
    }

    pub fn with_html_serializer_factory(
        mut self,
        factory: impl Fn(&FieldContext<'_>) -> Option<Arc<dyn HtmlSerializer>> + Send + Sync + 'static,
    ) -> Self {
        self.html_serializer_factory = Some(Arc::new(factory));
        self
    }

    /// Install the factories set on `hooks`. Unset ones keep the current
    /// resolver or serializer.
    pub fn with_hooks(mut self, hooks: &FieldHooks) -> Self {
        if let Some(factory) = &hooks.link_resolver_factory {
            self.link_resolver_factory = factory.clone();
        }
        if let Some(factory) = &hooks.html_serializer_factory {
            self.html_serializer_factory = Some(factory.clone());
        }
        self
    }

    pub fn with_fetcher(mut self, fetcher: &'a dyn RemoteFileFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_cache(mut self, cache: &'a dyn AssetCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_type_paths(mut self, type_paths: &'a TypePaths) -> Self {
        self.type_paths = Some(type_paths);
        self
    }

    pub fn with_events(mut self, events: Sender<SourceEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_type_prefix(mut self, prefix: &str) -> Self {
        self.type_prefix = prefix.to_string();
        self
    }

    pub fn type_prefix(&self) -> &str {
        &self.type_prefix
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn link_resolver(&self, ctx: &FieldContext<'_>) -> Arc<dyn LinkResolver> {
        (self.link_resolver_factory)(ctx)
    }

    pub fn html_serializer(&self, ctx: &FieldContext<'_>) -> Option<Arc<dyn HtmlSerializer>> {
        self.html_serializer_factory.as_ref().and_then(|f| f(ctx))
    }

    /// Send a progress/diagnostic event if anyone is listening.
    pub fn emit(&self, event: SourceEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Where a field sits: its ancestor document, its type path (for naming) and
/// its id path (for deterministic child ids, including list indices).
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    pub ancestor: &'a AncestorNode,
    pub type_path: TypePath,
    pub id_path: Vec<String>,
    pub depth: usize,
}

impl<'a> Scope<'a> {
    /// Top-level scope of a document's data record.
    pub fn root(ancestor: &'a AncestorNode) -> Self {
        Self {
            ancestor,
            type_path: TypePath::root(ancestor.type_name.clone()),
            id_path: Vec::new(),
            depth: 0,
        }
    }

    /// Scope of a field within this record.
    pub fn child(&self, key: &str) -> Self {
        let mut id_path = self.id_path.clone();
        id_path.push(key.to_string());
        Self {
            ancestor: self.ancestor,
            type_path: self.type_path.child(key),
            id_path,
            depth: self.depth + 1,
        }
    }

    /// Scope of a list entry. The type path is unchanged: every entry has the same type.
    /// Depth is unchanged too; list entries do not count toward `max_depth`.
    pub fn index(&self, index: usize) -> Self {
        let mut id_path = self.id_path.clone();
        id_path.push(index.to_string());
        Self {
            ancestor: self.ancestor,
            type_path: self.type_path.clone(),
            id_path,
            depth: self.depth,
        }
    }

    /// Scope of a record that gets its own type (a slice's primary or items),
    /// named from `owner`, reached through `key`.
    pub fn owned(&self, owner: String, key: &str) -> Self {
        let mut id_path = self.id_path.clone();
        id_path.push(key.to_string());
        Self {
            ancestor: self.ancestor,
            type_path: TypePath::root(owner),
            id_path,
            depth: self.depth + 1,
        }
    }

    /// Dotted id path, e.g. `body.2.items.0`.
    pub fn id_key(&self) -> String {
        self.id_path.join(".")
    }
}

/// Result of normalizing one value: the value (None = absent) and every node
/// created while normalizing it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub value: Option<Value>,
    pub nodes: Vec<Node>,
}

impl Normalized {
    pub fn value(value: Value) -> Self {
        Self {
            value: Some(value),
            nodes: Vec::new(),
        }
    }

    pub fn absent() -> Self {
        Self::default()
    }

    pub fn is_absent(&self) -> bool {
        self.value.is_none()
    }
}

/// Normalize one field of a record.
///
/// `scope` is the scope of the record containing the field; `schema` is the
/// field's schema entry, when the custom type schema is available.
pub fn normalize_field(
    key: &str,
    value: &Value,
    schema: Option<&FieldSchema>,
    scope: &Scope<'_>,
    env: &NormalizeEnv<'_>,
) -> Normalized {
    let field_scope = scope.child(key);
    if field_scope.depth > env.max_depth {
        env.emit(SourceEvent::DepthLimitReached {
            document_id: scope.ancestor.document_id.clone(),
            path: field_scope.id_key(),
        });
        return Normalized::value(value.clone());
    }

    let kind = match schema {
        Some(_) => classify(value, schema),
        None => classify_declared(
            value,
            env.type_paths.and_then(|tp| tp.get(&field_scope.type_path)),
        ),
    };
    let ctx = FieldContext {
        key,
        value,
        node: scope.ancestor,
    };

    match kind {
        FieldKind::RichText => normalize_rich_text(value, &ctx, env),
        FieldKind::Link => normalize_link(value, &ctx, env),
        FieldKind::Image => normalize_image(value, env),
        FieldKind::Group => normalize_group(value, schema, &field_scope, env),
        FieldKind::SliceZone => materialize_slice_zone(key, value, schema, scope, env),
        FieldKind::Scalar => Normalized::value(value.clone()),
    }
}

/// Normalize every field of a record, in parallel, keeping key order.
pub fn normalize_record(
    record: &Map<String, Value>,
    schemas: Option<&BTreeMap<String, FieldSchema>>,
    scope: &Scope<'_>,
    env: &NormalizeEnv<'_>,
) -> (Map<String, Value>, Vec<Node>) {
    let entries: Vec<(&String, &Value)> = record.iter().collect();
    let results: Vec<(&String, Normalized)> = entries
        .par_iter()
        .map(|(key, value)| {
            let schema = schemas.and_then(|s| s.get(key.as_str()));
            (*key, normalize_field(key, value, schema, scope, env))
        })
        .collect();

    let mut data = Map::new();
    let mut nodes = Vec::new();
    for (key, normalized) in results {
        data.insert(key.clone(), normalized.value.unwrap_or(Value::Null));
        nodes.extend(normalized.nodes);
    }
    (data, nodes)
}

fn normalize_rich_text(value: &Value, ctx: &FieldContext<'_>, env: &NormalizeEnv<'_>) -> Normalized {
    if !value.is_array() {
        return Normalized::value(value.clone());
    }
    let resolver = env.link_resolver(ctx);
    let serializer = env.html_serializer(ctx);
    let html = as_html(value, resolver.as_ref(), serializer.as_deref());
    let mut out = Map::new();
    out.insert("html".to_string(), Value::String(html));
    out.insert("text".to_string(), Value::String(as_text(value)));
    out.insert("raw".to_string(), value.clone());
    Normalized::value(Value::Object(out))
}

/// Normalize a link value. Broken document links and unrecognized link
/// types are absent.
pub fn normalize_link(value: &Value, ctx: &FieldContext<'_>, env: &NormalizeEnv<'_>) -> Normalized {
    let Some(fields) = value.as_object() else {
        return Normalized::absent();
    };
    let mut out = fields.clone();
    match LinkType::of(value) {
        LinkType::Document => {
            let Some(link) = DocumentLink::from_value(value) else {
                return Normalized::absent();
            };
            let url = env.link_resolver(ctx).resolve(&link);
            let document = NodeRef::new(document_node_id(&link.custom_type, &link.id));
            out.insert("url".to_string(), url.map(Value::String).unwrap_or(Value::Null));
            out.insert("document".to_string(), document.to_value());
        }
        LinkType::Media | LinkType::Web => {
            out.entry("url").or_insert(Value::Null);
        }
        LinkType::Other => return Normalized::absent(),
    }
    out.insert("raw".to_string(), value.clone());
    Normalized::value(Value::Object(out))
}

/// Attach `localFile` to an image and to each of its named thumbnails.
pub fn normalize_image(value: &Value, env: &NormalizeEnv<'_>) -> Normalized {
    let Some(fields) = value.as_object() else {
        return Normalized::value(value.clone());
    };
    let mut out = Map::new();
    for (key, field) in fields {
        let normalized = if !IMAGE_KEYS.contains(&key.as_str()) && is_image(field) {
            normalize_image(field, env).value.unwrap_or(Value::Null)
        } else {
            field.clone()
        };
        out.insert(key.clone(), normalized);
    }
    let local_file = fields
        .get("url")
        .and_then(Value::as_str)
        .and_then(|url| localize_image(url, env));
    out.insert(
        "localFile".to_string(),
        local_file.map(|r| r.to_value()).unwrap_or(Value::Null),
    );
    Normalized::value(Value::Object(out))
}

fn localize_image(url: &str, env: &NormalizeEnv<'_>) -> Option<NodeRef> {
    let fetcher = env.fetcher?;
    match localize(url, fetcher, env.cache) {
        Ok(handle) => Some(NodeRef::new(handle.id)),
        Err(e) => {
            env.emit(SourceEvent::AssetFetchFailed {
                url: url.to_string(),
                error: e.to_string(),
            });
            None
        }
    }
}

fn normalize_group(
    value: &Value,
    schema: Option<&FieldSchema>,
    field_scope: &Scope<'_>,
    env: &NormalizeEnv<'_>,
) -> Normalized {
    let Some(entries) = value.as_array() else {
        return Normalized::value(value.clone());
    };
    let fields = schema.map(|s| &s.config.fields);
    let results: Vec<(Value, Vec<Node>)> = entries
        .par_iter()
        .enumerate()
        .map(|(index, entry)| match entry.as_object() {
            Some(record) => {
                let (data, nodes) = normalize_record(record, fields, &field_scope.index(index), env);
                (Value::Object(data), nodes)
            }
            None => (entry.clone(), Vec::new()),
        })
        .collect();

    let mut out = Vec::with_capacity(results.len());
    let mut nodes = Vec::new();
    for (entry, entry_nodes) in results {
        out.push(entry);
        nodes.extend(entry_nodes);
    }
    Normalized {
        value: Some(Value::Array(out)),
        nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryAssetCache;
    use crate::fetch::tests::MockFetcher;
    use crate::test_helpers::{ancestor, test_env};
    use serde_json::json;
    use std::sync::mpsc;

    fn normalize(value: Value) -> Normalized {
        let node = ancestor("page", "doc1");
        let scope = Scope::root(&node);
        normalize_field("field", &value, None, &scope, &test_env())
    }

    // =========================================================================
    // Rich text
    // =========================================================================

    #[test]
    fn rich_text_becomes_html_text_raw() {
        let raw = json!([{"type": "heading1", "text": "Hi", "spans": []}]);
        let out = normalize(raw.clone()).value.unwrap();
        assert_eq!(out["html"], "<h1>Hi</h1>");
        assert_eq!(out["text"], "Hi");
        assert_eq!(out["raw"], raw);
    }

    #[test]
    fn rich_text_uses_per_field_resolver() {
        let node = ancestor("page", "doc1");
        let scope = Scope::root(&node);
        let env = test_env().with_link_resolver_factory(|ctx| {
            let prefix = format!("/{}", ctx.key);
            let resolver: Arc<dyn LinkResolver> =
                Arc::new(move |l: &DocumentLink| Some(format!("{prefix}/{}", l.id)));
            resolver
        });
        let value = json!([{
            "type": "paragraph", "text": "x",
            "spans": [{"start": 0, "end": 1, "type": "hyperlink",
                       "data": {"link_type": "Document", "id": "d2", "type": "page"}}]
        }]);
        let out = normalize_field("body_text", &value, None, &scope, &env)
            .value
            .unwrap();
        assert_eq!(out["html"], r#"<p><a href="/body_text/d2">x</a></p>"#);
    }

    #[test]
    fn rich_text_uses_serializer_factory_context() {
        let node = ancestor("page", "doc1");
        let scope = Scope::root(&node);
        let env = test_env().with_html_serializer_factory(|ctx| {
            let custom: Arc<dyn HtmlSerializer> = Arc::new(
                |element: &crate::richtext::Element<'_>, children: &str| match element.kind {
                    crate::richtext::ElementKind::Paragraph => {
                        Some(format!("<div>{children}</div>"))
                    }
                    _ => None,
                },
            );
            (ctx.key == "custom").then_some(custom)
        });
        let value = json!([{"type": "paragraph", "text": "p", "spans": []}]);
        let custom = normalize_field("custom", &value, None, &scope, &env);
        let plain = normalize_field("plain", &value, None, &scope, &env);
        assert_eq!(custom.value.unwrap()["html"], "<div>p</div>");
        assert_eq!(plain.value.unwrap()["html"], "<p>p</p>");
    }

    #[test]
    fn hooks_keep_unset_factories() {
        let node = ancestor("page", "doc1");
        let scope = Scope::root(&node);
        let hooks = FieldHooks::new().with_html_serializer_factory(|_| {
            let custom: Arc<dyn HtmlSerializer> =
                Arc::new(|_: &crate::richtext::Element<'_>, _: &str| -> Option<String> { None });
            Some(custom)
        });
        let env = test_env().with_hooks(&hooks);
        let out = normalize_field(
            "link",
            &json!({"link_type": "Document", "id": "d2", "type": "page"}),
            None,
            &scope,
            &env,
        );
        assert_eq!(out.value.unwrap()["url"], "/d2/");
    }

    // =========================================================================
    // Links
    // =========================================================================

    #[test]
    fn document_link_resolves_url_and_reference() {
        let out = normalize(json!({"link_type": "Document", "id": "abc", "type": "page"}))
            .value
            .unwrap();
        assert_eq!(out["url"], "/abc/");
        assert_eq!(
            out["document"],
            NodeRef::new(document_node_id("page", "abc")).to_value()
        );
        assert_eq!(out["raw"]["id"], "abc");
    }

    #[test]
    fn document_link_missing_id_or_type_is_absent() {
        assert!(normalize(json!({"link_type": "Document", "type": "page"})).is_absent());
        assert!(normalize(json!({"link_type": "Document", "id": "abc"})).is_absent());
        assert!(
            normalize(json!({"link_type": "Document", "id": "a", "type": "p", "isBroken": true}))
                .is_absent()
        );
    }

    #[test]
    fn document_link_without_route_has_null_url() {
        let node = ancestor("page", "doc1");
        let scope = Scope::root(&node);
        let env = NormalizeEnv::new(|_: &DocumentLink| None);
        let value = json!({"link_type": "Document", "id": "abc", "type": "page"});
        let out = normalize_field("link", &value, None, &scope, &env)
            .value
            .unwrap();
        assert_eq!(out["url"], Value::Null);
        assert!(out.get("document").is_some());
    }

    #[test]
    fn web_and_media_links_pass_through_with_raw() {
        let web = normalize(json!({"link_type": "Web", "url": "https://x.io", "target": "_blank"}))
            .value
            .unwrap();
        assert_eq!(web["url"], "https://x.io");
        assert_eq!(web["target"], "_blank");
        assert_eq!(web["raw"]["url"], "https://x.io");

        let media = normalize(json!({"link_type": "Media", "url": "https://cdn/a.pdf", "kind": "document"}))
            .value
            .unwrap();
        assert_eq!(media["url"], "https://cdn/a.pdf");
        assert_eq!(media["kind"], "document");
    }

    #[test]
    fn unrecognized_link_type_is_absent() {
        assert!(normalize(json!({"link_type": "Any"})).is_absent());
    }

    #[test]
    fn absent_link_in_record_becomes_null() {
        let node = ancestor("page", "doc1");
        let scope = Scope::root(&node);
        let record = json!({"cta": {"link_type": "Any"}, "title": "x"});
        let (data, nodes) =
            normalize_record(record.as_object().unwrap(), None, &scope, &test_env());
        assert_eq!(data["cta"], Value::Null);
        assert_eq!(data["title"], "x");
        assert!(nodes.is_empty());
    }

    // =========================================================================
    // Images
    // =========================================================================

    fn image(url: &str) -> Value {
        json!({
            "url": url,
            "alt": "alt",
            "copyright": null,
            "dimensions": {"width": 100, "height": 50}
        })
    }

    #[test]
    fn image_without_fetcher_has_null_local_file() {
        let out = normalize(image("https://cdn/a.png")).value.unwrap();
        assert_eq!(out["localFile"], Value::Null);
        assert_eq!(out["url"], "https://cdn/a.png");
    }

    #[test]
    fn image_and_thumbnails_are_localized() {
        let fetcher = MockFetcher::new();
        let cache = MemoryAssetCache::new();
        let env = test_env().with_fetcher(&fetcher).with_cache(&cache);
        let node = ancestor("page", "doc1");
        let scope = Scope::root(&node);
        let mut value = image("https://cdn/a.png");
        value["mobile"] = image("https://cdn/a-mobile.png");

        let out = normalize_field("hero", &value, None, &scope, &env)
            .value
            .unwrap();
        assert_eq!(
            out["localFile"],
            NodeRef::new(crate::fetch::file_node_id("https://cdn/a.png")).to_value()
        );
        assert_eq!(
            out["mobile"]["localFile"],
            NodeRef::new(crate::fetch::file_node_id("https://cdn/a-mobile.png")).to_value()
        );
        assert_eq!(fetcher.get_requests().len(), 2);
    }

    #[test]
    fn image_fetch_failure_is_null_and_reported() {
        let fetcher = MockFetcher::failing(&["https://cdn/a.png"]);
        let (tx, rx) = mpsc::channel();
        let env = test_env().with_fetcher(&fetcher).with_events(tx);
        let node = ancestor("page", "doc1");
        let scope = Scope::root(&node);

        let out = normalize_field("hero", &image("https://cdn/a.png"), None, &scope, &env);
        drop(env);
        assert_eq!(out.value.unwrap()["localFile"], Value::Null);
        let events: Vec<SourceEvent> = rx.iter().collect();
        assert!(matches!(
            &events[..],
            [SourceEvent::AssetFetchFailed { url, .. }] if url == "https://cdn/a.png"
        ));
    }

    // =========================================================================
    // Groups
    // =========================================================================

    #[test]
    fn group_entries_are_normalized_in_order() {
        let value = json!([
            {"label": "one", "text": [{"type": "paragraph", "text": "1", "spans": []}]},
            {"label": "two", "text": [{"type": "paragraph", "text": "2", "spans": []}]}
        ]);
        let out = normalize(value).value.unwrap();
        let entries = out.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["label"], "one");
        assert_eq!(entries[0]["text"]["html"], "<p>1</p>");
        assert_eq!(entries[1]["text"]["text"], "2");
    }

    #[test]
    fn group_schema_drives_nested_classification() {
        let schema: FieldSchema = serde_json::from_value(json!({
            "type": "Group",
            "config": {"fields": {"items": {"type": "Group"}}}
        }))
        .unwrap();
        let node = ancestor("page", "doc1");
        let scope = Scope::root(&node);
        // Without the schema `items` would look like a rich text block list.
        let value = json!([{"items": [{"spans": [], "name": "x"}]}]);
        let out = normalize_field("links", &value, Some(&schema), &scope, &test_env())
            .value
            .unwrap();
        assert_eq!(out[0]["items"][0]["name"], "x");
        assert!(out[0]["items"][0].get("html").is_none());
    }

    #[test]
    fn type_paths_declare_kinds_without_schema() {
        let mut paths = TypePaths::default();
        paths.insert(
            &TypePath::root("PrismicPage").child("links"),
            FieldKind::Group,
        );
        let env = test_env().with_type_paths(&paths);
        let node = ancestor("page", "doc1");
        let scope = Scope::root(&node);
        let value = json!([{"spans": [], "name": "x"}]);
        let out = normalize_field("links", &value, None, &scope, &env)
            .value
            .unwrap();
        assert_eq!(out[0]["name"], "x");
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(normalize(json!("plain")).value, Some(json!("plain")));
        assert_eq!(normalize(json!([])).value, Some(json!([])));
        assert_eq!(normalize(json!(null)).value, Some(json!(null)));
    }

    #[test]
    fn list_entries_do_not_add_depth() {
        let node = ancestor("page", "doc1");
        let group = Scope::root(&node).child("group");
        let entry = group.index(0).index(3);
        assert_eq!(entry.depth, group.depth);
        assert_eq!(entry.id_key(), "group.0.3");
        assert_eq!(entry.child("inner").depth, group.depth + 1);
    }

    #[test]
    fn depth_limit_passes_value_through() {
        let (tx, rx) = mpsc::channel();
        let env = test_env().with_max_depth(1).with_events(tx);
        let node = ancestor("page", "doc1");
        let scope = Scope::root(&node);
        let value = json!([{"inner": [{"type": "heading1", "text": "deep", "spans": []}]}]);

        let out = normalize_field("group", &value, None, &scope, &env)
            .value
            .unwrap();
        drop(env);
        // The group itself is within the limit, its nested rich text is not.
        assert_eq!(out[0]["inner"][0]["text"], "deep");
        assert!(out[0]["inner"].is_array());
        let events: Vec<SourceEvent> = rx.iter().collect();
        assert!(matches!(
            &events[..],
            [SourceEvent::DepthLimitReached { path, .. }] if path == "group.0.inner"
        ));
    }
}
