//! Preview runtime and merge engine.
//!
//! A [`PreviewSession`] lives as long as the page that hosts it. Each preview
//! request moves it through
//!
//! ```text
//! Idle ──begin──► Fetching ──complete(Ok)──► Merged
//!                          └─complete(Err)─► Failed
//! ```
//!
//! The fetched document goes through the same [`document_to_nodes`] as a build,
//! so live nodes have exactly the ids and shapes of static ones. No schema is
//! available at this point; field kinds come from the compiled [`TypePaths`]
//! when the session has them, otherwise from shape classification.
//!
//! ## Last request wins
//!
//! [`PreviewSession::begin`] hands out a [`PreviewTicket`] with a generation
//! number. Only the result of the newest ticket is applied; a slower, older
//! request that completes later is dropped instead of overwriting fresher
//! nodes.
//!
//! ## Merging
//!
//! Static page data is merged with the live nodes eagerly, producing a new
//! value (see [`MergeStrategy`]). With no live nodes the static data is
//! returned as is, without traversal.

use crate::client::{ClientError, CmsClient, QueryOptions};
use crate::config::PluginOptions;
use crate::document::{PREVIEWABLE_KEY, document_to_nodes};
use crate::naming::camel_case;
use crate::normalize::{FieldHooks, NormalizeEnv};
use crate::source::SourceEvent;
use crate::typegraph::TypePaths;
use crate::types::{Node, NodeId, NodeRef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::mpsc::Sender;
use thiserror::Error;

/// Store key holding the preview token when the URL carries none.
pub const PREVIEW_COOKIE: &str = "io.prismic.preview";

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("No preview token in URL or store")]
    MissingToken,
    #[error("No document id in preview URL")]
    MissingDocumentId,
    #[error("Invalid preview URL: {0}")]
    InvalidUrl(String),
    #[error("No plugin options for repository {0}")]
    UnknownRepository(String),
    #[error("Cannot tell which repository to preview")]
    AmbiguousRepository,
    #[error("CMS request failed: {0}")]
    Client(#[from] ClientError),
    #[error("No route for document {0}")]
    MissingRoute(String),
    #[error("Unknown merge strategy: {0}")]
    UnknownStrategy(String),
}

/// Read-only key/value store the browser environment exposes (cookies).
pub trait PreviewStore {
    fn get(&self, key: &str) -> Option<String>;
}

impl PreviewStore for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        BTreeMap::get(self, key).cloned()
    }
}

impl PreviewStore for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// What a preview request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewParams {
    /// Preview ref. The CMS issues it as a URL on the repository's host.
    pub token: String,
    pub document_id: String,
}

impl PreviewParams {
    /// Read `token` and `documentId` from a preview URL's query string. A
    /// missing token falls back to [`PREVIEW_COOKIE`] in the store.
    pub fn resolve(url: &str, store: &dyn PreviewStore) -> Result<Self, PreviewError> {
        let parsed =
            url::Url::parse(url).map_err(|_| PreviewError::InvalidUrl(url.to_string()))?;
        let mut token = None;
        let mut document_id = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "token" if !value.is_empty() => token = Some(value.into_owned()),
                "documentId" if !value.is_empty() => document_id = Some(value.into_owned()),
                _ => {}
            }
        }
        let token = token
            .or_else(|| store.get(PREVIEW_COOKIE))
            .filter(|t| !t.is_empty())
            .ok_or(PreviewError::MissingToken)?;
        let document_id = document_id.ok_or(PreviewError::MissingDocumentId)?;
        Ok(Self { token, document_id })
    }

    /// Repository named by the token's host, `<repo>.prismic.io` or
    /// `<repo>.cdn.prismic.io`.
    pub fn repository(&self) -> Option<String> {
        let parsed = url::Url::parse(&self.token).ok()?;
        let host = parsed.host_str()?;
        let (repo, rest) = host.split_once('.')?;
        (rest.ends_with("prismic.io") && !repo.is_empty()).then(|| repo.to_string())
    }
}

/// How live nodes are merged into static page data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergeStrategy {
    /// Replace every object whose `_previewable` id has a live node.
    TraverseAndReplace,
    /// Insert or overwrite one root key, named after the live node's type.
    RootReplaceOrInsert,
}

impl FromStr for MergeStrategy {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "traverseAndReplace" | "traverse-and-replace" => Ok(MergeStrategy::TraverseAndReplace),
            "rootReplaceOrInsert" | "root-replace-or-insert" => {
                Ok(MergeStrategy::RootReplaceOrInsert)
            }
            other => Err(PreviewError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewState {
    Idle,
    Fetching { generation: u64 },
    Merged { node: NodeId, path: String },
    Failed { error: String },
}

/// Handle for one in-flight preview request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct PreviewTicket {
    generation: u64,
}

/// Result of a successful fetch, not yet applied to the session.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPreview {
    pub root: NodeId,
    pub path: String,
    pub nodes: Vec<Node>,
}

/// Merged page data. Borrowed when nothing was replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged<'a> {
    pub data: Cow<'a, Value>,
    pub is_preview: bool,
}

/// Preview state exposed to consuming views.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSnapshot {
    pub is_preview: bool,
    pub is_loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<Value>,
}

/// Live nodes and state of one preview session.
pub struct PreviewSession {
    nodes_by_id: BTreeMap<NodeId, Node>,
    options_by_repository: BTreeMap<String, PluginOptions>,
    type_paths: TypePaths,
    hooks: FieldHooks,
    state: PreviewState,
    generation: u64,
    events: Option<Sender<SourceEvent>>,
}

impl PreviewSession {
    pub fn new(options_by_repository: BTreeMap<String, PluginOptions>) -> Self {
        Self {
            nodes_by_id: BTreeMap::new(),
            options_by_repository,
            type_paths: TypePaths::default(),
            hooks: FieldHooks::default(),
            state: PreviewState::Idle,
            generation: 0,
            events: None,
        }
    }

    /// Session for a single repository.
    pub fn for_options(options: PluginOptions) -> Self {
        let mut by_repository = BTreeMap::new();
        by_repository.insert(options.repository_name.clone(), options);
        Self::new(by_repository)
    }

    pub fn with_type_paths(mut self, type_paths: TypePaths) -> Self {
        self.type_paths = type_paths;
        self
    }

    /// Per-field resolver and serializer overrides. Pass the ones the build
    /// used so live nodes carry the same URLs and HTML.
    pub fn with_hooks(mut self, hooks: FieldHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_events(mut self, events: Sender<SourceEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> &PreviewState {
        &self.state
    }

    pub fn nodes_by_id(&self) -> &BTreeMap<NodeId, Node> {
        &self.nodes_by_id
    }

    fn emit(&self, event: SourceEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Start a request. Any earlier ticket is superseded.
    pub fn begin(&mut self) -> PreviewTicket {
        self.generation += 1;
        self.state = PreviewState::Fetching {
            generation: self.generation,
        };
        PreviewTicket {
            generation: self.generation,
        }
    }

    /// Options of the repository a request targets: the token's host, or the
    /// only configured repository.
    pub fn options_for(&self, params: &PreviewParams) -> Result<&PluginOptions, PreviewError> {
        match params.repository() {
            Some(repo) => self
                .options_by_repository
                .get(&repo)
                .ok_or(PreviewError::UnknownRepository(repo)),
            None => {
                let mut all = self.options_by_repository.values();
                match (all.next(), all.next()) {
                    (Some(only), None) => Ok(only),
                    _ => Err(PreviewError::AmbiguousRepository),
                }
            }
        }
    }

    /// Fetch and normalize the previewed document. Does not touch the
    /// session; apply the result with [`complete`](Self::complete).
    ///
    /// The redirect path is the document node's `url`, so it comes from the
    /// same resolver as every link in the build.
    pub fn fetch(
        &self,
        params: &PreviewParams,
        client: &dyn CmsClient,
    ) -> Result<FetchedPreview, PreviewError> {
        let options = self.options_for(params)?;
        let query = QueryOptions::from_options(options).with_ref(&params.token);
        let document = client.get_by_id(&params.document_id, &query)?;

        let env = NormalizeEnv::from_options(options)
            .with_hooks(&self.hooks)
            .with_type_paths(&self.type_paths);
        let nodes = document_to_nodes(&document, None, &env);
        let (root, path) = nodes
            .first()
            .and_then(|n| {
                let url = n.data.get("url").and_then(Value::as_str)?;
                Some((n.id.clone(), url.to_string()))
            })
            .ok_or_else(|| PreviewError::MissingRoute(document.id.clone()))?;
        Ok(FetchedPreview { root, path, nodes })
    }

    /// Apply a fetch result. Returns false (and changes nothing) when the
    /// ticket has been superseded by a newer [`begin`](Self::begin).
    pub fn complete(
        &mut self,
        ticket: PreviewTicket,
        result: Result<FetchedPreview, PreviewError>,
    ) -> bool {
        if ticket.generation != self.generation {
            return false;
        }
        match result {
            Ok(fetched) => {
                let document_id = self
                    .node_document_id(&fetched.nodes)
                    .unwrap_or_else(|| fetched.root.to_string());
                for node in fetched.nodes {
                    self.nodes_by_id.insert(node.id.clone(), node);
                }
                self.emit(SourceEvent::PreviewFetched {
                    document_id,
                    path: Some(fetched.path.clone()),
                });
                self.state = PreviewState::Merged {
                    node: fetched.root,
                    path: fetched.path,
                };
            }
            Err(e) => {
                self.emit(SourceEvent::PreviewFailed {
                    error: e.to_string(),
                });
                self.state = PreviewState::Failed {
                    error: e.to_string(),
                };
            }
        }
        true
    }

    fn node_document_id(&self, nodes: &[Node]) -> Option<String> {
        nodes
            .first()?
            .data
            .get("prismicId")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// `begin`, `fetch` and `complete` in one step.
    pub fn run(&mut self, params: &PreviewParams, client: &dyn CmsClient) -> &PreviewState {
        let ticket = self.begin();
        let result = self.fetch(params, client);
        self.complete(ticket, result);
        &self.state
    }

    /// Resolve request parameters and run, recording parameter errors as a
    /// failed state like any other preview failure.
    pub fn run_url(
        &mut self,
        url: &str,
        store: &dyn PreviewStore,
        client: &dyn CmsClient,
    ) -> &PreviewState {
        match PreviewParams::resolve(url, store) {
            Ok(params) => self.run(&params, client),
            Err(e) => {
                let ticket = self.begin();
                self.complete(ticket, Err(e));
                &self.state
            }
        }
    }

    fn max_depth(&self) -> usize {
        self.options_by_repository
            .values()
            .map(|o| o.max_depth)
            .max()
            .unwrap_or(crate::normalize::DEFAULT_MAX_DEPTH)
    }

    /// The previewed node with its references inlined.
    pub fn live_root(&self) -> Option<Value> {
        let PreviewState::Merged { node, .. } = &self.state else {
            return None;
        };
        let live = self.nodes_by_id.get(node)?;
        Some(materialize(live, &self.nodes_by_id, self.max_depth()))
    }

    pub fn snapshot(&self) -> PreviewSnapshot {
        match &self.state {
            PreviewState::Idle | PreviewState::Failed { .. } => PreviewSnapshot {
                is_preview: false,
                is_loading: false,
                path: None,
                node: None,
            },
            PreviewState::Fetching { .. } => PreviewSnapshot {
                is_preview: false,
                is_loading: true,
                path: None,
                node: None,
            },
            PreviewState::Merged { path, .. } => PreviewSnapshot {
                is_preview: true,
                is_loading: false,
                path: Some(path.clone()),
                node: self.live_root(),
            },
        }
    }

    /// Merge live nodes into static page data.
    pub fn merge<'a>(&self, data: &'a Value, strategy: MergeStrategy) -> Merged<'a> {
        match strategy {
            MergeStrategy::TraverseAndReplace => {
                traverse_and_replace(data, &self.nodes_by_id, self.max_depth())
            }
            MergeStrategy::RootReplaceOrInsert => {
                let live = match &self.state {
                    PreviewState::Merged { node, .. } => self.nodes_by_id.get(node),
                    _ => None,
                };
                root_replace_or_insert(data, live, &self.nodes_by_id, self.max_depth())
            }
        }
    }
}

/// A node as a JSON value with every `{"__node": id}` reference that has a
/// live node replaced by that node, recursively up to `max_depth` levels.
///
/// A reference to a node that is already being inlined further up (a page
/// linking to itself, two pages linking to each other) stays a reference.
pub fn materialize(node: &Node, nodes_by_id: &BTreeMap<NodeId, Node>, max_depth: usize) -> Value {
    let mut path = vec![node.id.clone()];
    inline_refs(node.to_value(), nodes_by_id, max_depth, &mut path)
}

fn inline_refs(
    value: Value,
    nodes_by_id: &BTreeMap<NodeId, Node>,
    depth: usize,
    path: &mut Vec<NodeId>,
) -> Value {
    if let Some(node_ref) = NodeRef::from_value(&value)
        && depth > 0
        && !path.contains(&node_ref.node)
        && let Some(live) = nodes_by_id.get(&node_ref.node)
    {
        path.push(node_ref.node);
        let inlined = inline_refs(live.to_value(), nodes_by_id, depth - 1, path);
        path.pop();
        return inlined;
    }
    match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| inline_refs(v, nodes_by_id, depth, path))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, inline_refs(v, nodes_by_id, depth, path)))
                .collect(),
        ),
        other => other,
    }
}

/// Replace every object carrying a `_previewable` id that has a live node
/// with that (materialized) node.
///
/// With no live nodes this returns the input untouched and `is_preview`
/// false, without walking it. `is_preview` is true when at least one
/// object was replaced.
pub fn traverse_and_replace<'a>(
    data: &'a Value,
    nodes_by_id: &BTreeMap<NodeId, Node>,
    max_depth: usize,
) -> Merged<'a> {
    if nodes_by_id.is_empty() {
        return Merged {
            data: Cow::Borrowed(data),
            is_preview: false,
        };
    }
    match replace(data, nodes_by_id, max_depth) {
        Some(replaced) => Merged {
            data: Cow::Owned(replaced),
            is_preview: true,
        },
        None => Merged {
            data: Cow::Borrowed(data),
            is_preview: false,
        },
    }
}

/// New value when anything below `value` was replaced, `None` otherwise.
fn replace(value: &Value, nodes_by_id: &BTreeMap<NodeId, Node>, max_depth: usize) -> Option<Value> {
    match value {
        Value::Object(map) => {
            if let Some(id) = map.get(PREVIEWABLE_KEY).and_then(Value::as_str)
                && let Some(live) = nodes_by_id.get(&NodeId::new(id))
            {
                return Some(materialize(live, nodes_by_id, max_depth));
            }
            let mut changed: Option<Map<String, Value>> = None;
            for (key, child) in map {
                if let Some(new_child) = replace(child, nodes_by_id, max_depth) {
                    changed
                        .get_or_insert_with(|| map.clone())
                        .insert(key.clone(), new_child);
                }
            }
            changed.map(Value::Object)
        }
        Value::Array(items) => {
            let mut changed: Option<Vec<Value>> = None;
            for (index, child) in items.iter().enumerate() {
                if let Some(new_child) = replace(child, nodes_by_id, max_depth) {
                    changed.get_or_insert_with(|| items.clone())[index] = new_child;
                }
            }
            changed.map(Value::Array)
        }
        _ => None,
    }
}

/// Insert (or overwrite) the key `camel_case(type)` with the live node, for
/// pages whose static data has no entry for the document (unpublished
/// documents). Without a live node the data is returned untouched.
pub fn root_replace_or_insert<'a>(
    data: &'a Value,
    live: Option<&Node>,
    nodes_by_id: &BTreeMap<NodeId, Node>,
    max_depth: usize,
) -> Merged<'a> {
    let Some(live) = live else {
        return Merged {
            data: Cow::Borrowed(data),
            is_preview: false,
        };
    };
    let mut root = data.as_object().cloned().unwrap_or_default();
    root.insert(
        camel_case(live.type_name()),
        materialize(live, nodes_by_id, max_depth),
    );
    Merged {
        data: Cow::Owned(Value::Object(root)),
        is_preview: true,
    }
}
