//! CMS query collaborator.
//!
//! The HTTP API is not reimplemented here. [`CmsClient`] is the seam: one
//! paginated query and one by-id lookup. [`query_all`] drives the pagination
//! loop, which is sequential because whether another page exists is only known
//! from the previous response.
//!
//! [`SnapshotClient`] serves documents from a saved API response (or a plain
//! JSON array of documents). The CLI and the tests use it; an orchestrator
//! with network access provides its own client.

use crate::config::PluginOptions;
use crate::source::SourceEvent;
use crate::types::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Request failed: {0}")]
    Request(String),
}

/// A query predicate, in the API's `[at(path, value)]` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    At { path: String, value: String },
    Any { path: String, values: Vec<String> },
}

impl Predicate {
    pub fn at(path: &str, value: &str) -> Self {
        Predicate::At {
            path: path.to_string(),
            value: value.to_string(),
        }
    }

    pub fn any(path: &str, values: &[&str]) -> Self {
        Predicate::Any {
            path: path.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn document_type(custom_type: &str) -> Self {
        Self::at("document.type", custom_type)
    }

    /// Query-string form, e.g. `[at(document.type, "page")]`.
    pub fn to_query(&self) -> String {
        match self {
            Predicate::At { path, value } => format!("[at({path}, \"{value}\")]"),
            Predicate::Any { path, values } => {
                let quoted: Vec<String> = values.iter().map(|v| format!("\"{v}\"")).collect();
                format!("[any({path}, [{}])]", quoted.join(", "))
            }
        }
    }

    /// Evaluate against a document, for clients that filter locally.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Predicate::At { path, value } => document_values(doc, path).contains(value),
            Predicate::Any { path, values } => {
                let found = document_values(doc, path);
                values.iter().any(|v| found.contains(v))
            }
        }
    }
}

/// Values at a predicate path: `document.type`, `document.id`,
/// `document.tags`, `my.<type>.uid` or `my.<type>.<field>` for string fields.
fn document_values(doc: &Document, path: &str) -> Vec<String> {
    match path.split('.').collect::<Vec<_>>().as_slice() {
        ["document", "type"] => vec![doc.custom_type.clone()],
        ["document", "id"] => vec![doc.id.clone()],
        ["document", "tags"] => doc.tags.clone(),
        ["my", custom_type, "uid"] if *custom_type == doc.custom_type => {
            doc.uid.iter().cloned().collect()
        }
        ["my", custom_type, field] if *custom_type == doc.custom_type => doc
            .data
            .get(*field)
            .and_then(Value::as_str)
            .map(|s| vec![s.to_string()])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Options of one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Content ref. `None` is the master ref; a preview token shows drafts.
    pub content_ref: Option<String>,
    pub fetch_links: Vec<String>,
    pub lang: String,
    pub page_size: usize,
    pub page: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            content_ref: None,
            fetch_links: Vec::new(),
            lang: "*".to_string(),
            page_size: crate::config::MAX_PAGE_SIZE,
            page: 1,
        }
    }
}

impl QueryOptions {
    pub fn from_options(options: &PluginOptions) -> Self {
        Self {
            content_ref: None,
            fetch_links: options.fetch_links.clone(),
            lang: options.lang.clone(),
            page_size: options.page_size,
            page: 1,
        }
    }

    pub fn with_ref(mut self, content_ref: &str) -> Self {
        self.content_ref = Some(content_ref.to_string());
        self
    }

    fn accepts_lang(&self, doc: &Document) -> bool {
        self.lang == "*" || doc.lang.as_deref() == Some(self.lang.as_str())
    }
}

/// One page of query results, as the API returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPage {
    pub page: usize,
    pub results_per_page: usize,
    pub total_results_size: usize,
    pub total_pages: usize,
    pub results: Vec<Document>,
}

/// Paginated query and single-document lookup against the CMS.
pub trait CmsClient: Sync {
    fn query(&self, predicates: &[Predicate], options: &QueryOptions) -> Result<QueryPage, ClientError>;

    fn get_by_id(&self, id: &str, options: &QueryOptions) -> Result<Document, ClientError>;
}

/// Fetch every page of a query, in page order.
///
/// Keeps requesting `page + 1` while `page * page_size < total_results_size`.
/// An empty page also ends the loop, so a miscounting server cannot keep it
/// spinning. A response for a different page than the one requested is an
/// error.
pub fn query_all(
    client: &dyn CmsClient,
    predicates: &[Predicate],
    options: &QueryOptions,
    events: Option<&Sender<SourceEvent>>,
) -> Result<Vec<Document>, ClientError> {
    let mut documents = Vec::new();
    let mut page_options = options.clone();
    page_options.page = 1;
    loop {
        let page = client.query(predicates, &page_options)?;
        if page.page != page_options.page {
            return Err(ClientError::Request(format!(
                "requested page {} but got page {}",
                page_options.page, page.page
            )));
        }
        let received = page.results.len();
        documents.extend(page.results);
        if let Some(tx) = events {
            let _ = tx.send(SourceEvent::PageFetched {
                page: page.page,
                total_pages: page.total_pages,
                documents: received,
            });
        }
        if received == 0 || page_options.page * page_options.page_size >= page.total_results_size {
            break;
        }
        page_options.page += 1;
    }
    Ok(documents)
}

/// Saved API response: either `{"results": [...]}` or a bare array, with
/// optional draft documents per preview ref.
#[derive(Debug, Clone, Default, Deserialize)]
struct Snapshot {
    #[serde(default)]
    results: Vec<Document>,
    #[serde(default)]
    previews: BTreeMap<String, Vec<Document>>,
}

/// [`CmsClient`] answering from documents held in memory.
#[derive(Debug, Clone, Default)]
pub struct SnapshotClient {
    documents: Vec<Document>,
    previews: BTreeMap<String, Vec<Document>>,
}

impl SnapshotClient {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            previews: BTreeMap::new(),
        }
    }

    /// Draft documents visible under a preview ref. They replace published
    /// documents with the same id.
    pub fn with_preview(mut self, content_ref: &str, documents: Vec<Document>) -> Self {
        self.previews.insert(content_ref.to_string(), documents);
        self
    }

    pub fn from_value(value: Value) -> Result<Self, ClientError> {
        let snapshot: Snapshot = match value {
            Value::Array(_) => Snapshot {
                results: serde_json::from_value(value)?,
                ..Snapshot::default()
            },
            other => serde_json::from_value(other)?,
        };
        Ok(Self {
            documents: snapshot.results,
            previews: snapshot.previews,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ClientError> {
        let content = fs::read_to_string(path)?;
        Self::from_value(serde_json::from_str(&content)?)
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Documents visible under a ref: published ones, overridden by drafts.
    fn visible(&self, content_ref: Option<&str>) -> Vec<&Document> {
        let drafts = content_ref
            .and_then(|r| self.previews.get(r))
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let mut visible: Vec<&Document> = self
            .documents
            .iter()
            .filter(|doc| !drafts.iter().any(|d| d.id == doc.id))
            .collect();
        visible.extend(drafts);
        visible
    }
}

impl CmsClient for SnapshotClient {
    fn query(&self, predicates: &[Predicate], options: &QueryOptions) -> Result<QueryPage, ClientError> {
        if options.page_size == 0 || options.page == 0 {
            return Err(ClientError::Request(
                "page and page_size must be at least 1".into(),
            ));
        }
        let matching: Vec<&Document> = self
            .visible(options.content_ref.as_deref())
            .into_iter()
            .filter(|doc| options.accepts_lang(doc))
            .filter(|doc| predicates.iter().all(|p| p.matches(doc)))
            .collect();
        let total = matching.len();
        let results = matching
            .into_iter()
            .skip((options.page - 1) * options.page_size)
            .take(options.page_size)
            .cloned()
            .collect();
        Ok(QueryPage {
            page: options.page,
            results_per_page: options.page_size,
            total_results_size: total,
            total_pages: total.div_ceil(options.page_size),
            results,
        })
    }

    fn get_by_id(&self, id: &str, options: &QueryOptions) -> Result<Document, ClientError> {
        self.visible(options.content_ref.as_deref())
            .into_iter()
            .find(|doc| doc.id == id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(id.to_string()))
    }
}
