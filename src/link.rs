//! Link resolution: turning document references into site routes.
//!
//! The CMS stores links to other documents as `{link_type: "Document", id,
//! type, uid, lang, isBroken}`. Only the consuming site knows which route a
//! document lives at, so every place that needs a URL for a document (link
//! fields, hyperlink spans in rich text, the document's own `url`, the
//! preview redirect) asks a [`LinkResolver`].
//!
//! [`RouteResolver`] is the config-driven implementation: one route pattern
//! per custom type, with `:uid`, `:id`, `:lang` and `:type` placeholders.
//!
//! ```toml
//! [routes]
//! page = "/:uid/"
//! blog_post = "/:lang/blog/:uid/"
//! ```

use crate::types::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The `link_type` discriminant of a link value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Document,
    Media,
    Web,
    /// `Any` (an empty link field) or anything unrecognized.
    Other,
}

impl LinkType {
    pub fn of(value: &Value) -> Self {
        match value.get("link_type").and_then(Value::as_str) {
            Some("Document") => LinkType::Document,
            Some("Media") => LinkType::Media,
            Some("Web") => LinkType::Web,
            _ => LinkType::Other,
        }
    }
}

/// What a link resolver sees of a linked document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLink {
    pub id: String,
    #[serde(rename = "type")]
    pub custom_type: String,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "isBroken", default)]
    pub is_broken: bool,
}

impl DocumentLink {
    /// Read a document reference. Returns `None` when `id` or `type` is
    /// missing or empty, or when the reference is flagged broken.
    pub fn from_value(value: &Value) -> Option<Self> {
        let link: DocumentLink = serde_json::from_value(value.clone()).ok()?;
        if link.id.is_empty() || link.custom_type.is_empty() || link.is_broken {
            return None;
        }
        Some(link)
    }

    pub fn from_document(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            custom_type: doc.custom_type.clone(),
            uid: doc.uid.clone(),
            lang: doc.lang.clone(),
            tags: doc.tags.clone(),
            is_broken: false,
        }
    }
}

/// Maps a document reference to a route within the consuming site.
pub trait LinkResolver: Send + Sync {
    fn resolve(&self, link: &DocumentLink) -> Option<String>;
}

impl<F> LinkResolver for F
where
    F: Fn(&DocumentLink) -> Option<String> + Send + Sync,
{
    fn resolve(&self, link: &DocumentLink) -> Option<String> {
        self(link)
    }
}

/// Resolver driven by one route pattern per custom type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteResolver {
    routes: BTreeMap<String, String>,
}

impl RouteResolver {
    pub fn new(routes: BTreeMap<String, String>) -> Self {
        Self { routes }
    }
}

impl LinkResolver for RouteResolver {
    fn resolve(&self, link: &DocumentLink) -> Option<String> {
        let pattern = self.routes.get(&link.custom_type)?;
        expand_route(pattern, link)
    }
}

/// Placeholders a route pattern may use.
pub const ROUTE_PLACEHOLDERS: [&str; 4] = ["uid", "id", "lang", "type"];

/// Names of the placeholders used in a pattern, in order of appearance.
pub fn route_placeholders(pattern: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = pattern;
    while let Some(pos) = rest.find(':') {
        let tail = &rest[pos + 1..];
        let len = tail
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(tail.len());
        names.push(tail[..len].to_string());
        rest = &tail[len..];
    }
    names
}

/// Substitute placeholders in a route pattern.
///
/// Returns `None` when a placeholder has no value for this document (e.g.
/// `:uid` on a document without a uid) or is not a known placeholder.
pub fn expand_route(pattern: &str, link: &DocumentLink) -> Option<String> {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(pos) = rest.find(':') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        let len = tail
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(tail.len());
        let value = match &tail[..len] {
            "uid" => link.uid.as_deref()?,
            "id" => link.id.as_str(),
            "lang" => link.lang.as_deref()?,
            "type" => link.custom_type.as_str(),
            _ => return None,
        };
        out.push_str(value);
        rest = &tail[len..];
    }
    out.push_str(rest);
    Some(out)
}

/// URL of any link value: resolved for documents, stored for media and web links.
pub fn link_url(value: &Value, resolver: &dyn LinkResolver) -> Option<String> {
    match LinkType::of(value) {
        LinkType::Document => DocumentLink::from_value(value).and_then(|l| resolver.resolve(&l)),
        LinkType::Media | LinkType::Web => value
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string),
        LinkType::Other => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn routes() -> RouteResolver {
        let mut map = BTreeMap::new();
        map.insert("page".to_string(), "/:uid/".to_string());
        map.insert("post".to_string(), "/:lang/blog/:uid/".to_string());
        map.insert("legal".to_string(), "/legal/:id".to_string());
        RouteResolver::new(map)
    }

    fn link(custom_type: &str, uid: Option<&str>) -> DocumentLink {
        DocumentLink {
            id: "XyZ".to_string(),
            custom_type: custom_type.to_string(),
            uid: uid.map(str::to_string),
            lang: Some("en-us".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn expands_uid_route() {
        assert_eq!(
            routes().resolve(&link("page", Some("about"))),
            Some("/about/".to_string())
        );
    }

    #[test]
    fn expands_multiple_placeholders() {
        assert_eq!(
            routes().resolve(&link("post", Some("hello"))),
            Some("/en-us/blog/hello/".to_string())
        );
        assert_eq!(
            routes().resolve(&link("legal", None)),
            Some("/legal/XyZ".to_string())
        );
    }

    #[test]
    fn missing_uid_has_no_route() {
        assert_eq!(routes().resolve(&link("page", None)), None);
    }

    #[test]
    fn unknown_type_has_no_route() {
        assert_eq!(routes().resolve(&link("author", Some("x"))), None);
    }

    #[test]
    fn unknown_placeholder_has_no_route() {
        assert_eq!(expand_route("/:slug/", &link("page", Some("x"))), None);
    }

    #[test]
    fn placeholders_listed_in_order() {
        assert_eq!(route_placeholders("/:lang/blog/:uid/"), vec!["lang", "uid"]);
        assert!(route_placeholders("/static/").is_empty());
    }

    #[test]
    fn document_link_requires_id_and_type() {
        assert!(DocumentLink::from_value(&json!({"link_type": "Document", "id": "a"})).is_none());
        assert!(DocumentLink::from_value(&json!({"link_type": "Document", "type": "page"})).is_none());
        assert!(
            DocumentLink::from_value(&json!({"link_type": "Document", "id": "", "type": "page"}))
                .is_none()
        );
    }

    #[test]
    fn broken_document_link_is_rejected() {
        let value = json!({"link_type": "Document", "id": "a", "type": "page", "isBroken": true});
        assert!(DocumentLink::from_value(&value).is_none());
    }

    #[test]
    fn closure_resolver() {
        let resolver = |l: &DocumentLink| Some(format!("/{}/", l.id));
        let value = json!({"link_type": "Document", "id": "abc", "type": "page"});
        assert_eq!(link_url(&value, &resolver), Some("/abc/".to_string()));
    }

    #[test]
    fn web_and_media_links_keep_their_url() {
        let resolver = routes();
        let web = json!({"link_type": "Web", "url": "https://example.com"});
        let media = json!({"link_type": "Media", "url": "https://cdn/x.pdf", "name": "x.pdf"});
        assert_eq!(
            link_url(&web, &resolver),
            Some("https://example.com".to_string())
        );
        assert_eq!(link_url(&media, &resolver), Some("https://cdn/x.pdf".to_string()));
        assert_eq!(link_url(&json!({"link_type": "Any"}), &resolver), None);
    }
}
