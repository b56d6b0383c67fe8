//! Preview sessions against the fixture snapshot: live nodes must line up
//! with the statically sourced ones so the merge can swap them by id.

use prismic_graph::client::SnapshotClient;
use prismic_graph::config::PluginOptions;
use prismic_graph::preview::{MergeStrategy, PREVIEW_COOKIE, PreviewSession, PreviewState};
use prismic_graph::schema::SchemaSet;
use prismic_graph::source::{MemorySink, SourceContext, compile_types, source_nodes};
use prismic_graph::types::{Document, Node};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::Path;

const TOKEN: &str = "https://test-repo.prismic.io/previews/session-1";

fn options() -> PluginOptions {
    let mut routes = BTreeMap::new();
    routes.insert("page".to_string(), "/:uid/".to_string());
    routes.insert("article".to_string(), "/blog/:uid/".to_string());
    PluginOptions {
        repository_name: "test-repo".to_string(),
        routes,
        ..PluginOptions::default()
    }
}

fn published() -> Vec<Document> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/documents.json");
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn draft_of_home() -> Document {
    let mut home = published().into_iter().find(|d| d.id == "XyZ1").unwrap();
    home.data.insert(
        "title".to_string(),
        json!([{"type": "heading1", "text": "Draft home", "spans": []}]),
    );
    home
}

fn unpublished_article() -> Document {
    serde_json::from_value(json!({
        "id": "Art9",
        "uid": "coming-soon",
        "type": "article",
        "lang": "en-us",
        "data": {"title": [{"type": "heading1", "text": "Soon", "spans": []}]}
    }))
    .unwrap()
}

fn client() -> SnapshotClient {
    SnapshotClient::new(published()).with_preview(TOKEN, vec![draft_of_home(), unpublished_article()])
}

fn static_nodes(client: &SnapshotClient) -> Vec<Node> {
    let options = options();
    let schemas = SchemaSet::new();
    let ctx = SourceContext {
        options: &options,
        schemas: &schemas,
        client,
        fetcher: None,
        hooks: None,
        events: None,
    };
    let mut sink = MemorySink::default();
    source_nodes(&ctx, &mut sink).unwrap();
    sink.nodes
}

fn no_cookies() -> BTreeMap<String, String> {
    BTreeMap::new()
}

fn preview_url(document_id: &str) -> String {
    let mut url = url::Url::parse("https://site.test/preview").unwrap();
    url.query_pairs_mut()
        .append_pair("token", TOKEN)
        .append_pair("documentId", document_id);
    url.to_string()
}

#[test]
fn live_nodes_share_ids_with_static_nodes() {
    let client = client();
    let statics = static_nodes(&client);
    let mut session = PreviewSession::for_options(options());
    session.run_url(&preview_url("XyZ1"), &no_cookies(), &client);

    let home = statics
        .iter()
        .find(|n| n.data.get("uid").and_then(Value::as_str) == Some("home"))
        .unwrap();
    let live = &session.nodes_by_id()[&home.id];
    assert_eq!(live.type_name(), home.type_name());
    assert_eq!(live.children, home.children);
}

#[test]
fn page_query_data_shows_the_draft() {
    let client = client();
    let statics = static_nodes(&client);
    let home = statics
        .iter()
        .find(|n| n.data.get("uid").and_then(Value::as_str) == Some("home"))
        .unwrap();
    let page_data = json!({"prismicPage": home.to_value()});

    let mut session = PreviewSession::for_options(options());
    let state = session
        .run_url(&preview_url("XyZ1"), &no_cookies(), &client)
        .clone();
    assert!(matches!(state, PreviewState::Merged { ref path, .. } if path == "/home/"));

    let merged = session.merge(&page_data, MergeStrategy::TraverseAndReplace);
    assert!(merged.is_preview);
    assert_eq!(merged.data["prismicPage"]["data"]["title"]["text"], "Draft home");
    // Slice references are inlined from the live nodes.
    assert_eq!(
        merged.data["prismicPage"]["data"]["body"][1]["primary"]["heading"],
        "Partners"
    );
}

#[test]
fn unpublished_document_is_inserted_at_root() {
    let client = client();
    let mut session = PreviewSession::for_options(options());
    let mut store = BTreeMap::new();
    store.insert(PREVIEW_COOKIE.to_string(), TOKEN.to_string());
    session.run_url("https://site.test/preview?documentId=Art9", &store, &client);

    let page_data = json!({"site": {"title": "Blog"}});
    let merged = session.merge(&page_data, MergeStrategy::RootReplaceOrInsert);
    assert!(merged.is_preview);
    assert_eq!(merged.data["prismicArticle"]["uid"], "coming-soon");
    assert_eq!(merged.data["prismicArticle"]["url"], "/blog/coming-soon/");
    assert_eq!(merged.data["site"]["title"], "Blog");
}

#[test]
fn compiled_type_paths_guide_preview_classification() {
    let client = client();
    let options = options();
    let schemas = SchemaSet::new();
    let ctx = SourceContext {
        options: &options,
        schemas: &schemas,
        client: &client,
        fetcher: None,
        hooks: None,
        events: None,
    };
    let type_paths = compile_types(&ctx).type_paths;
    let mut session = PreviewSession::for_options(options.clone()).with_type_paths(type_paths);
    session.run_url(&preview_url("XyZ1"), &no_cookies(), &client);
    let snapshot = session.snapshot();
    assert!(snapshot.is_preview);
    assert_eq!(snapshot.path.as_deref(), Some("/home/"));
}
