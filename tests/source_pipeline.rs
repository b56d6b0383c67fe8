//! End-to-end sourcing over the fixture project: schemas, snapshot and a
//! local asset mirror.

use prismic_graph::client::SnapshotClient;
use prismic_graph::config::{self, PluginOptions};
use prismic_graph::fetch::{DirectoryFetcher, file_node_id};
use prismic_graph::schema::load_schemas;
use prismic_graph::source::{MemorySink, SourceContext, SourceEvent, source_nodes};
use prismic_graph::typegraph::{TypeDescriptor, TypeGraph};
use prismic_graph::types::{Node, NodeRef};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn options() -> PluginOptions {
    let overlay: toml::Value = toml::from_str(
        r#"
        repository_name = "test-repo"

        [routes]
        page = "/:uid/"
        article = "/blog/:uid/"
        "#,
    )
    .unwrap();
    config::resolve_config(config::stock_defaults_value().unwrap(), Some(overlay)).unwrap()
}

struct Run {
    graph: TypeGraph,
    sink: MemorySink,
    events: Vec<SourceEvent>,
}

fn run(options: &PluginOptions) -> Run {
    let schemas = load_schemas(&fixtures().join("schemas")).unwrap();
    let client = SnapshotClient::from_file(&fixtures().join("documents.json")).unwrap();
    let fetcher = DirectoryFetcher::new(fixtures().join("assets"));
    let (tx, rx) = mpsc::channel();
    let ctx = SourceContext {
        options,
        schemas: &schemas,
        client: &client,
        fetcher: Some(&fetcher),
        hooks: None,
        events: Some(tx),
    };
    let mut sink = MemorySink::default();
    let (graph, _) = source_nodes(&ctx, &mut sink).unwrap();
    drop(ctx);
    Run {
        graph,
        sink,
        events: rx.iter().collect(),
    }
}

fn document<'a>(nodes: &'a [Node], id: &str) -> &'a Node {
    nodes
        .iter()
        .find(|n| n.data.get("prismicId").and_then(|v| v.as_str()) == Some(id))
        .unwrap_or_else(|| panic!("document {id} not sourced"))
}

#[test]
fn every_node_type_is_a_declared_node_type() {
    let run = run(&options());
    for node in &run.sink.nodes {
        match run.graph.get(node.type_name()) {
            Some(TypeDescriptor::Object { node: true, .. }) => {}
            other => panic!("{} has no node type: {other:?}", node.type_name()),
        }
    }
}

#[test]
fn slice_nodes_are_children_of_their_document() {
    let run = run(&options());
    let home = document(&run.sink.nodes, "XyZ1");
    let body = home.data["data"]["body"].as_array().unwrap();
    assert_eq!(body.len(), 2);
    for (entry, child) in body.iter().zip(&home.children) {
        let node_ref = NodeRef::from_value(entry).unwrap();
        assert_eq!(&node_ref.node, child);
        let slice = run.sink.nodes.iter().find(|n| &n.id == child).unwrap();
        assert_eq!(slice.parent.as_ref(), Some(&home.id));
    }
    let gallery = run
        .sink
        .nodes
        .iter()
        .find(|n| n.type_name() == "PrismicPageBodyGallery")
        .unwrap();
    assert_eq!(gallery.data["items"][1]["caption"], "Theirs");
}

#[test]
fn links_resolve_through_routes() {
    let run = run(&options());
    let home = document(&run.sink.nodes, "XyZ1");
    assert_eq!(home.data["url"], "/home/");
    assert_eq!(home.data["data"]["featured"]["url"], "/blog/first-post/");
    assert_eq!(home.data["alternate_languages"][0]["url"], "/accueil/");

    let html = home.data["data"]["body"][0].clone();
    let text_slice = run
        .sink
        .nodes
        .iter()
        .find(|n| Some(&n.id) == NodeRef::from_value(&html).map(|r| r.node).as_ref())
        .unwrap();
    let copy = text_slice.data["primary"]["copy"]["html"].as_str().unwrap();
    assert!(copy.contains(r#"href="/blog/first-post/""#), "{copy}");

    // Broken links inside groups are absent.
    assert!(home.data["data"]["links"][1]["target"].is_null());
}

#[test]
fn images_reference_mirrored_files() {
    let run = run(&options());
    let home = document(&run.sink.nodes, "XyZ1");
    let hero_url = "https://images.prismic.io/repo/hero.png";
    assert_eq!(
        home.data["data"]["hero"]["localFile"],
        NodeRef::new(file_node_id(hero_url)).to_value()
    );
    // Not in the mirror.
    assert!(home.data["data"]["hero"]["mobile"]["localFile"].is_null());
    assert!(run.events.iter().any(|e| matches!(
        e,
        SourceEvent::AssetFetchFailed { url, .. } if url.ends_with("hero-mobile.png")
    )));
}

#[test]
fn localize_off_leaves_local_files_null() {
    let mut options = options();
    options.images.localize = false;
    let run = run(&options);
    let home = document(&run.sink.nodes, "XyZ1");
    assert!(home.data["data"]["hero"]["localFile"].is_null());
    assert!(
        !run
            .events
            .iter()
            .any(|e| matches!(e, SourceEvent::AssetFetchFailed { .. }))
    );
}

#[test]
fn type_prefix_renames_everything() {
    let mut options = options();
    options.type_prefix = "Cms".to_string();
    let run = run(&options);
    assert!(run.sink.nodes.iter().all(|n| n.type_name().starts_with("Cms")));
    assert!(run.graph.types.keys().all(|name| name.starts_with("Cms")));
}

#[test]
fn sourcing_is_reproducible() {
    let a = run(&options());
    let b = run(&options());
    assert_eq!(a.sink.nodes, b.sink.nodes);
    assert_eq!(a.graph, b.graph);
}
