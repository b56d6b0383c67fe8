use clap::{Parser, Subcommand};
use prismic_graph::client::SnapshotClient;
use prismic_graph::fetch::DirectoryFetcher;
use prismic_graph::preview::{MergeStrategy, PreviewSession};
use prismic_graph::schema::load_schemas;
use prismic_graph::source::{MemorySink, SourceContext, SourceEvent, compile_types, source_nodes};
use prismic_graph::typegraph::to_sdl;
use prismic_graph::{config, output};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

#[derive(Parser)]
#[command(name = "prismic-graph")]
#[command(about = "Prismic content to a typed content graph")]
#[command(long_about = "\
Prismic content to a typed content graph

Reads plugin options from config.toml, custom type schemas from the schemas
directory, and documents from a query snapshot (the JSON the CMS API returns).

Project structure:

  project/
  ├── config.toml              # repository_name, routes, type_prefix, ...
  ├── schemas/                 # One <custom_type>.json per custom type
  │   ├── page.json
  │   └── article.json
  └── assets/                  # Local image mirror, keyed by file name

A snapshot is either a JSON array of documents or {\"results\": [...],
\"previews\": {\"<token>\": [...]}}.

Run 'prismic-graph gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml; schemas and assets resolve against it
    #[arg(long, default_value = ".", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Source every document in a snapshot; write nodes, types and SDL
    Source {
        /// Query snapshot to read documents from
        #[arg(long)]
        documents: PathBuf,
        /// Directory for nodes.json, types.json and schema.graphql
        #[arg(long, default_value = "dist")]
        out: PathBuf,
    },
    /// Compile the custom type schemas and print them as GraphQL SDL
    Types {
        /// Print the type list instead of SDL
        #[arg(long)]
        list: bool,
    },
    /// Run a preview request against a snapshot and print the merged page data
    Preview {
        /// Query snapshot; drafts live under `previews.<token>`
        #[arg(long)]
        documents: PathBuf,
        /// Preview URL carrying `token` and `documentId`
        #[arg(long)]
        url: String,
        /// Static page data to merge the live nodes into
        #[arg(long = "static")]
        static_data: Option<PathBuf>,
        /// traverseAndReplace or rootReplaceOrInsert
        #[arg(long, default_value = "traverseAndReplace")]
        strategy: MergeStrategy,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Source { documents, out } => {
            let options = config::load_config(&cli.config)?;
            init_thread_pool(&options.processing);
            let schemas = load_schemas(&cli.config.join(&options.schemas_dir))?;
            let client = SnapshotClient::from_file(&documents)?;
            let fetcher = DirectoryFetcher::new(cli.config.join(&options.images.assets_dir));

            let (tx, printer) = spawn_printer();
            let ctx = SourceContext {
                options: &options,
                schemas: &schemas,
                client: &client,
                fetcher: Some(&fetcher),
                hooks: None,
                events: Some(tx),
            };
            let mut sink = MemorySink::default();
            let result = source_nodes(&ctx, &mut sink);
            drop(ctx);
            join_printer(printer);
            let (graph, summary) = result?;

            std::fs::create_dir_all(&out)?;
            std::fs::write(out.join("nodes.json"), serde_json::to_string_pretty(&sink.nodes)?)?;
            std::fs::write(out.join("types.json"), serde_json::to_string_pretty(&sink.types)?)?;
            std::fs::write(out.join("schema.graphql"), graph.to_sdl())?;
            output::print_source_summary(&summary);
            println!("==> Wrote {}", out.display());
        }
        Command::Types { list } => {
            let options = config::load_config(&cli.config)?;
            let schemas = load_schemas(&cli.config.join(&options.schemas_dir))?;
            let client = SnapshotClient::default();
            let ctx = SourceContext {
                options: &options,
                schemas: &schemas,
                client: &client,
                fetcher: None,
                hooks: None,
                events: None,
            };
            let graph = compile_types(&ctx);
            if list {
                output::print_type_graph(&graph);
            } else {
                print!("{}", to_sdl(graph.types.values()));
            }
        }
        Command::Preview {
            documents,
            url,
            static_data,
            strategy,
        } => {
            let options = config::load_config(&cli.config)?;
            let schemas = load_schemas(&cli.config.join(&options.schemas_dir))?;
            let client = SnapshotClient::from_file(&documents)?;
            let type_paths = {
                let ctx = SourceContext {
                    options: &options,
                    schemas: &schemas,
                    client: &client,
                    fetcher: None,
                    hooks: None,
                    events: None,
                };
                compile_types(&ctx).type_paths
            };

            let (tx, printer) = spawn_printer();
            let mut session = PreviewSession::for_options(options)
                .with_type_paths(type_paths)
                .with_events(tx);
            // No cookies outside a browser.
            let store: BTreeMap<String, String> = BTreeMap::new();
            session.run_url(&url, &store, &client);
            let snapshot_view = session.snapshot();
            let status = output::format_preview(session.state(), &snapshot_view);
            let page_data = match &static_data {
                Some(path) => Some(read_json(path)?),
                None => None,
            };
            let merged = page_data
                .as_ref()
                .map(|d| session.merge(d, strategy).data.into_owned());
            drop(session);
            join_printer(printer);

            for line in status {
                println!("{}", line);
            }
            match merged {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => {
                    if let Some(node) = snapshot_view.node {
                        println!("{}", serde_json::to_string_pretty(&node)?);
                    }
                }
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Start a thread printing every event as it arrives.
fn spawn_printer() -> (Sender<SourceEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_source_event(&event) {
                println!("{}", line);
            }
        }
    });
    (tx, printer)
}

/// Wait for the printer to drain. Every sender must be dropped first.
fn join_printer(printer: JoinHandle<()>) {
    if printer.join().is_err() {
        eprintln!("event printer panicked");
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
