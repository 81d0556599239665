use clap::{Parser, Subcommand};
use docmatch::capped::{CappedStore, MemoryStore, cleanup_all};
use docmatch::config::EngineConfig;
use docmatch::query::{UpdateOptions, apply_update_with_options, matches, parse_update};
use docmatch::utils::json::{document_to_json, parse_json_to_bson_document};
use docmatch::{DbError, logger};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docmatch", version, about = "Evaluate MongoDB filters and updates against JSON documents", long_about = None)]
struct Cli {
    #[arg(long, help = "Path to a config file (TOML). Falls back to DOCMATCH_CONFIG, then docmatch.toml.")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(name = "match", about = "Print whether a document matches a filter")]
    Match {
        #[arg(long, help = "Filter as (extended) JSON, e.g. '{\"a\": {\"$gt\": 1}}'")]
        filter: String,
        #[arg(long, help = "Document as (extended) JSON")]
        doc: String,
    },
    #[command(name = "update", about = "Apply an update and print the result with the touched paths")]
    Update {
        #[arg(long, help = "Update as (extended) JSON: operators or a replacement document")]
        update: String,
        #[arg(long, help = "Document as (extended) JSON")]
        doc: String,
        #[arg(long, help = "Treat the update as the insert half of an upsert ($setOnInsert applies)")]
        upsert: bool,
    },
    #[command(name = "features", about = "Print the compiled feature list")]
    Features,
    #[command(name = "cleanup-sim", about = "Fill an in-memory capped collection and run one cleanup pass")]
    CleanupSim {
        #[arg(long, default_value_t = 100, help = "Documents to insert")]
        docs: u32,
        #[arg(long, default_value_t = 50, help = "Document cap of the collection")]
        max_docs: u64,
        #[arg(long, default_value_t = 1 << 20, help = "Size cap of the collection in bytes")]
        max_size: u64,
    },
}

fn run(command: Commands, cfg: &EngineConfig) -> Result<String, DbError> {
    match command {
        Commands::Match { filter, doc } => {
            let filter = parse_json_to_bson_document(&filter)?;
            let doc = parse_json_to_bson_document(&doc)?;
            Ok(matches(&doc, &filter)?.to_string())
        }
        Commands::Update { update, doc, upsert } => {
            let spec = parse_update(&parse_json_to_bson_document(&update)?)?;
            let mut doc = parse_json_to_bson_document(&doc)?;
            let out = apply_update_with_options(&mut doc, &spec, UpdateOptions { is_insert: upsert })?;
            let touched = out.touched.iter().cloned().collect::<Vec<_>>().join(",");
            Ok(format!("{}\ntouched: {}", document_to_json(&doc)?, touched))
        }
        Commands::Features => Ok(serde_json::to_string_pretty(&docmatch::build_info())?),
        Commands::CleanupSim { docs, max_docs, max_size } => {
            let store = MemoryStore::new();
            store.create_capped("sim", max_size, Some(max_docs));
            for n in 0..docs {
                store.insert("sim", bson::doc! {"n": i64::from(n)})?;
            }
            let before = store.stats("sim")?;
            let stats = cleanup_all(&store, &cfg.capped)?;
            let after = store.stats("sim")?;
            let deleted: u64 = stats.iter().map(|s| s.deleted).sum();
            Ok(format!(
                "percentage: {}\ncount: {} -> {}\ndeleted: {}\nbytes: {} -> {}",
                cfg.capped.percentage(),
                before.count,
                after.count,
                deleted,
                before.size_bytes,
                after.size_bytes
            ))
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let cfg = match EngineConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };
    if cfg.logging.dir.is_some() {
        if let Err(e) = logger::configure_from_config(&cfg.logging) {
            eprintln!("warning: logging disabled: {e}");
        }
    }
    match run(cli.command, &cfg) {
        Ok(out) => println!("{out}"),
        Err(e) => {
            let reply = document_to_json(&e.to_document()).unwrap_or_else(|_| e.to_string());
            println!("{reply}");
            std::process::exit(1);
        }
    }
}
