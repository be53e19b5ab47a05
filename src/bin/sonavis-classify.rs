//! Classify one audio file or raw PCM chunk against a model catalog.

use std::path::PathBuf;
use std::sync::Arc;

use sonavis::catalog::ModelCatalog;
use sonavis::logging;
use sonavis::model::registry::ModelRegistry;
use sonavis::pipeline::{ChunkRequest, FileRequest, Pipeline};
use sonavis::sink::{DiscardSink, RecognitionSink, SqliteRecognitionSink};
use sonavis::taxonomy::{SqliteTaxonomy, StaticTaxonomy, TaxonomyLookup};

// Fallback category ids used when the catalog configures no taxonomy
// database; matches the seed rows of the deployed schema.
const DEFAULT_TAXONOMY: [(&str, i64); 3] = [("drone", 1), ("airplane", 2), ("helicopter", 3)];

fn main() {
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

#[derive(Debug)]
struct CliOptions {
    catalog_path: PathBuf,
    model_id: String,
    user_id: i64,
    chunk: bool,
    input: PathBuf,
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    let catalog =
        ModelCatalog::load(&options.catalog_path).map_err(|err| err.to_string())?;
    let registry = Arc::new(ModelRegistry::new(&catalog));

    let (taxonomy, sink): (Arc<dyn TaxonomyLookup>, Arc<dyn RecognitionSink>) =
        match catalog.taxonomy_db() {
            Some(db) => (
                Arc::new(SqliteTaxonomy::open(db).map_err(|err| err.to_string())?),
                Arc::new(SqliteRecognitionSink::open(db).map_err(|err| err.to_string())?),
            ),
            None => (
                Arc::new(StaticTaxonomy::from_entries(DEFAULT_TAXONOMY)),
                Arc::new(DiscardSink),
            ),
        };
    let pipeline = Pipeline::new(registry, taxonomy, sink);

    let bytes = std::fs::read(&options.input)
        .map_err(|err| format!("Failed to read {}: {err}", options.input.display()))?;

    let report = if options.chunk {
        pipeline.classify_chunk(ChunkRequest {
            pcm: &bytes,
            model_id: &options.model_id,
            user_id: options.user_id,
        })
    } else {
        let extension = options
            .input
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");
        pipeline.classify_file(FileRequest {
            bytes: &bytes,
            extension,
            model_id: &options.model_id,
            user_id: options.user_id,
        })
    }
    .map_err(|err| format!("[{}] {err}", err.code()))?;

    let json = serde_json::to_string_pretty(&report).map_err(|err| err.to_string())?;
    println!("{json}");
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut catalog_path = None;
    let mut model_id = None;
    let mut user_id = 0_i64;
    let mut chunk = false;
    let mut input = None;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--catalog" => {
                catalog_path = Some(PathBuf::from(
                    iter.next().ok_or("--catalog requires a path")?,
                ));
            }
            "--model" => {
                model_id = Some(iter.next().ok_or("--model requires an id")?);
            }
            "--user" => {
                user_id = iter
                    .next()
                    .ok_or("--user requires an id")?
                    .parse()
                    .map_err(|err| format!("--user must be an integer: {err}"))?;
            }
            "--chunk" => chunk = true,
            "--help" | "-h" => return Err(usage()),
            other if other.starts_with("--") => {
                return Err(format!("Unknown flag {other}\n{}", usage()));
            }
            other => {
                if input.replace(PathBuf::from(other)).is_some() {
                    return Err(format!("Multiple inputs given\n{}", usage()));
                }
            }
        }
    }

    Ok(CliOptions {
        catalog_path: catalog_path.ok_or_else(usage)?,
        model_id: model_id.ok_or_else(usage)?,
        user_id,
        chunk,
        input: input.ok_or_else(usage)?,
    })
}

fn usage() -> String {
    "Usage: sonavis-classify --catalog <catalog.toml> --model <id> [--user <id>] [--chunk] <input>"
        .to_string()
}
