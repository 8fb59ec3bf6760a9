//! ML Platform CLI Module
//!
//! Command-line interface for training, endpoint generation and serving.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::PlatformConfig;
use crate::data::{load_table, CsvDatasetAccessor};
use crate::generator::{publish_endpoint, ArtifactGenerator};
use crate::registry::{MetadataRepository, MetadataStore, ModelId};
use crate::storage::{ArtifactStore, LocalArtifactStore};
use crate::training::{CandidateMetrics, TaskKind, Trainer};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "ml-platform")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train tabular models, pick the best one and serve it as a tracked endpoint")]
#[command(long_about = None)]
pub struct Cli {
    /// Directory for persisted candidate models
    #[arg(long, global = true)]
    pub models_dir: Option<PathBuf>,

    /// Metadata snapshot file
    #[arg(long, global = true)]
    pub metadata: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a model, train every candidate and record the winner
    Train {
        /// Input data file (CSV, TSV, JSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Task type (classification, regression)
        #[arg(long)]
        task: String,

        /// Input columns, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        inputs: Vec<String>,

        /// Output columns, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        outputs: Vec<String>,

        /// Model name (defaults to the data file stem)
        #[arg(long)]
        name: Option<String>,

        /// Seed for the train/test split and the forests
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Generate an endpoint manifest for a trained model
    Generate {
        /// Model identifier
        #[arg(short, long)]
        model_id: ModelId,

        /// Endpoint name
        #[arg(short, long)]
        name: String,

        /// Endpoint description
        #[arg(long)]
        description: Option<String>,
    },

    /// Start the platform server
    Serve {
        /// Server port
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Server host
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },

    /// Host one generated endpoint from its manifest
    ServeEndpoint {
        /// Manifest written by `generate`
        #[arg(short, long)]
        manifest: PathBuf,

        /// Port (defaults to the manifest's port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },

    /// Show a dataset, or the stored models and endpoints
    Info {
        /// Input data file
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
}

impl Cli {
    /// Platform configuration with command-line overrides applied
    pub fn platform_config(&self) -> PlatformConfig {
        let mut config = PlatformConfig::default();
        if let Some(dir) = &self.models_dir {
            config.models_dir = dir.clone();
        }
        if let Some(path) = &self.metadata {
            config.metadata_path = Some(path.clone());
        }
        config
    }
}

fn open_repository(config: &PlatformConfig) -> anyhow::Result<Arc<dyn MetadataRepository>> {
    Ok(match &config.metadata_path {
        Some(path) => Arc::new(MetadataStore::open(path, config.usage_log_capacity)?),
        None => Arc::new(MetadataStore::in_memory(config.usage_log_capacity)),
    })
}

fn format_metrics(metrics: &CandidateMetrics) -> String {
    match metrics {
        CandidateMetrics::Classification(m) => format!(
            "accuracy {:.4}  f1 {:.4}  precision {:.4}  recall {:.4}",
            m.accuracy, m.f1_score, m.precision, m.recall
        ),
        CandidateMetrics::Regression(m) => format!("MSE {:.4}  MAE {:.4}  R2 {:.4}", m.mse, m.mae, m.r2),
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    config: &PlatformConfig,
    data_path: &Path,
    task: &str,
    inputs: &[String],
    outputs: &[String],
    name: Option<&str>,
) -> anyhow::Result<()> {
    section("Train");

    let task: TaskKind = task.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    config.ensure_dirs()?;
    let repository = open_repository(config)?;

    step_run("Loading data");
    let start = Instant::now();
    let df = load_table(data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    let model_name = name.map(str::to_string).unwrap_or_else(|| {
        data_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string())
    });
    let record = repository.create_model(&model_name, None)?;
    step_ok(&format!("Registered model {} ({})", record.id, model_name));

    let datasets = Arc::new(CsvDatasetAccessor::new());
    datasets.register(record.id, data_path);
    let store: Arc<dyn ArtifactStore> = Arc::new(LocalArtifactStore::new(&config.models_dir)?);
    let trainer = Trainer::new(datasets, store, config);

    step_run(&format!("Training {} candidates", task));
    let start = Instant::now();
    let summary = trainer.train(record.id, task, inputs, outputs)?;
    step_done(&format!("in {:?}", start.elapsed()));

    repository.record_training(record.id, &summary)?;

    println!();
    for candidate in &summary.all_results {
        let marker = if candidate.algorithm == summary.best_algorithm { ok("★") } else { dim("·") };
        println!(
            "  {} {:<22} {}",
            marker,
            candidate.algorithm.tag(),
            muted(&format_metrics(&candidate.metrics))
        );
    }
    println!();
    step_ok(&format!("{} ({})", summary.best_algorithm.tag().white().bold(), summary.justification));
    println!("  {:<12} {}", muted("Model id"), record.id);
    println!("  {:<12} {}", muted("Artifact"), summary.best_model_path);
    println!();
    Ok(())
}

pub fn cmd_generate(
    config: &PlatformConfig,
    model_id: ModelId,
    name: &str,
    description: Option<&str>,
) -> anyhow::Result<()> {
    section("Generate");

    config.ensure_dirs()?;
    let repository = open_repository(config)?;
    let generator = ArtifactGenerator::new(Arc::new(LocalArtifactStore::new(&config.generated_dir)?));

    step_run("Writing manifest");
    let endpoint = publish_endpoint(repository.as_ref(), &generator, model_id, name, description)?;
    step_done("");

    println!("  {:<12} {}", muted("Endpoint"), endpoint.id);
    println!("  {:<12} {}", muted("Algorithm"), endpoint.best_algorithm);
    println!("  {:<12} {}", muted("Inputs"), endpoint.input_columns.join(", "));
    println!("  {:<12} {}", muted("Output"), endpoint.output_column);
    if let Some(path) = &endpoint.file_path {
        println!("  {:<12} {}", muted("Manifest"), path);
        println!();
        println!("  {}", dim(&format!("ml-platform serve-endpoint --manifest {}", path)));
    }
    println!();
    Ok(())
}

pub fn cmd_info(config: &PlatformConfig, data_path: Option<&Path>) -> anyhow::Result<()> {
    if let Some(path) = data_path {
        section("Data Info");
        let df = load_table(path)?;

        println!("  {:<12} {}", muted("File"), path.display());
        println!("  {:<12} {}", muted("Rows"), df.height());
        println!("  {:<12} {}", muted("Columns"), df.width());
        println!();

        println!("  {:<20} {:<12} {:>6}", muted("Column"), muted("Type"), muted("Nulls"));
        println!("  {}", dim(&"─".repeat(42)));
        for col in df.get_columns() {
            println!(
                "  {:<20} {:<12} {:>6}",
                col.name().as_str(),
                format!("{:?}", col.dtype()).truecolor(140, 140, 140),
                col.null_count()
            );
        }
        println!();
        return Ok(());
    }

    section("Stored Models");
    let store = LocalArtifactStore::new(&config.models_dir)?;
    let artifacts = store.list_matching("*.bin")?;
    if artifacts.is_empty() {
        println!("  {}", dim("no model artifacts"));
    }
    for artifact in &artifacts {
        let file = Path::new(&artifact.locator)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| artifact.locator.clone());
        println!(
            "  {:<40} {:>10} {}",
            file,
            format!("{:.1} KB", artifact.size_bytes as f64 / 1024.0),
            dim(&artifact.modified.format("%Y-%m-%d %H:%M").to_string())
        );
    }

    let repository = open_repository(config)?;
    let endpoints = repository.list_endpoints(0, usize::MAX)?;
    section("Endpoints");
    if endpoints.is_empty() {
        println!("  {}", dim("no endpoints"));
    }
    for endpoint in &endpoints {
        println!(
            "  {:>4} {:<24} {:<20} {}",
            endpoint.id,
            endpoint.api_name,
            endpoint.best_algorithm,
            muted(&format!(
                "{} requests, avg {:.2} ms",
                endpoint.usage.total_requests, endpoint.usage.average_response_time
            ))
        );
    }
    println!();
    Ok(())
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

fn print_serve_box(title: &str, rows: &[(&str, String)]) {
    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", title.white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    for (key, value) in rows {
        line_box(&kv(key, value));
    }
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();
}

pub async fn cmd_serve(config: PlatformConfig, host: &str, port: u16) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    print_serve_box(
        "ML Platform",
        &[
            ("API    ", format!("http://{}:{}/api", host, port)),
            ("Health ", format!("http://{}:{}/api/health", host, port)),
        ],
    );

    let server = ServerConfig {
        host: host.to_string(),
        port,
        ..Default::default()
    };
    run_server(server, config).await
}

pub async fn cmd_serve_endpoint(manifest: &Path, host: &str, port: Option<u16>) -> anyhow::Result<()> {
    use crate::generator::ServiceManifest;
    use crate::serving::run_endpoint_server;

    let loaded = ServiceManifest::load(manifest)?;
    let port_shown = port.unwrap_or(loaded.default_port);
    print_serve_box(
        &loaded.api_name,
        &[
            ("Predict", format!("http://{}:{}/predict", host, port_shown)),
            ("Info   ", format!("http://{}:{}/info", host, port_shown)),
            ("Health ", format!("http://{}:{}/health", host, port_shown)),
        ],
    );

    run_endpoint_server(manifest, host, port).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_train_command() {
        let cli = Cli::try_parse_from([
            "ml-platform",
            "train",
            "--data",
            "houses.csv",
            "--task",
            "regression",
            "--inputs",
            "x1,x2",
            "--outputs",
            "y",
        ])
        .unwrap();
        match cli.command {
            Commands::Train { inputs, outputs, task, .. } => {
                assert_eq!(inputs, vec!["x1", "x2"]);
                assert_eq!(outputs, vec!["y"]);
                assert_eq!(task, "regression");
            }
            _ => panic!("expected train command"),
        }
    }

    #[test]
    fn test_models_dir_override() {
        let cli = Cli::try_parse_from(["ml-platform", "--models-dir", "/tmp/m", "info"]).unwrap();
        assert_eq!(cli.platform_config().models_dir, PathBuf::from("/tmp/m"));
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1mbold\x1b[0m"), "bold");
    }
}
