//! DtoM CLI
//!
//! The `dtom` command turns a corpus of species descriptions into an
//! audited NEXUS character matrix.
//!
//! ## Commands
//!
//! - `run`: schema → extraction → audit/correction → NEXUS document + run report
//! - `schema`: propose a character schema for a corpus and save it as JSON
//! - `split`: show how a corpus is segmented into species
//! - `inspect`: summarize an existing NEXUS matrix document
//! - `verify-report`: check a run report against its recorded digest

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn, Level};

use dtom_core::{
    build_schema, into_matrix, parse_matrix_block, read_dimensions, read_run_report,
    serialize_matrix, write_run_report, AbsenceMapping, AuditFailurePolicy, CharacterSchema,
    CorrectionPolicy, MatrixCollaborator, PipelineConfig, PipelineContext, RowStatus, RunReport,
    Segmenter, StateTokenGrammar, DEFAULT_HEADING_PATTERN,
};
use dtom_llm::{LlmConfig, OpenAiCollaborator, DEFAULT_BASE_URL, DEFAULT_MODEL};

#[derive(Parser)]
#[command(name = "dtom")]
#[command(author = "DtoM Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "DtoM: taxonomic descriptions to an audited character matrix", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, audit and write the character matrix for a corpus
    Run {
        /// Corpus file with numbered species headings
        #[arg(short, long)]
        corpus: PathBuf,

        /// Reuse a saved schema instead of proposing one
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Output path for the NEXUS document
        #[arg(short, long, default_value = "matrix.nex")]
        output: PathBuf,

        /// Root directory for run reports
        #[arg(long, default_value = ".dtom/runs")]
        report_dir: PathBuf,

        #[command(flatten)]
        segment: SegmentArgs,

        #[command(flatten)]
        tuning: TuningArgs,

        #[command(flatten)]
        llm: LlmArgs,
    },

    /// Propose a character schema for a corpus
    Schema {
        #[arg(short, long)]
        corpus: PathBuf,

        /// Where to save the schema JSON (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        llm: LlmArgs,
    },

    /// Show the species a corpus splits into
    Split {
        #[arg(short, long)]
        corpus: PathBuf,

        #[command(flatten)]
        segment: SegmentArgs,
    },

    /// Summarize a NEXUS matrix document
    Inspect {
        /// NEXUS document to read
        path: PathBuf,
    },

    /// Verify a run report against its digest
    VerifyReport {
        /// Run ID to verify
        #[arg(long)]
        run: String,

        /// Root directory containing run reports
        #[arg(long, default_value = ".dtom/runs")]
        report_dir: PathBuf,
    },
}

#[derive(Args)]
struct SegmentArgs {
    /// Multi-line regex matching species heading lines
    #[arg(long, default_value = DEFAULT_HEADING_PATTERN)]
    heading_pattern: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum Absence {
    Gap,
    Missing,
}

impl From<Absence> for AbsenceMapping {
    fn from(value: Absence) -> Self {
        match value {
            Absence::Gap => AbsenceMapping::Gap,
            Absence::Missing => AbsenceMapping::Missing,
        }
    }
}

#[derive(Args)]
struct TuningArgs {
    /// Species processed concurrently
    #[arg(long, default_value_t = 2)]
    species_concurrency: usize,

    /// In-flight extraction requests per species
    #[arg(long, default_value_t = 4)]
    extraction_concurrency: usize,

    /// Audit rounds per species before giving up
    #[arg(long, default_value_t = 10)]
    max_rounds: u32,

    /// Clean audits required after the first clean round
    #[arg(long, default_value_t = 2)]
    confirmation_passes: u32,

    /// Count failed audit calls as clean passes
    #[arg(long)]
    fail_open: bool,

    /// Token for extraction replies that name no state
    #[arg(long, value_enum, default_value = "gap")]
    absence: Absence,
}

impl TuningArgs {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            species_concurrency: self.species_concurrency,
            extraction_concurrency: self.extraction_concurrency,
            correction: CorrectionPolicy {
                max_rounds: self.max_rounds,
                confirmation_passes: self.confirmation_passes,
                failure_policy: if self.fail_open {
                    AuditFailurePolicy::FailOpen
                } else {
                    AuditFailurePolicy::FailClosed
                },
            },
            absence: self.absence.into(),
        }
    }
}

#[derive(Args)]
struct LlmArgs {
    /// OpenAI-compatible API base URL
    #[arg(long, env = "DTOM_LLM_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Chat model name
    #[arg(long, env = "DTOM_LLM_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
}

impl LlmArgs {
    fn collaborator(&self) -> Result<Arc<dyn MatrixCollaborator>> {
        let mut config =
            LlmConfig::new(&self.base_url, &self.model).with_timeout(self.timeout_secs);
        if let Some(ref key) = self.api_key {
            config = config.with_api_key(key);
        }
        let collaborator =
            OpenAiCollaborator::new(config).context("Failed to configure chat collaborator")?;
        Ok(Arc::new(collaborator))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    dtom_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            corpus,
            schema,
            output,
            report_dir,
            segment,
            tuning,
            llm,
        } => {
            cmd_run(
                &corpus,
                schema.as_deref(),
                &output,
                &report_dir,
                &segment,
                &tuning,
                &llm,
            )
            .await
        }
        Commands::Schema {
            corpus,
            output,
            llm,
        } => cmd_schema(&corpus, output.as_deref(), &llm).await,
        Commands::Split { corpus, segment } => cmd_split(&corpus, &segment),
        Commands::Inspect { path } => cmd_inspect(&path),
        Commands::VerifyReport { run, report_dir } => cmd_verify_report(&run, &report_dir),
    }
}

fn read_text(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {what}: {:?}", path))
}

fn load_schema(path: &Path) -> Result<CharacterSchema> {
    let text = read_text(path, "schema")?;
    CharacterSchema::from_json_str(&text)
        .with_context(|| format!("Invalid schema file: {:?}", path))
}

/// Full pipeline for one corpus
async fn cmd_run(
    corpus_path: &Path,
    schema_path: Option<&Path>,
    output: &Path,
    report_dir: &Path,
    segment: &SegmentArgs,
    tuning: &TuningArgs,
    llm: &LlmArgs,
) -> Result<()> {
    let corpus = read_text(corpus_path, "corpus")?;
    let species = Segmenter::new(&segment.heading_pattern)?.segment(&corpus);
    if species.is_empty() {
        anyhow::bail!(
            "No species headings matched {:?} in {:?}",
            segment.heading_pattern,
            corpus_path
        );
    }

    let collaborator = llm.collaborator()?;
    let schema = match schema_path {
        Some(path) => load_schema(path)?,
        None => build_schema(collaborator.as_ref(), &corpus)
            .await
            .context("Failed to build character schema")?,
    };
    info!(species = species.len(), characters = schema.len(), "starting run");

    let ctx = PipelineContext::new(schema, collaborator, tuning.pipeline_config())?;
    let outcomes = ctx.run(&species).await;

    let document = serialize_matrix(ctx.schema(), &into_matrix(&outcomes));
    std::fs::write(output, &document.document)
        .with_context(|| format!("Failed to write matrix to {:?}", output))?;

    let report = RunReport::new(
        ctx.schema(),
        &outcomes,
        &document.excluded,
        ctx.metrics().snapshot(),
    );
    let report_path = write_run_report(&report, report_dir)
        .with_context(|| format!("Failed to write run report under {:?}", report_dir))?;

    for species in report.exhausted() {
        warn!(species = %species.species, rounds = species.rounds_used, "row did not converge");
    }

    println!(
        "Matrix written to {:?} ({} species, {} characters)",
        output,
        document.included,
        ctx.schema().len()
    );
    println!("Run report: {:?}", report_path);
    println!("Run ID: {}", report.run_id);
    Ok(())
}

async fn cmd_schema(corpus_path: &Path, output: Option<&Path>, llm: &LlmArgs) -> Result<()> {
    let corpus = read_text(corpus_path, "corpus")?;
    let collaborator = llm.collaborator()?;
    let schema = build_schema(collaborator.as_ref(), &corpus)
        .await
        .context("Failed to build character schema")?;
    let json = schema.to_json_string().context("Failed to encode schema")?;

    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write schema to {:?}", path))?;
            println!("Schema with {} characters written to {:?}", schema.len(), path);
            println!("Digest: {}", schema.digest());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_split(corpus_path: &Path, segment: &SegmentArgs) -> Result<()> {
    let corpus = read_text(corpus_path, "corpus")?;
    let species = Segmenter::new(&segment.heading_pattern)?.segment(&corpus);

    println!("{} species", species.len());
    for (i, s) in species.iter().enumerate() {
        println!("{:>4}  {:<40} {} chars", i + 1, s.name, s.description.len());
    }
    Ok(())
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let text = read_text(path, "matrix document")?;
    let dims = read_dimensions(&text).context("Failed to read DIMENSIONS")?;
    let rows = parse_matrix_block(&text, &StateTokenGrammar::new())
        .context("Failed to read MATRIX block")?;

    println!("NTAX={} NCHAR={}", dims.ntax, dims.nchar);
    if rows.len() != dims.ntax {
        println!("warning: MATRIX has {} rows, header declares {}", rows.len(), dims.ntax);
    }
    for (name, tokens) in &rows {
        let width = if tokens.len() == dims.nchar { "" } else { "  (width mismatch)" };
        let row: Vec<String> = tokens.iter().map(StateTokenGrammar::format).collect();
        println!("{:<40} {}{}", name, row.join(" "), width);
    }
    Ok(())
}

fn cmd_verify_report(run_id: &str, report_dir: &Path) -> Result<()> {
    let report = read_run_report(run_id, report_dir)
        .with_context(|| format!("Failed to verify run report {run_id}"))?;

    let converged = report
        .species
        .iter()
        .filter(|s| s.status == RowStatus::Converged)
        .count();
    println!("Run {} verified (generated {})", report.run_id, report.generated_at);
    println!("Schema digest: {}", report.schema_digest);
    println!(
        "{} species: {} converged, {} exhausted, {} excluded",
        report.species.len(),
        converged,
        report.species.len() - converged,
        report.excluded.len()
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&report.metrics).context("Failed to encode metrics")?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_tuning_flags_build_pipeline_config() {
        let cli = Cli::parse_from([
            "dtom",
            "run",
            "--corpus",
            "c.txt",
            "--max-rounds",
            "3",
            "--fail-open",
            "--absence",
            "missing",
            "--base-url",
            "http://localhost:1/v1",
        ]);
        let Commands::Run { tuning, .. } = cli.command else {
            panic!("expected run");
        };
        let config = tuning.pipeline_config();
        assert_eq!(config.correction.max_rounds, 3);
        assert_eq!(config.correction.failure_policy, AuditFailurePolicy::FailOpen);
        assert_eq!(config.absence, AbsenceMapping::Missing);
        assert_eq!(config.species_concurrency, 2);
    }

    #[test]
    fn test_load_schema_reports_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(
            &path,
            "{\"1\": {\"description\": \"x\", \"states\": {\"1\": \"a\"}}}",
        )
        .unwrap();
        assert!(load_schema(&path).is_err());

        std::fs::write(
            &path,
            "{\"1\": {\"description\": \"x\", \"states\": {\"1\": \"a\", \"2\": \"b\"}}}",
        )
        .unwrap();
        assert_eq!(load_schema(&path).unwrap().len(), 1);
    }
}
