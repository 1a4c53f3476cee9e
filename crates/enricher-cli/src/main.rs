use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use enricher_client::{BrowserExtractor, BrowserExtractorConfig, TabularFiles};
use enricher_core::job::new_job_id;
use enricher_core::models::{ColumnMap, InputTable};
use enricher_core::pacing::DelayRange;
use enricher_core::scheduler::Submission;
use enricher_core::traits::TableReader;
use enricher_core::{
    BatchScheduler, CatalogSource, JobRegistry, OutputConfig, OutputStage, PacingConfig,
    SchedulerConfig, TableFormat, TracingSchedulerReporter,
};

#[derive(Parser)]
#[command(name = "enricher", version, about = "Enrich item lists with product catalog data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up every row of a CSV/XLSX file and write the enriched result file
    Run {
        /// Input file with an "Item Name" column (.csv or .xlsx)
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for the result file
        #[arg(short, long, env = "ENRICHER_OUTPUT_DIR", default_value = "output_files")]
        output_dir: PathBuf,

        /// Catalog home page
        #[arg(long, env = "ENRICHER_CATALOG_URL", default_value = "https://www.amazon.in")]
        catalog_url: String,

        #[command(flatten)]
        pacing: PacingArgs,
    },

    /// Show how a file's columns would be read, without contacting the catalog
    Inspect {
        /// Input file (.csv or .xlsx)
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Args)]
struct PacingArgs {
    /// Rows processed before the longer inter-batch pause
    #[arg(long, env = "ENRICHER_BATCH_SIZE", default_value_t = 5)]
    batch_size: usize,

    /// Retries after a failed lookup
    #[arg(long, env = "ENRICHER_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-attempt lookup timeout in seconds
    #[arg(long, env = "ENRICHER_EXTRACTION_TIMEOUT_SECS", default_value_t = 60)]
    timeout_secs: u64,

    #[arg(long, env = "ENRICHER_ITEM_DELAY_MIN_SECS", default_value_t = 10)]
    item_delay_min: u64,

    #[arg(long, env = "ENRICHER_ITEM_DELAY_MAX_SECS", default_value_t = 20)]
    item_delay_max: u64,

    #[arg(long, env = "ENRICHER_BATCH_DELAY_MIN_SECS", default_value_t = 30)]
    batch_delay_min: u64,

    #[arg(long, env = "ENRICHER_BATCH_DELAY_MAX_SECS", default_value_t = 60)]
    batch_delay_max: u64,

    /// Backoff unit; retry n waits n times this many seconds
    #[arg(long, env = "ENRICHER_RETRY_BASE_DELAY_SECS", default_value_t = 5)]
    retry_base_delay: u64,
}

impl PacingArgs {
    fn scheduler_config(&self) -> Result<SchedulerConfig> {
        let secs = Duration::from_secs;
        let pacing = PacingConfig {
            item_delay: DelayRange::new(secs(self.item_delay_min), secs(self.item_delay_max))?,
            batch_delay: DelayRange::new(secs(self.batch_delay_min), secs(self.batch_delay_max))?,
            retry_base_delay: secs(self.retry_base_delay),
        };
        let config = SchedulerConfig::default()
            .with_batch_size(self.batch_size)
            .with_max_retries(self.max_retries)
            .with_extraction_timeout(secs(self.timeout_secs))
            .with_pacing(pacing);
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("enricher=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            output_dir,
            catalog_url,
            pacing,
        } => {
            cmd_run(&input, output_dir, catalog_url, &pacing).await?;
        }
        Commands::Inspect { input } => {
            cmd_inspect(&input).await?;
        }
    }

    Ok(())
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .with_context(|| format!("Not a file path: {}", path.display()))
}

async fn cmd_run(
    input: &Path,
    output_dir: PathBuf,
    catalog_url: String,
    pacing: &PacingArgs,
) -> Result<()> {
    let file_name = file_name_of(input)?;
    let format = TableFormat::from_file_name(&file_name)?;
    let config = pacing.scheduler_config()?;

    let mut output_config = OutputConfig::from_env()?;
    output_config.output_dir = output_dir;

    let browser_config = BrowserExtractorConfig {
        catalog_url,
        ..BrowserExtractorConfig::default()
    }
    .within_attempt_timeout(config.extraction_timeout);
    let extractor = BrowserExtractor::with_config(browser_config)
        .await
        .context("Failed to start headless browser")?;

    let registry = JobRegistry::new();
    let job_id = new_job_id();
    let cancel = registry.create(&job_id, &file_name)?;

    let scheduler = BatchScheduler::new(
        extractor,
        TabularFiles,
        OutputStage::new(TabularFiles, output_config),
        registry.clone(),
        config,
    );

    let on_interrupt = registry.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling job");
            on_interrupt.shutdown();
        }
    });

    tracing::info!(%job_id, input = %input.display(), "Running job");
    let outcome = scheduler
        .run(
            Submission {
                job_id: job_id.clone(),
                file_name,
                input_path: input.to_path_buf(),
                format,
                remove_input: false,
                cancel,
            },
            &TracingSchedulerReporter,
        )
        .await;

    let snapshot = registry
        .snapshot(&job_id)
        .context("Job disappeared from registry")?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    let path = outcome.with_context(|| format!("Job {job_id} failed"))?;
    println!("\nResults written to {}", path.display());
    Ok(())
}

/// What `inspect` reports about an input file.
#[derive(Debug, PartialEq, Eq)]
struct InspectReport {
    columns: ColumnMap,
    rows: usize,
    empty_names: usize,
}

impl InspectReport {
    fn from_table(table: &InputTable) -> Self {
        let columns = ColumnMap::resolve(&table.headers);
        let empty_names = table
            .rows
            .iter()
            .filter(|row| columns.item(row).is_skippable())
            .count();
        Self {
            columns,
            rows: table.rows.len(),
            empty_names,
        }
    }
}

fn describe_column(index: Option<usize>) -> String {
    match index {
        Some(i) => format!("column {}", i + 1),
        None => "missing".to_string(),
    }
}

async fn cmd_inspect(input: &Path) -> Result<()> {
    let file_name = file_name_of(input)?;
    let format = TableFormat::from_file_name(&file_name)?;
    let table = TabularFiles.read_table(input, format).await?;
    let report = InspectReport::from_table(&table);
    let source = CatalogSource::default();

    println!("File: {} ({format})", input.display());
    println!("Headers: {}", table.headers.join(", "));
    println!("  SrNo:      {}", describe_column(report.columns.sr_no));
    println!("  Item Code: {}", describe_column(report.columns.item_code));
    println!("  Item Name: {}", describe_column(report.columns.item_name));
    println!(
        "Rows: {} ({} to look up on {}, {} skipped for empty item name)",
        report.rows,
        report.rows - report.empty_names,
        source.domain,
        report.empty_names
    );
    Ok(())
}
