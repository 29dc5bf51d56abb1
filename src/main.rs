use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use fest_scout::app::discover_use_case::{DiscoverUseCase, DiscoverySummary};
use fest_scout::app::enrich_use_case::{EnrichUseCase, EnrichmentReport, EnrichmentSummary};
use fest_scout::common::constants::{DEFAULT_CONFIG_PATH, NAME_COLUMN};
use fest_scout::config::{AppConfig, Secrets};
use fest_scout::crew::CrewDefinition;
use fest_scout::domain::Confidence;
use fest_scout::infra::llm_client::OpenAiChatClient;
use fest_scout::observability::{self, metrics};
use fest_scout::pipeline::stage::RowOutcome;
use fest_scout::pipeline::{AgentRuntime, TableRow};
use fest_scout::tools::ToolRegistry;

const RULE: &str = "================================================================";

const OUTREACH_DISCLAIMER: &str = "IMPORTANT: This tool is for legitimate music industry outreach only.
When contacting festival organizers, comply with all applicable privacy
laws including GDPR, CAN-SPAM Act, and local regulations. Always:
  - Include a clear unsubscribe option in your emails
  - Identify yourself and your organization honestly
  - Respect opt-out requests immediately
  - Only contact people with a legitimate business reason";

#[derive(Parser)]
#[command(name = "fest_scout")]
#[command(about = "Discover music festivals and enrich them with organizer contacts")]
#[command(version)]
struct Cli {
    /// Optional TOML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Phase 1: find and score festivals, write them for review
    Discover {
        /// Output CSV path (default: festivals_phase1.csv)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Phase 2: enrich approved festivals with organizer contacts
    Enrich {
        /// Reviewed Phase 1 CSV (default: festivals_phase1.csv)
        input: Option<PathBuf>,
    },
}

fn build_runtime(config: &AppConfig, secrets: &Secrets) -> anyhow::Result<Arc<AgentRuntime>> {
    if secrets.openai_api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; every agent call will fail");
    }
    let llm = OpenAiChatClient::new(&config.llm, secrets.openai_api_key.clone())?;
    let tools = ToolRegistry::standard(config, secrets)?;
    Ok(Arc::new(AgentRuntime::new(Arc::new(llm), tools, &config.llm)))
}

async fn run_discover(config: &AppConfig, secrets: &Secrets, output: &Path) -> anyhow::Result<ExitCode> {
    println!("\n🎪 fest_scout · Phase 1: Festival Discovery");
    println!("   Target year: {}", config.discovery.target_year);
    println!("   Regions: {}", config.discovery.regions);
    println!("   Genre focus: {}", config.discovery.genre_focus);
    println!("{}", RULE);

    let use_case = DiscoverUseCase::new(build_runtime(config, secrets)?, CrewDefinition::research()?);
    match use_case.run(&config.discovery, output).await {
        Ok(summary) => {
            print_discovery_summary(&summary);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("Phase 1 failed: {}", e);
            println!("\n❌ Error running research crew: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_discovery_summary(summary: &DiscoverySummary) {
    println!("\n{}", RULE);
    println!("📊 Results saved to: {}", summary.output.display());
    println!("   Total festivals found: {}", summary.total);
    println!("   High fit:   {}", summary.high);
    println!("   Medium fit: {}", summary.medium);
    println!("   Low fit:    {}", summary.low);
    if summary.unscored > 0 {
        println!("   Unscored:   {}", summary.unscored);
    }
    println!("\n{}", RULE);
    println!("NEXT STEPS:");
    println!("  1. Open {} in a spreadsheet editor", summary.output.display());
    println!("  2. Review each festival entry");
    println!("  3. Put 'Yes' in the 'Approved' column for festivals to enrich");
    println!("  4. Run: fest_scout enrich {}", summary.output.display());
    println!("{}", RULE);
}

fn print_row(index: usize, total: usize, name: &str, website: &str, outcome: &RowOutcome) {
    println!("\n🔎 Processing festival {}/{}: {}", index, total, name);
    println!("   Website: {}", if website.is_empty() { "(none)" } else { website });
    let record = outcome.record();
    match outcome {
        RowOutcome::Skipped(_) => println!("   ⚠️  No website, skipped enrichment"),
        RowOutcome::Failed(_) => println!("   ❌ {}", record.notes),
        RowOutcome::Unparsed(_) | RowOutcome::Enriched(_) => println!(
            "   Confidence: {} | Emails: {}",
            record.confidence,
            record.email_summary()
        ),
    }
}

fn print_enrichment_summary(summary: &EnrichmentSummary) {
    println!("\n{}", RULE);
    println!("📊 Results saved to: {}", summary.output.display());
    println!("   Total festivals processed: {}", summary.processed());
    println!("   High confidence contacts:   {}", summary.with_confidence(Confidence::High));
    println!("   Medium confidence contacts: {}", summary.with_confidence(Confidence::Medium));
    println!("   Low confidence / not found: {}", summary.with_confidence(Confidence::Low));
    println!("   Rows written: {}", summary.merge.rows_written);
    if summary.merge.standalone {
        println!("   ⚠️  Original table unusable, wrote enrichment columns only");
    }
    println!("\n{}", OUTREACH_DISCLAIMER);
    println!("{}", RULE);
}

async fn run_enrich(config: &AppConfig, secrets: &Secrets, input: &Path) -> anyhow::Result<ExitCode> {
    println!("\n📇 fest_scout · Phase 2: Contact Enrichment");
    println!("   Loading approved festivals from: {}", input.display());
    println!("{}", RULE);

    let output = PathBuf::from(&config.paths.phase2_output);
    let use_case = EnrichUseCase::new(build_runtime(config, secrets)?, CrewDefinition::enrichment()?);
    let mut observer = |index: usize, total: usize, row: &TableRow, outcome: &RowOutcome| {
        print_row(index, total, row.text(NAME_COLUMN), row.text("website"), outcome);
    };

    match use_case.run(input, &output, &mut observer).await {
        Ok(EnrichmentReport::NothingApproved { diagnostic }) => {
            if let Some(diagnostic) = diagnostic {
                println!("⚠️  {}", diagnostic);
            }
            println!("No approved festivals found. Please add 'Yes' in the 'Approved' column.");
            Ok(ExitCode::SUCCESS)
        }
        Ok(EnrichmentReport::Completed(summary)) => {
            print_enrichment_summary(&summary);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("Could not write {}: {}", output.display(), e);
            println!("\n❌ Could not write {}: {}", output.display(), e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = AppConfig::load(&cli.config)?;
    let secrets = Secrets::from_env();
    info!("Secrets: {:?}", secrets);

    let run_id = Uuid::new_v4();
    let code = match cli.command {
        Commands::Discover { output } => {
            let output = output.unwrap_or_else(|| PathBuf::from(&config.paths.phase1_output));
            run_discover(&config, &secrets, &output)
                .instrument(info_span!("discover", run_id = %run_id))
                .await?
        }
        Commands::Enrich { input } => {
            let input = input.unwrap_or_else(|| PathBuf::from(&config.paths.phase1_output));
            run_enrich(&config, &secrets, &input)
                .instrument(info_span!("enrich", run_id = %run_id))
                .await?
        }
    };
    metrics::dump_if_requested();
    Ok(code)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    observability::init_logging();
    if let Err(e) = observability::init_metrics() {
        warn!("Metrics disabled: {}", e);
    }

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("fest_scout failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
