use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use vitals_check::app::ClassifyUseCase;
use vitals_check::config::Config;
use vitals_check::pipeline::PipelineContext;
use vitals_check::types::{Feature, FieldMap};
use vitals_check::{logging, server};

#[derive(Parser)]
#[command(name = "vitals_check")]
#[command(about = "Classify vital sign readings as Healthy or Unhealthy")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file (defaults to vitals.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the form pages and JSON API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Classify a single reading and print the result
    Classify {
        #[command(flatten)]
        reading: ReadingArgs,
        /// Print a JSON object instead of the bare result string
        #[arg(long)]
        json: bool,
    },
    /// Load and validate the range table, scaler and model
    CheckArtifacts,
}

/// Values stay as text so the CLI goes through the same parser as the form.
#[derive(Args)]
struct ReadingArgs {
    #[arg(long, allow_hyphen_values = true)]
    heart_rate: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    movement: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    oxygen_level: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    temperature: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    blood_pressure: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    respiration_rate: Option<String>,
}

impl ReadingArgs {
    fn into_fields(self) -> FieldMap {
        [
            (Feature::HeartRate, self.heart_rate),
            (Feature::Movement, self.movement),
            (Feature::OxygenLevel, self.oxygen_level),
            (Feature::Temperature, self.temperature),
            (Feature::BloodPressure, self.blood_pressure),
            (Feature::RespirationRate, self.respiration_rate),
        ]
        .into_iter()
        .filter_map(|(feature, value)| value.map(|v| (feature.form_key().to_string(), v)))
        .collect()
    }
}

fn load_context(config: &Config) -> anyhow::Result<Arc<PipelineContext>> {
    let paths = config.artifacts.paths();
    let ctx = PipelineContext::load(&paths).context("Failed to load model artifacts")?;
    Ok(Arc::new(ctx))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Initialize logging; the guard flushes the file writer on exit
    let _guard = logging::init_logging(&config.logging);

    if config.metrics.enabled {
        vitals_check::metrics::init_metrics();
    }

    match cli.command {
        Commands::Serve { host, port } => {
            let ctx = load_context(&config)?;
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            info!(scaler = ctx.transformer_name(), model = ctx.scorer_name(), "Pipeline ready");
            server::start_server(ClassifyUseCase::new(ctx), &host, port).await?;
        }
        Commands::Classify { reading, json } => {
            let use_case = ClassifyUseCase::new(load_context(&config)?);
            let classification = use_case.classify_fields(&reading.into_fields())?;
            if json {
                let out = serde_json::json!({
                    "result": classification.message(),
                    "healthy": classification.is_healthy(),
                    "reason": classification.reason(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{}", classification);
            }
        }
        Commands::CheckArtifacts => {
            let ctx = load_context(&config)?;
            println!("Healthy ranges:");
            for feature in Feature::ALL {
                let range = ctx.ranges().get(feature);
                println!("  {:<17} [{}, {}]", feature.name(), range.min, range.max);
            }
            println!("Scaler: {}", ctx.transformer_name());
            println!("Model:  {}", ctx.scorer_name());
        }
    }
    Ok(())
}
