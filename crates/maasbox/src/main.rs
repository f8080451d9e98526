//! maasbox
//!
//! Command line entry point: validate NetBox against MaaS, push corrections
//! back, or bootstrap records for freshly deployed machines.

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use maasbox::{
    config::Config,
    context::Context,
    creators::{self, Creator},
    observability::{init_logging, LogFormat},
    updaters, validators,
    validators::Field,
    version,
};
use maasbox_core::Report;
use std::path::PathBuf;
use tracing::{info, level_filters::LevelFilter};

#[derive(Parser)]
#[command(name = "maasbox")]
#[command(about = "Reconcile NetBox inventory against MaaS")]
#[command(version = version::VERSION)]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "MAASBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Default log level, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    log: LevelFilter,

    #[arg(long, global = true, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare a field and print the discrepancies
    Validate {
        #[arg(value_enum)]
        field: Field,
        #[arg(long, value_enum, default_value_t = Output::Text)]
        output: Output,
    },
    /// Validate a field and write the expected values to NetBox
    Update {
        #[arg(value_enum)]
        field: Field,
        /// Log the writes without performing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Create NetBox records from MaaS data
    Create {
        #[arg(value_enum)]
        creator: Creator,
        /// JSON document describing the record
        #[arg(long)]
        data: Option<String>,
    },
    /// Print build information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("{}", version::build_info());
        return Ok(());
    }

    init_logging(cli.log, cli.log_format)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;
    info!(version = %version::full_version(), "Starting maasbox");

    let config = Config::load(cli.config.as_deref())
        .await
        .context("failed to load configuration")?;
    let ctx = Context::new(config).context("failed to set up API clients")?;

    match cli.command {
        Commands::Validate { field, output } => {
            let report = validators::validate(&ctx, field)
                .await
                .with_context(|| format!("{field} validation failed"))?;
            print_report(&report, output)?;
        }
        Commands::Update { field, dry_run } => {
            let summary = updaters::run(&ctx, field, dry_run)
                .await
                .with_context(|| format!("{field} update failed"))?;
            if summary.failed > 0 {
                anyhow::bail!("{} of {} updates failed", summary.failed, summary.planned);
            }
        }
        Commands::Create { creator, data } => {
            creators::create(&ctx, creator, data.as_deref())
                .await
                .with_context(|| format!("{creator} creation failed"))?;
        }
        Commands::Version => {}
    }

    Ok(())
}

fn print_report(report: &Report, output: Output) -> anyhow::Result<()> {
    match output {
        Output::Json => println!("{}", serde_json::to_string_pretty(report)?),
        Output::Text => {
            for (id, discrepancy) in report {
                println!(
                    "{id}\tcurrent: {}\texpected: {}",
                    discrepancy.current, discrepancy.expected
                );
            }
        }
    }
    Ok(())
}
