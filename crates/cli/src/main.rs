//! cognito-eda command-line entry point.

mod commands;
mod output;

use ce_protocol::ProblemType;
use clap::Parser;
use clap::Subcommand;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Automated exploratory data analysis driven by language-model agents.
#[derive(Parser, Debug)]
#[command(name = "cognito-eda")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = r#"
Automated exploratory data analysis driven by language-model agents.

Examples:
  cognito-eda init
  cognito-eda provision --data churn.csv --target churned --problem-type classification
  cognito-eda run <run_id>
  cognito-eda history
  cognito-eda show <run_id> index.html
"#)]
struct Cli {
    /// Project root holding `.cognito-eda/` (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    root: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create `.cognito-eda/` with the default config and prompts
    Init {
        /// Overwrite an existing `.cognito-eda/` directory
        #[arg(long)]
        force: bool,

        /// Only write `config.toml`
        #[arg(long)]
        minimal: bool,
    },

    /// Save a dataset and run settings, and print the new run id
    Provision {
        /// Dataset file (CSV with a header row, JSON array of records or JSON Lines)
        #[arg(long)]
        data: PathBuf,

        /// Target column
        #[arg(long)]
        target: String,

        /// classification, regression, clustering, time-series or anomaly-detection
        #[arg(long)]
        problem_type: ProblemType,

        #[arg(long)]
        retry_limit: Option<u32>,

        #[arg(long)]
        sleep_seconds: Option<u64>,

        #[arg(long)]
        temperature: Option<f32>,

        #[arg(long)]
        max_tool_rounds: Option<u32>,

        /// Model name (defaults to `[model] name` in config.toml)
        #[arg(long)]
        model: Option<String>,
    },

    /// Run every stage for a provisioned run
    Run {
        run_id: String,

        /// Override the model saved with the run
        #[arg(long)]
        model: Option<String>,
    },

    /// List previous runs
    History {
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print one artifact of a run
    Show { run_id: String, artifact: String },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Command::Init { force, minimal } => commands::init(&root, force, minimal).await,
        Command::Provision {
            data,
            target,
            problem_type,
            retry_limit,
            sleep_seconds,
            temperature,
            max_tool_rounds,
            model,
        } => {
            let overrides = commands::ProvisionOverrides {
                retry_limit,
                sleep_seconds,
                temperature,
                max_tool_rounds,
                model,
            };
            commands::provision(&root, &data, &target, problem_type, overrides).await
        }
        Command::Run { run_id, model } => commands::run(&root, &run_id, model).await,
        Command::History { json } => commands::history(&root, json).await,
        Command::Show { run_id, artifact } => commands::show(&root, &run_id, &artifact).await,
    }
}
