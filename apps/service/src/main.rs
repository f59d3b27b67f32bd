#![warn(clippy::all)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing::level_filters::LevelFilter;

mod config;
mod database;
mod error;
mod monitoring;
mod pool;
#[cfg(test)]
mod test_support;
mod validation;

use config::Config;
use database::{Database, DatabaseImpl};
use error::AppError;
use logger::{init_tracing, init_tracing_with};
use monitoring::{
    HttpChecker, MonitoringScheduler, ProbeExecutor, ResultRecorder, RoundCoordinator,
    RoundSettings,
};

#[derive(Parser, Debug)]
#[command(name = "netumo", version, about = "Periodic HTTP health checks for a set of targets")]
struct Cli {
    /// Path to the config file (defaults to ~/.config/netumo/config.toml)
    #[arg(long, short = 'c', env = "NETUMO_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run monitoring rounds on the configured interval until Ctrl-C
    Run,
    /// Run a single round and print its summary
    Once,
    /// Manage monitored targets
    #[command(subcommand)]
    Targets(TargetCommand),
    /// Print recorded outcomes, newest first
    Results(ResultsArgs),
}

#[derive(Subcommand, Debug)]
enum TargetCommand {
    /// Register a new target
    Add {
        #[arg(value_name = "NAME")]
        name: String,
        #[arg(value_name = "URL")]
        url: String,
    },
    /// List every target, active or not
    List,
    /// Show one target
    Get { id: i64 },
    /// Include a target in future rounds
    Enable { id: i64 },
    /// Exclude a target from future rounds
    Disable { id: i64 },
}

#[derive(Args, Debug)]
struct ResultsArgs {
    /// Only show outcomes for this target
    #[arg(long)]
    target_id: Option<i64>,
    #[arg(long, default_value_t = 50)]
    limit: usize,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    if cli.verbose {
        init_tracing_with(LevelFilter::DEBUG);
    } else {
        init_tracing();
    }

    let config = load_config(cli.config.as_deref())?;

    let pool = pool::open_local(&config.database.path).await?;
    {
        let conn = pool.get().await.map_err(|e| anyhow!("failed to get connection: {e}"))?;
        database::initialize_database(&conn).await?;
    }
    let database = Arc::new(DatabaseImpl::new_from_pool(pool));

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config, database).await?,
        Command::Once => {
            let summary = build_coordinator(&config, database)?.run_round().await?;
            println!("{}", serde_json::to_string(&summary).context("failed to encode summary")?);
        }
        Command::Targets(command) => targets(command, &*database).await?,
        Command::Results(args) => {
            let results = database.list_results(args.target_id, args.limit).await?;
            for result in results {
                println!("{}", serde_json::to_string(&result).context("failed to encode result")?);
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config, config::Error> {
    let mut config = Config::from_config(path)?;
    config.apply_env_overrides()?;
    config.validate()?;
    info!("Loaded configuration:\n{config}");
    Ok(config)
}

fn build_coordinator(
    config: &Config,
    database: Arc<DatabaseImpl>,
) -> anyhow::Result<RoundCoordinator> {
    let monitoring = &config.monitoring;
    let checker = Arc::new(HttpChecker::new(monitoring.timeout())?);
    let executor = Arc::new(ProbeExecutor::new(checker, monitoring.timeout()));
    let recorder = Arc::new(ResultRecorder::new(database.clone()));
    let settings = RoundSettings {
        max_concurrency: monitoring.max_concurrency,
        deadline: monitoring.round_deadline(),
    };
    Ok(RoundCoordinator::new(database, executor, recorder, settings))
}

async fn run(config: &Config, database: Arc<DatabaseImpl>) -> Result<(), AppError> {
    let coordinator = Arc::new(build_coordinator(config, database)?);

    let round_coordinator = coordinator.clone();
    let scheduler = MonitoringScheduler::start(config.monitoring.interval(), move || {
        let coordinator = round_coordinator.clone();
        async move { coordinator.run_round().await }
    });

    info!(
        interval_secs = scheduler.interval().as_secs(),
        "Monitoring started, press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, waiting for the current round");
    scheduler.shutdown().await;

    let recorder = coordinator.recorder();
    info!(recorded = recorder.recorded(), lost = recorder.failed(), "Monitoring stopped");
    Ok(())
}

async fn targets(command: TargetCommand, database: &dyn Database) -> anyhow::Result<()> {
    match command {
        TargetCommand::Add { name, url } => {
            validation::validate_target_name(&name).to_result()?;
            validation::validate_target_url(&url).to_result()?;
            let target = database.create_target(name.trim(), url.trim()).await?;
            println!("{}", serde_json::to_string(&target)?);
        }
        TargetCommand::List => {
            for target in database.list_targets().await? {
                println!("{}", serde_json::to_string(&target)?);
            }
        }
        TargetCommand::Get { id } => {
            let target = database
                .get_target(id)
                .await?
                .ok_or_else(|| anyhow!("no target with id {id}"))?;
            println!("{}", serde_json::to_string(&target)?);
        }
        TargetCommand::Enable { id } => set_active(database, id, true).await?,
        TargetCommand::Disable { id } => set_active(database, id, false).await?,
    }
    Ok(())
}

async fn set_active(database: &dyn Database, id: i64, active: bool) -> anyhow::Result<()> {
    if !database.set_target_active(id, active).await? {
        return Err(anyhow!("no target with id {id}"));
    }
    info!(target_id = id, active, "Target updated");
    Ok(())
}
