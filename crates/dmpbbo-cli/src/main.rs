//! `dmpbbo` command-line driver.
//!
//! Runs black-box optimization of DMPs over a session directory. The verbs
//! map onto the update cycle, so rollouts can also be produced by another
//! program between `prepare`/`update` calls:
//!
//! ```text
//! dmpbbo prepare -c demo.toml -s session/
//! dmpbbo rollout -s session/      # or any external rollout process
//! dmpbbo update  -s session/
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dmpbbo_bbo::{
    n_updates, perform_rollouts, prepare, run_one_update, run_optimization_task, DirectoryStore,
    LearningSession, UpdaterKind,
};
use dmpbbo_cli::{DemoConfig, DemoModel, DemoSolver, DemoTask};
use std::path::{Path, PathBuf};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "dmpbbo")]
#[command(version = VERSION)]
#[command(about = "Black-box optimization of dynamical movement primitives", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train the initial DMP and write generation 0 into the session
    Prepare {
        /// Config TOML file (defaults are used if omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Session directory
        #[arg(short, long)]
        session: PathBuf,
    },
    /// Perform the missing rollouts of one generation
    Rollout {
        #[arg(short, long)]
        session: PathBuf,

        /// Generation to roll out (defaults to the pending one)
        #[arg(short, long)]
        update: Option<usize>,
    },
    /// Update the distribution from one generation's rollouts
    Update {
        #[arg(short, long)]
        session: PathBuf,

        /// Generation to update (defaults to the pending one)
        #[arg(short, long)]
        update: Option<usize>,
    },
    /// Prepare, then alternate rollouts and updates in this process
    Run {
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        session: PathBuf,

        /// Number of updates (overrides bbo.n_updates)
        #[arg(short, long)]
        n_updates: Option<usize>,
    },
}

fn load_config(path: Option<&Path>) -> Result<DemoConfig> {
    let config = match path {
        Some(path) => DemoConfig::from_file(path)?,
        None => DemoConfig::default(),
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn open_session(path: &Path) -> Result<LearningSession<DirectoryStore>> {
    let store = DirectoryStore::new(path)
        .with_context(|| format!("opening session directory {}", path.display()))?;
    Ok(LearningSession::new(store))
}

fn pending_update(session: &LearningSession<DirectoryStore>, update: Option<usize>) -> Result<usize> {
    match update {
        Some(i) => Ok(i),
        None => Ok(n_updates(session)?),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    log::info!("dmpbbo {} - Starting", VERSION);

    match cli.command {
        Commands::Prepare { config, session } => {
            let config = load_config(config.as_deref())?;
            let setup = config.build_setup()?;
            let mut session = open_session(&session)?;
            let pending = prepare(&mut session, &setup)?;
            log::info!("Generation 0 written: {} rollouts pending", pending.len());
        }
        Commands::Rollout { session, update } => {
            let mut session = open_session(&session)?;
            let i_update = pending_update(&session, update)?;
            let n = perform_rollouts::<_, DemoSolver>(&mut session, i_update)
                .with_context(|| format!("rollouts of update {}", i_update))?;
            log::info!("Performed {} rollouts for update {}", n, i_update);
        }
        Commands::Update { session, update } => {
            let mut session = open_session(&session)?;
            let i_update = pending_update(&session, update)?;
            let summary = run_one_update::<_, DemoTask, UpdaterKind, DemoModel>(&mut session, i_update)
                .with_context(|| format!("update {}", i_update))?;
            println!("{}", serde_json::to_string(&summary.emit_telemetry())?);
        }
        Commands::Run {
            config,
            session,
            n_updates,
        } => {
            let config = load_config(config.as_deref())?;
            let setup = config.build_setup()?;
            let mut session = open_session(&session)?;
            let n = n_updates.unwrap_or(config.bbo.n_updates);
            let summaries = run_optimization_task(&mut session, &setup, n)?;
            for summary in &summaries {
                println!("{}", serde_json::to_string(&summary.emit_telemetry())?);
            }
            if let (Some(first), Some(last)) = (summaries.first(), summaries.last()) {
                log::info!(
                    "Finished {} updates: eval cost {:.6e} -> {:.6e}",
                    summaries.len(),
                    first.cost_eval,
                    last.cost_eval
                );
            }
        }
    }

    Ok(())
}
