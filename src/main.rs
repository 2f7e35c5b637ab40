use clap::Parser;
use env_logger::Env;
use rand::SeedableRng;
use rand::rngs::StdRng;
use sigma_tune::config::OptimizeConfig;
use sigma_tune::controller::{
    AcceptanceController, CutoffController, Direction, NoiseSchedule, TournamentRunner,
};
use sigma_tune::engine::{Metric, ProcessOracle};
use sigma_tune::error::{Result, TuneError};
use sigma_tune::game::Referee;
use sigma_tune::params::{CUTOFF_PARAMETERS, MutationPlan};
use sigma_tune::utils::{Cli, Commands};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = OptimizeConfig::from(cli.options);

    match run(cli.command, config) {
        Ok(()) | Err(TuneError::Interrupted) => {}
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn run(command: Commands, config: OptimizeConfig) -> Result<()> {
    config.validate()?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            log::warn!("Interrupted, finishing up...");
            stop.store(true, Ordering::Relaxed);
        })
        .map_err(|e| TuneError::Config(format!("cannot install Ctrl-C handler: {}", e)))?;
    }

    let seed = config.seed.unwrap_or_else(rand::random);
    log::info!("Seed: {}", seed);
    let mut rng = StdRng::seed_from_u64(seed);

    match command {
        Commands::Check => {
            config.load_state()?;
            log::info!("{} matches the baseline.", config.artifact.display());
        }
        Commands::Render => {
            let (store, best) = config.load_state()?;
            print!("{}", store.materialize(&best.parameters));
        }
        Commands::Tune { params } => {
            let (store, mut best) = config.load_state()?;
            let plan = config.mutation_plan(&best.parameters, &params)?;
            let runner = TournamentRunner::new(
                Referee::new(config.time_ms),
                config.openings()?,
                stop.clone(),
            );
            let oracle = ProcessOracle::new(config.builder(), config.send_history);
            let workspace = config.workspace(store, stop);

            workspace.audit.log(&format!(
                "Starting optimization from {} with noise {}",
                if config.resume {
                    config.state.display()
                } else {
                    config.artifact.display()
                },
                config.noise
            ))?;

            let mut controller = AcceptanceController::new(
                oracle,
                workspace,
                runner,
                plan,
                config.noise,
                config.reference.clone(),
            );

            if config.needs_calibration() {
                controller.calibrate(&mut best)?;
            } else {
                log::info!("Score against {}: {}", config.reference, best.reference_score);
            }

            let summary = controller.run(&mut best, &mut rng, config.max_steps)?;
            log::info!(
                "{} of {} mutations accepted, final score against {}: {}",
                summary.accepted,
                summary.steps,
                config.reference,
                best.reference_score
            );
        }
        Commands::Maximize { metric } => {
            tune_metric(&config, metric, Direction::Maximize, stop, &mut rng)?
        }
        Commands::Minimize { metric } => {
            tune_metric(&config, metric, Direction::Minimize, stop, &mut rng)?
        }
    }

    Ok(())
}

fn tune_metric(
    config: &OptimizeConfig,
    metric: Metric,
    direction: Direction,
    stop: Arc<AtomicBool>,
    rng: &mut StdRng,
) -> Result<()> {
    let (store, best) = config.load_state()?;

    let names = CUTOFF_PARAMETERS
        .iter()
        .filter(|name| best.parameters.contains(name))
        .map(|name| name.to_string())
        .collect::<Vec<_>>();
    if names.is_empty() {
        return Err(TuneError::Config(
            "no move-ordering parameters in the artifact".to_string(),
        ));
    }

    let mut controller = CutoffController::new(
        ProcessOracle::new(config.builder(), false),
        config.workspace(store, stop),
        MutationPlan::new(names, config.zero_delta),
        metric,
        direction,
        NoiseSchedule::default(),
        config.training_positions()?,
        config.cutoff_time_ms,
        config.retries,
    );

    let mut state = controller.start(best)?;
    let summary = controller.run(&mut state, rng, config.max_steps)?;
    log::info!(
        "{} {}: {:.2} after {} of {} mutations accepted",
        direction,
        metric,
        state.best_value,
        summary.accepted,
        summary.steps
    );

    Ok(())
}
