use crate::config::OptimizeConfig;
use crate::engine::Metric;
use crate::params::ZeroDeltaPolicy;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use strum::IntoEnumIterator;

#[derive(Parser, Debug)]
#[command(name = "sigma-tune")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"))]
#[command(about = "Self-play tuner for the engine's compile-time constants", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub options: Options,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Hill-climb all constants, or only the named ones, through self-play tournaments
    Tune {
        #[arg(value_name = "PARAMS")]
        params: Vec<String>,
    },
    /// Tune the move-ordering constants to raise a search statistic
    Maximize {
        #[arg(value_name = "METRIC", value_parser = parse_metric)]
        metric: Metric,
    },
    /// Tune the move-ordering constants to lower a search statistic
    Minimize {
        #[arg(value_name = "METRIC", value_parser = parse_metric)]
        metric: Metric,
    },
    /// Check that the constants file matches the baseline, then exit
    Check,
    /// Print the constants file the baseline renders to
    Render,
}

fn parse_metric(s: &str) -> Result<Metric, String> {
    Metric::from_str(s).map_err(|_| {
        let available = Metric::iter().map(|m| m.to_string()).collect::<Vec<_>>();
        format!(
            "value '{}' is not recognized, available values: {}",
            s,
            available.join(", ")
        )
    })
}

#[derive(Args, Debug, Clone)]
pub struct Options {
    /// Milliseconds per move in tournament games
    #[arg(long, global = true, default_value_t = 100)]
    pub time_ms: u64,

    /// Milliseconds per position when measuring a statistic
    #[arg(long, global = true, default_value_t = 100)]
    pub cutoff_time_ms: u64,

    /// Engine version every candidate must also beat
    #[arg(long, global = true, default_value = "V2.6")]
    pub reference: String,

    /// Maximum relative change of a mutated constant
    #[arg(long, global = true, default_value_t = 0.1)]
    pub noise: f64,

    /// Random seed; drawn from the OS when absent
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Tournament openings, one FEN per line
    #[arg(long, global = true, default_value = "data/FENs.txt")]
    pub openings: PathBuf,

    /// Positions for statistic measurement, FEN first on each line
    #[arg(long, global = true, default_value = "data/training.txt")]
    pub training: PathBuf,

    /// Starting constants as a JSON object
    #[arg(long, global = true, default_value = "data/baseline.json")]
    pub baseline: PathBuf,

    /// Constants file the build step compiles
    #[arg(long, global = true, default_value = "src/consts.c")]
    pub artifact: PathBuf,

    /// Copy of the best constants, updated on every acceptance
    #[arg(long, global = true, default_value = "src/consts_best.c")]
    pub best_artifact: PathBuf,

    #[arg(long, global = true, default_value = "optimize_constants.log")]
    pub audit_log: PathBuf,

    /// Saved best state, for --resume
    #[arg(long, global = true, default_value = "tune_state.json")]
    pub state: PathBuf,

    /// Continue from the saved state
    #[arg(long, global = true)]
    pub resume: bool,

    /// Use this score against the reference instead of measuring it
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub reference_score: Option<i32>,

    #[arg(long, global = true, default_value = "make")]
    pub build_command: String,

    /// Executable produced by the build command
    #[arg(long, global = true, default_value = "./sigma-zero")]
    pub engine_binary: PathBuf,

    /// Executable produced when building the reference version
    #[arg(long, global = true, default_value = "./old")]
    pub reference_binary: PathBuf,

    /// Where built binaries are kept
    #[arg(long, global = true, default_value = ".")]
    pub binary_dir: PathBuf,

    /// Extra build arguments enabling search telemetry
    #[arg(long = "debug-build-arg", global = true, default_value = "CFLAGS+=-DTRACK_BETA_CUTOFFS")]
    pub debug_build_args: Vec<String>,

    /// Extra attempts for a failed measurement
    #[arg(long, global = true, default_value_t = 3)]
    pub retries: u32,

    /// Stop after this many steps
    #[arg(long, global = true)]
    pub max_steps: Option<u64>,

    /// What to do when a perturbation rounds to zero (keep, random-sign)
    #[arg(long, global = true, default_value = "keep")]
    pub zero_delta: ZeroDeltaPolicy,

    /// Do not pass the game history to the engine
    #[arg(long, global = true)]
    pub no_history: bool,
}

impl From<Options> for OptimizeConfig {
    fn from(options: Options) -> Self {
        Self {
            time_ms: options.time_ms,
            cutoff_time_ms: options.cutoff_time_ms,
            reference: options.reference,
            noise: options.noise,
            seed: options.seed,
            openings: options.openings,
            training: options.training,
            baseline: options.baseline,
            artifact: options.artifact,
            best_artifact: options.best_artifact,
            audit_log: options.audit_log,
            state: options.state,
            resume: options.resume,
            reference_score: options.reference_score,
            build_command: options.build_command,
            engine_binary: options.engine_binary,
            reference_binary: options.reference_binary,
            binary_dir: options.binary_dir,
            debug_build_args: options.debug_build_args,
            retries: options.retries,
            max_steps: options.max_steps,
            zero_delta: options.zero_delta,
            send_history: !options.no_history,
        }
    }
}
