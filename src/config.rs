use crate::controller::{AuditLog, BestState, Workspace};
use crate::engine::MakeBuilder;
use crate::error::{Result, TuneError};
use crate::game::GameState;
use crate::params::{MutationPlan, ParameterStore, ParameterVector, ZeroDeltaPolicy};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Everything a tuning run needs to know. The defaults describe the usual layout of
/// the engine's source tree, with the tuner started from its root.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeConfig {
    /// Milliseconds per move in tournament games.
    pub time_ms: u64,
    /// Milliseconds per position when measuring a metric.
    pub cutoff_time_ms: u64,
    /// Older engine version every candidate must also beat.
    pub reference: String,
    /// Maximum relative change of a mutated value.
    pub noise: f64,
    pub seed: Option<u64>,

    pub openings: PathBuf,
    pub training: PathBuf,
    pub baseline: PathBuf,
    pub artifact: PathBuf,
    pub best_artifact: PathBuf,
    pub audit_log: PathBuf,
    pub state: PathBuf,

    /// Continue from the saved state instead of the baseline.
    pub resume: bool,
    /// Skips the calibration tournament.
    pub reference_score: Option<i32>,

    pub build_command: String,
    pub engine_binary: PathBuf,
    pub reference_binary: PathBuf,
    pub binary_dir: PathBuf,
    pub debug_build_args: Vec<String>,

    /// Extra attempts for a failed measurement before giving up.
    pub retries: u32,
    pub max_steps: Option<u64>,
    pub zero_delta: ZeroDeltaPolicy,
    pub send_history: bool,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            time_ms: 100,
            cutoff_time_ms: 100,
            reference: "V2.6".to_string(),
            noise: 0.1,
            seed: None,
            openings: PathBuf::from("data/FENs.txt"),
            training: PathBuf::from("data/training.txt"),
            baseline: PathBuf::from("data/baseline.json"),
            artifact: PathBuf::from("src/consts.c"),
            best_artifact: PathBuf::from("src/consts_best.c"),
            audit_log: PathBuf::from("optimize_constants.log"),
            state: PathBuf::from("tune_state.json"),
            resume: false,
            reference_score: None,
            build_command: "make".to_string(),
            engine_binary: PathBuf::from("./sigma-zero"),
            reference_binary: PathBuf::from("./old"),
            binary_dir: PathBuf::from("."),
            debug_build_args: vec!["CFLAGS+=-DTRACK_BETA_CUTOFFS".to_string()],
            retries: 3,
            max_steps: None,
            zero_delta: ZeroDeltaPolicy::Keep,
            send_history: true,
        }
    }
}

impl OptimizeConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.noise > 0.0 && self.noise < 1.0) {
            return Err(TuneError::Config(format!(
                "noise must be in (0, 1), got {}",
                self.noise
            )));
        }
        if self.time_ms == 0 || self.cutoff_time_ms == 0 {
            return Err(TuneError::Config("move time must be positive".to_string()));
        }
        if self.build_command.split_whitespace().next().is_none() {
            return Err(TuneError::Config("empty build command".to_string()));
        }
        Ok(())
    }

    /// Opens the checked-in artifact and decides where the best state starts from.
    /// Fails if the artifact does not render back from that state.
    pub fn load_state(&self) -> Result<(ParameterStore, BestState)> {
        let (store, on_disk) = ParameterStore::open(&self.artifact)?;

        let mut best = if self.resume {
            log::info!("Resuming from {}", self.state.display());
            BestState::load(&self.state)?
        } else if self.baseline.exists() {
            BestState::new(ParameterVector::from_json_file(&self.baseline)?, 0)
        } else {
            log::warn!(
                "{} not found, using the parameters in {} as the baseline",
                self.baseline.display(),
                self.artifact.display()
            );
            BestState::new(on_disk, 0)
        };

        store.verify_baseline(&self.artifact, &best.parameters)?;

        if let Some(score) = self.reference_score {
            best.reference_score = score;
        }

        Ok((store, best))
    }

    pub fn needs_calibration(&self) -> bool {
        !self.resume && self.reference_score.is_none()
    }

    pub fn openings(&self) -> Result<Vec<String>> {
        read_positions(&self.openings)
    }

    pub fn training_positions(&self) -> Result<Vec<String>> {
        read_positions(&self.training)
    }

    pub fn builder(&self) -> MakeBuilder {
        MakeBuilder {
            command: self
                .build_command
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            artifact_path: self.artifact.clone(),
            engine_binary: self.engine_binary.clone(),
            reference_binary: self.reference_binary.clone(),
            binary_dir: self.binary_dir.clone(),
            debug_args: self.debug_build_args.clone(),
        }
    }

    pub fn workspace(&self, store: ParameterStore, stop: Arc<AtomicBool>) -> Workspace {
        Workspace {
            store,
            audit: AuditLog::new(&self.audit_log),
            artifact: self.artifact.clone(),
            best_artifact: self.best_artifact.clone(),
            state: self.state.clone(),
            stop,
        }
    }

    /// Restricts mutation to `names`, or allows every parameter when `names` is empty.
    /// Names the vector does not have are reported and skipped.
    pub fn mutation_plan(&self, base: &ParameterVector, names: &[String]) -> Result<MutationPlan> {
        if names.is_empty() {
            return Ok(MutationPlan::all(base, self.zero_delta));
        }

        let (known, unknown): (Vec<String>, Vec<String>) =
            names.iter().cloned().partition(|name| base.contains(name));

        if !unknown.is_empty() {
            log::warn!("Ignoring unknown parameters: {}", unknown.join(", "));
        }
        if known.is_empty() {
            return Err(TuneError::Config(
                "none of the given parameters exist".to_string(),
            ));
        }

        log::info!("Optimizing only the following constants: {}", known.join(", "));
        Ok(MutationPlan::new(known, self.zero_delta))
    }
}

/// One position per line; anything after the first comma is ignored, so labelled
/// training files can be used as they are.
pub fn read_positions(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).map_err(|e| TuneError::io(path, e))?;

    let positions = text
        .lines()
        .map(|line| line.split(',').next().unwrap_or("").trim())
        .filter(|fen| !fen.is_empty())
        .map(|fen| GameState::from_fen(fen).map(|_| fen.to_string()))
        .collect::<Result<Vec<_>>>()?;

    if positions.is_empty() {
        return Err(TuneError::Config(format!(
            "no positions in {}",
            path.display()
        )));
    }

    Ok(positions)
}
