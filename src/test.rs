use crate::config::OptimizeConfig;
use crate::controller::*;
use crate::engine::{
    BinaryId, BuildSource, EngineOracle, Evaluation, Metric, OracleRequest, parse_response,
};
use crate::error::{Result, TuneError};
use crate::game::Referee;
use crate::params::{MutationPlan, ParamValue, ParameterStore, ParameterVector, ZeroDeltaPolicy};
use fxhash::{FxHashMap, FxHashSet};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

const HASH_BLOCK: &str = "// Zobrist hashing values\nconst uint64_t ZHASH_WHITE = 0xe8554e0e45604657;";

// White mates in four.
const SCHOLAR: (&[&str], &[&str]) = (&["e2e4", "f1c4", "d1h5", "h5f7"], &["e7e5", "b8c6", "g8f6"]);
// Black mates in two.
const FOOL: (&[&str], &[&str]) = (&["f2f3", "g2g4"], &["e7e5", "d8h4"]);
// Black can claim threefold repetition after seven plies.
const SHUFFLE: (&[&str], &[&str]) = (
    &["g1f3", "f3g1", "g1f3", "f3g1"],
    &["g8f6", "f6g8", "g8f6"],
);

/// An oracle that answers from per-binary queues instead of running engines.
#[derive(Default)]
pub(crate) struct ScriptedOracle {
    scripts: FxHashMap<BinaryId, VecDeque<Result<Evaluation>>>,
    installed: FxHashMap<BinaryId, BuildSource>,
    broken: FxHashSet<BinaryId>,
    requests: Vec<OracleRequest>,
    pub builds: usize,
}

impl ScriptedOracle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(mut self, id: BinaryId, response: Result<Evaluation>) -> Self {
        self.scripts.entry(id).or_default().push_back(response);
        self
    }

    pub(crate) fn moves(self, id: BinaryId, moves: &[&str]) -> Self {
        moves
            .iter()
            .fold(self, |oracle, m| oracle.respond(id, move_response(id, m)))
    }

    /// Queues whole games from the start position, one per outcome (candidate's view).
    /// The candidate is white in even games, like in a tournament.
    pub(crate) fn games(
        mut self,
        candidate: BinaryId,
        opponent: BinaryId,
        outcomes: &[i8],
    ) -> Self {
        for (i, outcome) in outcomes.iter().enumerate() {
            let candidate_white = i % 2 == 0;
            let white_score = if candidate_white { *outcome } else { -outcome };
            let (white, black) = if candidate_white {
                (candidate, opponent)
            } else {
                (opponent, candidate)
            };

            let (white_moves, black_moves) = match white_score {
                1 => SCHOLAR,
                -1 => FOOL,
                _ => SHUFFLE,
            };
            self = self.moves(white, white_moves).moves(black, black_moves);
        }
        self
    }

    pub(crate) fn broken_version(mut self, id: BinaryId) -> Self {
        self.broken.insert(id);
        self
    }

    pub(crate) fn requests(&self) -> usize {
        self.requests.len()
    }

    pub(crate) fn last_request(&self) -> Option<&OracleRequest> {
        self.requests.last()
    }

    /// Requests without history, i.e. first moves of a game.
    pub(crate) fn games_started(&self) -> usize {
        self.requests.iter().filter(|r| r.history.is_empty()).count()
    }

    pub(crate) fn installed(&self, id: BinaryId) -> Option<&BuildSource> {
        self.installed.get(&id)
    }
}

impl EngineOracle for ScriptedOracle {
    fn install(&mut self, id: BinaryId, source: BuildSource) {
        self.installed.insert(id, source);
    }

    fn prepare(&mut self, _id: BinaryId) -> Result<()> {
        self.builds += 1;
        Ok(())
    }

    fn identify(&mut self, id: BinaryId) -> Result<String> {
        if self.broken.contains(&id) {
            return Err(TuneError::Protocol {
                binary: id.to_string(),
                fen: "-".to_string(),
                reason: "--version failed".to_string(),
                raw: String::new(),
            });
        }
        Ok(format!("Scripted {}", id))
    }

    fn evaluate(&mut self, id: BinaryId, request: &OracleRequest) -> Result<Evaluation> {
        self.requests.push(request.clone());

        self.scripts
            .get_mut(&id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(TuneError::Protocol {
                    binary: id.to_string(),
                    fen: request.fen.clone(),
                    reason: "script exhausted".to_string(),
                    raw: String::new(),
                })
            })
    }
}

fn move_response(id: BinaryId, m: &str) -> Result<Evaluation> {
    let raw = json!({ "move": m, "depth": 5, "time": 0.01, "eval": 0.0 }).to_string();
    parse_response(id, "-", &raw)
}

fn telemetry(value: f64) -> Result<Evaluation> {
    let raw = json!({
        "move": "e2e4",
        "depth": 7,
        "time": 0.1,
        "eval": 0.2,
        "avg_cutoff_index": value,
    })
    .to_string();
    parse_response(BinaryId::Candidate, START, &raw)
}

pub(crate) fn scripted_games(
    candidate: BinaryId,
    opponent: BinaryId,
    outcomes: &[i8],
) -> ScriptedOracle {
    ScriptedOracle::new().games(candidate, opponent, outcomes)
}

fn single(name: &str, value: i64) -> ParameterVector {
    let mut vector = ParameterVector::new();
    vector.push(name, ParamValue::Scalar(value)).unwrap();
    vector
}

fn config(dir: &Path) -> OptimizeConfig {
    OptimizeConfig {
        artifact: dir.join("consts.c"),
        best_artifact: dir.join("consts_best.c"),
        audit_log: dir.join("optimize_constants.log"),
        state: dir.join("tune_state.json"),
        baseline: dir.join("baseline.json"),
        noise: 0.5,
        ..Default::default()
    }
}

fn workspace(config: &OptimizeConfig, parameters: &ParameterVector, stop: bool) -> Workspace {
    let store = ParameterStore::new(HASH_BLOCK);
    store.write(&config.artifact, parameters).unwrap();
    config.workspace(store, Arc::new(AtomicBool::new(stop)))
}

fn acceptance(
    oracle: ScriptedOracle,
    workspace: Workspace,
    parameters: &ParameterVector,
) -> AcceptanceController<ScriptedOracle> {
    let runner = TournamentRunner::new(
        Referee::new(100),
        vec![START.to_string()],
        workspace.stop.clone(),
    );
    let plan = MutationPlan::all(parameters, ZeroDeltaPolicy::Keep);
    AcceptanceController::new(oracle, workspace, runner, plan, 0.5, "V2.6".to_string())
}

#[test]
fn test_losing_candidate_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let parameters = single("PAWN_VALUE", 1000);
    let workspace = workspace(&config, &parameters, false);

    let oracle = scripted_games(BinaryId::Candidate, BinaryId::Best, &[-1, -1]);
    let mut controller = acceptance(oracle, workspace, &parameters);
    let mut best = BestState::new(parameters.clone(), 3);

    let verdict = controller
        .step(&mut best, &mut StdRng::seed_from_u64(1))
        .unwrap();

    assert_eq!(
        verdict,
        Verdict::Rejected {
            at: Phase::StageA,
            score: -1
        }
    );
    assert_eq!(best, BestState::new(parameters, 3));
    // Hopeless after the first loss, the second game never starts.
    assert_eq!(controller.oracle().games_started(), 1);
    assert_eq!(controller.oracle().builds, 2);
    assert_eq!(
        controller.oracle().installed(BinaryId::Reference),
        Some(&BuildSource::Version("V2.6".to_string()))
    );
    assert!(AuditLog::new(&config.audit_log).entries().unwrap().is_empty());
    assert!(!config.state.exists());
}

#[test]
fn test_stage_b_failure_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let parameters = single("PAWN_VALUE", 1000);
    let workspace = workspace(&config, &parameters, false);

    // Beats the best, but only ties the recorded score against the reference.
    let oracle = ScriptedOracle::new()
        .games(BinaryId::Candidate, BinaryId::Best, &[1, 1])
        .games(BinaryId::Candidate, BinaryId::Reference, &[1, 0]);
    let mut controller = acceptance(oracle, workspace, &parameters);
    let mut best = BestState::new(parameters.clone(), 1);

    let verdict = controller
        .step(&mut best, &mut StdRng::seed_from_u64(2))
        .unwrap();

    assert_eq!(
        verdict,
        Verdict::Rejected {
            at: Phase::StageB,
            score: 1
        }
    );
    assert_eq!(best.parameters, parameters);
    assert!(!config.best_artifact.exists());
}

#[test]
fn test_candidate_passing_both_stages_is_committed() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let parameters = single("PAWN_VALUE", 1000);
    let workspace = workspace(&config, &parameters, false);

    let oracle = ScriptedOracle::new()
        .games(BinaryId::Candidate, BinaryId::Best, &[1, 1])
        .games(BinaryId::Candidate, BinaryId::Reference, &[1, 1]);
    let mut controller = acceptance(oracle, workspace, &parameters);
    let mut best = BestState::new(parameters.clone(), 0);

    let summary = controller
        .run(&mut best, &mut StdRng::seed_from_u64(3), Some(1))
        .unwrap();

    assert_eq!(summary, RunSummary { steps: 1, accepted: 1 });
    assert_eq!(best.reference_score, 2);
    assert_ne!(best.parameters, parameters);

    let entries = AuditLog::new(&config.audit_log).entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "PAWN_VALUE");
    assert_eq!(entries[0].old, 1000);
    assert_eq!(
        Some(&ParamValue::Scalar(entries[0].new)),
        best.parameters.get("PAWN_VALUE")
    );

    // The run finished: the artifact holds the new best and the copy is gone.
    assert_eq!(BestState::load(&config.state).unwrap(), best);
    assert_eq!(ParameterStore::load(&config.artifact).unwrap(), best.parameters);
    assert!(!config.best_artifact.exists());
}

#[test]
fn test_calibration_plays_every_game() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let parameters = single("PAWN_VALUE", 1000);
    let workspace = workspace(&config, &parameters, false);

    let oracle = scripted_games(BinaryId::Best, BinaryId::Reference, &[-1, -1]);
    let mut controller = acceptance(oracle, workspace, &parameters);
    let mut best = BestState::new(parameters, 0);

    assert_eq!(controller.calibrate(&mut best).unwrap(), -2);
    assert_eq!(controller.oracle().games_started(), 2);
    assert_eq!(BestState::load(&config.state).unwrap().reference_score, -2);
}

#[test]
fn test_interrupted_calibration_saves_state() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let parameters = single("PAWN_VALUE", 1000);
    let workspace = workspace(&config, &parameters, true);
    fs::write(&config.best_artifact, "stale").unwrap();

    let oracle = scripted_games(BinaryId::Best, BinaryId::Reference, &[-1, -1]);
    let mut controller = acceptance(oracle, workspace, &parameters);
    let mut best = BestState::new(parameters.clone(), 4);

    let result = controller.calibrate(&mut best);

    assert!(matches!(result, Err(TuneError::Interrupted)));
    assert_eq!(controller.oracle().games_started(), 0);
    assert!(!config.best_artifact.exists());
    assert_eq!(BestState::load(&config.state).unwrap(), best);
    assert_eq!(ParameterStore::load(&config.artifact).unwrap(), parameters);
    let log = fs::read_to_string(&config.audit_log).unwrap();
    assert!(log.contains("Training interrupted."));
}

#[test]
fn test_illegal_move_ends_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let parameters = single("PAWN_VALUE", 1000);
    let workspace = workspace(&config, &parameters, false);

    let oracle = ScriptedOracle::new().moves(BinaryId::Candidate, &["e2e5"]);
    let mut controller = acceptance(oracle, workspace, &parameters);
    let mut best = BestState::new(parameters.clone(), 0);

    let result = controller.run(&mut best, &mut StdRng::seed_from_u64(4), None);

    assert!(matches!(result, Err(TuneError::IllegalMove { .. })));
    assert!(result.unwrap_err().is_fatal());
    assert_eq!(best.parameters, parameters);
    let log = fs::read_to_string(&config.audit_log).unwrap();
    assert!(log.contains("Error during training step"));
}

#[test]
fn test_interrupt_flushes_best_state() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let parameters = single("PAWN_VALUE", 1000);
    let workspace = workspace(&config, &parameters, true);
    fs::write(&config.best_artifact, "stale").unwrap();

    let mut controller = acceptance(ScriptedOracle::new(), workspace, &parameters);
    let mut best = BestState::new(parameters.clone(), 5);

    let summary = controller
        .run(&mut best, &mut StdRng::seed_from_u64(5), None)
        .unwrap();

    assert_eq!(summary, RunSummary { steps: 1, accepted: 0 });
    assert_eq!(controller.oracle().requests(), 0);
    assert!(!config.best_artifact.exists());
    assert_eq!(BestState::load(&config.state).unwrap(), best);
    assert_eq!(ParameterStore::load(&config.artifact).unwrap(), parameters);
}

fn cutoff(
    oracle: ScriptedOracle,
    workspace: Workspace,
    parameters: &ParameterVector,
    retries: u32,
) -> CutoffController<ScriptedOracle> {
    CutoffController::new(
        oracle,
        workspace,
        MutationPlan::all(parameters, ZeroDeltaPolicy::Keep),
        Metric::AverageCutoffIndex,
        Direction::Maximize,
        NoiseSchedule::default(),
        vec![START.to_string()],
        100,
        retries,
    )
}

#[test]
fn test_cutoff_keeps_only_improvements() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let parameters = single("KILLER_MOVE_BONUS", 1000);
    let workspace = workspace(&config, &parameters, false);
    let schedule = NoiseSchedule::default();

    let oracle = ScriptedOracle::new()
        .respond(BinaryId::Candidate, telemetry(10.0))
        .respond(BinaryId::Candidate, telemetry(9.5))
        .respond(BinaryId::Candidate, telemetry(11.0));
    let mut controller = cutoff(oracle, workspace, &parameters, 0);
    let mut rng = StdRng::seed_from_u64(6);

    let mut state = controller.start(BestState::new(parameters.clone(), 0)).unwrap();
    assert_eq!(state.best_value, 10.0);

    assert!(!controller.step(&mut state, &mut rng).unwrap());
    assert_eq!(state.best.parameters, parameters);
    assert_eq!(schedule.scale(state.accepted), 0.5);

    assert!(controller.step(&mut state, &mut rng).unwrap());
    assert_eq!(state.best_value, 11.0);
    assert_ne!(state.best.parameters, parameters);
    assert!((schedule.scale(state.accepted) - 0.46).abs() < 1e-12);
    assert_eq!(
        ParameterStore::load(&config.best_artifact).unwrap(),
        state.best.parameters
    );

    // Telemetry builds only.
    assert_eq!(
        controller.oracle().installed(BinaryId::Candidate),
        Some(&BuildSource::Artifact {
            text: ParameterStore::new(HASH_BLOCK).materialize(&state.best.parameters),
            debug: true
        })
    );
}

#[test]
fn test_cutoff_retries_then_gives_up() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let parameters = single("KILLER_MOVE_BONUS", 1000);

    let flaky = ScriptedOracle::new()
        .respond(BinaryId::Candidate, parse_response(BinaryId::Candidate, START, ""))
        .respond(BinaryId::Candidate, telemetry(4.0));
    let mut controller = cutoff(flaky, workspace(&config, &parameters, false), &parameters, 1);
    let state = controller.start(BestState::new(parameters.clone(), 0)).unwrap();
    assert_eq!(state.best_value, 4.0);
    assert_eq!(controller.oracle().requests(), 2);

    let broken = ScriptedOracle::new()
        .respond(BinaryId::Candidate, parse_response(BinaryId::Candidate, START, ""))
        .respond(BinaryId::Candidate, parse_response(BinaryId::Candidate, START, "{"));
    let mut controller = cutoff(broken, workspace(&config, &parameters, false), &parameters, 1);
    assert!(matches!(
        controller.start(BestState::new(parameters, 0)),
        Err(TuneError::Protocol { .. })
    ));
    assert_eq!(controller.oracle().requests(), 2);
}

#[test]
fn test_cutoff_run_writes_back_on_interrupt() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let parameters = single("KILLER_MOVE_BONUS", 1000);
    let workspace = workspace(&config, &parameters, false);
    let stop = workspace.stop.clone();

    let oracle = ScriptedOracle::new().respond(BinaryId::Candidate, telemetry(10.0));
    let mut controller = cutoff(oracle, workspace, &parameters, 0);
    let mut state = controller.start(BestState::new(parameters.clone(), 7)).unwrap();

    stop.store(true, Ordering::Relaxed);
    let summary = controller
        .run(&mut state, &mut StdRng::seed_from_u64(8), None)
        .unwrap();

    assert_eq!(summary, RunSummary { steps: 1, accepted: 0 });
    assert_eq!(BestState::load(&config.state).unwrap().reference_score, 7);
    let log = fs::read_to_string(&config.audit_log).unwrap();
    assert!(log.contains("avg_cutoff_index training interrupted."));
    assert!(log.contains("Final average avg_cutoff_index: 10.00"));
}

#[test]
fn test_cutoff_start_saves_state_on_interrupt() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let parameters = single("KILLER_MOVE_BONUS", 1000);
    let workspace = workspace(&config, &parameters, true);

    let oracle = ScriptedOracle::new().respond(BinaryId::Candidate, telemetry(10.0));
    let mut controller = cutoff(oracle, workspace, &parameters, 0);

    let result = controller.start(BestState::new(parameters.clone(), 9));

    assert!(matches!(result, Err(TuneError::Interrupted)));
    assert_eq!(controller.oracle().requests(), 0);
    assert_eq!(
        BestState::load(&config.state).unwrap(),
        BestState::new(parameters.clone(), 9)
    );
    assert_eq!(ParameterStore::load(&config.artifact).unwrap(), parameters);
    let log = fs::read_to_string(&config.audit_log).unwrap();
    assert!(log.contains("avg_cutoff_index training interrupted."));
}

#[test]
fn test_load_state_guards_the_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let parameters = single("PAWN_VALUE", 1000);
    ParameterStore::new(HASH_BLOCK)
        .write(&config.artifact, &parameters)
        .unwrap();

    // No baseline file: the artifact itself is the baseline.
    let (store, best) = config.load_state().unwrap();
    assert_eq!(store.hash_block(), HASH_BLOCK);
    assert_eq!(best, BestState::new(parameters, 0));

    fs::write(&config.baseline, r#"{"PAWN_VALUE": 1001}"#).unwrap();
    assert!(matches!(
        config.load_state(),
        Err(TuneError::BaselineDrift { line: 4, .. })
    ));

    fs::write(&config.baseline, r#"{"PAWN_VALUE": 1000}"#).unwrap();
    let config = OptimizeConfig {
        reference_score: Some(-3),
        ..config
    };
    assert_eq!(config.load_state().unwrap().1.reference_score, -3);
    assert!(!config.needs_calibration());
}
