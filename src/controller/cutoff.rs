//! Single-metric variant: tune the move-ordering constants against one telemetry
//! statistic averaged over a fixed set of positions. No games are played.

use super::{BestState, RunSummary, Workspace};
use crate::engine::{BinaryId, EngineOracle, Metric, OracleRequest};
use crate::error::{Result, TuneError};
use crate::params::{MutationPlan, ParameterVector};
use rand::Rng;
use strum_macros::Display;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Maximize,
    Minimize,
}

impl Direction {
    /// Strict: an equal value is not an improvement.
    pub fn improves(&self, candidate: f64, best: f64) -> bool {
        match self {
            Direction::Maximize => candidate > best,
            Direction::Minimize => candidate < best,
        }
    }
}

/// Noise shrinks with every accepted mutation, down to a floor.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NoiseSchedule {
    pub initial: f64,
    pub decay: f64,
    pub floor: f64,
}

impl Default for NoiseSchedule {
    fn default() -> Self {
        Self {
            initial: 0.5,
            decay: 0.92,
            floor: 0.1,
        }
    }
}

impl NoiseSchedule {
    pub fn scale(&self, accepted: u64) -> f64 {
        (self.initial * self.decay.powi(accepted as i32)).max(self.floor)
    }
}

#[derive(Debug, Clone)]
pub struct CutoffState {
    pub best: BestState,
    pub best_value: f64,
    pub accepted: u64,
    pub steps: u64,
}

pub struct CutoffController<O: EngineOracle> {
    oracle: O,
    workspace: Workspace,
    plan: MutationPlan,
    metric: Metric,
    direction: Direction,
    schedule: NoiseSchedule,
    positions: Vec<String>,
    millis: u64,
    retries: u32,
}

impl<O: EngineOracle> CutoffController<O> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        oracle: O,
        workspace: Workspace,
        plan: MutationPlan,
        metric: Metric,
        direction: Direction,
        schedule: NoiseSchedule,
        positions: Vec<String>,
        millis: u64,
        retries: u32,
    ) -> Self {
        Self {
            oracle,
            workspace,
            plan,
            metric,
            direction,
            schedule,
            positions,
            millis,
            retries,
        }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    fn audit(&self, message: &str) -> Result<()> {
        self.workspace.audit.log(message)
    }

    /// Average of the metric over all positions, using a telemetry build of `parameters`.
    pub fn measure(&mut self, parameters: &ParameterVector) -> Result<f64> {
        if self.positions.is_empty() {
            return Err(TuneError::Config("no positions to measure".to_string()));
        }

        self.workspace
            .install(&mut self.oracle, BinaryId::Candidate, parameters, true);
        self.oracle
            .prepare(BinaryId::Candidate)
            .map_err(|e| self.workspace.interrupt_or(e))?;

        let mut total = 0.0;
        for i in 0..self.positions.len() {
            self.workspace.check_interrupt()?;
            total += self.sample(i).map_err(|e| self.workspace.interrupt_or(e))?;
        }

        let average = total / self.positions.len() as f64;
        log::info!("Average {}: {:.2}", self.metric, average);
        Ok(average)
    }

    fn sample(&mut self, index: usize) -> Result<f64> {
        let fen = &self.positions[index];
        let request = OracleRequest::new(fen.clone(), self.millis);
        let metric = self.metric;

        let mut attempt = 0;
        loop {
            let value = self
                .oracle
                .evaluate(BinaryId::Candidate, &request)
                .and_then(|eval| {
                    eval.statistic(metric).ok_or_else(|| TuneError::Protocol {
                        binary: BinaryId::Candidate.to_string(),
                        fen: fen.clone(),
                        reason: format!("no '{}' in response", metric),
                        raw: eval.raw.clone(),
                    })
                });

            match value {
                Ok(value) => return Ok(value),
                Err(e) if e.fails_stage() && attempt < self.retries => {
                    attempt += 1;
                    log::warn!("{} (retry {}/{})", e, attempt, self.retries);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Measures the starting vector. An interrupt here still writes `best` back.
    pub fn start(&mut self, best: BestState) -> Result<CutoffState> {
        let best_value = match self.measure(&best.parameters) {
            Ok(value) => value,
            Err(TuneError::Interrupted) => {
                self.audit(&format!("{} training interrupted.", self.metric))?;
                self.workspace.finish(&best)?;
                return Err(TuneError::Interrupted);
            }
            Err(e) => return Err(e),
        };

        self.audit(&format!("=== Training {} constants ===", self.metric))?;
        self.audit(&format!("Initial average {}: {:.2}", self.metric, best_value))?;

        Ok(CutoffState {
            best,
            best_value,
            accepted: 0,
            steps: 0,
        })
    }

    /// One mutation; returns whether it was kept.
    pub fn step<R: Rng>(&mut self, state: &mut CutoffState, rng: &mut R) -> Result<bool> {
        let noise = self.schedule.scale(state.accepted);
        let candidate = self.plan.mutate(&state.best.parameters, noise, rng);
        let value = self.measure(&candidate)?;

        if !self.direction.improves(value, state.best_value) {
            self.audit(&format!(
                "Mutated constants did not improve average {}. Discarding mutations.",
                self.metric
            ))?;
            return Ok(false);
        }

        self.audit(&format!(
            "Mutated constants improved average {}: {:.2} vs {:.2}. Updating best constants.",
            self.metric, value, state.best_value
        ))?;
        self.workspace
            .audit
            .record_changes(&state.best.parameters.scalar_changes(&candidate))?;

        state.best.parameters = candidate;
        state.best_value = value;
        state.accepted += 1;
        self.workspace.commit(&state.best)?;

        Ok(true)
    }

    pub fn run<R: Rng>(
        &mut self,
        state: &mut CutoffState,
        rng: &mut R,
        max_steps: Option<u64>,
    ) -> Result<RunSummary> {
        let mut failure = None;

        while max_steps.is_none_or(|max| state.steps < max) {
            state.steps += 1;
            self.audit(&format!("=== {} Training Step {} ===", self.metric, state.steps))?;
            self.audit(&format!("{} successful mutations so far.", state.accepted))?;

            match self.step(state, rng) {
                Ok(_) => {}
                Err(TuneError::Interrupted) => {
                    self.audit(&format!("{} training interrupted.", self.metric))?;
                    break;
                }
                Err(e) => {
                    self.audit(&format!("Error during {} training: {}", self.metric, e))?;
                    failure = Some(e);
                    break;
                }
            }
        }

        self.audit(&format!(
            "Final average {}: {:.2} after {} successful mutations in {} steps.",
            self.metric, state.best_value, state.accepted, state.steps
        ))?;
        self.workspace.finish(&state.best)?;

        match failure {
            Some(e) => Err(e),
            None => Ok(RunSummary {
                steps: state.steps,
                accepted: state.accepted,
            }),
        }
    }
}
