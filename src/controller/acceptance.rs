//! Two-stage hill climbing.
//!
//! ```text
//! Idle -> BuildBest -> BuildCandidate -> StageA -> StageB -> Commit
//!                                          |         |
//!                                          +---------+-----> Discard
//! ```
//!
//! Stage A plays the candidate against the current best and needs a positive score.
//! Stage B plays it against the fixed reference version and needs to beat the best
//! score recorded so far against that same reference.

use super::{BestState, RunSummary, TournamentRunner, Workspace};
use crate::engine::{BinaryId, BuildSource, EngineOracle};
use crate::error::{Result, TuneError};
use crate::params::{MutationPlan, ParameterVector};
use rand::Rng;
use strum_macros::Display;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum Phase {
    Idle,
    BuildBest,
    BuildCandidate,
    StageA,
    StageB,
    Commit,
    Discard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted { reference_score: i32 },
    Rejected { at: Phase, score: i32 },
}

pub struct AcceptanceController<O: EngineOracle> {
    oracle: O,
    workspace: Workspace,
    runner: TournamentRunner,
    plan: MutationPlan,
    noise: f64,
    reference: String,
    summary: RunSummary,
}

impl<O: EngineOracle> AcceptanceController<O> {
    pub fn new(
        mut oracle: O,
        workspace: Workspace,
        runner: TournamentRunner,
        plan: MutationPlan,
        noise: f64,
        reference: String,
    ) -> Self {
        oracle.install(BinaryId::Reference, BuildSource::Version(reference.clone()));

        Self {
            oracle,
            workspace,
            runner,
            plan,
            noise,
            reference,
            summary: RunSummary::default(),
        }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    fn audit(&self, message: &str) -> Result<()> {
        self.workspace.audit.log(message)
    }

    /// Measures the starting vector against the reference with a full tournament.
    pub fn calibrate(&mut self, best: &mut BestState) -> Result<i32> {
        self.audit(&format!("Calculating baseline score against {}...", self.reference))?;

        self.workspace
            .install(&mut self.oracle, BinaryId::Best, &best.parameters, false);
        let result = match self
            .runner
            .run_full(&mut self.oracle, BinaryId::Best, BinaryId::Reference)
            .map_err(|e| self.workspace.interrupt_or(e))
        {
            Ok(result) => result,
            Err(TuneError::Interrupted) => {
                self.audit("Training interrupted.")?;
                self.workspace.finish(best)?;
                return Err(TuneError::Interrupted);
            }
            Err(e) => return Err(e),
        };

        best.reference_score = result.score();
        best.save(&self.workspace.state)?;

        self.audit(&format!(
            "Baseline score against {}: {}",
            self.reference, best.reference_score
        ))?;
        Ok(best.reference_score)
    }

    /// One mutation, judged to the end. `best` only changes on [`Verdict::Accepted`].
    pub fn step<R: Rng>(&mut self, best: &mut BestState, rng: &mut R) -> Result<Verdict> {
        let mut phase = Phase::Idle;
        let mut candidate = ParameterVector::new();
        let mut rejected_at = Phase::Idle;
        let mut score = 0;

        loop {
            if phase != Phase::Commit {
                self.workspace.check_interrupt()?;
            }
            log::debug!("Phase: {}", phase);

            phase = match phase {
                Phase::Idle => {
                    candidate = self.plan.mutate(&best.parameters, self.noise, rng);
                    Phase::BuildBest
                }
                Phase::BuildBest => {
                    self.workspace
                        .install(&mut self.oracle, BinaryId::Best, &best.parameters, false);
                    self.oracle
                        .prepare(BinaryId::Best)
                        .map_err(|e| self.workspace.interrupt_or(e))?;
                    Phase::BuildCandidate
                }
                Phase::BuildCandidate => {
                    self.workspace
                        .install(&mut self.oracle, BinaryId::Candidate, &candidate, false);
                    self.oracle
                        .prepare(BinaryId::Candidate)
                        .map_err(|e| self.workspace.interrupt_or(e))?;
                    Phase::StageA
                }
                Phase::StageA => {
                    log::info!("Playing tournament between best and mutated constants...");
                    let result =
                        self.runner
                            .run(&mut self.oracle, BinaryId::Candidate, BinaryId::Best, 0)?;
                    score = result.score();

                    if result.passed {
                        self.audit(&format!(
                            "Mutated constants outperformed best constants. Now testing against {}...",
                            self.reference
                        ))?;
                        Phase::StageB
                    } else {
                        self.audit("Mutated constants did not outperform best constants. Discarding mutations.")?;
                        rejected_at = Phase::StageA;
                        Phase::Discard
                    }
                }
                Phase::StageB => {
                    let result = self.runner.run(
                        &mut self.oracle,
                        BinaryId::Candidate,
                        BinaryId::Reference,
                        best.reference_score,
                    )?;
                    score = result.score();

                    if result.passed {
                        Phase::Commit
                    } else {
                        self.audit(&format!(
                            "Mutated constants did not outperform best constants against {}. Discarding mutations.",
                            self.reference
                        ))?;
                        rejected_at = Phase::StageB;
                        Phase::Discard
                    }
                }
                Phase::Commit => {
                    self.audit(&format!(
                        "Mutated constants outperformed {}! Updating best constants. New best score against {}: {}",
                        self.reference, self.reference, score
                    ))?;
                    self.workspace
                        .audit
                        .record_changes(&best.parameters.scalar_changes(&candidate))?;

                    best.parameters = candidate;
                    best.reference_score = score;
                    self.workspace.commit(best)?;

                    return Ok(Verdict::Accepted {
                        reference_score: score,
                    });
                }
                Phase::Discard => {
                    return Ok(Verdict::Rejected {
                        at: rejected_at,
                        score,
                    });
                }
            };
        }
    }

    /// Steps until interrupted, until `max_steps` or until a fatal error. The best
    /// state is written back to the main artifact on the way out.
    pub fn run<R: Rng>(
        &mut self,
        best: &mut BestState,
        rng: &mut R,
        max_steps: Option<u64>,
    ) -> Result<RunSummary> {
        while max_steps.is_none_or(|max| self.summary.steps < max) {
            self.summary.steps += 1;
            self.audit(&format!("=== Training Step {} ===", self.summary.steps))?;
            self.audit(&format!(
                "{} successful mutations so far.",
                self.summary.accepted
            ))?;

            match self.step(best, rng) {
                Ok(Verdict::Accepted { .. }) => self.summary.accepted += 1,
                Ok(Verdict::Rejected { .. }) => {}
                Err(TuneError::Interrupted) => {
                    self.audit("Training interrupted.")?;
                    break;
                }
                Err(e) => {
                    self.audit(&format!("Error during training step: {}", e))?;
                    if let Err(flush) = self.workspace.finish(best) {
                        log::warn!("Could not write back the best constants: {}", flush);
                    }
                    return Err(e);
                }
            }
        }

        self.workspace.finish(best)?;
        Ok(self.summary)
    }
}
