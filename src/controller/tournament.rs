use crate::engine::{BinaryId, EngineOracle};
use crate::error::{Result, TuneError};
use crate::game::{GameResult, Referee};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TournamentResult {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub total_games: u32,
    pub passed: bool,
    /// Stopped before the last game, because the threshold became unreachable
    /// or the binaries could not be identified.
    pub aborted: bool,
}

impl TournamentResult {
    pub fn games_played(&self) -> u32 {
        self.wins + self.losses + self.draws
    }

    pub fn score(&self) -> i32 {
        self.wins as i32 - self.losses as i32
    }

    fn record(&mut self, game: &GameResult) {
        match game.candidate_score() {
            1 => self.wins += 1,
            -1 => self.losses += 1,
            _ => self.draws += 1,
        }
    }

    /// Even winning every remaining game cannot beat `threshold`.
    fn is_hopeless(&self, threshold: i32) -> bool {
        let remaining = (self.total_games - self.games_played()) as i32;
        remaining + self.score() <= threshold
    }
}

/// Plays every opening twice, candidate first as white, in a fixed order.
pub struct TournamentRunner {
    referee: Referee,
    positions: Vec<String>,
    stop: Arc<AtomicBool>,
}

impl TournamentRunner {
    pub fn new(referee: Referee, positions: Vec<String>, stop: Arc<AtomicBool>) -> Self {
        Self {
            referee,
            positions,
            stop,
        }
    }

    pub fn total_games(&self) -> u32 {
        self.positions.len() as u32 * 2
    }

    /// A stage tournament: gives up as soon as `threshold` cannot be exceeded.
    /// Identification failures fail the stage instead of the run.
    pub fn run<O: EngineOracle>(
        &self,
        oracle: &mut O,
        candidate: BinaryId,
        opponent: BinaryId,
        threshold: i32,
    ) -> Result<TournamentResult> {
        for id in [candidate, opponent] {
            match oracle.identify(id) {
                Ok(banner) => log::info!("{}: {}", id, banner),
                Err(e) if e.fails_stage() => {
                    log::warn!("Could not identify {}: {}", id, e);
                    return Ok(TournamentResult {
                        total_games: self.total_games(),
                        aborted: true,
                        ..Default::default()
                    });
                }
                Err(e) => return Err(e),
            }
        }

        self.play(oracle, candidate, opponent, Some(threshold))
    }

    /// Plays every game regardless of the score, e.g. to measure a baseline.
    pub fn run_full<O: EngineOracle>(
        &self,
        oracle: &mut O,
        candidate: BinaryId,
        opponent: BinaryId,
    ) -> Result<TournamentResult> {
        for id in [candidate, opponent] {
            log::info!("{}: {}", id, oracle.identify(id)?);
        }

        self.play(oracle, candidate, opponent, None)
    }

    fn play<O: EngineOracle>(
        &self,
        oracle: &mut O,
        candidate: BinaryId,
        opponent: BinaryId,
        threshold: Option<i32>,
    ) -> Result<TournamentResult> {
        let start = Instant::now();
        let mut result = TournamentResult {
            total_games: self.total_games(),
            ..Default::default()
        };

        let games = self
            .positions
            .iter()
            .flat_map(|fen| [(fen, true), (fen, false)]);

        for (i, (fen, candidate_white)) in games.enumerate() {
            if self.stop.load(Ordering::Relaxed) {
                return Err(TuneError::Interrupted);
            }

            log::info!(
                "Game {}/{}: {} v {} ({})",
                i + 1,
                result.total_games,
                candidate,
                opponent,
                threshold.map_or("-".to_string(), |t| t.to_string())
            );

            // Ctrl-C also kills the engine mid-move; that is not the engine's fault.
            let game = self
                .referee
                .play_game(oracle, fen, candidate_white, candidate, opponent)
                .map_err(|e| {
                    if self.stop.load(Ordering::Relaxed) {
                        TuneError::Interrupted
                    } else {
                        e
                    }
                })?;
            result.record(&game);

            log::info!("End FEN: {}", game.final_fen);
            log::info!(
                "Time {}: {:.2}s ({:.3}s/move), {}: {:.2}s ({:.3}s/move)",
                candidate,
                game.candidate.total_time,
                game.candidate.average_time(),
                opponent,
                game.opponent.total_time,
                game.opponent.average_time()
            );
            log::info!(
                "Avg depth {}: {:.2}, {}: {:.2}",
                candidate,
                game.candidate.average_depth(),
                opponent,
                game.opponent.average_depth()
            );
            log::info!(
                "Result: {} by {} ({}W/{}L/{}D)",
                match game.candidate_score() {
                    1 => "Win",
                    -1 => "Loss",
                    _ => "Draw",
                },
                game.termination,
                result.wins,
                result.losses,
                result.draws
            );

            if let Some(threshold) = threshold {
                if result.games_played() < result.total_games && result.is_hopeless(threshold) {
                    log::info!("Stopping tournament, the required score is out of reach.");
                    result.aborted = true;
                    return Ok(result);
                }
            }
        }

        result.passed = threshold.is_none_or(|t| result.score() > t);

        log::info!(
            "Tournament completed in {:.2} seconds: {}W/{}L/{}D, score {}",
            start.elapsed().as_secs_f64(),
            result.wins,
            result.losses,
            result.draws,
            result.score()
        );

        Ok(result)
    }
}
