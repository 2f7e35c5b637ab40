use super::{GameResult, GameState, SideStats};
use crate::engine::{BinaryId, EngineOracle, OracleRequest};
use crate::error::{Result, TuneError};
use shakmaty::Color;

/// Plays one game between two binaries, asking the oracle for every move.
#[derive(Debug, Clone)]
pub struct Referee {
    pub millis: u64,
}

impl Referee {
    pub fn new(millis: u64) -> Self {
        Self { millis }
    }

    /// Errors from here end the run; there is no partial result for a broken game.
    pub fn play_game<O: EngineOracle>(
        &self,
        oracle: &mut O,
        fen: &str,
        candidate_white: bool,
        candidate: BinaryId,
        opponent: BinaryId,
    ) -> Result<GameResult> {
        let mut state = GameState::from_fen(fen)?;
        let mut candidate_stats = SideStats::default();
        let mut opponent_stats = SideStats::default();

        let (termination, winner) = loop {
            if let Some(end) = state.termination() {
                break end;
            }

            let candidate_to_move = (state.turn() == Color::White) == candidate_white;
            let id = if candidate_to_move { candidate } else { opponent };

            let request =
                OracleRequest::new(state.fen(), self.millis).with_history(state.history().to_vec());
            let eval = oracle.evaluate(id, &request)?;

            if candidate_to_move {
                candidate_stats.record(eval.time, eval.depth);
            } else {
                opponent_stats.record(eval.time, eval.depth);
            }

            if let Err(reason) = state.play_uci(&eval.best_move) {
                log::error!("{} suggested '{}': {}", id, eval.best_move, reason);
                return Err(TuneError::IllegalMove {
                    binary: id.to_string(),
                    fen: state.fen(),
                    suggested: if eval.best_move.is_empty() {
                        "<none>".to_string()
                    } else {
                        eval.best_move.clone()
                    },
                    raw: eval.raw,
                });
            }

            log::trace!(
                "{} played {} (depth {}, {:.0} ms)",
                id,
                eval.best_move,
                eval.depth,
                eval.elapsed_millis()
            );
            if let Some(side) = eval.mate_for() {
                log::debug!("{} sees a forced mate for {}", id, side);
            }
        };

        let white_score = match winner {
            Some(Color::White) => 1,
            Some(Color::Black) => -1,
            None => 0,
        };

        if termination.is_draw() {
            log::debug!("Draw by {}", termination);
        }

        Ok(GameResult {
            final_fen: state.fen(),
            white_score,
            moves_played: state.plies() as u32,
            termination,
            candidate_white,
            candidate: candidate_stats,
            opponent: opponent_stats,
        })
    }
}
