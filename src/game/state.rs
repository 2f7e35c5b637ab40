use super::{PositionHistory, Termination};
use crate::error::{Result, TuneError};
use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::zobrist::Zobrist64;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Position};

/// A game in progress: the current position plus everything needed for the draw rules.
#[derive(Clone, Debug)]
pub struct GameState {
    position: Chess,
    repetitions: PositionHistory,
    // FENs of every position reached, the current one last
    fens: Vec<String>,
}

impl GameState {
    pub fn from_fen(fen: &str) -> Result<Self> {
        let position_error = |reason: String| TuneError::Position {
            fen: fen.to_string(),
            reason,
        };

        let parsed: Fen = fen.trim().parse().map_err(|e| position_error(format!("{}", e)))?;
        let position: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| position_error(format!("{}", e)))?;

        let mut state = Self {
            position,
            repetitions: PositionHistory::new(),
            fens: Vec::new(),
        };
        state.record();
        Ok(state)
    }

    fn record(&mut self) {
        self.repetitions.push(self.zobrist_key());
        self.fens.push(self.fen());
    }

    fn zobrist_key(&self) -> u64 {
        key_of(&self.position)
    }

    pub fn fen(&self) -> String {
        Fen::from_position(&self.position, EnPassantMode::Legal).to_string()
    }

    pub fn turn(&self) -> Color {
        self.position.turn()
    }

    /// Positions before the current one, oldest first.
    pub fn history(&self) -> &[String] {
        &self.fens[..self.fens.len() - 1]
    }

    pub fn plies(&self) -> usize {
        self.fens.len() - 1
    }

    /// Plays `uci` if it is legal here; otherwise returns why not and leaves the game as is.
    pub fn play_uci(&mut self, uci: &str) -> std::result::Result<(), String> {
        let parsed: UciMove = uci.trim().parse().map_err(|e| format!("{}", e))?;
        let m = parsed.to_move(&self.position).map_err(|e| format!("{}", e))?;

        self.position.play_unchecked(m);
        self.record();
        Ok(())
    }

    /// Why the game is over, and who won, if it is. Draws that the side to move could
    /// claim end the game as well.
    pub fn termination(&self) -> Option<(Termination, Option<Color>)> {
        let key = self.zobrist_key();
        let halfmoves = self.position.halfmoves();

        if self.position.is_checkmate() {
            Some((Termination::Checkmate, Some(!self.position.turn())))
        } else if self.position.is_stalemate() {
            Some((Termination::Stalemate, None))
        } else if self.position.is_insufficient_material() {
            Some((Termination::InsufficientMaterial, None))
        } else if halfmoves >= 150 {
            Some((Termination::SeventyFiveMoves, None))
        } else if self.repetitions.is_fivefold_repetition(key) {
            Some((Termination::FivefoldRepetition, None))
        } else if self.can_claim_fifty_moves() {
            Some((Termination::FiftyMoves, None))
        } else if self.can_claim_threefold_repetition(key) {
            Some((Termination::ThreefoldRepetition, None))
        } else {
            None
        }
    }

    /// The clock is at 100, or a quiet move would take it there.
    fn can_claim_fifty_moves(&self) -> bool {
        let halfmoves = self.position.halfmoves();

        halfmoves >= 100
            || (halfmoves >= 99 && self.position.legal_moves().iter().any(|m| !m.is_zeroing()))
    }

    /// The position occurred three times, or some move reaches a position for the third time.
    fn can_claim_threefold_repetition(&self, key: u64) -> bool {
        if self.repetitions.is_threefold_repetition(key) {
            return true;
        }

        self.position.legal_moves().into_iter().any(|m| {
            let mut next = self.position.clone();
            next.play_unchecked(m);
            self.repetitions.count(key_of(&next)) >= 2
        })
    }
}

fn key_of(position: &Chess) -> u64 {
    position.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0
}
