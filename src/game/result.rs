use strum_macros::Display;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum Termination {
    #[strum(serialize = "checkmate")]
    Checkmate,
    #[strum(serialize = "stalemate")]
    Stalemate,
    #[strum(serialize = "insufficient material")]
    InsufficientMaterial,
    #[strum(serialize = "75-move rule")]
    SeventyFiveMoves,
    #[strum(serialize = "fivefold repetition")]
    FivefoldRepetition,
    #[strum(serialize = "50-move rule")]
    FiftyMoves,
    #[strum(serialize = "threefold repetition")]
    ThreefoldRepetition,
}

impl Termination {
    pub fn is_draw(&self) -> bool {
        !matches!(self, Termination::Checkmate)
    }
}

/// Time and depth one side accumulated over a game.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SideStats {
    /// Seconds, as reported by the engine.
    pub total_time: f64,
    pub total_depth: u64,
    pub moves: u32,
}

impl SideStats {
    pub fn record(&mut self, time: f64, depth: u32) {
        self.total_time += time;
        self.total_depth += depth as u64;
        self.moves += 1;
    }

    pub fn average_depth(&self) -> f64 {
        if self.moves == 0 {
            0.0
        } else {
            self.total_depth as f64 / self.moves as f64
        }
    }

    pub fn average_time(&self) -> f64 {
        if self.moves == 0 {
            0.0
        } else {
            self.total_time / self.moves as f64
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GameResult {
    pub final_fen: String,
    /// +1 white won, -1 black won, 0 draw.
    pub white_score: i8,
    pub moves_played: u32,
    pub termination: Termination,
    pub candidate_white: bool,
    pub candidate: SideStats,
    pub opponent: SideStats,
}

impl GameResult {
    /// +1 candidate won, -1 candidate lost, 0 draw.
    pub fn candidate_score(&self) -> i8 {
        if self.candidate_white {
            self.white_score
        } else {
            -self.white_score
        }
    }
}
