pub mod builder;
pub mod process;
pub mod protocol;

pub use builder::*;
pub use process::*;
pub use protocol::*;

use crate::error::Result;
use strum_macros::Display;

/// The binaries an optimization run juggles. Each one owns its own executable path.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum BinaryId {
    /// Compiled from the current best parameters.
    Best,
    /// Compiled from the mutated parameters under test.
    Candidate,
    /// A fixed, older engine version everyone is measured against.
    Reference,
}

/// What a binary gets compiled from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildSource {
    /// The working tree, with this constants file and optionally the telemetry flag.
    Artifact { text: String, debug: bool },
    /// A tagged older version of the engine.
    Version(String),
}

/// One "play this position" request.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub fen: String,
    /// Earlier positions of the game, oldest first.
    pub history: Vec<String>,
    pub millis: u64,
}

impl OracleRequest {
    pub fn new(fen: impl Into<String>, millis: u64) -> Self {
        Self {
            fen: fen.into(),
            history: Vec::new(),
            millis,
        }
    }

    pub fn with_history(mut self, history: Vec<String>) -> Self {
        self.history = history;
        self
    }
}

/// Access to compiled engines. Builds are lazy and memoized per identity.
pub trait EngineOracle {
    /// Declares what `id` is compiled from; replaces any previous source.
    fn install(&mut self, id: BinaryId, source: BuildSource);

    /// Builds `id` unless a build of its current source already exists.
    fn prepare(&mut self, id: BinaryId) -> Result<()>;

    /// The engine's one-line version banner.
    fn identify(&mut self, id: BinaryId) -> Result<String>;

    fn evaluate(&mut self, id: BinaryId, request: &OracleRequest) -> Result<Evaluation>;
}
