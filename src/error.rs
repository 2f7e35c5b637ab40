use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop or derail an optimization step.
#[derive(Error, Debug)]
pub enum TuneError {
    /// The build step exited with a non-zero status (or could not be started).
    #[error("build of '{target}' failed (status {status:?}):\n{output}")]
    Build {
        target: String,
        status: Option<i32>,
        output: String,
    },

    /// The engine printed something that is not a valid response.
    #[error("engine '{binary}' returned a malformed response for {fen}: {reason}\nraw response:\n{raw}")]
    Protocol {
        binary: String,
        fen: String,
        reason: String,
        raw: String,
    },

    /// The engine process could not be spawned at all.
    #[error("could not run engine '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },

    /// The engine suggested a move the referee rejects.
    #[error("engine '{binary}' suggested an illegal move '{suggested}'\nboard FEN: {fen}\nraw response:\n{raw}")]
    IllegalMove {
        binary: String,
        fen: String,
        suggested: String,
        raw: String,
    },

    /// The checked-in artifact does not match the in-memory baseline.
    #[error("{} does not match the baseline parameters (first difference on line {line}):\n  on disk:  {on_disk}\n  expected: {expected}", path.display())]
    BaselineDrift {
        path: PathBuf,
        line: usize,
        on_disk: String,
        expected: String,
    },

    #[error("malformed artifact {}: {reason}", path.display())]
    Artifact { path: PathBuf, reason: String },

    #[error("invalid position '{fen}': {reason}")]
    Position { fen: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The operator asked us to stop.
    #[error("interrupted")]
    Interrupted,
}

impl TuneError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        TuneError::Io {
            path: path.into(),
            source,
        }
    }

    /// Errors that end the whole run (everything except interrupts).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TuneError::Interrupted)
    }

    /// Oracle failures outside of referee play only fail the current stage.
    pub fn fails_stage(&self) -> bool {
        matches!(self, TuneError::Protocol { .. } | TuneError::Spawn { .. })
    }
}

pub type Result<T> = std::result::Result<T, TuneError>;
