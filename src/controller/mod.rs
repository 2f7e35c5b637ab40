pub mod acceptance;
pub mod audit;
pub mod cutoff;
pub mod state;
pub mod tournament;

pub use acceptance::*;
pub use audit::*;
pub use cutoff::*;
pub use state::*;
pub use tournament::*;

use crate::engine::{BinaryId, BuildSource, EngineOracle};
use crate::error::{Result, TuneError};
use crate::params::{ParameterStore, ParameterVector};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Counters reported when a training loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub steps: u64,
    pub accepted: u64,
}

/// The files a training loop owns, plus the stop flag it polls.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub store: ParameterStore,
    pub audit: AuditLog,
    /// Where the build step reads the constants from.
    pub artifact: PathBuf,
    /// Copy of the best constants, rewritten on every acceptance.
    pub best_artifact: PathBuf,
    pub state: PathBuf,
    pub stop: Arc<AtomicBool>,
}

impl Workspace {
    pub fn interrupted(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn check_interrupt(&self) -> Result<()> {
        if self.interrupted() {
            Err(TuneError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Ctrl-C reaches child processes too, so anything failing after the flag was
    /// raised is reported as the interrupt itself.
    pub fn interrupt_or(&self, error: TuneError) -> TuneError {
        if self.interrupted() {
            TuneError::Interrupted
        } else {
            error
        }
    }

    pub fn install<O: EngineOracle>(
        &self,
        oracle: &mut O,
        id: BinaryId,
        parameters: &ParameterVector,
        debug: bool,
    ) {
        oracle.install(
            id,
            BuildSource::Artifact {
                text: self.store.materialize(parameters),
                debug,
            },
        );
    }

    /// Persists a freshly accepted best state.
    pub fn commit(&self, best: &BestState) -> Result<()> {
        self.store.write(&self.best_artifact, &best.parameters)?;
        best.save(&self.state)
    }

    /// Leaves the best constants in the main artifact and drops the extra copy.
    pub fn finish(&self, best: &BestState) -> Result<()> {
        self.store.write(&self.artifact, &best.parameters)?;
        best.save(&self.state)?;
        log::info!("Final best constants written to {}", self.artifact.display());

        if self.best_artifact.exists() {
            fs::remove_file(&self.best_artifact)
                .map_err(|e| TuneError::io(&self.best_artifact, e))?;
        }
        Ok(())
    }
}
