use super::{BinaryId, BuildSource};
use crate::error::{Result, TuneError};
use std::env::consts::EXE_SUFFIX;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Turns a build source into an executable for a binary identity.
pub trait Builder {
    fn build(&mut self, id: BinaryId, source: &BuildSource) -> Result<PathBuf>;
}

/// Writes the artifact into the engine's source tree, runs the build command and
/// copies the result aside so the next build cannot overwrite it.
#[derive(Debug, Clone)]
pub struct MakeBuilder {
    /// Program and leading arguments, e.g. `make` or `make -j8`.
    pub command: Vec<String>,
    pub artifact_path: PathBuf,
    pub engine_binary: PathBuf,
    pub reference_binary: PathBuf,
    pub binary_dir: PathBuf,
    /// Extra build arguments for telemetry builds.
    pub debug_args: Vec<String>,
}

impl MakeBuilder {
    pub fn binary_path(&self, id: BinaryId) -> PathBuf {
        self.binary_dir.join(format!("sigma-zero-{}{}", id, EXE_SUFFIX))
    }

    fn run(&self, id: BinaryId, extra: &[String]) -> Result<()> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| TuneError::Config("empty build command".to_string()))?;

        log::debug!("{} {} {}", program, args.join(" "), extra.join(" "));

        let output = Command::new(program)
            .args(args)
            .args(extra)
            .output()
            .map_err(|e| TuneError::Build {
                target: id.to_string(),
                status: None,
                output: format!("failed to run '{}': {}", program, e),
            })?;

        if !output.status.success() {
            return Err(TuneError::Build {
                target: id.to_string(),
                status: output.status.code(),
                output: format!(
                    "{}{}",
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }

        Ok(())
    }

    fn copy_out(&self, id: BinaryId, produced: &Path) -> Result<PathBuf> {
        let destination = self.binary_path(id);
        fs::copy(produced, &destination).map_err(|e| TuneError::Build {
            target: id.to_string(),
            status: Some(0),
            output: format!(
                "could not copy {} to {}: {}",
                produced.display(),
                destination.display(),
                e
            ),
        })?;
        Ok(destination)
    }
}

impl Builder for MakeBuilder {
    fn build(&mut self, id: BinaryId, source: &BuildSource) -> Result<PathBuf> {
        match source {
            BuildSource::Artifact { text, debug } => {
                log::info!("Building {}{}...", id, if *debug { " (debug)" } else { "" });

                fs::write(&self.artifact_path, text)
                    .map_err(|e| TuneError::io(&self.artifact_path, e))?;

                let extra = if *debug { self.debug_args.clone() } else { Vec::new() };
                self.run(id, &extra)?;
                self.copy_out(id, &self.engine_binary)
            }
            BuildSource::Version(version) => {
                log::info!("Building {} from version {}...", id, version);

                self.run(id, std::slice::from_ref(version))?;
                self.copy_out(id, &self.reference_binary)
            }
        }
    }
}
