use super::{
    BinaryId, BuildSource, Builder, EngineOracle, Evaluation, OracleRequest, parse_response,
};
use crate::error::{Result, TuneError};
use fxhash::FxHashMap;
use std::path::PathBuf;
use std::process::Command;

/// Runs every request as a fresh engine process.
pub struct ProcessOracle<B: Builder> {
    builder: B,
    sources: FxHashMap<BinaryId, BuildSource>,
    // What each executable was last built from.
    built: FxHashMap<BinaryId, (BuildSource, PathBuf)>,
    send_history: bool,
}

impl<B: Builder> ProcessOracle<B> {
    pub fn new(builder: B, send_history: bool) -> Self {
        Self {
            builder,
            sources: FxHashMap::default(),
            built: FxHashMap::default(),
            send_history,
        }
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    fn executable(&mut self, id: BinaryId) -> Result<PathBuf> {
        self.prepare(id)?;
        self.built
            .get(&id)
            .map(|(_, path)| path.clone())
            .ok_or_else(|| TuneError::Config(format!("no executable for '{}'", id)))
    }
}

impl<B: Builder> EngineOracle for ProcessOracle<B> {
    fn install(&mut self, id: BinaryId, source: BuildSource) {
        self.sources.insert(id, source);
    }

    fn prepare(&mut self, id: BinaryId) -> Result<()> {
        let source = self
            .sources
            .get(&id)
            .ok_or_else(|| TuneError::Config(format!("nothing installed for '{}'", id)))?;

        if let Some((built_from, _)) = self.built.get(&id) {
            if built_from == source {
                return Ok(());
            }
        }

        let path = self.builder.build(id, source)?;
        self.built.insert(id, (source.clone(), path));
        Ok(())
    }

    fn identify(&mut self, id: BinaryId) -> Result<String> {
        let path = self.executable(id)?;

        let output = Command::new(&path)
            .arg("--version")
            .output()
            .map_err(|source| TuneError::Spawn {
                binary: path.display().to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let banner = stdout.lines().next().unwrap_or("").trim().to_string();

        if !output.status.success() || banner.is_empty() {
            return Err(TuneError::Protocol {
                binary: id.to_string(),
                fen: "-".to_string(),
                reason: format!("--version failed ({})", output.status),
                raw: format!("{}{}", stdout, String::from_utf8_lossy(&output.stderr)),
            });
        }

        Ok(banner)
    }

    fn evaluate(&mut self, id: BinaryId, request: &OracleRequest) -> Result<Evaluation> {
        let path = self.executable(id)?;

        let mut command = Command::new(&path);
        command
            .arg("play")
            .arg(&request.fen)
            .arg(request.millis.to_string());
        if self.send_history && !request.history.is_empty() {
            command.arg(request.history.join(","));
        }

        log::trace!("{} play \"{}\" {}", path.display(), request.fen, request.millis);

        let output = command.output().map_err(|source| TuneError::Spawn {
            binary: path.display().to_string(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        log::trace!("{}", stdout.trim_end());

        if !output.status.success() {
            return Err(TuneError::Protocol {
                binary: id.to_string(),
                fen: request.fen.clone(),
                reason: format!(
                    "engine exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
                raw: stdout.to_string(),
            });
        }

        parse_response(id, &request.fen, &stdout)
    }
}
