use crate::error::{Result, TuneError};
use crate::params::ParameterVector;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Everything that survives from one acceptance step to the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestState {
    /// Score of `parameters` against the reference version.
    pub reference_score: i32,
    pub parameters: ParameterVector,
}

impl BestState {
    pub fn new(parameters: ParameterVector, reference_score: i32) -> Self {
        Self {
            reference_score,
            parameters,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| TuneError::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Writes through a temporary file so an interrupted save leaves the old state.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, json + "\n").map_err(|e| TuneError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| TuneError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tune_state.json");

        let mut parameters = ParameterVector::new();
        parameters.push("PAWN_VALUE", ParamValue::Scalar(113)).unwrap();
        parameters.push("PS_PAWN", ParamValue::Table(vec![0, 5, -5])).unwrap();
        let state = BestState::new(parameters, 12);

        state.save(&path).unwrap();
        assert_eq!(BestState::load(&path).unwrap(), state);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.find("reference_score").unwrap() < text.find("parameters").unwrap());
        assert!(!dir.path().join("tune_state.json.tmp").exists());
    }
}
