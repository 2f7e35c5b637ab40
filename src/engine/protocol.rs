//! Parsing of the engine's JSON answer to `play <fen> <millis>`.
//!
//! ```text
//! {
//!   "scores": { "e2e4": 0.31, ... },
//!   "millis": 100,
//!   "depth": 6,
//!   "time": 0.101,
//!   "eval": 0.31,
//!   "move": "e2e4"
//! }
//! ```
//!
//! `eval` is in pawns from white's point of view. Debug builds add telemetry
//! counters (`avg_cutoff_index`, ...) as extra top-level keys.

use super::BinaryId;
use crate::error::{Result, TuneError};
use serde::Deserialize;
use serde_json::{Map, Value};
use shakmaty::Color;
use strum_macros::{Display, EnumIter, EnumString};

/// Evaluations at or beyond this many centipawns mean a forced mate.
pub const MATE_THRESHOLD_CP: i64 = 1_000_000;

/// Statistics the single-metric variant can optimize.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumString, EnumIter)]
pub enum Metric {
    #[strum(serialize = "depth")]
    Depth,
    #[strum(serialize = "nodes")]
    Nodes,
    #[strum(serialize = "first_move_cutoff_%")]
    FirstMoveCutoffPercent,
    #[strum(serialize = "beta_cutoff_%")]
    BetaCutoffPercent,
    #[strum(serialize = "avg_cutoff_index")]
    AverageCutoffIndex,
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(rename = "move", default)]
    best_move: String,
    #[serde(default)]
    depth: u32,
    #[serde(default)]
    time: f64,
    #[serde(default)]
    eval: f64,
    nodes: Option<u64>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Suggested move in coordinate notation, empty if the engine sent none.
    pub best_move: String,
    pub depth: u32,
    /// White-relative, see [`MATE_THRESHOLD_CP`].
    pub eval_cp: i64,
    /// Seconds the engine reports having spent.
    pub time: f64,
    pub nodes: Option<u64>,
    /// Every other key of the response (telemetry counters, move scores).
    pub counters: Map<String, Value>,
    /// The response exactly as printed, kept for diagnostics.
    pub raw: String,
}

impl Evaluation {
    pub fn elapsed_millis(&self) -> f64 {
        self.time * 1000.0
    }

    /// The side with a forced mate, if the evaluation is the mate sentinel.
    pub fn mate_for(&self) -> Option<Color> {
        if self.eval_cp >= MATE_THRESHOLD_CP {
            Some(Color::White)
        } else if self.eval_cp <= -MATE_THRESHOLD_CP {
            Some(Color::Black)
        } else {
            None
        }
    }

    pub fn statistic(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Depth => Some(self.depth as f64),
            Metric::Nodes => self
                .nodes
                .map(|n| n as f64)
                .or_else(|| self.counter("nodes")),
            other => self.counter(&other.to_string()),
        }
    }

    fn counter(&self, key: &str) -> Option<f64> {
        self.counters.get(key).and_then(Value::as_f64)
    }
}

pub fn parse_response(binary: BinaryId, fen: &str, raw: &str) -> Result<Evaluation> {
    let protocol_error = |reason: String| TuneError::Protocol {
        binary: binary.to_string(),
        fen: fen.to_string(),
        reason,
        raw: raw.to_string(),
    };

    if raw.trim().is_empty() {
        return Err(protocol_error("empty response".to_string()));
    }

    let response: RawResponse =
        serde_json::from_str(raw.trim()).map_err(|e| protocol_error(e.to_string()))?;

    if !response.eval.is_finite() || !response.time.is_finite() {
        return Err(protocol_error("non-finite number".to_string()));
    }

    Ok(Evaluation {
        best_move: response.best_move,
        depth: response.depth,
        eval_cp: (response.eval * 100.0).round() as i64,
        time: response.time,
        nodes: response.nodes,
        counters: response.extra,
        raw: raw.to_string(),
    })
}
