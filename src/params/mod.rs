pub mod mutate;
pub mod store;

pub use mutate::*;
pub use store::*;

use crate::error::{Result, TuneError};
use regex::Regex;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_]\w*$").unwrap());

/// Parameters that steer move ordering; the single-metric variant tunes only these.
pub const CUTOFF_PARAMETERS: &[&str] = &[
    "PROMOTION_MOVE_SCORE",
    "KILLER_MOVE_BONUS",
    "PAWN_VICTIM_SCORE",
    "KNIGHT_VICTIM_SCORE",
    "BISHOP_VICTIM_SCORE",
    "ROOK_VICTIM_SCORE",
    "QUEEN_VICTIM_SCORE",
    "KING_VICTIM_SCORE",
    "PAWN_AGGRO_SCORE",
    "KNIGHT_AGGRO_SCORE",
    "BISHOP_AGGRO_SCORE",
    "ROOK_AGGRO_SCORE",
    "QUEEN_AGGRO_SCORE",
    "KING_AGGRO_SCORE",
    "SELECT_MOVE_CUTOFF",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(i64),
    Table(Vec<i64>),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Scalar(value) => write!(f, "{}", value),
            ParamValue::Table(values) => {
                let joined = values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "[{}]", joined)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub value: ParamValue,
}

/// A changed scalar, as recorded in the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarChange {
    pub name: String,
    pub old: i64,
    pub new: i64,
}

/// Ordered name -> value mapping. Order is significant: it is the order in which
/// the artifact lists the definitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParameterVector {
    params: Vec<Parameter>,
}

impl ParameterVector {
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Names must be C identifiers, since they end up as `#define`s and array names.
    pub fn push(&mut self, name: &str, value: ParamValue) -> Result<()> {
        if !NAME_RE.is_match(name) {
            return Err(TuneError::Config(format!(
                "parameter name '{}' is not a C identifier",
                name
            )));
        }
        if self.contains(name) {
            return Err(TuneError::Config(format!("duplicate parameter '{}'", name)));
        }

        self.params.push(Parameter {
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ParamValue> {
        self.params
            .iter_mut()
            .find(|p| p.name == name)
            .map(|p| &mut p.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Scalars whose value differs in `other`, in vector order. Tables are not diffed.
    pub fn scalar_changes(&self, other: &ParameterVector) -> Vec<ScalarChange> {
        self.params
            .iter()
            .filter_map(|p| match (&p.value, other.get(&p.name)) {
                (ParamValue::Scalar(old), Some(ParamValue::Scalar(new))) if old != new => {
                    Some(ScalarChange {
                        name: p.name.clone(),
                        old: *old,
                        new: *new,
                    })
                }
                _ => None,
            })
            .collect()
    }

    /// Reads a JSON object of `name: int | [int]` pairs, keeping file order.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| TuneError::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl Serialize for ParameterVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.params.len()))?;
        for param in &self.params {
            map.serialize_entry(&param.name, &param.value)?;
        }
        map.end()
    }
}

struct ParameterVectorVisitor;

impl<'de> Visitor<'de> for ParameterVectorVisitor {
    type Value = ParameterVector;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of parameter names to integers or integer arrays")
    }

    fn visit_map<A: MapAccess<'de>>(
        self,
        mut access: A,
    ) -> std::result::Result<Self::Value, A::Error> {
        let mut vector = ParameterVector::new();
        while let Some((name, value)) = access.next_entry::<String, ParamValue>()? {
            vector.push(&name, value).map_err(de::Error::custom)?;
        }
        Ok(vector)
    }
}

impl<'de> Deserialize<'de> for ParameterVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(ParameterVectorVisitor)
    }
}
