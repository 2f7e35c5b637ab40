//! Rendering and parsing of the constants file the engine is compiled from.
//!
//! The file has three sections: scalar `#define`s, `const int` tables and an opaque
//! block of precomputed hash constants. The first two are ours to rewrite, the last
//! one is copied through untouched.

use super::{ParamValue, ParameterVector};
use crate::error::{Result, TuneError};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const INCLUDE_LINE: &str = "#include <inttypes.h>";
const SCALAR_HEADING: &str = "// Constant parameters";
const TABLE_HEADING: &str = "// Piece square values";

static DEFINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#define (\w+) (-?\d+)$").unwrap());
static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^const int (\w+)\[\] = \{(.*)\};$").unwrap());

#[derive(Debug, Clone)]
pub struct ParameterStore {
    hash_block: String,
}

impl ParameterStore {
    pub fn new(hash_block: impl Into<String>) -> Self {
        Self {
            hash_block: hash_block.into(),
        }
    }

    /// Opens a checked-in artifact, keeping its hash block for every later render.
    pub fn open(path: &Path) -> Result<(Self, ParameterVector)> {
        let text = fs::read_to_string(path).map_err(|e| TuneError::io(path, e))?;
        let (vector, hash_block) = parse_artifact(&text, path)?;

        Ok((Self::new(hash_block), vector))
    }

    pub fn hash_block(&self) -> &str {
        &self.hash_block
    }

    pub fn materialize(&self, vector: &ParameterVector) -> String {
        let mut defines = String::new();
        let mut tables = String::new();

        for param in vector.iter() {
            match &param.value {
                ParamValue::Scalar(value) => {
                    defines.push_str(&format!("#define {} {}\n", param.name, value));
                }
                ParamValue::Table(values) => {
                    let joined = values
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    tables.push_str(&format!("const int {}[] = {{{}}};\n", param.name, joined));
                }
            }
        }

        let mut text = format!("{}\n\n", INCLUDE_LINE);
        text.push_str(&format!("{}\n{}\n", SCALAR_HEADING, defines));
        text.push_str(&format!("{}\n{}\n", TABLE_HEADING, tables));
        text.push_str(&self.hash_block);
        text.push('\n');
        text
    }

    /// Reads scalars and tables back from an artifact; the hash block is ignored.
    pub fn load(path: &Path) -> Result<ParameterVector> {
        let text = fs::read_to_string(path).map_err(|e| TuneError::io(path, e))?;
        parse_artifact(&text, path).map(|(vector, _)| vector)
    }

    /// Renders `vector` to `path`, returning the text that was written.
    pub fn write(&self, path: &Path, vector: &ParameterVector) -> Result<String> {
        let text = self.materialize(vector);
        fs::write(path, &text).map_err(|e| TuneError::io(path, e))?;
        Ok(text)
    }

    /// Fails unless the artifact at `path` is exactly what `baseline` renders to.
    pub fn verify_baseline(&self, path: &Path, baseline: &ParameterVector) -> Result<()> {
        let on_disk = fs::read_to_string(path).map_err(|e| TuneError::io(path, e))?;
        let expected = self.materialize(baseline);

        if on_disk == expected {
            return Ok(());
        }

        let mut disk_lines = on_disk.lines();
        let mut expected_lines = expected.lines();
        let mut line = 1;
        loop {
            match (disk_lines.next(), expected_lines.next()) {
                (Some(a), Some(b)) if a == b => line += 1,
                (a, b) => {
                    return Err(TuneError::BaselineDrift {
                        path: path.to_path_buf(),
                        line,
                        on_disk: a.unwrap_or("<end of file>").to_string(),
                        expected: b.unwrap_or("<end of file>").to_string(),
                    });
                }
            }
        }
    }
}

fn next_line<'a>(rest: &mut &'a str) -> Option<&'a str> {
    if rest.is_empty() {
        return None;
    }

    match rest.find('\n') {
        Some(i) => {
            let line = &rest[..i];
            *rest = &rest[i + 1..];
            Some(line)
        }
        None => {
            let line = *rest;
            *rest = "";
            Some(line)
        }
    }
}

fn expect_line(rest: &mut &str, expected: &str, path: &Path) -> Result<()> {
    match next_line(rest) {
        Some(line) if line == expected => Ok(()),
        other => Err(malformed(
            path,
            format!("expected '{}', found '{}'", expected, other.unwrap_or("<end of file>")),
        )),
    }
}

fn malformed(path: &Path, reason: String) -> TuneError {
    TuneError::Artifact {
        path: PathBuf::from(path),
        reason,
    }
}

/// Splits an artifact into its parameters and its verbatim hash block.
pub fn parse_artifact(text: &str, path: &Path) -> Result<(ParameterVector, String)> {
    let mut rest = text;
    let mut vector = ParameterVector::new();

    expect_line(&mut rest, INCLUDE_LINE, path)?;
    expect_line(&mut rest, "", path)?;
    expect_line(&mut rest, SCALAR_HEADING, path)?;

    loop {
        let line = next_line(&mut rest)
            .ok_or_else(|| malformed(path, "unterminated scalar section".to_string()))?;
        if line.is_empty() {
            break;
        }

        let caps = DEFINE_RE
            .captures(line)
            .ok_or_else(|| malformed(path, format!("not a scalar definition: '{}'", line)))?;
        let value = caps[2]
            .parse::<i64>()
            .map_err(|e| malformed(path, format!("{}: {}", &caps[1], e)))?;
        vector.push(&caps[1], ParamValue::Scalar(value))?;
    }

    expect_line(&mut rest, TABLE_HEADING, path)?;

    loop {
        let line = next_line(&mut rest)
            .ok_or_else(|| malformed(path, "unterminated table section".to_string()))?;
        if line.is_empty() {
            break;
        }

        let caps = TABLE_RE
            .captures(line)
            .ok_or_else(|| malformed(path, format!("not a table definition: '{}'", line)))?;
        let values = caps[2]
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| v.parse::<i64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| malformed(path, format!("{}: {}", &caps[1], e)))?;
        vector.push(&caps[1], ParamValue::Table(values))?;
    }

    let hash_block = rest.strip_suffix('\n').unwrap_or(rest).to_string();

    Ok((vector, hash_block))
}
