//! Compare an extraction against a hand-checked expected-values fixture.
//!
//! Fixtures live next to each other in one directory and are named after the
//! bill's base name: `GasInvoice_2025-12-04.pdf` → `GasInvoice_2025-12-04.pdf.exp`.
//! Each fixture is a JSON object with the same keys the schema produces.
//!
//! Values are compared exactly after one normalisation: JSON `null` on
//! either side becomes the string `"None"`, because extractors answer
//! "None" or null interchangeably for absent fields (refunds, TV fees).

use crate::error::BillError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Suffix appended to a subject's base name to find its fixture.
pub const EXPECTED_SUFFIX: &str = ".exp";

/// Path of the fixture for `filename` under `expected_dir`.
pub fn expected_path(expected_dir: &Path, filename: &str) -> PathBuf {
    expected_dir.join(format!("{filename}{EXPECTED_SUFFIX}"))
}

/// Load the expected-values fixture for `filename`.
pub fn load_expected(expected_dir: &Path, filename: &str) -> Result<Map<String, Value>, BillError> {
    let path = expected_path(expected_dir, filename);
    let text = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => BillError::FileNotFound { path: path.clone() },
        _ => BillError::ReadFailed {
            path: path.clone(),
            source: e,
        },
    })?;
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(BillError::InvalidInput {
            input: format!("{}: expected a JSON object", path.display()),
        }),
        Err(e) => Err(BillError::InvalidInput {
            input: format!("{}: {e}", path.display()),
        }),
    }
}

/// One row of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldComparison {
    pub field: String,
    pub extracted: Value,
    /// `None` when the fixture has no such key.
    pub expected: Option<Value>,
    pub matches: bool,
}

/// Field-by-field result for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Comparison {
    pub fields: Vec<FieldComparison>,
}

impl Comparison {
    pub fn mismatches(&self) -> usize {
        self.fields.iter().filter(|f| !f.matches).count()
    }

    pub fn is_clean(&self) -> bool {
        self.mismatches() == 0
    }
}

/// Compare every extracted key with the fixture, sorted by field name.
///
/// Keys missing from the fixture count as mismatches; fixture keys the
/// extraction did not produce are ignored.
pub fn compare(extracted: &Map<String, Value>, expected: &Map<String, Value>) -> Comparison {
    let fields = extracted
        .iter()
        .map(|(field, value)| {
            let extracted = normalise(value);
            let expected = expected.get(field).map(normalise);
            let matches = expected.as_ref() == Some(&extracted);
            FieldComparison {
                field: field.clone(),
                extracted,
                expected,
                matches,
            }
        })
        .collect();
    Comparison { fields }
}

fn normalise(value: &Value) -> Value {
    match value {
        Value::Null => Value::String("None".to_string()),
        other => other.clone(),
    }
}
