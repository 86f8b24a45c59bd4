//! Library surface of the `permit` binary: everything the subcommands do,
//! exposed as plain functions so tests can drive them without spawning
//! the binary.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Serialize;

use permit_core::{canonical_hash, Action, PermissionPayload, PermissionState, TableContext};

#[derive(Debug)]
pub enum CliError {
    Io(String),
    Json(String),
    Canonical(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Io(message) => write!(f, "io: {}", message),
            CliError::Json(message) => write!(f, "json: {}", message),
            CliError::Canonical(message) => write!(f, "canonical: {}", message),
        }
    }
}

impl std::error::Error for CliError {}

/// Outcome of `permit check`, printed as JSON.
#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub action: Action,
    pub valid: bool,
    pub problems: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_hash: Option<String>,
}

pub fn read_payload(path: &Path) -> Result<PermissionPayload, CliError> {
    let text = fs::read_to_string(path)
        .map_err(|err| CliError::Io(format!("{}: {}", path.display(), err)))?;
    serde_json::from_str(&text)
        .map_err(|err| CliError::Json(format!("{}: {}", path.display(), err)))
}

/// Decodes and validates one permission document. Problems are collected
/// rather than failing fast, so one run reports everything; the policy
/// hash is included whenever the document was at least loadable.
pub fn check_payload(
    path: &Path,
    action: Action,
    columns: &[String],
) -> Result<CheckReport, CliError> {
    let payload = read_payload(path)?;
    let ctx = TableContext::new(columns.to_vec());

    let mut problems = Vec::new();
    let state = match PermissionState::load(action, &payload) {
        Ok(state) => Some(state),
        Err(err) => {
            problems.push(err.to_string());
            None
        }
    };
    if let Some(state) = &state {
        if let Err(err) = state.validate(&ctx) {
            problems.push(err.to_string());
        }
    }

    let policy_hash = match &state {
        Some(state) => Some(
            canonical_hash(&state.compile())
                .map_err(|err| CliError::Canonical(err.to_string()))?,
        ),
        None => None,
    };

    Ok(CheckReport {
        action,
        valid: problems.is_empty(),
        problems,
        policy_hash,
    })
}

/// Re-emits a document in its compiled canonical form: filter shape
/// normalized, inapplicable fields dropped, stale root fields masked.
pub fn normalize_payload(path: &Path, action: Action) -> Result<String, CliError> {
    let payload = read_payload(path)?;
    let state =
        PermissionState::load(action, &payload).map_err(|err| CliError::Json(err.to_string()))?;
    serde_json::to_string_pretty(&state.compile())
        .map_err(|err| CliError::Json(err.to_string()))
}

/// Content hash of the document exactly as stored (canonical CBOR, so
/// key order and formatting do not matter).
pub fn hash_payload(path: &Path) -> Result<String, CliError> {
    let payload = read_payload(path)?;
    canonical_hash(&payload).map_err(|err| CliError::Canonical(err.to_string()))
}
