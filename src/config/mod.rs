//! JSON configuration loading.
//!
//! A configuration root holds three parts:
//!
//! ```text
//! <root>/state_config.json          states and the initial state
//! <root>/event_generate_config/*.json  one event definition per file
//! <root>/trans_config/*.json           one transition rule per file
//! ```
//!
//! [`load`] accepts the root directory or the state file itself, in which
//! case the file's directory is the root. Files are read in sorted path
//! order, so rule registration order does not depend on the filesystem.

pub mod document;
pub mod error;

pub use error::ConfigError;

use crate::core::MachineDefinition;
use document::{EventDocument, StateDocument, TransitionDocument};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const STATE_CONFIG_FILE: &str = "state_config.json";
pub const EVENT_CONFIG_DIR: &str = "event_generate_config";
pub const TRANSITION_CONFIG_DIR: &str = "trans_config";

/// Load a machine definition from a configuration directory or state file.
pub fn load(path: impl AsRef<Path>) -> Result<MachineDefinition, ConfigError> {
    let path = path.as_ref();
    let (root, state_file) = if path.is_file() {
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        (root, path.to_path_buf())
    } else if path.is_dir() {
        (path.to_path_buf(), path.join(STATE_CONFIG_FILE))
    } else {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    };

    let states: StateDocument = read_json(&state_file)?;
    let events = load_events(&root.join(EVENT_CONFIG_DIR))?;
    let transitions = load_transitions(&root.join(TRANSITION_CONFIG_DIR))?;

    debug!(
        root = %root.display(),
        states = states.states.len(),
        events = events.len(),
        transitions = transitions.len(),
        "configuration loaded"
    );

    Ok(MachineDefinition {
        states: states.states.into_iter().map(Into::into).collect(),
        initial_state: states.initial_state,
        transitions: transitions.into_iter().map(Into::into).collect(),
        events: events.into_iter().map(Into::into).collect(),
    })
}

/// Parse a single-document [`MachineDefinition`].
pub fn from_json_str(json: &str) -> Result<MachineDefinition, ConfigError> {
    serde_json::from_str(json).map_err(|source| ConfigError::Json {
        path: PathBuf::from("<inline>"),
        source,
    })
}

fn load_events(dir: &Path) -> Result<Vec<EventDocument>, ConfigError> {
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "no event definition directory");
        return Ok(Vec::new());
    }
    json_files(dir)?.iter().map(|file| read_json(file)).collect()
}

fn load_transitions(dir: &Path) -> Result<Vec<TransitionDocument>, ConfigError> {
    let files = if dir.is_dir() {
        json_files(dir)?
    } else {
        Vec::new()
    };
    if files.is_empty() {
        return Err(ConfigError::NoTransitions(dir.to_path_buf()));
    }
    files.iter().map(|file| read_json(file)).collect()
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let io_error = |source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}
