//! Error types for batch evaluation and configuration loading.

use std::fmt;
use std::path::PathBuf;

use authz_eval::EvalError;
use thiserror::Error;

/// The four request slots of a batch template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Principal,
    Action,
    Resource,
    Context,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Slot::Principal => "principal",
            Slot::Action => "action",
            Slot::Resource => "resource",
            Slot::Context => "context",
        };
        f.write_str(name)
    }
}

/// Errors that halt a batch run.
///
/// Per-policy evaluation errors never show up here; they only make the
/// policy unsatisfied for that request.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BatchError {
    #[error("batch missing {0}")]
    MissingSlot(Slot),

    #[error("batch cancelled")]
    Cancelled,

    #[error("{slot} cannot be used in a request: {source}")]
    Conversion {
        slot: Slot,
        #[source]
        source: EvalError,
    },
}

/// Errors loading a [`crate::BatchConfig`]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
