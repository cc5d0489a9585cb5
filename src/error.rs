//! Error types for SuriKiosk.
//!
//! Three families, none of which is ever fatal to the decision path:
//! - [`PatternError`]: a configured regular expression failed to compile; the
//!   pattern is dropped and the rest of the rule set stays active
//! - [`ConfigError`]: the TOML file could not be found, read or parsed
//! - [`WindowError`]: a transient platform failure while inspecting or
//!   correcting the kiosk window; retried on the next reconciliation tick
//!
//! Policy outcomes (blocked navigation, blocked key, window drift) are not
//! errors and never appear here.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A URL or exit pattern that is not a valid regular expression.
#[derive(Debug, Error, Clone)]
#[error("invalid pattern `{pattern}`: {source}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// Failure to load a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// `SURIKIOSK_CONFIG` is set but names no file; the search continues.
    #[error("SURIKIOSK_CONFIG does not point to a file: {}", path.display())]
    MissingOverride { path: PathBuf },
}

impl ConfigError {
    /// Whether the selected file itself was rejected.
    pub fn is_file_error(&self) -> bool {
        matches!(self, Self::Read { .. } | Self::Parse { .. })
    }
}

/// Transient failure reported by a [`crate::window::WindowControl`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// The native window handle is not available right now.
    #[error("window handle unavailable")]
    HandleUnavailable,

    /// A platform call failed.
    #[error("{call} failed: {reason}")]
    Platform { call: &'static str, reason: String },
}
