//! Error types with password redaction.
//!
//! Connection descriptors routinely carry `PWD=` attributes. Nothing in this
//! module ever formats a password into an error message; callers that need to
//! show a descriptor go through [`redact_connection_string`].

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::locator::ConfigKind;

/// Main error type for odbcadmin operations.
#[derive(Debug, Error)]
pub enum OdbcAdminError {
    /// Reading or writing a configuration file failed
    #[error("I/O operation failed: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// No candidate location holds the requested configuration file
    #[error("No {kind} file found (searched: {})", display_paths(.searched))]
    NotFound {
        kind: ConfigKind,
        searched: Vec<PathBuf>,
    },

    /// An entry with this name is already registered
    #[error("{kind} '{name}' already exists")]
    DuplicateName { kind: EntryKind, name: String },

    /// A data source references a driver that is not registered
    #[error("Data source '{dsn}' references unknown driver '{driver}'")]
    UnknownDriver { dsn: String, driver: String },

    /// Invalid input or configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The terminal could not provide the required interaction
    #[error("Terminal interaction failed: {context}")]
    Terminal {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results with OdbcAdminError
pub type Result<T> = std::result::Result<T, OdbcAdminError>;

/// The two kinds of registry entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A `[Name]` section in the DSN file
    DataSource,
    /// A `[Name]` section in the driver file
    Driver,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataSource => f.write_str("Data source"),
            Self::Driver => f.write_str("Driver"),
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "<none>".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl OdbcAdminError {
    /// Creates an I/O error that names the file involved
    pub fn io(action: &str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context: format!("Failed to {} {}", action, path.display()),
            source,
        }
    }

    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a duplicate-name error
    pub fn duplicate(kind: EntryKind, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            kind,
            name: name.into(),
        }
    }

    /// Creates an unknown-driver error
    pub fn unknown_driver(dsn: impl Into<String>, driver: impl Into<String>) -> Self {
        Self::UnknownDriver {
            dsn: dsn.into(),
            driver: driver.into(),
        }
    }

    /// Creates a terminal error
    pub fn terminal(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Terminal {
            context: context.into(),
            source,
        }
    }

    /// Whether the error should end the process rather than return to the menu.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Terminal { .. } | Self::NotFound { .. })
    }
}

/// Masks password attributes in an ODBC connection string.
///
/// Both `PWD` and `Password` keys are recognised, case-insensitively, and a
/// brace-quoted value is masked as a whole.
///
/// # Example
///
/// ```rust
/// use odbcadmin_core::error::redact_connection_string;
///
/// let sanitized = redact_connection_string("DSN=Prod;UID=dba;PWD={se;cret}");
/// assert_eq!(sanitized, "DSN=Prod;UID=dba;PWD=****");
/// assert!(!sanitized.contains("cret"));
/// ```
pub fn redact_connection_string(connection_string: &str) -> String {
    split_attributes(connection_string)
        .into_iter()
        .map(|attribute| match attribute.split_once('=') {
            Some((key, _)) if is_password_key(key) => format!("{}=****", key),
            _ => attribute.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Whether an attribute key holds a password.
pub fn is_password_key(key: &str) -> bool {
    let key = key.trim();
    key.eq_ignore_ascii_case("PWD") || key.eq_ignore_ascii_case("PASSWORD")
}

/// Splits on `;` outside of `{...}` quoting; `}}` inside braces is a
/// literal brace.
fn split_attributes(connection_string: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut braced = false;
    let mut start = 0;
    let mut chars = connection_string.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '{' if !braced => braced = true,
            '}' if braced => {
                if chars.next_if(|&(_, next)| next == '}').is_none() {
                    braced = false;
                }
            }
            ';' if !braced => {
                parts.push(&connection_string[start..idx]);
                start = idx.saturating_add(1);
            }
            _ => {}
        }
    }
    if start < connection_string.len() {
        parts.push(&connection_string[start..]);
    }
    parts
}
