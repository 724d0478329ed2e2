//! Core library for odbcadmin.
//!
//! Locates, parses and mutates the ODBC configuration files (`odbc.ini` for
//! data sources, `odbcinst.ini` for drivers), models their contents as a
//! [`Registry`], and runs live connection tests through the installed
//! driver manager.
//!
//! # Security Guarantees
//! - Passwords never appear in logs, errors or displayed connection strings
//! - Credentials are zeroed on drop
//! - Malformed configuration content is preserved when files are rewritten
//!
//! # Architecture
//! - [`locator`] finds the files, [`ini`] reads and writes them
//! - [`registry`] validates and applies changes, always re-reading first
//! - [`probe`] talks to the driver manager behind the [`DriverManager`] trait

pub mod error;
pub mod ini;
pub mod locator;
pub mod logging;
pub mod probe;
pub mod registry;
pub mod security;

// Re-export commonly used types
pub use error::{EntryKind, OdbcAdminError, Result, redact_connection_string};
pub use locator::{
    Candidate, ConfigFileSet, ConfigKind, ConfigLocator, ConfigOverrides, PartialResolution,
    Provenance, ResolvedPath, SearchEnvironment,
};
pub use probe::{
    ConnectionProbeResult, ConnectionTester, CredentialPolicy, CredentialPrompt, DriverManager,
    ManagerChoice, ManagerKind, ProbeOutcome, TesterConfig,
};
pub use registry::{
    DataSourceDefinition, DriverDefinition, DriverResolution, LoadIssue, Registry,
};
pub use security::Credentials;
