//! Probe outcomes and state-code classification.

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

use super::ManagerKind;

/// Coarse category of a connection test result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeOutcome {
    /// Connected and the probe statement returned a row
    Success,
    /// The data source is missing or misconfigured (`IM002`)
    ConfigError,
    /// The driver library could not be loaded (`IM003`/`IM004`)
    DriverError,
    /// The server rejected the credentials
    AuthError,
    /// The server could not be reached in time
    NetworkError,
    /// Anything else
    Unknown,
}

impl ProbeOutcome {
    /// Whether the probe succeeded.
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Suggestions shown after a failed test.
    pub const fn tips(self) -> &'static [&'static str] {
        match self {
            Self::Success => &[],
            Self::ConfigError => &[
                "Check that the data source exists in the selected odbc.ini",
                "Check that the Driver value names a driver in odbcinst.ini",
                "Run 'odbcinst -j' to see which files the driver manager reads",
            ],
            Self::DriverError => &[
                "Verify the driver library path in odbcinst.ini",
                "Check that the library matches the driver manager's architecture",
                "Make sure the library's own dependencies can be found",
            ],
            Self::AuthError => &[
                "Check the user name and password",
                "Try entering credentials instead of the stored ones",
            ],
            Self::NetworkError => &[
                "Ensure the database server is running and accessible",
                "Check the Server and Port values of the data source",
                "Check firewalls between this host and the server",
            ],
            Self::Unknown => &[
                "Verify the driver is properly installed and registered",
                "Check connection parameters (host, port, credentials)",
                "Check WideAsUTF16=Yes in the data source for Unicode drivers",
            ],
        }
    }
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Success => "success",
            Self::ConfigError => "configuration error",
            Self::DriverError => "driver error",
            Self::AuthError => "authentication error",
            Self::NetworkError => "network error",
            Self::Unknown => "unknown error",
        };
        f.write_str(label)
    }
}

/// Outcome of one connection test. Never carries a password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionProbeResult {
    /// Coarse category
    pub outcome: ProbeOutcome,
    /// Five-character state code, when one was reported
    pub code: Option<String>,
    /// Human-readable detail
    pub message: String,
    /// Wall-clock time spent on the attempt
    pub elapsed: Duration,
    /// Redacted connection descriptor
    pub target: String,
    /// Backend that produced the result
    pub manager: Option<ManagerKind>,
}

impl ConnectionProbeResult {
    /// A successful probe.
    pub fn success(target: String, manager: ManagerKind, elapsed: Duration) -> Self {
        Self {
            outcome: ProbeOutcome::Success,
            code: None,
            message: "Connection OK".to_string(),
            elapsed,
            target,
            manager: Some(manager),
        }
    }

    /// A failure with a known state code, classified from that code.
    pub fn failure(
        code: Option<String>,
        message: impl Into<String>,
        target: String,
        manager: Option<ManagerKind>,
        elapsed: Duration,
    ) -> Self {
        let message = message.into();
        Self {
            outcome: classify(code.as_deref(), &message),
            code,
            message,
            elapsed,
            target,
            manager,
        }
    }

    /// Whether the probe succeeded.
    pub const fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

struct ClassifierPatterns {
    state_patterns: Vec<Regex>,
    auth_message: Option<Regex>,
}

impl ClassifierPatterns {
    fn instance() -> &'static Self {
        static PATTERNS: OnceLock<ClassifierPatterns> = OnceLock::new();
        PATTERNS.get_or_init(Self::compile)
    }

    fn compile() -> Self {
        // [IM002][unixODBC]..., SQLSTATE=IM002, State: IM002
        let state_patterns = [
            r"\[([0-9A-Z]{5})\]",
            r"SQLSTATE\s*[=:]\s*([0-9A-Z]{5})\b",
            r"(?i:state)\s*:\s*([0-9A-Z]{5})\b",
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect();

        let auth_message = Regex::new(
            r"(?i)(authentication failed|login failed|access denied|invalid (user|username|password|credentials|authorization)|password authentication|bad password|not authorized)",
        )
        .ok();

        Self {
            state_patterns,
            auth_message,
        }
    }
}

/// Maps a state code and diagnostic message onto an outcome.
///
/// Authentication is checked before the `08` class because many servers
/// report rejected credentials as `08001` or `08004`.
pub fn classify(code: Option<&str>, message: &str) -> ProbeOutcome {
    let code = code.map(str::to_ascii_uppercase);
    match code.as_deref() {
        Some("IM002") => return ProbeOutcome::ConfigError,
        Some("IM003" | "IM004") => return ProbeOutcome::DriverError,
        Some(c) if c.starts_with("28") => return ProbeOutcome::AuthError,
        _ => {}
    }
    if looks_like_auth_failure(message) {
        return ProbeOutcome::AuthError;
    }
    match code.as_deref() {
        Some("HYT00" | "HYT01") => ProbeOutcome::NetworkError,
        Some(c) if c.starts_with("08") => ProbeOutcome::NetworkError,
        _ => ProbeOutcome::Unknown,
    }
}

fn looks_like_auth_failure(message: &str) -> bool {
    ClassifierPatterns::instance()
        .auth_message
        .as_ref()
        .is_some_and(|re| re.is_match(message))
}

/// Extracts the first error state code from driver-manager diagnostics.
///
/// Success-with-info (`01xxx`) and `00000` states are skipped.
///
/// # Example
/// ```rust
/// use odbcadmin_core::probe::extract_state;
///
/// let text = "[IM002][unixODBC][Driver Manager]Data source name not found";
/// assert_eq!(extract_state(text).as_deref(), Some("IM002"));
/// assert_eq!(extract_state("1: SQLDriverConnect = failed (0) SQLSTATE=08001").as_deref(), Some("08001"));
/// ```
pub fn extract_state(text: &str) -> Option<String> {
    text.lines().find_map(|line| {
        ClassifierPatterns::instance()
            .state_patterns
            .iter()
            .flat_map(|re| re.captures_iter(line))
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .find(|state| !state.starts_with("01") && *state != "00000")
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_code() {
        assert_eq!(classify(Some("IM002"), ""), ProbeOutcome::ConfigError);
        assert_eq!(classify(Some("IM003"), ""), ProbeOutcome::DriverError);
        assert_eq!(classify(Some("IM004"), ""), ProbeOutcome::DriverError);
        assert_eq!(classify(Some("28000"), ""), ProbeOutcome::AuthError);
        assert_eq!(classify(Some("08001"), "timeout"), ProbeOutcome::NetworkError);
        assert_eq!(classify(Some("08S01"), ""), ProbeOutcome::NetworkError);
        assert_eq!(classify(Some("HYT00"), ""), ProbeOutcome::NetworkError);
        assert_eq!(classify(Some("HY000"), "general"), ProbeOutcome::Unknown);
        assert_eq!(classify(None, "something odd"), ProbeOutcome::Unknown);
    }

    #[test]
    fn test_auth_message_wins_over_network_class() {
        let outcome = classify(
            Some("08004"),
            "FATAL: password authentication failed for user \"dba\"",
        );
        assert_eq!(outcome, ProbeOutcome::AuthError);
        assert_eq!(
            classify(Some("08001"), "Access denied for user 'x'@'host'"),
            ProbeOutcome::AuthError
        );
    }

    #[test]
    fn test_driver_codes_not_overridden_by_message() {
        assert_eq!(
            classify(Some("IM003"), "login failed"),
            ProbeOutcome::DriverError
        );
    }

    #[test]
    fn test_extract_state_formats() {
        assert_eq!(
            extract_state("[ISQL]ERROR: Could not SQLConnect\n[08001][unixODBC]Can't connect").as_deref(),
            Some("08001")
        );
        assert_eq!(
            extract_state("Diagnostic State: 28000, native 1045").as_deref(),
            Some("28000")
        );
        assert_eq!(
            extract_state("[01000][unixODBC]changed database\n[HY000] boom").as_deref(),
            Some("HY000")
        );
        assert_eq!(extract_state("SQL> 1\n"), None);
    }

    #[test]
    fn test_failure_result_is_classified() {
        let result = ConnectionProbeResult::failure(
            Some("IM002".to_string()),
            "Data source name not found",
            "DSN=Ghost".to_string(),
            None,
            Duration::ZERO,
        );
        assert_eq!(result.outcome, ProbeOutcome::ConfigError);
        assert!(!result.is_success());
        assert!(!result.outcome.tips().is_empty());
    }
}
