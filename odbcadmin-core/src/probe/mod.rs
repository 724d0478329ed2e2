//! Live connection tests through the installed ODBC driver manager.
//!
//! A test resolves credentials, builds a connection descriptor and a
//! [`DriverManagerEnvironment`] for the selected files, then hands both to a
//! [`DriverManager`] backend under a timeout. Failures are values
//! ([`ConnectionProbeResult`]), never errors.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::locator::ConfigFileSet;
use crate::registry::{DriverResolution, Registry};
use crate::security::{ConnectionDescriptor, Credentials};

mod command;
mod environment;
#[cfg(feature = "odbc")]
mod odbc;
mod outcome;

pub use command::{CommandLineManager, DetectedManagers, find_in_path};
pub use environment::{CONFIG_VARIABLES, DriverManagerEnvironment, PASSTHROUGH_VARIABLES};
#[cfg(feature = "odbc")]
pub use odbc::LinkedManager;
pub use outcome::{ConnectionProbeResult, ProbeOutcome, classify, extract_state};

/// Statement run once connected.
pub const PROBE_QUERY: &str = "SELECT 1";

/// Default bound on a single probe.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Which driver manager implementation ran a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagerKind {
    /// unixODBC
    UnixOdbc,
    /// iODBC
    Iodbc,
    /// The driver manager linked into this process
    Linked,
}

impl std::fmt::Display for ManagerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnixOdbc => f.write_str("unixODBC"),
            Self::Iodbc => f.write_str("iODBC"),
            Self::Linked => f.write_str("linked driver manager"),
        }
    }
}

/// Which backends a test should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManagerChoice {
    /// The first available backend
    #[default]
    Auto,
    /// unixODBC only
    UnixOdbc,
    /// iODBC only
    Iodbc,
    /// Every available backend; the first success wins
    Both,
    /// The in-process backend
    Linked,
}

impl ManagerChoice {
    fn admits(self, kind: ManagerKind) -> bool {
        match self {
            Self::Auto | Self::Both => true,
            Self::UnixOdbc => kind == ManagerKind::UnixOdbc,
            Self::Iodbc => kind == ManagerKind::Iodbc,
            Self::Linked => kind == ManagerKind::Linked,
        }
    }
}

impl std::fmt::Display for ManagerChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::UnixOdbc => f.write_str("unixODBC"),
            Self::Iodbc => f.write_str("iODBC"),
            Self::Both => f.write_str("all available"),
            Self::Linked => f.write_str("linked"),
        }
    }
}

/// Everything a backend needs for one attempt.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    /// Target and credentials
    pub descriptor: ConnectionDescriptor,
    /// Variables the driver manager must see
    pub environment: DriverManagerEnvironment,
    /// Statement to run after connecting
    pub query: &'static str,
    /// Login timeout hint for backends that support one
    pub login_timeout: Duration,
}

/// A failed attempt as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerFailure {
    /// Five-character state code, when the backend exposed one
    pub state: Option<String>,
    /// Diagnostic text
    pub message: String,
}

impl ManagerFailure {
    /// Creates a failure.
    pub fn new(state: Option<String>, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
        }
    }
}

/// Connect-and-probe capability of an ODBC driver manager.
#[async_trait]
pub trait DriverManager: Send + Sync {
    /// Which implementation this is.
    fn kind(&self) -> ManagerKind;

    /// Connects, runs `request.query` and reports whether a row came back.
    ///
    /// Implementations must not retry and must not mutate state visible to
    /// other probes once the returned future completes or is dropped.
    async fn probe(&self, request: &ProbeRequest) -> std::result::Result<(), ManagerFailure>;
}

/// Asks the user for credentials for one test.
pub trait CredentialPrompt {
    /// Returns the credentials to use, or `None` to keep the stored ones.
    ///
    /// # Errors
    /// Returns a terminal error if input cannot be read.
    fn prompt_credentials(
        &mut self,
        dsn: &str,
        stored_user: Option<&str>,
    ) -> Result<Option<Credentials>>;
}

/// Where a test's credentials come from.
pub enum CredentialPolicy<'a> {
    /// Whatever the data source stores
    UseStored,
    /// Ask interactively before connecting
    PromptInteractive(&'a mut dyn CredentialPrompt),
    /// Fixed credentials
    Override(Credentials),
}

impl std::fmt::Debug for CredentialPolicy<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UseStored => f.write_str("UseStored"),
            Self::PromptInteractive(_) => f.write_str("PromptInteractive"),
            Self::Override(creds) => f.debug_tuple("Override").field(creds).finish(),
        }
    }
}

/// Probe settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TesterConfig {
    /// Bound on one backend attempt
    pub timeout: Duration,
    /// Backends used by [`ConnectionTester::test`]
    pub choice: ManagerChoice,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            choice: ManagerChoice::Auto,
        }
    }
}

/// Runs connection tests against the selected configuration files.
#[derive(Clone)]
pub struct ConnectionTester {
    files: ConfigFileSet,
    config: TesterConfig,
    managers: Vec<Arc<dyn DriverManager>>,
}

impl std::fmt::Debug for ConnectionTester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionTester")
            .field("files", &self.files)
            .field("config", &self.config)
            .field(
                "managers",
                &self.managers.iter().map(|m| m.kind()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ConnectionTester {
    /// Creates a tester using the driver managers installed on this host.
    pub fn new(files: ConfigFileSet, config: TesterConfig) -> Self {
        Self::with_managers(files, config, installed_managers())
    }

    /// Creates a tester over explicit backends, in preference order.
    pub fn with_managers(
        files: ConfigFileSet,
        config: TesterConfig,
        managers: Vec<Arc<dyn DriverManager>>,
    ) -> Self {
        Self {
            files,
            config,
            managers,
        }
    }

    /// Files the driver manager is pointed at.
    pub const fn files(&self) -> &ConfigFileSet {
        &self.files
    }

    /// Probe settings.
    pub const fn config(&self) -> &TesterConfig {
        &self.config
    }

    /// Backend kinds available to this tester.
    pub fn available(&self) -> Vec<ManagerKind> {
        self.managers.iter().map(|manager| manager.kind()).collect()
    }

    /// Tests a registered data source with the configured backends.
    ///
    /// # Errors
    /// Only a failing credential prompt is an error; every connection
    /// problem is reported in the returned result.
    pub async fn test(
        &self,
        registry: &Registry,
        dsn: &str,
        policy: CredentialPolicy<'_>,
    ) -> Result<ConnectionProbeResult> {
        self.test_using(registry, dsn, policy, self.config.choice)
            .await
    }

    /// Tests a registered data source with an explicit backend choice.
    ///
    /// The data source and its driver are checked first; when that fails no
    /// backend runs.
    ///
    /// # Errors
    /// Only a failing credential prompt is an error.
    pub async fn test_using(
        &self,
        registry: &Registry,
        dsn: &str,
        policy: CredentialPolicy<'_>,
        choice: ManagerChoice,
    ) -> Result<ConnectionProbeResult> {
        let target = ConnectionDescriptor::new(dsn).to_safe_string();
        if let Some(failure) = preflight(registry, dsn) {
            info!("Preflight for '{}' failed: {}", dsn, failure.message);
            return Ok(ConnectionProbeResult::failure(
                failure.state,
                failure.message,
                target,
                None,
                Duration::ZERO,
            ));
        }

        let stored_user = registry.get_dsn(dsn).and_then(|def| def.stored_user());
        let credentials = match policy {
            CredentialPolicy::UseStored => None,
            CredentialPolicy::Override(creds) => Some(creds),
            CredentialPolicy::PromptInteractive(prompt) => {
                prompt.prompt_credentials(dsn, stored_user)?
            }
        };

        let mut descriptor = ConnectionDescriptor::new(dsn);
        if let Some(creds) = credentials {
            descriptor = descriptor.with_credentials(creds);
        }
        Ok(self.run(descriptor, choice).await)
    }

    /// Tests a data source name the registry may not know, using the
    /// stored credentials.
    pub async fn test_custom(&self, dsn: &str, choice: ManagerChoice) -> ConnectionProbeResult {
        self.run(ConnectionDescriptor::new(dsn), choice).await
    }

    async fn run(&self, descriptor: ConnectionDescriptor, choice: ManagerChoice) -> ConnectionProbeResult {
        let target = descriptor.to_safe_string();
        let selected: Vec<&Arc<dyn DriverManager>> = self
            .managers
            .iter()
            .filter(|manager| choice.admits(manager.kind()))
            .collect();
        let selected = if choice == ManagerChoice::Auto {
            selected.into_iter().take(1).collect()
        } else {
            selected
        };

        if selected.is_empty() {
            return ConnectionProbeResult::failure(
                None,
                format!("No {} driver manager is available", choice),
                target,
                None,
                Duration::ZERO,
            );
        }

        let request = ProbeRequest {
            descriptor,
            environment: DriverManagerEnvironment::from_files(&self.files),
            query: PROBE_QUERY,
            login_timeout: self.config.timeout,
        };

        let mut first_failure = None;
        for manager in selected {
            let result = self.attempt(manager.as_ref(), &request, &target).await;
            if result.is_success() {
                return result;
            }
            first_failure.get_or_insert(result);
        }
        first_failure.unwrap_or_else(|| {
            ConnectionProbeResult::failure(None, "No attempt was made", target, None, Duration::ZERO)
        })
    }

    async fn attempt(
        &self,
        manager: &dyn DriverManager,
        request: &ProbeRequest,
        target: &str,
    ) -> ConnectionProbeResult {
        let kind = manager.kind();
        debug!("Probing {} via {}", target, kind);
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.config.timeout, manager.probe(request)).await;
        let elapsed = started.elapsed();

        let result = match outcome {
            Ok(Ok(())) => ConnectionProbeResult::success(target.to_string(), kind, elapsed),
            Ok(Err(failure)) => ConnectionProbeResult::failure(
                failure.state,
                crate::error::redact_connection_string(&failure.message),
                target.to_string(),
                Some(kind),
                elapsed,
            ),
            Err(_) => ConnectionProbeResult::failure(
                Some("HYT00".to_string()),
                format!("No response within {} seconds", self.config.timeout.as_secs()),
                target.to_string(),
                Some(kind),
                elapsed,
            ),
        };
        info!(
            "Probe of {} via {}: {} in {:?}",
            target, kind, result.outcome, elapsed
        );
        result
    }
}

/// Backends for the driver managers installed on this host, in preference
/// order: unixODBC, iODBC, then the linked manager when compiled in.
pub fn installed_managers() -> Vec<Arc<dyn DriverManager>> {
    let managers: Vec<Arc<dyn DriverManager>> = DetectedManagers::from_process()
        .managers()
        .into_iter()
        .map(|manager| Arc::new(manager) as Arc<dyn DriverManager>)
        .collect();
    if managers.is_empty() {
        warn!("Neither unixODBC nor iODBC was found on this system");
    }
    #[cfg(feature = "odbc")]
    let managers = {
        let mut managers = managers;
        managers.push(Arc::new(LinkedManager::new()));
        managers
    };
    managers
}

/// Checks that the data source exists and its driver library is present.
fn preflight(registry: &Registry, dsn: &str) -> Option<ManagerFailure> {
    let Some(definition) = registry.get_dsn(dsn) else {
        return Some(ManagerFailure::new(
            Some("IM002".to_string()),
            format!(
                "Data source name '{}' not found in {}",
                dsn,
                registry.dsn_path().display()
            ),
        ));
    };

    let resolution = registry.resolve_driver(definition);
    let Some(library) = resolution.library_path() else {
        return Some(ManagerFailure::new(
            Some("IM002".to_string()),
            format!(
                "Data source '{}' references driver '{}' which is not registered in {}",
                dsn,
                definition.driver_ref,
                registry.driver_path().display()
            ),
        ));
    };

    if !library.exists() {
        let driver = match resolution {
            DriverResolution::Registered(driver) | DriverResolution::ByLibraryPath(driver) => {
                driver.name.as_str()
            }
            _ => definition.driver_ref.as_str(),
        };
        return Some(ManagerFailure::new(
            Some("IM003".to_string()),
            format!(
                "Driver library for '{}' not found: {}",
                driver,
                library.display()
            ),
        ));
    }
    None
}
