//! Driver-manager backends that run the manager's own console tool.
//!
//! unixODBC ships `isql`, iODBC ships `iodbctest`. Both read statements from
//! stdin, so the probe is piped in and the diagnostics are scraped for a
//! state code. The environment is applied to the child only.
//!
//! `iodbctest` is started without arguments and reads the connection string
//! from stdin ahead of the query. `isql` only accepts credentials as
//! arguments, so a typed password is visible in the process list while the
//! connection attempt runs; prefer the iODBC or linked backend when that
//! matters.

use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace};
use zeroize::Zeroizing;

use super::outcome::extract_state;
use super::{DriverManager, ManagerFailure, ManagerKind, ProbeRequest};

/// Runs `isql` (unixODBC) or `iodbctest` (iODBC) as a child process.
#[derive(Debug, Clone)]
pub struct CommandLineManager {
    kind: ManagerKind,
    program: PathBuf,
}

impl CommandLineManager {
    /// unixODBC backend using the given `isql` binary.
    pub fn unixodbc(program: impl Into<PathBuf>) -> Self {
        Self {
            kind: ManagerKind::UnixOdbc,
            program: program.into(),
        }
    }

    /// iODBC backend using the given `iodbctest` binary.
    pub fn iodbc(program: impl Into<PathBuf>) -> Self {
        Self {
            kind: ManagerKind::Iodbc,
            program: program.into(),
        }
    }

    /// Program this backend runs.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments for one probe. Credentials are only passed when a user
    /// name was supplied; otherwise the tool falls back to the stored ones.
    fn arguments(&self, request: &ProbeRequest) -> Vec<OsString> {
        match self.kind {
            ManagerKind::Iodbc => Vec::new(),
            _ => {
                let mut args = vec![
                    OsString::from("-b"),
                    OsString::from(&request.descriptor.dsn),
                ];
                if let Some(creds) = &request.descriptor.credentials
                    && !creds.username().is_empty()
                {
                    args.push(OsString::from(creds.username()));
                    if let Some(password) = creds.password() {
                        args.push(OsString::from(password));
                    }
                }
                args
            }
        }
    }

    /// Text piped to the tool's stdin.
    fn input(&self, request: &ProbeRequest) -> Zeroizing<String> {
        match self.kind {
            ManagerKind::Iodbc => Zeroizing::new(format!(
                "{}\n{}\n",
                request.descriptor.to_connection_string().as_str(),
                request.query
            )),
            _ => Zeroizing::new(format!("{}\n", request.query)),
        }
    }
}

#[async_trait]
impl DriverManager for CommandLineManager {
    fn kind(&self) -> ManagerKind {
        self.kind
    }

    async fn probe(&self, request: &ProbeRequest) -> Result<(), ManagerFailure> {
        debug!(
            "Running {} for {}",
            self.program.display(),
            request.descriptor.to_safe_string()
        );

        let mut command = Command::new(&self.program);
        command
            .args(self.arguments(request))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (name, value) in request.environment.vars() {
            command.env(name, value);
        }

        let mut child = command.spawn().map_err(|e| {
            ManagerFailure::new(
                None,
                format!("Failed to run {}: {}", self.program.display(), e),
            )
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            let input = self.input(request);
            // The tool may exit before reading stdin when the connect fails.
            if let Err(e) = stdin.write_all(input.as_bytes()).await {
                trace!("Probe input not consumed: {}", e);
            }
        }

        let output = child.wait_with_output().await.map_err(|e| {
            ManagerFailure::new(
                None,
                format!("Failed waiting for {}: {}", self.program.display(), e),
            )
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        trace!("{} stdout: {}", self.program.display(), stdout);
        trace!("{} stderr: {}", self.program.display(), stderr);

        let combined = format!("{}\n{}", stderr, stdout);
        let state = extract_state(&combined);
        if output.status.success() && state.is_none() {
            return Ok(());
        }

        let message = diagnostic_line(&combined).unwrap_or_else(|| {
            format!("{} exited with {}", self.program.display(), output.status)
        });
        Err(ManagerFailure::new(state, message))
    }
}

/// The most specific diagnostic: the first line carrying a state code, else
/// the first non-empty line that is not a prompt or banner.
fn diagnostic_line(text: &str) -> Option<String> {
    let lines = || {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
    };
    lines()
        .find(|line| extract_state(line).is_some())
        .or_else(|| {
            lines().find(|line| {
                !line.starts_with("SQL>") && !line.starts_with('+') && !line.starts_with('|')
            })
        })
        .map(str::to_string)
}

/// Driver managers found on this host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectedManagers {
    /// Path of unixODBC's `isql`, when unixODBC is installed
    pub unixodbc: Option<PathBuf>,
    /// Path of iODBC's `iodbctest`, when iODBC is installed
    pub iodbc: Option<PathBuf>,
}

impl DetectedManagers {
    /// Searches `PATH` and the macOS iODBC framework location.
    pub fn from_process() -> Self {
        let path = std::env::var_os("PATH").unwrap_or_default();
        Self::detect(&path, Path::new("/Library/ODBC").is_dir())
    }

    /// Detection over an explicit `PATH` value.
    pub fn detect(path: &OsStr, iodbc_framework: bool) -> Self {
        let isql = find_in_path("isql", path);
        let odbcinst = find_in_path("odbcinst", path);
        let unixodbc = match (isql, odbcinst) {
            (Some(isql), _) => Some(isql),
            (None, Some(odbcinst)) => {
                debug!(
                    "unixODBC found at {} but isql is missing",
                    odbcinst.display()
                );
                Some(PathBuf::from("isql"))
            }
            (None, None) => None,
        };

        let iodbc = find_in_path("iodbctest", path)
            .or_else(|| iodbc_framework.then(|| PathBuf::from("iodbctest")));

        debug!("Detected driver managers: unixODBC={:?} iODBC={:?}", unixodbc, iodbc);
        Self { unixodbc, iodbc }
    }

    /// Whether no command-line manager was found.
    pub const fn is_empty(&self) -> bool {
        self.unixodbc.is_none() && self.iodbc.is_none()
    }

    /// Backends for every detected manager, unixODBC first.
    pub fn managers(&self) -> Vec<CommandLineManager> {
        let mut managers = Vec::new();
        if let Some(isql) = &self.unixodbc {
            managers.push(CommandLineManager::unixodbc(isql));
        }
        if let Some(iodbctest) = &self.iodbc {
            managers.push(CommandLineManager::iodbc(iodbctest));
        }
        managers
    }
}

/// First executable file named `program` in a `PATH`-style list.
pub fn find_in_path(program: &str, path: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::locator::{ConfigFileSet, user_selected};
    use crate::probe::DriverManagerEnvironment;
    use crate::security::{ConnectionDescriptor, Credentials};
    use std::time::Duration;

    fn request(descriptor: ConnectionDescriptor) -> ProbeRequest {
        let files = ConfigFileSet {
            dsn: user_selected(Path::new("/cfg/odbc.ini")),
            driver: user_selected(Path::new("/cfg/odbcinst.ini")),
        };
        ProbeRequest {
            descriptor,
            environment: DriverManagerEnvironment::from_files_with(&files, |_| None),
            query: "SELECT 1",
            login_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_isql_arguments() {
        let manager = CommandLineManager::unixodbc("isql");

        let stored = request(ConnectionDescriptor::new("Prod"));
        assert_eq!(manager.arguments(&stored), vec!["-b", "Prod"]);

        let custom = request(
            ConnectionDescriptor::new("Prod")
                .with_credentials(Credentials::new("dba".into(), Some("pw".into()))),
        );
        assert_eq!(manager.arguments(&custom), vec!["-b", "Prod", "dba", "pw"]);
    }

    #[test]
    fn test_iodbctest_reads_connection_string_from_stdin() {
        let manager = CommandLineManager::iodbc("iodbctest");
        let custom = request(
            ConnectionDescriptor::new("Prod")
                .with_credentials(Credentials::new("dba".into(), Some("pw".into()))),
        );
        assert!(manager.arguments(&custom).is_empty());
        assert_eq!(
            manager.input(&custom).as_str(),
            "DSN=Prod;UID=dba;PWD=pw\nSELECT 1\n"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_iodbctest_password_stays_off_command_line() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let seen = dir.path().join("seen");
        let script = dir.path().join("iodbctest");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"args:$*\" > '{0}'\nread conn\necho \"conn:$conn\" >> '{0}'\nread sql\necho '1'\n",
                seen.display()
            ),
        )
        .expect("write");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).expect("chmod");

        let manager = CommandLineManager::iodbc(&script);
        manager
            .probe(&request(
                ConnectionDescriptor::new("Prod")
                    .with_credentials(Credentials::new("dba".into(), Some("s3cret".into()))),
            ))
            .await
            .expect("clean exit is success");

        let seen = std::fs::read_to_string(&seen).expect("read");
        assert_eq!(seen, "args:\nconn:DSN=Prod;UID=dba;PWD=s3cret\n");
    }

    #[test]
    fn test_diagnostic_line_prefers_state_line() {
        let text = "[ISQL]ERROR: Could not SQLConnect\n[IM002][unixODBC][Driver Manager]Data source name not found\n";
        assert_eq!(
            diagnostic_line(text).as_deref(),
            Some("[IM002][unixODBC][Driver Manager]Data source name not found")
        );
        assert_eq!(diagnostic_line("\n  \n"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_detect_from_path() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let isql = dir.path().join("isql");
        std::fs::write(&isql, "#!/bin/sh\n").expect("write");
        std::fs::set_permissions(&isql, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        let not_exec = dir.path().join("iodbctest");
        std::fs::write(&not_exec, "").expect("write");

        let detected = DetectedManagers::detect(dir.path().as_os_str(), false);
        assert_eq!(detected.unixodbc, Some(isql));
        assert_eq!(detected.iodbc, None);

        let with_framework = DetectedManagers::detect(dir.path().as_os_str(), true);
        assert_eq!(with_framework.iodbc, Some(PathBuf::from("iodbctest")));
        assert_eq!(with_framework.managers().len(), 2);
    }

    #[test]
    fn test_detect_nothing() {
        let detected = DetectedManagers::detect(OsStr::new(""), false);
        assert!(detected.is_empty());
        assert!(detected.managers().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_reports_scraped_state() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("isql");
        std::fs::write(
            &script,
            "#!/bin/sh\necho '[ISQL]ERROR: Could not SQLConnect' >&2\necho \"[IM002][unixODBC][Driver Manager]Data source name not found ($ODBCINI)\" >&2\nexit 1\n",
        )
        .expect("write");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).expect("chmod");

        let manager = CommandLineManager::unixodbc(&script);
        let failure = manager
            .probe(&request(ConnectionDescriptor::new("Ghost")))
            .await
            .expect_err("script fails");

        assert_eq!(failure.state.as_deref(), Some("IM002"));
        assert!(failure.message.contains("/cfg/odbc.ini"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_success_on_clean_exit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("isql");
        std::fs::write(&script, "#!/bin/sh\nread line\necho \"$line\" > /dev/null\necho '1'\n")
            .expect("write");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).expect("chmod");

        let manager = CommandLineManager::unixodbc(&script);
        manager
            .probe(&request(ConnectionDescriptor::new("Prod")))
            .await
            .expect("clean exit is success");
    }

    #[tokio::test]
    async fn test_missing_program_is_failure() {
        let manager = CommandLineManager::unixodbc("/no/such/isql");
        let failure = manager
            .probe(&request(ConnectionDescriptor::new("Prod")))
            .await
            .expect_err("spawn fails");
        assert!(failure.state.is_none());
        assert!(failure.message.contains("/no/such/isql"));
    }
}
