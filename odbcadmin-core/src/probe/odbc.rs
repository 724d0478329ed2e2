//! In-process backend linked against the system driver manager.
//!
//! The driver manager reads `ODBCINI`/`ODBCINST` from the process
//! environment at connect time, so the variables are set for the duration of
//! the connect and restored afterwards. A global lock serializes probes.

use async_trait::async_trait;
use odbc_api::{ConnectionOptions, Cursor, Environment};
use std::ffi::OsString;
use std::sync::{Mutex, OnceLock};
use tracing::debug;

use super::environment::DriverManagerEnvironment;
use super::outcome::extract_state;
use super::{DriverManager, ManagerFailure, ManagerKind, ProbeRequest};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn odbc_environment() -> Result<&'static Environment, ManagerFailure> {
    static ODBC_ENV: OnceLock<Option<Environment>> = OnceLock::new();
    ODBC_ENV
        .get_or_init(|| Environment::new().ok())
        .as_ref()
        .ok_or_else(|| {
            ManagerFailure::new(
                Some("IM004".to_string()),
                "Failed to allocate an ODBC environment handle",
            )
        })
}

/// Connects through `odbc-api` on a blocking worker thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkedManager;

impl LinkedManager {
    /// Creates the linked backend.
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DriverManager for LinkedManager {
    fn kind(&self) -> ManagerKind {
        ManagerKind::Linked
    }

    async fn probe(&self, request: &ProbeRequest) -> Result<(), ManagerFailure> {
        let connection_string = request.descriptor.to_connection_string();
        let environment = request.environment.clone();
        let query = request.query.to_string();
        let login_timeout_sec = u32::try_from(request.login_timeout.as_secs()).ok();

        tokio::task::spawn_blocking(move || {
            let _lock = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let _scoped = ScopedEnvironment::apply(&environment);
            let odbc = odbc_environment()?;

            let options = ConnectionOptions {
                login_timeout_sec,
                ..Default::default()
            };
            let connection = odbc
                .connect_with_connection_string(&connection_string, options)
                .map_err(to_failure)?;
            debug!("Connected, running probe statement");

            let mut cursor = connection
                .execute(&query, (), None)
                .map_err(to_failure)?
                .ok_or_else(|| {
                    ManagerFailure::new(None, "Probe statement returned no result set")
                })?;
            let fetched = cursor.next_row().map(|row| row.is_some());
            first_row_outcome(fetched)
        })
        .await
        .map_err(|e| ManagerFailure::new(None, format!("Probe worker failed: {}", e)))?
    }
}

/// A connection only counts once the statement has produced a row.
fn first_row_outcome(fetched: Result<bool, odbc_api::Error>) -> Result<(), ManagerFailure> {
    match fetched {
        Ok(true) => Ok(()),
        Ok(false) => Err(ManagerFailure::new(
            None,
            "Statement returned no rows",
        )),
        Err(e) => Err(to_failure(e)),
    }
}

fn to_failure(error: odbc_api::Error) -> ManagerFailure {
    let message = error.to_string();
    ManagerFailure::new(extract_state(&message), message)
}

/// Sets variables for its lifetime, restoring the previous values on drop.
struct ScopedEnvironment {
    previous: Vec<(String, Option<OsString>)>,
}

impl ScopedEnvironment {
    #[allow(unsafe_code)]
    fn apply(environment: &DriverManagerEnvironment) -> Self {
        let mut previous = Vec::new();
        for (name, value) in environment.vars() {
            previous.push((name.to_string(), std::env::var_os(name)));
            // SAFETY: callers hold ENV_LOCK; no other code in this process
            // mutates the environment.
            unsafe {
                std::env::set_var(name, value);
            }
        }
        Self { previous }
    }
}

impl Drop for ScopedEnvironment {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        for (name, value) in self.previous.drain(..).rev() {
            // SAFETY: still under ENV_LOCK, see `apply`.
            unsafe {
                match value {
                    Some(value) => std::env::set_var(&name, value),
                    None => std::env::remove_var(&name),
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::locator::{ConfigFileSet, user_selected};
    use std::path::Path;

    #[test]
    fn test_empty_result_set_is_not_success() {
        assert!(first_row_outcome(Ok(true)).is_ok());

        let failure = first_row_outcome(Ok(false)).expect_err("no row fetched");
        assert!(failure.state.is_none());
        assert!(failure.message.contains("no rows"));
    }

    #[test]
    fn test_scoped_environment_restores_previous_values() {
        let files = ConfigFileSet {
            dsn: user_selected(Path::new("/scoped/odbc.ini")),
            driver: user_selected(Path::new("/scoped/odbcinst.ini")),
        };
        let environment = DriverManagerEnvironment::from_files_with(&files, |_| None);

        temp_env::with_vars(
            [("ODBCINI", Some("/before/odbc.ini")), ("ODBCINST", None::<&str>)],
            || {
                let _lock = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                {
                    let _scoped = ScopedEnvironment::apply(&environment);
                    assert_eq!(
                        std::env::var_os("ODBCINI"),
                        Some(OsString::from("/scoped/odbc.ini"))
                    );
                }
                assert_eq!(
                    std::env::var_os("ODBCINI"),
                    Some(OsString::from("/before/odbc.ini"))
                );
                assert_eq!(std::env::var_os("ODBCINST"), None);
            },
        );
    }
}
