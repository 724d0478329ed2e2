//! End-to-end scenarios: discover files, load the registry, mutate it and
//! run connection tests against fake driver-manager backends.

#![allow(clippy::expect_used)]

use async_trait::async_trait;
use odbcadmin_core::locator::user_selected;
use odbcadmin_core::probe::{ManagerFailure, ProbeRequest};
use odbcadmin_core::{
    ConfigFileSet, ConnectionTester, CredentialPolicy, CredentialPrompt, Credentials,
    DataSourceDefinition, DriverDefinition, DriverManager, ManagerChoice, ManagerKind,
    OdbcAdminError, ProbeOutcome, Registry, Result, TesterConfig,
};
use std::ffi::OsString;
use std::fs;
use std::sync::{Arc, Mutex};

/// Records every request and replies with a fixed answer.
struct RecordingManager {
    reply: std::result::Result<(), ManagerFailure>,
    requests: Mutex<Vec<(String, Option<OsString>)>>,
}

impl RecordingManager {
    fn new(reply: std::result::Result<(), ManagerFailure>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().expect("lock").len()
    }
}

#[async_trait]
impl DriverManager for RecordingManager {
    fn kind(&self) -> ManagerKind {
        ManagerKind::UnixOdbc
    }

    async fn probe(&self, request: &ProbeRequest) -> std::result::Result<(), ManagerFailure> {
        self.requests.lock().expect("lock").push((
            request.descriptor.to_safe_string(),
            request.environment.get("ODBCINI").map(ToOwned::to_owned),
        ));
        self.reply.clone()
    }
}

struct Workspace {
    _dir: tempfile::TempDir,
    files: ConfigFileSet,
}

fn workspace(dsn_contents: &str, driver_contents: &str) -> Workspace {
    let dir = tempfile::tempdir().expect("tempdir");
    let dsn = dir.path().join("odbc.ini");
    let driver = dir.path().join("odbcinst.ini");
    fs::write(&dsn, dsn_contents).expect("write odbc.ini");
    fs::write(&driver, driver_contents).expect("write odbcinst.ini");
    Workspace {
        files: ConfigFileSet {
            dsn: user_selected(&dsn),
            driver: user_selected(&driver),
        },
        _dir: dir,
    }
}

fn tester(ws: &Workspace, manager: Arc<RecordingManager>) -> ConnectionTester {
    ConnectionTester::with_managers(
        ws.files.clone(),
        TesterConfig::default(),
        vec![manager as Arc<dyn DriverManager>],
    )
}

#[test]
fn test_scenario_a_load_and_resolve() {
    let ws = workspace(
        "[Prod]\nDriver = MySQL\nServer = db.local\nPort = 3306\n",
        "[MySQL]\nDriver = /usr/local/lib/libmyodbc8.so\n",
    );
    let registry = Registry::load(&ws.files).expect("load");

    assert_eq!(registry.dsn_names(), vec!["Prod".to_string()]);
    let prod = registry.get_dsn("Prod").expect("Prod");
    let driver = registry.get_driver(&prod.driver_ref).expect("MySQL");
    assert_eq!(driver.library_path, "/usr/local/lib/libmyodbc8.so");
    assert!(registry.issues().is_empty());
}

#[tokio::test]
async fn test_scenario_b_unknown_dsn_is_config_error() {
    let ws = workspace("", "");
    let registry = Registry::load(&ws.files).expect("load");
    let manager = RecordingManager::new(Ok(()));

    let result = tester(&ws, manager.clone())
        .test(&registry, "Ghost", CredentialPolicy::UseStored)
        .await
        .expect("no terminal error");

    assert_eq!(result.outcome, ProbeOutcome::ConfigError);
    assert_eq!(result.code.as_deref(), Some("IM002"));
    assert_eq!(manager.calls(), 0);
}

#[tokio::test]
async fn test_scenario_c_missing_library_is_driver_error() {
    let ws = workspace("", "");
    let mut registry = Registry::load(&ws.files).expect("load");

    registry
        .add_driver(DriverDefinition::new("PG", "/no/such/file.so"), false)
        .expect("registration does not check the library");
    registry
        .add_dsn(DataSourceDefinition::new("Reports", "PG"))
        .expect("add dsn");

    let manager = RecordingManager::new(Ok(()));
    let result = tester(&ws, manager.clone())
        .test(&registry, "Reports", CredentialPolicy::UseStored)
        .await
        .expect("no terminal error");

    assert_eq!(result.outcome, ProbeOutcome::DriverError);
    assert_eq!(result.code.as_deref(), Some("IM003"));
    assert_eq!(manager.calls(), 0);
}

#[test]
fn test_unknown_driver_leaves_file_byte_identical() {
    let ws = workspace(
        "; managed by hand\n[Prod]\nDriver=MySQL\n",
        "[MySQL]\nDriver = /usr/lib/libmyodbc8.so\n",
    );
    let mut registry = Registry::load(&ws.files).expect("load");
    let before = fs::read(ws.files.dsn_path()).expect("read");

    let result = registry.add_dsn(DataSourceDefinition::new("Reports", "Oracle"));

    assert!(matches!(
        result,
        Err(OdbcAdminError::UnknownDriver { ref driver, .. }) if driver == "Oracle"
    ));
    assert_eq!(fs::read(ws.files.dsn_path()).expect("read"), before);
    assert!(registry.get_dsn("Reports").is_none());
}

#[test]
fn test_essential_defaults_never_override_caller_values() {
    let ws = workspace("", "[MySQL]\nDriver = /usr/lib/libmyodbc8.so\n");
    let mut registry = Registry::load(&ws.files).expect("load");

    let stored = registry
        .add_dsn(
            DataSourceDefinition::new("Prod", "MySQL")
                .with_attribute("WideAsUTF16", "No")
                .with_attribute("PwdClearText", "1"),
        )
        .expect("add");

    assert_eq!(stored.attribute("WideAsUTF16"), Some("No"));
    assert_eq!(stored.attribute("PwdClearText"), Some("1"));
    assert_eq!(stored.attribute("RoundRobin"), Some("No"));
}

#[tokio::test]
async fn test_probe_sees_selected_files_and_credentials() {
    let library = tempfile::NamedTempFile::new().expect("library stand-in");
    let ws = workspace(
        "[Prod]\nDriver = MySQL\nUID = stored\n",
        &format!("[MySQL]\nDriver = {}\n", library.path().display()),
    );
    let registry = Registry::load(&ws.files).expect("load");
    let manager = RecordingManager::new(Ok(()));

    let result = tester(&ws, manager.clone())
        .test(
            &registry,
            "Prod",
            CredentialPolicy::Override(Credentials::new("dba".into(), Some("s3cret".into()))),
        )
        .await
        .expect("no terminal error");

    assert!(result.is_success());
    assert_eq!(result.target, "DSN=Prod;UID=dba;PWD=****");

    let requests = manager.requests.lock().expect("lock");
    let (target, odbcini) = &requests[0];
    assert!(!target.contains("s3cret"));
    assert_eq!(
        odbcini.as_deref(),
        Some(ws.files.dsn_path().as_os_str())
    );
}

struct FixedPrompt {
    asked_with: Option<String>,
}

impl CredentialPrompt for FixedPrompt {
    fn prompt_credentials(
        &mut self,
        _dsn: &str,
        stored_user: Option<&str>,
    ) -> Result<Option<Credentials>> {
        self.asked_with = stored_user.map(str::to_string);
        Ok(Some(Credentials::new("typed".into(), None)))
    }
}

#[tokio::test]
async fn test_interactive_policy_uses_prompted_credentials() {
    let library = tempfile::NamedTempFile::new().expect("library stand-in");
    let ws = workspace(
        "[Prod]\nDriver = MySQL\nUID = stored\n",
        &format!("[MySQL]\nDriver = {}\n", library.path().display()),
    );
    let registry = Registry::load(&ws.files).expect("load");
    let manager = RecordingManager::new(Err(ManagerFailure::new(
        Some("28000".into()),
        "[28000][Driver]Access denied",
    )));
    let mut prompt = FixedPrompt { asked_with: None };

    let result = tester(&ws, manager)
        .test(&registry, "Prod", CredentialPolicy::PromptInteractive(&mut prompt))
        .await
        .expect("no terminal error");

    assert_eq!(prompt.asked_with.as_deref(), Some("stored"));
    assert_eq!(result.outcome, ProbeOutcome::AuthError);
    assert_eq!(result.target, "DSN=Prod;UID=typed");
}

#[tokio::test]
async fn test_dangling_reference_is_config_error() {
    let ws = workspace("[Orphan]\nDriver = Nowhere\n", "");
    let registry = Registry::load(&ws.files).expect("load");
    let manager = RecordingManager::new(Ok(()));

    let result = tester(&ws, manager.clone())
        .test(&registry, "Orphan", CredentialPolicy::UseStored)
        .await
        .expect("no terminal error");

    assert_eq!(result.outcome, ProbeOutcome::ConfigError);
    assert_eq!(result.code.as_deref(), Some("IM002"));
    assert_eq!(manager.calls(), 0);
}

#[tokio::test]
async fn test_custom_skips_registry_checks() {
    let ws = workspace("", "");
    let manager = RecordingManager::new(Err(ManagerFailure::new(
        Some("IM002".into()),
        "[IM002][unixODBC][Driver Manager]Data source name not found",
    )));

    let result = tester(&ws, manager.clone())
        .test_custom("Adhoc", ManagerChoice::UnixOdbc)
        .await;

    assert_eq!(manager.calls(), 1);
    assert_eq!(result.outcome, ProbeOutcome::ConfigError);
    assert_eq!(result.manager, Some(ManagerKind::UnixOdbc));
}
