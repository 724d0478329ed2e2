//! Process-lifetime state shared by every menu action.

use odbcadmin_core::locator::{ensure_file, user_selected};
use odbcadmin_core::{
    ConfigFileSet, ConfigKind, ConfigLocator, ConfigOverrides, ConnectionTester, DriverManager,
    PartialResolution, Registry, ResolvedPath, Result, TesterConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::terminal::Terminal;

/// Selected files, the loaded registry and the main-menu cursor.
pub struct SessionState {
    locator: ConfigLocator,
    files: ConfigFileSet,
    registry: Registry,
    tester_config: TesterConfig,
    managers: Vec<Arc<dyn DriverManager>>,
    /// Last main-menu position
    pub cursor: usize,
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("files", &self.files)
            .field("tester_config", &self.tester_config)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl SessionState {
    /// Loads the registry for `files` and starts a session.
    ///
    /// # Errors
    /// Returns an I/O error if an existing file cannot be read.
    pub fn new(
        locator: ConfigLocator,
        files: ConfigFileSet,
        tester_config: TesterConfig,
        managers: Vec<Arc<dyn DriverManager>>,
    ) -> Result<Self> {
        let registry = Registry::load(&files)?;
        Ok(Self {
            locator,
            files,
            registry,
            tester_config,
            managers,
            cursor: 0,
        })
    }

    /// Locator used for discovery.
    pub const fn locator(&self) -> &ConfigLocator {
        &self.locator
    }

    /// Files currently in use.
    pub const fn files(&self) -> &ConfigFileSet {
        &self.files
    }

    /// Loaded registry.
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Loaded registry, for mutations.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Probe settings.
    pub const fn tester_config(&self) -> &TesterConfig {
        &self.tester_config
    }

    /// A tester pointed at the current files.
    pub fn tester(&self) -> ConnectionTester {
        ConnectionTester::with_managers(
            self.files.clone(),
            self.tester_config,
            self.managers.clone(),
        )
    }

    /// Re-reads both files.
    ///
    /// # Errors
    /// Returns an I/O error if a file cannot be read; the previous registry
    /// is kept.
    pub fn reload(&mut self) -> Result<()> {
        self.registry.reload()
    }

    /// Switches to a different file set. The new registry is loaded before
    /// anything is replaced.
    ///
    /// # Errors
    /// Returns an I/O error if a file cannot be read.
    pub fn switch_files(&mut self, files: ConfigFileSet) -> Result<()> {
        let registry = Registry::load(&files)?;
        info!(
            "Switched to {} and {}",
            files.dsn_path().display(),
            files.driver_path().display()
        );
        self.files = files;
        self.registry = registry;
        Ok(())
    }
}

/// Resolves both files, prompting for any kind the search did not find.
///
/// An empty answer ends the prompt with `NotFound`.
///
/// # Errors
/// - `NotFound` if the user declines to give a path
/// - a terminal error if input cannot be read
pub fn resolve_files(
    locator: &ConfigLocator,
    overrides: &ConfigOverrides,
    term: &mut dyn Terminal,
) -> Result<ConfigFileSet> {
    complete_files(locator, locator.reconfigure(overrides), term)
}

/// Confirms creation of missing chosen files and prompts for unresolved kinds.
fn complete_files(
    locator: &ConfigLocator,
    partial: PartialResolution,
    term: &mut dyn Terminal,
) -> Result<ConfigFileSet> {
    for path in [&partial.dsn, &partial.driver].into_iter().flatten() {
        create_if_missing(path, term)?;
    }

    let dsn = match partial.dsn {
        Some(path) => path,
        None => prompt_for_path(locator, ConfigKind::DataSources, term)?,
    };
    let driver = match partial.driver {
        Some(path) => path,
        None => prompt_for_path(locator, ConfigKind::Drivers, term)?,
    };
    Ok(ConfigFileSet { dsn, driver })
}

fn create_if_missing(path: &ResolvedPath, term: &mut dyn Terminal) -> Result<()> {
    if path.path.exists() {
        return Ok(());
    }
    let question = format!("{} does not exist. Create it?", path.path.display());
    if term.confirm(&question, true)? == Some(true) {
        ensure_file(&path.path)?;
    }
    Ok(())
}

fn prompt_for_path(
    locator: &ConfigLocator,
    kind: ConfigKind,
    term: &mut dyn Terminal,
) -> Result<ResolvedPath> {
    term.line(&format!("No {} file was found. Searched:", kind))?;
    for candidate in locator.candidates(kind) {
        term.line(&format!("  {}", candidate.path.display()))?;
    }

    loop {
        let answer = term
            .read_line(&format!("Path to {} (empty to quit): ", kind.file_name()))?
            .map(|answer| answer.trim().to_string())
            .unwrap_or_default();
        if answer.is_empty() {
            return Err(locator.not_found(kind));
        }

        let selected = user_selected(&PathBuf::from(answer));
        if selected.path.is_file() {
            return Ok(selected);
        }
        if selected.path.is_dir() {
            term.line(&format!("{} is a directory", selected.path.display()))?;
            continue;
        }
        let question = format!("{} does not exist. Create it?", selected.path.display());
        if term.confirm(&question, true)? == Some(true) {
            ensure_file(&selected.path)?;
            return Ok(selected);
        }
    }
}
