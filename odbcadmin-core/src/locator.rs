//! Discovery of the `odbc.ini` and `odbcinst.ini` files.
//!
//! Each file is resolved independently: the environment variable first, then
//! a fixed list of well-known locations. The first candidate that exists as
//! a regular file wins. Readability is deliberately not part of the check;
//! an existing file that cannot be read still wins and the failure surfaces
//! when the registry loads it.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{OdbcAdminError, Result};

/// Which configuration file is being located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKind {
    /// `odbc.ini`, the data source registry
    DataSources,
    /// `odbcinst.ini`, the driver registry
    Drivers,
}

impl ConfigKind {
    /// Conventional file name, used in prompts.
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::DataSources => "odbc.ini",
            Self::Drivers => "odbcinst.ini",
        }
    }
}

impl std::fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataSources => f.write_str("data source"),
            Self::Drivers => f.write_str("driver"),
        }
    }
}

/// Why a path was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Named by `ODBCINI`, `ODBCINST` or `ODBCINSTINI`
    Environment,
    /// One of the well-known fallback locations
    Fallback,
    /// Supplied explicitly on the command line or at a prompt
    UserSelected,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Environment => f.write_str("environment"),
            Self::Fallback => f.write_str("fallback"),
            Self::UserSelected => f.write_str("user-selected"),
        }
    }
}

/// An absolute path plus the reason it was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub path: PathBuf,
    pub provenance: Provenance,
}

/// The pair of configuration files a session works against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFileSet {
    pub dsn: ResolvedPath,
    pub driver: ResolvedPath,
}

impl ConfigFileSet {
    /// Path of the data source file.
    pub fn dsn_path(&self) -> &Path {
        &self.dsn.path
    }

    /// Path of the driver file.
    pub fn driver_path(&self) -> &Path {
        &self.driver.path
    }
}

/// One entry of the search order, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub provenance: Provenance,
    pub exists: bool,
}

/// Per-kind outcome of a resolution pass; `None` means nothing was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialResolution {
    pub dsn: Option<ResolvedPath>,
    pub driver: Option<ResolvedPath>,
}

impl PartialResolution {
    /// Completes the set, failing with `NotFound` for the first missing kind.
    pub fn complete(self, locator: &ConfigLocator) -> Result<ConfigFileSet> {
        let dsn = self.dsn.ok_or_else(|| locator.not_found(ConfigKind::DataSources))?;
        let driver = self
            .driver
            .ok_or_else(|| locator.not_found(ConfigKind::Drivers))?;
        Ok(ConfigFileSet { dsn, driver })
    }

    /// Kinds that still need a path.
    pub fn missing(&self) -> Vec<ConfigKind> {
        let mut missing = Vec::new();
        if self.dsn.is_none() {
            missing.push(ConfigKind::DataSources);
        }
        if self.driver.is_none() {
            missing.push(ConfigKind::Drivers);
        }
        missing
    }
}

/// Explicit paths that bypass the search order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub dsn: Option<PathBuf>,
    pub driver: Option<PathBuf>,
}

/// Inputs to the search, captured once so resolution is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchEnvironment {
    /// `ODBCINI`
    pub odbcini: Option<PathBuf>,
    /// `ODBCINST`, falling back to `ODBCINSTINI`
    pub odbcinst: Option<PathBuf>,
    /// The user's home directory
    pub home: Option<PathBuf>,
}

impl SearchEnvironment {
    /// Captures the search inputs from the running process.
    ///
    /// Empty variables count as unset.
    pub fn from_process() -> Self {
        let var = |name: &str| {
            std::env::var_os(name)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        };
        Self {
            odbcini: var("ODBCINI"),
            odbcinst: var("ODBCINST").or_else(|| var("ODBCINSTINI")),
            home: dirs::home_dir(),
        }
    }
}

/// Resolves configuration file paths.
#[derive(Debug, Clone)]
pub struct ConfigLocator {
    env: SearchEnvironment,
}

impl ConfigLocator {
    /// Creates a locator over explicit search inputs.
    pub const fn new(env: SearchEnvironment) -> Self {
        Self { env }
    }

    /// Creates a locator from the process environment.
    pub fn from_process() -> Self {
        Self::new(SearchEnvironment::from_process())
    }

    /// The inputs this locator searches with.
    pub const fn environment(&self) -> &SearchEnvironment {
        &self.env
    }

    /// Every candidate for `kind` in search order, duplicates removed.
    pub fn candidates(&self, kind: ConfigKind) -> Vec<Candidate> {
        let mut ordered: Vec<(PathBuf, Provenance)> = Vec::new();

        let env_value = match kind {
            ConfigKind::DataSources => self.env.odbcini.as_ref(),
            ConfigKind::Drivers => self.env.odbcinst.as_ref(),
        };
        if let Some(path) = env_value {
            ordered.push((absolutize(path), Provenance::Environment));
        }

        let home_relative: &[&str] = match kind {
            ConfigKind::DataSources => &[".odbc.ini", "Library/ODBC/odbc.ini"],
            ConfigKind::Drivers => &[".odbcinst.ini", "Library/ODBC/odbcinst.ini"],
        };
        if let Some(home) = &self.env.home {
            for relative in home_relative {
                ordered.push((home.join(relative), Provenance::Fallback));
            }
        }

        let system: &[&str] = match kind {
            ConfigKind::DataSources => &["/etc/odbc.ini", "/usr/local/etc/odbc.ini"],
            ConfigKind::Drivers => &[
                "/Library/ODBC/odbcinst.ini",
                "/etc/odbcinst.ini",
                "/usr/local/etc/odbcinst.ini",
            ],
        };
        for path in system {
            ordered.push((PathBuf::from(path), Provenance::Fallback));
        }

        let mut seen = std::collections::HashSet::new();
        ordered
            .into_iter()
            .filter(|(path, _)| seen.insert(path.clone()))
            .map(|(path, provenance)| Candidate {
                exists: candidate_exists(&path),
                path,
                provenance,
            })
            .collect()
    }

    /// First existing candidate for `kind`, if any.
    pub fn resolve_kind(&self, kind: ConfigKind) -> Option<ResolvedPath> {
        let found = self
            .candidates(kind)
            .into_iter()
            .find(|candidate| candidate.exists)
            .map(|candidate| ResolvedPath {
                path: candidate.path,
                provenance: candidate.provenance,
            });

        match &found {
            Some(resolved) => info!(
                "Using {} file {} ({})",
                kind,
                resolved.path.display(),
                resolved.provenance
            ),
            None => debug!("No {} file found in any candidate location", kind),
        }
        found
    }

    /// Resolves both kinds without failing, so a caller can prompt.
    pub fn resolve_partial(&self) -> PartialResolution {
        PartialResolution {
            dsn: self.resolve_kind(ConfigKind::DataSources),
            driver: self.resolve_kind(ConfigKind::Drivers),
        }
    }

    /// Resolves both files.
    ///
    /// # Errors
    /// Returns `NotFound` if either kind has no existing candidate.
    pub fn resolve(&self) -> Result<ConfigFileSet> {
        self.resolve_partial().complete(self)
    }

    /// Re-runs resolution, letting explicit paths bypass the search order.
    ///
    /// Override paths are taken as given (made absolute); they do not have to
    /// exist yet.
    pub fn reconfigure(&self, overrides: &ConfigOverrides) -> PartialResolution {
        let pick = |kind: ConfigKind, explicit: Option<&PathBuf>| match explicit {
            Some(path) => Some(user_selected(path)),
            None => self.resolve_kind(kind),
        };
        PartialResolution {
            dsn: pick(ConfigKind::DataSources, overrides.dsn.as_ref()),
            driver: pick(ConfigKind::Drivers, overrides.driver.as_ref()),
        }
    }

    /// Builds the `NotFound` error for `kind` with the searched paths.
    pub fn not_found(&self, kind: ConfigKind) -> OdbcAdminError {
        OdbcAdminError::NotFound {
            kind,
            searched: self
                .candidates(kind)
                .into_iter()
                .map(|candidate| candidate.path)
                .collect(),
        }
    }
}

/// Marks an explicit path as user-selected.
pub fn user_selected(path: &Path) -> ResolvedPath {
    ResolvedPath {
        path: absolutize(path),
        provenance: Provenance::UserSelected,
    }
}

/// Creates an empty configuration file (and its directory) when missing.
///
/// # Errors
/// Returns an I/O error if the directory or file cannot be created.
pub fn ensure_file(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| OdbcAdminError::io("create directory", parent, e))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| OdbcAdminError::io("create", path, e))?;
    info!("Created {}", path.display());
    Ok(true)
}

fn candidate_exists(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|meta| meta.is_file())
}

fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn env_with_home(home: &Path) -> SearchEnvironment {
        SearchEnvironment {
            odbcini: None,
            odbcinst: None,
            home: Some(home.to_path_buf()),
        }
    }

    #[test]
    fn test_candidate_order_for_data_sources() {
        let env = SearchEnvironment {
            odbcini: Some(PathBuf::from("/opt/odbc.ini")),
            odbcinst: None,
            home: Some(PathBuf::from("/home/u")),
        };
        let paths: Vec<PathBuf> = ConfigLocator::new(env)
            .candidates(ConfigKind::DataSources)
            .into_iter()
            .map(|c| c.path)
            .collect();

        assert_eq!(
            paths,
            vec![
                PathBuf::from("/opt/odbc.ini"),
                PathBuf::from("/home/u/.odbc.ini"),
                PathBuf::from("/home/u/Library/ODBC/odbc.ini"),
                PathBuf::from("/etc/odbc.ini"),
                PathBuf::from("/usr/local/etc/odbc.ini"),
            ]
        );
    }

    #[test]
    fn test_candidate_order_for_drivers() {
        let env = env_with_home(Path::new("/home/u"));
        let candidates = ConfigLocator::new(env).candidates(ConfigKind::Drivers);

        assert_eq!(candidates.len(), 5);
        assert_eq!(candidates[0].path, PathBuf::from("/home/u/.odbcinst.ini"));
        assert_eq!(
            candidates[2].path,
            PathBuf::from("/Library/ODBC/odbcinst.ini")
        );
        assert!(
            candidates
                .iter()
                .all(|c| c.provenance == Provenance::Fallback)
        );
    }

    #[test]
    fn test_duplicate_candidates_collapsed() {
        let env = SearchEnvironment {
            odbcini: Some(PathBuf::from("/etc/odbc.ini")),
            odbcinst: None,
            home: None,
        };
        let candidates = ConfigLocator::new(env).candidates(ConfigKind::DataSources);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].provenance, Provenance::Environment);
    }

    #[test]
    fn test_first_existing_candidate_wins() {
        let home = tempfile::tempdir().expect("tempdir");
        let library = home.path().join("Library/ODBC");
        std::fs::create_dir_all(&library).expect("mkdir");
        std::fs::write(library.join("odbc.ini"), "").expect("write");
        std::fs::write(home.path().join(".odbc.ini"), "").expect("write");

        let locator = ConfigLocator::new(env_with_home(home.path()));
        let resolved = locator
            .resolve_kind(ConfigKind::DataSources)
            .expect("resolved");

        assert_eq!(resolved.path, home.path().join(".odbc.ini"));
        assert_eq!(resolved.provenance, Provenance::Fallback);
    }

    #[test]
    fn test_directory_is_not_a_candidate() {
        let home = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(home.path().join(".odbcinst.ini")).expect("mkdir");
        let library = home.path().join("Library/ODBC");
        std::fs::create_dir_all(&library).expect("mkdir");
        std::fs::write(library.join("odbcinst.ini"), "").expect("write");

        let locator = ConfigLocator::new(env_with_home(home.path()));
        let resolved = locator.resolve_kind(ConfigKind::Drivers).expect("resolved");

        assert_eq!(resolved.path, library.join("odbcinst.ini"));
    }

    #[test]
    fn test_reconfigure_override_bypasses_search() {
        let home = tempfile::tempdir().expect("tempdir");
        std::fs::write(home.path().join(".odbc.ini"), "").expect("write");
        let locator = ConfigLocator::new(env_with_home(home.path()));

        let overrides = ConfigOverrides {
            dsn: Some(home.path().join("custom/odbc.ini")),
            driver: None,
        };
        let partial = locator.reconfigure(&overrides);

        let dsn = partial.dsn.expect("override taken");
        assert_eq!(dsn.path, home.path().join("custom/odbc.ini"));
        assert_eq!(dsn.provenance, Provenance::UserSelected);
    }

    #[test]
    fn test_ensure_file_creates_parents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/odbc.ini");

        assert!(ensure_file(&path).expect("created"));
        assert!(path.is_file());
        assert!(!ensure_file(&path).expect("already there"));
    }
}
