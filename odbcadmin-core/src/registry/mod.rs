//! In-memory model of the data source and driver registries.
//!
//! A [`Registry`] is always built wholesale from the two files. Mutations
//! re-read both files, validate against what is on disk, write the changed
//! file and then replace the in-memory state, so memory and disk agree after
//! every successful call and a rejected call touches neither.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{EntryKind, OdbcAdminError, Result};
use crate::ini::{self, ParseError, ParsedSection, Section};
use crate::locator::{ConfigFileSet, ConfigKind};

mod definitions;

pub use definitions::{
    DataSourceDefinition, DriverDefinition, ESSENTIAL_DEFAULTS, RESERVED_SECTIONS, Threading,
    is_reserved, looks_like_path,
};


/// A problem found while loading; the affected entry is skipped or defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadIssue {
    /// A section with a malformed line was skipped
    Parse {
        kind: ConfigKind,
        section: Option<String>,
        error: ParseError,
    },
    /// A later section reused an existing name; the first one is kept
    DuplicateSection { kind: ConfigKind, name: String },
    /// A data source names a driver that is not registered
    DanglingDriver { dsn: String, driver: String },
    /// A driver key held an unusable value; a default was applied
    InvalidValue {
        driver: String,
        key: String,
        value: String,
    },
}

impl std::fmt::Display for LoadIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse {
                kind,
                section,
                error,
            } => write!(
                f,
                "{} file: section [{}] skipped, {}",
                kind,
                section.as_deref().unwrap_or("<before first header>"),
                error
            ),
            Self::DuplicateSection { kind, name } => write!(
                f,
                "{} file: duplicate section [{}] ignored, first definition kept",
                kind, name
            ),
            Self::DanglingDriver { dsn, driver } if driver.is_empty() => {
                write!(f, "data source '{}' has no Driver key", dsn)
            }
            Self::DanglingDriver { dsn, driver } => write!(
                f,
                "data source '{}' references unregistered driver '{}'",
                dsn, driver
            ),
            Self::InvalidValue { driver, key, value } => write!(
                f,
                "driver '{}': invalid {} value '{}'",
                driver, key, value
            ),
        }
    }
}

/// How a data source's `Driver` value resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverResolution<'a> {
    /// The value names a registered driver
    Registered(&'a DriverDefinition),
    /// The value is a library path that a registered driver also uses
    ByLibraryPath(&'a DriverDefinition),
    /// The value is a library path no registered driver uses
    DirectLibrary(PathBuf),
    /// Nothing matches
    Dangling,
}

impl DriverResolution<'_> {
    /// The library the driver manager will load, if known.
    pub fn library_path(&self) -> Option<PathBuf> {
        match self {
            Self::Registered(driver) | Self::ByLibraryPath(driver) => {
                Some(PathBuf::from(&driver.library_path))
            }
            Self::DirectLibrary(path) => Some(path.clone()),
            Self::Dangling => None,
        }
    }
}

/// Registered drivers and data sources.
#[derive(Debug, Clone)]
pub struct Registry {
    dsn_path: PathBuf,
    driver_path: PathBuf,
    drivers: BTreeMap<String, DriverDefinition>,
    dsns: BTreeMap<String, DataSourceDefinition>,
    issues: Vec<LoadIssue>,
}

impl Registry {
    /// Loads both registries from the resolved files.
    ///
    /// # Errors
    /// Returns an I/O error if an existing file cannot be read. Malformed
    /// content is never an error; it is reported through [`Registry::issues`].
    pub fn load(files: &ConfigFileSet) -> Result<Self> {
        Self::load_paths(files.dsn_path(), files.driver_path())
    }

    /// Loads both registries from explicit paths.
    ///
    /// # Errors
    /// Returns an I/O error if an existing file cannot be read.
    pub fn load_paths(dsn_path: &Path, driver_path: &Path) -> Result<Self> {
        let dsn_doc = ini::parse(dsn_path)?;
        let driver_doc = ini::parse(driver_path)?;
        let registry = Self::from_documents(dsn_path, driver_path, &dsn_doc, &driver_doc);
        info!(
            "Loaded {} data sources and {} drivers ({} issues)",
            registry.dsns.len(),
            registry.drivers.len(),
            registry.issues.len()
        );
        Ok(registry)
    }

    /// Re-reads both files, replacing the in-memory state.
    ///
    /// # Errors
    /// Returns an I/O error if an existing file cannot be read; the current
    /// state is kept in that case.
    pub fn reload(&mut self) -> Result<()> {
        *self = Self::load_paths(&self.dsn_path, &self.driver_path)?;
        Ok(())
    }

    fn from_documents(
        dsn_path: &Path,
        driver_path: &Path,
        dsn_doc: &[ParsedSection],
        driver_doc: &[ParsedSection],
    ) -> Self {
        let mut issues = Vec::new();

        let mut drivers = BTreeMap::new();
        for section in entries(ConfigKind::Drivers, driver_doc, &mut issues) {
            let driver = DriverDefinition::from_section(section, &mut issues);
            drivers.insert(driver.name.clone(), driver);
        }

        let mut dsns = BTreeMap::new();
        for section in entries(ConfigKind::DataSources, dsn_doc, &mut issues) {
            let dsn = DataSourceDefinition::from_section(section);
            dsns.insert(dsn.name.clone(), dsn);
        }

        let mut registry = Self {
            dsn_path: dsn_path.to_path_buf(),
            driver_path: driver_path.to_path_buf(),
            drivers,
            dsns,
            issues,
        };

        let dangling: Vec<LoadIssue> = registry
            .dsns
            .values()
            .filter(|dsn| registry.resolve_driver(dsn) == DriverResolution::Dangling)
            .map(|dsn| LoadIssue::DanglingDriver {
                dsn: dsn.name.clone(),
                driver: dsn.driver_ref.clone(),
            })
            .collect();
        registry.issues.extend(dangling);

        for issue in &registry.issues {
            warn!("{}", issue);
        }
        registry
    }

    /// Path of the data source file this registry persists to.
    pub fn dsn_path(&self) -> &Path {
        &self.dsn_path
    }

    /// Path of the driver file this registry persists to.
    pub fn driver_path(&self) -> &Path {
        &self.driver_path
    }

    /// Problems found by the last load.
    pub fn issues(&self) -> &[LoadIssue] {
        &self.issues
    }

    /// Looks up a driver by exact name.
    pub fn get_driver(&self, name: &str) -> Option<&DriverDefinition> {
        self.drivers.get(name)
    }

    /// Looks up a data source by exact name.
    pub fn get_dsn(&self, name: &str) -> Option<&DataSourceDefinition> {
        self.dsns.get(name)
    }

    /// Drivers sorted by name.
    pub fn list_drivers(&self) -> Vec<&DriverDefinition> {
        self.drivers.values().collect()
    }

    /// Data sources sorted by name.
    pub fn list_dsns(&self) -> Vec<&DataSourceDefinition> {
        self.dsns.values().collect()
    }

    /// Driver names sorted.
    pub fn driver_names(&self) -> Vec<String> {
        self.drivers.keys().cloned().collect()
    }

    /// Data source names sorted.
    pub fn dsn_names(&self) -> Vec<String> {
        self.dsns.keys().cloned().collect()
    }

    /// Data sources grouped by their `Driver` value, both levels sorted.
    pub fn dsns_by_driver(&self) -> BTreeMap<&str, Vec<&DataSourceDefinition>> {
        let mut groups: BTreeMap<&str, Vec<&DataSourceDefinition>> = BTreeMap::new();
        for dsn in self.dsns.values() {
            let key = if dsn.driver_ref.is_empty() {
                "unknown"
            } else {
                dsn.driver_ref.as_str()
            };
            groups.entry(key).or_default().push(dsn);
        }
        groups
    }

    /// Resolves the driver a data source refers to.
    pub fn resolve_driver(&self, dsn: &DataSourceDefinition) -> DriverResolution<'_> {
        if let Some(driver) = self.drivers.get(&dsn.driver_ref) {
            return DriverResolution::Registered(driver);
        }
        if looks_like_path(&dsn.driver_ref) {
            return self
                .drivers
                .values()
                .find(|driver| driver.library_path == dsn.driver_ref)
                .map_or_else(
                    || DriverResolution::DirectLibrary(PathBuf::from(&dsn.driver_ref)),
                    DriverResolution::ByLibraryPath,
                );
        }
        DriverResolution::Dangling
    }

    /// Registers a driver in `odbcinst.ini`.
    ///
    /// The library path does not have to exist.
    ///
    /// # Errors
    /// - `DuplicateName` if the name is registered and `overwrite` is false
    /// - `Configuration` for an empty or reserved name, an empty library path,
    ///   or a key or value that cannot be written as a single `key = value` line
    /// - `Io` if a file cannot be read or written
    pub fn add_driver(&mut self, definition: DriverDefinition, overwrite: bool) -> Result<()> {
        validate_name(EntryKind::Driver, &definition.name)?;
        if definition.library_path.trim().is_empty() {
            return Err(OdbcAdminError::configuration(
                "driver library path cannot be empty",
            ));
        }
        validate_value("Driver", &definition.library_path)?;
        if let Some(setup) = &definition.setup_path {
            validate_value("Setup", setup)?;
        }
        if let Some(description) = &definition.description {
            validate_value("Description", description)?;
        }
        for (key, value) in &definition.extra {
            validate_entry(key, value)?;
        }

        let dsn_doc = ini::parse(&self.dsn_path)?;
        let mut driver_doc = ini::parse(&self.driver_path)?;

        let exists = section_exists(&driver_doc, &definition.name);
        if exists && !overwrite {
            return Err(OdbcAdminError::duplicate(
                EntryKind::Driver,
                definition.name,
            ));
        }

        upsert(&mut driver_doc, definition.to_section());
        if !exists {
            add_to_index(&mut driver_doc, "ODBC Drivers", &definition.name, "Installed");
        }
        ini::write_document(&self.driver_path, &driver_doc)?;

        info!(
            "{} driver '{}' in {}",
            if exists { "Replaced" } else { "Registered" },
            definition.name,
            self.driver_path.display()
        );
        *self = Self::from_documents(&self.dsn_path, &self.driver_path, &dsn_doc, &driver_doc);
        Ok(())
    }

    /// Creates a data source in `odbc.ini`.
    ///
    /// [`ESSENTIAL_DEFAULTS`] are merged in before writing; caller-supplied
    /// values win. Returns the definition as stored.
    ///
    /// # Errors
    /// - `UnknownDriver` if `driver_ref` is not a registered driver name
    /// - `DuplicateName` if a data source with this name exists
    /// - `Configuration` for an empty or reserved name, or for an attribute
    ///   that cannot be written as a single `key = value` line
    /// - `Io` if a file cannot be read or written
    ///
    /// A `Driver` attribute is dropped; `driver_ref` is the driver.
    pub fn add_dsn(&mut self, mut definition: DataSourceDefinition) -> Result<DataSourceDefinition> {
        validate_name(EntryKind::DataSource, &definition.name)?;
        validate_value("Driver", &definition.driver_ref)?;
        for (key, value) in &definition.attributes {
            validate_entry(key, value)?;
        }
        definition.attributes.retain(|(key, _)| {
            let keep = !key.eq_ignore_ascii_case("Driver");
            if !keep {
                debug!("Ignoring '{}' attribute on data source '{}'", key, definition.name);
            }
            keep
        });

        let mut dsn_doc = ini::parse(&self.dsn_path)?;
        let driver_doc = ini::parse(&self.driver_path)?;
        let current = Self::from_documents(&self.dsn_path, &self.driver_path, &dsn_doc, &driver_doc);

        if current.get_driver(&definition.driver_ref).is_none() {
            debug!(
                "Rejecting data source '{}': driver '{}' not registered",
                definition.name, definition.driver_ref
            );
            return Err(OdbcAdminError::unknown_driver(
                definition.name,
                definition.driver_ref,
            ));
        }
        if section_exists(&dsn_doc, &definition.name) {
            return Err(OdbcAdminError::duplicate(
                EntryKind::DataSource,
                definition.name,
            ));
        }

        definition.apply_essential_defaults();
        upsert(&mut dsn_doc, definition.to_section());
        add_to_index(
            &mut dsn_doc,
            "ODBC Data Sources",
            &definition.name,
            &definition.driver_ref,
        );
        ini::write_document(&self.dsn_path, &dsn_doc)?;

        info!(
            "Created data source '{}' in {}",
            definition.name,
            self.dsn_path.display()
        );
        *self = Self::from_documents(&self.dsn_path, &self.driver_path, &dsn_doc, &driver_doc);
        Ok(definition)
    }
}

/// Valid, non-reserved sections, first occurrence per name; records issues.
fn entries<'a>(
    kind: ConfigKind,
    doc: &'a [ParsedSection],
    issues: &mut Vec<LoadIssue>,
) -> Vec<&'a Section> {
    let mut seen = std::collections::HashSet::new();
    let mut sections = Vec::new();
    for parsed in doc {
        match parsed {
            ParsedSection::Valid(section) if is_reserved(&section.name) => {}
            ParsedSection::Valid(section) => {
                if seen.insert(section.name.as_str()) {
                    sections.push(section);
                } else {
                    issues.push(LoadIssue::DuplicateSection {
                        kind,
                        name: section.name.clone(),
                    });
                }
            }
            ParsedSection::Malformed { name, error, .. } => issues.push(LoadIssue::Parse {
                kind,
                section: name.clone(),
                error: error.clone(),
            }),
        }
    }
    sections
}

fn validate_name(kind: EntryKind, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(OdbcAdminError::configuration(format!(
            "{} name cannot be empty",
            kind
        )));
    }
    if name != name.trim() || name.contains(['[', ']', '\n', '\r']) {
        return Err(OdbcAdminError::configuration(format!(
            "{} name '{}' must not contain brackets, line breaks or surrounding whitespace",
            kind, name
        )));
    }
    if is_reserved(name) {
        return Err(OdbcAdminError::configuration(format!(
            "'{}' is reserved for the driver manager",
            name
        )));
    }
    Ok(())
}

/// A key must be non-empty, fit on one line, and not read back as a
/// section header, comment, or assignment.
fn validate_entry(key: &str, value: &str) -> Result<()> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(OdbcAdminError::configuration("attribute name cannot be empty"));
    }
    if key.contains(['\n', '\r', '='])
        || trimmed.starts_with('[')
        || trimmed.starts_with(';')
        || trimmed.starts_with('#')
    {
        return Err(OdbcAdminError::configuration(format!(
            "invalid attribute name {:?}",
            key
        )));
    }
    validate_value(key, value)
}

fn validate_value(key: &str, value: &str) -> Result<()> {
    if value.contains(['\n', '\r']) {
        return Err(OdbcAdminError::configuration(format!(
            "value for '{}' must not contain line breaks",
            key
        )));
    }
    Ok(())
}

fn section_exists(doc: &[ParsedSection], name: &str) -> bool {
    doc.iter().any(|section| section.name() == Some(name))
}

/// Replaces the first section named like `section`, or appends it.
fn upsert(doc: &mut Vec<ParsedSection>, section: Section) {
    match doc
        .iter_mut()
        .find(|existing| existing.name() == Some(section.name.as_str()))
    {
        Some(existing) => *existing = ParsedSection::Valid(section),
        None => doc.push(ParsedSection::Valid(section)),
    }
}

/// Adds `key = value` to an index section, only if the file already keeps one.
fn add_to_index(doc: &mut [ParsedSection], index: &str, key: &str, value: &str) {
    if let Some(ParsedSection::Valid(section)) = doc
        .iter_mut()
        .find(|section| section.name() == Some(index))
    {
        section.set(key, value);
    }
}
