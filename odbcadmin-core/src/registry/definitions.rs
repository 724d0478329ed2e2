//! Driver and data source definitions and their section mappings.

use std::path::Path;

use super::LoadIssue;
use crate::error::is_password_key;
use crate::ini::Section;

/// Attributes applied to every newly created data source.
///
/// These are the settings the OpenLink driver family needs to behave
/// sensibly (UTF-16 wide calls, timezone handling, catalog visibility). A
/// value supplied by the caller for any of these keys is kept.
pub const ESSENTIAL_DEFAULTS: [(&str, &str); 6] = [
    ("WideAsUTF16", "Yes"),
    ("Daylight", "Yes"),
    ("RoundRobin", "No"),
    ("NoSystemTables", "No"),
    ("TreatViewsAsTables", "No"),
    ("PwdClearText", "0"),
];

/// Driver-manager bookkeeping sections that are not registry entries.
pub const RESERVED_SECTIONS: [&str; 3] = ["ODBC", "ODBC Data Sources", "ODBC Drivers"];

/// Whether `name` is one of [`RESERVED_SECTIONS`], ignoring case.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_SECTIONS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// Driver-manager call serialization requested by a driver (`Threading`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Threading {
    /// `Threading = 0`
    #[default]
    Unserialized,
    /// `Threading = 1`
    Serialized,
}

impl Threading {
    /// Parses the file representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "0" => Some(Self::Unserialized),
            "1" => Some(Self::Serialized),
            _ => None,
        }
    }

    /// File representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unserialized => "0",
            Self::Serialized => "1",
        }
    }
}

/// A registered ODBC driver from `odbcinst.ini`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverDefinition {
    /// Section name; case-sensitive and unique
    pub name: String,
    /// Shared library implementing the driver (`Driver`)
    pub library_path: String,
    /// Optional setup library (`Setup`)
    pub setup_path: Option<String>,
    pub description: Option<String>,
    pub threading: Threading,
    pub usage_count: u32,
    /// Any further keys, preserved in file order
    pub extra: Vec<(String, String)>,
}

impl DriverDefinition {
    /// Creates a definition with the values used for fresh registrations.
    pub fn new(name: impl Into<String>, library_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            library_path: library_path.into(),
            setup_path: None,
            description: None,
            threading: Threading::Serialized,
            usage_count: 1,
            extra: Vec::new(),
        }
    }

    /// Builder method to set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method to set the setup library.
    #[must_use]
    pub fn with_setup(mut self, setup_path: impl Into<String>) -> Self {
        self.setup_path = Some(setup_path.into());
        self
    }

    /// Whether the driver library is present on disk.
    pub fn library_exists(&self) -> bool {
        !self.library_path.is_empty() && Path::new(&self.library_path).exists()
    }

    pub(crate) fn from_section(section: &Section, issues: &mut Vec<LoadIssue>) -> Self {
        let mut definition = Self {
            name: section.name.clone(),
            library_path: String::new(),
            setup_path: None,
            description: None,
            threading: Threading::default(),
            usage_count: 0,
            extra: Vec::new(),
        };

        for (key, value) in &section.entries {
            match key.to_ascii_lowercase().as_str() {
                "driver" => definition.library_path = value.clone(),
                "setup" => definition.setup_path = Some(value.clone()),
                "description" => definition.description = Some(value.clone()),
                "threading" => match Threading::parse(value) {
                    Some(threading) => definition.threading = threading,
                    None => issues.push(invalid(section, key, value)),
                },
                "usagecount" => match value.trim().parse() {
                    Ok(count) => definition.usage_count = count,
                    Err(_) => issues.push(invalid(section, key, value)),
                },
                _ => definition.extra.push((key.clone(), value.clone())),
            }
        }

        if definition.library_path.is_empty() {
            issues.push(invalid(section, "Driver", ""));
        }

        definition
    }

    /// The section written to `odbcinst.ini`.
    pub fn to_section(&self) -> Section {
        let mut section = Section::new(self.name.clone());
        if let Some(description) = &self.description {
            section.set("Description", description.clone());
        }
        section.set("Driver", self.library_path.clone());
        if let Some(setup) = &self.setup_path {
            section.set("Setup", setup.clone());
        }
        section.set("Threading", self.threading.as_str());
        section.set("UsageCount", self.usage_count.to_string());
        for (key, value) in &self.extra {
            if !is_managed_driver_key(key) {
                section.set(key.clone(), value.clone());
            }
        }
        section
    }
}

/// Keys [`DriverDefinition::to_section`] writes from typed fields.
fn is_managed_driver_key(key: &str) -> bool {
    ["Description", "Driver", "Setup", "Threading", "UsageCount"]
        .iter()
        .any(|managed| managed.eq_ignore_ascii_case(key))
}

fn invalid(section: &Section, key: &str, value: &str) -> LoadIssue {
    LoadIssue::InvalidValue {
        driver: section.name.clone(),
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// A data source from `odbc.ini`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceDefinition {
    /// Section name; unique
    pub name: String,
    /// Value of the `Driver` key: a driver name or a library path
    pub driver_ref: String,
    /// All other keys in file order (`Server`, `Port`, `UID`, ...)
    pub attributes: Vec<(String, String)>,
}

impl DataSourceDefinition {
    /// Creates a data source with no attributes.
    pub fn new(name: impl Into<String>, driver_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver_ref: driver_ref.into(),
            attributes: Vec::new(),
        }
    }

    /// Builder method to add or replace an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    /// Adds or replaces an attribute, matching keys case-insensitively.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some(entry) => entry.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Attribute value, case-insensitive.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Stored user name (`UID`, or `User`/`Username`).
    pub fn stored_user(&self) -> Option<&str> {
        self.attribute("UID")
            .or_else(|| self.attribute("User"))
            .or_else(|| self.attribute("Username"))
    }

    /// Whether a password is stored in the file.
    pub fn has_stored_password(&self) -> bool {
        self.attributes
            .iter()
            .any(|(k, v)| is_password_key(k) && !v.is_empty())
    }

    /// Merges [`ESSENTIAL_DEFAULTS`] without overwriting existing keys.
    pub fn apply_essential_defaults(&mut self) {
        for (key, value) in ESSENTIAL_DEFAULTS {
            if self.attribute(key).is_none() {
                self.attributes.push((key.to_string(), value.to_string()));
            }
        }
    }

    /// Attributes for display with password values masked.
    pub fn masked_attributes(&self) -> Vec<(&str, String)> {
        self.attributes
            .iter()
            .map(|(k, v)| {
                if is_password_key(k) {
                    (k.as_str(), "********".to_string())
                } else {
                    (k.as_str(), v.clone())
                }
            })
            .collect()
    }

    pub(crate) fn from_section(section: &Section) -> Self {
        let mut definition = Self::new(section.name.clone(), String::new());
        for (key, value) in &section.entries {
            if key.eq_ignore_ascii_case("Driver") {
                definition.driver_ref = value.clone();
            } else {
                definition.attributes.push((key.clone(), value.clone()));
            }
        }
        definition
    }

    /// The section written to `odbc.ini`: `Description` and `Driver` lead.
    ///
    /// `Driver` always comes from `driver_ref`; an attribute of that name is
    /// not written.
    pub fn to_section(&self) -> Section {
        let mut section = Section::new(self.name.clone());
        if let Some(description) = self.attribute("Description") {
            section.set("Description", description);
        }
        section.set("Driver", self.driver_ref.clone());
        for (key, value) in &self.attributes {
            if !key.eq_ignore_ascii_case("Description") && !key.eq_ignore_ascii_case("Driver") {
                section.set(key.clone(), value.clone());
            }
        }
        section
    }
}

/// Whether a `Driver` value names a library file rather than a driver.
pub fn looks_like_path(driver_ref: &str) -> bool {
    driver_ref.contains('/') || driver_ref.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_essential_defaults_do_not_overwrite() {
        let mut dsn = DataSourceDefinition::new("Prod", "MySQL")
            .with_attribute("wideasutf16", "No")
            .with_attribute("PwdClearText", "1");
        dsn.apply_essential_defaults();

        assert_eq!(dsn.attribute("WideAsUTF16"), Some("No"));
        assert!(dsn.attributes.iter().all(|(k, _)| k != "WideAsUTF16"));
        assert_eq!(dsn.attribute("PwdClearText"), Some("1"));
        assert_eq!(dsn.attribute("Daylight"), Some("Yes"));
        assert_eq!(dsn.attributes.len(), 6);
    }

    #[test]
    fn test_driver_section_roundtrip_keeps_extra_keys() {
        let section = Section::new("PG")
            .with("Description", "PostgreSQL")
            .with("Driver", "/usr/lib/psqlodbcw.so")
            .with("FileUsage", "1")
            .with("Threading", "0")
            .with("UsageCount", "3");
        let mut issues = Vec::new();
        let driver = DriverDefinition::from_section(&section, &mut issues);

        assert!(issues.is_empty());
        assert_eq!(driver.threading, Threading::Unserialized);
        assert_eq!(driver.usage_count, 3);
        assert_eq!(driver.extra, vec![("FileUsage".into(), "1".into())]);
        assert_eq!(driver.to_section().get("FileUsage"), Some("1"));
    }

    #[test]
    fn test_invalid_driver_values_reported() {
        let section = Section::new("Odd")
            .with("Threading", "7")
            .with("UsageCount", "many");
        let mut issues = Vec::new();
        let driver = DriverDefinition::from_section(&section, &mut issues);

        // Threading, UsageCount and the missing Driver key
        assert_eq!(issues.len(), 3);
        assert_eq!(driver.threading, Threading::Unserialized);
    }

    #[test]
    fn test_driver_attribute_cannot_replace_driver_ref() {
        let dsn = DataSourceDefinition::new("Prod", "MySQL").with_attribute("driver", "Ghost");
        let section = dsn.to_section();

        assert_eq!(
            section.entries.first(),
            Some(&(String::from("Driver"), String::from("MySQL")))
        );
        assert!(section.entries.iter().all(|(_, v)| v != "Ghost"));
    }

    #[test]
    fn test_driver_extra_keys_cannot_replace_typed_fields() {
        let mut driver = DriverDefinition::new("PG", "/usr/lib/psqlodbcw.so");
        driver.extra.push(("DRIVER".into(), "/tmp/evil.so".into()));
        driver.extra.push(("usagecount".into(), "9".into()));
        let section = driver.to_section();

        assert_eq!(section.get("Driver"), Some("/usr/lib/psqlodbcw.so"));
        assert_eq!(section.entries.len(), 3);
    }

    #[test]
    fn test_new_driver_section_layout() {
        let section = DriverDefinition::new("PG", "/no/such/file.so")
            .with_description("PG ODBC Driver")
            .with_setup("/no/such/file.so")
            .to_section();
        let keys: Vec<&str> = section.entries.iter().map(|(k, _)| k.as_str()).collect();

        assert_eq!(
            keys,
            vec!["Description", "Driver", "Setup", "Threading", "UsageCount"]
        );
        assert_eq!(section.get("Threading"), Some("1"));
    }

    #[test]
    fn test_dsn_section_leads_with_description_and_driver() {
        let dsn = DataSourceDefinition::new("Prod", "MySQL")
            .with_attribute("Server", "db.local")
            .with_attribute("Description", "Production");
        let section = dsn.to_section();

        assert_eq!(section.entries[0].0, "Description");
        assert_eq!(section.entries[1], ("Driver".into(), "MySQL".into()));
        assert_eq!(section.entries[2].0, "Server");
    }

    #[test]
    fn test_masked_attributes() {
        let dsn = DataSourceDefinition::new("Prod", "MySQL")
            .with_attribute("UID", "dba")
            .with_attribute("PWD", "secret");
        let masked = dsn.masked_attributes();

        assert_eq!(masked[1], ("PWD", "********".to_string()));
        assert!(dsn.has_stored_password());
        assert_eq!(dsn.stored_user(), Some("dba"));
    }

    #[test]
    fn test_looks_like_path() {
        assert!(looks_like_path("/usr/lib/libmyodbc8.so"));
        assert!(looks_like_path("C:\\odbc\\drv.dll"));
        assert!(!looks_like_path("MySQL ODBC 8.0 Unicode Driver"));
    }
}
