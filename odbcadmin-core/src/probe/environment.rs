//! Environment handed to the driver manager for one probe.

use std::ffi::{OsStr, OsString};

use crate::locator::ConfigFileSet;

/// Variables the driver manager is told about explicitly.
pub const CONFIG_VARIABLES: [&str; 3] = ["ODBCINI", "ODBCINST", "ODBCINSTINI"];

/// Tracing variables copied through when the user has set them.
pub const PASSTHROUGH_VARIABLES: [&str; 2] = ["ODBCTRACE", "ODBCTRACEFILE"];

/// The variables a backend must expose to the driver manager so it reads the
/// same files this tool manages.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DriverManagerEnvironment {
    vars: Vec<(String, OsString)>,
}

impl DriverManagerEnvironment {
    /// Builds the environment from the selected files and the process
    /// environment for pass-through variables.
    pub fn from_files(files: &ConfigFileSet) -> Self {
        Self::from_files_with(files, |name| std::env::var_os(name))
    }

    /// Builds the environment with an explicit lookup for pass-through
    /// variables.
    pub fn from_files_with<F>(files: &ConfigFileSet, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let dsn = files.dsn_path().as_os_str().to_os_string();
        let driver = files.driver_path().as_os_str().to_os_string();

        let mut vars = vec![
            ("ODBCINI".to_string(), dsn),
            ("ODBCINST".to_string(), driver.clone()),
            ("ODBCINSTINI".to_string(), driver),
        ];
        for name in PASSTHROUGH_VARIABLES {
            if let Some(value) = lookup(name).filter(|v| !v.is_empty()) {
                vars.push((name.to_string(), value));
            }
        }
        Self { vars }
    }

    /// Variables in application order.
    pub fn vars(&self) -> impl Iterator<Item = (&str, &OsStr)> {
        self.vars
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_os_str()))
    }

    /// Value of one variable.
    pub fn get(&self, name: &str) -> Option<&OsStr> {
        self.vars
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_os_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::user_selected;
    use std::path::Path;

    fn files() -> ConfigFileSet {
        ConfigFileSet {
            dsn: user_selected(Path::new("/cfg/odbc.ini")),
            driver: user_selected(Path::new("/cfg/odbcinst.ini")),
        }
    }

    #[test]
    fn test_config_variables_point_at_selected_files() {
        let env = DriverManagerEnvironment::from_files_with(&files(), |_| None);

        assert_eq!(env.get("ODBCINI"), Some(OsStr::new("/cfg/odbc.ini")));
        assert_eq!(env.get("ODBCINST"), Some(OsStr::new("/cfg/odbcinst.ini")));
        assert_eq!(env.get("ODBCINSTINI"), Some(OsStr::new("/cfg/odbcinst.ini")));
        assert_eq!(env.get("ODBCTRACE"), None);
    }

    #[test]
    fn test_trace_variables_pass_through() {
        let env = DriverManagerEnvironment::from_files_with(&files(), |name| match name {
            "ODBCTRACE" => Some(OsString::from("1")),
            "ODBCTRACEFILE" => Some(OsString::new()),
            _ => None,
        });

        assert_eq!(env.get("ODBCTRACE"), Some(OsStr::new("1")));
        assert_eq!(env.get("ODBCTRACEFILE"), None);
        assert_eq!(env.vars().count(), 4);
    }
}
