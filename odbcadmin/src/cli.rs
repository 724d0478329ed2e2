//! Command-line arguments.

use clap::{Args, Parser, ValueEnum};
use odbcadmin_core::{ConfigOverrides, ManagerChoice, TesterConfig};
use std::path::PathBuf;
use std::time::Duration;

/// CLI argument structure
#[derive(Debug, Parser)]
#[command(name = "odbcadmin")]
#[command(about = "Terminal administrator for ODBC data sources and drivers")]
#[command(version)]
#[command(long_about = "
odbcadmin - ODBC data source and driver administrator

Finds the odbc.ini and odbcinst.ini files the driver manager uses, lists and
creates data sources, registers drivers and tests connections through the
installed driver manager (unixODBC or iODBC).

FILE DISCOVERY:
  Data sources: $ODBCINI, ~/.odbc.ini, ~/Library/ODBC/odbc.ini,
                /etc/odbc.ini, /usr/local/etc/odbc.ini
  Drivers:      $ODBCINST or $ODBCINSTINI, ~/.odbcinst.ini,
                ~/Library/ODBC/odbcinst.ini, /Library/ODBC/odbcinst.ini,
                /etc/odbcinst.ini, /usr/local/etc/odbcinst.ini

EXAMPLES:
  odbcadmin
  odbcadmin --odbcini ./odbc.ini --odbcinst ./odbcinst.ini
  odbcadmin --manager both --timeout 10 -v
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Data source file to use instead of searching
    #[arg(long, value_name = "PATH")]
    pub odbcini: Option<PathBuf>,

    /// Driver file to use instead of searching
    #[arg(long, value_name = "PATH")]
    pub odbcinst: Option<PathBuf>,

    /// Seconds to wait for a connection test
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// Driver manager used for connection tests
    #[arg(long, value_enum, default_value_t = ManagerArg::Auto)]
    pub manager: ManagerArg,
}

/// Logging flags shared by every invocation.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Increase log verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, help = "Only log errors")]
    pub quiet: bool,
}

/// `--manager` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ManagerArg {
    /// First driver manager found
    Auto,
    /// unixODBC (`isql`)
    Unixodbc,
    /// iODBC (`iodbctest`)
    Iodbc,
    /// Every driver manager found
    Both,
    /// In-process driver manager (built with the `odbc` feature)
    Linked,
}

impl From<ManagerArg> for ManagerChoice {
    fn from(arg: ManagerArg) -> Self {
        match arg {
            ManagerArg::Auto => Self::Auto,
            ManagerArg::Unixodbc => Self::UnixOdbc,
            ManagerArg::Iodbc => Self::Iodbc,
            ManagerArg::Both => Self::Both,
            ManagerArg::Linked => Self::Linked,
        }
    }
}

impl Cli {
    /// Explicit file paths given on the command line.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            dsn: self.odbcini.clone(),
            driver: self.odbcinst.clone(),
        }
    }

    /// Probe settings from the command line.
    pub fn tester_config(&self) -> TesterConfig {
        TesterConfig {
            timeout: Duration::from_secs(self.timeout.max(1)),
            choice: self.manager.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["odbcadmin"]).expect("parse");

        assert_eq!(cli.global.verbose, 0);
        assert!(!cli.global.quiet);
        assert_eq!(cli.overrides(), ConfigOverrides::default());
        assert_eq!(cli.tester_config(), TesterConfig::default());
    }

    #[test]
    fn test_overrides_and_manager() {
        let cli = Cli::try_parse_from([
            "odbcadmin",
            "--odbcini",
            "/tmp/odbc.ini",
            "--manager",
            "both",
            "--timeout",
            "5",
            "-vv",
        ])
        .expect("parse");

        assert_eq!(cli.overrides().dsn, Some(PathBuf::from("/tmp/odbc.ini")));
        assert_eq!(cli.overrides().driver, None);
        assert_eq!(cli.tester_config().choice, ManagerChoice::Both);
        assert_eq!(cli.tester_config().timeout, Duration::from_secs(5));
        assert_eq!(cli.global.verbose, 2);
    }

    #[test]
    fn test_unknown_manager_rejected() {
        assert!(Cli::try_parse_from(["odbcadmin", "--manager", "odbc32"]).is_err());
    }
}
