//! ODBC data source and driver administrator.
//!
//! Locates `odbc.ini` and `odbcinst.ini`, then runs an interactive menu for
//! listing, creating and testing data sources and registering drivers.
//!
//! # Security Guarantees
//! - Passwords are read without echo and never logged
//! - Connection strings are redacted before display
//! - Configuration files are re-read before every change

use clap::Parser;
use odbcadmin::{Cli, ConsoleTerminal, Navigator, SessionState, session};
use odbcadmin_core::{ConfigLocator, Result, logging::init_logging, probe::installed_managers};
use tracing::{debug, error};

async fn run(cli: &Cli) -> Result<()> {
    let mut term = ConsoleTerminal::new();
    let locator = ConfigLocator::from_process();

    let files = session::resolve_files(&locator, &cli.overrides(), &mut term)?;
    debug!(
        "Using {} and {}",
        files.dsn_path().display(),
        files.driver_path().display()
    );

    let session = SessionState::new(locator, files, cli.tester_config(), installed_managers())?;
    Navigator::new(&mut term, session).run().await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.global.verbose, cli.global.quiet)?;

    if let Err(e) = run(&cli).await {
        error!("odbcadmin stopped: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
