//! Terminal menu state machine.
//!
//! Every action starts from [`State::Main`] and returns to it; only
//! [`State::Exit`] ends the loop. Validation and I/O problems inside an
//! action are shown to the user and the machine goes back to the main menu.
//! Terminal failures end the session.

use odbcadmin_core::locator::{ensure_file, user_selected};
use odbcadmin_core::{
    Candidate, ConfigFileSet, ConfigKind, ConnectionProbeResult, CredentialPolicy,
    CredentialPrompt, Credentials, DataSourceDefinition, DriverDefinition, DriverResolution,
    EntryKind, ManagerChoice, OdbcAdminError, ResolvedPath, Result,
};
use std::path::Path;
use tracing::{debug, warn};

use crate::menu::select;
use crate::session::SessionState;
use crate::terminal::Terminal;

/// Navigator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Main menu
    Main,
    /// Data sources grouped by driver
    ListDsn,
    /// One data source with masked passwords
    ShowDsnDetail,
    /// Connection test of a registered data source
    TestDsn,
    /// Connection test of any data source name
    TestCustomDsn,
    /// New data source wizard
    AddDsn,
    /// Registered drivers
    ListDrivers,
    /// One driver
    ShowDriverDetail,
    /// Driver registration wizard
    RegisterDriver,
    /// Choose different configuration files
    Reconfigure,
    /// Re-read the configuration files
    Refresh,
    /// Leave the program
    Exit,
}

impl State {
    /// Main-menu label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Main => "Main menu",
            Self::ListDsn => "List data sources",
            Self::ShowDsnDetail => "Show data source details",
            Self::TestDsn => "Test a data source",
            Self::TestCustomDsn => "Test a data source by name",
            Self::AddDsn => "Add a data source",
            Self::ListDrivers => "List drivers",
            Self::ShowDriverDetail => "Show driver details",
            Self::RegisterDriver => "Register a new driver",
            Self::Reconfigure => "Select configuration files",
            Self::Refresh => "Reload configuration files",
            Self::Exit => "Exit",
        }
    }
}

/// Main-menu entries in display order.
pub const MAIN_MENU: [State; 11] = [
    State::ListDsn,
    State::ShowDsnDetail,
    State::TestDsn,
    State::TestCustomDsn,
    State::AddDsn,
    State::ListDrivers,
    State::ShowDriverDetail,
    State::RegisterDriver,
    State::Reconfigure,
    State::Refresh,
    State::Exit,
];

const MANAGER_CHOICES: [ManagerChoice; 5] = [
    ManagerChoice::Auto,
    ManagerChoice::UnixOdbc,
    ManagerChoice::Iodbc,
    ManagerChoice::Both,
    ManagerChoice::Linked,
];

/// Default server offered by the data source wizard.
pub const DEFAULT_SERVER: &str = "localhost";
/// Default port offered by the data source wizard.
pub const DEFAULT_PORT: &str = "1111";
/// Default database offered by the data source wizard.
pub const DEFAULT_DATABASE: &str = "DB";
/// Default user offered by the data source wizard.
pub const DEFAULT_USER: &str = "dba";

/// Asks for test credentials through the terminal.
struct TerminalPrompt<'a> {
    term: &'a mut dyn Terminal,
}

impl CredentialPrompt for TerminalPrompt<'_> {
    fn prompt_credentials(
        &mut self,
        dsn: &str,
        stored_user: Option<&str>,
    ) -> Result<Option<Credentials>> {
        self.term
            .line(&format!("Credentials for '{}' (empty user keeps the stored ones)", dsn))?;
        let Some(user) = self
            .term
            .ask("Username", stored_user.unwrap_or_default())?
            .filter(|user| !user.is_empty())
        else {
            return Ok(None);
        };
        let password = self
            .term
            .read_secret("Password: ")?
            .filter(|password| !password.is_empty());
        Ok(Some(Credentials::new(user, password)))
    }
}

/// Drives the menus over a terminal and a session.
pub struct Navigator<'t> {
    term: &'t mut dyn Terminal,
    session: SessionState,
}

impl<'t> Navigator<'t> {
    /// Creates a navigator in the main menu.
    pub fn new(term: &'t mut dyn Terminal, session: SessionState) -> Self {
        Self { term, session }
    }

    /// Current session.
    pub const fn session(&self) -> &SessionState {
        &self.session
    }

    /// Ends the navigator, returning the session.
    pub fn into_session(self) -> SessionState {
        self.session
    }

    /// Runs until the user exits.
    ///
    /// # Errors
    /// Returns only fatal errors (terminal failures).
    pub async fn run(&mut self) -> Result<()> {
        let mut state = State::Main;
        while state != State::Exit {
            state = self.step(state).await?;
        }
        self.term.line("Goodbye.")
    }

    /// Performs one state and returns the next.
    ///
    /// # Errors
    /// Returns only fatal errors; anything else is shown and leads back to
    /// the main menu.
    pub async fn step(&mut self, state: State) -> Result<State> {
        debug!("Entering {:?}", state);
        let outcome = match state {
            State::Main => self.main_menu(),
            State::ListDsn => self.list_dsns(),
            State::ShowDsnDetail => self.show_dsn_detail(),
            State::TestDsn => self.test_dsn().await,
            State::TestCustomDsn => self.test_custom_dsn().await,
            State::AddDsn => self.add_dsn().await,
            State::ListDrivers => self.list_drivers(),
            State::ShowDriverDetail => self.show_driver_detail(),
            State::RegisterDriver => self.register_driver(),
            State::Reconfigure => self.reconfigure(),
            State::Refresh => self.refresh(),
            State::Exit => Ok(State::Exit),
        };

        match outcome {
            Ok(next) => Ok(next),
            Err(error) if error.is_fatal() => Err(error),
            Err(error) => {
                warn!("{} failed: {}", state.label(), error);
                self.term.line(&format!("\n✗ {}", error))?;
                self.term.pause()?;
                Ok(State::Main)
            }
        }
    }

    fn main_menu(&mut self) -> Result<State> {
        let files = self.session.files();
        let title = format!(
            "ODBC Driver Administrator\n  Data sources: {} ({})\n  Drivers:      {} ({})",
            files.dsn.path.display(),
            files.dsn.provenance,
            files.driver.path.display(),
            files.driver.provenance
        );
        let labels: Vec<String> = MAIN_MENU.iter().map(|s| s.label().to_string()).collect();

        match select(&mut *self.term, &title, &labels, self.session.cursor)? {
            Some(idx) => {
                self.session.cursor = idx;
                Ok(MAIN_MENU.get(idx).copied().unwrap_or(State::Main))
            }
            None => Ok(State::Exit),
        }
    }

    fn cancelled(&mut self) -> Result<State> {
        self.term.line("Cancelled; nothing was written.")?;
        self.term.pause()?;
        Ok(State::Main)
    }

    fn pick_dsn(&mut self, title: &str) -> Result<Option<String>> {
        let names = self.session.registry().dsn_names();
        if names.is_empty() {
            self.term.line(&format!(
                "No data sources are defined in {}",
                self.session.files().dsn_path().display()
            ))?;
            self.term.pause()?;
            return Ok(None);
        }
        Ok(select(&mut *self.term, title, &names, 0)?.and_then(|idx| names.get(idx).cloned()))
    }

    fn pick_driver(&mut self, title: &str) -> Result<Option<String>> {
        let names = self.session.registry().driver_names();
        if names.is_empty() {
            self.term.line(&format!(
                "No drivers are registered in {}",
                self.session.files().driver_path().display()
            ))?;
            self.term.pause()?;
            return Ok(None);
        }
        Ok(select(&mut *self.term, title, &names, 0)?.and_then(|idx| names.get(idx).cloned()))
    }

    fn list_dsns(&mut self) -> Result<State> {
        let registry = self.session.registry();
        let mut out = format!(
            "Data sources in {}\n",
            self.session.files().dsn_path().display()
        );
        let groups = registry.dsns_by_driver();
        if groups.is_empty() {
            out.push_str("\n  (none)\n");
        }
        for (driver, dsns) in groups {
            let header = match dsns.first().map(|dsn| registry.resolve_driver(dsn)) {
                Some(DriverResolution::Registered(_)) => driver.to_string(),
                Some(DriverResolution::ByLibraryPath(d)) => {
                    format!("{} (driver '{}')", driver, d.name)
                }
                Some(DriverResolution::DirectLibrary(_)) => {
                    format!("{}  (library path)", driver)
                }
                Some(DriverResolution::Dangling) | None => {
                    format!("{}  ✗ not registered", driver)
                }
            };
            out.push_str(&format!("\n{}\n", header));
            for dsn in dsns {
                let summary = dsn
                    .attribute("Description")
                    .map(str::to_string)
                    .or_else(|| {
                        dsn.attribute("Server").map(|server| match dsn.attribute("Port") {
                            Some(port) => format!("{}:{}", server, port),
                            None => server.to_string(),
                        })
                    })
                    .unwrap_or_default();
                out.push_str(&format!("  • {:<24} {}\n", dsn.name, summary));
            }
        }
        self.term.clear()?;
        self.term.write(&out)?;
        self.term.pause()?;
        Ok(State::Main)
    }

    fn dsn_detail(&self, name: &str) -> Option<String> {
        let registry = self.session.registry();
        let dsn = registry.get_dsn(name)?;

        let mut out = format!("[{}]\n", dsn.name);
        out.push_str(&format!("  {:<20} = {}\n", "Driver", dsn.driver_ref));
        for (key, value) in dsn.masked_attributes() {
            out.push_str(&format!("  {:<20} = {}\n", key, value));
        }
        out.push('\n');
        out.push_str(&match registry.resolve_driver(dsn) {
            DriverResolution::Registered(driver) | DriverResolution::ByLibraryPath(driver) => {
                format!(
                    "Driver '{}' uses {} {}\n",
                    driver.name,
                    driver.library_path,
                    library_mark(Path::new(&driver.library_path))
                )
            }
            DriverResolution::DirectLibrary(path) => {
                format!("Driver library {} {}\n", path.display(), library_mark(&path))
            }
            DriverResolution::Dangling => format!(
                "✗ Driver '{}' is not registered in {}\n",
                dsn.driver_ref,
                registry.driver_path().display()
            ),
        });
        Some(out)
    }

    fn show_dsn_detail(&mut self) -> Result<State> {
        let Some(name) = self.pick_dsn("Select data source")? else {
            return Ok(State::Main);
        };
        let detail = self.dsn_detail(&name).unwrap_or_default();
        self.term.clear()?;
        self.term.write(&detail)?;
        self.term.pause()?;
        Ok(State::Main)
    }

    async fn test_dsn(&mut self) -> Result<State> {
        let Some(name) = self.pick_dsn("Select data source to test")? else {
            return Ok(State::Main);
        };
        let mut choice = self.session.tester_config().choice;

        loop {
            let modes = vec![
                "Use credentials stored in the data source".to_string(),
                "Enter credentials for this test".to_string(),
            ];
            let title = format!("Credentials for '{}'", name);
            let Some(mode) = select(&mut *self.term, &title, &modes, 0)? else {
                return Ok(State::Main);
            };

            self.term.line(&format!("\nTesting '{}' via {}...", name, choice))?;
            let tester = self.session.tester();
            let result = if mode == 1 {
                let mut prompt = TerminalPrompt {
                    term: &mut *self.term,
                };
                tester
                    .test_using(
                        self.session.registry(),
                        &name,
                        CredentialPolicy::PromptInteractive(&mut prompt),
                        choice,
                    )
                    .await?
            } else {
                tester
                    .test_using(
                        self.session.registry(),
                        &name,
                        CredentialPolicy::UseStored,
                        choice,
                    )
                    .await?
            };

            let options: Vec<String> = if result.is_success() {
                vec!["Test again".into(), "Return to main menu".into()]
            } else {
                vec![
                    "Try again".into(),
                    "Try a different driver manager".into(),
                    "Show driver configuration".into(),
                    "Return to main menu".into(),
                ]
            };
            let title = format!("{}\nWhat next?", format_result(&name, &result));
            match select(&mut *self.term, &title, &options, options.len().saturating_sub(1))? {
                Some(0) => {}
                Some(1) if !result.is_success() => {
                    let Some(picked) = self.pick_manager(choice)? else {
                        return Ok(State::Main);
                    };
                    choice = picked;
                }
                Some(2) if !result.is_success() => {
                    let detail = self.driver_detail_for_dsn(&name);
                    self.term.clear()?;
                    self.term.write(&detail)?;
                    self.term.pause()?;
                    return Ok(State::Main);
                }
                _ => return Ok(State::Main),
            }
        }
    }

    fn driver_detail_for_dsn(&self, name: &str) -> String {
        let registry = self.session.registry();
        let mut out = self.dsn_detail(name).unwrap_or_default();
        if let Some(driver) = registry
            .get_dsn(name)
            .and_then(|dsn| match registry.resolve_driver(dsn) {
                DriverResolution::Registered(d) | DriverResolution::ByLibraryPath(d) => Some(d),
                _ => None,
            })
        {
            out.push('\n');
            out.push_str(&self.driver_detail(&driver.name).unwrap_or_default());
        }
        out
    }

    fn pick_manager(&mut self, current: ManagerChoice) -> Result<Option<ManagerChoice>> {
        let available = self.session.tester().available();
        let labels: Vec<String> = MANAGER_CHOICES
            .iter()
            .map(|choice| choice.to_string())
            .collect();
        let title = format!(
            "Select driver manager (installed: {})",
            if available.is_empty() {
                "none".to_string()
            } else {
                available
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        );
        let initial = MANAGER_CHOICES
            .iter()
            .position(|choice| *choice == current)
            .unwrap_or(0);
        Ok(select(&mut *self.term, &title, &labels, initial)?
            .and_then(|idx| MANAGER_CHOICES.get(idx).copied()))
    }

    async fn test_custom_dsn(&mut self) -> Result<State> {
        let Some(name) = self
            .term
            .read_line("Data source name (empty to cancel): ")?
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
        else {
            return Ok(State::Main);
        };
        let current = self.session.tester_config().choice;
        let Some(choice) = self.pick_manager(current)? else {
            return Ok(State::Main);
        };

        self.term.line(&format!("\nTesting '{}' via {}...", name, choice))?;
        let result = self.session.tester().test_custom(&name, choice).await;
        self.term.clear()?;
        self.term.write(&format_result(&name, &result))?;
        self.term.pause()?;
        Ok(State::Main)
    }

    async fn add_dsn(&mut self) -> Result<State> {
        let Some(name) = self
            .term
            .read_line("New data source name (empty to cancel): ")?
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
        else {
            return self.cancelled();
        };
        if self.session.registry().get_dsn(&name).is_some() {
            return Err(OdbcAdminError::duplicate(EntryKind::DataSource, name));
        }

        let drivers = self.session.registry().driver_names();
        if drivers.is_empty() {
            self.term.line("No drivers are registered. Register a driver first.")?;
            self.term.pause()?;
            return Ok(State::Main);
        }
        let title = format!("Driver for '{}'", name);
        let Some(driver) = select(&mut *self.term, &title, &drivers, 0)?
            .and_then(|idx| drivers.get(idx).cloned())
        else {
            return self.cancelled();
        };

        let mut definition = DataSourceDefinition::new(name.clone(), driver);
        for (key, default) in [
            ("Server", DEFAULT_SERVER),
            ("Port", DEFAULT_PORT),
            ("Database", DEFAULT_DATABASE),
            ("UID", DEFAULT_USER),
        ] {
            let Some(value) = self.term.ask(key, default)? else {
                return self.cancelled();
            };
            definition.set_attribute(key, value);
        }
        let Some(password) = self
            .term
            .read_secret("Password (empty to not store one): ")?
        else {
            return self.cancelled();
        };
        if !password.is_empty() {
            definition.set_attribute("PWD", password);
        }
        let Some(description) = self.term.ask("Description", &format!("{} DSN", name))? else {
            return self.cancelled();
        };
        definition.set_attribute("Description", description);

        self.session.registry_mut().add_dsn(definition)?;
        self.term.line(&format!(
            "✓ Created data source '{}' in {}",
            name,
            self.session.files().dsn_path().display()
        ))?;

        if self.term.confirm("Test the new data source now?", false)? == Some(true) {
            self.term.line(&format!("\nTesting '{}'...", name))?;
            let result = self
                .session
                .tester()
                .test(self.session.registry(), &name, CredentialPolicy::UseStored)
                .await?;
            self.term.write(&format_result(&name, &result))?;
        }
        self.term.pause()?;
        Ok(State::Main)
    }

    fn list_drivers(&mut self) -> Result<State> {
        let registry = self.session.registry();
        let mut out = format!(
            "Drivers in {}\n\n",
            self.session.files().driver_path().display()
        );
        let drivers = registry.list_drivers();
        if drivers.is_empty() {
            out.push_str("  (none)\n");
        }
        for driver in drivers {
            out.push_str(&format!(
                "  {} {:<24} {}\n",
                library_mark(Path::new(&driver.library_path)),
                driver.name,
                driver.library_path
            ));
            if let Some(description) = &driver.description {
                out.push_str(&format!("      {}\n", description));
            }
        }
        out.push_str("\n✓ library found   ✗ library missing\n");
        self.term.clear()?;
        self.term.write(&out)?;
        self.term.pause()?;
        Ok(State::Main)
    }

    fn driver_detail(&self, name: &str) -> Option<String> {
        let registry = self.session.registry();
        let driver = registry.get_driver(name)?;

        let mut out = format!("[{}]\n", driver.name);
        for (key, value) in driver.to_section().entries {
            out.push_str(&format!("  {:<20} = {}\n", key, value));
        }
        out.push_str(&format!(
            "\nLibrary {} {}\n",
            driver.library_path,
            library_mark(Path::new(&driver.library_path))
        ));

        let users: Vec<&str> = registry
            .list_dsns()
            .into_iter()
            .filter(|dsn| {
                matches!(
                    registry.resolve_driver(dsn),
                    DriverResolution::Registered(d) | DriverResolution::ByLibraryPath(d)
                        if d.name == driver.name
                )
            })
            .map(|dsn| dsn.name.as_str())
            .collect();
        out.push_str(&format!(
            "Used by: {}\n",
            if users.is_empty() {
                "(no data sources)".to_string()
            } else {
                users.join(", ")
            }
        ));
        Some(out)
    }

    fn show_driver_detail(&mut self) -> Result<State> {
        let Some(name) = self.pick_driver("Select driver")? else {
            return Ok(State::Main);
        };
        let detail = self.driver_detail(&name).unwrap_or_default();
        self.term.clear()?;
        self.term.write(&detail)?;
        self.term.pause()?;
        Ok(State::Main)
    }

    fn register_driver(&mut self) -> Result<State> {
        let Some(name) = self
            .term
            .read_line("Driver name (empty to cancel): ")?
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
        else {
            return self.cancelled();
        };
        let Some(library) = self
            .term
            .read_line("Driver library path (empty to cancel): ")?
            .map(|path| path.trim().to_string())
            .filter(|path| !path.is_empty())
        else {
            return self.cancelled();
        };
        if !Path::new(&library).exists() {
            self.term.line(&format!("⚠ {} does not exist", library))?;
            if self.term.confirm("Register it anyway?", false)? != Some(true) {
                return self.cancelled();
            }
        }

        let Some(description) = self
            .term
            .ask("Description", &format!("{} ODBC Driver", name))?
        else {
            return self.cancelled();
        };
        let Some(setup) = self.term.ask("Setup library", &library)? else {
            return self.cancelled();
        };

        let exists = self.session.registry().get_driver(&name).is_some();
        if exists {
            let question = format!("Driver '{}' is already registered. Replace it?", name);
            if self.term.confirm(&question, false)? != Some(true) {
                return self.cancelled();
            }
        }

        let definition = DriverDefinition::new(name.clone(), library)
            .with_description(description)
            .with_setup(setup);
        self.session
            .registry_mut()
            .add_driver(definition, exists)?;
        self.term.line(&format!(
            "✓ {} driver '{}' in {}",
            if exists { "Replaced" } else { "Registered" },
            name,
            self.session.files().driver_path().display()
        ))?;
        self.term.pause()?;
        Ok(State::Main)
    }

    fn reconfigure(&mut self) -> Result<State> {
        let current = self.session.files().clone();
        let locator = self.session.locator();
        let mut title = String::from("Configuration file candidates\n");
        for (kind, in_use) in [
            (ConfigKind::DataSources, &current.dsn),
            (ConfigKind::Drivers, &current.driver),
        ] {
            title.push_str(&format!("\n{} files:\n", capitalize(&kind.to_string())));
            for candidate in locator.candidates(kind) {
                title.push_str(&describe_candidate(&candidate, &in_use.path));
            }
            if !locator
                .candidates(kind)
                .iter()
                .any(|candidate| candidate.path == in_use.path)
            {
                title.push_str(&format!(
                    "  ✓ {} ({})  ← in use\n",
                    in_use.path.display(),
                    in_use.provenance
                ));
            }
        }

        let options = vec![
            "Search the standard locations again".to_string(),
            "Enter paths manually".to_string(),
            "Return to main menu".to_string(),
        ];
        let files = match select(&mut *self.term, &title, &options, 0)? {
            Some(0) => {
                let partial = locator.resolve_partial();
                for kind in partial.missing() {
                    self.term.line(&format!(
                        "No {} file found; keeping the current one",
                        kind
                    ))?;
                }
                ConfigFileSet {
                    dsn: partial.dsn.unwrap_or(current.dsn),
                    driver: partial.driver.unwrap_or(current.driver),
                }
            }
            Some(1) => {
                let Some(dsn) = self.ask_path("Data source file", &current.dsn)? else {
                    return self.cancelled();
                };
                let Some(driver) = self.ask_path("Driver file", &current.driver)? else {
                    return self.cancelled();
                };
                ConfigFileSet { dsn, driver }
            }
            _ => return Ok(State::Main),
        };

        self.session.switch_files(files)?;
        let registry = self.session.registry();
        self.term.line(&format!(
            "Now using {} and {} ({} data sources, {} drivers)",
            self.session.files().dsn_path().display(),
            self.session.files().driver_path().display(),
            registry.dsn_names().len(),
            registry.driver_names().len()
        ))?;
        self.term.pause()?;
        Ok(State::Main)
    }

    /// Asks for a file path, keeping `current` on an empty answer and
    /// offering to create a missing file.
    fn ask_path(&mut self, label: &str, current: &ResolvedPath) -> Result<Option<ResolvedPath>> {
        let shown = current.path.display().to_string();
        let Some(answer) = self.term.ask(label, &shown)? else {
            return Ok(None);
        };
        if answer == shown {
            return Ok(Some(current.clone()));
        }

        let selected = user_selected(Path::new(&answer));
        if selected.path.is_dir() {
            return Err(OdbcAdminError::configuration(format!(
                "{} is a directory",
                selected.path.display()
            )));
        }
        if !selected.path.exists() {
            let question = format!("{} does not exist. Create it?", selected.path.display());
            if self.term.confirm(&question, true)? != Some(true) {
                return Ok(None);
            }
            ensure_file(&selected.path)?;
        }
        Ok(Some(selected))
    }

    fn refresh(&mut self) -> Result<State> {
        self.session.reload()?;
        let registry = self.session.registry();
        let mut out = format!(
            "Reloaded {} data sources and {} drivers\n",
            registry.dsn_names().len(),
            registry.driver_names().len()
        );
        if registry.issues().is_empty() {
            out.push_str("No problems found.\n");
        } else {
            out.push_str("\nProblems:\n");
            for issue in registry.issues() {
                out.push_str(&format!("  ⚠ {}\n", issue));
            }
        }
        self.term.write(&out)?;
        self.term.pause()?;
        Ok(State::Main)
    }
}

/// Result of a connection test as shown to the user.
pub fn format_result(name: &str, result: &ConnectionProbeResult) -> String {
    let mut out = format!("Target:  {}\n", result.target);
    if let Some(manager) = result.manager {
        out.push_str(&format!("Manager: {}\n", manager));
    }
    if result.is_success() {
        out.push_str(&format!(
            "✓ '{}' is working ({:.2?})\n",
            name, result.elapsed
        ));
        return out;
    }

    let code = result
        .code
        .as_deref()
        .map(|code| format!(" [{}]", code))
        .unwrap_or_default();
    out.push_str(&format!(
        "✗ '{}' failed: {}{} ({:.2?})\n  {}\n",
        name, result.outcome, code, result.elapsed, result.message
    ));
    out.push_str("\nTroubleshooting tips:\n");
    for (idx, tip) in result.outcome.tips().iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", idx.saturating_add(1), tip));
    }
    out
}

fn library_mark(path: &Path) -> &'static str {
    if path.exists() { "✓" } else { "✗" }
}

fn describe_candidate(candidate: &Candidate, in_use: &Path) -> String {
    format!(
        "  {} {} ({}){}\n",
        if candidate.exists { "✓" } else { "✗" },
        candidate.path.display(),
        candidate.provenance,
        if candidate.path == in_use { "  ← in use" } else { "" }
    )
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}
