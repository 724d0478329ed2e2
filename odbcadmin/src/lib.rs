//! Terminal front end for odbcadmin.
//!
//! The binary is a thin wrapper: [`cli`] parses flags, [`session`] resolves
//! the configuration files, and [`navigator`] runs the menus over any
//! [`terminal::Terminal`], so every screen can be driven from tests.

pub mod cli;
pub mod menu;
pub mod navigator;
pub mod session;
pub mod terminal;

pub use cli::Cli;
pub use navigator::{Navigator, State};
pub use session::SessionState;
pub use terminal::{ConsoleTerminal, Key, Terminal};
