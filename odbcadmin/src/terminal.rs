//! Terminal input and output behind a trait, so the navigator runs without
//! a TTY in tests.

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::{cursor, execute, terminal};
use odbcadmin_core::{OdbcAdminError, Result};
use std::io::{self, BufRead, Write};

/// A menu key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Arrow up or `k`
    Up,
    /// Arrow down or `j`
    Down,
    /// Enter
    Enter,
    /// `q`, Esc or Ctrl-C
    Cancel,
    /// Anything else
    Other,
}

/// What the navigator needs from a terminal.
pub trait Terminal {
    /// Blocks for one menu key.
    ///
    /// # Errors
    /// Returns a terminal error if input cannot be read.
    fn read_key(&mut self) -> Result<Key>;

    /// Reads one line after showing `prompt`; `None` on end of input.
    ///
    /// # Errors
    /// Returns a terminal error if input cannot be read.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;

    /// Reads one line without echo; `None` on end of input.
    ///
    /// # Errors
    /// Returns a terminal error if input cannot be read.
    fn read_secret(&mut self, prompt: &str) -> Result<Option<String>>;

    /// Writes text as-is.
    ///
    /// # Errors
    /// Returns a terminal error if output cannot be written.
    fn write(&mut self, text: &str) -> Result<()>;

    /// Clears the screen before a menu is drawn.
    ///
    /// # Errors
    /// Returns a terminal error if output cannot be written.
    fn clear(&mut self) -> Result<()> {
        Ok(())
    }

    /// Writes text followed by a newline.
    ///
    /// # Errors
    /// Returns a terminal error if output cannot be written.
    fn line(&mut self, text: &str) -> Result<()> {
        self.write(text)?;
        self.write("\n")
    }

    /// Prompts with a default shown in brackets; an empty answer takes it.
    ///
    /// # Errors
    /// Returns a terminal error if input cannot be read.
    fn ask(&mut self, label: &str, default: &str) -> Result<Option<String>> {
        let prompt = if default.is_empty() {
            format!("{}: ", label)
        } else {
            format!("{} [{}]: ", label, default)
        };
        Ok(self.read_line(&prompt)?.map(|answer| {
            let answer = answer.trim();
            if answer.is_empty() {
                default.to_string()
            } else {
                answer.to_string()
            }
        }))
    }

    /// Yes/no question; `None` on end of input.
    ///
    /// # Errors
    /// Returns a terminal error if input cannot be read.
    fn confirm(&mut self, question: &str, default: bool) -> Result<Option<bool>> {
        let hint = if default { "Y/n" } else { "y/N" };
        let Some(answer) = self.read_line(&format!("{} [{}]: ", question, hint))? else {
            return Ok(None);
        };
        Ok(Some(match answer.trim().to_ascii_lowercase().as_str() {
            "" => default,
            "y" | "yes" => true,
            _ => false,
        }))
    }

    /// Waits for any key.
    ///
    /// # Errors
    /// Returns a terminal error if input cannot be read.
    fn pause(&mut self) -> Result<()> {
        self.write("\nPress any key to continue...")?;
        self.read_key()?;
        self.write("\n")
    }
}

/// Maps a crossterm key event onto a menu key.
pub fn map_key(code: KeyCode, modifiers: KeyModifiers) -> Key {
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Key::Cancel,
        KeyCode::Up | KeyCode::Char('k') => Key::Up,
        KeyCode::Down | KeyCode::Char('j') => Key::Down,
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc | KeyCode::Char('q') => Key::Cancel,
        _ => Key::Other,
    }
}

/// Restores cooked mode when dropped.
struct RawMode;

impl RawMode {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode()
            .map_err(|e| OdbcAdminError::terminal("Failed to enter raw mode", e))?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::warn!("Failed to leave raw mode: {}", e);
        }
    }
}

/// The process's own terminal: crossterm for keys, stdin for lines,
/// rpassword for secrets.
#[derive(Debug, Default)]
pub struct ConsoleTerminal;

impl ConsoleTerminal {
    /// Creates the console terminal.
    pub const fn new() -> Self {
        Self
    }

    fn flush() -> Result<()> {
        io::stdout()
            .flush()
            .map_err(|e| OdbcAdminError::terminal("Failed to flush stdout", e))
    }
}

impl Terminal for ConsoleTerminal {
    fn read_key(&mut self) -> Result<Key> {
        Self::flush()?;
        let _raw = RawMode::enable()?;
        loop {
            let event =
                event::read().map_err(|e| OdbcAdminError::terminal("Failed to read key", e))?;
            if let Event::Key(key) = event
                && key.kind == KeyEventKind::Press
            {
                return Ok(map_key(key.code, key.modifiers));
            }
        }
    }

    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        self.write(prompt)?;
        Self::flush()?;
        let mut buffer = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut buffer)
            .map_err(|e| OdbcAdminError::terminal("Failed to read input", e))?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(buffer.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn read_secret(&mut self, prompt: &str) -> Result<Option<String>> {
        self.write(prompt)?;
        Self::flush()?;
        match rpassword::read_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => {
                // No controlling terminal: fall back to a visible line
                tracing::debug!("Masked input unavailable: {}", e);
                self.read_line("")
            }
        }
    }

    fn write(&mut self, text: &str) -> Result<()> {
        // Raw mode is only active inside read_key, so plain newlines are fine
        io::stdout()
            .write_all(text.as_bytes())
            .map_err(|e| OdbcAdminError::terminal("Failed to write output", e))
    }

    fn clear(&mut self) -> Result<()> {
        execute!(
            io::stdout(),
            terminal::Clear(terminal::ClearType::All),
            cursor::MoveTo(0, 0)
        )
        .map_err(|e| OdbcAdminError::terminal("Failed to clear screen", e))
    }
}
