//! Arrow-key selection menus with a circular cursor.

use odbcadmin_core::Result;

use crate::terminal::{Key, Terminal};

/// Marker in front of the highlighted item.
pub const HIGHLIGHT: &str = "►";

/// Moves `position` by `delta` within `[0, len)`, wrapping at both ends.
///
/// # Example
/// ```rust
/// use odbcadmin::menu::wrap;
///
/// assert_eq!(wrap(4, 1, 5), 0);
/// assert_eq!(wrap(0, -1, 5), 4);
/// ```
pub fn wrap(position: usize, delta: isize, len: usize) -> usize {
    let Ok(len) = isize::try_from(len) else {
        return 0;
    };
    if len == 0 {
        return 0;
    }
    let current = isize::try_from(position).unwrap_or(0).rem_euclid(len);
    let moved = current.wrapping_add(delta.rem_euclid(len)).rem_euclid(len);
    usize::try_from(moved).unwrap_or(0)
}

/// Cursor over a fixed number of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    position: usize,
    len: usize,
}

impl Cursor {
    /// Cursor at `position` (wrapped into range).
    pub fn new(position: usize, len: usize) -> Self {
        Self {
            position: wrap(position, 0, len),
            len,
        }
    }

    /// Highlighted index.
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Moves one item up, wrapping to the last item.
    pub fn up(&mut self) {
        self.position = wrap(self.position, -1, self.len);
    }

    /// Moves one item down, wrapping to the first item.
    pub fn down(&mut self) {
        self.position = wrap(self.position, 1, self.len);
    }
}

/// Renders a menu with the highlighted item marked.
pub fn render(title: &str, items: &[String], cursor: &Cursor) -> String {
    let mut out = format!("{}\n\n", title);
    for (idx, item) in items.iter().enumerate() {
        if idx == cursor.position() {
            out.push_str(&format!("  {} {}\n", HIGHLIGHT, item));
        } else {
            out.push_str(&format!("    {}\n", item));
        }
    }
    out.push_str("\n↑/↓ or j/k to move, Enter to select, q to cancel\n");
    out
}

/// Runs a selection menu; `None` when cancelled or when there is nothing
/// to choose from.
///
/// # Errors
/// Returns a terminal error if input cannot be read.
pub fn select(
    term: &mut dyn Terminal,
    title: &str,
    items: &[String],
    initial: usize,
) -> Result<Option<usize>> {
    if items.is_empty() {
        return Ok(None);
    }
    let mut cursor = Cursor::new(initial, items.len());
    loop {
        term.clear()?;
        term.write(&render(title, items, &cursor))?;
        match term.read_key()? {
            Key::Up => cursor.up(),
            Key::Down => cursor.down(),
            Key::Enter => return Ok(Some(cursor.position())),
            Key::Cancel => return Ok(None),
            Key::Other => {}
        }
    }
}
