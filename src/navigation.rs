//! Screen history.
//!
//! The first entry is always the main menu and the last one is the screen
//! being shown. The controller loop renders whatever `current()` returns, so
//! "re-invoking" a screen is just the next iteration of that loop.

use std::fmt;

/// Words completed at every prompt.
pub const NAV_WORDS: [&str; 6] = ["back", "home", "quit", "exit", "help", "cancel"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Main,
    Devices,
    SearchResults,
    Campuses,
    Reports,
    Connectivity,
}

impl Screen {
    pub fn title(self) -> &'static str {
        match self {
            Screen::Main => "Main menu",
            Screen::Devices => "Devices",
            Screen::SearchResults => "Search results",
            Screen::Campuses => "Campuses",
            Screen::Reports => "Reports",
            Screen::Connectivity => "Connectivity",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Commands understood at every prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    Back,
    Home,
    Quit,
    Help,
}

impl NavCommand {
    /// Accepts `b`/`back`, `h`/`home`, `q`/`quit`/`exit` and `?`/`help`,
    /// ignoring case. These words are commands at every prompt, so none of
    /// them can be typed as a name or a search term.
    pub fn parse(input: &str) -> Option<NavCommand> {
        match input.trim().to_lowercase().as_str() {
            "b" | "back" => Some(NavCommand::Back),
            "h" | "home" => Some(NavCommand::Home),
            "q" | "quit" | "exit" => Some(NavCommand::Quit),
            "?" | "help" => Some(NavCommand::Help),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Navigator {
    stack: Vec<Screen>,
}

impl Default for Navigator {
    fn default() -> Self {
        Navigator {
            stack: vec![Screen::Main],
        }
    }
}

impl Navigator {
    pub fn new() -> Self {
        Navigator::default()
    }

    pub fn current(&self) -> Screen {
        self.stack.last().copied().unwrap_or(Screen::Main)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn stack(&self) -> &[Screen] {
        &self.stack
    }

    /// Opens a submenu. Entering the screen already shown is a no-op.
    pub fn enter(&mut self, screen: Screen) -> Screen {
        if screen == Screen::Main {
            return self.home();
        }
        if self.current() != screen {
            self.stack.push(screen);
        }
        self.current()
    }

    /// Returns to the previous screen; the main menu is never popped.
    pub fn back(&mut self) -> Screen {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
        self.current()
    }

    /// Drops all history above the main menu.
    pub fn home(&mut self) -> Screen {
        self.stack.truncate(1);
        self.current()
    }

    /// Breadcrumb such as `Main menu > Devices > Search results`.
    pub fn breadcrumb(&self) -> String {
        self.stack
            .iter()
            .map(|s| s.title())
            .collect::<Vec<_>>()
            .join(" > ")
    }
}
