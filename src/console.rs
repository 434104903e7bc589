//! Line-oriented console used by every menu and prompt.
//!
//! The session logic only talks to the [`Console`] trait, so tests can drive
//! whole sessions from a script while the binary uses a rustyline editor.

use std::path::{Path, PathBuf};

use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use tracing::warn;

use crate::commandcompleter::CommandCompleter;

/// One read from the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Line(String),
    /// Ctrl+C at the prompt.
    Interrupted,
    /// Ctrl+D or closed input.
    Eof,
}

pub trait Console {
    fn read_line(&mut self, prompt: &str) -> Input;

    /// Reads without echo.
    fn read_secret(&mut self, prompt: &str) -> Input;

    fn say(&mut self, text: &str);

    /// Words offered by tab completion at the next prompt.
    fn set_choices(&mut self, _choices: Vec<String>) {}
}

/// Interactive console backed by rustyline with a history file.
pub struct TerminalConsole {
    editor: Editor<CommandCompleter, DefaultHistory>,
    history_file: PathBuf,
}

impl TerminalConsole {
    pub fn new(history_file: &Path) -> Result<Self, ReadlineError> {
        // Configure the Rustyline editor with history behavior
        let config = rustyline::Config::builder()
            .history_ignore_space(true)
            .completion_type(rustyline::CompletionType::List)
            .build();

        let mut editor = Editor::<CommandCompleter, DefaultHistory>::with_config(config)?;
        editor.set_helper(Some(CommandCompleter::new()));

        if history_file.exists() {
            editor.load_history(history_file).ok();
        }

        Ok(TerminalConsole {
            editor,
            history_file: history_file.to_path_buf(),
        })
    }

    pub fn save_history(&mut self) {
        if let Err(e) = self.editor.save_history(&self.history_file) {
            warn!(path = %self.history_file.display(), error = %e, "could not save history");
        }
    }
}

impl Console for TerminalConsole {
    fn read_line(&mut self, prompt: &str) -> Input {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Input::Line(line)
            }
            Err(ReadlineError::Interrupted) => Input::Interrupted,
            Err(ReadlineError::Eof) => Input::Eof,
            Err(err) => {
                warn!(error = %err, "console read failed");
                Input::Eof
            }
        }
    }

    fn read_secret(&mut self, prompt: &str) -> Input {
        match rpassword::prompt_password(prompt) {
            Ok(secret) => Input::Line(secret),
            Err(err) => {
                warn!(error = %err, "password read failed");
                Input::Eof
            }
        }
    }

    fn say(&mut self, text: &str) {
        println!("{}", text);
    }

    fn set_choices(&mut self, choices: Vec<String>) {
        if let Some(helper) = self.editor.helper_mut() {
            helper.set_choices(choices);
        }
    }
}
