/// External crates for the console editor
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::Helper;

use crate::navigation::NAV_WORDS;


/// A custom completer for the inventory console.
///
/// The `CommandCompleter` offers the navigation words that every prompt
/// understands, plus the choices of the prompt currently shown (device types,
/// layers, service names, ...).
///
/// # Fields
/// - `choices`: Words valid at the current prompt, replaced before each read.
#[derive(Clone, Default)]
pub struct CommandCompleter {
    pub choices: Vec<String>,
}

impl CommandCompleter {
    /// Creates a completer with no prompt-specific choices.
    pub fn new() -> Self {
        CommandCompleter::default()
    }

    /// Replaces the prompt-specific choices.
    pub fn set_choices(&mut self, choices: Vec<String>) {
        self.choices = choices;
    }

    /// Candidates starting with `word`, ignoring case. Prompt choices come
    /// before navigation words.
    pub fn candidates_for(&self, word: &str) -> Vec<String> {
        let lowered = word.to_lowercase();
        self.choices
            .iter()
            .map(String::as_str)
            .chain(NAV_WORDS.iter().copied())
            .filter(|candidate| candidate.to_lowercase().starts_with(&lowered))
            .map(str::to_string)
            .collect()
    }
}


/// Implements the `Completer` trait for the `CommandCompleter` struct.
impl Completer for CommandCompleter {
    type Candidate = Pair;

    /// Completes the word under the cursor.
    ///
    /// Lists such as `DNS, HTTP` are completed item by item: the word starts
    /// after the last comma or space before the cursor.
    ///
    /// # Errors
    /// Never fails; the signature is dictated by rustyline.
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> Result<(usize, Vec<Self::Candidate>), ReadlineError> {
        let query = if pos <= line.len() { &line[..pos] } else { line };
        let start = query
            .rfind(|c: char| c == ',' || c == ' ')
            .map(|i| i + 1)
            .unwrap_or(0);
        let word = &query[start..];

        let candidates = self
            .candidates_for(word)
            .into_iter()
            .map(|candidate| Pair {
                display: candidate.clone(),
                replacement: candidate,
            })
            .collect();

        Ok((start, candidates))
    }
}


/// Implements the `Helper` trait for the `CommandCompleter` struct.
impl Helper for CommandCompleter {}

/// Implements the `Hinter` trait for the `CommandCompleter` struct.
impl Hinter for CommandCompleter {
    type Hint = String;

    /// Hints are not used.
    fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        None
    }
}

/// Implements the `Highlighter` trait for the `CommandCompleter` struct.
impl Highlighter for CommandCompleter {}


/// Implements the `Validator` trait for the `CommandCompleter` struct.
impl Validator for CommandCompleter {

    /// Every line is accepted as typed; field validation happens after the
    /// line is read so the error can be explained.
    fn validate(
        &self,
        _ctx: &mut ValidationContext<'_>,
    ) -> Result<ValidationResult, ReadlineError> {
        Ok(ValidationResult::Valid(None))
    }
}
