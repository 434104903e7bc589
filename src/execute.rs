use std::collections::HashMap;
use std::sync::atomic::Ordering;

use tracing::{debug, info};

use crate::clicommands::screen_header;
use crate::cliconfig::SessionContext;
use crate::console::{Console, Input};
use crate::navigation::{NavCommand, Screen};

/// Why a prompt sequence stopped before finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowBreak {
    /// A navigation command was typed at a prompt.
    Nav(NavCommand),
    /// Empty answer or `cancel` where cancelling is allowed.
    Cancelled,
    /// Input stream closed.
    Closed,
}

pub type Action = fn(&mut SessionContext, &mut dyn Console) -> Result<(), FlowBreak>;

#[derive(Clone)]
pub struct MenuCommand {
    pub key: &'static str,
    pub description: &'static str,
    pub execute: Action,
}

/// Menu commands per screen, in display order.
#[derive(Clone, Default)]
pub struct MenuRegistry {
    menus: HashMap<Screen, Vec<MenuCommand>>,
}

impl MenuRegistry {
    pub fn insert(&mut self, screen: Screen, commands: Vec<MenuCommand>) {
        self.menus.insert(screen, commands);
    }

    pub fn commands(&self, screen: Screen) -> &[MenuCommand] {
        self.menus.get(&screen).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find(&self, screen: Screen, key: &str) -> Option<&MenuCommand> {
        self.commands(screen).iter().find(|c| c.key == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Quit,
    InputClosed,
}

const AFFIRMATIVE: [&str; 5] = ["s", "si", "sí", "y", "yes"];

pub fn is_affirmative(answer: &str) -> bool {
    AFFIRMATIVE.contains(&answer.trim().to_lowercase().as_str())
}

/// Reads one answer. Navigation words, `cancel`, Ctrl+C and end of input
/// break out of the surrounding flow; `help` is answered in place.
pub fn ask(console: &mut dyn Console, prompt: &str) -> Result<String, FlowBreak> {
    loop {
        let line = match console.read_line(prompt) {
            Input::Line(line) => line,
            Input::Interrupted => return Err(FlowBreak::Nav(NavCommand::Home)),
            Input::Eof => return Err(FlowBreak::Closed),
        };
        let answer = line.trim();
        match NavCommand::parse(answer) {
            Some(NavCommand::Help) => {
                console.say("Answer the prompt, or type 'cancel' to abort, 'back' (b), 'home' (h) or 'quit' (q, exit).");
                continue;
            }
            Some(cmd) => return Err(FlowBreak::Nav(cmd)),
            None => {}
        }
        if answer.eq_ignore_ascii_case("cancel") {
            return Err(FlowBreak::Cancelled);
        }
        return Ok(answer.to_string());
    }
}

/// Re-prompts until `parse` accepts the answer, showing each rejection.
pub fn ask_until<T, E, F>(console: &mut dyn Console, prompt: &str, mut parse: F) -> Result<T, FlowBreak>
where
    E: std::fmt::Display,
    F: FnMut(&str) -> Result<T, E>,
{
    loop {
        let answer = ask(console, prompt)?;
        match parse(&answer) {
            Ok(value) => return Ok(value),
            Err(e) => console.say(&format!("  Invalid: {}", e)),
        }
    }
}

/// Yes/no question; anything but an affirmative answer is a no.
pub fn confirm(console: &mut dyn Console, prompt: &str) -> Result<bool, FlowBreak> {
    Ok(is_affirmative(&ask(console, prompt)?))
}

/// Lists `labels` numbered from 1 and returns the chosen position.
/// An empty answer cancels.
pub fn choose(console: &mut dyn Console, prompt: &str, labels: &[String]) -> Result<usize, FlowBreak> {
    for (i, label) in labels.iter().enumerate() {
        console.say(&format!("  {}. {}", i + 1, label));
    }
    console.set_choices(labels.to_vec());
    let picked = ask_until(console, prompt, |answer| {
        if answer.is_empty() {
            return Ok(None);
        }
        if let Ok(n) = answer.parse::<usize>() {
            if (1..=labels.len()).contains(&n) {
                return Ok(Some(n - 1));
            }
            return Err(format!("choose a number between 1 and {}", labels.len()));
        }
        labels
            .iter()
            .position(|l| l.eq_ignore_ascii_case(answer))
            .map(Some)
            .ok_or_else(|| format!("'{}' is not one of the options", answer))
    });
    console.set_choices(Vec::new());
    picked?.ok_or(FlowBreak::Cancelled)
}

pub fn help_text(screen: Screen, registry: &MenuRegistry) -> String {
    let mut out = String::from("\nAvailable options\n");
    for cmd in registry.commands(screen) {
        out.push_str(&format!("  {:<6} - {}\n", cmd.key, cmd.description));
    }
    out.push_str("  back   - Return to the previous menu (b)\n");
    out.push_str("  home   - Return to the main menu (h)\n");
    out.push_str("  quit   - Leave the application (q, exit)\n");
    out.push_str("  help   - Show this list (?)\n");
    out.push_str("Inside a form, 'cancel' aborts without saving.\n");
    out.push_str("These words and their short forms are never read as names or search terms.\n");
    out
}

pub fn render_menu(context: &SessionContext, console: &mut dyn Console, registry: &MenuRegistry) {
    let screen = context.navigator.current();
    console.say("");
    console.say(&format!("=== {} ===", screen.title()));
    if context.navigator.depth() > 1 {
        console.say(&context.navigator.breadcrumb());
    }
    if let Some(header) = screen_header(screen, context) {
        console.say(&header);
    }
    for cmd in registry.commands(screen) {
        console.say(&format!("  {}. {}", cmd.key, cmd.description));
    }
    console.say("  [b]ack  [h]ome  [q]uit  [?]help");
}

/// Asks before leaving. Anything but an affirmative answer stays.
pub fn confirm_quit(console: &mut dyn Console) -> Flow {
    match console.read_line("Are you sure you want to quit? (y/n): ") {
        Input::Line(answer) if is_affirmative(&answer) => Flow::Exit,
        Input::Line(_) | Input::Interrupted => Flow::Continue,
        Input::Eof => Flow::Exit,
    }
}

pub fn apply_nav(
    cmd: NavCommand,
    context: &mut SessionContext,
    console: &mut dyn Console,
    registry: &MenuRegistry,
) -> Flow {
    debug!(?cmd, from = %context.navigator.current(), "navigation");
    match cmd {
        NavCommand::Back => {
            context.navigator.back();
            Flow::Continue
        }
        NavCommand::Home => {
            context.navigator.home();
            Flow::Continue
        }
        NavCommand::Quit => confirm_quit(console),
        NavCommand::Help => {
            console.say(&help_text(context.navigator.current(), registry));
            Flow::Continue
        }
    }
}

/// Handles one line typed at a menu prompt.
pub fn execute_input(
    input: &str,
    context: &mut SessionContext,
    console: &mut dyn Console,
    registry: &MenuRegistry,
) -> Flow {
    let input = input.trim();
    if input.is_empty() {
        return Flow::Continue;
    }
    if let Some(cmd) = NavCommand::parse(input) {
        return apply_nav(cmd, context, console, registry);
    }

    let screen = context.navigator.current();
    let Some(command) = registry.find(screen, input) else {
        console.say(&format!("Invalid option '{}'. Type '?' for help.", input));
        return Flow::Continue;
    };

    match (command.execute)(context, console) {
        Ok(()) => Flow::Continue,
        Err(FlowBreak::Nav(cmd)) => apply_nav(cmd, context, console, registry),
        Err(FlowBreak::Cancelled) => {
            console.say("Cancelled.");
            Flow::Continue
        }
        Err(FlowBreak::Closed) => Flow::Exit,
    }
}

/// Menu loop: render the current screen, read a line, dispatch.
pub fn run_session(context: &mut SessionContext, console: &mut dyn Console, registry: &MenuRegistry) -> SessionEnd {
    loop {
        if context.interrupted.swap(false, Ordering::SeqCst) {
            context.navigator.home();
        }

        render_menu(context, console, registry);
        let prompt = format!("{}> ", context.prompt_prefix());
        let line = match console.read_line(&prompt) {
            Input::Line(line) => line,
            Input::Interrupted => {
                context.navigator.home();
                continue;
            }
            Input::Eof => {
                info!("input closed, ending session");
                return SessionEnd::InputClosed;
            }
        };

        if execute_input(&line, context, console, registry) == Flow::Exit {
            info!(user = ?context.user, "session ended");
            return SessionEnd::Quit;
        }
    }
}
