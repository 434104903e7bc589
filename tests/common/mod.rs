#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::path::Path;

use campus_inventory::cliconfig::{AppConfig, SessionContext};
use campus_inventory::connectivity::{PingOutcome, Pinger};
use campus_inventory::console::{Console, Input};
use campus_inventory::store::JsonStore;

/// Console fed from a fixed script. Every prompt and message is kept in
/// `transcript`; once the script runs out every read is end of input.
#[derive(Default)]
pub struct ScriptedConsole {
    inputs: VecDeque<Input>,
    pub transcript: Vec<String>,
    pub prompts: Vec<String>,
}

impl ScriptedConsole {
    pub fn new(lines: &[&str]) -> Self {
        ScriptedConsole {
            inputs: lines.iter().map(|l| Input::Line(l.to_string())).collect(),
            ..Default::default()
        }
    }

    pub fn push(&mut self, input: Input) {
        self.inputs.push_back(input);
    }

    pub fn output(&self) -> String {
        self.transcript.join("\n")
    }

    pub fn count_prompts(&self, prefix: &str) -> usize {
        self.prompts.iter().filter(|p| p.starts_with(prefix)).count()
    }

    fn next(&mut self, prompt: &str) -> Input {
        self.prompts.push(prompt.to_string());
        self.transcript.push(prompt.to_string());
        self.inputs.pop_front().unwrap_or(Input::Eof)
    }
}

impl Console for ScriptedConsole {
    fn read_line(&mut self, prompt: &str) -> Input {
        self.next(prompt)
    }

    fn read_secret(&mut self, prompt: &str) -> Input {
        self.next(prompt)
    }

    fn say(&mut self, text: &str) {
        self.transcript.push(text.to_string());
    }
}

/// Answers for a fixed set of addresses, everything else is unreachable.
pub struct FakePinger {
    pub reachable: Vec<Ipv4Addr>,
}

impl Pinger for FakePinger {
    fn ping(&self, addr: Ipv4Addr) -> PingOutcome {
        if self.reachable.contains(&addr) {
            PingOutcome::Reachable { loss_percent: Some(0.0) }
        } else {
            PingOutcome::Unreachable {
                reason: "destination host unreachable".to_string(),
            }
        }
    }
}

pub fn test_config(dir: &Path) -> AppConfig {
    AppConfig {
        data_file: dir.join("devices.json"),
        campus_dir: dir.join("campuses"),
        reports_dir: dir.join("reports"),
        log_file: dir.join("test.log"),
        history_file: dir.join("history.txt"),
        ..AppConfig::default()
    }
}

/// JSON-backed session rooted in `dir`.
pub fn json_session(dir: &Path, reachable: Vec<Ipv4Addr>) -> SessionContext {
    let config = test_config(dir);
    let store = Box::new(JsonStore::new(&config.data_file));
    let mut context = SessionContext::with_parts(config, store, Box::new(FakePinger { reachable }));
    context.user = Some("admin".to_string());
    context
}

pub fn read_json(path: &Path) -> serde_json::Value {
    let contents = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&contents).unwrap()
}
