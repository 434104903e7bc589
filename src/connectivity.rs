//! Reachability checks through the system `ping` binary.
//!
//! The exit status decides reachability. Phrases found in the output only
//! annotate the result: they are locale dependent and do not reliably
//! detect partial loss.

use std::io::{ErrorKind, Read};
use std::net::Ipv4Addr;
use std::process::{Command as ProcessCommand, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::device::IpAssignment;

lazy_static::lazy_static! {
    static ref LOSS_PERCENT: Regex = Regex::new(r"(\d+(?:\.\d+)?)% (?:packet )?loss").unwrap();
    static ref FAILURE_PHRASES: Regex = Regex::new(
        r"(?i)(destination host unreachable|host unreachable|request timed out|unknown host|could not find host|name or service not known|network is unreachable)"
    ).unwrap();
}

const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// How long output is still collected once the process is gone.
const READ_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq)]
pub enum PingOutcome {
    /// Exit status reported success. `loss_percent` is parsed from the
    /// output when present.
    Reachable { loss_percent: Option<f32> },
    Unreachable { reason: String },
    TimedOut { after: Duration },
    BinaryMissing,
    /// The device has no address to ping.
    Skipped,
}

impl PingOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PingOutcome::Reachable { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            PingOutcome::Reachable { loss_percent: Some(loss) } if *loss > 0.0 => {
                format!("reachable ({}% packet loss reported)", loss)
            }
            PingOutcome::Reachable { .. } => "reachable".to_string(),
            PingOutcome::Unreachable { reason } => format!("unreachable: {}", reason),
            PingOutcome::TimedOut { after } => format!("no answer within {}s", after.as_secs()),
            PingOutcome::BinaryMissing => "ping command not found on this system".to_string(),
            PingOutcome::Skipped => "skipped, device has no IP address".to_string(),
        }
    }
}

pub trait Pinger {
    fn ping(&self, addr: Ipv4Addr) -> PingOutcome;
}

/// Pings a device's address, skipping devices without one.
pub fn ping_assignment(pinger: &dyn Pinger, ip: &IpAssignment) -> PingOutcome {
    match ip.address() {
        Some(addr) => pinger.ping(addr),
        None => PingOutcome::Skipped,
    }
}

/// Arguments for `count` echo requests on the current platform.
pub fn ping_args(count: u32, addr: Ipv4Addr) -> Vec<String> {
    let flag = if cfg!(target_os = "windows") { "-n" } else { "-c" };
    vec![flag.to_string(), count.to_string(), addr.to_string()]
}

/// Classifies a finished ping run from its exit status and combined output.
pub fn classify(success: bool, output: &str) -> PingOutcome {
    let loss_percent = LOSS_PERCENT
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f32>().ok());

    if success {
        return PingOutcome::Reachable { loss_percent };
    }

    let reason = if let Some(phrase) = FAILURE_PHRASES.find(output) {
        phrase.as_str().to_lowercase()
    } else if let Some(loss) = loss_percent {
        format!("{}% packet loss", loss)
    } else {
        "no reply".to_string()
    };
    PingOutcome::Unreachable { reason }
}

/// Runs the operating system's ping binary.
#[derive(Debug, Clone)]
pub struct SystemPinger {
    program: String,
    count: u32,
    timeout: Duration,
}

impl SystemPinger {
    pub fn new(count: u32, timeout: Duration) -> Self {
        SystemPinger::with_program("ping", count, timeout)
    }

    pub fn with_program(program: impl Into<String>, count: u32, timeout: Duration) -> Self {
        SystemPinger {
            program: program.into(),
            count,
            timeout,
        }
    }
}

/// Reads `reader` to the end on its own thread and sends the bytes.
/// Pipes can outlive the killed child when it spawned helpers, so the
/// receiver never joins these threads.
fn drain<R: Read + Send + 'static>(reader: Option<R>, tx: mpsc::Sender<Vec<u8>>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            let _ = reader.read_to_end(&mut buf);
        }
        let _ = tx.send(buf);
    });
}

/// Collects what both readers sent before `until`.
fn collect_output(rx: &mpsc::Receiver<Vec<u8>>, until: Instant) -> String {
    let mut bytes = Vec::new();
    for _ in 0..2 {
        let left = until.saturating_duration_since(Instant::now());
        match rx.recv_timeout(left) {
            Ok(chunk) => bytes.extend_from_slice(&chunk),
            Err(_) => {
                debug!("ping output still open, not waiting for it");
                break;
            }
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

enum Finished {
    Exited(ExitStatus),
    TimedOut,
}

impl Pinger for SystemPinger {
    fn ping(&self, addr: Ipv4Addr) -> PingOutcome {
        let args = ping_args(self.count, addr);
        debug!(program = %self.program, ?args, "spawning ping");

        let mut child = match ProcessCommand::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(program = %self.program, "ping binary not found");
                return PingOutcome::BinaryMissing;
            }
            Err(e) => {
                warn!(program = %self.program, error = %e, "failed to start ping");
                return PingOutcome::Unreachable {
                    reason: format!("failed to execute {}: {}", self.program, e),
                };
            }
        };

        let (tx, rx) = mpsc::channel();
        drain(child.stdout.take(), tx.clone());
        drain(child.stderr.take(), tx);

        let deadline = Instant::now() + self.timeout;
        let finished = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Finished::Exited(status),
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    break Finished::TimedOut;
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    warn!(error = %e, "failed to wait for ping");
                    let _ = child.kill();
                    break Finished::TimedOut;
                }
            }
        };

        let output = collect_output(&rx, Instant::now() + READ_GRACE);

        let outcome = match finished {
            Finished::Exited(status) => classify(status.success(), &output),
            Finished::TimedOut => PingOutcome::TimedOut { after: self.timeout },
        };
        info!(%addr, outcome = %outcome.describe(), "ping finished");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINUX_OK: &str = "4 packets transmitted, 4 received, 0% packet loss, time 3004ms";
    const LINUX_PARTIAL: &str = "4 packets transmitted, 3 received, 25% packet loss, time 3004ms";
    const LINUX_DOWN: &str = "From 10.0.0.1 icmp_seq=1 Destination Host Unreachable\n4 packets transmitted, 0 received, +4 errors, 100% packet loss";
    const WINDOWS_TIMEOUT: &str = "Request timed out.\nPackets: Sent = 4, Received = 0, Lost = 4 (100% loss),";

    #[test]
    fn success_follows_exit_status() {
        assert_eq!(classify(true, LINUX_OK), PingOutcome::Reachable { loss_percent: Some(0.0) });
        assert_eq!(classify(true, LINUX_PARTIAL), PingOutcome::Reachable { loss_percent: Some(25.0) });
        assert_eq!(classify(true, ""), PingOutcome::Reachable { loss_percent: None });
    }

    #[test]
    fn failure_reason_from_phrases() {
        assert_eq!(
            classify(false, LINUX_DOWN),
            PingOutcome::Unreachable { reason: "destination host unreachable".into() }
        );
        assert_eq!(
            classify(false, WINDOWS_TIMEOUT),
            PingOutcome::Unreachable { reason: "request timed out".into() }
        );
        assert_eq!(
            classify(false, "4 packets transmitted, 0 received, 100% packet loss"),
            PingOutcome::Unreachable { reason: "100% packet loss".into() }
        );
        assert_eq!(classify(false, ""), PingOutcome::Unreachable { reason: "no reply".into() });
    }

    #[test]
    fn count_flag_matches_platform() {
        let args = ping_args(2, Ipv4Addr::new(10, 0, 0, 1));
        let expected = if cfg!(target_os = "windows") { "-n" } else { "-c" };
        assert_eq!(args, vec![expected.to_string(), "2".to_string(), "10.0.0.1".to_string()]);
    }

    #[test]
    fn missing_binary_is_an_outcome() {
        let pinger = SystemPinger::with_program("definitely-not-a-ping-binary-xyz", 1, Duration::from_secs(1));
        assert_eq!(pinger.ping(Ipv4Addr::new(10, 0, 0, 1)), PingOutcome::BinaryMissing);
    }

    #[test]
    fn devices_without_address_are_skipped() {
        let pinger = SystemPinger::with_program("definitely-not-a-ping-binary-xyz", 1, Duration::from_secs(1));
        assert_eq!(ping_assignment(&pinger, &IpAssignment::Dhcp), PingOutcome::Skipped);
        assert_eq!(ping_assignment(&pinger, &IpAssignment::None), PingOutcome::Skipped);
    }

    #[cfg(unix)]
    #[test]
    fn exit_status_of_real_process_decides() {
        let ok = SystemPinger::with_program("true", 1, Duration::from_secs(5));
        assert!(ok.ping(Ipv4Addr::new(10, 0, 0, 1)).is_success());

        let down = SystemPinger::with_program("false", 1, Duration::from_secs(5));
        assert_eq!(
            down.ping(Ipv4Addr::new(10, 0, 0, 1)),
            PingOutcome::Unreachable { reason: "no reply".into() }
        );
    }

    #[cfg(unix)]
    #[test]
    fn slow_process_is_cut_at_timeout() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow-ping");
        std::fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let timeout = Duration::from_millis(300);
        let pinger = SystemPinger::with_program(script.to_string_lossy(), 1, timeout);
        let started = Instant::now();
        let mut outcome = pinger.ping(Ipv4Addr::new(10, 0, 0, 1));
        // A freshly written script can be briefly busy for exec on a loaded machine.
        for _ in 0..5 {
            if !matches!(outcome, PingOutcome::Unreachable { .. }) {
                break;
            }
            thread::sleep(Duration::from_millis(50));
            outcome = pinger.ping(Ipv4Addr::new(10, 0, 0, 1));
        }

        assert_eq!(outcome, PingOutcome::TimedOut { after: timeout });
        assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
    }

    #[test]
    fn output_that_is_not_utf8_is_still_read() {
        let (tx, rx) = mpsc::channel();
        drain(Some(&b"Paquetes: enviados = 4, recibidos = 0, perdidos = 4\n\xe9chec"[..]), tx);
        let output = collect_output(&rx, Instant::now() + Duration::from_secs(2));
        assert!(output.starts_with("Paquetes: enviados = 4"));
        assert!(output.contains('\u{FFFD}'));
    }
}
