//passwd.rs

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::console::{Console, Input};
use crate::errors::LoginError;

/// A user allowed to open a session. Only the SHA-256 digest of the
/// password is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password_sha256: String,
}

impl Credential {
    pub fn new(username: &str, password: &str) -> Self {
        Credential {
            username: username.to_string(),
            password_sha256: hash_password(password),
        }
    }
}

/// Hashes a password using SHA-256, rendered as lowercase hex.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password);
    let result = hasher.finalize();
    format!("{:x}", result)
}

/// Built-in accounts used when the configuration names none.
pub fn default_credentials() -> Vec<Credential> {
    vec![
        Credential::new("admin", "admin123"),
        Credential::new("operator", "network2024"),
    ]
}

/// Checks a username/password pair. Usernames are case-sensitive.
pub fn verify(credentials: &[Credential], username: &str, password: &str) -> bool {
    let digest = hash_password(password);
    credentials
        .iter()
        .any(|c| c.username == username && c.password_sha256.eq_ignore_ascii_case(&digest))
}

/// Prompts for credentials until they match or `max_attempts` is used up.
pub fn login(
    console: &mut dyn Console,
    credentials: &[Credential],
    max_attempts: u32,
) -> Result<String, LoginError> {
    for attempt in 1..=max_attempts {
        let username = match console.read_line("Username: ") {
            Input::Line(line) => line.trim().to_string(),
            Input::Interrupted | Input::Eof => return Err(LoginError::Aborted),
        };
        let password = match console.read_secret("Password: ") {
            Input::Line(line) => line,
            Input::Interrupted | Input::Eof => return Err(LoginError::Aborted),
        };

        if verify(credentials, &username, &password) {
            info!(user = %username, "login succeeded");
            console.say(&format!("Welcome, {}.", username));
            return Ok(username);
        }

        let left = max_attempts - attempt;
        warn!(user = %username, attempt, "login failed");
        if left > 0 {
            console.say(&format!("Invalid username or password. {} attempt(s) left.", left));
        }
    }
    console.say("Too many failed attempts.");
    Err(LoginError::TooManyAttempts(max_attempts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_hex_sha256() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn verify_matches_user_and_password() {
        let creds = default_credentials();
        assert!(verify(&creds, "admin", "admin123"));
        assert!(!verify(&creds, "admin", "admin124"));
        assert!(!verify(&creds, "Admin", "admin123"));
        assert!(!verify(&creds, "nobody", "admin123"));
    }
}
