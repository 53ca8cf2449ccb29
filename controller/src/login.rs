use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("too many failed login attempts")]
    LockedOut,
}

/// A known user. Passwords are held as lowercase-hex SHA-256 digests.
#[derive(Debug, Clone)]
pub struct UserLogin {
    username: String,
    password_sha256: String,
}

impl UserLogin {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password_sha256: digest_hex(password),
        }
    }
}

/// Attempt-limited credential check, used once per connect. The failure
/// counter is never reset by the control flow; after `max_failures`
/// misses the handler locks out for the life of the manager.
pub struct LoginHandler {
    valid_users: Vec<UserLogin>,
    failures: u32,
    max_failures: u32,
}

impl LoginHandler {
    pub fn new(valid_users: Vec<UserLogin>, max_failures: u32) -> Self {
        Self {
            valid_users,
            failures: 0,
            max_failures,
        }
    }

    pub fn authenticate(&mut self, username: &str, password: &str) -> Result<(), AuthError> {
        if self.failures > self.max_failures {
            return Err(AuthError::LockedOut);
        }

        let supplied = digest_hex(password);
        let matched = self
            .valid_users
            .iter()
            .any(|user| user.username == username && user.password_sha256 == supplied);

        if matched {
            Ok(())
        } else {
            self.failures += 1;
            Err(AuthError::InvalidCredentials)
        }
    }

    /// Operator escape hatch. Nothing in the control flow calls this; a
    /// lockout otherwise lasts for the life of the process.
    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

fn digest_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}
