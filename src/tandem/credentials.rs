//! t:connect login from the environment
//!
//! - `TCONNECT_EMAIL`: account login email
//! - `TCONNECT_PASSWORD`: account password
//! - `TCONNECT_SERIAL_NUMBER`: t:slim pump serial number (integer)

use super::TandemError;
use std::fmt;

pub const ENV_EMAIL: &str = "TCONNECT_EMAIL";
pub const ENV_PASSWORD: &str = "TCONNECT_PASSWORD";
pub const ENV_SERIAL_NUMBER: &str = "TCONNECT_SERIAL_NUMBER";

/// Account credentials and pump serial number
#[derive(Clone, PartialEq, Eq)]
pub struct TandemLogin {
    pub email: String,
    pub password: String,
    pub serial_number: i64,
}

impl TandemLogin {
    /// Read credentials from the process environment
    pub fn from_env() -> Result<Self, TandemError> {
        tracing::info!("Looking for TCONNECT login info environment variables...");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through `lookup`; every problem is logged before failing
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TandemError> {
        let read = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let email = read(ENV_EMAIL);
        let password = read(ENV_PASSWORD);
        let serial = read(ENV_SERIAL_NUMBER);

        let mut problems = Vec::new();
        if email.is_none() {
            tracing::warn!("Missing login email ({})", ENV_EMAIL);
            problems.push(format!("missing {}", ENV_EMAIL));
        }
        if password.is_none() {
            tracing::warn!("Missing login password ({})", ENV_PASSWORD);
            problems.push(format!("missing {}", ENV_PASSWORD));
        }

        let serial_number = match serial {
            None => {
                tracing::warn!("Missing t:slim serial number ({})", ENV_SERIAL_NUMBER);
                problems.push(format!("missing {}", ENV_SERIAL_NUMBER));
                None
            }
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(sn) => Some(sn),
                Err(_) => {
                    tracing::warn!("Could not interpret t:slim serial number as int");
                    problems.push(format!("{} is not an integer", ENV_SERIAL_NUMBER));
                    None
                }
            },
        };

        match (email, password, serial_number) {
            (Some(email), Some(password), Some(serial_number)) if problems.is_empty() => {
                tracing::info!("Located TCONNECT login info environment variables");
                Ok(Self {
                    email,
                    password,
                    serial_number,
                })
            }
            _ => Err(TandemError::MissingCredentials(problems.join(", "))),
        }
    }
}

impl fmt::Display for TandemLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, *******, *******)", self.email)
    }
}

impl fmt::Debug for TandemLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TandemLogin")
            .field("email", &self.email)
            .field("password", &"*******")
            .field("serial_number", &"*******")
            .finish()
    }
}
