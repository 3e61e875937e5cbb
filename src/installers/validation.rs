use super::{InstallConfig, ValidationResult};
use crate::games::GameProfile;
use crate::ports::{MAX_PORT, MIN_PORT};
use serde_json::Value;

/// Collects every configuration problem before answering.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks shared by every game: identity fields, the player and memory
    /// bounds of `profile`, and a port block that fits the allowed range.
    pub fn common(profile: &GameProfile, config: &InstallConfig) -> Self {
        let mut v = Self::new();

        if config.game_type != profile.game_type {
            v.error(format!(
                "game type {} does not match installer for {}",
                config.game_type, profile.game_type
            ));
        }
        v.identifier("server id", &config.server_id);
        v.check(!config.machine_id.trim().is_empty(), "machine id is required");

        v.range("max players", config.max_players as i64, profile.max_players);
        v.range("ram (MB)", config.ram_mb as i64, profile.ram_mb);

        if let Some(port) = config.port {
            let port = port as u32;
            let last = port + profile.port_span() as u32 - 1;
            if port < MIN_PORT {
                v.error(format!("port {} must be between {} and {}", port, MIN_PORT, MAX_PORT));
            } else if last > MAX_PORT {
                v.error(format!(
                    "port block {}-{} exceeds the highest allowed port {}",
                    port, last, MAX_PORT
                ));
            }
        }
        v
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn check(&mut self, ok: bool, message: impl Into<String>) {
        if !ok {
            self.error(message);
        }
    }

    pub fn range(&mut self, label: &str, value: i64, (min, max): (u32, u32)) {
        if value < min as i64 || value > max as i64 {
            self.error(format!("{} must be between {} and {}, got {}", label, min, max, value));
        }
    }

    /// Ids end up in container names and host paths.
    pub fn identifier(&mut self, label: &str, value: &str) {
        if value.trim().is_empty() {
            self.error(format!("{} is required", label));
        } else if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            self.error(format!("{} may only contain letters, digits, '-' and '_'", label));
        }
    }

    /// Optional integer setting within `[min, max]`.
    pub fn integer_setting(&mut self, value: Option<&Value>, key: &str, min: i64, max: i64) {
        let Some(value) = value else { return };
        let parsed = match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        match parsed {
            Some(n) if n >= min && n <= max => {}
            Some(n) => self.error(format!("{} must be between {} and {}, got {}", key, min, max, n)),
            None => self.error(format!("{} must be an integer", key)),
        }
    }

    pub fn finish(self) -> ValidationResult {
        ValidationResult {
            valid: self.errors.is_empty(),
            errors: self.errors,
        }
    }
}
