// docker-compose rendering shared by the game installers

use super::{AllocatedPorts, DeploymentSpec};
use serde_json::{Map, Value};

/// A single-service compose manifest.
///
/// Rendering is a plain walk over the fields in insertion order, so equal
/// builders always produce identical text.
#[derive(Debug, Clone)]
pub struct ComposeFile {
    service: String,
    image: String,
    container_name: String,
    environment: Vec<(String, String)>,
    ports: Vec<String>,
    volumes: Vec<String>,
    cpus: f32,
    memory_mb: u32,
    healthcheck: Option<String>,
    start_period_secs: u32,
}

impl ComposeFile {
    pub fn new(service: &str, image: &str, container_name: &str) -> Self {
        Self {
            service: service.to_string(),
            image: image.to_string(),
            container_name: container_name.to_string(),
            environment: Vec::new(),
            ports: Vec::new(),
            volumes: Vec::new(),
            cpus: 1.0,
            memory_mb: 1024,
            healthcheck: None,
            start_period_secs: 120,
        }
    }

    pub fn env(mut self, key: &str, value: impl ToString) -> Self {
        self.environment.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a variable only when `value` is non-empty.
    pub fn env_if_set(self, key: &str, value: &str) -> Self {
        if value.is_empty() {
            self
        } else {
            self.env(key, value)
        }
    }

    /// Publish every allocated port on the same number inside the container.
    pub fn publish(mut self, ports: &AllocatedPorts) -> Self {
        for p in &ports.ports {
            for transport in p.protocol.transports() {
                self.ports.push(format!("{0}:{0}/{1}", p.port, transport));
            }
        }
        self
    }

    pub fn volume(mut self, host: &str, container: &str) -> Self {
        self.volumes.push(format!("{}:{}", host, container));
        self
    }

    pub fn limits(mut self, cpus: f32, memory_mb: u32) -> Self {
        self.cpus = cpus;
        self.memory_mb = memory_mb;
        self
    }

    /// Shell test run inside the container.
    pub fn healthcheck(mut self, test: &str, start_period_secs: u32) -> Self {
        self.healthcheck = Some(test.to_string());
        self.start_period_secs = start_period_secs;
        self
    }

    pub fn render(&self) -> DeploymentSpec {
        let mut lines = vec![
            "services:".to_string(),
            format!("  {}:", self.service),
            format!("    image: {}", quote(&self.image)),
            format!("    container_name: {}", quote(&self.container_name)),
            "    restart: unless-stopped".to_string(),
        ];

        if !self.environment.is_empty() {
            lines.push("    environment:".to_string());
            lines.extend(
                self.environment
                    .iter()
                    .map(|(key, value)| format!("      {}: {}", key, quote(value))),
            );
        }
        if !self.ports.is_empty() {
            lines.push("    ports:".to_string());
            lines.extend(self.ports.iter().map(|port| format!("      - {}", quote(port))));
        }
        if !self.volumes.is_empty() {
            lines.push("    volumes:".to_string());
            lines.extend(self.volumes.iter().map(|volume| format!("      - {}", quote(volume))));
        }

        lines.push("    deploy:".to_string());
        lines.push("      resources:".to_string());
        lines.push("        limits:".to_string());
        lines.push(format!("          cpus: \"{:.1}\"", self.cpus));
        lines.push(format!("          memory: {}M", self.memory_mb));

        if let Some(test) = &self.healthcheck {
            lines.push("    healthcheck:".to_string());
            lines.push(format!("      test: [\"CMD-SHELL\", {}]", quote(test)));
            lines.push("      interval: 30s".to_string());
            lines.push("      timeout: 10s".to_string());
            lines.push("      retries: 5".to_string());
            lines.push(format!("      start_period: {}s", self.start_period_secs));
        }

        let mut out = lines.join("\n");
        out.push('\n');
        DeploymentSpec(out)
    }
}

/// YAML double-quoted scalar.
fn quote(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("\"{}\"", escaped)
}

/// Read a game setting as text: strings verbatim, everything else in its
/// JSON form. Missing keys and nulls give `fallback`.
pub fn setting(config: &Map<String, Value>, key: &str, fallback: &str) -> String {
    match config.get(key) {
        None | Some(Value::Null) => fallback.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::{PortProtocol, PortRole};
    use crate::installers::AllocatedPort;
    use serde_json::json;

    fn ports() -> AllocatedPorts {
        AllocatedPorts {
            port: 30000,
            ports: vec![
                AllocatedPort { role: PortRole::Game, port: 30000, protocol: PortProtocol::Both },
                AllocatedPort { role: PortRole::Rcon, port: 30001, protocol: PortProtocol::Tcp },
            ],
        }
    }

    #[test]
    fn test_render_layout() {
        let spec = ComposeFile::new("game", "example/image:1", "serverwave-x")
            .env("NAME", "My \"quoted\" server")
            .publish(&ports())
            .volume("./data", "/data")
            .limits(2.0, 4096)
            .healthcheck("pgrep server || exit 1", 60)
            .render();
        let text = spec.as_str();

        assert!(text.starts_with("services:\n  game:\n"));
        assert!(text.contains("      NAME: \"My \\\"quoted\\\" server\"\n"));
        assert!(text.contains("      - \"30000:30000/tcp\"\n      - \"30000:30000/udp\"\n"));
        assert!(text.contains("      - \"30001:30001/tcp\"\n"));
        assert!(text.contains("          cpus: \"2.0\"\n          memory: 4096M\n"));
        assert!(text.contains("test: [\"CMD-SHELL\", \"pgrep server || exit 1\"]"));
        assert!(text.contains("start_period: 60s"));
    }

    #[test]
    fn test_env_if_set_skips_empty() {
        let text = ComposeFile::new("s", "i", "c")
            .env_if_set("PASSWORD", "")
            .render()
            .0;
        assert!(!text.contains("PASSWORD"));
        assert!(!text.contains("environment:"));
    }

    #[test]
    fn test_setting_rendering() {
        let config = json!({"a": "text", "b": true, "c": 42, "d": null})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(setting(&config, "a", "x"), "text");
        assert_eq!(setting(&config, "b", "x"), "true");
        assert_eq!(setting(&config, "c", "x"), "42");
        assert_eq!(setting(&config, "d", "x"), "x");
        assert_eq!(setting(&config, "missing", "x"), "x");
    }
}
