// Dry-run executor - records commands instead of running them

use super::{ExecOutput, HostSpec, RemoteError, RemoteExecutor};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedCommand {
    pub machine_id: String,
    pub command: String,
}

#[derive(Debug, Clone)]
enum Reply {
    Exit { exit_code: i64, stdout: String, stderr: String },
    Timeout,
}

#[derive(Debug)]
struct Rule {
    pattern: String,
    remaining: Option<usize>,
    reply: Reply,
}

/// Executor that never touches a machine.
///
/// Every command succeeds with empty output unless a scripted rule matches:
/// the first rule whose pattern is a substring of the command decides the
/// reply. Rules can be limited to a number of uses.
#[derive(Default)]
pub struct DryRunExecutor {
    commands: Mutex<Vec<RecordedCommand>>,
    rules: Mutex<Vec<Rule>>,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands whose text contains `pattern` exit with `exit_code`.
    pub fn fail_when(&self, pattern: &str, exit_code: i64, stderr: &str) -> &Self {
        self.push(pattern, None, Reply::Exit {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        })
    }

    /// Like `fail_when`, for the next `times` matching commands only.
    pub fn fail_times(&self, pattern: &str, times: usize, exit_code: i64) -> &Self {
        self.push(pattern, Some(times), Reply::Exit {
            exit_code,
            stdout: String::new(),
            stderr: "scripted failure".to_string(),
        })
    }

    /// Commands whose text contains `pattern` time out.
    pub fn time_out_when(&self, pattern: &str) -> &Self {
        self.push(pattern, None, Reply::Timeout)
    }

    /// Commands whose text contains `pattern` succeed and print `stdout`.
    pub fn respond_when(&self, pattern: &str, stdout: &str) -> &Self {
        self.push(pattern, None, Reply::Exit {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    fn push(&self, pattern: &str, remaining: Option<usize>, reply: Reply) -> &Self {
        self.rules.lock().push(Rule {
            pattern: pattern.to_string(),
            remaining,
            reply,
        });
        self
    }

    pub fn clear_rules(&self) {
        self.rules.lock().clear();
    }

    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.commands.lock().clone()
    }

    /// Recorded commands that contain `needle`.
    pub fn commands_matching(&self, needle: &str) -> Vec<String> {
        self.commands
            .lock()
            .iter()
            .filter(|c| c.command.contains(needle))
            .map(|c| c.command.clone())
            .collect()
    }

    fn reply_for(&self, command: &str) -> Option<Reply> {
        let mut rules = self.rules.lock();
        let rule = rules
            .iter_mut()
            .find(|r| command.contains(&r.pattern) && r.remaining != Some(0))?;
        if let Some(n) = rule.remaining.as_mut() {
            *n -= 1;
        }
        Some(rule.reply.clone())
    }
}

#[async_trait]
impl RemoteExecutor for DryRunExecutor {
    async fn execute(
        &self,
        host: &HostSpec,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, RemoteError> {
        tracing::debug!("[dry-run] {}: {}", host.machine_id, command);
        self.commands.lock().push(RecordedCommand {
            machine_id: host.machine_id.clone(),
            command: command.to_string(),
        });

        match self.reply_for(command) {
            None => Ok(ExecOutput::default()),
            Some(Reply::Exit {
                exit_code,
                stdout,
                stderr,
            }) => Ok(ExecOutput {
                exit_code,
                stdout,
                stderr,
            }),
            Some(Reply::Timeout) => Err(RemoteError::Timeout {
                host: host.machine_id.clone(),
                after: timeout,
            }),
        }
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_and_replies() {
        let exec = DryRunExecutor::new();
        exec.fail_times("nc -z", 2, 1).respond_when("uptime", "up 3 days");
        let host = HostSpec::new("m1", "10.0.0.1");
        let t = Duration::from_secs(1);

        assert!(exec.execute(&host, "mkdir -p /x", t).await.unwrap().success());
        assert_eq!(exec.execute(&host, "nc -z 1", t).await.unwrap().exit_code, 1);
        assert_eq!(exec.execute(&host, "nc -z 1", t).await.unwrap().exit_code, 1);
        assert!(exec.execute(&host, "nc -z 1", t).await.unwrap().success());
        assert_eq!(exec.execute(&host, "uptime", t).await.unwrap().stdout, "up 3 days");

        assert_eq!(exec.commands().len(), 5);
        assert_eq!(exec.commands_matching("nc -z").len(), 3);
    }

    #[tokio::test]
    async fn test_scripted_timeout() {
        let exec = DryRunExecutor::new();
        exec.time_out_when("compose up");
        let host = HostSpec::new("m1", "10.0.0.1");
        let err = exec
            .execute(&host, "docker compose up -d", Duration::from_secs(30))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Timeout { .. }));
    }
}
