// Lifecycle state machine - which action is legal from which state

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerLifecycleState {
    Offline,
    Starting,
    Online,
    Stopping,
    Restarting,
    Error,
}

impl ServerLifecycleState {
    pub const ALL: [ServerLifecycleState; 6] = [
        ServerLifecycleState::Offline,
        ServerLifecycleState::Starting,
        ServerLifecycleState::Online,
        ServerLifecycleState::Stopping,
        ServerLifecycleState::Restarting,
        ServerLifecycleState::Error,
    ];

    /// A remote operation is in flight.
    pub fn is_transitional(&self) -> bool {
        matches!(
            self,
            ServerLifecycleState::Starting | ServerLifecycleState::Stopping | ServerLifecycleState::Restarting
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerLifecycleState::Offline => "OFFLINE",
            ServerLifecycleState::Starting => "STARTING",
            ServerLifecycleState::Online => "ONLINE",
            ServerLifecycleState::Stopping => "STOPPING",
            ServerLifecycleState::Restarting => "RESTARTING",
            ServerLifecycleState::Error => "ERROR",
        }
    }
}

impl fmt::Display for ServerLifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleAction {
    Install,
    Start,
    Stop,
    Restart,
    ConfigureFirewall,
}

impl LifecycleAction {
    pub const ALL: [LifecycleAction; 5] = [
        LifecycleAction::Install,
        LifecycleAction::Start,
        LifecycleAction::Stop,
        LifecycleAction::Restart,
        LifecycleAction::ConfigureFirewall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::Install => "INSTALL",
            LifecycleAction::Start => "START",
            LifecycleAction::Stop => "STOP",
            LifecycleAction::Restart => "RESTART",
            LifecycleAction::ConfigureFirewall => "CONFIGURE_FIREWALL",
        }
    }

    /// Whether success must be confirmed by health probes.
    pub fn needs_health_check(&self) -> bool {
        matches!(
            self,
            LifecycleAction::Install | LifecycleAction::Start | LifecycleAction::Restart
        )
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The states an accepted action moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub action: LifecycleAction,
    /// State recorded when the action is accepted.
    pub intended: ServerLifecycleState,
    pub on_success: ServerLifecycleState,
    pub on_failure: ServerLifecycleState,
}

/// Decide whether `action` may run from `current`.
///
/// `current` is `None` for a server that has never been installed. Returns
/// `None` when the action is not allowed; nothing else is consulted, so the
/// answer for every (state, action) pair is fixed.
pub fn plan(current: Option<ServerLifecycleState>, action: LifecycleAction) -> Option<Transition> {
    use LifecycleAction as A;
    use ServerLifecycleState as S;

    let (intended, on_success, on_failure) = match (current, action) {
        (None | Some(S::Offline) | Some(S::Error), A::Install) => (S::Starting, S::Online, S::Error),
        (Some(S::Offline) | Some(S::Error), A::Start) => (S::Starting, S::Online, S::Error),
        (Some(S::Online) | Some(S::Error), A::Stop) => (S::Stopping, S::Offline, S::Error),
        (Some(S::Online), A::Restart) => (S::Restarting, S::Online, S::Error),
        // Firewall rules never move the server
        (Some(state), A::ConfigureFirewall) => (state, state, state),
        _ => return None,
    };
    Some(Transition {
        action,
        intended,
        on_success,
        on_failure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleAction as A;
    use ServerLifecycleState as S;

    #[test]
    fn test_table_matches_rules() {
        let start = |s| plan(Some(s), A::Start).map(|t| t.intended);
        assert_eq!(start(S::Offline), Some(S::Starting));
        assert_eq!(start(S::Error), Some(S::Starting));
        assert_eq!(start(S::Online), None);
        assert_eq!(start(S::Starting), None);
        assert_eq!(start(S::Stopping), None);
        assert_eq!(start(S::Restarting), None);

        let stop = |s| plan(Some(s), A::Stop).map(|t| t.intended);
        assert_eq!(stop(S::Online), Some(S::Stopping));
        assert_eq!(stop(S::Error), Some(S::Stopping));
        assert_eq!(stop(S::Offline), None);
        assert_eq!(stop(S::Stopping), None);
        assert_eq!(stop(S::Starting), None);

        for s in S::ALL {
            let restart = plan(Some(s), A::Restart);
            assert_eq!(restart.is_some(), s == S::Online, "restart from {}", s);
        }
    }

    #[test]
    fn test_every_pair_is_decided() {
        let mut accepted = 0;
        for s in S::ALL.iter().copied().map(Some).chain([None]) {
            for a in A::ALL {
                if let Some(t) = plan(s, a) {
                    accepted += 1;
                    assert_eq!(t.action, a);
                    if a == A::ConfigureFirewall {
                        assert_eq!(Some(t.intended), s);
                        assert_eq!(t.on_failure, t.intended);
                    } else {
                        assert!(t.intended.is_transitional());
                        assert_eq!(t.on_failure, S::Error);
                    }
                }
            }
        }
        // install x3, start x2, stop x2, restart x1, firewall x6
        assert_eq!(accepted, 14);
    }

    #[test]
    fn test_outcomes() {
        let t = plan(Some(S::Online), A::Stop).unwrap();
        assert_eq!((t.on_success, t.on_failure), (S::Offline, S::Error));
        let t = plan(None, A::Install).unwrap();
        assert_eq!((t.intended, t.on_success), (S::Starting, S::Online));
        assert!(plan(None, A::Start).is_none());
        assert!(plan(None, A::ConfigureFirewall).is_none());
        assert!(plan(Some(S::Online), A::Install).is_none());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&S::Restarting).unwrap(), "\"RESTARTING\"");
        assert_eq!(
            serde_json::to_string(&A::ConfigureFirewall).unwrap(),
            "\"CONFIGURE_FIREWALL\""
        );
    }
}
