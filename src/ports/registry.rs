// Port Registry - the single authority on which (port, protocol) pairs are in use

use crate::games::{GameType, PortProtocol};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

pub const MIN_PORT: u32 = 10000;
pub const MAX_PORT: u32 = 65535;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("port {0} is outside the allowed range {MIN_PORT}-{MAX_PORT}")]
    OutOfRange(i64),

    #[error("port {port}/{protocol} is already allocated to server {owner}")]
    AlreadyAllocated {
        port: u16,
        protocol: PortProtocol,
        owner: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no free port block found for {game_type} starting at {start}")]
    Exhausted { game_type: GameType, start: u32 },
}

/// One granted port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortAllocation {
    pub game_type: GameType,
    pub port: u16,
    pub protocol: PortProtocol,
    pub owner_server_id: String,
    pub allocated_at: DateTime<Utc>,
}

type PortKey = (u16, PortProtocol);

/// Platform-wide allocation table.
///
/// Not per machine: every externally reachable port is governed by one table,
/// so two servers can never be handed the same `(port, protocol)` regardless
/// of game type or host. A `Both` allocation occupies the TCP and the UDP key.
pub struct PortRegistry {
    allocations: Mutex<HashMap<PortKey, PortAllocation>>,
    supported: HashSet<GameType>,
}

impl PortRegistry {
    /// Registry accepting the given game types in `is_supported`.
    pub fn new(supported: impl IntoIterator<Item = GameType>) -> Self {
        Self {
            allocations: Mutex::new(HashMap::new()),
            supported: supported.into_iter().collect(),
        }
    }

    /// Reserve `port` for `owner_server_id`.
    ///
    /// The range check, the conflict check and the insert happen under one
    /// lock, so concurrent callers racing for the same key see exactly one
    /// success.
    pub fn allocate(
        &self,
        game_type: GameType,
        port: u32,
        protocol: PortProtocol,
        owner_server_id: &str,
    ) -> Result<PortAllocation, PortError> {
        if owner_server_id.trim().is_empty() {
            return Err(PortError::InvalidArgument("owner server id is empty".to_string()));
        }
        if !(MIN_PORT..=MAX_PORT).contains(&port) {
            return Err(PortError::OutOfRange(port as i64));
        }
        let port = port as u16;

        let mut allocations = self.allocations.lock();
        for transport in protocol.transports() {
            if let Some(existing) = allocations.get(&(port, *transport)) {
                tracing::debug!(
                    "Rejecting {}/{} for {}: held by {}",
                    port,
                    transport,
                    owner_server_id,
                    existing.owner_server_id
                );
                return Err(PortError::AlreadyAllocated {
                    port,
                    protocol: *transport,
                    owner: existing.owner_server_id.clone(),
                });
            }
        }

        let allocation = PortAllocation {
            game_type,
            port,
            protocol,
            owner_server_id: owner_server_id.to_string(),
            allocated_at: Utc::now(),
        };
        for transport in protocol.transports() {
            allocations.insert((port, *transport), allocation.clone());
        }
        tracing::debug!("Allocated {}/{} to {} ({})", port, protocol, owner_server_id, game_type);
        Ok(allocation)
    }

    /// String entry point for callers holding untyped input.
    pub fn allocate_str(
        &self,
        game_type: &str,
        port: &str,
        protocol: PortProtocol,
        owner_server_id: &str,
    ) -> Result<PortAllocation, PortError> {
        if game_type.trim().is_empty() {
            return Err(PortError::InvalidArgument("game type is empty".to_string()));
        }
        let game = game_type
            .parse::<GameType>()
            .map_err(|e| PortError::InvalidArgument(e.to_string()))?;
        let port = port
            .trim()
            .parse::<i64>()
            .map_err(|_| PortError::InvalidArgument(format!("port '{}' is not a number", port)))?;
        if port < MIN_PORT as i64 || port > MAX_PORT as i64 {
            return Err(PortError::OutOfRange(port));
        }
        self.allocate(game, port as u32, protocol, owner_server_id)
    }

    /// Free a port. Releasing a port nobody holds is a no-op.
    ///
    /// Releasing one transport of a `Both` allocation splits it: the other
    /// transport stays held as a single-transport allocation.
    pub fn release(&self, port: u16, protocol: PortProtocol) {
        let mut allocations = self.allocations.lock();
        for transport in protocol.transports() {
            let Some(removed) = allocations.remove(&(port, *transport)) else {
                continue;
            };
            tracing::debug!("Released {}/{}", port, transport);
            if removed.protocol != PortProtocol::Both {
                continue;
            }
            let other = match transport {
                PortProtocol::Tcp => PortProtocol::Udp,
                _ => PortProtocol::Tcp,
            };
            if let Some(rest) = allocations.get_mut(&(port, other)) {
                if rest.owner_server_id == removed.owner_server_id && rest.protocol == PortProtocol::Both {
                    rest.protocol = other;
                }
            }
        }
    }

    /// Free everything a server holds. Returns how many allocations went away.
    pub fn release_owner(&self, owner_server_id: &str) -> usize {
        let mut allocations = self.allocations.lock();
        let before = allocations.len();
        allocations.retain(|_, a| a.owner_server_id != owner_server_id);
        let released = before - allocations.len();
        if released > 0 {
            tracing::info!("Released {} port key(s) held by {}", released, owner_server_id);
        }
        released
    }

    pub fn is_allocated(&self, port: u16, protocol: PortProtocol) -> bool {
        let allocations = self.allocations.lock();
        protocol
            .transports()
            .iter()
            .any(|t| allocations.contains_key(&(port, *t)))
    }

    /// Allocations owned by a server, one entry per granted port.
    pub fn allocations_for(&self, owner_server_id: &str) -> Vec<PortAllocation> {
        let mut owned: Vec<PortAllocation> = self
            .snapshot()
            .into_iter()
            .filter(|a| a.owner_server_id == owner_server_id)
            .collect();
        owned.sort_by_key(|a| a.port);
        owned
    }

    /// Every active allocation, with `Both` allocations listed once.
    pub fn snapshot(&self) -> Vec<PortAllocation> {
        let allocations = self.allocations.lock();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for allocation in allocations.values() {
            if seen.insert((allocation.port, allocation.protocol, allocation.owner_server_id.clone())) {
                out.push(allocation.clone());
            }
        }
        out.sort_by_key(|a| (a.port, a.protocol.as_str()));
        out
    }

    /// Re-insert allocations recovered from persisted servers.
    /// Conflicting entries are skipped and reported.
    pub fn restore(&self, allocations: impl IntoIterator<Item = PortAllocation>) -> Vec<PortError> {
        let mut conflicts = Vec::new();
        for a in allocations {
            if let Err(e) = self.allocate(a.game_type, a.port as u32, a.protocol, &a.owner_server_id) {
                tracing::warn!("Could not restore allocation {}/{}: {}", a.port, a.protocol, e);
                conflicts.push(e);
            }
        }
        conflicts
    }

    /// Whether the factory can build an installer for this game type.
    pub fn is_supported(&self, game_type: &str) -> bool {
        game_type
            .parse::<GameType>()
            .map(|g| self.supported.contains(&g))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn registry() -> PortRegistry {
        PortRegistry::new(GameType::ALL)
    }

    #[test]
    fn test_allocate_and_conflict_across_games() {
        let r = registry();
        let a = r.allocate(GameType::Minecraft, 25565, PortProtocol::Tcp, "srv-1").unwrap();
        assert_eq!(a.port, 25565);
        assert_eq!(a.owner_server_id, "srv-1");

        let err = r.allocate(GameType::Rust, 25565, PortProtocol::Tcp, "srv-2").unwrap_err();
        assert!(matches!(err, PortError::AlreadyAllocated { port: 25565, .. }));

        // Same number, other transport, is a different key.
        r.allocate(GameType::Rust, 25565, PortProtocol::Udp, "srv-2").unwrap();
    }

    #[test]
    fn test_both_occupies_each_transport() {
        let r = registry();
        r.allocate(GameType::Minecraft, 30000, PortProtocol::Both, "srv-1").unwrap();
        assert!(r.is_allocated(30000, PortProtocol::Tcp));
        assert!(r.is_allocated(30000, PortProtocol::Udp));
        assert!(r.allocate(GameType::Valheim, 30000, PortProtocol::Udp, "srv-2").is_err());

        // A Both request must not half-succeed when one transport is taken.
        r.allocate(GameType::Valheim, 30001, PortProtocol::Udp, "srv-2").unwrap();
        assert!(r.allocate(GameType::Minecraft, 30001, PortProtocol::Both, "srv-3").is_err());
        assert!(!r.is_allocated(30001, PortProtocol::Tcp));
    }

    #[test]
    fn test_range_enforcement_for_every_game() {
        let r = registry();
        for game in GameType::ALL {
            for port in [0, 1, 9999, 65536, 70000] {
                assert_eq!(
                    r.allocate(game, port, PortProtocol::Udp, "srv"),
                    Err(PortError::OutOfRange(port as i64))
                );
            }
        }
        for port in [10000, 25565, 28015, 32768, 65535] {
            r.allocate(GameType::Minecraft, port, PortProtocol::Tcp, "srv").unwrap();
        }
    }

    #[test]
    fn test_allocate_str_validates_arguments() {
        let r = registry();
        assert!(matches!(
            r.allocate_str("", "25565", PortProtocol::Tcp, "srv"),
            Err(PortError::InvalidArgument(_))
        ));
        assert!(matches!(
            r.allocate_str("MINECRAFT", "abc", PortProtocol::Tcp, "srv"),
            Err(PortError::InvalidArgument(_))
        ));
        assert!(matches!(
            r.allocate_str("MINECRAFT", "", PortProtocol::Tcp, "srv"),
            Err(PortError::InvalidArgument(_))
        ));
        assert_eq!(
            r.allocate_str("MINECRAFT", "-1", PortProtocol::Tcp, "srv"),
            Err(PortError::OutOfRange(-1))
        );
        assert!(matches!(
            r.allocate(GameType::Minecraft, 25565, PortProtocol::Tcp, " "),
            Err(PortError::InvalidArgument(_))
        ));
        r.allocate_str("minecraft", "25565", PortProtocol::Tcp, "srv").unwrap();
    }

    #[test]
    fn test_release_is_idempotent() {
        let r = registry();
        r.allocate(GameType::Rust, 28015, PortProtocol::Udp, "srv-1").unwrap();
        r.release(28015, PortProtocol::Udp);
        r.release(28015, PortProtocol::Udp);
        r.release(40000, PortProtocol::Both);
        r.allocate(GameType::Minecraft, 28015, PortProtocol::Udp, "srv-2").unwrap();
    }

    #[test]
    fn test_partial_release_of_both_splits() {
        let r = registry();
        r.allocate(GameType::Minecraft, 25565, PortProtocol::Both, "mc-1").unwrap();
        r.release(25565, PortProtocol::Tcp);

        assert!(!r.is_allocated(25565, PortProtocol::Tcp));
        assert!(r.is_allocated(25565, PortProtocol::Udp));
        let held = r.allocations_for("mc-1");
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].protocol, PortProtocol::Udp);

        r.allocate(GameType::Rust, 25565, PortProtocol::Tcp, "rust-1").unwrap();
        r.release(25565, PortProtocol::Udp);
        assert!(r.allocations_for("mc-1").is_empty());
        assert_eq!(r.snapshot().len(), 1);
    }

    #[test]
    fn test_release_owner_and_snapshot() {
        let r = registry();
        r.allocate(GameType::Rust, 28015, PortProtocol::Udp, "rust-1").unwrap();
        r.allocate(GameType::Rust, 28016, PortProtocol::Udp, "rust-1").unwrap();
        r.allocate(GameType::Minecraft, 25565, PortProtocol::Both, "mc-1").unwrap();

        assert_eq!(r.snapshot().len(), 3);
        assert_eq!(r.allocations_for("rust-1").len(), 2);
        assert_eq!(r.release_owner("rust-1"), 2);
        assert!(r.allocations_for("rust-1").is_empty());
        assert_eq!(r.snapshot().len(), 1);
    }

    #[test]
    fn test_restore_reports_conflicts() {
        let r = registry();
        let source = registry();
        let a = source.allocate(GameType::Dayz, 12302, PortProtocol::Udp, "dz").unwrap();
        r.allocate(GameType::Valheim, 12302, PortProtocol::Udp, "vh").unwrap();
        let conflicts = r.restore(vec![a]);
        assert_eq!(conflicts.len(), 1);
    }

    #[test]
    fn test_is_supported() {
        let r = PortRegistry::new([GameType::Minecraft]);
        assert!(r.is_supported("MINECRAFT"));
        assert!(!r.is_supported("RUST"));
        assert!(!r.is_supported(""));
        assert!(!r.is_supported("ROBLOX"));
    }

    #[test]
    fn test_concurrent_allocations_yield_one_winner() {
        let r = Arc::new(registry());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let r = Arc::clone(&r);
                std::thread::spawn(move || {
                    let game = GameType::ALL[i % GameType::ALL.len()];
                    r.allocate(game, 40000, PortProtocol::Udp, &format!("srv-{}", i)).is_ok()
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
