//! Server status lifecycle management
//!
//! Tracks the server's startup state (Starting -> Up -> Down); readiness
//! probes answer 503 unless the status is Up.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Server lifecycle status.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Starting = 0,
    Up = 1,
    Down = 2,
}

impl ServerStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Up,
            2 => Self::Down,
            _ => Self::Starting,
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "STARTING"),
            Self::Up => write!(f, "UP"),
            Self::Down => write!(f, "DOWN"),
        }
    }
}

/// Shared server status; clones observe the same state.
#[derive(Clone, Default)]
pub struct ServerStatusManager {
    status: Arc<AtomicU8>,
}

impl ServerStatusManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ServerStatus {
        ServerStatus::from_u8(self.status.load(Ordering::Relaxed))
    }

    pub fn is_up(&self) -> bool {
        self.status() == ServerStatus::Up
    }

    pub fn set_up(&self) {
        self.status.store(ServerStatus::Up as u8, Ordering::Relaxed);
    }

    pub fn set_down(&self) {
        self.status.store(ServerStatus::Down as u8, Ordering::Relaxed);
    }
}

impl fmt::Debug for ServerStatusManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerStatusManager")
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let manager = ServerStatusManager::new();
        assert_eq!(manager.status(), ServerStatus::Starting);
        assert!(!manager.is_up());

        let observer = manager.clone();
        manager.set_up();
        assert!(observer.is_up());

        manager.set_down();
        assert_eq!(observer.status(), ServerStatus::Down);
        assert_eq!(observer.status().to_string(), "DOWN");
    }
}
