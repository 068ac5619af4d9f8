use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// The two kinds of agent the driver can take down and bring back up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Acceptor,
    Proposer,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentKind::Acceptor => write!(f, "Acceptor"),
            AgentKind::Proposer => write!(f, "Proposer"),
        }
    }
}

/// Whether an agent can currently take part in the protocol.
///
/// Only the driver flips this. The engine reads it right before every
/// simulated send and treats an unreachable agent as one that never replied.
#[derive(Debug)]
pub struct Reachability(AtomicBool);

impl Reachability {
    pub fn new() -> Self {
        Reachability(AtomicBool::new(true))
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, up: bool) {
        self.0.store(up, Ordering::Release);
    }
}

impl Default for Reachability {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability shared by acceptors and proposers so the failure sweep can run
/// over either kind.
pub trait Agent {
    fn kind(&self) -> AgentKind;
    fn is_reachable(&self) -> bool;
    fn set_reachable(&self, up: bool);
}
