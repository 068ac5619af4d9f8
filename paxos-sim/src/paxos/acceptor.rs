use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use serde::Serialize;

use crate::agent::{Agent, AgentKind, Reachability};
use crate::paxos::{Accepted, ProposalNumber};

/// What one acceptor tells one proposer in reply to a Prepare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareResult<V> {
    /// The pair this acceptor most recently accepted, if any.
    pub accepted: Option<Accepted<V>>,
    /// The acceptor's promise after handling the Prepare.
    pub promised: ProposalNumber,
}

#[derive(Debug)]
struct AcceptorState<V> {
    promised: Option<ProposalNumber>,
    accepted: Option<Accepted<V>>,
}

/// A Paxos acceptor.
///
/// State sits behind its own lock so several proposers can share the roster.
/// It only ever changes through [`Acceptor::prepare`] and [`Acceptor::accept`].
#[derive(Debug)]
pub struct Acceptor<V> {
    id: usize,
    state: Mutex<AcceptorState<V>>,
    reachability: Reachability,
}

/// Read-only view of an acceptor, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptorSnapshot<V> {
    pub id: usize,
    pub reachable: bool,
    pub promised: Option<ProposalNumber>,
    pub accepted: Option<Accepted<V>>,
}

impl<V: Clone + Debug> Acceptor<V> {
    pub fn new(id: usize) -> Self {
        Acceptor {
            id,
            state: Mutex::new(AcceptorState {
                promised: None,
                accepted: None,
            }),
            reachability: Reachability::new(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    // Every write completes before the guard drops, so a poisoned lock still
    // holds a consistent state.
    fn state(&self) -> MutexGuard<'_, AcceptorState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raises the promise to `n` if `n` is higher, then always replies with
    /// the current promise and accepted pair.
    ///
    /// A stale `n` is not rejected: the reply carries the higher promise so
    /// the proposer can see it has been overtaken.
    pub fn prepare(&self, n: ProposalNumber) -> PrepareResult<V> {
        let mut state = self.state();
        let promised = match state.promised {
            Some(current) if current >= n => {
                debug!(
                    "Acceptor {}: Prepare({}) does not exceed promise {}",
                    self.id, n, current
                );
                current
            }
            _ => {
                info!("Acceptor {}: Promised proposal number {}", self.id, n);
                state.promised = Some(n);
                n
            }
        };
        PrepareResult {
            accepted: state.accepted.clone(),
            promised,
        }
    }

    /// Accepts `(n, value)` unless `n` is below the current promise.
    ///
    /// Returning `true` only means this acceptor took the value; whether it is
    /// chosen depends on the rest of the roster.
    pub fn accept(&self, n: ProposalNumber, value: V) -> bool {
        let mut state = self.state();
        if let Some(promised) = state.promised {
            if n < promised {
                warn!(
                    "Acceptor {}: Rejected accept for proposal number {} (promised {})",
                    self.id, n, promised
                );
                return false;
            }
        }
        info!(
            "Acceptor {}: Accepted proposal number {} with value {:?}",
            self.id, n, value
        );
        state.accepted = Some(Accepted { number: n, value });
        // A later Prepare carrying exactly `n` must not look like a fresh promise.
        if state.promised.map_or(true, |promised| n > promised) {
            state.promised = Some(n);
        }
        true
    }

    pub fn promised(&self) -> Option<ProposalNumber> {
        self.state().promised
    }

    pub fn accepted(&self) -> Option<Accepted<V>> {
        self.state().accepted.clone()
    }

    pub fn snapshot(&self) -> AcceptorSnapshot<V> {
        let state = self.state();
        AcceptorSnapshot {
            id: self.id,
            reachable: self.is_reachable(),
            promised: state.promised,
            accepted: state.accepted.clone(),
        }
    }
}

impl<V> Agent for Acceptor<V> {
    fn kind(&self) -> AgentKind {
        AgentKind::Acceptor
    }

    fn is_reachable(&self) -> bool {
        self.reachability.get()
    }

    fn set_reachable(&self, up: bool) {
        self.reachability.set(up);
    }
}
