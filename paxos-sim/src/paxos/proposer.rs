use std::fmt::Debug;
use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;

use crate::agent::{Agent, AgentKind, Reachability};
use crate::paxos::quorum::{self, Abandoned};
use crate::paxos::{Acceptor, ProposalNumber};

/// A Prepare that gathered a quorum and may move on to Accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared<V> {
    pub proposal_number: ProposalNumber,
    /// Either the proposer's own candidate or a value adopted from a prior acceptance.
    pub value: V,
}

/// Outcome of a full [`Proposer::propose`] cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal<V> {
    pub chosen: bool,
    pub value: V,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposerSnapshot {
    pub id: usize,
    pub reachable: bool,
    pub next_proposal_number: ProposalNumber,
}

/// A Paxos proposer driving Prepare and Accept against a shared roster.
pub struct Proposer<V> {
    id: usize,
    total_proposers: usize,
    sequence: u64,
    acceptors: Arc<[Acceptor<V>]>,
    reachability: Reachability,
}

impl<V: Clone + Debug> Proposer<V> {
    /// `id` must be below `total_proposers` for proposal numbers to stay unique.
    pub fn new(id: usize, total_proposers: usize, acceptors: Arc<[Acceptor<V>]>) -> Self {
        Proposer {
            id,
            total_proposers,
            sequence: 0,
            acceptors,
            reachability: Reachability::new(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Interleaves sequence numbers across proposers so no two of them ever
    /// issue the same number.
    pub fn next_proposal_number(&self) -> ProposalNumber {
        self.sequence * self.total_proposers as u64 + self.id as u64
    }

    /// Phase 1. Consumes a proposal number even when the attempt is abandoned.
    pub fn prepare(&mut self, candidate: V) -> Result<Prepared<V>, Abandoned> {
        let proposal_number = self.next_proposal_number();
        self.sequence += 1;

        let responses: Vec<_> = self
            .acceptors
            .iter()
            .filter(|acceptor| acceptor.is_reachable())
            .map(|acceptor| acceptor.prepare(proposal_number))
            .collect();
        info!(
            "Proposer {}: {} of {} acceptors answered Prepare({})",
            self.id,
            responses.len(),
            self.acceptors.len(),
            proposal_number
        );

        let total = self.acceptors.len();
        match quorum::select_value(proposal_number, candidate, &responses, total) {
            Ok(value) => {
                info!(
                    "Proposer {}: Prepared proposal number {} with value {:?}",
                    self.id, proposal_number, value
                );
                Ok(Prepared {
                    proposal_number,
                    value,
                })
            }
            Err(abandoned) => {
                warn!("Proposer {}: Abandoning: {}", self.id, abandoned);
                Err(abandoned)
            }
        }
    }

    /// Phase 2. Returns `true` when a strict majority of the whole roster
    /// accepted, i.e. the value is chosen.
    pub fn accept(&self, proposal_number: ProposalNumber, value: V) -> bool {
        info!(
            "Proposer {}: Telling acceptors to accept value {:?} for proposal {}",
            self.id, value, proposal_number
        );
        let accepted = self
            .acceptors
            .iter()
            .filter(|acceptor| acceptor.is_reachable())
            .filter(|acceptor| acceptor.accept(proposal_number, value.clone()))
            .count();
        let chosen = quorum::is_majority(accepted, self.acceptors.len());
        if chosen {
            info!(
                "Proposer {}: Value {:?} chosen under proposal {} ({} of {} accepted)",
                self.id,
                value,
                proposal_number,
                accepted,
                self.acceptors.len()
            );
        } else {
            warn!(
                "Proposer {}: Proposal {} accepted by only {} of {} acceptors",
                self.id,
                proposal_number,
                accepted,
                self.acceptors.len()
            );
        }
        chosen
    }

    /// Prepare followed, if it succeeds, by Accept.
    pub fn propose(&mut self, candidate: V) -> Proposal<V> {
        match self.prepare(candidate.clone()) {
            Ok(prepared) => Proposal {
                chosen: self.accept(prepared.proposal_number, prepared.value.clone()),
                value: prepared.value,
            },
            Err(_) => Proposal {
                chosen: false,
                value: candidate,
            },
        }
    }

    pub fn snapshot(&self) -> ProposerSnapshot {
        ProposerSnapshot {
            id: self.id,
            reachable: self.is_reachable(),
            next_proposal_number: self.next_proposal_number(),
        }
    }
}

impl<V> Agent for Proposer<V> {
    fn kind(&self) -> AgentKind {
        AgentKind::Proposer
    }

    fn is_reachable(&self) -> bool {
        self.reachability.get()
    }

    fn set_reachable(&self, up: bool) {
        self.reachability.set(up);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(n: usize) -> Arc<[Acceptor<u64>]> {
        (0..n).map(Acceptor::new).collect()
    }

    #[test]
    fn proposal_numbers_interleave() {
        let acceptors = roster(3);
        let mut first = Proposer::new(0, 3, acceptors.clone());
        let mut third = Proposer::new(2, 3, acceptors);
        assert_eq!(first.next_proposal_number(), 0);
        assert_eq!(third.next_proposal_number(), 2);
        let _ = first.prepare(1);
        let _ = third.prepare(1);
        assert_eq!(first.next_proposal_number(), 3);
        assert_eq!(third.next_proposal_number(), 5);
    }

    #[test]
    fn abandoned_prepare_still_advances_sequence() {
        let acceptors = roster(5);
        for acceptor in acceptors.iter() {
            acceptor.set_reachable(false);
        }
        let mut proposer = Proposer::new(1, 2, acceptors);
        assert!(proposer.prepare(9).is_err());
        assert_eq!(proposer.next_proposal_number(), 3);
    }

    #[test]
    fn unreachable_acceptors_are_skipped() {
        let acceptors = roster(5);
        acceptors[0].set_reachable(false);
        acceptors[1].set_reachable(false);
        let mut proposer = Proposer::new(0, 1, acceptors.clone());
        let prepared = proposer.prepare(10).unwrap();
        assert_eq!(prepared.value, 10);
        assert_eq!(acceptors[0].promised(), None);
        assert_eq!(acceptors[2].promised(), Some(0));
    }

    #[test]
    fn accept_counts_only_affirmative_replies() {
        let acceptors = roster(5);
        acceptors[0].prepare(20);
        acceptors[1].prepare(20);
        acceptors[2].prepare(20);
        let proposer = Proposer::new(0, 1, acceptors);
        assert!(!proposer.accept(4, 1));
    }

    #[test]
    fn failed_propose_returns_candidate() {
        let acceptors = roster(3);
        acceptors[0].set_reachable(false);
        acceptors[1].set_reachable(false);
        let mut proposer = Proposer::new(0, 1, acceptors);
        assert_eq!(
            proposer.propose(5),
            Proposal {
                chosen: false,
                value: 5
            }
        );
    }
}
