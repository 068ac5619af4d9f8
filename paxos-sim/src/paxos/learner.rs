use std::collections::HashMap;
use std::fmt::Debug;

use log::{error, info, warn};

use crate::paxos::quorum::is_majority;
use crate::paxos::{Accepted, Acceptor, ProposalNumber};

/// Remembers the first pair reported chosen and keeps it for the rest of the
/// run, whatever later proposals do to the acceptors that held it.
#[derive(Debug, Clone)]
pub struct Learner<V> {
    chosen: Option<Accepted<V>>,
}

impl<V: Clone + Debug + PartialEq> Learner<V> {
    pub fn new() -> Self {
        Learner { chosen: None }
    }

    /// Called whenever an Accept reached a strict majority. Only the first
    /// pair is kept; a later pair must carry the same value.
    pub fn record(&mut self, number: ProposalNumber, value: V) {
        match &self.chosen {
            None => {
                info!(
                    "Learner: Value {:?} chosen under proposal number {}",
                    value, number
                );
                self.chosen = Some(Accepted { number, value });
            }
            Some(first) if first.value == value => info!(
                "Learner: Proposal {} confirms value {:?} chosen under {}",
                number, value, first.number
            ),
            Some(first) => error!(
                "Learner: Proposal {} chose {:?} but {:?} was already chosen under {}",
                number, value, first.value, first.number
            ),
        }
    }

    /// Latches whatever a majority currently holds under one number, for
    /// acceptances the learner was not told about.
    pub fn observe(&mut self, acceptors: &[Acceptor<V>]) {
        if let Some(accepted) = majority_accepted(acceptors) {
            self.record(accepted.number, accepted.value);
        }
    }

    pub fn chosen(&self) -> Option<&Accepted<V>> {
        self.chosen.as_ref()
    }
}

impl<V: Clone + Debug + PartialEq> Default for Learner<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Looks across every acceptor, reachable or not, for a pair currently held
/// under one proposal number by a strict majority of the roster.
///
/// This is a snapshot. A chosen value whose holders were later overwritten by
/// a higher number reaching only a minority no longer shows up here even
/// though it stays chosen; [`Learner`] keeps it.
pub fn majority_accepted<V: Clone + Debug>(acceptors: &[Acceptor<V>]) -> Option<Accepted<V>> {
    let mut counts: HashMap<ProposalNumber, (usize, V)> = HashMap::new();
    for accepted in acceptors.iter().filter_map(Acceptor::accepted) {
        counts
            .entry(accepted.number)
            .or_insert((0, accepted.value))
            .0 += 1;
    }

    let held = counts
        .into_iter()
        .filter(|(_, (count, _))| is_majority(*count, acceptors.len()))
        .max_by_key(|(number, _)| *number)
        .map(|(number, (_, value))| Accepted { number, value });

    if held.is_none() {
        warn!("Learner: No value currently held by a majority.");
    }
    held
}
