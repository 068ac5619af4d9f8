//! Hand-written experiments where the script, not chance, decides which
//! agents are reachable at each step.

use log::{info, warn};
use serde::Serialize;

use crate::agent::Agent;
use crate::paxos::{Accepted, ProposalNumber};
use crate::simulation::{select_proposer, Cluster, ClusterSnapshot, BASE_VALUE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Propose,
    Prepare,
    Accept,
}

/// One scripted call and what it returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub action: Action,
    pub proposer: usize,
    pub proposal_number: ProposalNumber,
    pub value: u64,
    /// Prepare gathered a quorum, or Accept/Propose got the value chosen.
    pub succeeded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptReport {
    pub name: &'static str,
    pub steps: Vec<Step>,
    pub chosen: Option<Accepted<u64>>,
    pub final_state: ClusterSnapshot<u64>,
}

struct Script {
    name: &'static str,
    cluster: Cluster<u64>,
    current: usize,
    steps: Vec<Step>,
}

impl Script {
    fn new(name: &'static str, agents: usize) -> Self {
        info!("Running scripted experiment '{}' with {} agents", name, agents);
        Script {
            name,
            cluster: Cluster::new(agents, agents),
            current: 0,
            steps: Vec::new(),
        }
    }

    fn acceptors(&self, up: &[usize], down: &[usize]) {
        self.cluster.set_acceptors(up, true);
        self.cluster.set_acceptors(down, false);
    }

    fn proposer(&self, id: usize, up: bool) {
        self.cluster.proposer(id).set_reachable(up);
    }

    /// Full cycle from the current proposer, rotating to the first reachable
    /// one if needed.
    fn propose(&mut self, candidate: u64) {
        let Some(id) = select_proposer(self.cluster.proposers(), self.current) else {
            warn!("All proposers are down: call fails");
            return;
        };
        self.current = id;
        info!("Proposing value {} using proposer {}", candidate, id);
        let (number, proposal) = self.cluster.propose(id, candidate);
        if proposal.chosen {
            info!("Value {} has been chosen.", proposal.value);
        }
        self.steps.push(Step {
            action: Action::Propose,
            proposer: id,
            proposal_number: number,
            value: proposal.value,
            succeeded: proposal.chosen,
        });
        self.cluster.dump("");
    }

    /// Prepare only, from a specific proposer. Returns what Accept should send.
    fn prepare(&mut self, id: usize, candidate: u64) -> Option<(ProposalNumber, u64)> {
        self.current = id;
        let proposer = self.cluster.proposer_mut(id);
        let number = proposer.next_proposal_number();
        let outcome = proposer.prepare(candidate).ok();
        self.steps.push(Step {
            action: Action::Prepare,
            proposer: id,
            proposal_number: number,
            value: outcome.as_ref().map_or(candidate, |p| p.value),
            succeeded: outcome.is_some(),
        });
        self.cluster.dump("");
        outcome.map(|p| (p.proposal_number, p.value))
    }

    fn accept(&mut self, id: usize, prepared: Option<(ProposalNumber, u64)>) {
        let Some((number, value)) = prepared else {
            warn!("Proposer {} has nothing prepared to accept", id);
            return;
        };
        self.current = id;
        let chosen = self.cluster.accept(id, number, value);
        if chosen {
            info!("Value {} has been chosen.", value);
        }
        self.steps.push(Step {
            action: Action::Accept,
            proposer: id,
            proposal_number: number,
            value,
            succeeded: chosen,
        });
        self.cluster.dump("");
    }

    fn finish(self) -> ScriptReport {
        ScriptReport {
            name: self.name,
            chosen: self.cluster.chosen().cloned(),
            final_state: self.cluster.snapshot(),
            steps: self.steps,
        }
    }
}

/// Five agents. Two reachable acceptors cannot form a quorum; three can and
/// get proposer 1's value chosen; once everyone is back, a fresh proposal
/// must carry that same value rather than its own. The report keeps the
/// number the value was first chosen under.
pub fn majority_handoff() -> ScriptReport {
    let mut script = Script::new("majority-handoff", 5);
    let mut next_value = BASE_VALUE;

    script.acceptors(&[3, 4], &[0, 1, 2]);
    script.propose(next_value);
    next_value += 1;

    script.acceptors(&[0, 1, 2], &[3, 4]);
    script.proposer(0, false);
    script.propose(next_value);
    next_value += 1;

    script.acceptors(&[0, 1, 2, 3, 4], &[]);
    script.proposer(0, true);
    script.propose(next_value);

    script.finish()
}

/// Three agents. Proposer 0 prepares through acceptors 0 and 1 and then
/// stalls; proposer 1 prepares through the same pair and gets its value
/// chosen by acceptors 1 and 2. When proposer 0 finally sends its Accept,
/// the stale proposal number is refused and the chosen value survives.
pub fn late_accept() -> ScriptReport {
    let mut script = Script::new("late-accept", 3);

    script.acceptors(&[0, 1], &[2]);
    let first = script.prepare(0, BASE_VALUE);

    script.proposer(0, false);
    let second = script.prepare(1, BASE_VALUE + 1);

    script.acceptors(&[1, 2], &[0]);
    script.accept(1, second);

    script.proposer(0, true);
    script.proposer(1, false);
    script.accept(0, first);

    script.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn majority_handoff_keeps_the_chosen_value() {
        let report = majority_handoff();
        let outcomes: Vec<_> = report
            .steps
            .iter()
            .map(|s| (s.proposer, s.proposal_number, s.value, s.succeeded))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                (0, 0, BASE_VALUE, false),
                (1, 1, BASE_VALUE + 1, true),
                (1, 6, BASE_VALUE + 1, true),
            ]
        );
        assert_eq!(
            report.chosen,
            Some(Accepted {
                number: 1,
                value: BASE_VALUE + 1
            })
        );
    }

    #[test]
    fn late_accept_is_refused() {
        let report = late_accept();
        let outcomes: Vec<_> = report
            .steps
            .iter()
            .map(|s| (s.action, s.proposer, s.proposal_number, s.succeeded))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                (Action::Prepare, 0, 0, true),
                (Action::Prepare, 1, 1, true),
                (Action::Accept, 1, 1, true),
                (Action::Accept, 0, 0, false),
            ]
        );
        assert_eq!(
            report.chosen,
            Some(Accepted {
                number: 1,
                value: BASE_VALUE + 1
            })
        );
    }
}
