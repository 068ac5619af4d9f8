//! Failure-injection driver around the protocol engine.
//!
//! Nothing in here decides protocol outcomes. It builds agents, flips their
//! reachability, calls the proposers and reports what came back.

pub mod continual;
pub mod multiple;
pub mod scripted;

use std::fmt::Debug;
use std::sync::Arc;

use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;

use crate::agent::{Agent, AgentKind};
use crate::config::SimulationConfig;
use crate::paxos::learner::Learner;
use crate::paxos::{
    Accepted, Acceptor, AcceptorSnapshot, Proposal, ProposalNumber, Proposer, ProposerSnapshot,
};

/// Proposers in the bundled runs offer this plus some offset.
pub const BASE_VALUE: u64 = 10_000_000;

/// One shared acceptor roster plus the proposers bound to it.
///
/// Accepts routed through [`Cluster::accept`] or [`Cluster::propose`] are
/// reported to a [`Learner`], so [`Cluster::chosen`] holds on to a chosen
/// value even after its acceptors move on.
pub struct Cluster<V> {
    acceptors: Arc<[Acceptor<V>]>,
    proposers: Vec<Proposer<V>>,
    learner: Learner<V>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterSnapshot<V> {
    pub acceptors: Vec<AcceptorSnapshot<V>>,
    pub proposers: Vec<ProposerSnapshot>,
}

impl<V: Clone + Debug + PartialEq> Cluster<V> {
    /// Proposers get identities `0..proposers`.
    pub fn new(acceptors: usize, proposers: usize) -> Self {
        let acceptors: Arc<[Acceptor<V>]> = (0..acceptors).map(Acceptor::new).collect();
        let proposers = (0..proposers)
            .map(|id| Proposer::new(id, proposers, acceptors.clone()))
            .collect();
        Cluster {
            acceptors,
            proposers,
            learner: Learner::new(),
        }
    }

    pub fn acceptors(&self) -> &[Acceptor<V>] {
        &self.acceptors
    }

    pub fn proposers(&self) -> &[Proposer<V>] {
        &self.proposers
    }

    /// # Panics
    ///
    /// Panics if `id` is not below the number of proposers.
    pub fn proposer(&self, id: usize) -> &Proposer<V> {
        &self.proposers[id]
    }

    /// # Panics
    ///
    /// Panics if `id` is not below the number of proposers.
    pub fn proposer_mut(&mut self, id: usize) -> &mut Proposer<V> {
        &mut self.proposers[id]
    }

    /// Sets reachability for the listed acceptors, leaving the rest alone.
    ///
    /// # Panics
    ///
    /// Panics if any id is not below the number of acceptors.
    pub fn set_acceptors(&self, ids: &[usize], up: bool) {
        for &id in ids {
            self.acceptors[id].set_reachable(up);
        }
    }

    /// Accept from proposer `id`, telling the learner when it chose a value.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not below the number of proposers.
    pub fn accept(&mut self, id: usize, number: ProposalNumber, value: V) -> bool {
        let chosen = self.proposers[id].accept(number, value.clone());
        if chosen {
            self.learner.record(number, value);
        }
        chosen
    }

    /// Full Prepare/Accept cycle from proposer `id`, telling the learner when
    /// it chose a value. Also returns the proposal number the cycle used.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not below the number of proposers.
    pub fn propose(&mut self, id: usize, candidate: V) -> (ProposalNumber, Proposal<V>) {
        let proposer = &mut self.proposers[id];
        let number = proposer.next_proposal_number();
        let proposal = proposer.propose(candidate);
        if proposal.chosen {
            self.learner.record(number, proposal.value.clone());
        }
        (number, proposal)
    }

    /// The first pair chosen in this cluster, if any. Once set it never
    /// changes, even after later proposals overwrite the acceptors that held it.
    pub fn chosen(&self) -> Option<&Accepted<V>> {
        self.learner.chosen()
    }

    pub fn snapshot(&self) -> ClusterSnapshot<V> {
        ClusterSnapshot {
            acceptors: self.acceptors.iter().map(Acceptor::snapshot).collect(),
            proposers: self.proposers.iter().map(Proposer::snapshot).collect(),
        }
    }

    /// Logs every agent's state under `label`.
    pub fn dump(&self, label: &str) {
        info!("CURRENT SYSTEM STATE {}", label);
        for proposer in &self.proposers {
            info!(
                "  Proposer {} is {}, next proposal number {}",
                proposer.id(),
                up_or_down(proposer.is_reachable()),
                proposer.next_proposal_number()
            );
        }
        for acceptor in self.acceptors.iter() {
            let accepted = match acceptor.accepted() {
                Some(a) => format!("accepted proposal {} value {:?}", a.number, a.value),
                None => "no proposal accepted".to_string(),
            };
            let promised = acceptor
                .promised()
                .map_or_else(|| "none".to_string(), |n| n.to_string());
            info!(
                "  Acceptor {} is {}, {}, promised {}",
                acceptor.id(),
                up_or_down(acceptor.is_reachable()),
                accepted,
                promised
            );
        }
    }
}

fn up_or_down(up: bool) -> &'static str {
    if up {
        "up"
    } else {
        "down"
    }
}

/// Picks `current` if it is up, otherwise the lowest-numbered proposer that
/// is. `None` when every proposer is down.
pub fn select_proposer<V>(proposers: &[Proposer<V>], current: usize) -> Option<usize> {
    if proposers.get(current).is_some_and(|p| p.is_reachable()) {
        return Some(current);
    }
    proposers.iter().position(|p| p.is_reachable())
}

/// Agents that changed state during one [`FailureInjector::sweep`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sweep {
    pub came_up: Vec<usize>,
    pub went_down: Vec<usize>,
}

impl Sweep {
    fn describe(&self, kind: AgentKind) -> String {
        format!(
            "{}, {}.",
            describe_ids(kind, &self.came_up, "come up", "No"),
            describe_ids(kind, &self.went_down, "gone down", "no")
        )
    }
}

fn describe_ids(kind: AgentKind, ids: &[usize], what: &str, none: &str) -> String {
    let list = ids
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(",");
    match ids.len() {
        0 => format!("{} {}s have {}", none, kind, what),
        1 => format!("{} {} has {}", kind, list, what),
        _ => format!("{}s {} have {}", kind, list, what),
    }
}

/// Randomly takes agents down and brings them back.
pub struct FailureInjector {
    fail_probability: f64,
    resume_probability: f64,
    seed: u64,
    rng: StdRng,
}

impl FailureInjector {
    /// Draws a seed when the config has none so the run can be replayed.
    pub fn new(config: &SimulationConfig) -> Self {
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        info!("Failure injector seed {}", seed);
        FailureInjector {
            fail_probability: config.fail_probability,
            resume_probability: config.resume_probability,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Each up agent goes down with `fail_probability`; each down agent
    /// comes back with `resume_probability`.
    pub fn sweep<A: Agent>(&mut self, agents: &[A]) -> Sweep {
        let mut sweep = Sweep::default();
        for (i, agent) in agents.iter().enumerate() {
            if agent.is_reachable() {
                if self.rng.random::<f64>() < self.fail_probability {
                    agent.set_reachable(false);
                    sweep.went_down.push(i);
                }
            } else if self.rng.random::<f64>() < self.resume_probability {
                agent.set_reachable(true);
                sweep.came_up.push(i);
            }
        }
        if let Some(first) = agents.first() {
            info!("{}", sweep.describe(first.kind()));
        }
        sweep
    }

    /// Sweeps acceptors then proposers.
    pub fn sweep_cluster<V: Clone + Debug + PartialEq>(
        &mut self,
        cluster: &Cluster<V>,
    ) -> (Sweep, Sweep) {
        let acceptors = self.sweep(cluster.acceptors());
        let proposers = self.sweep(cluster.proposers());
        (acceptors, proposers)
    }
}

/// What a randomised run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport<V> {
    pub seed: u64,
    pub rounds: u64,
    pub chosen: Option<Accepted<V>>,
    pub final_state: ClusterSnapshot<V>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(fail: f64, resume: f64) -> SimulationConfig {
        SimulationConfig {
            fail_probability: fail,
            resume_probability: resume,
            seed: Some(7),
            ..SimulationConfig::continual()
        }
    }

    #[test]
    fn certain_failure_takes_everyone_down() {
        let cluster: Cluster<u64> = Cluster::new(5, 2);
        let mut injector = FailureInjector::new(&config(1.0, 0.0));
        let (acceptors, proposers) = injector.sweep_cluster(&cluster);
        assert_eq!(acceptors.went_down, vec![0, 1, 2, 3, 4]);
        assert_eq!(proposers.went_down, vec![0, 1]);
        assert!(cluster.acceptors().iter().all(|a| !a.is_reachable()));
    }

    #[test]
    fn certain_resume_brings_everyone_back() {
        let cluster: Cluster<u64> = Cluster::new(3, 1);
        cluster.set_acceptors(&[0, 2], false);
        let mut injector = FailureInjector::new(&config(0.0, 1.0));
        let sweep = injector.sweep(cluster.acceptors());
        assert_eq!(sweep.came_up, vec![0, 2]);
        assert!(sweep.went_down.is_empty());
    }

    #[test]
    fn same_seed_same_schedule() {
        let a: Cluster<u64> = Cluster::new(7, 3);
        let b: Cluster<u64> = Cluster::new(7, 3);
        let mut first = FailureInjector::new(&config(0.5, 0.5));
        let mut second = FailureInjector::new(&config(0.5, 0.5));
        for _ in 0..10 {
            assert_eq!(first.sweep_cluster(&a), second.sweep_cluster(&b));
        }
    }

    #[test]
    fn selects_first_reachable_proposer() {
        let cluster: Cluster<u64> = Cluster::new(3, 3);
        assert_eq!(select_proposer(cluster.proposers(), 1), Some(1));
        cluster.proposer(1).set_reachable(false);
        assert_eq!(select_proposer(cluster.proposers(), 1), Some(0));
        cluster.proposer(0).set_reachable(false);
        cluster.proposer(2).set_reachable(false);
        assert_eq!(select_proposer(cluster.proposers(), 1), None);
    }

    #[test]
    #[should_panic]
    fn unknown_proposer_panics() {
        let cluster: Cluster<u64> = Cluster::new(3, 2);
        cluster.proposer(2);
    }

    #[test]
    #[should_panic]
    fn unknown_acceptor_panics() {
        let cluster: Cluster<u64> = Cluster::new(3, 2);
        cluster.set_acceptors(&[0, 3], false);
    }

    #[test]
    fn chosen_is_recorded_at_accept() {
        let mut cluster: Cluster<u64> = Cluster::new(3, 2);
        let (number, proposal) = cluster.propose(0, 5);
        assert!(proposal.chosen);
        assert_eq!(cluster.chosen(), Some(&Accepted { number, value: 5 }));

        cluster.set_acceptors(&[0], false);
        let prepared = cluster.proposer_mut(1).prepare(6).unwrap();
        assert!(cluster.accept(1, prepared.proposal_number, prepared.value));
        assert_eq!(cluster.chosen(), Some(&Accepted { number, value: 5 }));
    }

    #[test]
    fn sweep_description() {
        let sweep = Sweep {
            came_up: vec![3],
            went_down: vec![],
        };
        assert_eq!(
            sweep.describe(AgentKind::Acceptor),
            "Acceptor 3 has come up, no Acceptors have gone down."
        );
        let sweep = Sweep {
            came_up: vec![],
            went_down: vec![0, 4],
        };
        assert_eq!(
            sweep.describe(AgentKind::Proposer),
            "No Proposers have come up, Proposers 0,4 have gone down."
        );
    }
}
