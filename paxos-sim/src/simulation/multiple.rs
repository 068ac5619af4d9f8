//! Several proposers take turns against the same roster within each cycle.
//!
//! Prepare and Accept of one proposer are never interleaved with another's;
//! the competition comes from their proposal numbers overtaking each other
//! across cycles.

use log::{info, warn};

use crate::agent::Agent;
use crate::config::SimulationConfig;
use crate::error::ConfigError;
use crate::simulation::{Cluster, FailureInjector, RunReport, BASE_VALUE};

/// Keeps cycling until some proposer gets a value chosen or `max_rounds`
/// runs out. The candidate value goes up by one every cycle.
pub fn run(config: &SimulationConfig) -> Result<RunReport<u64>, ConfigError> {
    config.validate()?;
    info!(
        "Running {} proposers against {} acceptors, fail probability {} and resume probability {}",
        config.proposers, config.acceptors, config.fail_probability, config.resume_probability
    );

    let mut cluster = Cluster::new(config.acceptors, config.proposers);
    let mut injector = FailureInjector::new(config);
    let mut rounds = 0;

    while rounds < config.max_rounds && cluster.chosen().is_none() {
        let candidate = BASE_VALUE + rounds;
        rounds += 1;
        cycle(&mut cluster, &mut injector, candidate);
    }
    let chosen = cluster.chosen().cloned();
    if chosen.is_none() {
        warn!("No value chosen after {} rounds", rounds);
    }

    Ok(RunReport {
        seed: injector.seed(),
        rounds,
        chosen,
        final_state: cluster.snapshot(),
    })
}

fn cycle(cluster: &mut Cluster<u64>, injector: &mut FailureInjector, candidate: u64) {
    injector.sweep_cluster(cluster);
    if !cluster.proposers().iter().any(|p| p.is_reachable()) {
        warn!("All proposers are down: call fails");
        return;
    }

    for id in 0..cluster.proposers().len() {
        if !cluster.proposer(id).is_reachable() {
            continue;
        }
        let Ok(prepared) = cluster.proposer_mut(id).prepare(candidate) else {
            continue;
        };
        cluster.dump(&format!("AFTER PREPARE FOR PROPOSER {}", id));

        injector.sweep_cluster(cluster);
        if !cluster.proposer(id).is_reachable() {
            warn!("Proposer {} has gone down: call fails", id);
            return;
        }
        info!(
            "Accepting value {} for proposal {} using proposer {}",
            prepared.value, prepared.proposal_number, id
        );
        let chosen = cluster.accept(id, prepared.proposal_number, prepared.value);
        cluster.dump("AFTER ACCEPT");
        if chosen {
            info!("Value {} has been chosen.", prepared.value);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paxos::Accepted;

    #[test]
    fn stable_cluster_lets_first_proposer_win() {
        let config = SimulationConfig {
            fail_probability: 0.0,
            seed: Some(3),
            ..SimulationConfig::multiple_proposers()
        };
        let report = run(&config).unwrap();
        assert_eq!(report.rounds, 1);
        assert_eq!(
            report.chosen,
            Some(Accepted {
                number: 0,
                value: BASE_VALUE
            })
        );
        assert_eq!(report.final_state.proposers.len(), 2);
    }

    #[test]
    fn chosen_value_is_held_by_a_majority() {
        for seed in 0..20 {
            let config = SimulationConfig {
                seed: Some(seed),
                max_rounds: 10_000,
                ..SimulationConfig::multiple_proposers()
            };
            let report = run(&config).unwrap();
            let Some(chosen) = report.chosen else {
                continue;
            };
            let holders = report
                .final_state
                .acceptors
                .iter()
                .filter(|a| a.accepted.as_ref() == Some(&chosen))
                .count();
            assert!(holders >= 3, "seed {}", seed);
        }
    }
}
