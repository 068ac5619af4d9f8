//! One active proposer at a time, with agents failing and resuming before
//! each cycle and again between Prepare and Accept.

use log::{info, warn};

use crate::agent::Agent;
use crate::config::SimulationConfig;
use crate::error::ConfigError;
use crate::simulation::{select_proposer, Cluster, FailureInjector, RunReport, BASE_VALUE};

/// Keeps proposing until a value is chosen or `max_rounds` runs out.
///
/// Each proposer always offers `BASE_VALUE + id`.
pub fn run(config: &SimulationConfig) -> Result<RunReport<u64>, ConfigError> {
    config.validate()?;
    info!(
        "Running with {} acceptors and {} proposers, fail probability {} and resume probability {}",
        config.acceptors, config.proposers, config.fail_probability, config.resume_probability
    );

    let mut cluster = Cluster::new(config.acceptors, config.proposers);
    let mut injector = FailureInjector::new(config);
    let mut current = 0;
    let mut rounds = 0;

    while rounds < config.max_rounds && cluster.chosen().is_none() {
        rounds += 1;
        cycle(&mut cluster, &mut injector, &mut current);
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

fn cycle(cluster: &mut Cluster<u64>, injector: &mut FailureInjector, current: &mut usize) {
    injector.sweep_cluster(cluster);
    let Some(id) = select_proposer(cluster.proposers(), *current) else {
        warn!("All proposers are down: call fails");
        return;
    };
    *current = id;

    let candidate = BASE_VALUE + id as u64;
    let proposer = cluster.proposer_mut(id);
    info!(
        "Preparing value {} using proposer {}, next proposal number {}",
        candidate,
        id,
        proposer.next_proposal_number()
    );
    let Ok(prepared) = proposer.prepare(candidate) else {
        return;
    };
    cluster.dump("AFTER PREPARE");

    injector.sweep_cluster(cluster);
    if !cluster.proposer(id).is_reachable() {
        warn!("Abandoning: Proposer {} has gone down", id);
        return;
    }
    let chosen = cluster.accept(id, prepared.proposal_number, prepared.value);
    cluster.dump("AFTER ACCEPT");

    if chosen {
        info!("Value {} has been chosen.", prepared.value);
    }
}
