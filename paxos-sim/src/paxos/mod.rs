pub mod acceptor;
pub mod learner;
pub mod proposer;
pub mod quorum;

use serde::Serialize;

pub use acceptor::{Acceptor, AcceptorSnapshot, PrepareResult};
pub use proposer::{Prepared, Proposal, Proposer, ProposerSnapshot};
pub use quorum::Abandoned;

/// Orders competing proposals. Higher numbers strictly dominate lower ones.
pub type ProposalNumber = u64;

/// A proposal number together with the value accepted under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Accepted<V> {
    pub number: ProposalNumber,
    pub value: V,
}
