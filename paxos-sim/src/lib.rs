//! Single-decree Paxos: acceptors, proposers and the majority rule that ties
//! them together, plus a driver that injects agent failures around them.

pub mod agent;
pub mod config;
pub mod error;
pub mod paxos;
pub mod simulation;

pub use agent::{Agent, AgentKind};
pub use config::SimulationConfig;
pub use error::ConfigError;
