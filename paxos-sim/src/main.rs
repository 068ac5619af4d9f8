use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use paxos_sim::{
    simulation::{continual, multiple, scripted, RunReport},
    SimulationConfig,
};

#[derive(Parser)]
#[command(about = "Single-decree Paxos under injected agent failures")]
struct Cli {
    /// Print the run report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// One proposer at a time until a value is chosen
    Continual(Overrides),
    /// Every reachable proposer takes a turn each cycle
    Multiple(Overrides),
    /// Deterministic experiments with hand-picked failures
    Scripted,
}

/// Settings for the randomised runs. Flags win over the YAML file, which wins
/// over the preset.
#[derive(Args)]
struct Overrides {
    /// YAML file with simulation settings
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    acceptors: Option<usize>,
    #[arg(long)]
    proposers: Option<usize>,
    #[arg(long)]
    fail_probability: Option<f64>,
    #[arg(long)]
    resume_probability: Option<f64>,
    #[arg(long)]
    max_rounds: Option<u64>,
    #[arg(long)]
    seed: Option<u64>,
}

impl Overrides {
    fn resolve(self, preset: SimulationConfig) -> anyhow::Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => preset
                .load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => preset,
        };
        if let Some(v) = self.acceptors {
            config.acceptors = v;
        }
        if let Some(v) = self.proposers {
            config.proposers = v;
        }
        if let Some(v) = self.fail_probability {
            config.fail_probability = v;
        }
        if let Some(v) = self.resume_probability {
            config.resume_probability = v;
        }
        if let Some(v) = self.max_rounds {
            config.max_rounds = v;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli { json, command } = Cli::parse();

    match command {
        Command::Continual(overrides) => {
            let config = overrides.resolve(SimulationConfig::continual())?;
            let report = continual::run(&config)?;
            print_run(&report, json)?;
        }
        Command::Multiple(overrides) => {
            let config = overrides.resolve(SimulationConfig::multiple_proposers())?;
            let report = multiple::run(&config)?;
            print_run(&report, json)?;
        }
        Command::Scripted => {
            for report in [scripted::majority_handoff(), scripted::late_accept()] {
                if json {
                    print_json(&report)?;
                    continue;
                }
                match &report.chosen {
                    Some(chosen) => println!(
                        "{}: value {} chosen under proposal number {}",
                        report.name, chosen.value, chosen.number
                    ),
                    None => println!("{}: no value chosen", report.name),
                }
            }
        }
    }
    Ok(())
}

fn print_run(report: &RunReport<u64>, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(report);
    }
    match &report.chosen {
        Some(chosen) => println!(
            "Value {} chosen under proposal number {} after {} rounds (seed {})",
            chosen.value, chosen.number, report.rounds, report.seed
        ),
        None => println!(
            "No value chosen after {} rounds (seed {})",
            report.rounds, report.seed
        ),
    }
    Ok(())
}

fn print_json<T: Serialize>(report: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_rejects_config() {
        assert!(Cli::try_parse_from(["paxos-sim", "scripted", "--config", "run.yaml"]).is_err());
        assert!(Cli::try_parse_from(["paxos-sim", "--json", "scripted"]).is_ok());
    }

    #[test]
    fn flags_override_the_preset() {
        let cli = Cli::try_parse_from(["paxos-sim", "multiple", "--acceptors", "7", "--seed", "3"])
            .unwrap();
        let Command::Multiple(overrides) = cli.command else {
            panic!("expected the multiple subcommand");
        };
        assert!(overrides.config.is_none());
        let config = overrides
            .resolve(SimulationConfig::multiple_proposers())
            .unwrap();
        assert_eq!(config.acceptors, 7);
        assert_eq!(config.proposers, 2);
        assert_eq!(config.seed, Some(3));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let cli = Cli::try_parse_from([
            "paxos-sim",
            "continual",
            "--config",
            "/nonexistent/paxos-sim.yaml",
        ])
        .unwrap();
        let Command::Continual(overrides) = cli.command else {
            panic!("expected the continual subcommand");
        };
        assert!(overrides.resolve(SimulationConfig::continual()).is_err());
    }
}
