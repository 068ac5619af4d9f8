use std::{fs, path::Path};

use yaml_rust::{Yaml, YamlLoader};

use crate::error::ConfigError;

/// Knobs for a failure-injection run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub acceptors: usize,
    pub proposers: usize,
    /// Chance that an up agent goes down at each sweep.
    pub fail_probability: f64,
    /// Chance that a down agent comes back up at each sweep.
    pub resume_probability: f64,
    pub max_rounds: u64,
    /// Fixed seed for a reproducible schedule; random when absent.
    pub seed: Option<u64>,
}

impl SimulationConfig {
    /// One active proposer at a time over an unstable cluster. It can take
    /// many rounds before enough agents are up at once.
    pub fn continual() -> Self {
        SimulationConfig {
            acceptors: 5,
            proposers: 5,
            fail_probability: 0.8,
            resume_probability: 0.3,
            max_rounds: 100_000,
            seed: None,
        }
    }

    /// Two proposers competing over five acceptors.
    pub fn multiple_proposers() -> Self {
        SimulationConfig {
            acceptors: 5,
            proposers: 2,
            fail_probability: 0.5,
            resume_probability: 0.3,
            max_rounds: 100_000,
            seed: None,
        }
    }

    /// Reads a YAML file over `self`. Keys missing from the file keep their
    /// current value.
    pub fn load<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let s = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.merge_yaml(&s)
    }

    pub fn merge_yaml(mut self, s: &str) -> Result<Self, ConfigError> {
        let docs = YamlLoader::load_from_str(s)?;
        let Some(doc) = docs.first() else {
            return Ok(self);
        };

        if let Some(v) = count(doc, "acceptors")? {
            self.acceptors = v;
        }
        if let Some(v) = count(doc, "proposers")? {
            self.proposers = v;
        }
        if let Some(v) = probability(doc, "fail_probability")? {
            self.fail_probability = v;
        }
        if let Some(v) = probability(doc, "resume_probability")? {
            self.resume_probability = v;
        }
        if let Some(v) = integer(doc, "max_rounds")? {
            self.max_rounds = v;
        }
        if let Some(v) = integer(doc, "seed")? {
            self.seed = Some(v);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.acceptors == 0 {
            return Err(ConfigError::Invalid("at least one acceptor is required".into()));
        }
        if self.proposers == 0 {
            return Err(ConfigError::Invalid("at least one proposer is required".into()));
        }
        for (name, p) in [
            ("fail_probability", self.fail_probability),
            ("resume_probability", self.resume_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within [0, 1], got {}",
                    name, p
                )));
            }
        }
        Ok(())
    }
}

fn integer(doc: &Yaml, field: &'static str) -> Result<Option<u64>, ConfigError> {
    match &doc[field] {
        Yaml::BadValue | Yaml::Null => Ok(None),
        Yaml::Integer(i) if *i >= 0 => Ok(Some(*i as u64)),
        other => Err(ConfigError::InvalidField {
            field,
            reason: format!("must be a non-negative integer, got {:?}", other),
        }),
    }
}

fn count(doc: &Yaml, field: &'static str) -> Result<Option<usize>, ConfigError> {
    integer(doc, field)?
        .map(|v| {
            usize::try_from(v).map_err(|e| ConfigError::InvalidField {
                field,
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn probability(doc: &Yaml, field: &'static str) -> Result<Option<f64>, ConfigError> {
    let value = &doc[field];
    if matches!(value, Yaml::BadValue | Yaml::Null) {
        return Ok(None);
    }
    value
        .as_f64()
        .or_else(|| value.as_i64().map(|i| i as f64))
        .map(Some)
        .ok_or_else(|| ConfigError::InvalidField {
            field,
            reason: format!("must be a number, got {:?}", value),
        })
}
