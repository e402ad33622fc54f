//! Static lesson catalog: modules, their ordered subproblems, and the named
//! checkpoints the completion gate watches.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{DtmError, DtmResult};
use crate::rule::AnswerRule;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub name: String,
    pub title: String,
    pub modules: Vec<Module>,
    #[serde(default)]
    pub checkpoints: Vec<Checkpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Section name recorded on every event logged inside this module.
    pub section: String,
    #[serde(default)]
    pub intro: String,
    pub subproblems: Vec<Subproblem>,
    /// Shown once every listed checkpoint is completed by both students.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<Reward>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subproblem {
    /// Stable identifier embedded in logged answer details.
    pub key: String,
    pub prompt: String,
    pub rule: AnswerRule,
    pub hint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    /// Checkpoints both students must pass before this subproblem unlocks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub name: String,
    pub section: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub requires: Vec<String>,
}

impl Catalog {
    pub fn from_toml_str(s: &str) -> DtmResult<Self> {
        let catalog: Catalog = toml::from_str(s).map_err(|e| DtmError::Catalog(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> DtmResult<()> {
        if self.modules.is_empty() {
            return Err(DtmError::Catalog(format!("{}: no modules", self.name)));
        }

        let mut keys = HashSet::new();
        for module in &self.modules {
            if module.subproblems.is_empty() {
                return Err(DtmError::Catalog(format!(
                    "module {:?} has no subproblems",
                    module.section
                )));
            }
            for sub in &module.subproblems {
                if !keys.insert((module.section.as_str(), sub.key.as_str())) {
                    return Err(DtmError::Catalog(format!(
                        "duplicate question key {:?} in {:?}",
                        sub.key, module.section
                    )));
                }
                if let AnswerRule::ExactChoice { choices, answer } = &sub.rule {
                    if !choices.contains(answer) {
                        return Err(DtmError::Catalog(format!(
                            "{:?}: answer {answer:?} is not one of the choices",
                            sub.key
                        )));
                    }
                }
                if let AnswerRule::KeywordThreshold { keywords } = &sub.rule {
                    if keywords.is_empty() {
                        return Err(DtmError::Catalog(format!("{:?}: no keywords", sub.key)));
                    }
                }
            }
        }

        for checkpoint in &self.checkpoints {
            if !keys.contains(&(checkpoint.section.as_str(), checkpoint.key.as_str())) {
                return Err(DtmError::Catalog(format!(
                    "checkpoint {:?} points at unknown question {:?} in {:?}",
                    checkpoint.name, checkpoint.key, checkpoint.section
                )));
            }
        }

        let required = self.modules.iter().flat_map(|m| {
            m.subproblems
                .iter()
                .flat_map(|s| s.requires.iter())
                .chain(m.reward.iter().flat_map(|r| r.requires.iter()))
        });
        for name in required {
            if self.checkpoint(name).is_none() {
                return Err(DtmError::Catalog(format!("unknown checkpoint {name:?}")));
            }
        }
        Ok(())
    }

    pub fn module(&self, index: usize) -> Option<&Module> {
        self.modules.get(index)
    }

    pub fn subproblem(&self, module: usize, sub: usize) -> Option<&Subproblem> {
        self.modules.get(module)?.subproblems.get(sub)
    }

    /// Index of the module titled `section`.
    pub fn module_index(&self, section: &str) -> Option<usize> {
        self.modules.iter().position(|m| m.section == section)
    }

    pub fn checkpoint(&self, name: &str) -> Option<&Checkpoint> {
        self.checkpoints.iter().find(|c| c.name == name)
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn subproblem_count(&self, module: usize) -> usize {
        self.modules.get(module).map_or(0, |m| m.subproblems.len())
    }

    pub fn total_subproblems(&self) -> usize {
        self.modules.iter().map(|m| m.subproblems.len()).sum()
    }

    /// Position of the last subproblem of the last module.
    pub fn last_position(&self) -> (usize, usize) {
        let last = self.modules.len().saturating_sub(1);
        (last, self.subproblem_count(last).saturating_sub(1))
    }
}
