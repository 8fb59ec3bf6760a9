//! Task kinds and the candidate roster

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared learning task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Classification,
    Regression,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Classification => "classification",
            TaskKind::Regression => "regression",
        }
    }

    /// Candidates fitted for this task, in tie-break order
    pub fn roster(&self) -> &'static [Algorithm] {
        match self {
            TaskKind::Classification => &[Algorithm::RandomForest, Algorithm::LogisticRegression],
            TaskKind::Regression => &[Algorithm::RandomForestRegressor, Algorithm::LinearRegression],
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "classification" => Ok(TaskKind::Classification),
            "regression" => Ok(TaskKind::Regression),
            other => Err(format!("unknown task '{}', expected classification or regression", other)),
        }
    }
}

/// Candidate algorithm, identified by its storage tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "random_forest")]
    RandomForest,
    #[serde(rename = "logistic_regression")]
    LogisticRegression,
    #[serde(rename = "random_forest_reg")]
    RandomForestRegressor,
    #[serde(rename = "linear_regression")]
    LinearRegression,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::RandomForest,
        Algorithm::LogisticRegression,
        Algorithm::RandomForestRegressor,
        Algorithm::LinearRegression,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Algorithm::RandomForest => "random_forest",
            Algorithm::LogisticRegression => "logistic_regression",
            Algorithm::RandomForestRegressor => "random_forest_reg",
            Algorithm::LinearRegression => "linear_regression",
        }
    }

    pub fn task(&self) -> TaskKind {
        match self {
            Algorithm::RandomForest | Algorithm::LogisticRegression => TaskKind::Classification,
            Algorithm::RandomForestRegressor | Algorithm::LinearRegression => TaskKind::Regression,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Algorithm::ALL
            .iter()
            .find(|a| a.tag() == s)
            .copied()
            .ok_or_else(|| format!("unknown algorithm '{}'", s))
    }
}
