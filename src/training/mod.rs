//! Model training module
//!
//! Fits a fixed roster of candidates per task, scores them on a held-out
//! split and picks a winner:
//! - classification: random forest, multinomial logistic regression
//! - regression: random forest, ordinary least squares

mod config;
pub mod decision_tree;
pub mod linear_models;
pub mod metrics;
pub mod model;
pub mod random_forest;
pub mod selection;
pub mod split;
mod trainer;

pub use config::{Algorithm, TaskKind};
pub use decision_tree::{Criterion, DecisionTree, MaxFeatures, TreeNode};
pub use linear_models::{LinearRegression, LogisticRegression};
pub use metrics::{CandidateMetrics, ClassificationMetrics, RegressionMetrics};
pub use model::{ClassLabel, ColumnEncoder, FittedModel, InputColumn, LabelEncoder, ModelArtifact};
pub use random_forest::RandomForest;
pub use selection::{select_winner, Selection};
pub use split::{train_test_split, SplitIndices};
pub use trainer::{CandidateResult, Trainer, TrainingSummary};
