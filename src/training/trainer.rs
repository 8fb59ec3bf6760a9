//! Multi-candidate trainer

use super::config::{Algorithm, TaskKind};
use super::linear_models::{LinearRegression, LogisticRegression};
use super::metrics::{CandidateMetrics, ClassificationMetrics, RegressionMetrics};
use super::model::{encode_frame, regression_target, FittedModel, InputColumn, LabelEncoder, ModelArtifact};
use super::random_forest::RandomForest;
use super::selection::select_winner;
use super::split::train_test_split;
use crate::config::PlatformConfig;
use crate::data::{require_columns, DatasetAccessor, DatasetHandle, DatasetSummary};
use crate::error::{PlatformError, Result};
use crate::storage::{new_run_id, save_model, ArtifactStore};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Outcome of one fitted candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub algorithm: Algorithm,
    pub metrics: CandidateMetrics,
    /// Locator of the persisted model
    pub model_path: String,
}

/// Result of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Names this run's candidate files; a retrain never touches them
    pub run_id: String,
    pub best_algorithm: Algorithm,
    pub justification: String,
    pub all_results: Vec<CandidateResult>,
    pub task: TaskKind,
    pub input_columns: Vec<String>,
    pub output_columns: Vec<String>,
    pub best_model_path: String,
}

impl TrainingSummary {
    pub fn winner(&self) -> Option<&CandidateResult> {
        self.all_results
            .iter()
            .find(|c| c.algorithm == self.best_algorithm)
    }
}

/// Encoded training data of one run
struct PreparedData {
    inputs: Vec<InputColumn>,
    labels: Option<LabelEncoder>,
    x_train: Array2<f64>,
    y_train: Array1<f64>,
    x_test: Array2<f64>,
    y_test: Array1<f64>,
}

/// Fits the candidate roster for a task and persists every candidate
pub struct Trainer {
    datasets: Arc<dyn DatasetAccessor>,
    store: Arc<dyn ArtifactStore>,
    test_size: f64,
    random_state: u64,
}

impl Trainer {
    pub fn new(
        datasets: Arc<dyn DatasetAccessor>,
        store: Arc<dyn ArtifactStore>,
        config: &PlatformConfig,
    ) -> Self {
        Self {
            datasets,
            store,
            test_size: config.test_size,
            random_state: config.random_state,
        }
    }

    /// Row/column counts and column names of a dataset
    pub fn analyze(&self, handle: DatasetHandle) -> Result<DatasetSummary> {
        let df = self.datasets.read_table(handle)?;
        Ok(DatasetSummary::of(&df))
    }

    /// Train every roster candidate on the dataset behind `handle`.
    ///
    /// The handle doubles as the model identifier in artifact names. Each run
    /// writes its candidates under a fresh run id, so locators handed out by
    /// earlier runs keep resolving to the models they were issued for.
    pub fn train(
        &self,
        handle: DatasetHandle,
        task: TaskKind,
        input_columns: &[String],
        output_columns: &[String],
    ) -> Result<TrainingSummary> {
        let start = Instant::now();
        let result = self.run(handle, task, input_columns, output_columns);
        match &result {
            Ok(summary) => info!(
                dataset = handle,
                task = %task,
                best = %summary.best_algorithm,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Training run completed"
            ),
            Err(e) => error!(dataset = handle, task = %task, error = %e, "Training run failed"),
        }
        result
    }

    fn run(
        &self,
        handle: DatasetHandle,
        task: TaskKind,
        input_columns: &[String],
        output_columns: &[String],
    ) -> Result<TrainingSummary> {
        let output = validate_columns(input_columns, output_columns)?;
        let df = self.datasets.read_table(handle)?;
        let mut wanted = input_columns.to_vec();
        wanted.extend(output_columns.iter().cloned());
        require_columns(&df, &wanted)?;

        let split = train_test_split(df.height(), self.test_size, self.random_state)?;
        info!(
            dataset = handle,
            rows = df.height(),
            train_rows = split.train.len(),
            test_rows = split.test.len(),
            "Dataset split"
        );

        let inputs = input_columns
            .iter()
            .map(|name| InputColumn::fit(&df, name))
            .collect::<Result<Vec<_>>>()?;
        let x = encode_frame(&inputs, &df)?;

        let (labels, y): (Option<LabelEncoder>, Array1<f64>) = match task {
            TaskKind::Classification => {
                let (labels, codes) = LabelEncoder::fit_transform(&df, output)?;
                (Some(labels), codes.into_iter().map(|c| c as f64).collect())
            }
            TaskKind::Regression => (None, Array1::from_vec(regression_target(&df, output)?)),
        };

        let data = PreparedData {
            inputs,
            labels,
            x_train: x.select(Axis(0), &split.train),
            y_train: y.select(Axis(0), &split.train),
            x_test: x.select(Axis(0), &split.test),
            y_test: y.select(Axis(0), &split.test),
        };

        let run_id = new_run_id();
        let mut all_results = Vec::with_capacity(task.roster().len());
        for &algorithm in task.roster() {
            let fit_start = Instant::now();
            let candidate = self.fit_candidate(handle, &run_id, algorithm, output, &data)?;
            info!(
                dataset = handle,
                algorithm = %algorithm,
                elapsed_ms = fit_start.elapsed().as_millis() as u64,
                path = %candidate.model_path,
                "Candidate trained"
            );
            all_results.push(candidate);
        }

        let selection = select_winner(task, &all_results)?;
        let winner = &all_results[selection.index];
        Ok(TrainingSummary {
            run_id,
            best_algorithm: winner.algorithm,
            justification: selection.justification,
            best_model_path: winner.model_path.clone(),
            task,
            input_columns: input_columns.to_vec(),
            output_columns: output_columns.to_vec(),
            all_results,
        })
    }

    fn fit_candidate(
        &self,
        handle: DatasetHandle,
        run_id: &str,
        algorithm: Algorithm,
        output: &str,
        data: &PreparedData,
    ) -> Result<CandidateResult> {
        let n_classes = data.labels.as_ref().map_or(0, |l| l.n_classes());
        let model = match algorithm {
            Algorithm::RandomForest => {
                let mut rf = RandomForest::new_classifier(n_classes).with_random_state(self.random_state);
                rf.fit(&data.x_train, &data.y_train)?;
                FittedModel::RandomForest(rf)
            }
            Algorithm::RandomForestRegressor => {
                let mut rf = RandomForest::new_regressor().with_random_state(self.random_state);
                rf.fit(&data.x_train, &data.y_train)?;
                FittedModel::RandomForest(rf)
            }
            Algorithm::LogisticRegression => {
                let mut lr = LogisticRegression::new(n_classes).with_max_iter(200);
                lr.fit(&data.x_train, &data.y_train)?;
                FittedModel::LogisticRegression(lr)
            }
            Algorithm::LinearRegression => {
                let mut lr = LinearRegression::new();
                lr.fit(&data.x_train, &data.y_train)?;
                FittedModel::LinearRegression(lr)
            }
        };

        let predictions = model.predict(&data.x_test)?;
        let metrics = match algorithm.task() {
            TaskKind::Classification => {
                let y_true: Vec<usize> = data.y_test.iter().map(|&v| v as usize).collect();
                let y_pred: Vec<usize> = predictions.iter().map(|&v| v as usize).collect();
                CandidateMetrics::Classification(ClassificationMetrics::compute(&y_true, &y_pred))
            }
            TaskKind::Regression => CandidateMetrics::Regression(RegressionMetrics::compute(
                &data.y_test.to_vec(),
                &predictions.to_vec(),
            )),
        };

        let artifact = ModelArtifact::new(
            algorithm,
            data.inputs.clone(),
            output.to_string(),
            data.labels.clone(),
            model,
        );
        let model_path = save_model(self.store.as_ref(), handle, run_id, &artifact)?;

        Ok(CandidateResult {
            algorithm,
            metrics,
            model_path,
        })
    }
}

/// Returns the modelled output column (the first one)
fn validate_columns<'a>(input_columns: &[String], output_columns: &'a [String]) -> Result<&'a str> {
    if input_columns.is_empty() {
        return Err(PlatformError::Schema("at least one input column is required".to_string()));
    }
    let output = output_columns
        .first()
        .ok_or_else(|| PlatformError::Schema("at least one output column is required".to_string()))?;
    if input_columns.contains(output) {
        return Err(PlatformError::Schema(format!(
            "output column '{}' is also listed as an input",
            output
        )));
    }
    Ok(output.as_str())
}
