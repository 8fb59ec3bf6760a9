//! Candidate scoring metrics

use serde::{Deserialize, Serialize};

/// Classification scores; precision/recall/F1 are support-weighted averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub f1_score: f64,
    pub precision: f64,
    pub recall: f64,
    /// Rows are true classes, columns predicted classes, both in label order
    pub confusion_matrix: Vec<Vec<u64>>,
}

/// Regression scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    #[serde(rename = "MSE")]
    pub mse: f64,
    #[serde(rename = "MAE")]
    pub mae: f64,
    #[serde(rename = "R2")]
    pub r2: f64,
}

/// Metric set of one candidate, serialized as a flat metric-name map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CandidateMetrics {
    Classification(ClassificationMetrics),
    Regression(RegressionMetrics),
}

impl CandidateMetrics {
    pub fn accuracy(&self) -> Option<f64> {
        match self {
            CandidateMetrics::Classification(m) => Some(m.accuracy),
            CandidateMetrics::Regression(_) => None,
        }
    }

    pub fn mse(&self) -> Option<f64> {
        match self {
            CandidateMetrics::Regression(m) => Some(m.mse),
            CandidateMetrics::Classification(_) => None,
        }
    }
}

impl ClassificationMetrics {
    /// Score predicted class indices against true class indices.
    /// Classes absent from both vectors are left out of the matrix.
    pub fn compute(y_true: &[usize], y_pred: &[usize]) -> Self {
        let n = y_true.len();
        let mut labels: Vec<usize> = y_true.iter().chain(y_pred.iter()).copied().collect();
        labels.sort_unstable();
        labels.dedup();
        let position = |class: usize| labels.binary_search(&class).unwrap_or(0);

        let k = labels.len();
        let mut confusion = vec![vec![0u64; k]; k];
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            confusion[position(t)][position(p)] += 1;
        }

        let correct: u64 = (0..k).map(|i| confusion[i][i]).sum();
        let accuracy = if n > 0 { correct as f64 / n as f64 } else { 0.0 };

        let mut precision = 0.0;
        let mut recall = 0.0;
        let mut f1 = 0.0;
        for c in 0..k {
            let tp = confusion[c][c] as f64;
            let support: u64 = confusion[c].iter().sum();
            let predicted: u64 = confusion.iter().map(|row| row[c]).sum();
            if support == 0 {
                continue;
            }
            let p = if predicted > 0 { tp / predicted as f64 } else { 0.0 };
            let r = tp / support as f64;
            let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };

            let weight = support as f64 / n as f64;
            precision += weight * p;
            recall += weight * r;
            f1 += weight * f;
        }

        Self {
            accuracy,
            f1_score: f1,
            precision,
            recall,
            confusion_matrix: confusion,
        }
    }
}

impl RegressionMetrics {
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Self {
        let n = y_true.len() as f64;
        if y_true.is_empty() {
            return Self { mse: 0.0, mae: 0.0, r2: 0.0 };
        }
        let errors: Vec<f64> = y_true.iter().zip(y_pred.iter()).map(|(t, p)| t - p).collect();

        let ss_res: f64 = errors.iter().map(|e| e * e).sum();
        let mse = ss_res / n;
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let y_mean = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Self { mse, mae, r2 }
    }
}
