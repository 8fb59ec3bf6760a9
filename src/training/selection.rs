//! Winner selection across candidates

use super::config::TaskKind;
use super::trainer::CandidateResult;
use crate::error::{PlatformError, Result};

/// Chosen candidate and the reason given for it
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub index: usize,
    pub justification: String,
}

/// Highest accuracy for classification, lowest MSE for regression.
///
/// Candidates are visited in roster order and replaced only by a strictly
/// better score, so the first-listed candidate wins ties. A NaN score never wins.
pub fn select_winner(task: TaskKind, candidates: &[CandidateResult]) -> Result<Selection> {
    let score = |c: &CandidateResult| -> f64 {
        let value = match task {
            TaskKind::Classification => c.metrics.accuracy(),
            TaskKind::Regression => c.metrics.mse().map(|m| -m),
        };
        value.filter(|v| !v.is_nan()).unwrap_or(f64::NEG_INFINITY)
    };

    let mut best: Option<(usize, f64)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let s = score(candidate);
        if best.map_or(true, |(_, b)| s > b) {
            best = Some((index, s));
        }
    }

    let (index, _) = best.ok_or_else(|| PlatformError::Training("no candidates to select from".to_string()))?;
    let justification = match task {
        TaskKind::Classification => "Selected based on highest accuracy",
        TaskKind::Regression => "Selected based on lowest MSE",
    };
    Ok(Selection {
        index,
        justification: justification.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::config::Algorithm;
    use crate::training::metrics::{CandidateMetrics, RegressionMetrics};

    fn regression(algorithm: Algorithm, mse: f64) -> CandidateResult {
        CandidateResult {
            algorithm,
            metrics: CandidateMetrics::Regression(RegressionMetrics { mse, mae: 0.0, r2: 0.0 }),
            model_path: format!("model_1_{}.bin", algorithm),
        }
    }

    #[test]
    fn test_lowest_mse_wins() {
        let candidates = vec![
            regression(Algorithm::RandomForestRegressor, 2.0),
            regression(Algorithm::LinearRegression, 0.5),
        ];
        let selection = select_winner(TaskKind::Regression, &candidates).unwrap();
        assert_eq!(selection.index, 1);
        assert_eq!(selection.justification, "Selected based on lowest MSE");
    }

    #[test]
    fn test_tie_goes_to_first_listed() {
        let candidates = vec![
            regression(Algorithm::RandomForestRegressor, 1.0),
            regression(Algorithm::LinearRegression, 1.0),
        ];
        assert_eq!(select_winner(TaskKind::Regression, &candidates).unwrap().index, 0);
    }

    #[test]
    fn test_nan_never_wins() {
        let candidates = vec![
            regression(Algorithm::RandomForestRegressor, f64::NAN),
            regression(Algorithm::LinearRegression, 1e9),
        ];
        assert_eq!(select_winner(TaskKind::Regression, &candidates).unwrap().index, 1);
    }

    #[test]
    fn test_empty_roster() {
        assert!(matches!(
            select_winner(TaskKind::Classification, &[]),
            Err(PlatformError::Training(_))
        ));
    }
}
