//! Linear model implementations

use crate::error::{PlatformError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve symmetric positive-definite system Ax = b using Cholesky decomposition.
/// Retries once with a small ridge when the matrix is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }
    if let Some(x) = cholesky_factor_solve(a, b) {
        return Some(x);
    }

    let mean_diag = a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
    let ridge = (1e-8 * mean_diag).max(1e-10);
    let mut a_reg = a.clone();
    for k in 0..n {
        a_reg[[k, k]] += ridge;
    }
    cholesky_factor_solve(&a_reg, b)
}

fn cholesky_factor_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    // A = L * L^T
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // Forward substitution: L * y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }
    Some(x)
}

/// Gauss-Jordan inversion with partial pivoting (fallback for small systems)
fn matrix_inverse(m: &Array2<f64>) -> Option<Array2<f64>> {
    let n = m.nrows();
    if n != m.ncols() {
        return None;
    }

    // [M | I]
    let mut aug = Array2::<f64>::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = m[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let max_row = (col..n)
            .max_by(|&a, &b| aug[[a, col]].abs().total_cmp(&aug[[b, col]].abs()))
            .unwrap_or(col);
        if max_row != col {
            for j in 0..2 * n {
                aug.swap([col, j], [max_row, j]);
            }
        }
        if aug[[col, col]].abs() < 1e-10 {
            return None;
        }

        let pivot = aug[[col, col]];
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }
        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                for j in 0..2 * n {
                    aug[[row, j]] -= factor * aug[[col, j]];
                }
            }
        }
    }

    Some(aug.slice(ndarray::s![.., n..]).to_owned())
}

/// Ordinary least squares with intercept, solved through the normal equations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: f64,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the model to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PlatformError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| PlatformError::Training("cannot fit on zero samples".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);

        // Center so the intercept falls out of the means
        let x_centered = x - &x_mean.clone().insert_axis(Axis(0));
        let y_centered = y - y_mean;

        let xtx = x_centered.t().dot(&x_centered);
        let xty = x_centered.t().dot(&y_centered);
        let coefficients = match cholesky_solve(&xtx, &xty) {
            Some(coef) => coef,
            None => matrix_inverse(&xtx)
                .map(|inv| inv.dot(&xty))
                .ok_or_else(|| {
                    PlatformError::Training("matrix is singular, cannot solve least squares".to_string())
                })?,
        };

        self.intercept = y_mean - coefficients.dot(&x_mean);
        self.coefficients = Some(coefficients);
        Ok(self)
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(PlatformError::ModelNotFitted)?;
        if x.ncols() != coefficients.len() {
            return Err(PlatformError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.dot(coefficients) + self.intercept)
    }
}

/// Multinomial logistic regression trained with full-batch gradient descent
/// on standardized features, L2 penalty `1 / (C * n_samples)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// (n_features, n_classes)
    pub weights: Option<Array2<f64>>,
    pub bias: Option<Array1<f64>>,
    feature_mean: Option<Array1<f64>>,
    feature_scale: Option<Array1<f64>>,
    /// Inverse regularization strength
    pub c: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub learning_rate: f64,
    n_classes: usize,
}

impl LogisticRegression {
    pub fn new(n_classes: usize) -> Self {
        Self {
            weights: None,
            bias: None,
            feature_mean: None,
            feature_scale: None,
            c: 1.0,
            max_iter: 100,
            tol: 1e-6,
            learning_rate: 0.5,
            n_classes,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    fn softmax_rows(z: &mut Array2<f64>) {
        for mut row in z.rows_mut() {
            let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }
    }

    fn standardize(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (mean, scale) = self
            .feature_mean
            .as_ref()
            .zip(self.feature_scale.as_ref())
            .ok_or(PlatformError::ModelNotFitted)?;
        if x.ncols() != mean.len() {
            return Err(PlatformError::ShapeError {
                expected: format!("{} features", mean.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok((x - &mean.view().insert_axis(Axis(0))) / &scale.view().insert_axis(Axis(0)))
    }

    /// Fit the model; `y` holds class indices in `0..n_classes`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() {
            return Err(PlatformError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.n_classes < 2 {
            return Err(PlatformError::Training(format!(
                "logistic regression needs at least 2 classes, got {}",
                self.n_classes
            )));
        }
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| PlatformError::Training("cannot fit on zero samples".to_string()))?;
        let scale = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 1e-12 { s } else { 1.0 });
        self.feature_mean = Some(mean);
        self.feature_scale = Some(scale);
        let xs = self.standardize(x)?;

        // One-hot targets
        let mut targets = Array2::<f64>::zeros((n_samples, self.n_classes));
        for (i, &label) in y.iter().enumerate() {
            let class = label as usize;
            if label < 0.0 || class >= self.n_classes {
                return Err(PlatformError::Training(format!("class index {} out of range", label)));
            }
            targets[[i, class]] = 1.0;
        }

        let alpha = 1.0 / (self.c * n_samples as f64);
        let lr = self.learning_rate;
        let mut weights = Array2::<f64>::zeros((n_features, self.n_classes));
        let mut bias = Array1::<f64>::zeros(self.n_classes);

        for _iter in 0..self.max_iter {
            let mut proba = xs.dot(&weights) + &bias.view().insert_axis(Axis(0));
            Self::softmax_rows(&mut proba);

            let errors = proba - &targets;
            let dw = xs.t().dot(&errors) / n_samples as f64 + alpha * &weights;
            let db = errors.sum_axis(Axis(0)) / n_samples as f64;

            let grad_norm = (dw.mapv(|v| v * v).sum() + db.mapv(|v| v * v).sum()).sqrt();
            if grad_norm < self.tol {
                break;
            }
            weights = weights - lr * dw;
            bias = bias - lr * db;
        }

        self.weights = Some(weights);
        self.bias = Some(bias);
        Ok(self)
    }

    /// Class probabilities, one row per sample
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let weights = self.weights.as_ref().ok_or(PlatformError::ModelNotFitted)?;
        let bias = self.bias.as_ref().ok_or(PlatformError::ModelNotFitted)?;
        let xs = self.standardize(x)?;
        let mut proba = xs.dot(weights) + &bias.view().insert_axis(Axis(0));
        Self::softmax_rows(&mut proba);
        Ok(proba)
    }

    /// Most probable class index per row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| {
                let mut best = 0;
                for (k, &p) in row.iter().enumerate() {
                    if p > row[best] {
                        best = k;
                    }
                }
                best as f64
            })
            .collect())
    }
}
