//! Linear model implementations

use super::decision_tree::class_count;
use super::random_forest::argmax;
use crate::error::{AutoMlError, Result};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Cholesky factorisation of a symmetric positive-definite matrix, `None` if not PD
fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
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
    Some(l)
}

/// Solve `A x = b` for symmetric positive semi-definite `A`.
/// Adds growing diagonal jitter when the factorisation breaks down.
fn solve_spd(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return Err(AutoMlError::ShapeError {
            expected: format!("{}x{} system", b.len(), b.len()),
            actual: format!("{}x{}", a.nrows(), a.ncols()),
        });
    }
    if n == 0 {
        return Ok(Array1::zeros(0));
    }

    let scale = (a.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64).max(1e-12);
    let mut jitter = 0.0;
    for _ in 0..8 {
        let mut a_reg = a.clone();
        for k in 0..n {
            a_reg[[k, k]] += jitter;
        }
        if let Some(l) = cholesky(&a_reg) {
            // Forward substitution: L y = b
            let mut y = Array1::zeros(n);
            for i in 0..n {
                let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
                y[i] = (b[i] - sum) / l[[i, i]];
            }
            // Backward substitution: L^T x = y
            let mut x = Array1::zeros(n);
            for i in (0..n).rev() {
                let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
                x[i] = (y[i] - sum) / l[[i, i]];
            }
            return Ok(x);
        }
        jitter = if jitter == 0.0 { 1e-10 * scale } else { jitter * 100.0 };
    }
    Err(AutoMlError::TrainingError(
        "normal equations are singular".to_string(),
    ))
}

fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(AutoMlError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(AutoMlError::TrainingError(
            "cannot fit a linear model on zero samples".to_string(),
        ));
    }
    Ok(())
}

/// Column means, centred design matrix and centred target
fn center(x: &Array2<f64>, y: &Array1<f64>) -> (Array1<f64>, Array2<f64>, f64, Array1<f64>) {
    let x_mean = x
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(x.ncols()));
    let y_mean = y.mean().unwrap_or(0.0);
    let x_c = x - &x_mean.view().insert_axis(Axis(0));
    let y_c = y - y_mean;
    (x_mean, x_c, y_mean, y_c)
}

fn abs_normalised(coefficients: &Array1<f64>) -> Array1<f64> {
    let abs = coefficients.mapv(f64::abs);
    let total = abs.sum();
    if total > 0.0 {
        abs / total
    } else {
        abs
    }
}

/// Fitted weights of a linear predictor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearFit {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
}

impl LinearFit {
    fn decision(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coefficients.len() {
            return Err(AutoMlError::ShapeError {
                expected: format!("{} features", self.coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.dot(&self.coefficients) + self.intercept)
    }
}

/// Ordinary least squares
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearRegression {
    fit: Option<LinearFit>,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        self.fit = Some(fit_ridge(x, y, 0.0)?);
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fit.as_ref().ok_or(AutoMlError::ModelNotFitted)?.decision(x)
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.fit.as_ref().map(|f| &f.coefficients)
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.coefficients().map(abs_normalised)
    }
}

/// Closed-form `(X^T X + alpha I) w = X^T y` on centred data
fn fit_ridge(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<LinearFit> {
    check_shapes(x, y)?;
    let (x_mean, x_c, y_mean, y_c) = center(x, y);

    let mut xtx = x_c.t().dot(&x_c);
    for i in 0..x.ncols() {
        xtx[[i, i]] += alpha;
    }
    let xty = x_c.t().dot(&y_c);
    let coefficients = solve_spd(&xtx, &xty)?;
    let intercept = y_mean - coefficients.dot(&x_mean);

    Ok(LinearFit {
        coefficients,
        intercept,
    })
}

/// Ridge Regression (L2-regularized linear regression)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegression {
    /// L2 regularization strength
    pub alpha: f64,
    fit: Option<LinearFit>,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, fit: None }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if self.alpha < 0.0 {
            return Err(AutoMlError::invalid_param("alpha", self.alpha, "must be non-negative"));
        }
        self.fit = Some(fit_ridge(x, y, self.alpha)?);
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fit.as_ref().ok_or(AutoMlError::ModelNotFitted)?.decision(x)
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.fit.as_ref().map(|f| &f.coefficients)
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.coefficients().map(abs_normalised)
    }
}

/// Lasso Regression (L1-regularized via coordinate descent)
///
/// Minimises `(1 / 2n) ||y - Xw||^2 + alpha ||w||_1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LassoRegression {
    /// L1 regularization strength
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    fit: Option<LinearFit>,
}

impl Default for LassoRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl LassoRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            max_iter: 1000,
            tol: 1e-6,
            fit: None,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Soft-threshold operator for L1 proximal step
    fn soft_threshold(val: f64, threshold: f64) -> f64 {
        if val > threshold {
            val - threshold
        } else if val < -threshold {
            val + threshold
        } else {
            0.0
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_shapes(x, y)?;
        if self.alpha < 0.0 {
            return Err(AutoMlError::invalid_param("alpha", self.alpha, "must be non-negative"));
        }
        let n_samples = x.nrows();
        let n_features = x.ncols();
        let (x_mean, x_c, y_mean, y_c) = center(x, y);

        let col_norms: Vec<f64> = (0..n_features)
            .map(|j| x_c.column(j).mapv(|v| v * v).sum())
            .collect();

        let mut w: Array1<f64> = Array1::zeros(n_features);
        let mut residual = y_c.clone();
        let lambda = self.alpha * n_samples as f64;

        for _ in 0..self.max_iter {
            let mut max_delta = 0.0_f64;
            for j in 0..n_features {
                if col_norms[j] < 1e-15 {
                    w[j] = 0.0;
                    continue;
                }
                let old = w[j];
                let rho = x_c.column(j).dot(&residual) + col_norms[j] * old;
                w[j] = Self::soft_threshold(rho, lambda) / col_norms[j];
                let delta = old - w[j];
                if delta != 0.0 {
                    residual.scaled_add(delta, &x_c.column(j));
                }
                max_delta = max_delta.max(delta.abs());
            }
            if max_delta < self.tol {
                break;
            }
        }

        let intercept = y_mean - w.dot(&x_mean);
        self.fit = Some(LinearFit {
            coefficients: w,
            intercept,
        });
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fit.as_ref().ok_or(AutoMlError::ModelNotFitted)?.decision(x)
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.fit.as_ref().map(|f| &f.coefficients)
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.coefficients().map(abs_normalised)
    }
}

/// Logistic regression, one-vs-rest for more than two classes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// L2 regularization strength
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub learning_rate: f64,
    fits: Vec<LinearFit>,
    n_classes: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            fits: Vec::new(),
            n_classes: 0,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Batch gradient descent on the L2-penalised log-loss of a 0/1 target
    fn fit_binary(&self, x: &Array2<f64>, target: &Array1<f64>) -> LinearFit {
        let n = x.nrows() as f64;
        let mut weights = Array1::zeros(x.ncols());
        let mut bias = 0.0;

        for _ in 0..self.max_iter {
            let predictions = (x.dot(&weights) + bias).mapv(sigmoid);
            let errors = &predictions - target;
            let dw = x.t().dot(&errors) / n + self.alpha * &weights;
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }
            weights.scaled_add(-self.learning_rate, &dw);
            bias -= self.learning_rate * db;
        }

        LinearFit {
            coefficients: weights,
            intercept: bias,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_shapes(x, y)?;
        let n_classes = class_count(y)?;
        if n_classes < 2 {
            return Err(AutoMlError::TrainingError(
                "logistic regression needs at least two classes".to_string(),
            ));
        }

        let modelled: Vec<usize> = if n_classes == 2 { vec![1] } else { (0..n_classes).collect() };
        self.fits = modelled
            .par_iter()
            .map(|&class| {
                let target = y.mapv(|v| if v as usize == class { 1.0 } else { 0.0 });
                self.fit_binary(x, &target)
            })
            .collect();
        self.n_classes = n_classes;
        Ok(self)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.fits.is_empty() {
            return Err(AutoMlError::ModelNotFitted);
        }
        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        if self.n_classes == 2 {
            let p1 = self.fits[0].decision(x)?.mapv(sigmoid);
            proba.column_mut(1).assign(&p1);
            proba.column_mut(0).assign(&p1.mapv(|p| 1.0 - p));
            return Ok(proba);
        }
        for (c, fit) in self.fits.iter().enumerate() {
            proba.column_mut(c).assign(&fit.decision(x)?.mapv(sigmoid));
        }
        for mut row in proba.outer_iter_mut() {
            let total = row.sum();
            if total > 0.0 {
                row /= total;
            }
        }
        Ok(proba)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.map_axis(Axis(1), |row| argmax(row.iter().copied()) as f64))
    }

    /// Mean absolute coefficient per feature across the one-vs-rest models
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        let first = self.fits.first()?;
        let mut total = Array1::zeros(first.coefficients.len());
        for fit in &self.fits {
            total += &fit.coefficients.mapv(f64::abs);
        }
        Some(abs_normalised(&total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_ols_recovers_line() {
        let x = array![[1.0, 2.0], [2.0, 1.0], [3.0, 4.0], [4.0, 3.0], [5.0, 5.0]];
        let y = x.column(0).mapv(|v| 2.0 * v) + &x.column(1).mapv(|v| -1.0 * v) + 3.0;

        let mut lr = LinearRegression::new();
        lr.fit(&x, &y).unwrap();
        let coef = lr.coefficients().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-6);
        assert!((coef[1] + 1.0).abs() < 1e-6);
        let preds = lr.predict(&x).unwrap();
        assert!((&preds - &y).mapv(f64::abs).sum() < 1e-6);
    }

    #[test]
    fn test_ols_handles_collinear_columns() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];

        let mut lr = LinearRegression::new();
        lr.fit(&x, &y).unwrap();
        let preds = lr.predict(&x).unwrap();
        assert!((&preds - &y).mapv(f64::abs).sum() < 1e-3);
    }

    #[test]
    fn test_ridge_shrinks_coefficients() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![2.0, 4.0, 6.0, 8.0, 10.0];

        let mut weak = RidgeRegression::new(0.0);
        weak.fit(&x, &y).unwrap();
        let mut strong = RidgeRegression::new(100.0);
        strong.fit(&x, &y).unwrap();

        assert!(strong.coefficients().unwrap()[0] < weak.coefficients().unwrap()[0]);
    }

    #[test]
    fn test_lasso_zeroes_irrelevant_feature() {
        let x = array![
            [1.0, 0.3],
            [2.0, -0.1],
            [3.0, 0.2],
            [4.0, -0.3],
            [5.0, 0.1],
            [6.0, -0.2]
        ];
        let y = x.column(0).mapv(|v| 3.0 * v);

        let mut lasso = LassoRegression::new(0.1);
        lasso.fit(&x, &y).unwrap();
        let coef = lasso.coefficients().unwrap();
        assert!(coef[0] > 2.5);
        assert_eq!(coef[1], 0.0);

        let imp = lasso.feature_importances().unwrap();
        assert!((imp[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_logistic_multiclass() {
        let x = array![[-3.0, 0.0], [-2.5, 0.5], [0.0, 3.0], [0.5, 2.5], [3.0, 0.0], [2.5, -0.5]];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];

        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);

        let proba = model.predict_proba(&x).unwrap();
        for row in proba.outer_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unfitted_predict() {
        assert!(matches!(
            RidgeRegression::default().predict(&array![[1.0]]),
            Err(AutoMlError::ModelNotFitted)
        ));
    }
}
