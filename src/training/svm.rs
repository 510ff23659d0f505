//! Support Vector Machine implementations
//!
//! Both estimators solve the dual problem by coordinate descent with the bias
//! folded into the kernel (`K + 1`), which removes the equality constraint
//! and leaves a box-constrained quadratic program.

use super::decision_tree::class_count;
use super::random_forest::argmax;
use crate::error::{AutoMlError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Training sets larger than this would need an n² kernel matrix we refuse to allocate.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Kernel function type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelType {
    /// K(x, y) = x · y
    Linear,
    /// K(x, y) = exp(-γ ||x - y||²)
    Rbf,
    /// K(x, y) = (γ x · y + r)^d
    Poly,
}

impl KernelType {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "linear" => Some(KernelType::Linear),
            "rbf" => Some(KernelType::Rbf),
            "poly" | "polynomial" => Some(KernelType::Poly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KernelType::Linear => "linear",
            KernelType::Rbf => "rbf",
            KernelType::Poly => "poly",
        }
    }
}

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    #[serde(rename = "C", alias = "c")]
    pub c: f64,
    pub kernel: KernelType,
    /// Kernel coefficient; `None` uses `1 / (n_features * var(X))`
    pub gamma: Option<f64>,
    pub degree: u32,
    pub coef0: f64,
    /// Tolerance for stopping criterion
    pub tol: f64,
    /// Maximum number of passes over the samples
    pub max_iter: usize,
    /// Epsilon for regression (SVR tube width)
    pub epsilon: f64,
    pub random_state: u64,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::Rbf,
            gamma: None,
            degree: 3,
            coef0: 0.0,
            tol: 1e-3,
            max_iter: 1000,
            epsilon: 0.1,
            random_state: 42,
        }
    }
}

impl SVMConfig {
    fn validate(&self) -> Result<()> {
        if !(self.c > 0.0) {
            return Err(AutoMlError::invalid_param("C", self.c, "must be positive"));
        }
        if let Some(g) = self.gamma {
            if !(g > 0.0) {
                return Err(AutoMlError::invalid_param("gamma", g, "must be positive"));
            }
        }
        if self.epsilon < 0.0 {
            return Err(AutoMlError::invalid_param("epsilon", self.epsilon, "must be non-negative"));
        }
        Ok(())
    }
}

/// Kernel with its resolved gamma and the training rows it is evaluated against
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FittedKernel {
    kind: KernelType,
    gamma: f64,
    degree: u32,
    coef0: f64,
    support: Array2<f64>,
}

impl FittedKernel {
    fn new(config: &SVMConfig, x: &Array2<f64>) -> Result<Self> {
        let n = x.nrows();
        if n == 0 {
            return Err(AutoMlError::TrainingError("cannot fit an SVM on zero samples".to_string()));
        }
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(AutoMlError::TrainingError(format!(
                "dataset has {} samples, exceeding the maximum {} for the SVM kernel matrix",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }
        let gamma = match config.gamma {
            Some(g) => g,
            None => {
                let var = x.iter().map(|v| v * v).sum::<f64>() / x.len().max(1) as f64
                    - (x.sum() / x.len().max(1) as f64).powi(2);
                if var > 0.0 {
                    1.0 / (x.ncols() as f64 * var)
                } else {
                    1.0
                }
            }
        };
        Ok(Self {
            kind: config.kernel,
            gamma,
            degree: config.degree,
            coef0: config.coef0,
            support: x.clone(),
        })
    }

    fn eval(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        let k = match self.kind {
            KernelType::Linear => a.dot(&b),
            KernelType::Rbf => {
                let dist: f64 = a.iter().zip(b.iter()).map(|(p, q)| (p - q).powi(2)).sum();
                (-self.gamma * dist).exp()
            }
            KernelType::Poly => (self.gamma * a.dot(&b) + self.coef0).powi(self.degree as i32),
        };
        // bias term folded into the kernel
        k + 1.0
    }

    /// Gram matrix of the training rows
    fn gram(&self) -> Result<Array2<f64>> {
        self.cross(&self.support)
    }

    /// Kernel between new rows and the training rows
    fn cross(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.support.ncols() {
            return Err(AutoMlError::ShapeError {
                expected: format!("{} features", self.support.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }
        let m = self.support.nrows();
        let rows: Vec<Vec<f64>> = (0..x.nrows())
            .into_par_iter()
            .map(|i| (0..m).map(|j| self.eval(x.row(i), self.support.row(j))).collect())
            .collect();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Ok(Array2::from_shape_vec((x.nrows(), m), flat)?)
    }
}

/// Dual coordinate descent for a binary hinge-loss SVM with labels in {-1, +1}.
/// Returns the dual coefficients `alpha_i * y_i`.
fn fit_binary(gram: &Array2<f64>, labels: &Array1<f64>, config: &SVMConfig, seed: u64) -> Array1<f64> {
    let n = labels.len();
    let mut alpha: Array1<f64> = Array1::zeros(n);
    // f_i = sum_j alpha_j y_j K_ij
    let mut f: Array1<f64> = Array1::zeros(n);
    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

    for _ in 0..config.max_iter {
        order.shuffle(&mut rng);
        let mut max_change = 0.0_f64;
        for &i in &order {
            let q_ii = gram[[i, i]];
            if q_ii <= 0.0 {
                continue;
            }
            let grad = labels[i] * f[i] - 1.0;
            let new_alpha = (alpha[i] - grad / q_ii).clamp(0.0, config.c);
            let delta = new_alpha - alpha[i];
            if delta.abs() > 1e-12 {
                alpha[i] = new_alpha;
                f.scaled_add(delta * labels[i], &gram.row(i));
                max_change = max_change.max(delta.abs());
            }
        }
        if max_change < config.tol {
            break;
        }
    }
    alpha * labels
}

/// Support Vector Classifier (one-vs-rest beyond two classes)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    kernel: Option<FittedKernel>,
    /// One coefficient vector per modelled class
    dual_coefs: Vec<Array1<f64>>,
    n_classes: usize,
}

impl SVMClassifier {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            kernel: None,
            dual_coefs: Vec::new(),
            n_classes: 0,
        }
    }

    pub fn config(&self) -> &SVMConfig {
        &self.config
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(AutoMlError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        self.config.validate()?;
        let n_classes = class_count(y)?;
        if n_classes < 2 {
            return Err(AutoMlError::TrainingError(
                "SVM classification needs at least two classes".to_string(),
            ));
        }

        let kernel = FittedKernel::new(&self.config, x)?;
        let gram = kernel.gram()?;
        let modelled: Vec<usize> = if n_classes == 2 { vec![1] } else { (0..n_classes).collect() };

        self.dual_coefs = modelled
            .par_iter()
            .map(|&class| {
                let labels = y.mapv(|v| if v as usize == class { 1.0 } else { -1.0 });
                fit_binary(&gram, &labels, &self.config, self.config.random_state.wrapping_add(class as u64))
            })
            .collect();
        self.kernel = Some(kernel);
        self.n_classes = n_classes;
        Ok(())
    }

    /// Raw margins, one column per modelled class
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let kernel = self.kernel.as_ref().ok_or(AutoMlError::ModelNotFitted)?;
        let cross = kernel.cross(x)?;
        let mut out = Array2::zeros((x.nrows(), self.dual_coefs.len()));
        for (c, coef) in self.dual_coefs.iter().enumerate() {
            out.column_mut(c).assign(&cross.dot(coef));
        }
        Ok(out)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let margins = self.decision_function(x)?;
        if self.n_classes == 2 {
            return Ok(margins.column(0).mapv(|m| if m > 0.0 { 1.0 } else { 0.0 }));
        }
        Ok(margins.map_axis(Axis(1), |row| argmax(row.iter().copied()) as f64))
    }

    pub fn n_support_vectors(&self) -> usize {
        let Some(first) = self.dual_coefs.first() else {
            return 0;
        };
        (0..first.len())
            .filter(|&i| self.dual_coefs.iter().any(|c| c[i].abs() > 1e-8))
            .count()
    }
}

/// Epsilon-insensitive Support Vector Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMRegressor {
    config: SVMConfig,
    kernel: Option<FittedKernel>,
    dual_coef: Option<Array1<f64>>,
}

impl SVMRegressor {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            kernel: None,
            dual_coef: None,
        }
    }

    pub fn config(&self) -> &SVMConfig {
        &self.config
    }

    /// Coordinate descent on `beta = alpha - alpha*` within `[-C, C]`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(AutoMlError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        self.config.validate()?;

        let kernel = FittedKernel::new(&self.config, x)?;
        let gram = kernel.gram()?;
        let n = y.len();
        let c = self.config.c;
        let eps = self.config.epsilon;

        let mut beta: Array1<f64> = Array1::zeros(n);
        let mut f: Array1<f64> = Array1::zeros(n);
        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        for _ in 0..self.config.max_iter {
            order.shuffle(&mut rng);
            let mut max_change = 0.0_f64;
            for &i in &order {
                let k_ii = gram[[i, i]];
                if k_ii <= 0.0 {
                    continue;
                }
                // minimise 0.5 k_ii b^2 + (f_i - k_ii beta_i - y_i) b + eps |b|
                let z = k_ii * beta[i] - (f[i] - y[i]);
                let shrunk = if z > eps {
                    z - eps
                } else if z < -eps {
                    z + eps
                } else {
                    0.0
                };
                let new_beta = (shrunk / k_ii).clamp(-c, c);
                let delta = new_beta - beta[i];
                if delta.abs() > 1e-12 {
                    beta[i] = new_beta;
                    f.scaled_add(delta, &gram.row(i));
                    max_change = max_change.max(delta.abs());
                }
            }
            if max_change < self.config.tol {
                break;
            }
        }

        self.kernel = Some(kernel);
        self.dual_coef = Some(beta);
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let kernel = self.kernel.as_ref().ok_or(AutoMlError::ModelNotFitted)?;
        let coef = self.dual_coef.as_ref().ok_or(AutoMlError::ModelNotFitted)?;
        Ok(kernel.cross(x)?.dot(coef))
    }

    pub fn n_support_vectors(&self) -> usize {
        self.dual_coef
            .as_ref()
            .map_or(0, |c| c.iter().filter(|v| v.abs() > 1e-8).count())
    }
}
