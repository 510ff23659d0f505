//! Gradient Boosting implementation
//!
//! Gradient boosted regression trees with row subsampling. The classifier
//! boosts one log-loss model per class (one-vs-rest) and normalises the
//! per-class probabilities.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::decision_tree::{class_count, DecisionTree};
use super::random_forest::argmax;
use crate::error::{AutoMlError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Subsample ratio for each tree
    pub subsample: f64,
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: 42,
        }
    }
}

impl GradientBoostingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(AutoMlError::invalid_param("n_estimators", 0, "must be at least 1"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(AutoMlError::invalid_param(
                "learning_rate",
                self.learning_rate,
                "must be positive",
            ));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(AutoMlError::invalid_param(
                "subsample",
                self.subsample,
                "must be in (0, 1]",
            ));
        }
        Ok(())
    }
}

/// Additive ensemble of regression trees on a raw score scale
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Booster {
    init: f64,
    trees: Vec<DecisionTree>,
}

impl Booster {
    /// Boost `rounds` trees, each fit on the negative gradient returned by `gradient`
    fn fit(
        config: &GradientBoostingConfig,
        x: &Array2<f64>,
        init: f64,
        seed: u64,
        importances: &mut Array1<f64>,
        gradient: impl Fn(&Array1<f64>) -> Array1<f64>,
    ) -> Result<Self> {
        let n_samples = x.nrows();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut scores = Array1::from_elem(n_samples, init);
        let mut trees = Vec::with_capacity(config.n_estimators);

        let n_sub = ((n_samples as f64 * config.subsample).round() as usize).clamp(1, n_samples);

        for round in 0..config.n_estimators {
            let residuals = gradient(&scores);

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(Some(config.max_depth))
                .with_min_samples_split(config.min_samples_split)
                .with_min_samples_leaf(config.min_samples_leaf)
                .with_random_state(seed.wrapping_add(round as u64));

            if n_sub < n_samples {
                let mut rows: Vec<usize> = (0..n_samples).collect();
                rows.shuffle(&mut rng);
                rows.truncate(n_sub);
                rows.sort_unstable();
                tree.fit(&x.select(Axis(0), &rows), &residuals.select(Axis(0), &rows))?;
            } else {
                tree.fit(x, &residuals)?;
            }

            let update = tree.predict(x)?;
            scores.scaled_add(config.learning_rate, &update);

            if let Some(imp) = tree.feature_importances() {
                *importances += imp;
            }
            trees.push(tree);
        }

        Ok(Self { init, trees })
    }

    fn decision(&self, x: &Array2<f64>, learning_rate: f64) -> Result<Array1<f64>> {
        let mut scores = Array1::from_elem(x.nrows(), self.init);
        for tree in &self.trees {
            scores.scaled_add(learning_rate, &tree.predict(x)?);
        }
        Ok(scores)
    }
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
            "cannot boost on zero samples".to_string(),
        ));
    }
    Ok(())
}

fn normalise(mut importances: Array1<f64>) -> Array1<f64> {
    let total = importances.sum();
    if total > 0.0 {
        importances /= total;
    }
    importances
}

/// Gradient Boosting Regressor (squared error)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    booster: Option<Booster>,
    feature_importances: Option<Array1<f64>>,
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            booster: None,
            feature_importances: None,
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    /// Fit the gradient boosting model
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        self.config.validate()?;

        let mut importances = Array1::zeros(x.ncols());
        let init = y.mean().unwrap_or(0.0);
        let booster = Booster::fit(
            &self.config,
            x,
            init,
            self.config.random_state,
            &mut importances,
            |scores| y - scores,
        )?;

        self.booster = Some(booster);
        self.feature_importances = Some(normalise(importances));
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let booster = self.booster.as_ref().ok_or(AutoMlError::ModelNotFitted)?;
        booster.decision(x, self.config.learning_rate)
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }
}

/// Gradient Boosting Classifier (log-loss, one booster per class)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    boosters: Vec<Booster>,
    n_classes: usize,
    feature_importances: Option<Array1<f64>>,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            boosters: Vec::new(),
            n_classes: 0,
            feature_importances: None,
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        self.config.validate()?;

        let n_classes = class_count(y)?;
        if n_classes < 2 {
            return Err(AutoMlError::TrainingError(
                "gradient boosting needs at least two classes".to_string(),
            ));
        }
        // A binary problem needs a single booster for the positive class
        let modelled: Vec<usize> = if n_classes == 2 { vec![1] } else { (0..n_classes).collect() };

        let fitted: Result<Vec<(Booster, Array1<f64>)>> = modelled
            .par_iter()
            .map(|&class| {
                let target: Array1<f64> = y.mapv(|v| if v as usize == class { 1.0 } else { 0.0 });
                let p = target.mean().unwrap_or(0.5).clamp(1e-6, 1.0 - 1e-6);
                let mut importances = Array1::zeros(x.ncols());
                let booster = Booster::fit(
                    &self.config,
                    x,
                    (p / (1.0 - p)).ln(),
                    self.config.random_state.wrapping_add(1000 * class as u64),
                    &mut importances,
                    |scores| &target - &scores.mapv(sigmoid),
                )?;
                Ok((booster, importances))
            })
            .collect();

        let mut importances = Array1::zeros(x.ncols());
        self.boosters = fitted?
            .into_iter()
            .map(|(booster, imp)| {
                importances += &imp;
                booster
            })
            .collect();
        self.n_classes = n_classes;
        self.feature_importances = Some(normalise(importances));
        Ok(())
    }

    /// Class probabilities, one column per class index
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.boosters.is_empty() {
            return Err(AutoMlError::ModelNotFitted);
        }
        let lr = self.config.learning_rate;
        let mut proba = Array2::zeros((x.nrows(), self.n_classes));

        if self.n_classes == 2 {
            let p1 = self.boosters[0].decision(x, lr)?.mapv(sigmoid);
            for (i, &p) in p1.iter().enumerate() {
                proba[[i, 0]] = 1.0 - p;
                proba[[i, 1]] = p;
            }
            return Ok(proba);
        }

        for (c, booster) in self.boosters.iter().enumerate() {
            let p = booster.decision(x, lr)?.mapv(sigmoid);
            proba.column_mut(c).assign(&p);
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

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regressor_reduces_error() {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| (i * (j + 1)) as f64 / 10.0);
        let y = x.column(0).mapv(|v| 3.0 * v + 1.0);

        let mut gb = GradientBoostingRegressor::new(GradientBoostingConfig::default());
        gb.fit(&x, &y).unwrap();
        let preds = gb.predict(&x).unwrap();

        let mse = (&preds - &y).mapv(|v| v * v).mean().unwrap();
        let var = y.mapv(|v| (v - y.mean().unwrap()).powi(2)).mean().unwrap();
        assert!(mse < 0.05 * var);
    }

    #[test]
    fn test_binary_classifier() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [7.0], [8.0], [9.0], [10.0]];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];

        let mut gb = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 20,
            ..Default::default()
        });
        gb.fit(&x, &y).unwrap();
        assert_eq!(gb.predict(&x).unwrap(), y);

        let proba = gb.predict_proba(&x).unwrap();
        assert!((proba.row(0).sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_multiclass_classifier() {
        let x = array![[0.0], [0.5], [5.0], [5.5], [10.0], [10.5]];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];

        let mut gb = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 30,
            ..Default::default()
        });
        gb.fit(&x, &y).unwrap();
        assert_eq!(gb.predict(&x).unwrap(), y);
        assert!((gb.feature_importances().unwrap().sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_subsample_rejected() {
        let mut gb = GradientBoostingRegressor::new(GradientBoostingConfig {
            subsample: 0.0,
            ..Default::default()
        });
        let err = gb.fit(&array![[1.0], [2.0]], &array![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, AutoMlError::InvalidParameter { .. }));
    }
}
