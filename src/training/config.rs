//! Model registry and hyperparameter configuration

use super::decision_tree::Criterion;
use super::gradient_boosting::GradientBoostingConfig;
use super::knn::KNNConfig;
use super::random_forest::MaxFeatures;
use super::svm::SVMConfig;
use crate::autopipeline::ProblemType;
use crate::error::{AutoMlError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Model families the registry can build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    RandomForest,
    GradientBoosting,
    ExtraTrees,
    AdaBoost,
    /// Bootstrap-aggregated decision trees using every feature
    Bagging,
    /// OLS for regression, logistic regression for classification
    Linear,
    Lasso,
    Ridge,
    Svm,
    DecisionTree,
    Knn,
}

/// Optional behaviour a trained model exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub supports_importances: bool,
    pub supports_probability: bool,
}

impl ModelType {
    pub fn all() -> &'static [ModelType] {
        &[
            ModelType::RandomForest,
            ModelType::GradientBoosting,
            ModelType::ExtraTrees,
            ModelType::AdaBoost,
            ModelType::Bagging,
            ModelType::Linear,
            ModelType::Lasso,
            ModelType::Ridge,
            ModelType::Svm,
            ModelType::DecisionTree,
            ModelType::Knn,
        ]
    }

    /// Short mnemonic name
    pub fn alias(&self) -> &'static str {
        match self {
            ModelType::RandomForest => "rf",
            ModelType::GradientBoosting => "gb",
            ModelType::ExtraTrees => "et",
            ModelType::AdaBoost => "ada",
            ModelType::Bagging => "bag",
            ModelType::Linear => "lr",
            ModelType::Lasso => "lasso",
            ModelType::Ridge => "ridge",
            ModelType::Svm => "svm",
            ModelType::DecisionTree => "dt",
            ModelType::Knn => "knn",
        }
    }

    pub fn canonical_name(&self) -> &'static str {
        match self {
            ModelType::RandomForest => "random_forest",
            ModelType::GradientBoosting => "gradient_boosting",
            ModelType::ExtraTrees => "extra_trees",
            ModelType::AdaBoost => "adaboost",
            ModelType::Bagging => "bagging",
            ModelType::Linear => "linear_regression",
            ModelType::Lasso => "lasso_regression",
            ModelType::Ridge => "ridge_regression",
            ModelType::Svm => "support_vector_machine",
            ModelType::DecisionTree => "decision_tree",
            ModelType::Knn => "k_nearest_neighbors",
        }
    }

    /// Name trained records are stored under
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelType::RandomForest => "Random Forest",
            ModelType::GradientBoosting => "Gradient Boosting",
            ModelType::ExtraTrees => "Extra Trees",
            ModelType::AdaBoost => "AdaBoost",
            ModelType::Bagging => "Bagging",
            ModelType::Linear => "Linear Regression",
            ModelType::Lasso => "Lasso Regression",
            ModelType::Ridge => "Ridge Regression",
            ModelType::Svm => "Support Vector Machine",
            ModelType::DecisionTree => "Decision Tree",
            ModelType::Knn => "K-Nearest Neighbors",
        }
    }

    /// Every identifier `from_identifier` lists as valid, sorted
    pub fn identifiers() -> Vec<String> {
        let mut ids: Vec<String> = Self::all()
            .iter()
            .flat_map(|m| [m.alias().to_string(), m.canonical_name().to_string()])
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Resolve an alias, canonical name or display name (case-insensitive)
    pub fn from_identifier(name: &str) -> Result<Self> {
        let key = normalize(name);
        Self::all()
            .iter()
            .copied()
            .find(|m| m.alias() == key || m.canonical_name() == key)
            .ok_or_else(|| AutoMlError::UnknownModelType {
                name: name.to_string(),
                available: Self::identifiers(),
            })
    }

    /// Regression-only families reject classification targets
    pub fn check_compatible(&self, problem: ProblemType) -> Result<()> {
        match (self, problem) {
            (ModelType::Lasso | ModelType::Ridge, ProblemType::Classification) => {
                Err(AutoMlError::IncompatibleModel {
                    model: self.display_name().to_string(),
                    problem: problem.as_str().to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn capabilities(&self, problem: ProblemType) -> Capabilities {
        let supports_importances = !matches!(self, ModelType::Svm | ModelType::Knn);
        let supports_probability = problem.is_classification()
            && !matches!(self, ModelType::Svm | ModelType::Lasso | ModelType::Ridge);
        Capabilities {
            supports_importances,
            supports_probability,
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for ModelType {
    type Err = AutoMlError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_identifier(s)
    }
}

fn normalize(name: &str) -> String {
    name.trim()
        .to_ascii_lowercase()
        .replace([' ', '-'], "_")
}

/// Tree ensemble hyperparameters (random forest, extra trees, bagging)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// `None` picks sqrt for classification and all features for regression
    pub max_features: Option<MaxFeatures>,
    pub random_state: u64,
}

impl ForestParams {
    fn with_estimators(n_estimators: usize) -> Self {
        Self {
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaBoostParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub random_state: u64,
}

impl Default for AdaBoostParams {
    fn default() -> Self {
        Self {
            n_estimators: 50,
            learning_rate: 1.0,
            random_state: 42,
        }
    }
}

/// Settings of the logistic model used for classification; OLS has none
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearParams {
    pub alpha: f64,
    pub max_iter: usize,
    pub learning_rate: f64,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self {
            alpha: 0.01,
            max_iter: 1000,
            learning_rate: 0.1,
        }
    }
}

/// Lasso and ridge regularisation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenalizedParams {
    pub alpha: f64,
    pub max_iter: usize,
}

impl Default for PenalizedParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            max_iter: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// `None` picks gini for classification and mse for regression
    pub criterion: Option<Criterion>,
    pub random_state: u64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: None,
            random_state: 42,
        }
    }
}

/// Hyperparameters of one model family
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ModelParams {
    Forest(ForestParams),
    Boosting(GradientBoostingConfig),
    AdaBoost(AdaBoostParams),
    Linear(LinearParams),
    Penalized(PenalizedParams),
    Svm(SVMConfig),
    Tree(TreeParams),
    Knn(KNNConfig),
}

impl ModelParams {
    pub fn defaults(model_type: ModelType) -> Self {
        match model_type {
            ModelType::RandomForest | ModelType::ExtraTrees => {
                ModelParams::Forest(ForestParams::with_estimators(100))
            }
            ModelType::Bagging => ModelParams::Forest(ForestParams::with_estimators(10)),
            ModelType::GradientBoosting => ModelParams::Boosting(GradientBoostingConfig::default()),
            ModelType::AdaBoost => ModelParams::AdaBoost(AdaBoostParams::default()),
            ModelType::Linear => ModelParams::Linear(LinearParams::default()),
            ModelType::Lasso | ModelType::Ridge => ModelParams::Penalized(PenalizedParams::default()),
            ModelType::Svm => ModelParams::Svm(SVMConfig::default()),
            ModelType::DecisionTree => ModelParams::Tree(TreeParams::default()),
            ModelType::Knn => ModelParams::Knn(KNNConfig::default()),
        }
    }

    /// Defaults for `model_type` with a JSON object of overrides applied
    pub fn with_overrides(model_type: ModelType, overrides: Option<&Value>) -> Result<Self> {
        let mut params = Self::defaults(model_type);
        match overrides {
            None | Some(Value::Null) => {}
            Some(Value::Object(map)) => params.apply(map)?,
            Some(other) => {
                return Err(AutoMlError::invalid_param(
                    "params",
                    other,
                    "expected a JSON object of parameter overrides",
                ))
            }
        }
        Ok(params)
    }

    /// Merge overrides into the current values. Unknown keys and values of
    /// the wrong type are rejected.
    pub fn apply(&mut self, overrides: &Map<String, Value>) -> Result<()> {
        *self = match self {
            ModelParams::Forest(p) => ModelParams::Forest(merge(p, overrides)?),
            ModelParams::Boosting(p) => ModelParams::Boosting(merge(p, overrides)?),
            ModelParams::AdaBoost(p) => ModelParams::AdaBoost(merge(p, overrides)?),
            ModelParams::Linear(p) => ModelParams::Linear(merge(p, overrides)?),
            ModelParams::Penalized(p) => ModelParams::Penalized(merge(p, overrides)?),
            ModelParams::Svm(p) => ModelParams::Svm(merge(p, overrides)?),
            ModelParams::Tree(p) => ModelParams::Tree(merge(p, overrides)?),
            ModelParams::Knn(p) => ModelParams::Knn(merge(p, overrides)?),
        };
        Ok(())
    }

    /// Seed every stochastic family with `seed`
    pub fn set_random_state(&mut self, seed: u64) {
        match self {
            ModelParams::Forest(p) => p.random_state = seed,
            ModelParams::Boosting(p) => p.random_state = seed,
            ModelParams::AdaBoost(p) => p.random_state = seed,
            ModelParams::Svm(p) => p.random_state = seed,
            ModelParams::Tree(p) => p.random_state = seed,
            ModelParams::Linear(_) | ModelParams::Penalized(_) | ModelParams::Knn(_) => {}
        }
    }

    /// Flat `name -> value` view without the family tag
    pub fn to_map(&self) -> Map<String, Value> {
        let value = match self {
            ModelParams::Forest(p) => serde_json::to_value(p),
            ModelParams::Boosting(p) => serde_json::to_value(p),
            ModelParams::AdaBoost(p) => serde_json::to_value(p),
            ModelParams::Linear(p) => serde_json::to_value(p),
            ModelParams::Penalized(p) => serde_json::to_value(p),
            ModelParams::Svm(p) => serde_json::to_value(p),
            ModelParams::Tree(p) => serde_json::to_value(p),
            ModelParams::Knn(p) => serde_json::to_value(p),
        };
        match value {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

fn merge<T>(base: &T, overrides: &Map<String, Value>) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut fields = match serde_json::to_value(base)? {
        Value::Object(map) => map,
        other => {
            return Err(AutoMlError::ConfigError(format!(
                "parameters must serialize to an object, got {}",
                other
            )))
        }
    };

    for (key, value) in overrides {
        let field = fields
            .keys()
            .find(|k| k.as_str() == key || k.eq_ignore_ascii_case(key))
            .cloned()
            .ok_or_else(|| {
                let known: Vec<&str> = fields.keys().map(String::as_str).collect();
                AutoMlError::invalid_param(
                    key.as_str(),
                    value,
                    format!("unknown parameter (expected one of: {})", known.join(", ")),
                )
            })?;

        let mut candidate = fields.clone();
        candidate.insert(field.clone(), value.clone());
        serde_json::from_value::<T>(Value::Object(candidate))
            .map_err(|e| AutoMlError::invalid_param(key.as_str(), value, e.to_string()))?;
        fields.insert(field, value.clone());
    }

    Ok(serde_json::from_value(Value::Object(fields))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_aliases_and_names_resolve() {
        assert_eq!(ModelType::from_identifier("rf").unwrap(), ModelType::RandomForest);
        assert_eq!(ModelType::from_identifier("Random Forest").unwrap(), ModelType::RandomForest);
        assert_eq!(ModelType::from_identifier("K-Nearest Neighbors").unwrap(), ModelType::Knn);
        assert_eq!(ModelType::from_identifier("GRADIENT_BOOSTING").unwrap(), ModelType::GradientBoosting);
        for m in ModelType::all() {
            assert_eq!(ModelType::from_identifier(m.alias()).unwrap(), *m);
            assert_eq!(ModelType::from_identifier(m.display_name()).unwrap(), *m);
        }
    }

    #[test]
    fn test_unknown_model_lists_identifiers() {
        let err = ModelType::from_identifier("xgb").unwrap_err();
        match err {
            AutoMlError::UnknownModelType { name, available } => {
                assert_eq!(name, "xgb");
                assert!(available.contains(&"rf".to_string()));
                assert!(available.windows(2).all(|w| w[0] <= w[1]));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_regression_only_families() {
        let err = ModelType::Lasso
            .check_compatible(ProblemType::Classification)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Lasso Regression is not suitable for classification problems"
        );
        assert!(ModelType::Ridge.check_compatible(ProblemType::Regression).is_ok());
        assert!(ModelType::Linear.check_compatible(ProblemType::Classification).is_ok());
    }

    #[test]
    fn test_capabilities() {
        let svm = ModelType::Svm.capabilities(ProblemType::Classification);
        assert!(!svm.supports_importances);
        assert!(!svm.supports_probability);
        assert!(ModelType::RandomForest.capabilities(ProblemType::Classification).supports_probability);
        assert!(!ModelType::RandomForest.capabilities(ProblemType::Regression).supports_probability);
    }

    #[test]
    fn test_overrides_applied() {
        let params = ModelParams::with_overrides(
            ModelType::RandomForest,
            Some(&json!({"n_estimators": 25, "max_depth": 4})),
        )
        .unwrap();
        let ModelParams::Forest(p) = params else {
            panic!("expected forest params");
        };
        assert_eq!(p.n_estimators, 25);
        assert_eq!(p.max_depth, Some(4));
        assert_eq!(p.min_samples_leaf, 1);

        let ModelParams::Svm(svm) =
            ModelParams::with_overrides(ModelType::Svm, Some(&json!({"C": 10.0, "kernel": "linear"}))).unwrap()
        else {
            panic!("expected svm params");
        };
        assert_eq!(svm.c, 10.0);
    }

    #[test]
    fn test_bad_overrides_rejected() {
        let unknown = ModelParams::with_overrides(ModelType::Knn, Some(&json!({"depth": 3})));
        assert!(matches!(unknown, Err(AutoMlError::InvalidParameter { ref name, .. }) if name == "depth"));

        let wrong_type =
            ModelParams::with_overrides(ModelType::Knn, Some(&json!({"n_neighbors": "five"})));
        assert!(matches!(wrong_type, Err(AutoMlError::InvalidParameter { ref name, .. }) if name == "n_neighbors"));
    }

    #[test]
    fn test_bagging_defaults_and_map() {
        let params = ModelParams::defaults(ModelType::Bagging);
        assert_eq!(params.to_map().get("n_estimators"), Some(&json!(10)));
        assert!(params.to_map().get("family").is_none());
    }
}
