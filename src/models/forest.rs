//! Случайный лес для регрессии

#![allow(non_snake_case)]

use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{check_training_data, param_as_usize, Regressor};
use crate::error::ModelError;

/// Сколько признаков рассматривать в каждом узле
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    #[default]
    #[serde(alias = "auto")]
    All,
    Sqrt,
    Log2,
}

impl MaxFeatures {
    fn count(self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
        };
        n.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
    #[serde(default)]
    pub max_features: MaxFeatures,
    #[serde(default)]
    pub random_state: Option<u64>,
}

fn default_n_estimators() -> usize { 500 }
fn default_min_samples_split() -> usize { 2 }
fn default_min_samples_leaf() -> usize { 1 }

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            max_depth: None,
            min_samples_split: default_min_samples_split(),
            min_samples_leaf: default_min_samples_leaf(),
            max_features: MaxFeatures::All,
            random_state: None,
        }
    }
}

#[derive(Debug, Clone)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            TreeNode::Leaf { value } => *value,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    position: usize,
    sse: f64,
    order: Vec<usize>,
}

/// Построение одного дерева на бутстрэп-выборке
struct TreeBuilder<'a> {
    X: &'a Array2<f64>,
    y: &'a Array1<f64>,
    params: &'a ForestParams,
    n_try: usize,
    rng: &'a mut StdRng,
    importances: Vec<f64>,
}

impl<'a> TreeBuilder<'a> {
    fn build(&mut self, indices: Vec<usize>, depth: usize) -> TreeNode {
        let n = indices.len();
        let sum: f64 = indices.iter().map(|&i| self.y[i]).sum();
        let sum_sq: f64 = indices.iter().map(|&i| self.y[i] * self.y[i]).sum();
        let mean = sum / n as f64;
        let sse = sum_sq - sum * sum / n as f64;

        let depth_reached = self.params.max_depth.map_or(false, |d| depth >= d);
        if depth_reached
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
            || sse <= 1e-12
        {
            return TreeNode::Leaf { value: mean };
        }

        let best = match self.find_best_split(&indices) {
            Some(best) => best,
            // Не удалось найти допустимое разделение
            None => return TreeNode::Leaf { value: mean },
        };

        self.importances[best.feature] += (sse - best.sse).max(0.0);

        let (left_indices, right_indices) = best.order.split_at(best.position);
        let left = self.build(left_indices.to_vec(), depth + 1);
        let right = self.build(right_indices.to_vec(), depth + 1);

        TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn find_best_split(&mut self, indices: &[usize]) -> Option<BestSplit> {
        let n = indices.len();
        let n_features = self.X.ncols();
        let min_leaf = self.params.min_samples_leaf.max(1);

        let features: Vec<usize> = if self.n_try < n_features {
            rand::seq::index::sample(&mut *self.rng, n_features, self.n_try).into_vec()
        } else {
            (0..n_features).collect()
        };

        let mut best: Option<BestSplit> = None;

        for feature in features {
            let mut order = indices.to_vec();
            order.sort_by(|&a, &b| self.X[[a, feature]].total_cmp(&self.X[[b, feature]]));

            let total: f64 = order.iter().map(|&i| self.y[i]).sum();
            let total_sq: f64 = order.iter().map(|&i| self.y[i] * self.y[i]).sum();

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            let mut candidate: Option<(usize, f64)> = None;

            for k in 1..n {
                let yi = self.y[order[k - 1]];
                left_sum += yi;
                left_sq += yi * yi;

                if k < min_leaf || n - k < min_leaf {
                    continue;
                }
                let lo = self.X[[order[k - 1], feature]];
                let hi = self.X[[order[k], feature]];
                if lo >= hi {
                    continue;
                }

                let right_sum = total - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / k as f64)
                    + (right_sq - right_sum * right_sum / (n - k) as f64);

                let current_best = candidate
                    .map(|(_, s)| s)
                    .or(best.as_ref().map(|b| b.sse))
                    .unwrap_or(f64::INFINITY);
                if sse < current_best {
                    candidate = Some((k, sse));
                }
            }

            if let Some((position, sse)) = candidate {
                let lo = self.X[[order[position - 1], feature]];
                let hi = self.X[[order[position], feature]];
                let mid = lo + (hi - lo) / 2.0;
                best = Some(BestSplit {
                    feature,
                    threshold: if mid < hi { mid } else { lo },
                    position,
                    sse,
                    order,
                });
            }
        }

        best
    }
}

pub struct RandomForestRegressor {
    params: ForestParams,
    trees: Vec<TreeNode>,
    importances: Option<Array1<f64>>,
    n_features: usize,
}

impl RandomForestRegressor {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            importances: None,
            n_features: 0,
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }
}

impl Clone for RandomForestRegressor {
    /// Копируются только гиперпараметры, обученные деревья не переносятся
    fn clone(&self) -> Self {
        Self::new(self.params.clone())
    }
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(ForestParams::default())
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        check_training_data(X, y)?;
        if self.params.n_estimators == 0 {
            return Err(ModelError::InvalidParam {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
            });
        }

        let n_samples = X.nrows();
        let n_features = X.ncols();
        let seed = self
            .params
            .random_state
            .unwrap_or_else(|| rand::thread_rng().gen());
        let mut rng = StdRng::seed_from_u64(seed);

        let mut trees = Vec::with_capacity(self.params.n_estimators);
        let mut importances = Array1::<f64>::zeros(n_features);

        for _ in 0..self.params.n_estimators {
            // Бутстрэп-выборка
            let sample: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();

            let mut builder = TreeBuilder {
                X,
                y,
                params: &self.params,
                n_try: self.params.max_features.count(n_features),
                rng: &mut rng,
                importances: vec![0.0; n_features],
            };
            let tree = builder.build(sample, 0);

            let total: f64 = builder.importances.iter().sum();
            if total > 0.0 {
                for (acc, value) in importances.iter_mut().zip(&builder.importances) {
                    *acc += value / total;
                }
            }
            trees.push(tree);
        }

        let total = importances.sum();
        if total > 0.0 {
            importances /= total;
        }

        tracing::debug!(
            "Random forest trained: {} trees, {} samples, {} features",
            trees.len(),
            n_samples,
            n_features
        );

        self.trees = trees;
        self.importances = Some(importances);
        self.n_features = n_features;
        Ok(())
    }

    fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotTrained);
        }
        if X.ncols() != self.n_features {
            return Err(ModelError::ShapeMismatch {
                expected: self.n_features,
                actual: X.ncols(),
            });
        }

        let n_trees = self.trees.len() as f64;
        Ok(X.rows()
            .into_iter()
            .map(|row| self.trees.iter().map(|tree| tree.predict(row)).sum::<f64>() / n_trees)
            .collect())
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.importances.clone()
    }

    fn set_param(&mut self, name: &str, value: &serde_json::Value) -> Result<(), ModelError> {
        match name {
            "n_estimators" => self.params.n_estimators = param_as_usize(name, value)?,
            "max_depth" => {
                self.params.max_depth = if value.is_null() {
                    None
                } else {
                    Some(param_as_usize(name, value)?)
                }
            }
            "min_samples_split" => self.params.min_samples_split = param_as_usize(name, value)?,
            "min_samples_leaf" => self.params.min_samples_leaf = param_as_usize(name, value)?,
            "max_features" => {
                self.params.max_features = serde_json::from_value(value.clone()).map_err(|_| {
                    ModelError::InvalidParam {
                        name: name.to_string(),
                        value: value.to_string(),
                    }
                })?
            }
            "random_state" => {
                self.params.random_state = if value.is_null() {
                    None
                } else {
                    Some(param_as_usize(name, value)? as u64)
                }
            }
            // Обучение однопоточное
            "n_jobs" => {}
            _ => return Err(ModelError::UnknownParam(name.to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let n = 60;
        let X = Array2::from_shape_fn((n, 2), |(i, j)| {
            if j == 0 {
                i as f64 / n as f64
            } else {
                ((i * 7) % 11) as f64
            }
        });
        let y = Array1::from_shape_fn(n, |i| if i < n / 2 { 1.0 } else { 5.0 });
        (X, y)
    }

    fn forest() -> RandomForestRegressor {
        RandomForestRegressor::new(ForestParams {
            n_estimators: 20,
            random_state: Some(42),
            ..ForestParams::default()
        })
    }

    #[test]
    fn learns_a_step_function() {
        let (X, y) = step_data();
        let mut model = forest();
        model.fit(&X, &y).unwrap();

        let predictions = model.predict(&X).unwrap();
        let mae = (&predictions - &y).mapv(f64::abs).mean().unwrap();
        assert!(mae < 0.5, "mae = {mae}");
    }

    #[test]
    fn importances_sum_to_one_and_favor_signal() {
        let (X, y) = step_data();
        let mut model = forest();
        model.fit(&X, &y).unwrap();

        let importances = model.feature_importances().unwrap();
        assert!((importances.sum() - 1.0).abs() < 1e-9);
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn same_seed_same_predictions() {
        let (X, y) = step_data();
        let mut a = forest();
        let mut b = forest();
        a.fit(&X, &y).unwrap();
        b.fit(&X, &y).unwrap();
        assert_eq!(a.predict(&X).unwrap(), b.predict(&X).unwrap());
    }

    #[test]
    fn predict_checks_state_and_shape() {
        let (X, y) = step_data();
        let mut model = forest();
        assert!(matches!(model.predict(&X), Err(ModelError::NotTrained)));

        model.fit(&X, &y).unwrap();
        let narrow = Array2::zeros((3, 1));
        assert!(matches!(
            model.predict(&narrow),
            Err(ModelError::ShapeMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn set_param_updates_hyperparameters() {
        let mut model = forest();
        model.set_param("min_samples_split", &json!(5)).unwrap();
        model.set_param("max_depth", &json!(null)).unwrap();
        model.set_param("max_features", &json!("auto")).unwrap();
        model.set_param("n_jobs", &json!(-1)).unwrap();
        assert_eq!(model.params().min_samples_split, 5);
        assert_eq!(model.params().max_features, MaxFeatures::All);

        assert!(matches!(
            model.set_param("bogus", &json!(1)),
            Err(ModelError::UnknownParam(_))
        ));
        assert!(matches!(
            model.set_param("n_estimators", &json!("many")),
            Err(ModelError::InvalidParam { .. })
        ));
    }

    #[test]
    fn max_features_counts() {
        assert_eq!(MaxFeatures::All.count(9), 9);
        assert_eq!(MaxFeatures::Sqrt.count(9), 3);
        assert_eq!(MaxFeatures::Log2.count(8), 3);
        assert_eq!(MaxFeatures::Sqrt.count(1), 1);
    }
}
