//! Подбор гиперпараметров и рекурсивное исключение признаков с кросс-валидацией

use std::collections::BTreeMap;
use std::path::Path;

use ndarray::{Array1, Array2, Axis};
use serde::Serialize;
use serde_json::{json, Value};

use super::metrics::mean_squared_error;
use super::Regressor;
use crate::error::ModelError;
use crate::loader::write_feature_mask;
use crate::preprocessing::{Fold, KFold};
use crate::types::Table;

/// Сетка гиперпараметров: имя -> список значений
pub type ParamGrid = BTreeMap<String, Vec<Value>>;

/// Сетка по умолчанию для случайного леса
pub fn default_param_grid() -> ParamGrid {
    let mut grid = ParamGrid::new();
    grid.insert("n_estimators".to_string(), vec![json!(500)]);
    grid.insert("max_features".to_string(), vec![json!("auto")]);
    grid.insert("max_depth".to_string(), vec![Value::Null]);
    grid.insert(
        "min_samples_split".to_string(),
        (2..=9).map(|v| json!(v)).collect(),
    );
    grid.insert("min_samples_leaf".to_string(), vec![json!(1)]);
    grid.insert("n_jobs".to_string(), vec![json!(-1)]);
    grid
}

/// Все комбинации значений сетки (порядок детерминирован)
fn expand_grid(grid: &ParamGrid) -> Vec<BTreeMap<String, Value>> {
    let mut combinations = vec![BTreeMap::new()];
    for (name, values) in grid {
        combinations = combinations
            .into_iter()
            .flat_map(|combination| {
                values.iter().map(move |value| {
                    let mut next = combination.clone();
                    next.insert(name.clone(), value.clone());
                    next
                })
            })
            .collect();
    }
    combinations
}

/// Отрицательная MSE на каждом фолде
pub fn cross_val_score<R: Regressor + Clone>(
    model: &R,
    x: &Array2<f64>,
    y: &Array1<f64>,
    folds: &[Fold],
) -> Result<Vec<f64>, ModelError> {
    folds
        .iter()
        .map(|fold| {
            let mut estimator = model.clone();
            estimator.fit(&x.select(Axis(0), &fold.train), &y.select(Axis(0), &fold.train))?;
            let predictions = estimator.predict(&x.select(Axis(0), &fold.test))?;
            Ok(-mean_squared_error(&y.select(Axis(0), &fold.test), &predictions)?)
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub best_params: BTreeMap<String, Value>,
    pub best_score: f64,
    /// Средняя оценка каждой комбинации
    pub results: Vec<(BTreeMap<String, Value>, f64)>,
}

/// Поиск гиперпараметров по сетке с `cv`-fold кросс-валидацией (оценка - отрицательная MSE)
pub fn optimize<R: Regressor + Clone>(
    model: &R,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    grid: &ParamGrid,
    cv: usize,
) -> Result<SearchResult, ModelError> {
    let folds = KFold::new(cv).split(x_train.nrows())?;

    let mut results = Vec::new();
    let mut best: Option<(BTreeMap<String, Value>, f64)> = None;

    for params in expand_grid(grid) {
        let mut candidate = model.clone();
        for (name, value) in &params {
            candidate.set_param(name, value)?;
        }

        let scores = cross_val_score(&candidate, x_train, y_train, &folds)?;
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        tracing::debug!("Grid search {:?}: {:.6}", params, mean);

        if best.as_ref().map_or(true, |(_, score)| mean > *score) {
            best = Some((params.clone(), mean));
        }
        results.push((params, mean));
    }

    let (best_params, best_score) = best.ok_or(ModelError::EmptyDataset)?;
    tracing::info!(
        "Best parameters: {} (score {:.6})",
        serde_json::to_string(&best_params).unwrap_or_default(),
        best_score
    );

    Ok(SearchResult {
        best_params,
        best_score,
        results,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct RfecvResult {
    /// Маска выбранных признаков
    pub support: Vec<bool>,
    /// 1 - выбранный признак, больше - исключен раньше
    pub ranking: Vec<usize>,
    pub n_features: usize,
    /// Средняя оценка для 1..=N признаков
    pub grid_scores: Vec<f64>,
    pub feature_names: Vec<String>,
}

/// Рекурсивное исключение по одному признаку до `n_select` оставшихся.
///
/// `on_step` вызывается для каждого обученного подмножества признаков.
/// Возвращает оставшиеся признаки и порядок исключения.
fn eliminate<R, F>(
    model: &R,
    x: &Array2<f64>,
    y: &Array1<f64>,
    n_select: usize,
    mut on_step: F,
) -> Result<(Vec<usize>, Vec<usize>), ModelError>
where
    R: Regressor + Clone,
    F: FnMut(&[usize], &R) -> Result<(), ModelError>,
{
    let mut remaining: Vec<usize> = (0..x.ncols()).collect();
    let mut eliminated = Vec::new();

    loop {
        let mut estimator = model.clone();
        estimator.fit(&x.select(Axis(1), &remaining), y)?;
        on_step(&remaining, &estimator)?;

        if remaining.len() <= n_select {
            break;
        }

        let importances = estimator
            .feature_importances()
            .ok_or(ModelError::NoImportances)?;
        let weakest = importances
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .ok_or(ModelError::EmptyDataset)?;
        eliminated.push(remaining.remove(weakest));
    }

    Ok((remaining, eliminated))
}

/// RFECV: шаг 1, `cv` фолдов, оценка - отрицательная MSE.
///
/// Оптимальная маска записывается в `mask_file`. При равных оценках
/// выбирается меньшее число признаков.
pub fn recursive_feature_elimination<R: Regressor + Clone>(
    model: &R,
    x_train: &Table,
    y_train: &Array1<f64>,
    mask_file: impl AsRef<Path>,
    cv: usize,
) -> Result<RfecvResult, ModelError> {
    let x = x_train.to_array()?;
    let n_features = x.ncols();
    if n_features == 0 {
        return Err(ModelError::EmptyDataset);
    }

    let folds = KFold::new(cv).split(x.nrows())?;
    let mut score_sums = vec![0.0; n_features];

    for fold in &folds {
        let x_fold = x.select(Axis(0), &fold.train);
        let y_fold = y_train.select(Axis(0), &fold.train);
        let x_test = x.select(Axis(0), &fold.test);
        let y_test = y_train.select(Axis(0), &fold.test);

        eliminate(model, &x_fold, &y_fold, 1, |features, estimator| {
            let predictions = estimator.predict(&x_test.select(Axis(1), features))?;
            score_sums[features.len() - 1] -= mean_squared_error(&y_test, &predictions)?;
            Ok(())
        })?;
    }

    let grid_scores: Vec<f64> = score_sums
        .iter()
        .map(|s| s / folds.len() as f64)
        .collect();
    let best_count = grid_scores
        .iter()
        .enumerate()
        .fold(None::<(usize, f64)>, |best, (i, &score)| match best {
            Some((_, b)) if b >= score => best,
            _ => Some((i, score)),
        })
        .map(|(i, _)| i + 1)
        .unwrap_or(n_features);

    let (selected, eliminated) = eliminate(model, &x, y_train, best_count, |_, _| Ok(()))?;

    let mut support = vec![false; n_features];
    let mut ranking = vec![1; n_features];
    for &i in &selected {
        support[i] = true;
    }
    for (step, &i) in eliminated.iter().enumerate() {
        ranking[i] = eliminated.len() - step + 1;
    }

    let names = x_train.column_names();
    let feature_names: Vec<String> = selected.iter().map(|&i| names[i].clone()).collect();

    tracing::info!("Optimal number of features: {}", best_count);
    tracing::info!("Selector support: {:?}", support);
    tracing::info!("Selector ranking: {:?}", ranking);
    tracing::info!("Feature names: {:?}", feature_names);

    write_feature_mask(mask_file, &support)?;

    Ok(RfecvResult {
        support,
        ranking,
        n_features: best_count,
        grid_scores,
        feature_names,
    })
}
