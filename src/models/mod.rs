/// ML модели и подбор признаков/гиперпараметров

use ndarray::{Array1, Array2};

use crate::error::ModelError;

pub mod forest;
pub mod metrics;
pub mod selection;

pub use forest::{ForestParams, MaxFeatures, RandomForestRegressor};
pub use metrics::evaluate;
pub use selection::{optimize, recursive_feature_elimination, ParamGrid, RfecvResult, SearchResult};

/// Регрессор с интерфейсом fit/predict
pub trait Regressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError>;

    /// Важность признаков обученной модели (для RFECV и отчета)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    /// Установка гиперпараметра по имени (для поиска по сетке)
    fn set_param(&mut self, name: &str, _value: &serde_json::Value) -> Result<(), ModelError> {
        Err(ModelError::UnknownParam(name.to_string()))
    }
}

pub(crate) fn check_training_data(x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(ModelError::EmptyDataset);
    }
    if x.nrows() != y.len() {
        return Err(ModelError::ShapeMismatch {
            expected: x.nrows(),
            actual: y.len(),
        });
    }
    Ok(())
}

pub(crate) fn param_as_usize(name: &str, value: &serde_json::Value) -> Result<usize, ModelError> {
    value
        .as_u64()
        .map(|v| v as usize)
        .ok_or_else(|| ModelError::InvalidParam {
            name: name.to_string(),
            value: value.to_string(),
        })
}
