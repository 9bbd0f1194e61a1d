//! Типы ошибок подготовки данных и моделей

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DataError>;

/// Ошибки работы с данными
#[derive(Error, Debug)]
pub enum DataError {
    /// Неверный путь или аргумент
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Обращение к атрибуту до шага, который его вычисляет
    #[error("{field} is not initialized: call {hint} first")]
    Uninitialized {
        field: &'static str,
        hint: &'static str,
    },

    /// Содержимое не является корректной таблицей
    #[error("Invalid tabular content: {0}")]
    Format(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Длина маски не совпадает с количеством столбцов
    #[error("mask length {mask} does not match dataframe length {columns}")]
    LengthMismatch { mask: usize, columns: usize },

    /// split() и режим предсказания взаимоисключающие
    #[error("Mode conflict: {0}")]
    ModeConflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Ошибки обучения и применения моделей
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Empty dataset")]
    EmptyDataset,

    #[error("Model not trained")]
    NotTrained,

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Unknown hyperparameter '{0}'")]
    UnknownParam(String),

    #[error("Invalid value for hyperparameter '{name}': {value}")]
    InvalidParam { name: String, value: String },

    #[error("Estimator does not expose feature importances")]
    NoImportances,

    #[error(transparent)]
    Data(#[from] DataError),
}
